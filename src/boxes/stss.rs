use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.6.2 Sync Sample Box (ISO/IEC 14496-12:2015(E))
    ///
    /// 1-based sample numbers. When the box is absent every sample
    /// is a sync sample.
    #[derive(Default)]
    SyncSampleBox {
        entries:        ArraySized32<u32>,
    },
    fourcc => "stss",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl SyncSampleBox {
    /// Is the (1-based) sample a sync sample.
    pub fn is_sync(&self, sample: u32) -> bool {
        self.entries.iter().any(|&s| s == sample)
    }

    /// Return an iterator that yields one bool per sample.
    pub fn iter(&self) -> SyncSampleIterator<'_> {
        SyncSampleIterator {
            entries: &self.entries,
            index: 0,
            cur_sample: 1,
        }
    }
}

pub struct SyncSampleIterator<'a> {
    entries:    &'a [u32],
    index:      usize,
    cur_sample: u32,
}

impl<'a> Iterator for SyncSampleIterator<'a> {
    type Item = bool;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.entries.len() == 0 {
            self.cur_sample += 1;
            return Some(true);
        }
        let is_sync = self.index < self.entries.len() && self.entries[self.index] == self.cur_sample;
        if is_sync {
            self.index += 1;
        }
        self.cur_sample += 1;
        Some(is_sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterator_marks_sync_samples() {
        let mut stss = SyncSampleBox::default();
        stss.entries.push(1);
        stss.entries.push(4);
        let flags: Vec<bool> = stss.iter().take(5).collect();
        assert_eq!(flags, vec![true, false, false, true, false]);
    }
}
