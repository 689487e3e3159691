use std::io;

use crate::boxes::prelude::*;

/// 8.6.1.3 Composition Time to Sample Box (ISO/IEC 14496-12:2015(E))
///
/// Version 0 entries hold unsigned offsets, version 1 signed ones.
/// The entry offsets are kept wide enough to round-trip both; a table
/// that mixes negative offsets with offsets above `i32::MAX` cannot be
/// represented in either version and is refused on write.
#[derive(Clone, Debug, Default)]
pub struct CompositionOffsetBox {
    pub entries: ArraySized32<CompositionOffsetEntry>,
}

/// Composition offset entry.
#[derive(Debug, Default, Clone)]
pub struct CompositionOffsetEntry {
    pub count:  u32,
    pub offset: i64,
}

impl CompositionOffsetBox {
    /// Return an iterator that iterates over every sample.
    pub fn iter(&self) -> CompositionOffsetIterator {
        let mut iter = CompositionOffsetIterator {
            entries: &self.entries,
            entry: CompositionOffsetEntry::default(),
            index: 0,
        };
        if iter.entries.len() > 0 {
            iter.entry = iter.entries[0].clone();
        }
        iter
    }

    /// Per-sample composition offsets.
    pub fn sample_offsets(&self) -> Vec<i64> {
        self.iter().collect()
    }

    fn has_negative(&self) -> bool {
        self.entries.iter().any(|e| e.offset < 0)
    }

    fn has_wide_unsigned(&self) -> bool {
        self.entries.iter().any(|e| e.offset > i32::MAX as i64)
    }
}

impl FromBytes for CompositionOffsetBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<CompositionOffsetBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let version = stream.version();

        let count = u32::from_bytes(stream)?;
        let mut entries = ArraySized32::new();
        for _ in 0..count {
            if stream.left() < 8 {
                break;
            }
            let count = u32::from_bytes(stream)?;
            let offset = if version == 0 {
                u32::from_bytes(stream)? as i64
            } else {
                i32::from_bytes(stream)? as i64
            };
            entries.push(CompositionOffsetEntry { count, offset });
        }
        Ok(CompositionOffsetBox { entries })
    }

    fn min_size() -> usize {
        16
    }
}

impl ToBytes for CompositionOffsetBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        if self.has_negative() && self.has_wide_unsigned() {
            return Err(ioerr!(
                InvalidData,
                "ctts: offsets do not fit either version 0 or version 1"
            ));
        }
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        let version = self.version().unwrap_or(0);

        (self.entries.len() as u32).to_bytes(stream)?;
        for entry in self.entries.iter() {
            entry.count.to_bytes(stream)?;
            if version == 0 {
                (entry.offset as u32).to_bytes(stream)?;
            } else {
                (entry.offset as i32).to_bytes(stream)?;
            }
        }
        stream.finalize()
    }
}

impl BoxInfo for CompositionOffsetBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("ctts")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for CompositionOffsetBox {
    fn version(&self) -> Option<u8> {
        if self.has_negative() {
            Some(1)
        } else {
            Some(0)
        }
    }
}

pub struct CompositionOffsetIterator<'a> {
    entries: &'a [CompositionOffsetEntry],
    entry:   CompositionOffsetEntry,
    index:   usize,
}

impl<'a> Iterator for CompositionOffsetIterator<'a> {
    type Item = i64;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.entry.count > 0 {
                self.entry.count -= 1;
                return Some(self.entry.offset);
            }
            self.index += 1;
            if self.index >= self.entries.len() {
                return None;
            }
            self.entry = self.entries[self.index].clone();
        }
    }
}

def_box! {
    /// 8.6.1.4 Composition to Decode Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    CompositionToDecodeBox {
        composition_to_dts_shift:        i32,
        least_decode_to_display_delta:   i32,
        greatest_decode_to_display_delta: i32,
        composition_start_time:          i32,
        composition_end_time:            i32,
    },
    fourcc => "cslg",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    #[test]
    fn unsigned_offsets_stay_version_0() {
        let mut ctts = CompositionOffsetBox::default();
        ctts.entries.push(CompositionOffsetEntry { count: 2, offset: 100 });
        assert_eq!(ctts.version(), Some(0));

        let mut buf = MemBuffer::new();
        ctts.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = CompositionOffsetBox::from_bytes(&mut rd).unwrap();
        assert_eq!(back.sample_offsets(), vec![100, 100]);
    }

    #[test]
    fn negative_offsets_use_version_1() {
        let mut ctts = CompositionOffsetBox::default();
        ctts.entries.push(CompositionOffsetEntry { count: 1, offset: -50 });
        ctts.entries.push(CompositionOffsetEntry { count: 1, offset: 70 });
        assert_eq!(ctts.version(), Some(1));

        let mut buf = MemBuffer::new();
        ctts.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = CompositionOffsetBox::from_bytes(&mut rd).unwrap();
        assert_eq!(back.sample_offsets(), vec![-50, 70]);
    }

    #[test]
    fn unrepresentable_mix_is_refused() {
        let mut ctts = CompositionOffsetBox::default();
        ctts.entries.push(CompositionOffsetEntry { count: 1, offset: -1 });
        ctts.entries.push(CompositionOffsetEntry {
            count: 1,
            offset: i32::MAX as i64 + 1,
        });
        let mut buf = MemBuffer::new();
        assert!(ctts.to_bytes(&mut buf).is_err());
    }
}
