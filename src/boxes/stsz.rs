use std::io;

use crate::boxes::prelude::*;

/// 8.7.3.2 Sample Size Box (ISO/IEC 14496-12:2015(E))
///
/// Either one fixed size for all samples, or a per-sample table.
#[derive(Clone, Debug, Default)]
pub struct SampleSizeBox {
    pub sample_size: u32,
    pub count:       u32,
    pub entries:     Vec<u32>,
}

impl SampleSizeBox {
    /// Size of one sample (0-based index).
    pub fn size(&self, sample: usize) -> Option<u32> {
        if self.sample_size != 0 {
            if (sample as u32) < self.count {
                Some(self.sample_size)
            } else {
                None
            }
        } else {
            self.entries.get(sample).copied()
        }
    }

    pub fn sample_count(&self) -> u32 {
        if self.sample_size != 0 {
            self.count
        } else {
            self.entries.len() as u32
        }
    }

    pub fn iter(&self) -> SampleSizeIterator<'_> {
        SampleSizeIterator {
            size:    self.sample_size,
            count:   self.sample_count(),
            entries: &self.entries,
            index:   0,
        }
    }

    pub fn push(&mut self, size: u32) {
        self.entries.push(size);
    }
}

pub struct SampleSizeIterator<'a> {
    size:    u32,
    count:   u32,
    entries: &'a [u32],
    index:   usize,
}

impl<'a> Iterator for SampleSizeIterator<'a> {
    type Item = u32;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count as usize {
            return None;
        }
        let value = if self.size != 0 {
            self.size
        } else {
            self.entries[self.index]
        };
        self.index += 1;
        Some(value)
    }
}

impl FromBytes for SampleSizeBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleSizeBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;

        let sample_size = u32::from_bytes(stream)?;
        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::new();
        if sample_size == 0 {
            entries.reserve(std::cmp::min(count as usize, 1_000_000));
            for _ in 0..count {
                if stream.left() < 4 {
                    break;
                }
                entries.push(u32::from_bytes(stream)?);
            }
        }
        Ok(SampleSizeBox {
            sample_size,
            count,
            entries,
        })
    }

    fn min_size() -> usize {
        20
    }
}

impl ToBytes for SampleSizeBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        self.sample_size.to_bytes(stream)?;
        if self.sample_size != 0 {
            self.count.to_bytes(stream)?;
        } else {
            (self.entries.len() as u32).to_bytes(stream)?;
            for e in &self.entries {
                e.to_bytes(stream)?;
            }
        }
        stream.finalize()
    }
}

impl BoxInfo for SampleSizeBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("stsz")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for SampleSizeBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}
