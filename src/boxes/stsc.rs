use std::io;

use crate::boxes::prelude::*;

/// 8.7.4 Sample To Chunk Box (ISO/IEC 14496-12:2015(E))
///
/// A run-length table of `(first_chunk, samples_per_chunk,
/// sample_description_index)`. The first entry must have
/// `first_chunk == 1` and each later `first_chunk` must strictly
/// increase, otherwise the table is rejected.
#[derive(Clone, Debug, Default)]
pub struct SampleToChunkBox {
    pub entries: ArraySized32<SampleToChunkEntry>,
}

def_struct! {
    /// Entry in SampleToChunkBox.
    #[derive(Default)]
    SampleToChunkEntry,
        first_chunk:                u32,
        samples_per_chunk:          u32,
        sample_description_index:   u32,
}

/// Per-sample record from the expanded run-length table.
///
/// `chunk_index` and `sample_description_index` are 1-based,
/// as per the ISO/IEC 14496-12 spec.
#[derive(Clone, Debug, PartialEq)]
pub struct SampleToChunkInfo {
    pub chunk_index:              u32,
    pub samples_per_chunk:        u32,
    pub sample_description_index: u32,
}

impl SampleToChunkBox {
    fn validate(&self) -> io::Result<()> {
        let mut prev_first_chunk = 0u32;
        for (i, entry) in self.entries.iter().enumerate() {
            if i == 0 && entry.first_chunk != 1 {
                return Err(ioerr!(InvalidData, "stsc: first entry must start at chunk 1"));
            }
            if i > 0 && entry.first_chunk <= prev_first_chunk {
                return Err(ioerr!(
                    InvalidData,
                    "stsc: first_chunk {} does not increase",
                    entry.first_chunk
                ));
            }
            prev_first_chunk = entry.first_chunk;
        }
        Ok(())
    }

    /// Expand the run-length table to one record per sample.
    ///
    /// `chunk_count` bounds the expansion (the run of the last entry
    /// continues to the last chunk).
    pub fn expand(&self, chunk_count: u32) -> io::Result<Vec<SampleToChunkInfo>> {
        self.validate()?;
        let mut v = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            let end_chunk = if i + 1 < self.entries.len() {
                self.entries[i + 1].first_chunk
            } else {
                chunk_count + 1
            };
            for chunk in entry.first_chunk..end_chunk {
                for _ in 0..entry.samples_per_chunk {
                    v.push(SampleToChunkInfo {
                        chunk_index: chunk,
                        samples_per_chunk: entry.samples_per_chunk,
                        sample_description_index: entry.sample_description_index,
                    });
                }
            }
        }
        Ok(v)
    }

    /// Return an iterator that iterates over every sample.
    pub fn iter(&self) -> SampleToChunkIterator {
        SampleToChunkIterator::new(&self.entries[..])
    }
}

impl FromBytes for SampleToChunkBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleToChunkBox> {
        let mut reader = BoxReader::new(stream)?;
        let entries = ArraySized32::<SampleToChunkEntry>::from_bytes(&mut reader)?;
        let stsc = SampleToChunkBox { entries };
        stsc.validate()?;
        Ok(stsc)
    }

    fn min_size() -> usize {
        16
    }
}

impl ToBytes for SampleToChunkBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.validate()?;
        let mut writer = BoxWriter::new(stream, self)?;
        self.entries.to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for SampleToChunkBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("stsc")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for SampleToChunkBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}

/// Iterator over the SampleToChunk table, one item per sample.
#[derive(Clone)]
pub struct SampleToChunkIterator<'a> {
    entries:    &'a [SampleToChunkEntry],
    index:      usize,
    cur_chunk:  u32,
    count:      u32,
}

impl<'a> SampleToChunkIterator<'a> {
    fn new(entries: &[SampleToChunkEntry]) -> SampleToChunkIterator<'_> {
        if entries.len() == 0 {
            SampleToChunkIterator {
                entries,
                index: 0,
                cur_chunk: 0,
                count: 0,
            }
        } else {
            SampleToChunkIterator {
                entries,
                index: 0,
                cur_chunk: entries[0].first_chunk,
                count: entries[0].samples_per_chunk,
            }
        }
    }
}

impl<'a> Iterator for SampleToChunkIterator<'a> {
    type Item = SampleToChunkInfo;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.cur_chunk == 0 {
                return None;
            }
            if self.count > 0 {
                self.count -= 1;
                return Some(SampleToChunkInfo {
                    chunk_index: self.cur_chunk,
                    samples_per_chunk: self.entries[self.index].samples_per_chunk,
                    sample_description_index: self.entries[self.index].sample_description_index,
                });
            }
            // Next chunk; advance to the next entry when its run starts.
            self.cur_chunk += 1;
            if self.index + 1 < self.entries.len()
                && self.cur_chunk == self.entries[self.index + 1].first_chunk
            {
                self.index += 1;
            }
            self.count = self.entries[self.index].samples_per_chunk;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    fn entry(first_chunk: u32, samples_per_chunk: u32, sdi: u32) -> SampleToChunkEntry {
        SampleToChunkEntry {
            first_chunk,
            samples_per_chunk,
            sample_description_index: sdi,
        }
    }

    #[test]
    fn expansion() {
        let mut stsc = SampleToChunkBox::default();
        stsc.entries.push(entry(1, 2, 1));
        stsc.entries.push(entry(3, 1, 1));
        // Chunks: 1 and 2 carry 2 samples, chunk 3 carries 1.
        let samples = stsc.expand(3).unwrap();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples[0].chunk_index, 1);
        assert_eq!(samples[1].chunk_index, 1);
        assert_eq!(samples[2].chunk_index, 2);
        assert_eq!(samples[3].chunk_index, 2);
        assert_eq!(samples[4].chunk_index, 3);
    }

    #[test]
    fn first_entry_must_start_at_chunk_1() {
        let mut stsc = SampleToChunkBox::default();
        stsc.entries.push(entry(2, 1, 1));
        assert!(stsc.expand(2).is_err());
        let mut buf = MemBuffer::new();
        assert!(stsc.to_bytes(&mut buf).is_err());
    }

    #[test]
    fn non_increasing_first_chunk_is_rejected() {
        let mut stsc = SampleToChunkBox::default();
        stsc.entries.push(entry(1, 1, 1));
        stsc.entries.push(entry(1, 2, 1));
        assert!(stsc.expand(2).is_err());
    }

    #[test]
    fn roundtrip() {
        let mut stsc = SampleToChunkBox::default();
        stsc.entries.push(entry(1, 5, 1));
        let mut buf = MemBuffer::new();
        stsc.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = SampleToChunkBox::from_bytes(&mut rd).unwrap();
        assert_eq!(back.entries.len(), 1);
        assert_eq!(back.entries[0].samples_per_chunk, 5);
    }

    #[test]
    fn iter_matches_expand() {
        let mut stsc = SampleToChunkBox::default();
        stsc.entries.push(entry(1, 2, 1));
        stsc.entries.push(entry(2, 3, 2));
        let expanded = stsc.expand(2).unwrap();
        let iterated: Vec<_> = stsc.iter().take(expanded.len()).collect();
        assert_eq!(expanded, iterated);
    }
}
