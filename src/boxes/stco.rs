use std::io;

use crate::boxes::prelude::*;

/// 8.7.5 Chunk Offset Box (ISO/IEC 14496-12:2015(E))
///
/// Implements both "stco" and "co64". The box is written as `co64`
/// exactly when an offset does not fit in 32 bits.
#[derive(Clone, Debug, Default)]
pub struct ChunkOffsetBox {
    pub entries: Vec<u64>,
}
pub type ChunkLargeOffsetBox = ChunkOffsetBox;

impl ChunkOffsetBox {
    pub fn push(&mut self, offset: u64) {
        self.entries.push(offset);
    }

    pub fn get(&self, index: usize) -> Option<u64> {
        self.entries.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_large(&self) -> bool {
        self.entries.iter().any(|&e| e > u32::MAX as u64)
    }
}

impl FromBytes for ChunkOffsetBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ChunkOffsetBox> {
        let mut reader = BoxReader::new(stream)?;
        let large = reader.header.fourcc == b"co64";
        let stream = &mut reader;

        let count = u32::from_bytes(stream)?;
        let mut entries = Vec::with_capacity(std::cmp::min(count as usize, 1_000_000));
        for _ in 0..count {
            if large {
                entries.push(u64::from_bytes(stream)?);
            } else {
                entries.push(u32::from_bytes(stream)? as u64);
            }
        }
        Ok(ChunkOffsetBox { entries })
    }

    fn min_size() -> usize {
        16
    }
}

impl ToBytes for ChunkOffsetBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let large = self.is_large();
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        (self.entries.len() as u32).to_bytes(stream)?;
        for &entry in &self.entries {
            if large {
                entry.to_bytes(stream)?;
            } else {
                (entry as u32).to_bytes(stream)?;
            }
        }
        stream.finalize()
    }
}

impl BoxInfo for ChunkOffsetBox {
    fn fourcc(&self) -> FourCC {
        if self.is_large() {
            FourCC::new("co64")
        } else {
            FourCC::new("stco")
        }
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for ChunkOffsetBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    #[test]
    fn small_offsets_write_stco() {
        let mut stco = ChunkOffsetBox::default();
        stco.push(100);
        stco.push(2000);
        let mut buf = MemBuffer::new();
        stco.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        assert_eq!(&v[4..8], b"stco");
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ChunkOffsetBox::from_bytes(&mut rd).unwrap();
        assert_eq!(back.entries, vec![100, 2000]);
    }

    #[test]
    fn large_offset_promotes_to_co64() {
        let mut stco = ChunkOffsetBox::default();
        stco.push(100);
        stco.push(0x1_0000_0000);
        let mut buf = MemBuffer::new();
        stco.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        assert_eq!(&v[4..8], b"co64");
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ChunkOffsetBox::from_bytes(&mut rd).unwrap();
        assert_eq!(back.entries, vec![100, 0x1_0000_0000]);
    }
}
