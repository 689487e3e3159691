use std::io;

use crate::boxes::prelude::*;

/// 8.11.4 Primary Item Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct PrimaryItemBox {
    pub item_id: u32,
}

impl FromBytes for PrimaryItemBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<PrimaryItemBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let item_id = if stream.version() == 0 {
            u16::from_bytes(stream)? as u32
        } else {
            u32::from_bytes(stream)?
        };
        Ok(PrimaryItemBox { item_id })
    }

    fn min_size() -> usize {
        14
    }
}

impl ToBytes for PrimaryItemBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        if self.item_id > u16::MAX as u32 {
            self.item_id.to_bytes(&mut writer)?;
        } else {
            (self.item_id as u16).to_bytes(&mut writer)?;
        }
        writer.finalize()
    }
}

impl BoxInfo for PrimaryItemBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("pitm")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for PrimaryItemBox {
    fn version(&self) -> Option<u8> {
        if self.item_id > u16::MAX as u32 {
            Some(1)
        } else {
            Some(0)
        }
    }
}
