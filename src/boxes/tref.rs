use std::io;

use crate::boxes::prelude::*;

/// One typed reference to other tracks. The box type of the child
/// _is_ the reference type (`thmb`, `auxl`, `cdsc`, ..).
#[derive(Clone, Debug)]
pub struct TrackReferenceTypeBox {
    pub reference_type: FourCC,
    pub track_ids:      Vec<u32>,
}

/// 8.3.3 Track Reference Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct TrackReferenceBox {
    pub references: Vec<TrackReferenceTypeBox>,
}

impl TrackReferenceBox {
    pub fn add_reference(&mut self, reference_type: FourCC, to_track_id: u32) {
        for r in self.references.iter_mut() {
            if r.reference_type == reference_type {
                r.track_ids.push(to_track_id);
                return;
            }
        }
        self.references.push(TrackReferenceTypeBox {
            reference_type,
            track_ids: vec![to_track_id],
        });
    }

    pub fn track_ids_of_type(&self, reference_type: FourCC) -> Vec<u32> {
        self.references
            .iter()
            .filter(|r| r.reference_type == reference_type)
            .flat_map(|r| r.track_ids.iter().copied())
            .collect()
    }
}

impl FromBytes for TrackReferenceBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<TrackReferenceBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let mut references = Vec::new();
        while stream.left() >= 8 {
            let size = u32::from_bytes(stream)? as u64;
            let reference_type = FourCC::from_bytes(stream)?;
            if size < 8 {
                return Err(ioerr!(InvalidData, "tref: bad child box size {}", size));
            }
            let count = ((size - 8) / 4) as usize;
            let mut track_ids = Vec::with_capacity(count);
            for _ in 0..count {
                track_ids.push(u32::from_bytes(stream)?);
            }
            references.push(TrackReferenceTypeBox {
                reference_type,
                track_ids,
            });
        }
        Ok(TrackReferenceBox { references })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for TrackReferenceBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        for r in &self.references {
            let size: u32 = 8 + 4 * (r.track_ids.len() as u32);
            size.to_bytes(stream)?;
            r.reference_type.to_bytes(stream)?;
            r.track_ids.to_bytes(stream)?;
        }
        stream.finalize()
    }
}

impl BoxInfo for TrackReferenceBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("tref")
    }
}

impl FullBox for TrackReferenceBox {}
