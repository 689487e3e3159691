use std::io;

use crate::boxes::prelude::*;

/// A typed reference from one item to one or more other items.
///
/// The box type of this child box _is_ the reference type
/// (`dimg`, `thmb`, `auxl`, `cdsc`, `base`, `tbas`, ..).
#[derive(Clone, Debug)]
pub struct SingleItemTypeReferenceBox {
    pub reference_type: FourCC,
    pub from_item_id:   u32,
    pub to_item_ids:    Vec<u32>,
}

/// 8.11.12 Item Reference Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct ItemReferenceBox {
    pub references: Vec<SingleItemTypeReferenceBox>,
}

impl ItemReferenceBox {
    /// Add a reference edge. If a reference of this type from this item
    /// already exists, the target is appended to its list.
    pub fn add_reference(&mut self, reference_type: FourCC, from_item_id: u32, to_item_id: u32) {
        for r in self.references.iter_mut() {
            if r.reference_type == reference_type && r.from_item_id == from_item_id {
                r.to_item_ids.push(to_item_id);
                return;
            }
        }
        self.references.push(SingleItemTypeReferenceBox {
            reference_type,
            from_item_id,
            to_item_ids: vec![to_item_id],
        });
    }

    pub fn references_of_type(&self, reference_type: FourCC) -> Vec<&SingleItemTypeReferenceBox> {
        self.references
            .iter()
            .filter(|r| r.reference_type == reference_type)
            .collect()
    }

    /// Target ids of references of `reference_type` from `item_id`.
    pub fn to_item_ids(&self, reference_type: FourCC, from_item_id: u32) -> Vec<u32> {
        self.references
            .iter()
            .filter(|r| r.reference_type == reference_type && r.from_item_id == from_item_id)
            .flat_map(|r| r.to_item_ids.iter().copied())
            .collect()
    }

    /// Source ids of references of `reference_type` that point at `item_id`.
    pub fn from_item_ids(&self, reference_type: FourCC, to_item_id: u32) -> Vec<u32> {
        self.references
            .iter()
            .filter(|r| {
                r.reference_type == reference_type && r.to_item_ids.contains(&to_item_id)
            })
            .map(|r| r.from_item_id)
            .collect()
    }

    fn needs_large_ids(&self) -> bool {
        self.references.iter().any(|r| {
            r.from_item_id > u16::MAX as u32
                || r.to_item_ids.iter().any(|&id| id > u16::MAX as u32)
        })
    }
}

impl FromBytes for ItemReferenceBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ItemReferenceBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let large_ids = stream.version() >= 1;

        let mut references = Vec::new();
        while stream.left() >= 8 {
            let size = u32::from_bytes(stream)? as u64;
            let reference_type = FourCC::from_bytes(stream)?;
            if size < 8 {
                return Err(ioerr!(InvalidData, "iref: bad child box size {}", size));
            }
            let from_item_id = if large_ids {
                u32::from_bytes(stream)?
            } else {
                u16::from_bytes(stream)? as u32
            };
            let reference_count = u16::from_bytes(stream)?;
            let mut to_item_ids = Vec::with_capacity(reference_count as usize);
            for _ in 0..reference_count {
                to_item_ids.push(if large_ids {
                    u32::from_bytes(stream)?
                } else {
                    u16::from_bytes(stream)? as u32
                });
            }
            references.push(SingleItemTypeReferenceBox {
                reference_type,
                from_item_id,
                to_item_ids,
            });
        }

        Ok(ItemReferenceBox { references })
    }

    fn min_size() -> usize {
        12
    }
}

impl ToBytes for ItemReferenceBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        let large_ids = self.needs_large_ids();

        for r in &self.references {
            let id_size = if large_ids { 4u32 } else { 2u32 };
            let size = 8 + id_size + 2 + id_size * (r.to_item_ids.len() as u32);
            size.to_bytes(stream)?;
            r.reference_type.to_bytes(stream)?;
            if large_ids {
                r.from_item_id.to_bytes(stream)?;
            } else {
                (r.from_item_id as u16).to_bytes(stream)?;
            }
            (r.to_item_ids.len() as u16).to_bytes(stream)?;
            for &id in &r.to_item_ids {
                if large_ids {
                    id.to_bytes(stream)?;
                } else {
                    (id as u16).to_bytes(stream)?;
                }
            }
        }

        stream.finalize()
    }
}

impl BoxInfo for ItemReferenceBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("iref")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for ItemReferenceBox {
    fn version(&self) -> Option<u8> {
        if self.needs_large_ids() {
            Some(1)
        } else {
            Some(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    #[test]
    fn append_to_existing_edge() {
        let mut iref = ItemReferenceBox::default();
        let dimg = FourCC::new("dimg");
        iref.add_reference(dimg, 5, 1);
        iref.add_reference(dimg, 5, 2);
        iref.add_reference(FourCC::new("thmb"), 6, 1);
        assert_eq!(iref.references.len(), 2);
        assert_eq!(iref.to_item_ids(dimg, 5), vec![1, 2]);
        assert_eq!(iref.from_item_ids(dimg, 2), vec![5]);
    }

    #[test]
    fn roundtrip() {
        let mut iref = ItemReferenceBox::default();
        iref.add_reference(FourCC::new("thmb"), 2, 1);
        iref.add_reference(FourCC::new("auxl"), 3, 1);

        let mut buf = MemBuffer::new();
        iref.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ItemReferenceBox::from_bytes(&mut rd).unwrap();
        assert_eq!(back.references.len(), 2);
        assert_eq!(back.to_item_ids(FourCC::new("thmb"), 2), vec![1]);
    }

    #[test]
    fn large_ids_switch_to_version_1() {
        let mut iref = ItemReferenceBox::default();
        iref.add_reference(FourCC::new("dimg"), 70000, 1);
        assert_eq!(iref.version(), Some(1));

        let mut buf = MemBuffer::new();
        iref.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ItemReferenceBox::from_bytes(&mut rd).unwrap();
        assert_eq!(back.references[0].from_item_id, 70000);
    }
}
