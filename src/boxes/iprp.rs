use std::io;

use crate::boxes::prelude::*;

/// 8.11.14 Item Properties Box (ISO/IEC 14496-12:2015(E))
///
/// Exactly one ItemPropertyContainer followed by one or more
/// ItemPropertyAssociation boxes.
#[derive(Clone, Debug, Default)]
pub struct ItemPropertiesBox {
    pub container:    ItemPropertyContainer,
    pub associations: Vec<ItemPropertyAssociation>,
}

impl ItemPropertiesBox {
    /// Look up a property of `property_type` associated with `item_id`.
    ///
    /// Walks the item's association list and resolves each 1-based
    /// index into the property container; first match wins.
    pub fn property_by_type(&self, item_id: u32, property_type: FourCC) -> Option<&HeifBox> {
        for assoc in self.associations_for_item(item_id) {
            if let Some(property) = self.container.get(assoc.property_index) {
                if property.fourcc() == property_type {
                    return Some(property);
                }
            }
        }
        None
    }

    /// All associations for one item, in file order.
    pub fn associations_for_item(&self, item_id: u32) -> Vec<PropertyAssociation> {
        let mut v = Vec::new();
        for ipma in &self.associations {
            for entry in &ipma.entries {
                if entry.item_id == item_id {
                    v.extend(entry.associations.iter().cloned());
                }
            }
        }
        v
    }

    /// All properties associated with one item, resolved.
    pub fn properties_for_item(&self, item_id: u32) -> Vec<(&HeifBox, bool)> {
        self.associations_for_item(item_id)
            .into_iter()
            .filter_map(|a| self.container.get(a.property_index).map(|p| (p, a.essential)))
            .collect()
    }

    /// Add a property and associate it with an item in one go.
    pub fn add_property_for_item(&mut self, item_id: u32, property: HeifBox, essential: bool) -> u16 {
        let index = self.container.add_property(property);
        self.associate(item_id, index, essential);
        index
    }

    pub fn associate(&mut self, item_id: u32, property_index: u16, essential: bool) {
        if self.associations.is_empty() {
            self.associations.push(ItemPropertyAssociation::default());
        }
        self.associations[0].associate(item_id, property_index, essential);
    }
}

impl FromBytes for ItemPropertiesBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ItemPropertiesBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;

        // The first sub-box must be the property container.
        let first = HeifBox::from_bytes(stream)?;
        let container = match first {
            HeifBox::ItemPropertyContainer(c) => c,
            other => {
                return Err(ioerr!(
                    InvalidData,
                    "iprp: expected ipco as first sub-box, got {}",
                    other.fourcc()
                ));
            },
        };

        let mut associations = Vec::new();
        while stream.left() >= 8 {
            match HeifBox::from_bytes(stream)? {
                HeifBox::ItemPropertyAssociation(a) => associations.push(a),
                other => {
                    return Err(ioerr!(
                        InvalidData,
                        "iprp: unexpected sub-box {}",
                        other.fourcc()
                    ));
                },
            }
        }
        if associations.is_empty() {
            return Err(ioerr!(InvalidData, "iprp: no ipma sub-box"));
        }

        Ok(ItemPropertiesBox {
            container,
            associations,
        })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for ItemPropertiesBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        self.container.to_bytes(&mut writer)?;
        for a in &self.associations {
            a.to_bytes(&mut writer)?;
        }
        writer.finalize()
    }
}

impl BoxInfo for ItemPropertiesBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("iprp")
    }
}

impl FullBox for ItemPropertiesBox {}

/// The ordered property container; property indexes are its
/// 1-based positions.
#[derive(Clone, Debug, Default)]
pub struct ItemPropertyContainer {
    pub properties: Vec<HeifBox>,
}

impl ItemPropertyContainer {
    /// Get a property by 1-based index.
    pub fn get(&self, index: u16) -> Option<&HeifBox> {
        if index == 0 {
            return None;
        }
        self.properties.get((index - 1) as usize)
    }

    /// Append a property and return its 1-based index.
    ///
    /// Identical spatial-extents properties are shared: adding an
    /// `ispe` that is already present returns the existing index.
    pub fn add_property(&mut self, property: HeifBox) -> u16 {
        if let HeifBox::ImageSpatialExtentsProperty(ref ispe) = property {
            for (i, p) in self.properties.iter().enumerate() {
                if let HeifBox::ImageSpatialExtentsProperty(existing) = p {
                    if existing.width == ispe.width && existing.height == ispe.height {
                        return (i + 1) as u16;
                    }
                }
            }
        }
        self.properties.push(property);
        self.properties.len() as u16
    }
}

impl FromBytes for ItemPropertyContainer {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ItemPropertyContainer> {
        let mut reader = BoxReader::new(stream)?;
        let properties = Vec::<HeifBox>::from_bytes(&mut reader)?;
        Ok(ItemPropertyContainer { properties })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for ItemPropertyContainer {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        self.properties.to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for ItemPropertyContainer {
    fn fourcc(&self) -> FourCC {
        FourCC::new("ipco")
    }
}

impl FullBox for ItemPropertyContainer {}

/// One association: an essential bit plus a 1-based property index.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyAssociation {
    pub essential:      bool,
    pub property_index: u16,
}

/// Associations of one item.
#[derive(Clone, Debug, Default)]
pub struct ItemPropertyAssociationEntry {
    pub item_id:      u32,
    pub associations: Vec<PropertyAssociation>,
}

/// 8.11.14 Item Property Association box.
///
/// Wire widths: 16-bit item ids in version 0, 32-bit in version 1.
/// Property indexes are 7 bits, or 15 bits when flag bit 0 is set.
/// The essential bit always leads the index field.
#[derive(Clone, Debug, Default)]
pub struct ItemPropertyAssociation {
    pub entries: Vec<ItemPropertyAssociationEntry>,
}

impl ItemPropertyAssociation {
    pub fn associate(&mut self, item_id: u32, property_index: u16, essential: bool) {
        let assoc = PropertyAssociation {
            essential,
            property_index,
        };
        for entry in self.entries.iter_mut() {
            if entry.item_id == item_id {
                if !entry.associations.contains(&assoc) {
                    entry.associations.push(assoc);
                }
                return;
            }
        }
        self.entries.push(ItemPropertyAssociationEntry {
            item_id,
            associations: vec![assoc],
        });
    }

    fn needs_large_ids(&self) -> bool {
        self.entries.iter().any(|e| e.item_id > u16::MAX as u32)
    }

    fn needs_wide_indexes(&self) -> bool {
        self.entries
            .iter()
            .any(|e| e.associations.iter().any(|a| a.property_index > 127))
    }
}

impl FromBytes for ItemPropertyAssociation {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ItemPropertyAssociation> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let version = stream.version();
        let wide_indexes = stream.flags() & 1 != 0;

        let entry_count = u32::from_bytes(stream)?;
        let mut entries = Vec::with_capacity(std::cmp::min(entry_count as usize, 65536));
        for _ in 0..entry_count {
            let item_id = if version == 0 {
                u16::from_bytes(stream)? as u32
            } else {
                u32::from_bytes(stream)?
            };
            let association_count = u8::from_bytes(stream)?;
            let mut associations = Vec::with_capacity(association_count as usize);
            for _ in 0..association_count {
                let (essential, property_index) = if wide_indexes {
                    let v = u16::from_bytes(stream)?;
                    (v & 0x8000 != 0, v & 0x7fff)
                } else {
                    let v = u8::from_bytes(stream)?;
                    (v & 0x80 != 0, (v & 0x7f) as u16)
                };
                associations.push(PropertyAssociation {
                    essential,
                    property_index,
                });
            }
            entries.push(ItemPropertyAssociationEntry {
                item_id,
                associations,
            });
        }

        Ok(ItemPropertyAssociation { entries })
    }

    fn min_size() -> usize {
        16
    }
}

impl ToBytes for ItemPropertyAssociation {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        let large_ids = self.needs_large_ids();
        let wide_indexes = self.needs_wide_indexes();

        (self.entries.len() as u32).to_bytes(stream)?;
        for entry in &self.entries {
            if large_ids {
                entry.item_id.to_bytes(stream)?;
            } else {
                (entry.item_id as u16).to_bytes(stream)?;
            }
            (entry.associations.len() as u8).to_bytes(stream)?;
            for assoc in &entry.associations {
                if wide_indexes {
                    let v = ((assoc.essential as u16) << 15) | (assoc.property_index & 0x7fff);
                    v.to_bytes(stream)?;
                } else {
                    let v = ((assoc.essential as u8) << 7) | (assoc.property_index as u8 & 0x7f);
                    v.to_bytes(stream)?;
                }
            }
        }

        stream.finalize()
    }
}

impl BoxInfo for ItemPropertyAssociation {
    fn fourcc(&self) -> FourCC {
        FourCC::new("ipma")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for ItemPropertyAssociation {
    fn version(&self) -> Option<u8> {
        if self.needs_large_ids() {
            Some(1)
        } else {
            Some(0)
        }
    }
    fn flags(&self) -> u32 {
        self.needs_wide_indexes() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::ImageSpatialExtentsProperty;
    use crate::io::MemBuffer;

    #[test]
    fn ipma_roundtrip_narrow() {
        let mut ipma = ItemPropertyAssociation::default();
        ipma.associate(1, 1, true);
        ipma.associate(1, 2, false);
        ipma.associate(2, 1, true);

        let mut buf = MemBuffer::new();
        ipma.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ItemPropertyAssociation::from_bytes(&mut rd).unwrap();
        assert_eq!(back.entries.len(), 2);
        assert_eq!(back.entries[0].associations.len(), 2);
        assert!(back.entries[0].associations[0].essential);
        assert_eq!(back.entries[0].associations[1].property_index, 2);
    }

    #[test]
    fn ipma_wide_indexes() {
        let mut ipma = ItemPropertyAssociation::default();
        ipma.associate(1, 300, true);
        assert_eq!(ipma.flags(), 1);

        let mut buf = MemBuffer::new();
        ipma.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ItemPropertyAssociation::from_bytes(&mut rd).unwrap();
        assert_eq!(back.entries[0].associations[0].property_index, 300);
        assert!(back.entries[0].associations[0].essential);
    }

    #[test]
    fn ipma_large_item_ids() {
        let mut ipma = ItemPropertyAssociation::default();
        ipma.associate(0x12345, 1, false);
        assert_eq!(ipma.version(), Some(1));

        let mut buf = MemBuffer::new();
        ipma.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ItemPropertyAssociation::from_bytes(&mut rd).unwrap();
        assert_eq!(back.entries[0].item_id, 0x12345);
    }

    #[test]
    fn ipco_shares_identical_ispe() {
        let mut ipco = ItemPropertyContainer::default();
        let a = ipco.add_property(
            ImageSpatialExtentsProperty {
                width: 640,
                height: 480,
            }
            .to_heifbox(),
        );
        let b = ipco.add_property(
            ImageSpatialExtentsProperty {
                width: 640,
                height: 480,
            }
            .to_heifbox(),
        );
        let c = ipco.add_property(
            ImageSpatialExtentsProperty {
                width: 100,
                height: 100,
            }
            .to_heifbox(),
        );
        assert_eq!(a, 1);
        assert_eq!(b, 1);
        assert_eq!(c, 2);
    }
}
