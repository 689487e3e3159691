use std::io;

use crate::boxes::prelude::*;

/// How an item location's extents are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructionMethod {
    /// Absolute byte position in the enclosing file.
    FileOffset,
    /// Offset into the ItemDataBox payload.
    IdatOffset,
    /// Offset relative to another item.
    ItemOffset,
}

impl Default for ConstructionMethod {
    fn default() -> Self {
        ConstructionMethod::FileOffset
    }
}

impl ConstructionMethod {
    fn from_u8(value: u8) -> io::Result<ConstructionMethod> {
        match value {
            0 => Ok(ConstructionMethod::FileOffset),
            1 => Ok(ConstructionMethod::IdatOffset),
            2 => Ok(ConstructionMethod::ItemOffset),
            other => Err(ioerr!(InvalidData, "iloc: unknown construction method {}", other)),
        }
    }

    fn to_u8(self) -> u8 {
        match self {
            ConstructionMethod::FileOffset => 0,
            ConstructionMethod::IdatOffset => 1,
            ConstructionMethod::ItemOffset => 2,
        }
    }
}

/// One extent of an item location.
#[derive(Clone, Debug, Default)]
pub struct ItemLocationExtent {
    pub index:  u64,
    pub offset: u64,
    pub length: u64,
}

/// The location of one item's data.
#[derive(Clone, Debug, Default)]
pub struct ItemLocation {
    pub item_id:              u32,
    pub construction_method:  ConstructionMethod,
    pub data_reference_index: u16,
    pub base_offset:          u64,
    pub extents:              Vec<ItemLocationExtent>,
}

/// 8.11.3 Item Location Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct ItemLocationBox {
    pub locations: Vec<ItemLocation>,
}

impl ItemLocationBox {
    pub fn location_by_id(&self, item_id: u32) -> Option<&ItemLocation> {
        self.locations.iter().find(|l| l.item_id == item_id)
    }

    pub fn location_by_id_mut(&mut self, item_id: u32) -> Option<&mut ItemLocation> {
        self.locations.iter_mut().find(|l| l.item_id == item_id)
    }

    pub fn has_item(&self, item_id: u32) -> bool {
        self.location_by_id(item_id).is_some()
    }

    pub fn add_location(&mut self, location: ItemLocation) {
        self.locations.push(location);
    }

    fn needs_large_ids(&self) -> bool {
        self.locations.iter().any(|l| l.item_id > u16::MAX as u32)
    }

    fn needs_construction_method(&self) -> bool {
        self.locations
            .iter()
            .any(|l| l.construction_method != ConstructionMethod::FileOffset)
    }
}

// Read an unsigned integer of 0, 4 or 8 bytes.
fn read_sized<R: ReadBytes>(stream: &mut R, size: u8) -> io::Result<u64> {
    match size {
        0 => Ok(0),
        4 => Ok(u32::from_bytes(stream)? as u64),
        8 => u64::from_bytes(stream),
        other => Err(ioerr!(InvalidData, "iloc: unsupported field size {}", other)),
    }
}

fn write_sized<W: WriteBytes>(stream: &mut W, size: u8, value: u64) -> io::Result<()> {
    match size {
        0 => Ok(()),
        4 => (value as u32).to_bytes(stream),
        8 => value.to_bytes(stream),
        other => Err(ioerr!(InvalidData, "iloc: unsupported field size {}", other)),
    }
}

impl FromBytes for ItemLocationBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ItemLocationBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let version = stream.version();

        let sizes = u16::from_bytes(stream)?;
        let offset_size = ((sizes >> 12) & 0xf) as u8;
        let length_size = ((sizes >> 8) & 0xf) as u8;
        let base_offset_size = ((sizes >> 4) & 0xf) as u8;
        let index_size = if version >= 1 { (sizes & 0xf) as u8 } else { 0 };

        let item_count = if version < 2 {
            u16::from_bytes(stream)? as u32
        } else {
            u32::from_bytes(stream)?
        };

        let mut locations = Vec::with_capacity(std::cmp::min(item_count as usize, 65536));
        for _ in 0..item_count {
            let item_id = if version < 2 {
                u16::from_bytes(stream)? as u32
            } else {
                u32::from_bytes(stream)?
            };
            let construction_method = if version >= 1 {
                let value = u16::from_bytes(stream)?;
                ConstructionMethod::from_u8((value & 0xf) as u8)?
            } else {
                ConstructionMethod::FileOffset
            };
            let data_reference_index = u16::from_bytes(stream)?;
            let base_offset = read_sized(stream, base_offset_size)?;
            let extent_count = u16::from_bytes(stream)?;
            if extent_count == 0 {
                return Err(ioerr!(InvalidData, "iloc: item {} has no extents", item_id));
            }
            let mut extents = Vec::with_capacity(extent_count as usize);
            for _ in 0..extent_count {
                let index = if version >= 1 && index_size > 0 {
                    read_sized(stream, index_size)?
                } else {
                    0
                };
                let offset = read_sized(stream, offset_size)?;
                let length = read_sized(stream, length_size)?;
                extents.push(ItemLocationExtent {
                    index,
                    offset,
                    length,
                });
            }
            locations.push(ItemLocation {
                item_id,
                construction_method,
                data_reference_index,
                base_offset,
                extents,
            });
        }

        Ok(ItemLocationBox { locations })
    }

    fn min_size() -> usize {
        16
    }
}

impl ToBytes for ItemLocationBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        let version = self.version().unwrap_or(0);

        let large = |v: u64| v > u32::MAX as u64;
        let offset_size: u8 = if self
            .locations
            .iter()
            .any(|l| l.extents.iter().any(|e| large(e.offset)))
        {
            8
        } else {
            4
        };
        let length_size: u8 = if self
            .locations
            .iter()
            .any(|l| l.extents.iter().any(|e| large(e.length)))
        {
            8
        } else {
            4
        };
        let base_offset_size: u8 = if self.locations.iter().any(|l| large(l.base_offset)) {
            8
        } else {
            4
        };
        let index_size: u8 = if version >= 1
            && self
                .locations
                .iter()
                .any(|l| l.extents.iter().any(|e| e.index != 0))
        {
            4
        } else {
            0
        };

        let sizes: u16 = ((offset_size as u16) << 12)
            | ((length_size as u16) << 8)
            | ((base_offset_size as u16) << 4)
            | (index_size as u16);
        sizes.to_bytes(stream)?;

        if version < 2 {
            (self.locations.len() as u16).to_bytes(stream)?;
        } else {
            (self.locations.len() as u32).to_bytes(stream)?;
        }

        for location in &self.locations {
            if location.extents.is_empty() {
                return Err(ioerr!(InvalidData, "iloc: item {} has no extents", location.item_id));
            }
            if version < 2 {
                (location.item_id as u16).to_bytes(stream)?;
            } else {
                location.item_id.to_bytes(stream)?;
            }
            if version >= 1 {
                (location.construction_method.to_u8() as u16).to_bytes(stream)?;
            }
            location.data_reference_index.to_bytes(stream)?;
            write_sized(stream, base_offset_size, location.base_offset)?;
            (location.extents.len() as u16).to_bytes(stream)?;
            for extent in &location.extents {
                if index_size > 0 {
                    write_sized(stream, index_size, extent.index)?;
                }
                write_sized(stream, offset_size, extent.offset)?;
                write_sized(stream, length_size, extent.length)?;
            }
        }

        stream.finalize()
    }
}

impl BoxInfo for ItemLocationBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("iloc")
    }
    fn max_version() -> Option<u8> {
        Some(2)
    }
}

impl FullBox for ItemLocationBox {
    fn version(&self) -> Option<u8> {
        if self.needs_large_ids() {
            Some(2)
        } else if self.needs_construction_method() {
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

    fn roundtrip(iloc: &ItemLocationBox) -> ItemLocationBox {
        let mut buf = MemBuffer::new();
        iloc.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        ItemLocationBox::from_bytes(&mut rd).unwrap()
    }

    #[test]
    fn simple_roundtrip() {
        let mut iloc = ItemLocationBox::default();
        iloc.add_location(ItemLocation {
            item_id: 1,
            construction_method: ConstructionMethod::FileOffset,
            data_reference_index: 0,
            base_offset: 4242,
            extents: vec![ItemLocationExtent {
                index: 0,
                offset: 0,
                length: 14213,
            }],
        });
        let back = roundtrip(&iloc);
        assert_eq!(back.locations.len(), 1);
        let l = &back.locations[0];
        assert_eq!(l.item_id, 1);
        assert_eq!(l.base_offset, 4242);
        assert_eq!(l.extents[0].length, 14213);
        assert_eq!(l.construction_method, ConstructionMethod::FileOffset);
    }

    #[test]
    fn idat_offset_gets_version_1() {
        let mut iloc = ItemLocationBox::default();
        iloc.add_location(ItemLocation {
            item_id: 7,
            construction_method: ConstructionMethod::IdatOffset,
            data_reference_index: 0,
            base_offset: 0,
            extents: vec![ItemLocationExtent {
                index: 0,
                offset: 16,
                length: 10,
            }],
        });
        assert_eq!(iloc.version(), Some(1));
        let back = roundtrip(&iloc);
        assert_eq!(back.locations[0].construction_method, ConstructionMethod::IdatOffset);
    }

    #[test]
    fn large_offsets_use_8_byte_fields() {
        let mut iloc = ItemLocationBox::default();
        iloc.add_location(ItemLocation {
            item_id: 1,
            construction_method: ConstructionMethod::FileOffset,
            data_reference_index: 0,
            base_offset: 0x1_0000_0000,
            extents: vec![ItemLocationExtent {
                index: 0,
                offset: 0x2_0000_0000,
                length: 9,
            }],
        });
        let back = roundtrip(&iloc);
        assert_eq!(back.locations[0].base_offset, 0x1_0000_0000);
        assert_eq!(back.locations[0].extents[0].offset, 0x2_0000_0000);
    }

    #[test]
    fn empty_extent_list_is_rejected() {
        let mut iloc = ItemLocationBox::default();
        iloc.add_location(ItemLocation {
            item_id: 1,
            ..ItemLocation::default()
        });
        let mut buf = MemBuffer::new();
        assert!(iloc.to_bytes(&mut buf).is_err());
    }
}
