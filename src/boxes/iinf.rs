use std::io;

use crate::boxes::prelude::*;

/// 8.11.6 Item Information Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct ItemInfoBox {
    pub entries: Vec<ItemInfoEntry>,
}

impl ItemInfoBox {
    pub fn entry_by_id(&self, item_id: u32) -> Option<&ItemInfoEntry> {
        self.entries.iter().find(|e| e.item_id == item_id)
    }

    pub fn entry_by_id_mut(&mut self, item_id: u32) -> Option<&mut ItemInfoEntry> {
        self.entries.iter_mut().find(|e| e.item_id == item_id)
    }

    /// Item ids of all entries with the given item type.
    pub fn item_ids_of_type(&self, item_type: FourCC) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|e| e.item_type == item_type)
            .map(|e| e.item_id)
            .collect()
    }

    pub fn add_entry(&mut self, entry: ItemInfoEntry) {
        self.entries.push(entry);
    }
}

impl FromBytes for ItemInfoBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ItemInfoBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let entry_count = if stream.version() == 0 {
            u16::from_bytes(stream)? as u32
        } else {
            u32::from_bytes(stream)?
        };
        let mut entries = Vec::with_capacity(std::cmp::min(entry_count as usize, 65536));
        for _ in 0..entry_count {
            if stream.left() < 8 {
                break;
            }
            entries.push(ItemInfoEntry::from_bytes(stream)?);
        }
        Ok(ItemInfoBox { entries })
    }

    fn min_size() -> usize {
        14
    }
}

impl ToBytes for ItemInfoBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;
        if self.version() == Some(0) {
            (self.entries.len() as u16).to_bytes(stream)?;
        } else {
            (self.entries.len() as u32).to_bytes(stream)?;
        }
        for entry in &self.entries {
            entry.to_bytes(stream)?;
        }
        stream.finalize()
    }
}

impl BoxInfo for ItemInfoBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("iinf")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for ItemInfoBox {
    fn version(&self) -> Option<u8> {
        if self.entries.len() > u16::MAX as usize {
            Some(1)
        } else {
            Some(0)
        }
    }
}

/// FD item information extension (`infe` version 1).
#[derive(Clone, Debug, Default)]
pub struct FdItemInfoExtension {
    pub content_location: ZString,
    pub content_md5:      ZString,
    pub content_length:   u64,
    pub transfer_length:  u64,
    pub group_ids:        Vec<u32>,
}

impl FdItemInfoExtension {
    fn parse<R: ReadBytes>(stream: &mut R) -> io::Result<FdItemInfoExtension> {
        let content_location = ZString::from_bytes(stream)?;
        let content_md5 = ZString::from_bytes(stream)?;
        let content_length = u64::from_bytes(stream)?;
        let transfer_length = u64::from_bytes(stream)?;
        let count = u8::from_bytes(stream)?;
        let mut group_ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            group_ids.push(u32::from_bytes(stream)?);
        }
        Ok(FdItemInfoExtension {
            content_location,
            content_md5,
            content_length,
            transfer_length,
            group_ids,
        })
    }

    fn write<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.content_location.to_bytes(stream)?;
        self.content_md5.to_bytes(stream)?;
        self.content_length.to_bytes(stream)?;
        self.transfer_length.to_bytes(stream)?;
        (self.group_ids.len() as u8).to_bytes(stream)?;
        for id in &self.group_ids {
            id.to_bytes(stream)?;
        }
        Ok(())
    }
}

/// 8.11.6 Item Information Entry (ISO/IEC 14496-12:2015(E))
///
/// Versions 0 and 1 have no item type; version 1 adds the FD extension.
/// Versions 2 and 3 carry the 4cc item type; version 3 has 32-bit ids.
#[derive(Clone, Debug, Default)]
pub struct ItemInfoEntry {
    pub flags:                 Flags,
    pub item_id:               u32,
    pub item_protection_index: u16,
    pub item_type:             FourCC,
    pub item_name:             ZString,
    pub content_type:          ZString,
    pub content_encoding:      ZString,
    pub item_uri_type:         ZString,
    pub extension_type:        u32,
    pub extension:             Option<FdItemInfoExtension>,
}

impl ItemInfoEntry {
    /// Flag bit 0 marks the item as hidden.
    pub fn is_hidden(&self) -> bool {
        self.flags.get(0)
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.flags.set(0, hidden);
    }
}

impl FromBytes for ItemInfoEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ItemInfoEntry> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let version = stream.version();

        let mut entry = ItemInfoEntry::default();
        entry.flags = Flags(stream.flags());

        match version {
            0 | 1 => {
                entry.item_id = u16::from_bytes(stream)? as u32;
                entry.item_protection_index = u16::from_bytes(stream)?;
                entry.item_name = ZString::from_bytes(stream)?;
                if stream.left() > 0 {
                    entry.content_type = ZString::from_bytes(stream)?;
                }
                if stream.left() > 0 {
                    entry.content_encoding = ZString::from_bytes(stream)?;
                }
                if version == 1 && stream.left() >= 4 {
                    entry.extension_type = u32::from_bytes(stream)?;
                    entry.extension = Some(FdItemInfoExtension::parse(stream)?);
                }
            },
            2 | 3 => {
                entry.item_id = if version == 2 {
                    u16::from_bytes(stream)? as u32
                } else {
                    u32::from_bytes(stream)?
                };
                entry.item_protection_index = u16::from_bytes(stream)?;
                entry.item_type = FourCC::from_bytes(stream)?;
                entry.item_name = ZString::from_bytes(stream)?;
                if entry.item_type == b"mime" {
                    entry.content_type = ZString::from_bytes(stream)?;
                    if stream.left() > 0 {
                        entry.content_encoding = ZString::from_bytes(stream)?;
                    }
                } else if entry.item_type == b"uri " {
                    entry.item_uri_type = ZString::from_bytes(stream)?;
                }
            },
            other => {
                return Err(ioerr!(InvalidData, "infe: no support for version {}", other));
            },
        }

        Ok(entry)
    }

    fn min_size() -> usize {
        16
    }
}

impl ToBytes for ItemInfoEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        if self.item_id > u16::MAX as u32 {
            self.item_id.to_bytes(stream)?;
        } else {
            (self.item_id as u16).to_bytes(stream)?;
        }
        self.item_protection_index.to_bytes(stream)?;
        self.item_type.to_bytes(stream)?;
        self.item_name.to_bytes(stream)?;
        if self.item_type == b"mime" {
            self.content_type.to_bytes(stream)?;
            if self.content_encoding.len() > 0 {
                self.content_encoding.to_bytes(stream)?;
            }
        } else if self.item_type == b"uri " {
            self.item_uri_type.to_bytes(stream)?;
        }

        stream.finalize()
    }
}

impl BoxInfo for ItemInfoEntry {
    fn fourcc(&self) -> FourCC {
        FourCC::new("infe")
    }
    fn max_version() -> Option<u8> {
        Some(3)
    }
}

impl FullBox for ItemInfoEntry {
    fn version(&self) -> Option<u8> {
        if self.item_id > u16::MAX as u32 {
            Some(3)
        } else {
            Some(2)
        }
    }
    fn flags(&self) -> u32 {
        self.flags.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    #[test]
    fn infe_v2_roundtrip() {
        let mut entry = ItemInfoEntry::default();
        entry.item_id = 1;
        entry.item_type = FourCC::new("hvc1");
        entry.item_name = ZString::new("image");
        entry.set_hidden(true);

        let mut buf = MemBuffer::new();
        entry.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ItemInfoEntry::from_bytes(&mut rd).unwrap();
        assert_eq!(back.item_id, 1);
        assert_eq!(back.item_type, b"hvc1");
        assert_eq!(back.item_name.as_str(), "image");
        assert!(back.is_hidden());
    }

    #[test]
    fn infe_mime_strings() {
        let mut entry = ItemInfoEntry::default();
        entry.item_id = 2;
        entry.item_type = FourCC::new("mime");
        entry.content_type = ZString::new("application/rdf+xml");

        let mut buf = MemBuffer::new();
        entry.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ItemInfoEntry::from_bytes(&mut rd).unwrap();
        assert_eq!(back.content_type.as_str(), "application/rdf+xml");
    }

    #[test]
    fn iinf_roundtrip() {
        let mut iinf = ItemInfoBox::default();
        for id in 1..=3 {
            let mut entry = ItemInfoEntry::default();
            entry.item_id = id;
            entry.item_type = FourCC::new("hvc1");
            iinf.add_entry(entry);
        }
        let mut buf = MemBuffer::new();
        iinf.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = ItemInfoBox::from_bytes(&mut rd).unwrap();
        assert_eq!(back.entries.len(), 3);
        assert_eq!(back.item_ids_of_type(FourCC::new("hvc1")), vec![1, 2, 3]);
    }
}
