//
// ISO/IEC 14496-12:2015(E)
// 8.9.3 Sample Group Description Box
//

use std::fmt::Debug;
use std::io;

use crate::boxes::prelude::*;

/// 8.9.3 Sample Group Description Box
#[derive(Clone, Debug)]
pub struct SampleGroupDescriptionBox {
    pub grouping_type:  FourCC,
    pub default_length: Option<u32>,
    pub default_sample_description_index: Option<u32>,
    pub entries:        Vec<SampleGroupDescriptionItem>,
}

impl Default for SampleGroupDescriptionBox {
    fn default() -> SampleGroupDescriptionBox {
        SampleGroupDescriptionBox {
            grouping_type: FourCC::new("refs"),
            default_length: None,
            default_sample_description_index: None,
            entries: Vec::new(),
        }
    }
}

impl SampleGroupDescriptionBox {
    /// Get an entry by 1-based group description index.
    pub fn entry(&self, group_description_index: u32) -> Option<&SampleGroupDescriptionEntry> {
        if group_description_index == 0 {
            return None;
        }
        self.entries
            .get((group_description_index - 1) as usize)
            .map(|item| &item.entry)
    }
}

impl FromBytes for SampleGroupDescriptionBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleGroupDescriptionBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;

        let version = stream.version();

        let grouping_type = FourCC::from_bytes(stream)?;
        let default_length = if version == 1 {
            Some(u32::from_bytes(stream)?)
        } else {
            None
        };
        let default_sample_description_index = if version >= 2 {
            Some(u32::from_bytes(stream)?)
        } else {
            None
        };

        let num_entries = u32::from_bytes(stream)? as usize;
        let mut entries = Vec::new();
        while entries.len() < num_entries && stream.left() > 0 {
            let entry =
                SampleGroupDescriptionItem::from_bytes(stream, grouping_type, default_length)?;
            entries.push(entry);
        }

        Ok(SampleGroupDescriptionBox {
            grouping_type,
            default_length,
            default_sample_description_index,
            entries,
        })
    }

    fn min_size() -> usize {
        20
    }
}

impl ToBytes for SampleGroupDescriptionBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        if self.entries.is_empty() {
            return Err(ioerr!(InvalidData, "sgpd: refusing to write an empty box"));
        }
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        let version = stream.version();

        self.grouping_type.to_bytes(stream)?;
        if version == 1 {
            self.default_length.unwrap_or(0).to_bytes(stream)?;
        }
        if version >= 2 {
            self.default_sample_description_index
                .unwrap_or(0)
                .to_bytes(stream)?;
        }

        (self.entries.len() as u32).to_bytes(stream)?;
        for e in &self.entries {
            e.to_bytes(stream, self.default_length)?;
        }

        stream.finalize()
    }
}

impl BoxInfo for SampleGroupDescriptionBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("sgpd")
    }
    fn max_version() -> Option<u8> {
        Some(2)
    }
}

impl FullBox for SampleGroupDescriptionBox {
    fn version(&self) -> Option<u8> {
        if self.default_sample_description_index.is_some() {
            return Some(2);
        }
        if self.default_length.is_some() {
            return Some(1);
        }
        Some(0)
    }
}

/// One entry of the SampleGroupDescriptionBox.
#[derive(Clone, Debug)]
pub struct SampleGroupDescriptionItem {
    pub description_length: Option<u32>,
    pub entry: SampleGroupDescriptionEntry,
}

impl SampleGroupDescriptionItem {
    fn from_bytes<R: ReadBytes>(
        stream: &mut R,
        grouping_type: FourCC,
        default_length: Option<u32>,
    ) -> io::Result<SampleGroupDescriptionItem> {
        let mut description_length = None;
        if stream.version() == 1 && default_length.unwrap_or(0) == 0 {
            description_length = Some(u32::from_bytes(stream)?);
        }
        let length = description_length.or(default_length).filter(|&l| l > 0);
        let entry = SampleGroupDescriptionEntry::from_bytes(stream, grouping_type, length)?;
        Ok(SampleGroupDescriptionItem {
            description_length,
            entry,
        })
    }

    fn to_bytes<W: WriteBytes>(&self, stream: &mut W, default_length: Option<u32>) -> io::Result<()> {
        let version = stream.version();

        if version == 1 && default_length.unwrap_or(0) == 0 {
            let mut cb = crate::io::CountBytes::new();
            self.entry.to_bytes(&mut cb)?;
            (cb.size() as u32).to_bytes(stream)?;
        }
        self.entry.to_bytes(stream)
    }
}

/// Generic (i.e. unrecognized) sample group entry.
#[derive(Clone, Debug)]
pub struct GenericSampleGroupEntry {
    pub data: Data,
}

impl GenericSampleGroupEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R, length: Option<u32>) -> io::Result<GenericSampleGroupEntry> {
        // Bounded by the description length if we have one, otherwise
        // the entry takes the rest of the box.
        let data = match length {
            Some(len) => Data::read(stream, len as usize)?,
            None => Data::from_bytes(stream)?,
        };
        Ok(GenericSampleGroupEntry { data })
    }
}

impl ToBytes for GenericSampleGroupEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.data.to_bytes(stream)
    }
}

macro_rules! sample_group_description_entries {
    ($($fourcc:expr => $name:ident,)*) => {

        #[derive(Clone, Debug)]
        pub enum SampleGroupDescriptionEntry {
            $(
                $name($name),
            )*
            GenericSampleGroupEntry(GenericSampleGroupEntry),
        }

        impl SampleGroupDescriptionEntry {
            fn from_bytes<R: ReadBytes>(stream: &mut R, grouping_type: FourCC, length: Option<u32>) -> io::Result<SampleGroupDescriptionEntry> {
                let b = grouping_type.to_be_bytes();
                let e = match std::str::from_utf8(&b[..]).unwrap_or("") {
                    $(
                        $fourcc => {
                            SampleGroupDescriptionEntry::$name($name::from_bytes(stream)?)
                        },
                    )*
                    _ => SampleGroupDescriptionEntry::GenericSampleGroupEntry(GenericSampleGroupEntry::from_bytes(stream, length)?),
                };
                Ok(e)
            }
        }

        impl ToBytes for SampleGroupDescriptionEntry {
            fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
                match self {
                    $(
                        &SampleGroupDescriptionEntry::$name(ref b) => b.to_bytes(stream),
                    )*
                    &SampleGroupDescriptionEntry::GenericSampleGroupEntry(ref b) => b.to_bytes(stream),
                }
            }
        }
    };
}

sample_group_description_entries! {
    "refs" => DirectReferenceSamplesList,
}

/// DirectReferenceSamplesList ('refs', ISO/IEC 23008-12).
///
/// For one sample: its id, and the ids of the samples it directly
/// references.
#[derive(Clone, Debug, Default)]
pub struct DirectReferenceSamplesList {
    pub sample_id:                   u32,
    pub direct_reference_sample_ids: Vec<u32>,
}

impl FromBytes for DirectReferenceSamplesList {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<DirectReferenceSamplesList> {
        let sample_id = u32::from_bytes(stream)?;
        let count = u8::from_bytes(stream)?;
        let mut direct_reference_sample_ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            direct_reference_sample_ids.push(u32::from_bytes(stream)?);
        }
        Ok(DirectReferenceSamplesList {
            sample_id,
            direct_reference_sample_ids,
        })
    }

    fn min_size() -> usize {
        5
    }
}

impl ToBytes for DirectReferenceSamplesList {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.sample_id.to_bytes(stream)?;
        (self.direct_reference_sample_ids.len() as u8).to_bytes(stream)?;
        for id in &self.direct_reference_sample_ids {
            id.to_bytes(stream)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    #[test]
    fn refs_entry_roundtrip() {
        let mut sgpd = SampleGroupDescriptionBox::default();
        sgpd.entries.push(SampleGroupDescriptionItem {
            description_length: None,
            entry: SampleGroupDescriptionEntry::DirectReferenceSamplesList(
                DirectReferenceSamplesList {
                    sample_id: 1,
                    direct_reference_sample_ids: vec![2, 3],
                },
            ),
        });

        let mut buf = MemBuffer::new();
        sgpd.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = SampleGroupDescriptionBox::from_bytes(&mut rd).unwrap();
        assert_eq!(back.grouping_type, b"refs");
        match back.entry(1).unwrap() {
            SampleGroupDescriptionEntry::DirectReferenceSamplesList(refs) => {
                assert_eq!(refs.sample_id, 1);
                assert_eq!(refs.direct_reference_sample_ids, vec![2, 3]);
            },
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn empty_sgpd_is_refused() {
        let sgpd = SampleGroupDescriptionBox::default();
        let mut buf = MemBuffer::new();
        assert!(sgpd.to_bytes(&mut buf).is_err());
    }
}
