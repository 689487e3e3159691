use std::io;

use crate::boxes::prelude::*;

/// 8.9.2 Sample to Group Box (ISO/IEC 14496-12:2015(E))
#[derive(Clone, Debug, Default)]
pub struct SampleToGroupBox {
    pub grouping_type:           FourCC,
    pub grouping_type_parameter: Option<u32>,
    pub entries:                 ArraySized32<SampleToGroupEntry>,
}

def_struct! {
    /// Entry in SampleToGroupBox.
    #[derive(Default)]
    SampleToGroupEntry,
        sample_count:               u32,
        group_description_index:    u32,
}

impl SampleToGroupBox {
    /// The 1-based group description index of a 1-based sample, or 0.
    pub fn group_description_index(&self, sample: u32) -> u32 {
        let mut begin = 1;
        for entry in self.entries.iter() {
            let end = begin + entry.sample_count;
            if sample >= begin && sample < end {
                return entry.group_description_index;
            }
            begin = end;
        }
        0
    }

    /// 1-based sample numbers mapped to the given description index.
    pub fn samples_with_index(&self, group_description_index: u32) -> Vec<u32> {
        let mut v = Vec::new();
        let mut sample = 1;
        for entry in self.entries.iter() {
            for _ in 0..entry.sample_count {
                if entry.group_description_index == group_description_index {
                    v.push(sample);
                }
                sample += 1;
            }
        }
        v
    }
}

impl FromBytes for SampleToGroupBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<SampleToGroupBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let grouping_type = FourCC::from_bytes(stream)?;
        let grouping_type_parameter = if stream.version() == 1 {
            Some(u32::from_bytes(stream)?)
        } else {
            None
        };
        let entries = ArraySized32::<SampleToGroupEntry>::from_bytes(stream)?;
        Ok(SampleToGroupBox {
            grouping_type,
            grouping_type_parameter,
            entries,
        })
    }

    fn min_size() -> usize {
        20
    }
}

impl ToBytes for SampleToGroupBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let stream = &mut writer;

        self.grouping_type.to_bytes(stream)?;
        if let Some(param) = self.grouping_type_parameter {
            param.to_bytes(stream)?;
        }
        self.entries.to_bytes(stream)?;

        stream.finalize()
    }
}

impl BoxInfo for SampleToGroupBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("sbgp")
    }
    fn max_version() -> Option<u8> {
        Some(1)
    }
}

impl FullBox for SampleToGroupBox {
    fn version(&self) -> Option<u8> {
        if self.grouping_type_parameter.is_some() {
            Some(1)
        } else {
            Some(0)
        }
    }
}
