use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.7.1 Data Information Box (ISO/IEC 14496-12:2015(E))
    DataInformationBox {
        boxes:      Vec<HeifBox>,
    },
    fourcc => "dinf",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl Default for DataInformationBox {
    /// A dref with one self-contained url entry.
    fn default() -> DataInformationBox {
        DataInformationBox {
            boxes: vec![DataReferenceBox::default().to_heifbox()],
        }
    }
}

def_box! {
    /// 8.7.2 Data Reference Box (ISO/IEC 14496-12:2015(E))
    DataReferenceBox {
        entries:        ArraySized32<HeifBox>,
    },
    fourcc => "dref",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl Default for DataReferenceBox {
    fn default() -> DataReferenceBox {
        let mut entries = ArraySized32::new();
        entries.push(DataEntryUrlBox::default().to_heifbox());
        DataReferenceBox { entries }
    }
}

/// 8.7.2 Data Entry Url Box (ISO/IEC 14496-12:2015(E))
///
/// The location is elided when flag bit 0 (self-contained) is set.
#[derive(Clone, Debug, Default)]
pub struct DataEntryUrlBox {
    pub flags:    DataEntryFlags,
    pub location: Option<ZString>,
}

impl FromBytes for DataEntryUrlBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<DataEntryUrlBox> {
        let mut reader = BoxReader::new(stream)?;
        let stream = &mut reader;
        let flags = DataEntryFlags(stream.flags());
        let location = if flags.get_in_same_file() {
            None
        } else {
            Some(ZString::from_bytes(stream)?)
        };
        Ok(DataEntryUrlBox { flags, location })
    }

    fn min_size() -> usize {
        12
    }
}

impl ToBytes for DataEntryUrlBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        if !self.flags.get_in_same_file() {
            if let Some(location) = self.location.as_ref() {
                location.to_bytes(&mut writer)?;
            }
        }
        writer.finalize()
    }
}

impl BoxInfo for DataEntryUrlBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("url ")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for DataEntryUrlBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
    fn flags(&self) -> u32 {
        self.flags.0
    }
}

def_box! {
    /// 8.7.2 Data Entry Urn Box (ISO/IEC 14496-12:2015(E))
    DataEntryUrnBox {
        flags:          DataEntryFlags,
        name:           ZString,
        location:       ZString,
    },
    fourcc => "urn ",
    version => [0, flags],
    impls => [ boxinfo, debug, fromtobytes ],
}

impl FullBox for DataEntryUrnBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
    fn flags(&self) -> u32 {
        self.flags.0
    }
}

impl_flags!(
    /// 0x01 if the data is in the same file (default).
    DataEntryFlags
);

impl DataEntryFlags {
    pub fn get_in_same_file(&self) -> bool {
        self.get(0)
    }
    pub fn set_in_same_file(&mut self, on: bool) {
        self.set(0, on)
    }
}

impl std::fmt::Debug for DataEntryFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut v = vec!["["];
        if self.get_in_same_file() {
            v.push("in_same_file");
        }
        v.push("]");
        write!(f, "DataEntryFlags({})", v.join(" "))
    }
}

impl Default for DataEntryFlags {
    fn default() -> Self {
        Self(0x01)
    }
}
