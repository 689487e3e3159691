use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.6.5 Edit Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    EditBox {
        boxes:  Vec<HeifBox>,
    },
    fourcc => "edts",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

/// Edit list flags. Bit 0 marks the list as repeating (looping).
impl_flags!(EditListFlags);

impl EditListFlags {
    pub fn get_looping(&self) -> bool {
        self.get(0)
    }
    pub fn set_looping(&mut self, on: bool) {
        self.set(0, on)
    }
}

impl Default for EditListFlags {
    fn default() -> EditListFlags {
        EditListFlags(0)
    }
}

impl std::fmt::Debug for EditListFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "EditListFlags({:#x})", self.0)
    }
}

def_box! {
    /// 8.6.6 Edit List Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    EditListBox {
        flags:      EditListFlags,
        entries:    ArraySized32<EditListEntry>,
    },
    fourcc => "elst",
    version => [1, flags, entries],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// Entry in an edit list.
#[derive(Clone, Debug, Default)]
pub struct EditListEntry {
    pub segment_duration:   u64,
    pub media_time:         i64,
    pub media_rate_integer: u16,
    pub media_rate_fraction: u16,
}

impl EditListEntry {
    /// An empty edit: nothing is presented for the segment duration.
    pub fn is_empty_edit(&self) -> bool {
        self.media_time == -1
    }

    /// A dwell edit: one sample is shown for the segment duration.
    pub fn is_dwell_edit(&self) -> bool {
        self.media_rate_integer == 0
    }
}

impl FromBytes for EditListEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<Self> {
        let entry = if stream.version() == 0 {
            EditListEntry {
                segment_duration: u32::from_bytes(stream)? as u64,
                media_time: i32::from_bytes(stream)? as i64,
                media_rate_integer: u16::from_bytes(stream)?,
                media_rate_fraction: u16::from_bytes(stream)?,
            }
        } else {
            EditListEntry {
                segment_duration: u64::from_bytes(stream)?,
                media_time: i64::from_bytes(stream)?,
                media_rate_integer: u16::from_bytes(stream)?,
                media_rate_fraction: u16::from_bytes(stream)?,
            }
        };
        Ok(entry)
    }

    fn min_size() -> usize {
        12
    }
}

impl ToBytes for EditListEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        if stream.version() == 0 {
            (self.segment_duration as u32).to_bytes(stream)?;
            (self.media_time as i32).to_bytes(stream)?;
        } else {
            self.segment_duration.to_bytes(stream)?;
            self.media_time.to_bytes(stream)?;
        }
        self.media_rate_integer.to_bytes(stream)?;
        self.media_rate_fraction.to_bytes(stream)?;
        Ok(())
    }
}

impl FullBox for EditListEntry {
    fn version(&self) -> Option<u8> {
        if self.segment_duration > 0xffffffff
            || self.media_time < -0x7fffffff
            || self.media_time > 0x7fffffff
        {
            Some(1)
        } else {
            Some(0)
        }
    }
}
