use std::fmt;
use std::io;

use crate::boxes::prelude::*;
use crate::io::DataRef;

/// 8.1.1 Media Data Box (ISO/IEC 14496-12:2015(E))
///
/// The payload is not materialized on read: the box records its
/// absolute payload offset and a [`DataRef`] to fetch ranges on
/// demand. When building a file the payload is an in-memory vector.
#[derive(Clone, Debug, Default)]
pub struct MediaDataBox {
    /// Absolute offset of the payload in the source file.
    pub offset: u64,
    pub data:   MediaData,
}

impl MediaDataBox {
    /// Does `[offset, offset+len)` (absolute file range) fall inside
    /// this box's payload?
    pub fn contains(&self, offset: u64, len: u64) -> bool {
        offset >= self.offset && offset + len <= self.offset + self.data.len()
    }

    /// Read a byte range addressed by absolute file offset.
    pub fn read_at(&self, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        if !self.contains(offset, len) {
            return Err(ioerr!(UnexpectedEof, "mdat: range outside payload"));
        }
        self.data.read_range(offset - self.offset, len)
    }
}

impl FromBytes for MediaDataBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<MediaDataBox> {
        let mut reader = BoxReader::new(stream)?;
        let size = reader.left();
        let offset = reader.pos();
        let data_ref = DataRef::from_bytes_limit(&mut reader, size)?;
        Ok(MediaDataBox {
            offset,
            data: MediaData(MediaData_::DataRef(data_ref)),
        })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for MediaDataBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        // Write the header by hand: mdat is the one box that can
        // need the large-size form.
        let fourcc = FourCC::new("mdat");
        let mut box_size = self.data.len() + 8;
        if self.data.is_large() {
            box_size += 8;
            1u32.to_bytes(stream)?;
            fourcc.to_bytes(stream)?;
            box_size.to_bytes(stream)?;
        } else {
            (box_size as u32).to_bytes(stream)?;
            fourcc.to_bytes(stream)?;
        }
        self.data.to_bytes(stream)
    }
}

impl BoxInfo for MediaDataBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("mdat")
    }
}

impl FullBox for MediaDataBox {}

/// Raw media data.
#[derive(Clone)]
pub struct MediaData(MediaData_);

#[derive(Clone)]
enum MediaData_ {
    DataRef(DataRef),
    Data(Vec<u8>),
}

impl MediaData {
    pub fn is_large(&self) -> bool {
        self.len() > (u32::MAX - 20) as u64
    }

    /// Length in bytes.
    pub fn len(&self) -> u64 {
        match &self.0 {
            MediaData_::DataRef(d) => d.len(),
            MediaData_::Data(d) => d.len() as u64,
        }
    }

    /// Add data; returns the offset of the added data within the payload.
    pub fn push(&mut self, data: &[u8]) -> u64 {
        match &mut self.0 {
            &mut MediaData_::DataRef(_) => panic!("cannot push onto MediaData::DataRef"),
            &mut MediaData_::Data(ref mut d) => {
                let offset = d.len() as u64;
                d.extend_from_slice(data);
                offset
            },
        }
    }

    /// Read a byte range, offset relative to the payload start.
    pub fn read_range(&self, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        match &self.0 {
            MediaData_::DataRef(d) => d.read_range(offset, len),
            MediaData_::Data(d) => {
                if offset + len > d.len() as u64 {
                    return Err(ioerr!(UnexpectedEof, "mdat: range past end of payload"));
                }
                Ok(d[offset as usize..(offset + len) as usize].to_vec())
            },
        }
    }
}

impl Default for MediaData {
    fn default() -> MediaData {
        MediaData(MediaData_::Data(Vec::new()))
    }
}

impl fmt::Debug for MediaData {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.0 {
            MediaData_::DataRef(d) => d.fmt(f),
            MediaData_::Data(d) => write!(f, "[u8; {}]", d.len()),
        }
    }
}

impl ToBytes for MediaData {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        match &self.0 {
            MediaData_::DataRef(d) => d.to_bytes(stream),
            MediaData_::Data(d) => stream.write(&d[..]),
        }
    }
}
