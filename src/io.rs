//! File read/write.
//!
use std::fs;
use std::io::{self, ErrorKind};
use std::os::unix::fs::FileExt;
use std::sync::Arc;

use memmap::{Mmap, MmapOptions};

use crate::serialize::{BoxBytes, FromBytes, ReadBytes, ToBytes, WriteBytes};

struct FileSegment {
    start: u64,
    len:   u64,
    map:   Mmap,
}

/// Reads a HEIF file.
///
/// Implements `ReadBytes`, so it can be passed to `Heif::read`.
///
/// We use `mmap` to read the contents of the file, except for the
/// payload of `mdat` boxes. Those are read on demand through a
/// [`DataRef`], so that we don't map gigabytes of image data.
pub struct HeifFile {
    file:           Arc<fs::File>,
    pos:            u64,
    size:           u64,
    segments:       Vec<FileSegment>,
    input_filename: Option<String>,
}

impl HeifFile {
    /// Open a HEIF file.
    pub fn open(path: impl AsRef<str>) -> io::Result<HeifFile> {
        let path = path.as_ref();
        let file = fs::File::open(path)?;
        let size = file.metadata()?.len();

        // Create a list of segments where we leave out the
        // payload part of MDAT boxes.
        let mut segs = Vec::<(u64, u64)>::new();
        segs.push((0, 0));
        let mut pos = 0;
        while let Some((boxtype, boxpos, boxsize)) = next_box(&file, &mut pos, size)? {
            if &boxtype == b"mdat" {
                segs.last_mut().unwrap().1 += 16;
                segs.push((boxpos + boxsize, 0));
            } else {
                segs.last_mut().unwrap().1 += boxsize;
            }
        }

        // Now mmap those segments.
        let mut segments = Vec::new();
        for seg in &segs {
            if seg.1 == 0 {
                break;
            }
            let map = unsafe {
                MmapOptions::new()
                    .offset(seg.0)
                    .len(seg.1 as usize)
                    .map(&file)?
            };
            segments.push(FileSegment {
                start: seg.0,
                len: seg.1,
                map,
            });
        }

        Ok(HeifFile {
            segments,
            file: Arc::new(file),
            pos: 0,
            size,
            input_filename: Some(path.to_string()),
        })
    }

    #[inline]
    fn map(&self, amount: u64) -> io::Result<(usize, usize)> {
        for idx in 0..self.segments.len() {
            let seg = &self.segments[idx];
            if self.pos >= seg.start && self.pos < seg.start + seg.len {
                if self.pos + amount > seg.start + seg.len {
                    return Err(io::Error::new(
                        ErrorKind::InvalidInput,
                        "tried to read over mapped segment boundary",
                    ));
                }
                let npos = (self.pos - seg.start) as usize;
                return Ok((idx, npos));
            }
        }
        Err(io::Error::new(
            ErrorKind::InvalidInput,
            "read request outside of any mapped segment",
        ))
    }
}

// Walk over the top-level boxes.
fn next_box(file: &fs::File, pos: &mut u64, filesize: u64) -> io::Result<Option<([u8; 4], u64, u64)>> {
    use std::convert::TryInto;
    if *pos + 15 >= filesize {
        return Ok(None);
    }
    let mut buf = [0u8; 16];
    file.read_exact_at(&mut buf[..], *pos)?;
    let boxtype = &buf[4..8];
    let mut boxsize = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as u64;
    if boxsize == 0 {
        boxsize = filesize - *pos;
    } else if boxsize == 1 {
        boxsize = u64::from_be_bytes(buf[8..16].try_into().unwrap());
    }
    let xpos = *pos;
    *pos += boxsize;
    Ok(Some((boxtype.try_into().unwrap(), xpos, boxsize)))
}

impl ReadBytes for HeifFile {
    #[inline]
    fn read(&mut self, amount: u64) -> io::Result<&[u8]> {
        let (seg, offset) = self.map(amount)?;
        self.pos += amount;
        Ok(&self.segments[seg].map[offset..offset + amount as usize])
    }

    #[inline]
    fn peek(&mut self, amount: u64) -> io::Result<&[u8]> {
        let (seg, offset) = self.map(amount)?;
        Ok(&self.segments[seg].map[offset..offset + amount as usize])
    }

    #[inline]
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        if self.pos + amount > self.size {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "tried to seek past eof"));
        }
        self.pos += amount;
        Ok(())
    }

    #[inline]
    fn left(&mut self) -> u64 {
        if self.pos > self.size {
            0
        } else {
            self.size - self.pos
        }
    }
}

impl BoxBytes for HeifFile {
    #[inline]
    fn pos(&mut self) -> u64 {
        self.pos
    }

    #[inline]
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.size {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "tried to seek past eof"));
        }
        self.pos = pos;
        Ok(())
    }

    #[inline]
    fn size(&self) -> u64 {
        self.size
    }

    fn data_ref(&self, size: u64) -> io::Result<DataRef> {
        if self.pos + size > self.size {
            return Err(io::Error::new(ErrorKind::UnexpectedEof, "tried to seek past eof"));
        }
        Ok(DataRef(DataRef_::File {
            file:  self.file.clone(),
            start: self.pos,
            end:   self.pos + size,
        }))
    }

    fn input_filename(&self) -> Option<&str> {
        self.input_filename.as_ref().map(|s| s.as_str())
    }
}

/// Reference to a range of payload bytes.
///
/// The payload of a `MediaDataBox` is not mapped into memory. It is
/// referenced by a `DataRef`, and read on demand with `read_at`.
/// In-memory sources (byte slices, the writer) use the `Mem` variant.
pub struct DataRef(DataRef_);

enum DataRef_ {
    File {
        file:  Arc<fs::File>,
        start: u64,
        end:   u64,
    },
    Mem(Vec<u8>),
}

impl DataRef {
    // This is not the from_bytes from the FromBytes trait, it is
    // a direct method, because it has an extra data_size argument.
    pub(crate) fn from_bytes_limit<R: ReadBytes>(stream: &mut R, data_size: u64) -> io::Result<DataRef> {
        let data_ref = stream.data_ref(data_size)?;
        stream.skip(data_size)?;
        Ok(data_ref)
    }

    pub fn from_vec(data: Vec<u8>) -> DataRef {
        DataRef(DataRef_::Mem(data))
    }

    /// Number of bytes.
    pub fn len(&self) -> u64 {
        match &self.0 {
            DataRef_::File { start, end, .. } => end - start,
            DataRef_::Mem(v) => v.len() as u64,
        }
    }

    /// Does it need a large box.
    pub fn is_large(&self) -> bool {
        self.len() > u32::MAX as u64 - 16
    }

    /// Read a byte range, `offset` relative to the start of this data.
    pub fn read_range(&self, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        if offset + len > self.len() {
            return Err(ioerr!(UnexpectedEof, "DataRef: range past end of data"));
        }
        match &self.0 {
            DataRef_::File { file, start, .. } => {
                let mut buf = vec![0u8; len as usize];
                file.read_exact_at(&mut buf, start + offset)?;
                Ok(buf)
            },
            DataRef_::Mem(v) => Ok(v[offset as usize..(offset + len) as usize].to_vec()),
        }
    }
}

impl FromBytes for DataRef {
    /// from_bytes for DataRef is not implemented, use from_bytes_limit.
    fn from_bytes<R: ReadBytes>(_stream: &mut R) -> io::Result<Self> {
        Err(ioerr!(InvalidInput, "DataRef::from_bytes: use from_bytes_limit"))
    }

    fn min_size() -> usize {
        0
    }
}

impl ToBytes for DataRef {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        match &self.0 {
            DataRef_::File { file, start, end } => {
                let mut buf = vec![0u8; std::cmp::min((end - start) as usize, 128000)];
                let mut pos = *start;
                while pos < *end {
                    let to_read = std::cmp::min(buf.len() as u64, end - pos) as usize;
                    let nread = file.read_at(&mut buf[..to_read], pos)?;
                    if nread == 0 {
                        return Err(io::Error::new(ErrorKind::UnexpectedEof, "Unexpected EOF"));
                    }
                    stream.write(&buf[..nread])?;
                    pos += nread as u64;
                }
                Ok(())
            },
            DataRef_::Mem(v) => stream.write(&v[..]),
        }
    }
}

impl Default for DataRef {
    fn default() -> Self {
        DataRef(DataRef_::Mem(Vec::new()))
    }
}

impl Clone for DataRef {
    fn clone(&self) -> Self {
        match &self.0 {
            DataRef_::File { file, start, end } => DataRef(DataRef_::File {
                file:  file.clone(),
                start: *start,
                end:   *end,
            }),
            DataRef_::Mem(v) => DataRef(DataRef_::Mem(v.clone())),
        }
    }
}

impl std::fmt::Debug for DataRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.0 {
            DataRef_::File { start, end, .. } => {
                write!(f, "DataRef::File{{ start: {}, end: {} }}", start, end)
            },
            DataRef_::Mem(v) => write!(f, "DataRef::Mem[u8; {}]", v.len()),
        }
    }
}

/// In-memory reader with a real position.
///
/// A bare `&[u8]` implements `ReadBytes` too, but it has no position
/// state, so box containers (whose size limits depend on `pos`)
/// cannot be parsed from one. Use a `MemReader` for that.
#[derive(Debug, Default)]
pub struct MemReader {
    data: Vec<u8>,
    pos:  usize,
}

impl MemReader {
    pub fn new(data: Vec<u8>) -> MemReader {
        MemReader { data, pos: 0 }
    }

    pub fn from_slice(data: &[u8]) -> MemReader {
        MemReader {
            data: data.to_vec(),
            pos:  0,
        }
    }
}

impl ReadBytes for MemReader {
    fn read(&mut self, amount: u64) -> io::Result<&[u8]> {
        let amount = if amount == 0 {
            self.data.len() - self.pos
        } else {
            amount as usize
        };
        if self.pos + amount > self.data.len() {
            return Err(ioerr!(UnexpectedEof, "MemReader: read past end"));
        }
        let res = &self.data[self.pos..self.pos + amount];
        self.pos += amount;
        Ok(res)
    }

    fn peek(&mut self, amount: u64) -> io::Result<&[u8]> {
        let amount = amount as usize;
        if self.pos + amount > self.data.len() {
            return Err(ioerr!(UnexpectedEof, "MemReader: peek past end"));
        }
        Ok(&self.data[self.pos..self.pos + amount])
    }

    fn skip(&mut self, amount: u64) -> io::Result<()> {
        if self.pos + amount as usize > self.data.len() {
            return Err(ioerr!(UnexpectedEof, "MemReader: skip past end"));
        }
        self.pos += amount as usize;
        Ok(())
    }

    fn left(&mut self) -> u64 {
        (self.data.len() - self.pos) as u64
    }
}

impl BoxBytes for MemReader {
    fn pos(&mut self) -> u64 {
        self.pos as u64
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos as usize > self.data.len() {
            return Err(ioerr!(UnexpectedEof, "MemReader: seek past end"));
        }
        self.pos = pos as usize;
        Ok(())
    }
    fn size(&self) -> u64 {
        self.data.len() as u64
    }
    fn data_ref(&self, size: u64) -> io::Result<DataRef> {
        let end = std::cmp::min(self.pos + size as usize, self.data.len());
        Ok(DataRef::from_vec(self.data[self.pos..end].to_vec()))
    }
}

/// Count bytes, don't actually write.
#[derive(Debug, Default)]
pub struct CountBytes {
    pos: usize,
    max: usize,
}

impl CountBytes {
    pub fn new() -> CountBytes {
        CountBytes { pos: 0, max: 0 }
    }
}

impl WriteBytes for CountBytes {
    fn write(&mut self, newdata: &[u8]) -> io::Result<()> {
        self.pos += newdata.len();
        if self.max < self.pos {
            self.max = self.pos;
        }
        Ok(())
    }

    fn skip(&mut self, amount: u64) -> io::Result<()> {
        self.pos += amount as usize;
        if self.max < self.pos {
            self.max = self.pos;
        }
        Ok(())
    }
}

impl BoxBytes for CountBytes {
    fn pos(&mut self) -> u64 {
        self.pos as u64
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.pos = pos as usize;
        Ok(())
    }
    fn size(&self) -> u64 {
        self.max as u64
    }
}

/// Memory buffer that implements WriteBytes.
#[derive(Debug, Default)]
pub struct MemBuffer {
    data: Vec<u8>,
    pos:  usize,
}

impl MemBuffer {
    pub fn new() -> MemBuffer {
        MemBuffer {
            data: Vec::new(),
            pos:  0,
        }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl WriteBytes for MemBuffer {
    fn write(&mut self, newdata: &[u8]) -> io::Result<()> {
        let mut newdata = newdata;
        if self.pos < self.data.len() {
            let len = std::cmp::min(self.data.len() - self.pos, newdata.len());
            self.data[self.pos..self.pos + len].copy_from_slice(&newdata[..len]);
            newdata = &newdata[len..];
            self.pos += len;
        }
        if newdata.len() > 0 {
            self.data.extend_from_slice(newdata);
            self.pos = self.data.len();
        }
        Ok(())
    }

    fn skip(&mut self, amount: u64) -> io::Result<()> {
        self.pos += amount as usize;
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }
        Ok(())
    }
}

impl BoxBytes for MemBuffer {
    fn pos(&mut self) -> u64 {
        self.pos as u64
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.pos = pos as usize;
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }
        Ok(())
    }
    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl<B: ?Sized + ReadBytes> ReadBytes for Box<B> {
    fn read(&mut self, amount: u64) -> io::Result<&[u8]> {
        B::read(&mut *self, amount)
    }
    fn peek(&mut self, amount: u64) -> io::Result<&[u8]> {
        B::peek(&mut *self, amount)
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        B::skip(&mut *self, amount)
    }
    fn left(&mut self) -> u64 {
        B::left(&mut *self)
    }
}

impl<B: ?Sized + WriteBytes> WriteBytes for Box<B> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        B::write(&mut *self, data)
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        B::skip(&mut *self, amount)
    }
}

impl<B: ?Sized + BoxBytes> BoxBytes for Box<B> {
    fn pos(&mut self) -> u64 {
        B::pos(&mut *self)
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        B::seek(&mut *self, pos)
    }
    fn size(&self) -> u64 {
        B::size(&*self)
    }
    fn version(&self) -> u8 {
        B::version(&*self)
    }
    fn set_version(&mut self, version: u8) {
        B::set_version(&mut *self, version)
    }
    fn flags(&self) -> u32 {
        B::flags(&*self)
    }
    fn set_flags(&mut self, flags: u32) {
        B::set_flags(&mut *self, flags)
    }
    fn fourcc(&self) -> crate::types::FourCC {
        B::fourcc(&*self)
    }
    fn data_ref(&self, size: u64) -> io::Result<DataRef> {
        B::data_ref(&*self, size)
    }
    fn input_filename(&self) -> Option<&str> {
        B::input_filename(&*self)
    }
}
