//! Box header framing: BoxHeader, BoxReader, BoxWriter.
//!
//! Every box starts with a 32 bit size and a FourCC type. A size of `1`
//! means an 8-byte "largesize" follows the type. Type `uuid` means a
//! 16-byte user type follows the (large)size. FullBoxes carry one more
//! byte of version plus 24 bits of flags.
//!
//! `BoxReader` reads the header and then acts as a size-limited stream
//! over the box body. `BoxWriter` writes a placeholder size, lets the
//! caller serialize the body, and back-patches the size on finalize.
//!
use std::convert::TryInto;
use std::fmt::Debug;
use std::io;

use crate::boxes::HeifBox;
use crate::serialize::{BoxBytes, FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::*;

/// Implemented for every box.
pub trait BoxInfo {
    /// The "fourcc" name of this box.
    fn fourcc(&self) -> FourCC;
    /// Highest supported version, `None` for boxes that are not FullBoxes.
    fn max_version() -> Option<u8>
    where
        Self: Sized,
    {
        None
    }
}

/// Version and flags of a FullBox.
///
/// Boxes that are not FullBoxes use the default implementation.
pub trait FullBox {
    /// Version, based on the content. `None` means "not a FullBox".
    fn version(&self) -> Option<u8> {
        None
    }
    /// Flags, based on the content.
    fn flags(&self) -> u32 {
        0
    }
}

/// Parsed box header.
#[derive(Clone)]
pub struct BoxHeader {
    /// Body size (header itself not included).
    pub size:        u64,
    pub fourcc:      FourCC,
    pub usertype:    Option<Uuid>,
    pub version:     Option<u8>,
    pub flags:       u32,
    pub max_version: Option<u8>,
}

impl BoxHeader {
    /// Look at the header without consuming it.
    ///
    /// Only the fourcc and version are guaranteed to be filled in,
    /// which is all the callers of `peek` need.
    pub fn peek<R: ReadBytes>(stream: &mut R) -> io::Result<BoxHeader> {
        if stream.left() < 8 {
            return Err(ioerr!(UnexpectedEof, "BoxHeader::peek: short read"));
        }
        let data = stream.peek(8)?;
        let size1 = u32::from_be_bytes(data[0..4].try_into().unwrap());
        let fourcc = FourCC::from(&data[4..8]);
        let mut idx = 8u64;
        if size1 == 1 {
            idx += 8;
        }
        if fourcc == b"uuid" {
            idx += 16;
        }
        // Only peek deeper for FullBoxes; `mdat` may not have more
        // than its header mapped into memory.
        let max_version = HeifBox::max_version_from_fourcc(fourcc);
        let version = match max_version {
            Some(_) if stream.left() > idx => {
                let data = stream.peek(idx + 1)?;
                Some(data[idx as usize])
            },
            _ => None,
        };
        Ok(BoxHeader {
            size: size1 as u64,
            fourcc,
            usertype: None,
            version,
            flags: 0,
            max_version,
        })
    }
}

impl Debug for BoxHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut dbg = f.debug_struct("BoxHeader");
        dbg.field("fourcc", &self.fourcc);
        dbg.field("size", &self.size);
        if let Some(version) = self.version {
            dbg.field("version", &version);
            dbg.field("flags", &format_args!("{:#x}", self.flags));
        }
        dbg.finish()
    }
}

/// Reads a box header, then acts as a size-limited reader over the body.
pub struct BoxReader<'a> {
    pub header: BoxHeader,
    maxsize:    u64,
    // We box it, since a BoxReader might contain a BoxReader.
    inner:      Box<dyn ReadBytes + 'a>,
}

impl<'a> BoxReader<'a> {
    /// Read the box header, then return a size-limited reader.
    pub fn new(mut stream: &'a mut impl ReadBytes) -> io::Result<BoxReader<'a>> {
        let size1 = u32::from_bytes(&mut stream)?;
        let fourcc = FourCC::from_bytes(&mut stream)?;
        let mut size = match size1 {
            0 => stream.left(),
            1 => u64::from_bytes(&mut stream)?.saturating_sub(16),
            x => (x as u64).saturating_sub(8),
        };

        let usertype = if fourcc == b"uuid" {
            size = size.saturating_sub(16);
            Some(Uuid::from_bytes(&mut stream)?)
        } else {
            None
        };

        let max_version = HeifBox::max_version_from_fourcc(fourcc);
        let (version, flags) = if max_version.is_some() {
            size = size.saturating_sub(4);
            let vf = u32::from_bytes(&mut stream)?;
            (Some((vf >> 24) as u8), vf & 0x00ffffff)
        } else {
            (None, 0)
        };

        let maxsize = std::cmp::min(stream.size(), stream.pos() + size);
        log::trace!(
            "BoxReader::new: {} size {} maxsize {} left {}",
            fourcc,
            size,
            maxsize,
            stream.left()
        );

        Ok(BoxReader {
            header: BoxHeader {
                size,
                fourcc,
                usertype,
                version,
                flags,
                max_version,
            },
            maxsize,
            inner: Box::new(stream),
        })
    }
}

impl<'a> Drop for BoxReader<'a> {
    fn drop(&mut self) {
        let pos = self.inner.pos();
        if pos < self.maxsize {
            log::trace!(
                "BoxReader {} drop: skipping {}",
                self.header.fourcc,
                self.maxsize - pos
            );
            let _ = self.inner.skip(self.maxsize - pos);
        }
    }
}

// Delegate ReadBytes to the inner reader, limited to the box body.
impl<'a> ReadBytes for BoxReader<'a> {
    fn read(&mut self, amount: u64) -> io::Result<&[u8]> {
        let amount = if amount == 0 { self.left() } else { amount };
        if amount == 0 {
            return Ok(b"");
        }
        if self.inner.pos() + amount > self.maxsize {
            return Err(ioerr!(UnexpectedEof, "{}: read past end of box", self.header.fourcc));
        }
        self.inner.read(amount)
    }
    fn peek(&mut self, amount: u64) -> io::Result<&[u8]> {
        if self.inner.pos() + amount > self.maxsize {
            return Err(ioerr!(UnexpectedEof, "{}: peek past end of box", self.header.fourcc));
        }
        self.inner.peek(amount)
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        if self.inner.pos() + amount > self.maxsize {
            return Err(ioerr!(UnexpectedEof, "{}: skip past end of box", self.header.fourcc));
        }
        self.inner.skip(amount)
    }
    fn left(&mut self) -> u64 {
        let pos = self.inner.pos();
        if pos > self.maxsize {
            0
        } else {
            self.maxsize - pos
        }
    }
}

// Delegate BoxBytes to the inner reader; version/flags come from the header.
impl<'a> BoxBytes for BoxReader<'a> {
    fn pos(&mut self) -> u64 {
        self.inner.pos()
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        if pos > self.maxsize {
            return Err(ioerr!(UnexpectedEof, "{}: seek past end of box", self.header.fourcc));
        }
        self.inner.seek(pos)
    }
    fn size(&self) -> u64 {
        self.maxsize
    }
    fn version(&self) -> u8 {
        self.header.version.unwrap_or(0)
    }
    fn set_version(&mut self, version: u8) {
        self.header.version = Some(version);
    }
    fn flags(&self) -> u32 {
        self.header.flags
    }
    fn set_flags(&mut self, flags: u32) {
        self.header.flags = flags;
    }
    fn fourcc(&self) -> FourCC {
        self.header.fourcc
    }
    fn data_ref(&self, size: u64) -> io::Result<crate::io::DataRef> {
        self.inner.data_ref(size)
    }
    fn input_filename(&self) -> Option<&str> {
        self.inner.input_filename()
    }
}

/// Writes the box header, then the body, then back-patches the size.
pub struct BoxWriter<W: WriteBytes> {
    fourcc:    FourCC,
    offset:    u64,
    version:   Option<u8>,
    flags:     u32,
    inner:     W,
    finalized: bool,
}

impl<W> BoxWriter<W>
where
    W: WriteBytes,
{
    /// Write a provisional box header, then return a new stream.
    ///
    /// When the stream is finalized or dropped, the size in the
    /// box header is updated.
    pub fn new(mut stream: W, content: &(impl BoxInfo + FullBox)) -> io::Result<BoxWriter<W>> {
        let offset = stream.pos();
        let fourcc = content.fourcc();
        0u32.to_bytes(&mut stream)?;
        fourcc.to_bytes(&mut stream)?;
        let version = content.version();
        let flags = content.flags();
        if let Some(version) = version {
            let vf = ((version as u32) << 24) | (flags & 0x00ffffff);
            vf.to_bytes(&mut stream)?;
        }
        Ok(BoxWriter {
            fourcc,
            offset,
            version,
            flags,
            inner: stream,
            finalized: false,
        })
    }

    /// Finalize the box: seek back to the header, write the size,
    /// then seek to the end again.
    ///
    /// If you don't call this explicitly, it is done automatically when the
    /// BoxWriter is dropped. Any I/O errors will then result in panics.
    pub fn finalize(&mut self) -> io::Result<()> {
        self.finalized = true;
        let pos = self.inner.pos();
        let sz = pos - self.offset;
        if sz > u32::MAX as u64 {
            return Err(ioerr!(InvalidData, "{}: box too large: {}", self.fourcc, sz));
        }
        self.inner.seek(self.offset)?;
        (sz as u32).to_bytes(&mut self.inner)?;
        self.inner.seek(pos)?;
        Ok(())
    }
}

impl<W> Drop for BoxWriter<W>
where
    W: WriteBytes,
{
    fn drop(&mut self) {
        if !self.finalized {
            self.finalize().unwrap();
        }
    }
}

// Delegate WriteBytes to the inner writer.
impl<W> WriteBytes for BoxWriter<W>
where
    W: WriteBytes,
{
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write(data)
    }
    fn skip(&mut self, amount: u64) -> io::Result<()> {
        self.inner.skip(amount)
    }
}

// Delegate BoxBytes to the inner writer; version/flags are local.
impl<W> BoxBytes for BoxWriter<W>
where
    W: WriteBytes,
{
    fn pos(&mut self) -> u64 {
        self.inner.pos()
    }
    fn seek(&mut self, pos: u64) -> io::Result<()> {
        self.inner.seek(pos)
    }
    fn size(&self) -> u64 {
        self.inner.size()
    }
    fn version(&self) -> u8 {
        self.version.unwrap_or(0)
    }
    fn set_version(&mut self, version: u8) {
        self.version = Some(version);
    }
    fn flags(&self) -> u32 {
        self.flags
    }
    fn set_flags(&mut self, flags: u32) {
        self.flags = flags;
    }
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
}

/// Read a collection of boxes from a stream.
pub fn read_boxes<R: ReadBytes>(mut file: R) -> io::Result<Vec<HeifBox>> {
    let mut boxes = Vec::new();
    while file.left() >= 8 {
        let b = HeifBox::from_bytes(&mut file)?;
        boxes.push(b);
    }
    Ok(boxes)
}

/// Any unknown box we encounter is put into a GenericBox.
pub struct GenericBox {
    pub fourcc: FourCC,
    pub data:   Vec<u8>,
    size:       u64,
    skipped:    bool,
}

impl FromBytes for GenericBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<GenericBox> {
        let mut reader = BoxReader::new(stream)?;
        let fourcc = reader.header.fourcc;
        let size = reader.left();
        let data;
        let skipped;
        if size == 0 {
            skipped = false;
            data = vec![];
        } else if size < 65536 {
            skipped = false;
            data = reader.read(size)?.to_vec();
        } else {
            // Don't hold large unknown payloads in memory.
            skipped = true;
            reader.skip(size)?;
            data = vec![];
        }
        Ok(GenericBox {
            fourcc,
            data,
            size,
            skipped,
        })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for GenericBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        if self.skipped {
            writer.skip(self.size)?;
        } else {
            writer.write(&self.data)?;
        }
        writer.finalize()
    }
}

impl BoxInfo for GenericBox {
    #[inline]
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
}

impl FullBox for GenericBox {}

impl Clone for GenericBox {
    fn clone(&self) -> Self {
        GenericBox {
            fourcc:  self.fourcc,
            data:    self.data.clone(),
            size:    self.size,
            skipped: self.skipped,
        }
    }
}

struct U8Array(u64);

impl Debug for U8Array {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[u8; {}]", &self.0)
    }
}

impl Debug for GenericBox {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut dbg = f.debug_struct("GenericBox");
        dbg.field("fourcc", &self.fourcc);
        dbg.field("data", &U8Array(self.size));
        if self.skipped {
            dbg.field("skipped", &true);
        }
        dbg.finish()
    }
}
