//! Derived image descriptors.
//!
//! A derived image item carries a small descriptor as its payload
//! (plus `dimg` references to its input images); the rendered pixels
//! are computed by the client. These descriptors are not boxes, they
//! are written verbatim into the MediaDataBox.

use std::io;

use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};

/// An image grid: input images arranged row-major on a fixed raster.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageGrid {
    pub rows_minus_one:    u8,
    pub columns_minus_one: u8,
    pub output_width:      u32,
    pub output_height:     u32,
}

impl ImageGrid {
    pub fn rows(&self) -> u32 {
        self.rows_minus_one as u32 + 1
    }

    pub fn columns(&self) -> u32 {
        self.columns_minus_one as u32 + 1
    }

    fn needs_32bit_fields(&self) -> bool {
        self.output_width > u16::MAX as u32 || self.output_height > u16::MAX as u32
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = crate::io::MemBuffer::new();
        self.to_bytes(&mut buf).unwrap();
        buf.into_vec()
    }

    pub fn parse(data: &[u8]) -> io::Result<ImageGrid> {
        let mut rd: &[u8] = data;
        ImageGrid::from_bytes(&mut rd)
    }
}

impl FromBytes for ImageGrid {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ImageGrid> {
        u8::from_bytes(stream)?; // version, ignored
        let wide = u8::from_bytes(stream)? & 1 != 0;
        let rows_minus_one = u8::from_bytes(stream)?;
        let columns_minus_one = u8::from_bytes(stream)?;
        let (output_width, output_height) = if wide {
            (u32::from_bytes(stream)?, u32::from_bytes(stream)?)
        } else {
            (
                u16::from_bytes(stream)? as u32,
                u16::from_bytes(stream)? as u32,
            )
        };
        Ok(ImageGrid {
            rows_minus_one,
            columns_minus_one,
            output_width,
            output_height,
        })
    }

    fn min_size() -> usize {
        8
    }
}

impl ToBytes for ImageGrid {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let wide = self.needs_32bit_fields();
        0u8.to_bytes(stream)?; // version
        (wide as u8).to_bytes(stream)?; // flags
        self.rows_minus_one.to_bytes(stream)?;
        self.columns_minus_one.to_bytes(stream)?;
        if wide {
            self.output_width.to_bytes(stream)?;
            self.output_height.to_bytes(stream)?;
        } else {
            (self.output_width as u16).to_bytes(stream)?;
            (self.output_height as u16).to_bytes(stream)?;
        }
        Ok(())
    }
}

/// One input image placement within an overlay.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayOffset {
    pub horizontal_offset: i32,
    pub vertical_offset:   i32,
}

/// An image overlay: input images placed on a filled canvas.
///
/// There is one offset per `dimg` reference; the count is not part
/// of the descriptor, the offsets run to the end of the payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ImageOverlay {
    pub canvas_fill_value_r: u16,
    pub canvas_fill_value_g: u16,
    pub canvas_fill_value_b: u16,
    pub canvas_fill_value_a: u16,
    pub output_width:        u32,
    pub output_height:       u32,
    pub offsets:             Vec<OverlayOffset>,
}

impl ImageOverlay {
    fn needs_32bit_fields(&self) -> bool {
        self.output_width > u16::MAX as u32
            || self.output_height > u16::MAX as u32
            || self.offsets.iter().any(|o| {
                o.horizontal_offset > i16::MAX as i32
                    || o.horizontal_offset < i16::MIN as i32
                    || o.vertical_offset > i16::MAX as i32
                    || o.vertical_offset < i16::MIN as i32
            })
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut buf = crate::io::MemBuffer::new();
        self.to_bytes(&mut buf).unwrap();
        buf.into_vec()
    }

    pub fn parse(data: &[u8]) -> io::Result<ImageOverlay> {
        let mut rd: &[u8] = data;
        ImageOverlay::from_bytes(&mut rd)
    }
}

impl FromBytes for ImageOverlay {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ImageOverlay> {
        u8::from_bytes(stream)?; // version, ignored
        let wide = u8::from_bytes(stream)? & 1 != 0;
        let canvas_fill_value_r = u16::from_bytes(stream)?;
        let canvas_fill_value_g = u16::from_bytes(stream)?;
        let canvas_fill_value_b = u16::from_bytes(stream)?;
        let canvas_fill_value_a = u16::from_bytes(stream)?;
        let (output_width, output_height) = if wide {
            (u32::from_bytes(stream)?, u32::from_bytes(stream)?)
        } else {
            (
                u16::from_bytes(stream)? as u32,
                u16::from_bytes(stream)? as u32,
            )
        };

        // Read as many offsets as there are; the count should match the
        // number of dimg references but that cannot be verified here.
        let mut offsets = Vec::new();
        let entry_size = if wide { 8 } else { 4 };
        while stream.left() >= entry_size {
            let (horizontal_offset, vertical_offset) = if wide {
                (i32::from_bytes(stream)?, i32::from_bytes(stream)?)
            } else {
                (
                    i16::from_bytes(stream)? as i32,
                    i16::from_bytes(stream)? as i32,
                )
            };
            offsets.push(OverlayOffset {
                horizontal_offset,
                vertical_offset,
            });
        }

        Ok(ImageOverlay {
            canvas_fill_value_r,
            canvas_fill_value_g,
            canvas_fill_value_b,
            canvas_fill_value_a,
            output_width,
            output_height,
            offsets,
        })
    }

    fn min_size() -> usize {
        14
    }
}

impl ToBytes for ImageOverlay {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let wide = self.needs_32bit_fields();
        0u8.to_bytes(stream)?; // version
        (wide as u8).to_bytes(stream)?; // flags
        self.canvas_fill_value_r.to_bytes(stream)?;
        self.canvas_fill_value_g.to_bytes(stream)?;
        self.canvas_fill_value_b.to_bytes(stream)?;
        self.canvas_fill_value_a.to_bytes(stream)?;
        if wide {
            self.output_width.to_bytes(stream)?;
            self.output_height.to_bytes(stream)?;
        } else {
            (self.output_width as u16).to_bytes(stream)?;
            (self.output_height as u16).to_bytes(stream)?;
        }
        for offset in &self.offsets {
            if wide {
                offset.horizontal_offset.to_bytes(stream)?;
                offset.vertical_offset.to_bytes(stream)?;
            } else {
                (offset.horizontal_offset as i16).to_bytes(stream)?;
                (offset.vertical_offset as i16).to_bytes(stream)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_2x2() {
        let grid = ImageGrid {
            rows_minus_one: 1,
            columns_minus_one: 1,
            output_width: 1024,
            output_height: 1024,
        };
        let bytes = grid.to_vec();
        assert_eq!(bytes, vec![0, 0, 1, 1, 4, 0, 4, 0]);
        assert_eq!(ImageGrid::parse(&bytes).unwrap(), grid);
    }

    #[test]
    fn grid_wide_fields() {
        let grid = ImageGrid {
            rows_minus_one: 0,
            columns_minus_one: 0,
            output_width: 100_000,
            output_height: 50,
        };
        let bytes = grid.to_vec();
        assert_eq!(bytes[1], 1);
        assert_eq!(bytes.len(), 12);
        assert_eq!(ImageGrid::parse(&bytes).unwrap(), grid);
    }

    #[test]
    fn overlay_roundtrip() {
        let iovl = ImageOverlay {
            canvas_fill_value_r: 0xffff,
            canvas_fill_value_g: 0,
            canvas_fill_value_b: 0,
            canvas_fill_value_a: 0xffff,
            output_width: 640,
            output_height: 480,
            offsets: vec![
                OverlayOffset {
                    horizontal_offset: 0,
                    vertical_offset: 0,
                },
                OverlayOffset {
                    horizontal_offset: -10,
                    vertical_offset: 240,
                },
            ],
        };
        let bytes = iovl.to_vec();
        assert_eq!(ImageOverlay::parse(&bytes).unwrap(), iovl);
    }

    #[test]
    fn overlay_wide_offsets() {
        let iovl = ImageOverlay {
            output_width: 10,
            output_height: 10,
            offsets: vec![OverlayOffset {
                horizontal_offset: 40_000,
                vertical_offset: -40_000,
            }],
            ..ImageOverlay::default()
        };
        let bytes = iovl.to_vec();
        assert_eq!(bytes[1], 1);
        assert_eq!(ImageOverlay::parse(&bytes).unwrap(), iovl);
    }
}
