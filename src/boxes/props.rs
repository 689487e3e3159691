//! Descriptive item properties.

use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// Image spatial extents ('ispe', ISO/IEC 23008-12).
    #[derive(Default, PartialEq)]
    ImageSpatialExtentsProperty {
        width:  u32,
        height: u32,
    },
    fourcc => "ispe",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// Image rotation ('irot', ISO/IEC 23008-12).
///
/// One byte; the low two bits give the anti-clockwise rotation
/// in 90 degree steps.
#[derive(Clone, Debug, Default)]
pub struct ImageRotation {
    pub angle: u16,
}

impl FromBytes for ImageRotation {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ImageRotation> {
        let mut reader = BoxReader::new(stream)?;
        let b = u8::from_bytes(&mut reader)?;
        Ok(ImageRotation {
            angle: ((b & 0x3) as u16) * 90,
        })
    }
    fn min_size() -> usize {
        9
    }
}

impl ToBytes for ImageRotation {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        (((self.angle / 90) % 4) as u8).to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for ImageRotation {
    fn fourcc(&self) -> FourCC {
        FourCC::new("irot")
    }
}

impl FullBox for ImageRotation {}

/// Image mirror ('imir', ISO/IEC 23008-12).
///
/// One byte; bit 0 selects the mirror axis
/// (0 = vertical/left-right, 1 = horizontal/top-bottom).
#[derive(Clone, Debug, Default)]
pub struct ImageMirror {
    pub horizontal_axis: bool,
}

impl FromBytes for ImageMirror {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<ImageMirror> {
        let mut reader = BoxReader::new(stream)?;
        let b = u8::from_bytes(&mut reader)?;
        Ok(ImageMirror {
            horizontal_axis: b & 1 != 0,
        })
    }
    fn min_size() -> usize {
        9
    }
}

impl ToBytes for ImageMirror {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        (self.horizontal_axis as u8).to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for ImageMirror {
    fn fourcc(&self) -> FourCC {
        FourCC::new("imir")
    }
}

impl FullBox for ImageMirror {}

def_box! {
    /// Clean aperture ('clap', ISO/IEC 14496-12).
    ///
    /// Four fractions: width, height, horizontal offset, vertical offset.
    #[derive(Default)]
    CleanApertureBox {
        clean_aperture_width_n:  u32,
        clean_aperture_width_d:  u32,
        clean_aperture_height_n: u32,
        clean_aperture_height_d: u32,
        horiz_off_n:             u32,
        horiz_off_d:             u32,
        vert_off_n:              u32,
        vert_off_d:              u32,
    },
    fourcc => "clap",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Image relative location ('rloc', ISO/IEC 23008-12).
    #[derive(Default)]
    ImageRelativeLocationProperty {
        horizontal_offset: u32,
        vertical_offset:   u32,
    },
    fourcc => "rloc",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

/// Auxiliary type ('auxC', ISO/IEC 23008-12).
///
/// A zero-terminated URN followed by any remaining bytes as
/// codec-specific subtype data.
#[derive(Clone, Debug, Default)]
pub struct AuxiliaryTypeProperty {
    pub aux_type:    ZString,
    pub aux_subtype: Data,
}

impl FromBytes for AuxiliaryTypeProperty {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<AuxiliaryTypeProperty> {
        let mut reader = BoxReader::new(stream)?;
        let aux_type = ZString::from_bytes(&mut reader)?;
        let aux_subtype = Data::from_bytes(&mut reader)?;
        Ok(AuxiliaryTypeProperty {
            aux_type,
            aux_subtype,
        })
    }
    fn min_size() -> usize {
        13
    }
}

impl ToBytes for AuxiliaryTypeProperty {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        self.aux_type.to_bytes(&mut writer)?;
        self.aux_subtype.to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for AuxiliaryTypeProperty {
    fn fourcc(&self) -> FourCC {
        FourCC::new("auxC")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for AuxiliaryTypeProperty {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}

def_box! {
    /// Layer selection ('lsel', ISO/IEC 23008-12).
    #[derive(Default)]
    LayerSelectorProperty {
        layer_id:   u16,
    },
    fourcc => "lsel",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// Target output layer set ('tols', ISO/IEC 14496-15).
    #[derive(Default)]
    TargetOlsProperty {
        target_ols_index:   u16,
    },
    fourcc => "tols",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    fn roundtrip<T: FromBytes + ToBytes>(value: &T) -> T {
        let mut buf = MemBuffer::new();
        value.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        T::from_bytes(&mut rd).unwrap()
    }

    #[test]
    fn irot_two_bits() {
        for &angle in &[0u16, 90, 180, 270] {
            let back = roundtrip(&ImageRotation { angle });
            assert_eq!(back.angle, angle);
        }
        // irot is a plain box: header + one byte.
        let mut buf = MemBuffer::new();
        ImageRotation { angle: 270 }.to_bytes(&mut buf).unwrap();
        assert_eq!(buf.into_vec().len(), 9);
    }

    #[test]
    fn imir_axis() {
        let back = roundtrip(&ImageMirror {
            horizontal_axis: true,
        });
        assert!(back.horizontal_axis);
    }

    #[test]
    fn auxc_urn_and_subtype() {
        let prop = AuxiliaryTypeProperty {
            aux_type: ZString::new("urn:mpeg:hevc:2015:auxid:1"),
            aux_subtype: Data(vec![1, 2, 3]),
        };
        let back = roundtrip(&prop);
        assert_eq!(back.aux_type.as_str(), "urn:mpeg:hevc:2015:auxid:1");
        assert_eq!(back.aux_subtype.0, vec![1, 2, 3]);
    }

    #[test]
    fn ispe_is_a_fullbox() {
        let prop = ImageSpatialExtentsProperty {
            width: 1024,
            height: 768,
        };
        let mut buf = MemBuffer::new();
        prop.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        // size(4) + fourcc(4) + version/flags(4) + w(4) + h(4)
        assert_eq!(v.len(), 20);
        assert_eq!(&v[4..8], b"ispe");
    }
}
