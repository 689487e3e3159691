//
// ISO/IEC 14496-12:2015(E)
// 8.5.2 Sample Description Box, 12.1.3 Visual Sample Entry
//

use std::io;

use crate::boxes::prelude::*;
use crate::boxes::{AvcConfigurationBox, HevcConfigurationBox};

def_box! {
    /// HEVC sample entry (VisualSampleEntry 'hvc1').
    ///
    /// Contains:
    ///
    /// - HEVCConfigurationBox (one)
    /// - CodingConstraintsBox (image sequences)
    /// - extra boxes.
    HevcSampleEntry {
        skip:                   6,
        data_reference_index:   u16,
        skip:                   16,
        width:                  u16,
        height:                 u16,
        // defaults to 72, 72
        _video_horizontal_dpi:  FixedFloat16_16,
        _video_vertical_dpi:    FixedFloat16_16,
        skip:                   4,
        // defaults to 1
        _video_frame_count:     u16,
        // Compressor name is a fixed-size pascal string.
        skip:                   32,
        // defaults to 0x0018
        video_pixel_depth:      u16,
        // always -1
        _pre_defined:           u16,
        // hvcC, ccst, etc.
        boxes:                  Vec<HeifBox>,
    },
    fourcc => "hvc1",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl Default for HevcSampleEntry {
    fn default() -> HevcSampleEntry {
        HevcSampleEntry {
            data_reference_index: 1,
            width: 0,
            height: 0,
            _video_horizontal_dpi: 72f64.into(),
            _video_vertical_dpi: 72f64.into(),
            _video_frame_count: 1,
            video_pixel_depth: 0x18,
            _pre_defined: 0xffff,
            boxes: Vec::new(),
        }
    }
}

impl HevcSampleEntry {
    /// Get a reference to the HEVCConfigurationBox.
    pub fn configuration(&self) -> Option<&HevcConfigurationBox> {
        first_box!(&self.boxes, HevcConfigurationBox)
    }

    pub fn coding_constraints(&self) -> Option<&CodingConstraintsBox> {
        first_box!(&self.boxes, CodingConstraintsBox)
    }
}

def_box! {
    /// AVC sample entry (VisualSampleEntry 'avc1').
    AvcSampleEntry {
        skip:                   6,
        data_reference_index:   u16,
        skip:                   16,
        width:                  u16,
        height:                 u16,
        _video_horizontal_dpi:  FixedFloat16_16,
        _video_vertical_dpi:    FixedFloat16_16,
        skip:                   4,
        _video_frame_count:     u16,
        skip:                   32,
        video_pixel_depth:      u16,
        _pre_defined:           u16,
        // avcC, ccst, etc.
        boxes:                  Vec<HeifBox>,
    },
    fourcc => "avc1",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl Default for AvcSampleEntry {
    fn default() -> AvcSampleEntry {
        AvcSampleEntry {
            data_reference_index: 1,
            width: 0,
            height: 0,
            _video_horizontal_dpi: 72f64.into(),
            _video_vertical_dpi: 72f64.into(),
            _video_frame_count: 1,
            video_pixel_depth: 0x18,
            _pre_defined: 0xffff,
            boxes: Vec::new(),
        }
    }
}

impl AvcSampleEntry {
    /// Get a reference to the AVCConfigurationBox.
    pub fn configuration(&self) -> Option<&AvcConfigurationBox> {
        first_box!(&self.boxes, AvcConfigurationBox)
    }
}

/// Coding constraints ('ccst', ISO/IEC 23008-12).
///
/// One 32-bit word: two flags, a 4-bit reference count, 26 reserved bits.
#[derive(Clone, Debug, Default)]
pub struct CodingConstraintsBox {
    pub all_ref_pics_intra: bool,
    pub intra_pred_used:    bool,
    pub max_ref_per_pic:    u8,
}

impl FromBytes for CodingConstraintsBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<CodingConstraintsBox> {
        let mut reader = BoxReader::new(stream)?;
        let word = u32::from_bytes(&mut reader)?;
        Ok(CodingConstraintsBox {
            all_ref_pics_intra: word & 0x8000_0000 != 0,
            intra_pred_used: word & 0x4000_0000 != 0,
            max_ref_per_pic: ((word >> 26) & 0xf) as u8,
        })
    }
    fn min_size() -> usize {
        16
    }
}

impl ToBytes for CodingConstraintsBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let word = ((self.all_ref_pics_intra as u32) << 31)
            | ((self.intra_pred_used as u32) << 30)
            | (((self.max_ref_per_pic & 0xf) as u32) << 26);
        word.to_bytes(&mut writer)?;
        writer.finalize()
    }
}

impl BoxInfo for CodingConstraintsBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("ccst")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for CodingConstraintsBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    #[test]
    fn ccst_roundtrip() {
        let ccst = CodingConstraintsBox {
            all_ref_pics_intra: true,
            intra_pred_used: true,
            max_ref_per_pic: 2,
        };
        let mut buf = MemBuffer::new();
        ccst.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        // FullBox header + one 32-bit word.
        assert_eq!(v.len(), 16);
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = CodingConstraintsBox::from_bytes(&mut rd).unwrap();
        assert!(back.all_ref_pics_intra);
        assert!(back.intra_pred_used);
        assert_eq!(back.max_ref_per_pic, 2);
    }

    #[test]
    fn hvc1_entry_roundtrip() {
        let mut entry = HevcSampleEntry::default();
        entry.width = 1280;
        entry.height = 720;

        let mut buf = MemBuffer::new();
        entry.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = HevcSampleEntry::from_bytes(&mut rd).unwrap();
        assert_eq!(back.width, 1280);
        assert_eq!(back.height, 720);
        assert_eq!(back.data_reference_index, 1);
    }
}
