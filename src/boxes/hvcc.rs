//! HEVC and L-HEVC decoder configuration.

use std::io;

use crate::boxes::prelude::*;
use crate::nal::{self, HevcNalUnitType};
use crate::parser::hevc as hevcparser;

def_box! {
    /// HEVCConfigurationBox (ISO/IEC 14496-15)
    #[derive(Default)]
    HevcConfigurationBox {
        configuration: HevcDecoderConfigurationRecord,
    },
    fourcc => "hvcC",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

/// One array of NAL units of a single type.
#[derive(Clone, Debug)]
pub struct NalArray {
    pub array_completeness: bool,
    pub nal_unit_type:      HevcNalUnitType,
    pub nal_units:          Vec<Vec<u8>>,
}

// aligned(8) class HEVCDecoderConfigurationRecord {
//     unsigned int(8) configurationVersion = 1;
//     unsigned int(2) general_profile_space;
//     unsigned int(1) general_tier_flag;
//     unsigned int(5) general_profile_idc;
//     unsigned int(32) general_profile_compatibility_flags;
//     unsigned int(48) general_constraint_indicator_flags;
//     unsigned int(8) general_level_idc;
//     bit(4) reserved = '1111'b;
//     unsigned int(12) min_spatial_segmentation_idc;
//     bit(6) reserved = '111111'b;
//     unsigned int(2) parallelismType;
//     bit(6) reserved = '111111'b;
//     unsigned int(2) chroma_format_idc;
//     bit(5) reserved = '11111'b;
//     unsigned int(3) bit_depth_luma_minus8;
//     bit(5) reserved = '11111'b;
//     unsigned int(3) bit_depth_chroma_minus8;
//     bit(16) avgFrameRate;
//     bit(2) constantFrameRate;
//     bit(3) numTemporalLayers;
//     bit(1) temporalIdNested;
//     unsigned int(2) lengthSizeMinusOne;
//     unsigned int(8) numOfArrays;
//     for (j=0; j < numOfArrays; j++) { .. nal unit arrays .. }
// }
#[derive(Clone, Debug)]
pub struct HevcDecoderConfigurationRecord {
    pub configuration_version:        u8,
    pub general_profile_space:        u8,
    pub general_tier_flag:            u8,
    pub general_profile_idc:          u8,
    pub general_profile_compatibility_flags: u32,
    pub general_constraint_indicator_flags: [u8; 6],
    pub general_level_idc:            u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type:             u8,
    pub chroma_format_idc:            u8,
    pub bit_depth_luma_minus8:        u8,
    pub bit_depth_chroma_minus8:      u8,
    pub avg_frame_rate:               u16,
    pub constant_frame_rate:          u8,
    pub num_temporal_layers:          u8,
    pub temporal_id_nested:           u8,
    pub length_size_minus1:           u8,
    pub nal_arrays:                   Vec<NalArray>,
    // Parsed from the SPS, not part of the written record.
    pub pic_width_in_luma_samples:    u32,
    pub pic_height_in_luma_samples:   u32,
    pub conf_win_left_offset:         u32,
    pub conf_win_right_offset:        u32,
    pub conf_win_top_offset:          u32,
    pub conf_win_bottom_offset:       u32,
}

impl Default for HevcDecoderConfigurationRecord {
    fn default() -> Self {
        HevcDecoderConfigurationRecord {
            configuration_version: 1,
            general_profile_space: 0,
            general_tier_flag: 0,
            general_profile_idc: 0,
            general_profile_compatibility_flags: 0,
            general_constraint_indicator_flags: [0; 6],
            general_level_idc: 0,
            min_spatial_segmentation_idc: 0,
            parallelism_type: 0,
            chroma_format_idc: 0,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: 0,
            temporal_id_nested: 0,
            length_size_minus1: 0,
            nal_arrays: Vec::new(),
            pic_width_in_luma_samples: 0,
            pic_height_in_luma_samples: 0,
            conf_win_left_offset: 0,
            conf_win_right_offset: 0,
            conf_win_top_offset: 0,
            conf_win_bottom_offset: 0,
        }
    }
}

// Crop units, indexed by chroma_format_idc.
const SUB_WIDTH_C: [u32; 4] = [1, 2, 2, 1];
const SUB_HEIGHT_C: [u32; 4] = [1, 2, 1, 1];

impl HevcDecoderConfigurationRecord {
    /// Fill the record from an SPS NAL unit.
    ///
    /// `frame_rate` goes into avgFrameRate in frames/(256 seconds).
    pub fn make_config_from_sps(&mut self, sps: &[u8], frame_rate: f64) -> io::Result<()> {
        let config = hevcparser::parse_sps(sps)?;

        let mut frame_rate = frame_rate;
        if frame_rate > (0xffff as f64) / 256.0 {
            frame_rate = (0xffff as f64) / 256.0;
        }
        self.avg_frame_rate = (frame_rate * 256.0 + 0.5) as u16;
        self.constant_frame_rate = 0;
        self.length_size_minus1 = 3;
        self.nal_arrays.clear();

        self.num_temporal_layers = config.num_temporal_layers;
        self.temporal_id_nested = config.temporal_id_nested;
        self.general_profile_space = config.general_profile_space;
        self.general_tier_flag = config.general_tier_flag;
        self.general_profile_idc = config.general_profile_idc;
        self.general_profile_compatibility_flags = config.general_profile_compatibility_flags;
        self.general_constraint_indicator_flags = config.general_constraint_indicator_flags;
        self.general_level_idc = config.general_level_idc;
        self.chroma_format_idc = config.chroma_format_idc;
        self.bit_depth_luma_minus8 = config.bit_depth_luma_minus8;
        self.bit_depth_chroma_minus8 = config.bit_depth_chroma_minus8;
        self.pic_width_in_luma_samples = config.pic_width_in_luma_samples;
        self.pic_height_in_luma_samples = config.pic_height_in_luma_samples;
        self.conf_win_left_offset = config.conf_win_left_offset;
        self.conf_win_right_offset = config.conf_win_right_offset;
        self.conf_win_top_offset = config.conf_win_top_offset;
        self.conf_win_bottom_offset = config.conf_win_bottom_offset;
        self.min_spatial_segmentation_idc = 0;
        self.parallelism_type = 0;
        Ok(())
    }

    /// Display width after conformance-window cropping.
    pub fn pic_width(&self) -> u32 {
        let sub_c = SUB_WIDTH_C[(self.chroma_format_idc as usize) & 3];
        self.pic_width_in_luma_samples
            .saturating_sub(sub_c * (self.conf_win_left_offset + self.conf_win_right_offset))
    }

    /// Display height after conformance-window cropping.
    pub fn pic_height(&self) -> u32 {
        let sub_c = SUB_HEIGHT_C[(self.chroma_format_idc as usize) & 3];
        self.pic_height_in_luma_samples
            .saturating_sub(sub_c * (self.conf_win_top_offset + self.conf_win_bottom_offset))
    }

    /// Add a NAL unit (a possible start code is stripped).
    pub fn add_nal_unit(
        &mut self,
        nal_unit: &[u8],
        nal_unit_type: HevcNalUnitType,
        array_completeness: bool,
    ) {
        let sc = nal::find_start_code_len(nal_unit);
        let data = nal_unit[sc..].to_vec();
        for array in self.nal_arrays.iter_mut() {
            if array.nal_unit_type == nal_unit_type {
                array.nal_units.push(data);
                return;
            }
        }
        self.nal_arrays.push(NalArray {
            array_completeness,
            nal_unit_type,
            nal_units: vec![data],
        });
    }

    pub fn nal_units_of_type(&self, nal_unit_type: HevcNalUnitType) -> &[Vec<u8>] {
        self.nal_arrays
            .iter()
            .find(|a| a.nal_unit_type == nal_unit_type)
            .map(|a| &a.nal_units[..])
            .unwrap_or(&[])
    }

    /// The first parameter set of a type, with a start code in front.
    pub fn parameter_set_with_start_code(&self, nal_unit_type: HevcNalUnitType) -> Vec<u8> {
        let mut v = Vec::new();
        if let Some(ps) = self.nal_units_of_type(nal_unit_type).first() {
            v.extend_from_slice(&[0, 0, 0, 1]);
            v.extend_from_slice(ps);
        }
        v
    }
}

impl FromBytes for HevcDecoderConfigurationRecord {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<HevcDecoderConfigurationRecord> {
        let mut rec = HevcDecoderConfigurationRecord::default();

        rec.configuration_version = u8::from_bytes(stream)?;
        let b = u8::from_bytes(stream)?;
        rec.general_profile_space = b >> 6;
        rec.general_tier_flag = (b >> 5) & 1;
        rec.general_profile_idc = b & 0x1f;
        rec.general_profile_compatibility_flags = u32::from_bytes(stream)?;
        for i in 0..6 {
            rec.general_constraint_indicator_flags[i] = u8::from_bytes(stream)?;
        }
        rec.general_level_idc = u8::from_bytes(stream)?;
        // Reserved bits are ignored on read.
        rec.min_spatial_segmentation_idc = u16::from_bytes(stream)? & 0x0fff;
        rec.parallelism_type = u8::from_bytes(stream)? & 0x3;
        rec.chroma_format_idc = u8::from_bytes(stream)? & 0x3;
        rec.bit_depth_luma_minus8 = u8::from_bytes(stream)? & 0x7;
        rec.bit_depth_chroma_minus8 = u8::from_bytes(stream)? & 0x7;
        rec.avg_frame_rate = u16::from_bytes(stream)?;
        let b = u8::from_bytes(stream)?;
        rec.constant_frame_rate = b >> 6;
        rec.num_temporal_layers = (b >> 3) & 0x7;
        rec.temporal_id_nested = (b >> 2) & 1;
        rec.length_size_minus1 = b & 0x3;

        let num_arrays = u8::from_bytes(stream)?;
        for _ in 0..num_arrays {
            let b = u8::from_bytes(stream)?;
            let array_completeness = b & 0x80 != 0;
            let nal_unit_type = HevcNalUnitType::from_u8(b & 0x3f);
            let num_nalus = u16::from_bytes(stream)?;
            for _ in 0..num_nalus {
                let len = u16::from_bytes(stream)? as usize;
                let data = Data::read(stream, len)?;
                rec.add_nal_unit(&data.0, nal_unit_type, array_completeness);
            }
            if num_nalus == 0 {
                rec.nal_arrays.push(NalArray {
                    array_completeness,
                    nal_unit_type,
                    nal_units: Vec::new(),
                });
            }
        }

        // Derive geometry from the first SPS.
        if let Some(sps) = rec.nal_units_of_type(HevcNalUnitType::Sps).first() {
            if let Ok(config) = hevcparser::parse_sps(sps) {
                rec.pic_width_in_luma_samples = config.pic_width_in_luma_samples;
                rec.pic_height_in_luma_samples = config.pic_height_in_luma_samples;
                rec.conf_win_left_offset = config.conf_win_left_offset;
                rec.conf_win_right_offset = config.conf_win_right_offset;
                rec.conf_win_top_offset = config.conf_win_top_offset;
                rec.conf_win_bottom_offset = config.conf_win_bottom_offset;
            }
        }

        Ok(rec)
    }

    fn min_size() -> usize {
        23
    }
}

impl ToBytes for HevcDecoderConfigurationRecord {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.configuration_version.to_bytes(stream)?;
        let b = (self.general_profile_space << 6)
            | ((self.general_tier_flag & 1) << 5)
            | (self.general_profile_idc & 0x1f);
        b.to_bytes(stream)?;
        self.general_profile_compatibility_flags.to_bytes(stream)?;
        stream.write(&self.general_constraint_indicator_flags)?;
        self.general_level_idc.to_bytes(stream)?;
        // Reserved bits are written as ones.
        (0xf000u16 | (self.min_spatial_segmentation_idc & 0x0fff)).to_bytes(stream)?;
        (0xfcu8 | (self.parallelism_type & 0x3)).to_bytes(stream)?;
        (0xfcu8 | (self.chroma_format_idc & 0x3)).to_bytes(stream)?;
        (0xf8u8 | (self.bit_depth_luma_minus8 & 0x7)).to_bytes(stream)?;
        (0xf8u8 | (self.bit_depth_chroma_minus8 & 0x7)).to_bytes(stream)?;
        self.avg_frame_rate.to_bytes(stream)?;
        let b = ((self.constant_frame_rate & 0x3) << 6)
            | ((self.num_temporal_layers & 0x7) << 3)
            | ((self.temporal_id_nested & 1) << 2)
            | (self.length_size_minus1 & 0x3);
        b.to_bytes(stream)?;

        (self.nal_arrays.len() as u8).to_bytes(stream)?;
        for array in &self.nal_arrays {
            let b = ((array.array_completeness as u8) << 7) | (array.nal_unit_type.to_u8() & 0x3f);
            b.to_bytes(stream)?;
            (array.nal_units.len() as u16).to_bytes(stream)?;
            for nal in &array.nal_units {
                (nal.len() as u16).to_bytes(stream)?;
                stream.write(nal)?;
            }
        }

        Ok(())
    }
}

def_box! {
    /// LHEVCConfigurationBox (ISO/IEC 14496-15)
    #[derive(Default)]
    LHevcConfigurationBox {
        configuration: LHevcDecoderConfigurationRecord,
    },
    fourcc => "lhvC",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

/// L-HEVC decoder configuration record: the layered subset of the
/// HEVC record, NAL arrays included.
#[derive(Clone, Debug)]
pub struct LHevcDecoderConfigurationRecord {
    pub configuration_version:        u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type:             u8,
    pub num_temporal_layers:          u8,
    pub temporal_id_nested:           u8,
    pub length_size_minus1:           u8,
    pub nal_arrays:                   Vec<NalArray>,
}

impl Default for LHevcDecoderConfigurationRecord {
    fn default() -> Self {
        LHevcDecoderConfigurationRecord {
            configuration_version: 1,
            min_spatial_segmentation_idc: 0,
            parallelism_type: 0,
            num_temporal_layers: 0,
            temporal_id_nested: 0,
            length_size_minus1: 3,
            nal_arrays: Vec::new(),
        }
    }
}

impl LHevcDecoderConfigurationRecord {
    pub fn add_nal_unit(
        &mut self,
        nal_unit: &[u8],
        nal_unit_type: HevcNalUnitType,
        array_completeness: bool,
    ) {
        let sc = nal::find_start_code_len(nal_unit);
        let data = nal_unit[sc..].to_vec();
        for array in self.nal_arrays.iter_mut() {
            if array.nal_unit_type == nal_unit_type {
                array.nal_units.push(data);
                return;
            }
        }
        self.nal_arrays.push(NalArray {
            array_completeness,
            nal_unit_type,
            nal_units: vec![data],
        });
    }

    pub fn nal_units_of_type(&self, nal_unit_type: HevcNalUnitType) -> &[Vec<u8>] {
        self.nal_arrays
            .iter()
            .find(|a| a.nal_unit_type == nal_unit_type)
            .map(|a| &a.nal_units[..])
            .unwrap_or(&[])
    }
}

impl FromBytes for LHevcDecoderConfigurationRecord {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<LHevcDecoderConfigurationRecord> {
        let mut rec = LHevcDecoderConfigurationRecord::default();
        rec.configuration_version = u8::from_bytes(stream)?;
        rec.min_spatial_segmentation_idc = u16::from_bytes(stream)? & 0x0fff;
        rec.parallelism_type = u8::from_bytes(stream)? & 0x3;
        let b = u8::from_bytes(stream)?;
        rec.num_temporal_layers = (b >> 3) & 0x7;
        rec.temporal_id_nested = (b >> 2) & 1;
        rec.length_size_minus1 = b & 0x3;

        let num_arrays = u8::from_bytes(stream)?;
        for _ in 0..num_arrays {
            let b = u8::from_bytes(stream)?;
            let array_completeness = b & 0x80 != 0;
            let nal_unit_type = HevcNalUnitType::from_u8(b & 0x3f);
            let num_nalus = u16::from_bytes(stream)?;
            for _ in 0..num_nalus {
                let len = u16::from_bytes(stream)? as usize;
                let data = Data::read(stream, len)?;
                rec.add_nal_unit(&data.0, nal_unit_type, array_completeness);
            }
        }
        Ok(rec)
    }

    fn min_size() -> usize {
        6
    }
}

impl ToBytes for LHevcDecoderConfigurationRecord {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.configuration_version.to_bytes(stream)?;
        (0xf000u16 | (self.min_spatial_segmentation_idc & 0x0fff)).to_bytes(stream)?;
        (0xfcu8 | (self.parallelism_type & 0x3)).to_bytes(stream)?;
        let b = 0xc0u8
            | ((self.num_temporal_layers & 0x7) << 3)
            | ((self.temporal_id_nested & 1) << 2)
            | (self.length_size_minus1 & 0x3);
        b.to_bytes(stream)?;
        (self.nal_arrays.len() as u8).to_bytes(stream)?;
        for array in &self.nal_arrays {
            let b = ((array.array_completeness as u8) << 7) | (array.nal_unit_type.to_u8() & 0x3f);
            b.to_bytes(stream)?;
            (array.nal_units.len() as u16).to_bytes(stream)?;
            for nal in &array.nal_units {
                (nal.len() as u16).to_bytes(stream)?;
                stream.write(nal)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    #[test]
    fn reserved_bits_written_as_ones() {
        let rec = HevcDecoderConfigurationRecord::default();
        let mut buf = MemBuffer::new();
        rec.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        // 4 bits before min_spatial_segmentation_idc.
        assert_eq!(v[13] & 0xf0, 0xf0);
        // 6 bits before parallelismType and chroma_format.
        assert_eq!(v[15] & 0xfc, 0xfc);
        assert_eq!(v[16] & 0xfc, 0xfc);
        // 5 bits before each bit depth.
        assert_eq!(v[17] & 0xf8, 0xf8);
        assert_eq!(v[18] & 0xf8, 0xf8);
    }

    #[test]
    fn record_roundtrip_with_nal_arrays() {
        let mut rec = HevcDecoderConfigurationRecord::default();
        rec.general_profile_idc = 1;
        rec.general_level_idc = 93;
        rec.chroma_format_idc = 1;
        rec.num_temporal_layers = 1;
        rec.temporal_id_nested = 1;
        rec.length_size_minus1 = 3;
        rec.add_nal_unit(&[0x40, 1, 2], HevcNalUnitType::Vps, true);
        rec.add_nal_unit(&[0x42, 3, 4], HevcNalUnitType::Sps, true);
        rec.add_nal_unit(&[0x44, 5], HevcNalUnitType::Pps, true);

        let mut buf = MemBuffer::new();
        rec.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd: &[u8] = &v[..];
        let back = HevcDecoderConfigurationRecord::from_bytes(&mut rd).unwrap();
        assert_eq!(back.general_profile_idc, 1);
        assert_eq!(back.general_level_idc, 93);
        assert_eq!(back.length_size_minus1, 3);
        assert_eq!(back.nal_arrays.len(), 3);
        assert_eq!(back.nal_units_of_type(HevcNalUnitType::Vps)[0], vec![0x40, 1, 2]);
        assert_eq!(back.nal_units_of_type(HevcNalUnitType::Pps)[0], vec![0x44, 5]);
    }

    #[test]
    fn parameter_set_gets_start_code() {
        let mut rec = HevcDecoderConfigurationRecord::default();
        rec.add_nal_unit(&[0x42, 3, 4], HevcNalUnitType::Sps, true);
        let sps = rec.parameter_set_with_start_code(HevcNalUnitType::Sps);
        assert_eq!(sps, vec![0, 0, 0, 1, 0x42, 3, 4]);
        let vps = rec.parameter_set_with_start_code(HevcNalUnitType::Vps);
        assert!(vps.is_empty());
    }

    #[test]
    fn lhvc_record_roundtrip() {
        let mut rec = LHevcDecoderConfigurationRecord::default();
        rec.num_temporal_layers = 1;
        rec.add_nal_unit(&[0x40, 7], HevcNalUnitType::Vps, true);

        let mut buf = MemBuffer::new();
        rec.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd: &[u8] = &v[..];
        let back = LHevcDecoderConfigurationRecord::from_bytes(&mut rd).unwrap();
        assert_eq!(back.length_size_minus1, 3);
        assert_eq!(back.nal_units_of_type(HevcNalUnitType::Vps)[0], vec![0x40, 7]);
    }
}
