//! H.264 Sequence Parameter Set parsing.
//
// All of the code below was written based on several open source h.264
// parsers. All of that code looks alike, so they were either all written
// off the standard, or everyone is copying one another.

use std::io;

use crate::bitio::BitReader;
use crate::nal;
use crate::parser::cond;

// Crop units, indexed by chroma_format_idc.
const SUB_WIDTH_C: [u32; 4] = [1, 2, 2, 1];
const SUB_HEIGHT_C: [u32; 4] = [1, 2, 1, 1];

/// The values the decoder configuration record needs from an SPS.
#[derive(Debug, Clone, Default)]
pub struct SpsConfig {
    pub profile_idc:            u8,
    pub constraint_flags:       u8,
    pub level_idc:              u8,
    pub chroma_format_idc:      u8,
    pub bit_depth_luma_minus8:  u8,
    pub bit_depth_chroma_minus8: u8,
    pub pic_width:              u32,
    pub pic_height:             u32,
}

/// Parse an SPS NAL unit (optionally with start code) into an [`SpsConfig`].
pub fn parse_sps(nal_unit: &[u8]) -> io::Result<SpsConfig> {
    let sc = nal::find_start_code_len(nal_unit);
    let rbsp = nal::byte_stream_to_rbsp(&nal_unit[sc..]);
    if rbsp.len() < 4 {
        return Err(ioerr!(UnexpectedEof, "SPS too short"));
    }
    let nal_unit_type = rbsp[0] & 0x1f;
    if nal_unit_type != 7 {
        return Err(ioerr!(InvalidData, "not an SPS NAL unit: type {}", nal_unit_type));
    }
    let mut reader = BitReader::new(&rbsp[1..]);
    let sps = SeqParameterSet::read(&mut reader)?;
    Ok(sps.config())
}

/// Sequence Parameter Set.
#[derive(Clone, Debug)]
pub struct SeqParameterSet {
    pub profile_idc:                    u8,
    pub constraint_flags:               u8,
    pub level_idc:                      u8,
    pub seq_parameter_set_id:           u8,
    pub chroma_format:                  Option<ChromaFormat>,
    pub log2_max_frame_num_minus4:      u8,
    pub pic_order_cnt_type:             PicOrderCntType,
    pub num_ref_frames:                 u32,
    pub gaps_in_frame_num_value_allowed_flag: bool,
    pub pic_width_in_mbs_minus1:        u32,
    pub pic_height_in_map_units_minus1: u32,
    pub frame_mbs_flags:                FrameMbsFlags,
    pub direct_8x8_inference_flag:      bool,
    pub frame_cropping:                 Option<FrameCropping>,
}

impl SeqParameterSet {
    pub fn read(reader: &mut BitReader) -> io::Result<SeqParameterSet> {
        let profile_idc = reader.read_u8()?;
        Ok(SeqParameterSet {
            profile_idc,
            constraint_flags: reader.read_u8()?,
            level_idc: reader.read_u8()?,
            seq_parameter_set_id: reader.read_ue_max(31)? as u8,
            chroma_format: ChromaFormat::read(reader, profile_idc)?,
            log2_max_frame_num_minus4: reader.read_ue_max(255)? as u8,
            pic_order_cnt_type: PicOrderCntType::read(reader)?,
            num_ref_frames: reader.read_ue()?,
            gaps_in_frame_num_value_allowed_flag: reader.read_bit()?,
            pic_width_in_mbs_minus1: reader.read_ue()?,
            pic_height_in_map_units_minus1: reader.read_ue()?,
            frame_mbs_flags: FrameMbsFlags::read(reader)?,
            direct_8x8_inference_flag: reader.read_bit()?,
            frame_cropping: cond(reader.read_bit()?, || FrameCropping::read(reader))?,
        })
    }

    /// Derive the record values, applying the conformance crop.
    pub fn config(&self) -> SpsConfig {
        let chroma_format_idc = self
            .chroma_format
            .as_ref()
            .map(|c| c.chroma_format_idc)
            // Profiles without the chroma block imply 4:2:0.
            .unwrap_or(1);

        let frame_mbs_only = match self.frame_mbs_flags {
            FrameMbsFlags::Frames => 1u32,
            FrameMbsFlags::Fields { .. } => 0u32,
        };

        let mut width = (self.pic_width_in_mbs_minus1 + 1) * 16;
        let mut height = (self.pic_height_in_map_units_minus1 + 1) * 16 * (2 - frame_mbs_only);

        if let Some(crop) = self.frame_cropping.as_ref() {
            let idx = (chroma_format_idc as usize) & 3;
            width = width.saturating_sub(SUB_WIDTH_C[idx] * (crop.left_offset + crop.right_offset));
            height = height.saturating_sub(
                SUB_HEIGHT_C[idx] * (crop.top_offset + crop.bottom_offset) * (2 - frame_mbs_only),
            );
        }

        SpsConfig {
            profile_idc: self.profile_idc,
            constraint_flags: self.constraint_flags,
            level_idc: self.level_idc,
            chroma_format_idc: chroma_format_idc as u8,
            bit_depth_luma_minus8: self
                .chroma_format
                .as_ref()
                .map(|c| c.bit_depth_luma_minus8 as u8)
                .unwrap_or(0),
            bit_depth_chroma_minus8: self
                .chroma_format
                .as_ref()
                .map(|c| c.bit_depth_chroma_minus8 as u8)
                .unwrap_or(0),
            pic_width: width,
            pic_height: height,
        }
    }
}

/// Picture Order Count Type.
#[derive(Clone, Debug)]
pub enum PicOrderCntType {
    Zero {
        log2_max_pic_order_cnt_lsb_minus4: u8,
    },
    One {
        delta_pic_order_always_zero_flag: bool,
        offset_for_non_ref_pic: i32,
        offset_for_top_to_bottom_field: i32,
        offset_for_ref_frame: Vec<i32>,
    },
    Two,
}

impl PicOrderCntType {
    fn read(reader: &mut BitReader) -> io::Result<PicOrderCntType> {
        let pic_order_cnt_type = reader.read_ue()?;
        match pic_order_cnt_type {
            0 => Ok(PicOrderCntType::Zero {
                log2_max_pic_order_cnt_lsb_minus4: reader.read_ue_max(12)? as u8,
            }),
            1 => {
                let delta_pic_order_always_zero_flag = reader.read_bit()?;
                let offset_for_non_ref_pic = reader.read_se()?;
                let offset_for_top_to_bottom_field = reader.read_se()?;
                let num_ref_frames_in_pic_order_cnt_cycle = reader.read_ue()?;
                let mut offset_for_ref_frame = Vec::new();
                for _ in 0..num_ref_frames_in_pic_order_cnt_cycle {
                    offset_for_ref_frame.push(reader.read_se()?);
                }
                Ok(PicOrderCntType::One {
                    delta_pic_order_always_zero_flag,
                    offset_for_non_ref_pic,
                    offset_for_top_to_bottom_field,
                    offset_for_ref_frame,
                })
            },
            2 => Ok(PicOrderCntType::Two),
            other => Err(ioerr!(InvalidData, "unknown pic_order_cnt_type: {}", other)),
        }
    }
}

/// Frame cropping offsets (in crop units).
#[derive(Clone, Debug)]
pub struct FrameCropping {
    pub left_offset:   u32,
    pub right_offset:  u32,
    pub top_offset:    u32,
    pub bottom_offset: u32,
}

impl FrameCropping {
    fn read(reader: &mut BitReader) -> io::Result<FrameCropping> {
        Ok(FrameCropping {
            left_offset: reader.read_ue()?,
            right_offset: reader.read_ue()?,
            top_offset: reader.read_ue()?,
            bottom_offset: reader.read_ue()?,
        })
    }
}

/// Frame Mbs Flags.
#[derive(Debug, Clone)]
pub enum FrameMbsFlags {
    Frames,
    Fields { mb_adaptive_frame_field_flag: bool },
}

impl FrameMbsFlags {
    fn read(r: &mut BitReader) -> io::Result<FrameMbsFlags> {
        let frame_mbs_only_flag = r.read_bit()?;
        if frame_mbs_only_flag {
            Ok(FrameMbsFlags::Frames)
        } else {
            Ok(FrameMbsFlags::Fields {
                mb_adaptive_frame_field_flag: r.read_bit()?,
            })
        }
    }
}

/// Chroma format information (only present for the high profiles).
#[derive(Clone, Debug)]
pub struct ChromaFormat {
    pub chroma_format_idc:            u32,
    pub separate_colour_plane_flag:   Option<bool>,
    pub bit_depth_luma_minus8:        u32,
    pub bit_depth_chroma_minus8:      u32,
    pub qpprime_y_zero_transform_bypass_flag: bool,
    pub scaling_matrix:               Option<ScalingMatrix>,
}

impl ChromaFormat {
    fn read(reader: &mut BitReader, profile_indication: u8) -> io::Result<Option<ChromaFormat>> {
        match profile_indication {
            100 | 110 | 122 | 144 | 244 | 44 | 83 | 86 | 118 | 128 => {},
            _ => return Ok(None),
        }

        let chroma_format_idc = reader.read_ue()?;
        Ok(Some(ChromaFormat {
            chroma_format_idc,
            separate_colour_plane_flag: cond(chroma_format_idc == 3, || reader.read_bit())?,
            bit_depth_luma_minus8: reader.read_ue()?,
            bit_depth_chroma_minus8: reader.read_ue()?,
            qpprime_y_zero_transform_bypass_flag: reader.read_bit()?,
            scaling_matrix: cond(reader.read_bit()?, || {
                ScalingMatrix::read(reader, chroma_format_idc)
            })?,
        }))
    }
}

/// Scaling Matrix. Only parsed to keep the bit position right.
#[derive(Clone, Debug)]
pub struct ScalingMatrix {
    pub scaling_list_4x4: Vec<ScalingList>,
    pub scaling_list_8x8: Vec<ScalingList>,
}

impl ScalingMatrix {
    fn read(reader: &mut BitReader, chroma_format_idc: u32) -> io::Result<ScalingMatrix> {
        let mut scaling_list_4x4 = Vec::new();
        let mut scaling_list_8x8 = Vec::new();

        let size = if chroma_format_idc == 3 { 12 } else { 8 };
        for i in 0..size {
            let seq_scaling_list_present_flag = reader.read_bit()?;
            if seq_scaling_list_present_flag {
                if i < 6 {
                    scaling_list_4x4.push(ScalingList::read(reader, 16)?);
                } else {
                    scaling_list_8x8.push(ScalingList::read(reader, 64)?);
                }
            }
        }

        Ok(ScalingMatrix {
            scaling_list_4x4,
            scaling_list_8x8,
        })
    }
}

/// Scaling List. Part of Scaling Matrix.
#[derive(Clone, Debug)]
pub struct ScalingList {
    pub use_default_scaling_matrix_flag: bool,
    pub scaling_list: Vec<u32>,
}

impl ScalingList {
    fn read(reader: &mut BitReader, size_of_list: usize) -> io::Result<ScalingList> {
        let mut last_scale = 8_u32;
        let mut next_scale = 8_u32;
        let mut use_default_scaling_matrix_flag = false;
        let mut scaling_list = Vec::new();

        for j in 0..size_of_list {
            if next_scale != 0 {
                let delta_scale = reader.read_se()?;
                next_scale = (last_scale as i32 + delta_scale + 256) as u32 % 256;
                use_default_scaling_matrix_flag = j == 0 && next_scale == 0;
            }
            let val = if next_scale == 0 { last_scale } else { next_scale };
            scaling_list.push(val);
            last_scale = val;
        }
        Ok(ScalingList {
            use_default_scaling_matrix_flag,
            scaling_list,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::BitWriter;

    // Build a minimal baseline-profile SPS bit by bit.
    fn write_ue(w: &mut BitWriter, v: u32) {
        let code = v as u64 + 1;
        let bits = 64 - code.leading_zeros() as u8;
        for _ in 0..bits - 1 {
            w.write_bit(false);
        }
        w.write_bits(code as u32, bits);
    }

    fn baseline_sps(width_mbs: u32, height_mbs: u32, crop: Option<(u32, u32, u32, u32)>) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.write_u8(0x67); // NAL header: SPS
        w.write_u8(66); // profile_idc: baseline
        w.write_u8(0xc0); // constraint flags
        w.write_u8(30); // level_idc
        write_ue(&mut w, 0); // seq_parameter_set_id
        write_ue(&mut w, 0); // log2_max_frame_num_minus4
        write_ue(&mut w, 0); // pic_order_cnt_type = 0
        write_ue(&mut w, 0); //   log2_max_pic_order_cnt_lsb_minus4
        write_ue(&mut w, 1); // num_ref_frames
        w.write_bit(false); // gaps_in_frame_num_value_allowed
        write_ue(&mut w, width_mbs - 1); // pic_width_in_mbs_minus1
        write_ue(&mut w, height_mbs - 1); // pic_height_in_map_units_minus1
        w.write_bit(true); // frame_mbs_only_flag
        w.write_bit(false); // direct_8x8_inference_flag
        match crop {
            Some((l, r, t, b)) => {
                w.write_bit(true);
                write_ue(&mut w, l);
                write_ue(&mut w, r);
                write_ue(&mut w, t);
                write_ue(&mut w, b);
            },
            None => w.write_bit(false),
        }
        w.write_bit(false); // vui_parameters_present_flag
        w.finish()
    }

    #[test]
    fn parse_uncropped_dimensions() {
        let sps = baseline_sps(64, 48, None);
        let config = parse_sps(&sps).unwrap();
        assert_eq!(config.profile_idc, 66);
        assert_eq!(config.level_idc, 30);
        assert_eq!(config.pic_width, 1024);
        assert_eq!(config.pic_height, 768);
    }

    #[test]
    fn parse_cropped_dimensions() {
        // 1920x1088 coded, cropped to 1920x1080: 4 crop units bottom (4:2:0).
        let sps = baseline_sps(120, 68, Some((0, 0, 0, 4)));
        let config = parse_sps(&sps).unwrap();
        assert_eq!(config.pic_width, 1920);
        assert_eq!(config.pic_height, 1080);
    }

    #[test]
    fn rejects_non_sps() {
        let not_sps = [0x65u8, 0, 0, 0];
        assert!(parse_sps(&not_sps).is_err());
    }
}
