//! H.265 parameter set parsing.
//!
//! The SPS parse recovers the fields a decoder configuration record
//! carries plus the conformance window. The VPS parse follows the
//! H.265 syntax tables through the VPS extension, far enough to derive
//! the layer dependency tables and the operating points of an L-HEVC
//! bitstream.

use std::io;

use crate::bitio::BitReader;
use crate::nal;

// Crop units, indexed by chroma_format_idc.
const SUB_WIDTH_C: [u32; 4] = [1, 2, 2, 1];
const SUB_HEIGHT_C: [u32; 4] = [1, 2, 1, 1];

/// The values a `hvcC` record needs from an SPS.
#[derive(Debug, Clone, Default)]
pub struct SpsConfig {
    pub num_temporal_layers:        u8,
    pub temporal_id_nested:         u8,
    pub general_profile_space:      u8,
    pub general_tier_flag:          u8,
    pub general_profile_idc:        u8,
    pub general_profile_compatibility_flags: u32,
    pub general_constraint_indicator_flags: [u8; 6],
    pub general_level_idc:          u8,
    pub chroma_format_idc:          u8,
    pub pic_width_in_luma_samples:  u32,
    pub pic_height_in_luma_samples: u32,
    pub conf_win_left_offset:       u32,
    pub conf_win_right_offset:      u32,
    pub conf_win_top_offset:        u32,
    pub conf_win_bottom_offset:     u32,
    pub bit_depth_luma_minus8:      u8,
    pub bit_depth_chroma_minus8:    u8,
}

impl SpsConfig {
    /// Display width: luma samples minus the conformance window.
    pub fn pic_width(&self) -> u32 {
        let sub_c = SUB_WIDTH_C[(self.chroma_format_idc as usize) & 3];
        self.pic_width_in_luma_samples
            .saturating_sub(sub_c * (self.conf_win_left_offset + self.conf_win_right_offset))
    }

    /// Display height: luma samples minus the conformance window.
    pub fn pic_height(&self) -> u32 {
        let sub_c = SUB_HEIGHT_C[(self.chroma_format_idc as usize) & 3];
        self.pic_height_in_luma_samples
            .saturating_sub(sub_c * (self.conf_win_top_offset + self.conf_win_bottom_offset))
    }
}

/// Parse an HEVC SPS NAL unit (optionally with start code).
pub fn parse_sps(nal_unit: &[u8]) -> io::Result<SpsConfig> {
    let sc = nal::find_start_code_len(nal_unit);
    let rbsp = nal::byte_stream_to_rbsp(&nal_unit[sc..]);
    if rbsp.len() < 4 {
        return Err(ioerr!(UnexpectedEof, "SPS too short"));
    }
    let mut r = BitReader::new(&rbsp);

    // NALU header.
    r.read_bits(1)?; // forbidden_zero_bit
    let nal_unit_type = r.read_bits(6)?;
    if nal_unit_type != 33 {
        return Err(ioerr!(InvalidData, "not an SPS NAL unit: type {}", nal_unit_type));
    }
    r.read_bits(6)?; // nuh_layer_id
    r.read_bits(3)?; // nuh_temporal_id_plus1

    let mut config = SpsConfig::default();

    r.read_bits(4)?; // sps_video_parameter_set_id
    let max_sub_layers_minus1 = r.read_bits(3)?;
    config.num_temporal_layers = (max_sub_layers_minus1 + 1) as u8;
    config.temporal_id_nested = r.read_bits(1)? as u8;

    // profile_tier_level
    let ptl = Ptl::parse(&mut r, max_sub_layers_minus1, true)?;
    config.general_profile_space = ptl.general_profile_space;
    config.general_tier_flag = ptl.general_tier_flag;
    config.general_profile_idc = ptl.general_profile_idc;
    config.general_profile_compatibility_flags = ptl.general_profile_compatibility_flags;
    config.general_constraint_indicator_flags = ptl.general_constraint_indicator_flags;
    config.general_level_idc = ptl.general_level_idc;

    r.read_ue()?; // sps_seq_parameter_set_id
    config.chroma_format_idc = r.read_ue_max(3)? as u8;
    if config.chroma_format_idc == 3 {
        r.read_bits(1)?; // separate_colour_plane_flag
    }
    config.pic_width_in_luma_samples = r.read_ue()?;
    config.pic_height_in_luma_samples = r.read_ue()?;

    if r.read_bit()? {
        // conformance_window_flag
        config.conf_win_left_offset = r.read_ue()?;
        config.conf_win_right_offset = r.read_ue()?;
        config.conf_win_top_offset = r.read_ue()?;
        config.conf_win_bottom_offset = r.read_ue()?;
    }

    config.bit_depth_luma_minus8 = r.read_ue_max(8)? as u8;
    config.bit_depth_chroma_minus8 = r.read_ue_max(8)? as u8;
    r.read_ue()?; // log2_max_pic_order_cnt_lsb_minus4

    Ok(config)
}

/// profile_tier_level() syntax structure.
#[derive(Debug, Clone, Default)]
pub struct Ptl {
    pub general_profile_space: u8,
    pub general_tier_flag:     u8,
    pub general_profile_idc:   u8,
    pub general_profile_compatibility_flags: u32,
    pub general_constraint_indicator_flags: [u8; 6],
    pub general_level_idc:     u8,
}

impl Ptl {
    pub fn parse(r: &mut BitReader, max_sub_layers_minus1: u32, profile_present: bool) -> io::Result<Ptl> {
        let mut ptl = Ptl::default();
        if profile_present {
            ptl.general_profile_space = r.read_bits(2)? as u8;
            ptl.general_tier_flag = r.read_bits(1)? as u8;
            ptl.general_profile_idc = r.read_bits(5)? as u8;
            ptl.general_profile_compatibility_flags = r.read_bits(32)?;
            for i in 0..6 {
                ptl.general_constraint_indicator_flags[i] = r.read_bits(8)? as u8;
            }
        }
        ptl.general_level_idc = r.read_bits(8)? as u8;

        let mut sub_layer_profile_present = Vec::new();
        let mut sub_layer_level_present = Vec::new();
        for _ in 0..max_sub_layers_minus1 {
            sub_layer_profile_present.push(r.read_bit()?);
            sub_layer_level_present.push(r.read_bit()?);
        }
        if max_sub_layers_minus1 > 0 {
            for _ in max_sub_layers_minus1..8 {
                r.read_bits(2)?; // reserved_zero_2bits
            }
        }
        for i in 0..max_sub_layers_minus1 as usize {
            if sub_layer_profile_present[i] {
                r.skip_bits(2 + 1 + 5)?; // sub_layer profile space/tier/idc
                r.skip_bits(32)?; // sub_layer_profile_compatibility_flag
                r.skip_bits(4)?; // progressive/interlaced/non_packed/frame_only
                r.skip_bits(44)?; // sub_layer_reserved_zero_44bits
            }
            if sub_layer_level_present[i] {
                r.read_bits(8)?; // sub_layer_level_idc
            }
        }
        Ok(ptl)
    }
}

// hrd_parameters(), parsed only to keep the bit position right.
#[derive(Debug, Clone, Default)]
struct Hrd {
    nal_hrd_parameters_present:  bool,
    vcl_hrd_parameters_present:  bool,
    sub_pic_hrd_params_present:  bool,
}

impl Hrd {
    fn parse(r: &mut BitReader, common_inf_present: bool, max_sub_layers_minus1: u32) -> io::Result<Hrd> {
        let mut hrd = Hrd::default();
        if common_inf_present {
            hrd.nal_hrd_parameters_present = r.read_bit()?;
            hrd.vcl_hrd_parameters_present = r.read_bit()?;
            if hrd.nal_hrd_parameters_present || hrd.vcl_hrd_parameters_present {
                hrd.sub_pic_hrd_params_present = r.read_bit()?;
                if hrd.sub_pic_hrd_params_present {
                    r.skip_bits(8 + 5 + 1 + 5)?;
                }
                r.skip_bits(4 + 4)?; // bit_rate_scale, cpb_size_scale
                if hrd.sub_pic_hrd_params_present {
                    r.skip_bits(4)?; // cpb_size_du_scale
                }
                r.skip_bits(5 + 5 + 5)?;
            }
        }
        for _ in 0..=max_sub_layers_minus1 {
            let fixed_pic_rate_general = r.read_bit()?;
            let fixed_pic_rate_within_cvs = if !fixed_pic_rate_general {
                r.read_bit()?
            } else {
                true
            };
            let mut low_delay_hrd = false;
            if fixed_pic_rate_within_cvs {
                r.read_ue()?; // elemental_duration_in_tc_minus1
            } else {
                low_delay_hrd = r.read_bit()?;
            }
            let cpb_cnt_minus1 = if !low_delay_hrd { r.read_ue()? } else { 0 };
            if hrd.nal_hrd_parameters_present {
                Hrd::parse_sub(r, cpb_cnt_minus1, hrd.sub_pic_hrd_params_present)?;
            }
            if hrd.vcl_hrd_parameters_present {
                Hrd::parse_sub(r, cpb_cnt_minus1, hrd.sub_pic_hrd_params_present)?;
            }
        }
        Ok(hrd)
    }

    fn parse_sub(r: &mut BitReader, cpb_cnt: u32, sub_pic_hrd_params_present: bool) -> io::Result<()> {
        for _ in 0..=cpb_cnt {
            r.read_ue()?; // bit_rate_value_minus1
            r.read_ue()?; // cpb_size_value_minus1
            if sub_pic_hrd_params_present {
                r.read_ue()?; // cpb_size_du_value_minus1
                r.read_ue()?; // bit_rate_du_value_minus1
            }
            r.read_bits(1)?; // cbr_flag
        }
        Ok(())
    }
}

/// rep_format() syntax structure from the VPS extension.
#[derive(Debug, Clone, Default)]
pub struct RepFormat {
    pub pic_width_vps_in_luma_samples:  u32,
    pub pic_height_vps_in_luma_samples: u32,
    pub chroma_format_vps_idc:          u32,
    pub bit_depth_vps_luma_minus8:      u32,
    pub bit_depth_vps_chroma_minus8:    u32,
}

impl RepFormat {
    fn parse(r: &mut BitReader) -> io::Result<RepFormat> {
        let mut rep = RepFormat::default();
        rep.pic_width_vps_in_luma_samples = r.read_bits(16)?;
        rep.pic_height_vps_in_luma_samples = r.read_bits(16)?;
        if r.read_bit()? {
            // chroma_and_bit_depth_vps_present_flag
            rep.chroma_format_vps_idc = r.read_bits(2)?;
            if rep.chroma_format_vps_idc == 3 {
                r.read_bits(1)?; // separate_colour_plane_vps_flag
            }
            rep.bit_depth_vps_luma_minus8 = r.read_bits(4)?;
            rep.bit_depth_vps_chroma_minus8 = r.read_bits(4)?;
        }
        if r.read_bit()? {
            // conformance_window_vps_flag
            r.read_ue()?;
            r.read_ue()?;
            r.read_ue()?;
            r.read_ue()?;
        }
        Ok(rep)
    }
}

/// The parts of a parsed VPS needed to build operating points.
#[derive(Debug, Clone, Default)]
pub struct Vps {
    pub max_layers_minus1:     u32,
    pub max_sub_layers_minus1: u32,
    pub base_layer_internal:   bool,
    pub profile_tier_level:    Ptl,
    pub num_layer_sets_minus1: u32,
    pub max_layer_id:          u32,
    // layer_id_included_flag[layer set][layer id]
    pub layer_id_included:     Vec<Vec<bool>>,
    pub extension:             Option<VpsExt>,
}

/// Derived and parsed VPS-extension tables.
#[derive(Debug, Clone, Default)]
pub struct VpsExt {
    pub scalability_mask_flag:   [bool; 16],
    pub dimension_id:            Vec<Vec<u32>>,
    pub layer_id_in_nuh:         Vec<u32>,
    pub layer_idx_in_vps:        Vec<u32>,
    pub num_add_layer_sets:      u32,
    pub num_add_olss:            u32,
    pub default_output_layer_idc: u32,
    pub profile_tier_level_array: Vec<Ptl>,
    pub vps_num_profile_tier_level_minus1: u32,
    pub ols_idx_to_ls_idx:       Vec<u32>,
    pub output_layer_flag:       Vec<Vec<bool>>,
    pub profile_tier_level_idx:  Vec<Vec<u32>>,
    pub alt_output_layer_flag:   Vec<bool>,
    pub rep_formats:             Vec<RepFormat>,
    pub vps_rep_format_idx:      Vec<u32>,
    pub num_layers_in_id_list:   Vec<u32>,
    pub layer_set_layer_id_list: Vec<Vec<u32>>,
    pub num_direct_ref_layers:   Vec<u32>,
    pub id_direct_ref_layer:     Vec<Vec<u32>>,
    pub num_predicted_layers:    Vec<u32>,
    pub id_predicted_layer:      Vec<Vec<u32>>,
}

fn ceil_log2(x: u32) -> u32 {
    let mut i = 1;
    while x > (1u32 << i) {
        i += 1;
    }
    i
}

/// Parse a VPS NAL unit (optionally with start code).
pub fn parse_vps(nal_unit: &[u8]) -> io::Result<Vps> {
    let sc = nal::find_start_code_len(nal_unit);
    let rbsp = nal::byte_stream_to_rbsp(&nal_unit[sc..]);
    if rbsp.len() < 4 {
        return Err(ioerr!(UnexpectedEof, "VPS too short"));
    }
    let mut r = BitReader::new(&rbsp);

    // NALU header.
    r.read_bits(1)?; // forbidden_zero_bit
    let nal_unit_type = r.read_bits(6)?;
    if nal_unit_type != 32 {
        return Err(ioerr!(InvalidData, "not a VPS NAL unit: type {}", nal_unit_type));
    }
    r.read_bits(6)?; // nuh_layer_id
    r.read_bits(3)?; // nuh_temporal_id_plus1

    let mut vps = Vps::default();
    r.read_bits(4)?; // vps_video_parameter_set_id
    vps.base_layer_internal = r.read_bit()?;
    r.read_bits(1)?; // vps_base_layer_available_flag
    vps.max_layers_minus1 = r.read_bits(6)?;
    vps.max_sub_layers_minus1 = r.read_bits(3)?;
    r.read_bits(1)?; // vps_temporal_id_nesting_flag
    r.read_bits(16)?; // vps_reserved_0xffff_16bits

    vps.profile_tier_level = Ptl::parse(&mut r, vps.max_sub_layers_minus1, true)?;

    let sub_layer_ordering_info_present = r.read_bit()?;
    let start = if sub_layer_ordering_info_present {
        0
    } else {
        vps.max_sub_layers_minus1
    };
    for _ in start..=vps.max_sub_layers_minus1 {
        r.read_ue()?; // vps_max_dec_pic_buffering_minus1
        r.read_ue()?; // vps_max_num_reorder_pics
        r.read_ue()?; // vps_max_latency_increase_plus1
    }

    vps.max_layer_id = r.read_bits(6)?;
    vps.num_layer_sets_minus1 = r.read_ue_max(1023)?;
    vps.layer_id_included = vec![Vec::new(); (vps.num_layer_sets_minus1 + 1) as usize];
    for i in 1..=vps.num_layer_sets_minus1 as usize {
        let mut included = Vec::with_capacity((vps.max_layer_id + 1) as usize);
        for _ in 0..=vps.max_layer_id {
            included.push(r.read_bit()?);
        }
        vps.layer_id_included[i] = included;
    }

    if r.read_bit()? {
        // vps_timing_info_present_flag
        r.read_bits(32)?; // vps_num_units_in_tick
        r.read_bits(32)?; // vps_time_scale
        if r.read_bit()? {
            // vps_poc_proportional_to_timing_flag
            r.read_ue()?; // vps_num_ticks_poc_diff_one_minus1
        }
        let num_hrd_parameters = r.read_ue_max(1024)?;
        for i in 0..num_hrd_parameters {
            r.read_ue()?; // hrd_layer_set_idx
            let cprms_present = if i > 0 { r.read_bit()? } else { true };
            Hrd::parse(&mut r, cprms_present, vps.max_sub_layers_minus1)?;
        }
    }

    if r.read_bit()? {
        // vps_extension_flag
        while r.pos % 8 != 0 {
            r.read_bits(1)?; // vps_extension_alignment_bit_equal_to_one
        }
        vps.extension = Some(parse_vps_ext(&mut r, &vps)?);
    }

    Ok(vps)
}

// vps_extension() syntax, plus the table derivations the operating
// points need. Follows the H.265 annex F syntax order.
fn parse_vps_ext(r: &mut BitReader, vps: &Vps) -> io::Result<VpsExt> {
    let mut ext = VpsExt::default();

    if vps.max_layers_minus1 > 0 && vps.base_layer_internal {
        Ptl::parse(r, vps.max_sub_layers_minus1, false)?;
    }

    let splitting_flag = r.read_bit()?;

    let mut num_scalability_types = 0u32;
    for i in 0..16 {
        ext.scalability_mask_flag[i] = r.read_bit()?;
        num_scalability_types += ext.scalability_mask_flag[i] as u32;
    }

    let dim_count = num_scalability_types.saturating_sub(splitting_flag as u32) as usize;
    let mut dimension_id_len_minus1 = vec![0u32; dim_count];
    for j in 0..dim_count {
        dimension_id_len_minus1[j] = r.read_bits(3)?;
    }

    let vps_nuh_layer_id_present = r.read_bit()?;

    let max_layers_minus1 = std::cmp::min(62, vps.max_layers_minus1);
    ext.layer_id_in_nuh = vec![0u32; (max_layers_minus1 + 1) as usize];
    ext.dimension_id = vec![Vec::new(); (max_layers_minus1 + 1) as usize];
    for i in 1..=max_layers_minus1 as usize {
        ext.layer_id_in_nuh[i] = if vps_nuh_layer_id_present {
            r.read_bits(6)?
        } else {
            i as u32
        };
        if !splitting_flag {
            let mut dimension_id = vec![0u32; num_scalability_types as usize];
            for j in 0..num_scalability_types as usize {
                let num_bits = (dimension_id_len_minus1[j] + 1) as u8;
                dimension_id[j] = r.read_bits(num_bits)?;
            }
            ext.dimension_id[i] = dimension_id;
        }
    }

    let view_id_len = r.read_bits(4)?;

    ext.layer_idx_in_vps = vec![0u32; 64];
    for i in 0..=max_layers_minus1 as usize {
        ext.layer_idx_in_vps[ext.layer_id_in_nuh[i] as usize] = i as u32;
    }

    if view_id_len > 0 {
        // Single view assumed, no view_id_val entries to read.
    }

    // direct_dependency_flag
    let n = (max_layers_minus1 + 1) as usize;
    let mut direct_dependency = vec![vec![false; n]; n];
    for i in 1..n {
        for j in 0..i {
            direct_dependency[i][j] = r.read_bit()?;
        }
    }

    // Derive DependencyFlag (transitive closure).
    let mut dependency = vec![vec![false; n]; n];
    for i in 0..n {
        for j in 0..n {
            dependency[i][j] = direct_dependency[i][j];
            for k in 0..i {
                if direct_dependency[i][k] && dependency[k][j] {
                    dependency[i][j] = true;
                }
            }
        }
    }

    // Derive direct-reference / reference / predicted layer lists,
    // indexed by nuh layer id.
    ext.id_direct_ref_layer = vec![Vec::new(); 64];
    ext.id_predicted_layer = vec![Vec::new(); 64];
    ext.num_direct_ref_layers = vec![0u32; 64];
    ext.num_predicted_layers = vec![0u32; 64];
    for i in 0..n {
        let i_nuh = ext.layer_id_in_nuh[i] as usize;
        for j in 0..n {
            let j_nuh = ext.layer_id_in_nuh[j];
            if direct_dependency[i][j] {
                ext.id_direct_ref_layer[i_nuh].push(j_nuh);
            }
            if dependency[j][i] {
                ext.id_predicted_layer[i_nuh].push(j_nuh);
            }
        }
        ext.num_direct_ref_layers[i_nuh] = ext.id_direct_ref_layer[i_nuh].len() as u32;
        ext.num_predicted_layers[i_nuh] = ext.id_predicted_layer[i_nuh].len() as u32;
    }

    // Tree partitions of independent layers.
    let mut tree_partition = Vec::<Vec<u32>>::new();
    let mut layer_in_list = vec![false; 64];
    for i in 0..n {
        let i_nuh = ext.layer_id_in_nuh[i];
        if ext.num_direct_ref_layers[i_nuh as usize] == 0 {
            let mut partition = vec![i_nuh];
            for &pred in &ext.id_predicted_layer[i_nuh as usize] {
                if !layer_in_list[pred as usize] {
                    partition.push(pred);
                    layer_in_list[pred as usize] = true;
                }
            }
            tree_partition.push(partition);
        }
    }
    let num_independent_layers = tree_partition.len() as u32;

    ext.num_add_layer_sets = if num_independent_layers > 1 {
        r.read_ue_max(1023)?
    } else {
        0
    };

    let num_layer_sets = vps.num_layer_sets_minus1 + 1 + ext.num_add_layer_sets;

    // highest_layer_idx_plus1
    let mut highest_layer_idx_plus1 = Vec::new();
    for _ in 0..ext.num_add_layer_sets {
        let mut row = Vec::new();
        for j in 1..num_independent_layers as usize {
            let num_bits = ceil_log2(tree_partition[j].len() as u32 + 1) as u8;
            row.push(r.read_bits(num_bits)?);
        }
        highest_layer_idx_plus1.push(row);
    }

    // layer_set_layer_id_list / num_layers_in_id_list
    let ls_count = num_layer_sets as usize;
    ext.layer_set_layer_id_list = vec![Vec::new(); ls_count.max(1)];
    ext.num_layers_in_id_list = vec![0u32; ls_count.max(1)];
    ext.layer_set_layer_id_list[0] = vec![0];
    ext.num_layers_in_id_list[0] = 1;
    for i in 1..=vps.num_layer_sets_minus1 as usize {
        let mut list = Vec::new();
        for m in 0..=vps.max_layer_id as usize {
            if vps.layer_id_included[i].get(m).copied().unwrap_or(false) {
                list.push(m as u32);
            }
        }
        ext.num_layers_in_id_list[i] = list.len() as u32;
        ext.layer_set_layer_id_list[i] = list;
    }
    for i in 0..ext.num_add_layer_sets as usize {
        let ls_idx = (vps.num_layer_sets_minus1 + 1) as usize + i;
        let mut list = Vec::new();
        for tree_idx in 1..num_independent_layers as usize {
            let count = highest_layer_idx_plus1[i][tree_idx - 1] as usize;
            for layer_cnt in 0..count.min(tree_partition[tree_idx].len()) {
                list.push(tree_partition[tree_idx][layer_cnt]);
            }
        }
        ext.num_layers_in_id_list[ls_idx] = list.len() as u32;
        ext.layer_set_layer_id_list[ls_idx] = list;
    }

    // sub_layers_vps_max_minus1
    let mut sub_layers_vps_max_minus1 = vec![vps.max_sub_layers_minus1; n];
    if r.read_bit()? {
        for i in 0..n {
            sub_layers_vps_max_minus1[i] = r.read_bits(3)?;
        }
    }

    // max_tid_il_ref_pics_plus1
    if r.read_bit()? {
        for i in 0..n.saturating_sub(1) {
            for j in (i + 1)..n {
                if direct_dependency[j][i] {
                    r.read_bits(3)?;
                }
            }
        }
    }

    r.read_bits(1)?; // default_ref_layers_active_flag

    ext.vps_num_profile_tier_level_minus1 = r.read_ue_max(63)?;
    let ptl_start = if vps.base_layer_internal { 2 } else { 1 };
    for _ in ptl_start..=ext.vps_num_profile_tier_level_minus1 {
        let profile_present = r.read_bit()?;
        let ptl = Ptl::parse(r, vps.max_sub_layers_minus1, profile_present)?;
        ext.profile_tier_level_array.push(ptl);
    }

    if num_layer_sets > 1 {
        ext.num_add_olss = r.read_ue_max(1023)?;
        ext.default_output_layer_idc = r.read_bits(2)?;
    }

    let num_output_layer_sets = (ext.num_add_olss + num_layer_sets) as usize;
    let mut layer_set_idx_for_ols_minus1 = vec![0u32; num_output_layer_sets];
    for i in 1..num_output_layer_sets {
        if num_layer_sets > 2 && i >= num_layer_sets as usize {
            let num_bits = ceil_log2(num_layer_sets - 1) as u8;
            layer_set_idx_for_ols_minus1[i] = r.read_bits(num_bits)?;
        }
    }

    ext.ols_idx_to_ls_idx = (0..num_output_layer_sets)
        .map(|i| {
            if i < num_layer_sets as usize {
                i as u32
            } else {
                layer_set_idx_for_ols_minus1[i] + 1
            }
        })
        .collect();

    // output_layer_flag, explicit then derived.
    let mut explicit_output_flag = vec![Vec::<bool>::new(); num_output_layer_sets];
    for i in 1..num_output_layer_sets {
        if i > vps.num_layer_sets_minus1 as usize || ext.default_output_layer_idc == 2 {
            let count = ext.num_layers_in_id_list[ext.ols_idx_to_ls_idx[i] as usize] as usize;
            let mut flags = vec![false; count];
            for j in 0..count {
                flags[j] = r.read_bit()?;
            }
            explicit_output_flag[i] = flags;
        }
    }

    ext.output_layer_flag = vec![Vec::new(); num_output_layer_sets];
    if ext.default_output_layer_idc == 0 || ext.default_output_layer_idc == 1 {
        // Default: the highest layer of the set is the output layer.
        for i in 0..=vps.num_layer_sets_minus1 as usize {
            if i >= num_output_layer_sets {
                break;
            }
            let ls_idx = ext.ols_idx_to_ls_idx[i] as usize;
            let list = &ext.layer_set_layer_id_list[ls_idx];
            let max_id = list.iter().copied().max().unwrap_or(0);
            ext.output_layer_flag[i] = list.iter().map(|&id| id == max_id).collect();
        }
    }
    let start = if ext.default_output_layer_idc == 2 {
        0
    } else {
        (vps.num_layer_sets_minus1 + 1) as usize
    };
    for i in start..num_output_layer_sets {
        if !explicit_output_flag[i].is_empty() {
            ext.output_layer_flag[i] = explicit_output_flag[i].clone();
        }
    }

    // Output layer counts and the highest output layer per set.
    let mut num_output_layers = vec![0u32; num_output_layer_sets];
    let mut ols_highest_output_layer_id = vec![0u32; num_output_layer_sets];
    for i in 1..num_output_layer_sets {
        let ls_idx = ext.ols_idx_to_ls_idx[i] as usize;
        for j in 0..ext.num_layers_in_id_list[ls_idx] as usize {
            let flag = ext.output_layer_flag[i].get(j).copied().unwrap_or(false);
            num_output_layers[i] += flag as u32;
            if flag {
                ols_highest_output_layer_id[i] = ext.layer_set_layer_id_list[ls_idx][j];
            }
        }
    }

    // necessary_layer_flag
    let mut necessary_layer = vec![Vec::<bool>::new(); num_output_layer_sets];
    for ols_idx in 0..num_output_layer_sets {
        let ls_idx = ext.ols_idx_to_ls_idx[ols_idx] as usize;
        let count = ext.num_layers_in_id_list[ls_idx] as usize;
        let mut flags = vec![false; count];
        for ls_layer_idx in 0..count {
            if ext.output_layer_flag[ols_idx].get(ls_layer_idx).copied().unwrap_or(false) {
                flags[ls_layer_idx] = true;
                let curr_layer_id = ext.layer_set_layer_id_list[ls_idx][ls_layer_idx];
                for r_ls_layer_idx in 0..ls_layer_idx {
                    let ref_layer_id = ext.layer_set_layer_id_list[ls_idx][r_ls_layer_idx];
                    let ci = ext.layer_idx_in_vps[curr_layer_id as usize] as usize;
                    let ri = ext.layer_idx_in_vps[ref_layer_id as usize] as usize;
                    if dependency[ci][ri] {
                        flags[r_ls_layer_idx] = true;
                    }
                }
            }
        }
        necessary_layer[ols_idx] = flags;
    }

    // profile_tier_level_idx and alt_output_layer_flag
    ext.profile_tier_level_idx = vec![Vec::new(); num_output_layer_sets];
    ext.alt_output_layer_flag = vec![false; num_output_layer_sets];
    for i in 1..num_output_layer_sets {
        let ls_idx = ext.ols_idx_to_ls_idx[i] as usize;
        let count = ext.num_layers_in_id_list[ls_idx] as usize;
        let mut idx_row = vec![0u32; count];
        for j in 0..count {
            if necessary_layer[i][j] && ext.vps_num_profile_tier_level_minus1 > 0 {
                let num_bits = ceil_log2(ext.vps_num_profile_tier_level_minus1 + 1) as u8;
                idx_row[j] = r.read_bits(num_bits)?;
            }
        }
        ext.profile_tier_level_idx[i] = idx_row;
        if num_output_layers[i] == 1
            && ext.num_direct_ref_layers[ols_highest_output_layer_id[i] as usize] > 0
        {
            ext.alt_output_layer_flag[i] = r.read_bit()?;
        }
    }
    ext.profile_tier_level_idx[0] = vec![if vps.max_layers_minus1 > 0 { 1 } else { 0 }];

    // rep_format
    let vps_num_rep_formats_minus1 = r.read_ue_max(255)?;
    for _ in 0..=vps_num_rep_formats_minus1 {
        ext.rep_formats.push(RepFormat::parse(r)?);
    }
    let rep_format_idx_present = if vps_num_rep_formats_minus1 > 0 {
        r.read_bit()?
    } else {
        false
    };
    ext.vps_rep_format_idx = vec![0u32; n];
    let rep_start = if vps.base_layer_internal { 1 } else { 0 };
    for i in rep_start..n {
        ext.vps_rep_format_idx[i] = if rep_format_idx_present {
            r.read_bits(ceil_log2(vps_num_rep_formats_minus1 + 1) as u8)?
        } else {
            std::cmp::min(i as u32, vps_num_rep_formats_minus1)
        };
    }

    // The remainder of the extension (poc alignment, dependency types,
    // VUI) carries nothing the operating points need.

    Ok(ext)
}

//
// Operating points synthesis.
//

/// One entry of the oinf profile/tier/level list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpProfileTierLevel {
    pub general_profile_space: u8,
    pub general_tier_flag:     u8,
    pub general_profile_idc:   u8,
    pub general_profile_compatibility_flags: u32,
    pub general_constraint_indicator_flags: [u8; 6],
    pub general_level_idc:     u8,
}

impl OpProfileTierLevel {
    fn from_ptl(ptl: &Ptl) -> OpProfileTierLevel {
        OpProfileTierLevel {
            general_profile_space: ptl.general_profile_space,
            general_tier_flag: ptl.general_tier_flag,
            general_profile_idc: ptl.general_profile_idc,
            general_profile_compatibility_flags: ptl.general_profile_compatibility_flags,
            general_constraint_indicator_flags: ptl.general_constraint_indicator_flags,
            general_level_idc: ptl.general_level_idc,
        }
    }
}

/// One layer of an operating point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatingPointLayer {
    pub ptl_idx:                  u8,
    pub layer_id:                 u8,
    pub is_output_layer:          bool,
    pub is_alternate_output_layer: bool,
}

/// One operating point (an output layer set).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatingPoint {
    pub output_layer_set_idx: u16,
    pub layers:               Vec<OperatingPointLayer>,
    pub min_pic_width:        u16,
    pub min_pic_height:       u16,
    pub max_pic_width:        u16,
    pub max_pic_height:       u16,
    pub max_chroma_format:    u8,
    pub max_bit_depth_minus8: u8,
}

/// Layer dependency entry of the oinf property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OinfLayer {
    pub dependent_layer_id:     u8,
    pub dependent_on_layer_ids: Vec<u8>,
    pub dimension_identifiers:  Vec<u8>,
}

/// Everything the oinf property carries, synthesized from a VPS.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OinfInfo {
    pub scalability_mask:    u16,
    pub profile_tier_levels: Vec<OpProfileTierLevel>,
    pub operating_points:    Vec<OperatingPoint>,
    pub layers:              Vec<OinfLayer>,
}

/// Synthesize the Operating Points Information from a VPS NAL unit.
///
/// Fails when the VPS has no extension (plain single-layer HEVC).
pub fn make_oinf(vps_nal: &[u8]) -> io::Result<OinfInfo> {
    let vps = parse_vps(vps_nal)?;
    let ext = vps
        .extension
        .as_ref()
        .ok_or_else(|| ioerr!(InvalidData, "VPS has no extension, not a layered bitstream"))?;

    let mut oinf = OinfInfo::default();

    for i in 0..16 {
        oinf.scalability_mask =
            (oinf.scalability_mask << 1) | (ext.scalability_mask_flag[i] as u16);
    }

    oinf.profile_tier_levels
        .push(OpProfileTierLevel::from_ptl(&vps.profile_tier_level));
    for i in 1..ext.vps_num_profile_tier_level_minus1 as usize {
        if let Some(ptl) = ext.profile_tier_level_array.get(i - 1) {
            oinf.profile_tier_levels.push(OpProfileTierLevel::from_ptl(ptl));
        }
    }

    let mut unique_layer_ids = Vec::<u32>::new();

    for i in 0..ext.ols_idx_to_ls_idx.len() {
        let ls_idx = ext.ols_idx_to_ls_idx[i] as usize;
        let layer_count = ext.num_layers_in_id_list[ls_idx] as usize;

        let mut op = OperatingPoint::default();
        op.output_layer_set_idx = ext.ols_idx_to_ls_idx[i] as u16;

        let mut min_w = u32::MAX;
        let mut max_w = 0u32;
        let mut min_h = u32::MAX;
        let mut max_h = 0u32;
        let mut max_chroma = 0u32;
        let mut max_depth = 0u32;

        for j in 0..layer_count {
            let layer_id = ext.layer_set_layer_id_list[ls_idx][j];

            op.layers.push(OperatingPointLayer {
                ptl_idx: ext.profile_tier_level_idx[i].get(j).copied().unwrap_or(0) as u8,
                layer_id: layer_id as u8,
                is_output_layer: ext.output_layer_flag[i].get(j).copied().unwrap_or(j + 1 == layer_count),
                is_alternate_output_layer: ext.alt_output_layer_flag[i],
            });

            if !unique_layer_ids.contains(&layer_id) {
                unique_layer_ids.push(layer_id);
            }

            let layer_idx = ext.layer_idx_in_vps[layer_id as usize] as usize;
            let rep_idx = ext.vps_rep_format_idx.get(layer_idx).copied().unwrap_or(0) as usize;
            if let Some(rep) = ext.rep_formats.get(rep_idx) {
                min_w = min_w.min(rep.pic_width_vps_in_luma_samples);
                max_w = max_w.max(rep.pic_width_vps_in_luma_samples);
                min_h = min_h.min(rep.pic_height_vps_in_luma_samples);
                max_h = max_h.max(rep.pic_height_vps_in_luma_samples);
                max_chroma = max_chroma.max(rep.chroma_format_vps_idc);
                max_depth = max_depth.max(rep.bit_depth_vps_luma_minus8);
                max_depth = max_depth.max(rep.bit_depth_vps_chroma_minus8);
            }
        }

        op.min_pic_width = if min_w == u32::MAX { 0 } else { min_w as u16 };
        op.min_pic_height = if min_h == u32::MAX { 0 } else { min_h as u16 };
        op.max_pic_width = max_w as u16;
        op.max_pic_height = max_h as u16;
        op.max_chroma_format = max_chroma as u8;
        op.max_bit_depth_minus8 = max_depth as u8;

        oinf.operating_points.push(op);
    }

    for &layer_id in &unique_layer_ids {
        if layer_id == 0 {
            continue;
        }
        let layer_idx = ext.layer_idx_in_vps[layer_id as usize] as usize;
        oinf.layers.push(OinfLayer {
            dependent_layer_id: layer_id as u8,
            dependent_on_layer_ids: ext.id_direct_ref_layer[layer_id as usize]
                .iter()
                .map(|&id| id as u8)
                .collect(),
            dimension_identifiers: ext
                .dimension_id
                .get(layer_idx)
                .map(|dims| dims.iter().map(|&d| d as u8).collect())
                .unwrap_or_default(),
        });
    }

    Ok(oinf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::BitWriter;

    fn write_ue(w: &mut BitWriter, v: u32) {
        let code = v as u64 + 1;
        let bits = 64 - code.leading_zeros() as u8;
        for _ in 0..bits - 1 {
            w.write_bit(false);
        }
        w.write_bits(code as u32, bits);
    }

    fn write_ptl(w: &mut BitWriter) {
        w.write_bits(0, 2); // general_profile_space
        w.write_bits(0, 1); // general_tier_flag
        w.write_bits(1, 5); // general_profile_idc: Main
        w.write_bits(0x60000000, 32); // compatibility flags
        for _ in 0..6 {
            w.write_bits(0x00, 8); // constraint flags
        }
        w.write_bits(93, 8); // general_level_idc: 3.1
    }

    fn minimal_sps(width: u32, height: u32, conf_win: Option<(u32, u32, u32, u32)>) -> Vec<u8> {
        let mut w = BitWriter::new();
        // NAL header: type 33 (SPS).
        w.write_bits(0, 1);
        w.write_bits(33, 6);
        w.write_bits(0, 6);
        w.write_bits(1, 3);

        w.write_bits(0, 4); // sps_video_parameter_set_id
        w.write_bits(0, 3); // sps_max_sub_layers_minus1
        w.write_bits(1, 1); // sps_temporal_id_nesting_flag
        write_ptl(&mut w);
        write_ue(&mut w, 0); // sps_seq_parameter_set_id
        write_ue(&mut w, 1); // chroma_format_idc: 4:2:0
        write_ue(&mut w, width);
        write_ue(&mut w, height);
        match conf_win {
            Some((l, r, t, b)) => {
                w.write_bit(true);
                write_ue(&mut w, l);
                write_ue(&mut w, r);
                write_ue(&mut w, t);
                write_ue(&mut w, b);
            },
            None => w.write_bit(false),
        }
        write_ue(&mut w, 0); // bit_depth_luma_minus8
        write_ue(&mut w, 0); // bit_depth_chroma_minus8
        write_ue(&mut w, 4); // log2_max_pic_order_cnt_lsb_minus4
        w.finish()
    }

    #[test]
    fn sps_geometry() {
        let sps = minimal_sps(1024, 768, None);
        let config = parse_sps(&sps).unwrap();
        assert_eq!(config.general_profile_idc, 1);
        assert_eq!(config.general_level_idc, 93);
        assert_eq!(config.chroma_format_idc, 1);
        assert_eq!(config.pic_width(), 1024);
        assert_eq!(config.pic_height(), 768);
    }

    #[test]
    fn sps_conformance_window() {
        // 1920x1088 coded, bottom crop of 4 units at 4:2:0 (subHeightC 2).
        let sps = minimal_sps(1920, 1088, Some((0, 0, 0, 4)));
        let config = parse_sps(&sps).unwrap();
        assert_eq!(config.pic_width(), 1920);
        assert_eq!(config.pic_height(), 1080);
        assert_eq!(config.pic_height_in_luma_samples, 1088);
    }

    #[test]
    fn sps_with_start_code() {
        let mut data = vec![0, 0, 0, 1];
        data.extend_from_slice(&minimal_sps(640, 480, None));
        let config = parse_sps(&data).unwrap();
        assert_eq!(config.pic_width(), 640);
    }

    #[test]
    fn vps_without_extension() {
        let mut w = BitWriter::new();
        // NAL header: type 32 (VPS).
        w.write_bits(0, 1);
        w.write_bits(32, 6);
        w.write_bits(0, 6);
        w.write_bits(1, 3);

        w.write_bits(0, 4); // vps_video_parameter_set_id
        w.write_bits(1, 1); // vps_base_layer_internal_flag
        w.write_bits(1, 1); // vps_base_layer_available_flag
        w.write_bits(0, 6); // vps_max_layers_minus1
        w.write_bits(0, 3); // vps_max_sub_layers_minus1
        w.write_bits(1, 1); // vps_temporal_id_nesting_flag
        w.write_bits(0xffff, 16);
        write_ptl(&mut w);
        w.write_bits(1, 1); // vps_sub_layer_ordering_info_present_flag
        write_ue(&mut w, 0);
        write_ue(&mut w, 0);
        write_ue(&mut w, 0);
        w.write_bits(0, 6); // vps_max_layer_id
        write_ue(&mut w, 0); // vps_num_layer_sets_minus1
        w.write_bits(0, 1); // vps_timing_info_present_flag
        w.write_bits(0, 1); // vps_extension_flag
        let vps = w.finish();

        let parsed = parse_vps(&vps).unwrap();
        assert_eq!(parsed.max_layers_minus1, 0);
        assert!(parsed.extension.is_none());
        // Not layered: no oinf can be made.
        assert!(make_oinf(&vps).is_err());
    }
}
