//! Synthetic HEVC byte-streams for tests.

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
        w.write_bits(0, 8); // constraint flags
    }
    w.write_bits(93, 8); // general_level_idc
}

/// A parseable SPS NAL unit for the given dimensions.
pub(crate) fn test_sps(width: u32, height: u32) -> Vec<u8> {
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
    write_ue(&mut w, 1); // chroma_format_idc
    write_ue(&mut w, width);
    write_ue(&mut w, height);
    w.write_bit(false); // conformance_window_flag
    write_ue(&mut w, 0); // bit_depth_luma_minus8
    write_ue(&mut w, 0); // bit_depth_chroma_minus8
    write_ue(&mut w, 4); // log2_max_pic_order_cnt_lsb_minus4
    w.finish()
}

/// A byte-stream with VPS, SPS, PPS and `frames` IDR slices.
pub(crate) fn hevc_test_bitstream(width: u32, height: u32, frames: usize) -> Vec<u8> {
    let mut stream = Vec::new();
    let start_code = [0u8, 0, 0, 1];

    // VPS (type 32): only the header matters for intake.
    stream.extend_from_slice(&start_code);
    stream.extend_from_slice(&[0x40, 0x01, 0x0c, 0x01, 0xff, 0xff, 0x01, 0x60]);

    // SPS (type 33).
    stream.extend_from_slice(&start_code);
    stream.extend_from_slice(&test_sps(width, height));

    // PPS (type 34).
    stream.extend_from_slice(&start_code);
    stream.extend_from_slice(&[0x44, 0x01, 0xc0, 0x73, 0xc0, 0x4c, 0x90]);

    // IDR_W_RADL slices (type 19), payload varied per frame.
    for frame in 0..frames {
        stream.extend_from_slice(&start_code);
        stream.extend_from_slice(&[0x26, 0x01, 0xaf, 0x0d]);
        stream.push(frame as u8);
        stream.extend_from_slice(&[0x10, 0x20, 0x30, 0x40]);
    }

    stream
}
