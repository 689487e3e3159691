//! Operating points information ('oinf', ISO/IEC 14496-15).

use std::io;

use crate::bitio::{BitReader, BitWriter};
use crate::boxes::prelude::*;
use crate::parser::hevc::{
    OinfInfo, OinfLayer, OperatingPoint, OperatingPointLayer, OpProfileTierLevel,
};

/// The operating points information property.
///
/// Enumerates the operating points of a layered (L-HEVC) bitstream:
/// per output layer set the layers, their profile/tier/level and the
/// picture dimension envelope. Synthesized from the VPS extension by
/// [`crate::parser::hevc::make_oinf`].
#[derive(Clone, Debug, Default)]
pub struct OperatingPointsInformation {
    pub info: OinfInfo,
}

impl OperatingPointsInformation {
    /// Layer ids required by the operating point of `output_layer_set_index`.
    pub fn layer_ids(&self, output_layer_set_index: u16) -> Option<Vec<u8>> {
        self.info
            .operating_points
            .iter()
            .find(|op| op.output_layer_set_idx == output_layer_set_index)
            .map(|op| op.layers.iter().map(|l| l.layer_id).collect())
    }

    /// `(max_width, max_height)` of the operating point.
    pub fn max_extents(&self, output_layer_set_index: u16) -> Option<(u32, u32)> {
        self.info
            .operating_points
            .iter()
            .find(|op| op.output_layer_set_idx == output_layer_set_index)
            .map(|op| (op.max_pic_width as u32, op.max_pic_height as u32))
    }
}

impl FromBytes for OperatingPointsInformation {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<OperatingPointsInformation> {
        let mut reader = BoxReader::new(stream)?;
        let left = reader.left();
        let body = reader.read(left)?.to_vec();
        let mut r = BitReader::new(&body);

        let mut info = OinfInfo::default();
        info.scalability_mask = r.read_bits(16)? as u16;
        r.read_bits(2)?; // reserved

        let ptl_count = r.read_bits(6)?;
        for _ in 0..ptl_count {
            let mut ptl = OpProfileTierLevel::default();
            ptl.general_profile_space = r.read_bits(2)? as u8;
            ptl.general_tier_flag = r.read_bits(1)? as u8;
            ptl.general_profile_idc = r.read_bits(5)? as u8;
            ptl.general_profile_compatibility_flags = r.read_bits(32)?;
            for i in 0..6 {
                ptl.general_constraint_indicator_flags[i] = r.read_bits(8)? as u8;
            }
            ptl.general_level_idc = r.read_bits(8)? as u8;
            info.profile_tier_levels.push(ptl);
        }

        let op_count = r.read_bits(16)?;
        for _ in 0..op_count {
            let mut op = OperatingPoint::default();
            op.output_layer_set_idx = r.read_bits(16)? as u16;
            r.read_bits(8)?; // reserved
            let layer_count = r.read_bits(8)?;
            for _ in 0..layer_count {
                op.layers.push(OperatingPointLayer {
                    ptl_idx: r.read_bits(8)? as u8,
                    layer_id: r.read_bits(6)? as u8,
                    is_output_layer: r.read_bits(1)? != 0,
                    is_alternate_output_layer: r.read_bits(1)? != 0,
                });
            }
            op.min_pic_width = r.read_bits(16)? as u16;
            op.min_pic_height = r.read_bits(16)? as u16;
            op.max_pic_width = r.read_bits(16)? as u16;
            op.max_pic_height = r.read_bits(16)? as u16;
            op.max_chroma_format = r.read_bits(2)? as u8;
            op.max_bit_depth_minus8 = r.read_bits(3)? as u8;
            r.read_bits(3)?; // reserved
            info.operating_points.push(op);
        }

        let layer_count = r.read_bits(8)?;
        for _ in 0..layer_count {
            let mut layer = OinfLayer::default();
            layer.dependent_layer_id = r.read_bits(8)? as u8;
            let dep_count = r.read_bits(8)?;
            for _ in 0..dep_count {
                layer.dependent_on_layer_ids.push(r.read_bits(8)? as u8);
            }
            for j in 0..16 {
                if info.scalability_mask & (1 << j) != 0 {
                    layer.dimension_identifiers.push(r.read_bits(8)? as u8);
                }
            }
            info.layers.push(layer);
        }

        Ok(OperatingPointsInformation { info })
    }

    fn min_size() -> usize {
        17
    }
}

impl ToBytes for OperatingPointsInformation {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;
        let mut w = BitWriter::new();
        let info = &self.info;

        w.write_bits(info.scalability_mask as u32, 16);
        w.write_bits(0, 2); // reserved

        w.write_bits(info.profile_tier_levels.len() as u32, 6);
        for ptl in &info.profile_tier_levels {
            w.write_bits(ptl.general_profile_space as u32, 2);
            w.write_bits(ptl.general_tier_flag as u32, 1);
            w.write_bits(ptl.general_profile_idc as u32, 5);
            w.write_u32(ptl.general_profile_compatibility_flags);
            for &b in &ptl.general_constraint_indicator_flags {
                w.write_u8(b);
            }
            w.write_u8(ptl.general_level_idc);
        }

        w.write_u16(info.operating_points.len() as u16);
        for op in &info.operating_points {
            w.write_u16(op.output_layer_set_idx);
            w.write_u8(0); // reserved
            w.write_u8(op.layers.len() as u8);
            for layer in &op.layers {
                w.write_u8(layer.ptl_idx);
                w.write_bits(layer.layer_id as u32, 6);
                w.write_bits(layer.is_output_layer as u32, 1);
                w.write_bits(layer.is_alternate_output_layer as u32, 1);
            }
            w.write_u16(op.min_pic_width);
            w.write_u16(op.min_pic_height);
            w.write_u16(op.max_pic_width);
            w.write_u16(op.max_pic_height);
            w.write_bits(op.max_chroma_format as u32, 2);
            w.write_bits(op.max_bit_depth_minus8 as u32, 3);
            w.write_bits(0, 3); // reserved
        }

        w.write_u8(info.layers.len() as u8);
        for layer in &info.layers {
            w.write_u8(layer.dependent_layer_id);
            w.write_u8(layer.dependent_on_layer_ids.len() as u8);
            for &id in &layer.dependent_on_layer_ids {
                w.write_u8(id);
            }
            for &dim in &layer.dimension_identifiers {
                w.write_u8(dim);
            }
        }

        writer.write(&w.finish())?;
        writer.finalize()
    }
}

impl BoxInfo for OperatingPointsInformation {
    fn fourcc(&self) -> FourCC {
        FourCC::new("oinf")
    }
    fn max_version() -> Option<u8> {
        Some(0)
    }
}

impl FullBox for OperatingPointsInformation {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    #[test]
    fn oinf_roundtrip() {
        let mut info = OinfInfo::default();
        // Scalability mask with bit 2 (multiview) set, two dimension ids.
        info.scalability_mask = 1 << 2;
        info.profile_tier_levels.push(OpProfileTierLevel {
            general_profile_space: 0,
            general_tier_flag: 0,
            general_profile_idc: 7, // Scalable Main
            general_profile_compatibility_flags: 0x60000000,
            general_constraint_indicator_flags: [0; 6],
            general_level_idc: 93,
        });
        info.operating_points.push(OperatingPoint {
            output_layer_set_idx: 1,
            layers: vec![
                OperatingPointLayer {
                    ptl_idx: 0,
                    layer_id: 0,
                    is_output_layer: false,
                    is_alternate_output_layer: false,
                },
                OperatingPointLayer {
                    ptl_idx: 0,
                    layer_id: 1,
                    is_output_layer: true,
                    is_alternate_output_layer: false,
                },
            ],
            min_pic_width: 640,
            min_pic_height: 480,
            max_pic_width: 1280,
            max_pic_height: 960,
            max_chroma_format: 1,
            max_bit_depth_minus8: 0,
        });
        info.layers.push(OinfLayer {
            dependent_layer_id: 1,
            dependent_on_layer_ids: vec![0],
            dimension_identifiers: vec![1],
        });

        let oinf = OperatingPointsInformation { info };
        let mut buf = MemBuffer::new();
        oinf.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd = crate::io::MemReader::from_slice(&v[..]);
        let back = OperatingPointsInformation::from_bytes(&mut rd).unwrap();

        assert_eq!(back.info, oinf.info);
        assert_eq!(back.layer_ids(1), Some(vec![0, 1]));
        assert_eq!(back.max_extents(1), Some((1280, 960)));
    }
}
