//! AVC decoder configuration.

use std::io;

use crate::boxes::prelude::*;
use crate::nal::{self, AvcNalUnitType};
use crate::parser::avc as avcparser;

def_box! {
    /// AVCConfigurationBox (ISO/IEC 14496-15)
    #[derive(Default)]
    AvcConfigurationBox {
        configuration: AvcDecoderConfigurationRecord,
    },
    fourcc => "avcC",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

// aligned(8) class AVCDecoderConfigurationRecord {
//     unsigned int(8) configurationVersion = 1;
//     unsigned int(8) AVCProfileIndication;
//     unsigned int(8) profile_compatibility;
//     unsigned int(8) AVCLevelIndication;
//     bit(6) reserved = '111111'b;
//     unsigned int(2) lengthSizeMinusOne;
//     bit(3) reserved = '111'b;
//     unsigned int(5) numOfSequenceParameterSets;
//     ...
//     unsigned int(8) numOfPictureParameterSets;
//     ...
//     profile-conditional chroma/bit depth block plus SPS extensions.
// }
#[derive(Clone, Debug)]
pub struct AvcDecoderConfigurationRecord {
    pub configuration_version:   u8,
    pub profile_indication:      u8,
    pub profile_compatibility:   u8,
    pub level_indication:        u8,
    pub length_size_minus1:      u8,
    pub chroma_format:           u8,
    pub bit_depth_luma_minus8:   u8,
    pub bit_depth_chroma_minus8: u8,
    // Parsed from the SPS, not part of the written record.
    pub pic_width:               u32,
    pub pic_height:              u32,
    nal_arrays:                  Vec<(AvcNalUnitType, Vec<Vec<u8>>)>,
}

impl Default for AvcDecoderConfigurationRecord {
    fn default() -> Self {
        AvcDecoderConfigurationRecord {
            configuration_version: 1,
            profile_indication: 66,
            profile_compatibility: 128,
            level_indication: 30,
            length_size_minus1: 3,
            chroma_format: 0,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            pic_width: 0,
            pic_height: 0,
            nal_arrays: Vec::new(),
        }
    }
}

impl AvcDecoderConfigurationRecord {
    fn has_extended_profile(&self) -> bool {
        matches!(self.profile_indication, 100 | 110 | 122 | 144)
    }

    /// Fill the record from an SPS NAL unit.
    pub fn make_config_from_sps(&mut self, sps: &[u8]) -> io::Result<()> {
        let config = avcparser::parse_sps(sps)?;
        self.profile_indication = config.profile_idc;
        self.profile_compatibility = config.constraint_flags;
        self.level_indication = config.level_idc;
        self.length_size_minus1 = 3;
        self.chroma_format = config.chroma_format_idc;
        self.bit_depth_luma_minus8 = config.bit_depth_luma_minus8;
        self.bit_depth_chroma_minus8 = config.bit_depth_chroma_minus8;
        self.pic_width = config.pic_width;
        self.pic_height = config.pic_height;
        self.nal_arrays.clear();
        Ok(())
    }

    /// Add a parameter set NAL unit (a possible start code is stripped).
    pub fn add_nal_unit(&mut self, nal_unit: &[u8], nal_unit_type: AvcNalUnitType) {
        let sc = nal::find_start_code_len(nal_unit);
        let data = nal_unit[sc..].to_vec();
        for (t, list) in self.nal_arrays.iter_mut() {
            if *t == nal_unit_type {
                list.push(data);
                return;
            }
        }
        self.nal_arrays.push((nal_unit_type, vec![data]));
    }

    pub fn nal_units_of_type(&self, nal_unit_type: AvcNalUnitType) -> &[Vec<u8>] {
        self.nal_arrays
            .iter()
            .find(|(t, _)| *t == nal_unit_type)
            .map(|(_, list)| &list[..])
            .unwrap_or(&[])
    }

    /// The first parameter set of a type, with a start code in front.
    pub fn parameter_set_with_start_code(&self, nal_unit_type: AvcNalUnitType) -> Vec<u8> {
        let mut v = Vec::new();
        if let Some(ps) = self.nal_units_of_type(nal_unit_type).first() {
            v.extend_from_slice(&[0, 0, 0, 1]);
            v.extend_from_slice(ps);
        }
        v
    }

    fn write_nal_list<W: WriteBytes>(&self, stream: &mut W, t: AvcNalUnitType) -> io::Result<()> {
        for nal in self.nal_units_of_type(t) {
            (nal.len() as u16).to_bytes(stream)?;
            stream.write(nal)?;
        }
        Ok(())
    }
}

impl FromBytes for AvcDecoderConfigurationRecord {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<AvcDecoderConfigurationRecord> {
        let mut rec = AvcDecoderConfigurationRecord::default();

        rec.configuration_version = u8::from_bytes(stream)?;
        rec.profile_indication = u8::from_bytes(stream)?;
        rec.profile_compatibility = u8::from_bytes(stream)?;
        rec.level_indication = u8::from_bytes(stream)?;
        rec.length_size_minus1 = u8::from_bytes(stream)? & 0x3;

        let num_sps = u8::from_bytes(stream)? & 0x1f;
        for _ in 0..num_sps {
            let len = u16::from_bytes(stream)? as usize;
            let data = Data::read(stream, len)?;
            rec.add_nal_unit(&data.0, AvcNalUnitType::Sps);
        }

        let num_pps = u8::from_bytes(stream)?;
        for _ in 0..num_pps {
            let len = u16::from_bytes(stream)? as usize;
            let data = Data::read(stream, len)?;
            rec.add_nal_unit(&data.0, AvcNalUnitType::Pps);
        }

        // Derive geometry from the first SPS.
        if let Some(sps) = rec.nal_units_of_type(AvcNalUnitType::Sps).first() {
            if let Ok(config) = avcparser::parse_sps(sps) {
                rec.pic_width = config.pic_width;
                rec.pic_height = config.pic_height;
            }
        }

        // The extended block is only present for the high profiles, and
        // some muxers leave it out entirely.
        if rec.has_extended_profile() && stream.left() >= 4 {
            rec.chroma_format = u8::from_bytes(stream)? & 0x3;
            rec.bit_depth_luma_minus8 = u8::from_bytes(stream)? & 0x7;
            rec.bit_depth_chroma_minus8 = u8::from_bytes(stream)? & 0x7;
            let num_sps_ext = u8::from_bytes(stream)?;
            for _ in 0..num_sps_ext {
                let len = u16::from_bytes(stream)? as usize;
                let data = Data::read(stream, len)?;
                rec.add_nal_unit(&data.0, AvcNalUnitType::SpsExt);
            }
        }

        Ok(rec)
    }

    fn min_size() -> usize {
        7
    }
}

impl ToBytes for AvcDecoderConfigurationRecord {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        self.configuration_version.to_bytes(stream)?;
        self.profile_indication.to_bytes(stream)?;
        self.profile_compatibility.to_bytes(stream)?;
        self.level_indication.to_bytes(stream)?;
        (0xfc | (self.length_size_minus1 & 0x3)).to_bytes(stream)?;

        let num_sps = self.nal_units_of_type(AvcNalUnitType::Sps).len();
        if num_sps > 31 {
            return Err(ioerr!(InvalidData, "avcC: too many SPS NAL units"));
        }
        (0xe0 | num_sps as u8).to_bytes(stream)?;
        self.write_nal_list(stream, AvcNalUnitType::Sps)?;

        let num_pps = self.nal_units_of_type(AvcNalUnitType::Pps).len();
        if num_pps > 255 {
            return Err(ioerr!(InvalidData, "avcC: too many PPS NAL units"));
        }
        (num_pps as u8).to_bytes(stream)?;
        self.write_nal_list(stream, AvcNalUnitType::Pps)?;

        if self.has_extended_profile() {
            (0xfc | (self.chroma_format & 0x3)).to_bytes(stream)?;
            (0xf8 | (self.bit_depth_luma_minus8 & 0x7)).to_bytes(stream)?;
            (0xf8 | (self.bit_depth_chroma_minus8 & 0x7)).to_bytes(stream)?;
            let num_ext = self.nal_units_of_type(AvcNalUnitType::SpsExt).len();
            (num_ext as u8).to_bytes(stream)?;
            self.write_nal_list(stream, AvcNalUnitType::SpsExt)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemBuffer;

    #[test]
    fn record_roundtrip() {
        let mut rec = AvcDecoderConfigurationRecord::default();
        rec.add_nal_unit(&[0x67, 1, 2, 3], AvcNalUnitType::Sps);
        rec.add_nal_unit(&[0x68, 9], AvcNalUnitType::Pps);

        let mut buf = MemBuffer::new();
        rec.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        let mut rd: &[u8] = &v[..];
        let back = AvcDecoderConfigurationRecord::from_bytes(&mut rd).unwrap();
        assert_eq!(back.profile_indication, 66);
        assert_eq!(back.length_size_minus1, 3);
        assert_eq!(back.nal_units_of_type(AvcNalUnitType::Sps).len(), 1);
        assert_eq!(back.nal_units_of_type(AvcNalUnitType::Pps)[0], vec![0x68, 9]);
    }

    #[test]
    fn start_code_is_stripped_on_add() {
        let mut rec = AvcDecoderConfigurationRecord::default();
        rec.add_nal_unit(&[0, 0, 0, 1, 0x68, 5, 6], AvcNalUnitType::Pps);
        assert_eq!(rec.nal_units_of_type(AvcNalUnitType::Pps)[0], vec![0x68, 5, 6]);
    }

    #[test]
    fn reserved_bits_are_ones() {
        let rec = AvcDecoderConfigurationRecord::default();
        let mut buf = MemBuffer::new();
        rec.to_bytes(&mut buf).unwrap();
        let v = buf.into_vec();
        assert_eq!(v[4] & 0xfc, 0xfc);
        assert_eq!(v[5] & 0xe0, 0xe0);
    }
}
