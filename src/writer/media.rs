//! Master bitstream intake.
//!
//! Parses an HEVC/AVC byte-stream once: parameter sets feed the
//! decoder configuration record, the remaining NAL units are split
//! into images at random-access boundaries and converted to the
//! length-prefixed form that goes into the MediaDataBox.

use std::io;

use crate::boxes::{
    AvcConfigurationBox, AvcDecoderConfigurationRecord, HevcConfigurationBox,
    HevcDecoderConfigurationRecord,
};
use crate::error::{Error, Result};
use crate::nal::{self, AvcNalUnitType, HevcNalUnitType};

/// The decoder configuration of an intake, by codec.
#[derive(Clone, Debug)]
pub enum DecoderConfig {
    Hevc(HevcConfigurationBox),
    Avc(AvcConfigurationBox),
}

impl DecoderConfig {
    /// Display dimensions after conformance cropping.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            DecoderConfig::Hevc(c) => (c.configuration.pic_width(), c.configuration.pic_height()),
            DecoderConfig::Avc(c) => (c.configuration.pic_width, c.configuration.pic_height),
        }
    }
}

/// One coded image: its NAL units in length-prefixed form.
#[derive(Clone, Debug)]
pub struct ImagePayload {
    pub data: Vec<u8>,
}

/// A parsed master/thumbnail/auxiliary bitstream.
#[derive(Clone, Debug)]
pub struct MediaIntake {
    pub config: DecoderConfig,
    pub images: Vec<ImagePayload>,
}

/// Parse a byte-stream into a [`MediaIntake`].
pub fn intake_bitstream(data: &[u8], code_type: &str, frame_rate: f64) -> Result<MediaIntake> {
    match code_type {
        "hvc1" => intake_hevc(data, frame_rate),
        "avc1" => intake_avc(data),
        other => Err(Error::WriterValidation(format!(
            "unsupported code_type {}",
            other
        ))),
    }
}

fn length_prefixed(nals: &[&[u8]]) -> Vec<u8> {
    let mut out = Vec::new();
    for nal in nals {
        out.extend_from_slice(&(nal.len() as u32).to_be_bytes());
        out.extend_from_slice(nal);
    }
    out
}

fn intake_hevc(data: &[u8], frame_rate: f64) -> Result<MediaIntake> {
    let nals = nal::split_byte_stream(data);
    if nals.is_empty() {
        return Err(Error::MediaParsing("no NAL units in bitstream".to_string()));
    }

    let mut record = HevcDecoderConfigurationRecord::default();
    let mut sps_seen = false;

    // First pass: parameter sets into the configuration record.
    for &nal_unit in &nals {
        let nal_type = HevcNalUnitType::from_nal_header(nal_unit[0]);
        match nal_type {
            HevcNalUnitType::Sps => {
                if !sps_seen {
                    record
                        .make_config_from_sps(nal_unit, frame_rate)
                        .map_err(map_parse_err)?;
                    sps_seen = true;
                }
                record.add_nal_unit(nal_unit, HevcNalUnitType::Sps, true);
            },
            HevcNalUnitType::Vps => record.add_nal_unit(nal_unit, HevcNalUnitType::Vps, true),
            HevcNalUnitType::Pps => record.add_nal_unit(nal_unit, HevcNalUnitType::Pps, true),
            _ => {},
        }
    }
    if !sps_seen {
        return Err(Error::MediaParsing("bitstream carries no SPS".to_string()));
    }
    if record.nal_units_of_type(HevcNalUnitType::Pps).is_empty() {
        return Err(Error::MediaParsing("bitstream carries no PPS".to_string()));
    }

    // Second pass: split the coded slices into images. A random-access
    // NAL unit starts a new image; leading non-VCL units (SEI) stick
    // to the image that follows them.
    let mut images = Vec::new();
    let mut current: Vec<&[u8]> = Vec::new();
    for &nal_unit in &nals {
        let nal_type = HevcNalUnitType::from_nal_header(nal_unit[0]);
        if nal_type.is_parameter_set() {
            continue;
        }
        if nal_type.is_rap() && !current.is_empty() {
            images.push(ImagePayload {
                data: length_prefixed(&current),
            });
            current.clear();
        }
        current.push(nal_unit);
    }
    if !current.is_empty() {
        images.push(ImagePayload {
            data: length_prefixed(&current),
        });
    }
    if images.is_empty() {
        return Err(Error::MediaParsing("bitstream carries no coded images".to_string()));
    }

    Ok(MediaIntake {
        config: DecoderConfig::Hevc(HevcConfigurationBox {
            configuration: record,
        }),
        images,
    })
}

fn intake_avc(data: &[u8]) -> Result<MediaIntake> {
    let nals = nal::split_byte_stream(data);
    if nals.is_empty() {
        return Err(Error::MediaParsing("no NAL units in bitstream".to_string()));
    }

    let mut record = AvcDecoderConfigurationRecord::default();
    let mut sps_seen = false;

    for &nal_unit in &nals {
        let nal_type = AvcNalUnitType::from_nal_header(nal_unit[0]);
        match nal_type {
            AvcNalUnitType::Sps => {
                if !sps_seen {
                    record.make_config_from_sps(nal_unit).map_err(map_parse_err)?;
                    sps_seen = true;
                }
                record.add_nal_unit(nal_unit, AvcNalUnitType::Sps);
            },
            AvcNalUnitType::Pps => record.add_nal_unit(nal_unit, AvcNalUnitType::Pps),
            AvcNalUnitType::SpsExt => record.add_nal_unit(nal_unit, AvcNalUnitType::SpsExt),
            _ => {},
        }
    }
    if !sps_seen {
        return Err(Error::MediaParsing("bitstream carries no SPS".to_string()));
    }

    let mut images = Vec::new();
    let mut current: Vec<&[u8]> = Vec::new();
    for &nal_unit in &nals {
        let nal_type = AvcNalUnitType::from_nal_header(nal_unit[0]);
        if nal_type.is_parameter_set() {
            continue;
        }
        if nal_type == AvcNalUnitType::CodedSliceIdr && !current.is_empty() {
            images.push(ImagePayload {
                data: length_prefixed(&current),
            });
            current.clear();
        }
        current.push(nal_unit);
    }
    if !current.is_empty() {
        images.push(ImagePayload {
            data: length_prefixed(&current),
        });
    }
    if images.is_empty() {
        return Err(Error::MediaParsing("bitstream carries no coded images".to_string()));
    }

    Ok(MediaIntake {
        config: DecoderConfig::Avc(AvcConfigurationBox {
            configuration: record,
        }),
        images,
    })
}

fn map_parse_err(e: io::Error) -> Error {
    Error::MediaParsing(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::testutil::hevc_test_bitstream;

    #[test]
    fn intake_splits_images() {
        let stream = hevc_test_bitstream(640, 480, 3);
        let intake = intake_bitstream(&stream, "hvc1", 30.0).unwrap();
        assert_eq!(intake.images.len(), 3);
        assert_eq!(intake.config.dimensions(), (640, 480));
        match &intake.config {
            DecoderConfig::Hevc(c) => {
                assert_eq!(c.configuration.nal_units_of_type(HevcNalUnitType::Vps).len(), 1);
                assert_eq!(c.configuration.nal_units_of_type(HevcNalUnitType::Sps).len(), 1);
                assert_eq!(c.configuration.nal_units_of_type(HevcNalUnitType::Pps).len(), 1);
            },
            _ => panic!("expected HEVC config"),
        }
    }

    #[test]
    fn image_payloads_are_length_prefixed() {
        let stream = hevc_test_bitstream(64, 64, 1);
        let intake = intake_bitstream(&stream, "hvc1", 30.0).unwrap();
        let payload = &intake.images[0].data;
        let len = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize;
        assert_eq!(len + 4, payload.len());
    }

    #[test]
    fn missing_sps_is_an_error() {
        // Only an IDR slice, no parameter sets.
        let mut stream = vec![0, 0, 0, 1];
        stream.extend_from_slice(&[0x26, 0x01, 0xaf, 0x0d]);
        assert!(intake_bitstream(&stream, "hvc1", 30.0).is_err());
    }
}
