//! Declarative writer configuration.
//!
//! The configuration is a JSON document (see `heif write`), or can be
//! built programmatically. It enumerates content sources: master
//! bitstreams, thumbnails, auxiliary images, metadata items, derived
//! images and entity groups, plus output brands and the primary item.

use std::fs;
use std::io;

use serde::Deserialize;

/// A content input: a file path, or inline bytes (programmatic use).
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum Input {
    Path { file_path: String },
    Bytes { bytes: Vec<u8> },
}

impl Input {
    pub fn from_bytes(bytes: Vec<u8>) -> Input {
        Input::Bytes { bytes }
    }

    pub fn read(&self) -> io::Result<Vec<u8>> {
        match self {
            Input::Path { file_path } => fs::read(file_path),
            Input::Bytes { bytes } => Ok(bytes.clone()),
        }
    }
}

impl Default for Input {
    fn default() -> Input {
        Input::Bytes { bytes: Vec::new() }
    }
}

/// Reference to one image of a content: the content's `uniq_bsid`
/// plus a 1-based image index.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RefId {
    pub uniq_bsid: u32,
    pub index:     u32,
}

/// References to images of a content; an empty index list means all.
#[derive(Clone, Debug, Deserialize)]
pub struct RefsList {
    pub uniq_bsid: u32,
    #[serde(default)]
    pub idxs:      Vec<u32>,
}

fn default_code_type() -> String {
    "hvc1".to_string()
}

fn default_encapsulation() -> String {
    "meta".to_string()
}

fn default_fps() -> f64 {
    30.0
}

fn default_timescale() -> u32 {
    1000
}

/// A master bitstream.
#[derive(Clone, Debug, Deserialize)]
pub struct MasterConfig {
    pub uniq_bsid:     u32,
    #[serde(flatten)]
    pub input:         Input,
    #[serde(default = "default_code_type")]
    pub code_type:     String,
    /// "meta" for an untimed collection, "trak" for an image sequence.
    #[serde(default = "default_encapsulation")]
    pub encapsulation: String,
    #[serde(default)]
    pub hidden:        bool,
    #[serde(default = "default_fps")]
    pub fps:           f64,
    #[serde(default = "default_timescale")]
    pub timescale:     u32,
    /// Loop the image sequence indefinitely.
    #[serde(default)]
    pub looping:       bool,
}

/// A thumbnail bitstream for a master.
#[derive(Clone, Debug, Deserialize)]
pub struct ThumbsConfig {
    pub uniq_bsid: u32,
    #[serde(flatten)]
    pub input:     Input,
    #[serde(default = "default_code_type")]
    pub code_type: String,
    /// Every `sync_rate`-th master image gets a thumbnail.
    #[serde(default)]
    pub sync_rate: Option<u32>,
    /// Explicit 1-based master image indexes (alternative to sync_rate).
    #[serde(default)]
    pub sync_idxs: Vec<u32>,
}

/// An auxiliary (alpha / depth) bitstream for a master.
#[derive(Clone, Debug, Deserialize)]
pub struct AuxConfig {
    pub uniq_bsid: u32,
    #[serde(flatten)]
    pub input:     Input,
    #[serde(default = "default_code_type")]
    pub code_type: String,
    /// The auxiliary type URN, e.g.
    /// "urn:mpeg:mpegB:cicp:systems:auxiliary:alpha".
    pub urn:       String,
    /// Explicit 1-based master image indexes; empty pairs 1:1.
    #[serde(default)]
    pub idxs_list: Vec<u32>,
    #[serde(default)]
    pub hidden:    bool,
}

/// An Exif or XML metadata item, linked to the master with `cdsc`.
#[derive(Clone, Debug, Deserialize)]
pub struct MetadataConfig {
    #[serde(flatten)]
    pub input:     Input,
    /// "Exif" or "mime".
    pub item_type: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// An identity derivation (rotation, mirror, crop, relative location).
#[derive(Clone, Debug, Deserialize)]
pub struct IdenConfig {
    #[serde(flatten)]
    pub transform: IdenTransform,
    pub refs:      Vec<RefsList>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdenTransform {
    Irot {
        angle: u16,
    },
    Imir {
        horizontal_axis: bool,
    },
    Rloc {
        horizontal_offset: u32,
        vertical_offset:   u32,
    },
    Clap {
        width_n:  u32,
        width_d:  u32,
        height_n: u32,
        height_d: u32,
        horiz_off_n: u32,
        horiz_off_d: u32,
        vert_off_n:  u32,
        vert_off_d:  u32,
    },
}

/// A grid derived item.
#[derive(Clone, Debug, Deserialize)]
pub struct GridConfig {
    pub uniq_bsid:     u32,
    pub rows:          u8,
    pub columns:       u8,
    pub output_width:  u32,
    pub output_height: u32,
    pub refs:          Vec<RefsList>,
}

/// An overlay derived item.
#[derive(Clone, Debug, Deserialize)]
pub struct OverlayConfig {
    pub uniq_bsid:     u32,
    #[serde(default)]
    pub canvas_fill:   [u16; 4],
    pub output_width:  u32,
    pub output_height: u32,
    /// One (horizontal, vertical) placement per referenced image.
    pub offsets:       Vec<(i32, i32)>,
    pub refs:          Vec<RefsList>,
}

/// A pre-derived coded image: carries `base` references to the
/// conceptual inputs of the derivation.
#[derive(Clone, Debug, Deserialize)]
pub struct PreDerivedConfig {
    pub uniq_bsid: u32,
    #[serde(flatten)]
    pub input:     Input,
    #[serde(default = "default_code_type")]
    pub code_type: String,
    pub base_refs: Vec<RefsList>,
}

/// Derived images of one content.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DerivedConfig {
    #[serde(default)]
    pub iden:        Vec<IdenConfig>,
    #[serde(default)]
    pub grids:       Vec<GridConfig>,
    #[serde(default)]
    pub overlays:    Vec<OverlayConfig>,
    #[serde(default)]
    pub pre_derived: Vec<PreDerivedConfig>,
}

/// One content: a master plus its dependents.
#[derive(Clone, Debug, Deserialize)]
pub struct ContentConfig {
    pub master:    MasterConfig,
    #[serde(default)]
    pub thumbs:    Vec<ThumbsConfig>,
    #[serde(default)]
    pub auxiliary: Vec<AuxConfig>,
    #[serde(default)]
    pub metadata:  Vec<MetadataConfig>,
    #[serde(default)]
    pub derived:   DerivedConfig,
}

/// An `altr` entity group over content images.
#[derive(Clone, Debug, Deserialize)]
pub struct EntityGroupConfig {
    pub refs: Vec<RefId>,
}

fn default_major_brand() -> String {
    "heic".to_string()
}

#[derive(Clone, Debug, Deserialize)]
pub struct BrandsConfig {
    #[serde(default = "default_major_brand")]
    pub major: String,
    #[serde(default)]
    pub other: Vec<String>,
}

impl Default for BrandsConfig {
    fn default() -> BrandsConfig {
        BrandsConfig {
            major: default_major_brand(),
            other: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default)]
    pub output_file:  Option<String>,
    #[serde(default)]
    pub brands:       BrandsConfig,
    /// Primary item; defaults to the first master image.
    #[serde(default)]
    pub primary_item: Option<RefId>,
}

impl Default for GeneralConfig {
    fn default() -> GeneralConfig {
        GeneralConfig {
            output_file: None,
            brands: BrandsConfig::default(),
            primary_item: None,
        }
    }
}

/// The complete writer configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct WriterConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    pub content: Vec<ContentConfig>,
    #[serde(default)]
    pub egroups: Vec<EntityGroupConfig>,
}

impl WriterConfig {
    pub fn from_json(json: &str) -> serde_json::Result<WriterConfig> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let json = r#"{
            "general": {
                "brands": { "major": "heic", "other": ["mif1", "heic"] },
                "primary_item": { "uniq_bsid": 1, "index": 1 }
            },
            "content": [
                {
                    "master": {
                        "uniq_bsid": 1,
                        "file_path": "master.265",
                        "code_type": "hvc1",
                        "encapsulation": "meta"
                    },
                    "thumbs": [
                        { "uniq_bsid": 2, "file_path": "thumb.265", "sync_rate": 1 }
                    ]
                }
            ]
        }"#;
        let config = WriterConfig::from_json(json).unwrap();
        assert_eq!(config.content.len(), 1);
        assert_eq!(config.content[0].master.uniq_bsid, 1);
        assert_eq!(config.content[0].thumbs[0].sync_rate, Some(1));
        assert_eq!(
            config.general.primary_item,
            Some(RefId {
                uniq_bsid: 1,
                index: 1
            })
        );
    }

    #[test]
    fn derived_config() {
        let json = r#"{
            "content": [
                {
                    "master": { "uniq_bsid": 1, "file_path": "tiles.265" },
                    "derived": {
                        "grids": [
                            {
                                "uniq_bsid": 10,
                                "rows": 2, "columns": 2,
                                "output_width": 1024, "output_height": 1024,
                                "refs": [ { "uniq_bsid": 1 } ]
                            }
                        ],
                        "iden": [
                            { "irot": { "angle": 90 }, "refs": [ { "uniq_bsid": 1, "idxs": [1] } ] }
                        ]
                    }
                }
            ]
        }"#;
        let config = WriterConfig::from_json(json).unwrap();
        let derived = &config.content[0].derived;
        assert_eq!(derived.grids.len(), 1);
        assert_eq!(derived.grids[0].refs[0].uniq_bsid, 1);
        match derived.iden[0].transform {
            IdenTransform::Irot { angle } => assert_eq!(angle, 90),
            _ => panic!("expected irot"),
        }
    }
}
