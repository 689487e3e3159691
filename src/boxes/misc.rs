use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 4.3 File Type Box (ISO/IEC 14496-12:2015(E))
    FileTypeBox {
        major_brand:        FourCC,
        minor_version:      u32,
        compatible_brands:  Vec<FourCC>,
    },
    fourcc => "ftyp",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

// Major brands we accept.
const MAJOR_BRANDS: &[&[u8; 4]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"hevm", b"hevs", b"mif1", b"msf1",
];

impl FileTypeBox {
    /// Is the major brand one of the HEIF brands.
    pub fn has_heif_major_brand(&self) -> bool {
        MAJOR_BRANDS.iter().any(|b| self.major_brand == *b)
    }

    pub fn has_compatible_brand(&self, brand: &[u8; 4]) -> bool {
        self.compatible_brands.iter().any(|b| *b == brand)
    }

    /// The compatible-brands set indicates a still-image (`mif1` + `heic`) file.
    pub fn has_image_collection_brands(&self) -> bool {
        self.has_compatible_brand(b"mif1") && self.has_compatible_brand(b"heic")
    }

    /// The compatible-brands set indicates an image-sequence (`msf1` + `hevc`) file.
    pub fn has_image_sequence_brands(&self) -> bool {
        self.has_compatible_brand(b"msf1") && self.has_compatible_brand(b"hevc")
    }
}

def_box! {
    /// 8.4.3 Handler Reference Box (ISO/IEC 14496-12:2015(E))
    HandlerBox {
        skip:           4,
        handler_type:   FourCC,
        skip:           12,
        name:           ZString,
    },
    fourcc => "hdlr",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl HandlerBox {
    /// Handler for an untimed image collection.
    pub fn is_picture(&self) -> bool {
        self.handler_type == b"pict"
    }

    /// Handler for a video (image sequence) track.
    pub fn is_video(&self) -> bool {
        self.handler_type == b"vide"
    }

    pub fn picture() -> HandlerBox {
        HandlerBox {
            handler_type: FourCC::new("pict"),
            name: ZString::default(),
        }
    }

    pub fn video() -> HandlerBox {
        HandlerBox {
            handler_type: FourCC::new("vide"),
            name: ZString::default(),
        }
    }
}

def_box! {
    /// 8.2.2 Movie Header Box (ISO/IEC 14496-12:2015(E))
    MovieHeaderBox {
        cr_time:    Time,
        mod_time:   Time,
        timescale:  u32,
        duration:   Duration_,
        pref_rate:  FixedFloat16_16,
        pref_vol:   FixedFloat8_8,
        skip:       10,
        matrix:     Matrix,
        skip:       24,
        next_track_id: u32,
    },
    fourcc => "mvhd",
    version => [1, cr_time, mod_time, duration],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl Default for MovieHeaderBox {
    fn default() -> MovieHeaderBox {
        MovieHeaderBox {
            cr_time: Time::default(),
            mod_time: Time::default(),
            timescale: 1000,
            duration: Duration_::default(),
            pref_rate: 1f64.into(),
            pref_vol: 1f64.into(),
            matrix: Matrix::default(),
            next_track_id: 1,
        }
    }
}

def_box! {
    /// 8.4.2 Media Header Box (ISO/IEC 14496-12:2015(E))
    MediaHeaderBox {
        cr_time:    Time,
        mod_time:   Time,
        timescale:  u32,
        duration:   Duration_,
        language:   IsoLanguageCode,
        quality:    u16,
    },
    fourcc => "mdhd",
    version => [1, cr_time, mod_time, duration],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

def_box! {
    /// 12.1.2 Video Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    VideoMediaHeaderBox {
        graphics_mode:  u16,
        opcolor_r:      u16,
        opcolor_g:      u16,
        opcolor_b:      u16,
    },
    fourcc => "vmhd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes ],
}

// vmhd always has flags = 1.
impl FullBox for VideoMediaHeaderBox {
    fn version(&self) -> Option<u8> {
        Some(0)
    }
    fn flags(&self) -> u32 {
        1
    }
}

def_box! {
    /// 8.4.5.2 Null Media Header Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    NullMediaHeaderBox {
    },
    fourcc => "nmhd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}
