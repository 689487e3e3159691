use std::io;

use crate::boxes::prelude::*;
use crate::boxes::{
    EditBox, EditListBox, MediaBox, MediaInformationBox, SampleTableBox, TrackReferenceBox,
};

def_box! {
    /// 8.3.1 Track Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    TrackBox {
        boxes:      Vec<HeifBox>,
    },
    fourcc => "trak",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl TrackBox {
    declare_box_methods!(TrackHeaderBox, track_header, track_header_mut);
    declare_box_methods!(MediaBox, media, media_mut);
    declare_box_methods_opt!(TrackReferenceBox, track_reference, track_reference_mut);

    /// Get the track id.
    pub fn track_id(&self) -> u32 {
        self.track_header().track_id
    }

    /// Get the edit list, if it is present and has at least one entry.
    pub fn edit_list(&self) -> Option<&EditListBox> {
        if let Some(edts) = first_box!(&self.boxes, EditBox) {
            if let Some(elst) = first_box!(&edts.boxes, EditListBox) {
                if elst.entries.len() > 0 {
                    return Some(elst);
                }
            }
        }
        None
    }

    /// Check if this track is valid (has header and media boxes).
    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        let track_id = match first_box!(&self.boxes, TrackHeaderBox) {
            Some(th) => th.track_id,
            None => {
                log::error!("TrackBox: no TrackHeaderBox present");
                return false;
            },
        };

        match first_box!(&self.boxes, MediaBox) {
            Some(m) => {
                if !m.is_valid() {
                    valid = false;
                }
            },
            None => {
                log::error!("TrackBox(id {}): no MediaBox present", track_id);
                valid = false;
            },
        }

        if let Some(m) = first_box!(&self.boxes, MediaBox) {
            if first_box!(&m.boxes, MediaInformationBox)
                .and_then(|mi| first_box!(&mi.boxes, SampleTableBox))
                .is_none()
            {
                log::error!("TrackBox(id {}): no SampleTableBox present", track_id);
                valid = false;
            }
        }

        valid
    }

    /// The SampleTableBox of this track.
    pub fn sample_table(&self) -> &SampleTableBox {
        self.media().media_info().sample_table()
    }
}

def_box! {
    /// 8.3.2 Track Header Box (ISO/IEC 14496-12:2015(E))
    TrackHeaderBox {
        flags:      TrackFlags,
        cr_time:    Time,
        mod_time:   Time,
        track_id:   u32,
        skip:       4,
        duration:   Duration_,
        skip:       8,
        layer:      u16,
        alt_group:  u16,
        volume:     FixedFloat8_8,
        skip:       2,
        matrix:     Matrix,
        width:      FixedFloat16_16,
        height:     FixedFloat16_16,
    },
    fourcc => "tkhd",
    version => [1, flags, cr_time, mod_time, duration],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl Default for TrackHeaderBox {
    fn default() -> TrackHeaderBox {
        let mut flags = TrackFlags::default();
        flags.set_enabled(true);
        TrackHeaderBox {
            flags,
            cr_time: Time::default(),
            mod_time: Time::default(),
            track_id: 1,
            duration: Duration_::default(),
            layer: 0,
            alt_group: 0,
            volume: FixedFloat8_8::default(),
            matrix: Matrix::default(),
            width: FixedFloat16_16::default(),
            height: FixedFloat16_16::default(),
        }
    }
}

impl_flags!(
    /// Track: enabled/in_movie/preview
    TrackFlags
);

impl TrackFlags {
    pub fn get_enabled(&self) -> bool {
        self.get(0)
    }
    pub fn set_enabled(&mut self, on: bool) {
        self.set(0, on)
    }
    pub fn get_in_movie(&self) -> bool {
        self.get(1)
    }
    pub fn set_in_movie(&mut self, on: bool) {
        self.set(1, on)
    }
    pub fn get_in_preview(&self) -> bool {
        self.get(2)
    }
    pub fn set_in_preview(&mut self, on: bool) {
        self.set(2, on)
    }
}

impl Default for TrackFlags {
    fn default() -> TrackFlags {
        TrackFlags(0)
    }
}

impl std::fmt::Debug for TrackFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut v = vec!["["];
        if self.get_enabled() {
            v.push("enabled");
        }
        if self.get_in_movie() {
            v.push("in_movie");
        }
        if self.get_in_preview() {
            v.push("in_preview");
        }
        v.push("]");
        write!(f, "TrackFlags({})", v.join(" "))
    }
}
