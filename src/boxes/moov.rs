use std::io;

use crate::boxes::prelude::*;
use crate::boxes::{MovieHeaderBox, TrackBox};

def_box! {
    /// 8.2.1 Movie Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MovieBox {
        boxes:      Vec<HeifBox>,
    },
    fourcc => "moov",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl MovieBox {
    /// Get a reference to the list of tracks.
    pub fn tracks(&self) -> Vec<&TrackBox> {
        iter_box!(&self.boxes, TrackBox).collect()
    }

    /// Get a mutable reference to the list of tracks.
    pub fn tracks_mut(&mut self) -> Vec<&mut TrackBox> {
        iter_box_mut!(&mut self.boxes, TrackBox).collect()
    }

    /// Get a reference to the MovieHeaderBox.
    pub fn movie_header(&self) -> &MovieHeaderBox {
        first_box!(&self.boxes, MovieHeaderBox).unwrap()
    }

    /// Get the track by id.
    pub fn track_by_id(&self, track_id: u32) -> Option<&TrackBox> {
        self.tracks().into_iter().find(|t| t.track_id() == track_id)
    }

    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if self.tracks().is_empty() {
            log::error!("MovieBox: no TrackBoxes present");
            valid = false;
        }
        if first_box!(&self.boxes, MovieHeaderBox).is_none() {
            log::error!("MovieBox: no MovieHeaderBox present");
            valid = false;
        }
        for t in &self.tracks() {
            if !t.is_valid() {
                valid = false;
            }
        }
        valid
    }
}
