use std::io;

use crate::boxes::prelude::*;
use crate::boxes::{DataInformationBox, HandlerBox, MediaHeaderBox, SampleTableBox};

def_box! {
    /// 8.4.1 Media Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MediaBox {
        boxes:      Vec<HeifBox>,
    },
    fourcc => "mdia",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl MediaBox {
    declare_box_methods!(MediaHeaderBox, media_header, media_header_mut);
    declare_box_methods!(HandlerBox, handler, handler_mut);
    declare_box_methods!(MediaInformationBox, media_info, media_info_mut);

    pub fn is_valid(&self) -> bool {
        let mut valid = true;
        if first_box!(&self.boxes, MediaHeaderBox).is_none() {
            log::error!("MediaBox: no MediaHeaderBox present");
            valid = false;
        }
        if first_box!(&self.boxes, HandlerBox).is_none() {
            log::error!("MediaBox: no HandlerBox present");
            valid = false;
        }
        if first_box!(&self.boxes, MediaInformationBox).is_none() {
            log::error!("MediaBox: no MediaInformationBox present");
            valid = false;
        }
        valid
    }
}

def_box! {
    /// 8.4.4 Media Information Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    MediaInformationBox {
        boxes:      Vec<HeifBox>,
    },
    fourcc => "minf",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl MediaInformationBox {
    declare_box_methods!(SampleTableBox, sample_table, sample_table_mut);
    declare_box_methods_opt!(DataInformationBox, data_information, data_information_mut);
}
