//
// ISO/IEC 14496-12:2015(E)
// 8.5.2 Sample Description Box
//

use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.5.2 Sample Description Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    SampleDescriptionBox {
        entries:    ArraySized32<HeifBox>,
    },
    fourcc => "stsd",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl SampleDescriptionBox {
    /// Get an entry by 1-based sample description index.
    pub fn entry(&self, sample_description_index: u32) -> Option<&HeifBox> {
        if sample_description_index == 0 {
            return None;
        }
        self.entries.iter().nth((sample_description_index - 1) as usize)
    }
}
