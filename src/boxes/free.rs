use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.1.2 Free Space Box (ISO/IEC 14496-12:2015(E))
    Free {
        data:   Data,
    },
    fourcc => "free",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

def_box! {
    /// 8.1.2 Free Space Box (ISO/IEC 14496-12:2015(E))
    Skip {
        data:   Data,
    },
    fourcc => "skip",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}
