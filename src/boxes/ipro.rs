use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.11.5 Item Protection Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    ItemProtectionBox {
        entries:    ArraySized16<HeifBox>,
    },
    fourcc => "ipro",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}

impl ItemProtectionBox {
    /// Get the scheme information for a 1-based protection index.
    pub fn scheme(&self, protection_index: u16) -> Option<&ProtectionSchemeInfoBox> {
        if protection_index == 0 {
            return None;
        }
        iter_box!(self.entries, ProtectionSchemeInfoBox).nth((protection_index - 1) as usize)
    }
}

def_box! {
    /// 8.12.1 Protection Scheme Info Box (ISO/IEC 14496-12:2015(E))
    ///
    /// Kept opaque: the reader only hands the raw scheme data out.
    #[derive(Default)]
    ProtectionSchemeInfoBox {
        data:   Data,
    },
    fourcc => "sinf",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}
