use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.11.11 Item Data Box (ISO/IEC 14496-12:2015(E))
    #[derive(Default)]
    ItemDataBox {
        data:   Data,
    },
    fourcc => "idat",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl ItemDataBox {
    /// Read `length` payload bytes at `offset`.
    pub fn read(&self, offset: u64, length: u64) -> io::Result<&[u8]> {
        let end = offset
            .checked_add(length)
            .ok_or_else(|| ioerr!(InvalidData, "idat: offset overflow"))?;
        if end > self.data.len() as u64 {
            return Err(ioerr!(UnexpectedEof, "idat: range past end of payload"));
        }
        Ok(&self.data.0[offset as usize..end as usize])
    }
}
