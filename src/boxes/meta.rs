use std::io;

use crate::boxes::prelude::*;
use crate::boxes::{
    GroupsListBox, HandlerBox, ItemDataBox, ItemInfoBox, ItemLocationBox, ItemPropertiesBox,
    ItemProtectionBox, ItemReferenceBox, PrimaryItemBox,
};

def_box! {
    /// 8.11.1 Meta Box (ISO/IEC 14496-12:2015(E))
    ///
    /// Container for untimed items: the handler, the primary item,
    /// item locations, item infos, item references, item data and
    /// item properties.
    #[derive(Default)]
    MetaBox {
        boxes:  Vec<HeifBox>,
    },
    fourcc => "meta",
    version => [0],
    impls => [ boxinfo, debug, fullbox ],
}

impl MetaBox {
    declare_box_methods!(HandlerBox, handler, handler_mut);
    declare_box_methods_opt!(PrimaryItemBox, primary_item, primary_item_mut);
    declare_box_methods_opt!(ItemLocationBox, item_location, item_location_mut);
    declare_box_methods_opt!(ItemProtectionBox, item_protection, item_protection_mut);
    declare_box_methods_opt!(ItemInfoBox, item_info, item_info_mut);
    declare_box_methods_opt!(ItemReferenceBox, item_reference, item_reference_mut);
    declare_box_methods_opt!(ItemDataBox, item_data, item_data_mut);
    declare_box_methods_opt!(ItemPropertiesBox, item_properties, item_properties_mut);
    declare_box_methods_opt!(GroupsListBox, groups_list, groups_list_mut);

    pub fn is_valid(&self) -> bool {
        if first_box!(&self.boxes, HandlerBox).is_none() {
            log::error!("MetaBox: no HandlerBox present");
            return false;
        }
        true
    }
}

impl FromBytes for MetaBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> io::Result<MetaBox> {
        let mut reader = BoxReader::new(stream)?;
        let boxes = Vec::<HeifBox>::from_bytes(&mut reader)?;
        Ok(MetaBox { boxes })
    }
    fn min_size() -> usize {
        12
    }
}

impl ToBytes for MetaBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> io::Result<()> {
        let mut writer = BoxWriter::new(stream, self)?;

        // Write in the prescribed order: hdlr, pitm, dinf, iloc, ipro,
        // iinf, iref, idat, iprp, grpl; anything else at the end.
        let order = |b: &HeifBox| -> u32 {
            match &b.fourcc().to_be_bytes() {
                b"hdlr" => 0,
                b"pitm" => 1,
                b"dinf" => 2,
                b"iloc" => 3,
                b"ipro" => 4,
                b"iinf" => 5,
                b"iref" => 6,
                b"idat" => 7,
                b"iprp" => 8,
                b"grpl" => 9,
                _ => 10,
            }
        };
        let mut sorted: Vec<&HeifBox> = self.boxes.iter().collect();
        sorted.sort_by_key(|b| order(*b));
        for b in sorted {
            b.to_bytes(&mut writer)?;
        }
        writer.finalize()
    }
}
