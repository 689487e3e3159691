use std::io;

use crate::boxes::prelude::*;

def_box! {
    /// 8.15.1 Groups List Box (ISO/IEC 14496-12).
    #[derive(Default)]
    GroupsListBox {
        boxes:  Vec<HeifBox>,
    },
    fourcc => "grpl",
    version => [],
    impls => [ basebox, boxinfo, debug, fromtobytes ],
}

impl GroupsListBox {
    /// All `altr` groups.
    pub fn altr_groups(&self) -> Vec<&EntityToGroupBox> {
        iter_box!(self.boxes, EntityToGroupBox).collect()
    }

    /// Groups that contain the given entity (item or track) id.
    pub fn groups_containing(&self, entity_id: u32) -> Vec<&EntityToGroupBox> {
        self.altr_groups()
            .into_iter()
            .filter(|g| g.entity_ids.contains(&entity_id))
            .collect()
    }
}

def_box! {
    /// 8.15.2 Entity to Group Box, 'altr' grouping (ISO/IEC 14496-12).
    ///
    /// Lists entities that are alternatives for one another.
    #[derive(Default)]
    EntityToGroupBox {
        group_id:   u32,
        entity_ids: ArraySized32<u32>,
    },
    fourcc => "altr",
    version => [0],
    impls => [ boxinfo, debug, fromtobytes, fullbox ],
}
