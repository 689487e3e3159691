//! Exif / XML metadata items.
//!
//! The payload goes into the MediaDataBox verbatim; the item gets a
//! `cdsc` (content describes) reference to every master image of the
//! content it belongs to.

use crate::boxes::prelude::*;
use crate::boxes::{ConstructionMethod, ItemInfoEntry, ItemLocation, ItemLocationExtent};
use crate::error::{Error, Result};
use crate::writer::config::ContentConfig;
use crate::writer::context::WriteContext;
use crate::writer::FileBuilder;

pub(crate) fn write_metadata(
    content: &ContentConfig,
    master_item_ids: &[u32],
    ctx: &mut WriteContext,
    builder: &mut FileBuilder,
) -> Result<()> {
    for metadata in &content.metadata {
        let data = metadata.input.read().map_err(Error::FileRead)?;
        if data.is_empty() {
            return Err(Error::WriterValidation("empty metadata payload".to_string()));
        }

        let item_id = ctx.ids.alloc();
        let offset = builder.push_payload(&data);

        let mut entry = ItemInfoEntry::default();
        entry.item_id = item_id;
        match metadata.item_type.as_str() {
            "Exif" => {
                entry.item_type = FourCC::new("Exif");
            },
            "mime" => {
                entry.item_type = FourCC::new("mime");
                entry.content_type = ZString::new(
                    metadata
                        .content_type
                        .as_deref()
                        .unwrap_or("application/rdf+xml"),
                );
            },
            other => {
                return Err(Error::WriterValidation(format!(
                    "unknown metadata item type {}",
                    other
                )));
            },
        }
        builder.iinf.add_entry(entry);

        builder.iloc.add_location(ItemLocation {
            item_id,
            construction_method: ConstructionMethod::FileOffset,
            data_reference_index: 0,
            base_offset: 0,
            extents: vec![ItemLocationExtent {
                index: 0,
                offset,
                length: data.len() as u64,
            }],
        });

        for &master_item_id in master_item_ids {
            builder
                .iref
                .add_reference(FourCC::new("cdsc"), item_id, master_item_id);
        }
    }
    Ok(())
}
