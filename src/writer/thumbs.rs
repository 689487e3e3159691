//! Thumbnail items.
//!
//! Each thumbnail bitstream is parsed like a master, its images
//! become items, and every thumbnail gets a `thmb` reference to the
//! master image it belongs to: 1:1 in order for `sync_rate == 1`,
//! every N-th master for larger rates, or an explicit index list.

use crate::boxes::prelude::*;
use crate::error::{Error, Result};
use crate::writer::config::ContentConfig;
use crate::writer::context::{Capsulation, RegistryEntry, WriteContext};
use crate::writer::media::intake_bitstream;
use crate::writer::FileBuilder;

pub(crate) fn write_thumbs(
    content: &ContentConfig,
    master_item_ids: &[u32],
    ctx: &mut WriteContext,
    builder: &mut FileBuilder,
) -> Result<()> {
    for thumb in &content.thumbs {
        let data = thumb.input.read().map_err(Error::FileRead)?;
        let intake = intake_bitstream(&data, &thumb.code_type, content.master.fps)?;
        let thumb_item_ids = builder.add_image_items(ctx, &intake, false)?;

        for (i, &thumb_item_id) in thumb_item_ids.iter().enumerate() {
            let master_index = if !thumb.sync_idxs.is_empty() {
                match thumb.sync_idxs.get(i) {
                    Some(&idx) if idx >= 1 => (idx - 1) as usize,
                    _ => {
                        return Err(Error::WriterValidation(format!(
                            "thumbs uniq_bsid {}: sync_idxs does not cover thumbnail {}",
                            thumb.uniq_bsid,
                            i + 1
                        )));
                    },
                }
            } else {
                let rate = thumb.sync_rate.unwrap_or(1).max(1) as usize;
                i * rate
            };
            let master_item_id = *master_item_ids.get(master_index).ok_or_else(|| {
                Error::WriterValidation(format!(
                    "thumbs uniq_bsid {}: no master image {} to reference",
                    thumb.uniq_bsid,
                    master_index + 1
                ))
            })?;
            builder
                .iref
                .add_reference(FourCC::new("thmb"), thumb_item_id, master_item_id);
        }

        ctx.publish(
            thumb.uniq_bsid,
            RegistryEntry {
                capsulation: Capsulation::Meta,
                item_ids: thumb_item_ids,
                track_id: None,
            },
        )?;
    }
    Ok(())
}
