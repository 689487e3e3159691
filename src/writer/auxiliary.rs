//! Auxiliary (alpha, depth) image items.
//!
//! Auxiliary images pair with master images 1:1 by default, or via an
//! explicit index list. Each gets an `auxl` reference to its master
//! and an essential `auxC` property carrying the auxiliary type URN.

use crate::boxes::prelude::*;
use crate::boxes::AuxiliaryTypeProperty;
use crate::error::{Error, Result};
use crate::writer::config::ContentConfig;
use crate::writer::context::{Capsulation, RegistryEntry, WriteContext};
use crate::writer::media::intake_bitstream;
use crate::writer::FileBuilder;

pub(crate) fn write_auxiliary(
    content: &ContentConfig,
    master_item_ids: &[u32],
    ctx: &mut WriteContext,
    builder: &mut FileBuilder,
) -> Result<()> {
    for aux in &content.auxiliary {
        let data = aux.input.read().map_err(Error::FileRead)?;
        let intake = intake_bitstream(&data, &aux.code_type, content.master.fps)?;
        let aux_item_ids = builder.add_image_items(ctx, &intake, aux.hidden)?;

        let auxc_index = builder.iprp.container.add_property(
            AuxiliaryTypeProperty {
                aux_type: ZString::new(aux.urn.as_str()),
                aux_subtype: Data::default(),
            }
            .to_heifbox(),
        );

        for (i, &aux_item_id) in aux_item_ids.iter().enumerate() {
            let master_index = if !aux.idxs_list.is_empty() {
                match aux.idxs_list.get(i) {
                    Some(&idx) if idx >= 1 => (idx - 1) as usize,
                    _ => {
                        return Err(Error::WriterValidation(format!(
                            "auxiliary uniq_bsid {}: idxs_list does not cover image {}",
                            aux.uniq_bsid,
                            i + 1
                        )));
                    },
                }
            } else {
                i
            };
            let master_item_id = *master_item_ids.get(master_index).ok_or_else(|| {
                Error::WriterValidation(format!(
                    "auxiliary uniq_bsid {}: no master image {} to reference",
                    aux.uniq_bsid,
                    master_index + 1
                ))
            })?;
            builder
                .iref
                .add_reference(FourCC::new("auxl"), aux_item_id, master_item_id);
            builder.iprp.associate(aux_item_id, auxc_index, true);
        }

        ctx.publish(
            aux.uniq_bsid,
            RegistryEntry {
                capsulation: Capsulation::Meta,
                item_ids: aux_item_ids,
                track_id: None,
            },
        )?;
    }
    Ok(())
}
