//! Derived image items: identity transformations, grids, overlays
//! and pre-derived coded images.
//!
//! `iden` items reference a single source image and carry an
//! essential transformative property; they have no payload of their
//! own. Grid and overlay items serialize their descriptor into the
//! MediaDataBox and reference their inputs with `dimg` edges, in
//! configuration order. Pre-derived coded images are normal coded
//! items plus `base` references to their conceptual inputs.

use crate::boxes::prelude::*;
use crate::boxes::{
    CleanApertureBox, ImageMirror, ImageRelativeLocationProperty, ImageRotation,
    ImageSpatialExtentsProperty, ItemInfoEntry,
};
use crate::derived::{ImageGrid, ImageOverlay, OverlayOffset};
use crate::error::{Error, Result};
use crate::writer::config::{ContentConfig, IdenTransform};
use crate::writer::context::{Capsulation, RegistryEntry, WriteContext};
use crate::writer::media::intake_bitstream;
use crate::writer::FileBuilder;
use crate::boxes::{ConstructionMethod, ItemLocation, ItemLocationExtent};

pub(crate) fn write_derived(
    content: &ContentConfig,
    ctx: &mut WriteContext,
    builder: &mut FileBuilder,
) -> Result<()> {
    write_iden(content, ctx, builder)?;
    write_grids(content, ctx, builder)?;
    write_overlays(content, ctx, builder)?;
    write_pre_derived(content, ctx, builder)?;
    Ok(())
}

// One new item per referenced image, carrying the transform property
// and the ispe of the image it derives from.
fn write_iden(
    content: &ContentConfig,
    ctx: &mut WriteContext,
    builder: &mut FileBuilder,
) -> Result<()> {
    for iden in &content.derived.iden {
        let property = match &iden.transform {
            IdenTransform::Irot { angle } => {
                if angle % 90 != 0 {
                    return Err(Error::WriterValidation(format!(
                        "irot angle {} is not a multiple of 90",
                        angle
                    )));
                }
                ImageRotation { angle: angle % 360 }.to_heifbox()
            },
            IdenTransform::Imir { horizontal_axis } => ImageMirror {
                horizontal_axis: *horizontal_axis,
            }
            .to_heifbox(),
            IdenTransform::Rloc {
                horizontal_offset,
                vertical_offset,
            } => ImageRelativeLocationProperty {
                horizontal_offset: *horizontal_offset,
                vertical_offset: *vertical_offset,
            }
            .to_heifbox(),
            IdenTransform::Clap {
                width_n,
                width_d,
                height_n,
                height_d,
                horiz_off_n,
                horiz_off_d,
                vert_off_n,
                vert_off_d,
            } => CleanApertureBox {
                clean_aperture_width_n: *width_n,
                clean_aperture_width_d: *width_d,
                clean_aperture_height_n: *height_n,
                clean_aperture_height_d: *height_d,
                horiz_off_n: *horiz_off_n,
                horiz_off_d: *horiz_off_d,
                vert_off_n: *vert_off_n,
                vert_off_d: *vert_off_d,
            }
            .to_heifbox(),
        };
        let property_index = builder.iprp.container.add_property(property);

        for refs in &iden.refs {
            for referenced_item in ctx.resolve_list(refs)? {
                let item_id = ctx.ids.alloc();
                let mut entry = ItemInfoEntry::default();
                entry.item_id = item_id;
                entry.item_type = FourCC::new("iden");
                builder.iinf.add_entry(entry);

                builder
                    .iref
                    .add_reference(FourCC::new("dimg"), item_id, referenced_item);
                builder.iprp.associate(item_id, property_index, true);
                if let Some(ispe_index) = builder.ispe_index_of(referenced_item) {
                    builder.iprp.associate(item_id, ispe_index, true);
                }
            }
        }
    }
    Ok(())
}

fn write_grids(
    content: &ContentConfig,
    ctx: &mut WriteContext,
    builder: &mut FileBuilder,
) -> Result<()> {
    for grid_config in &content.derived.grids {
        let mut referenced = Vec::new();
        for refs in &grid_config.refs {
            referenced.extend(ctx.resolve_list(refs)?);
        }
        let cells = grid_config.rows as usize * grid_config.columns as usize;
        if referenced.len() != cells {
            return Err(Error::WriterValidation(format!(
                "grid uniq_bsid {}: {} references for a {}x{} grid",
                grid_config.uniq_bsid,
                referenced.len(),
                grid_config.rows,
                grid_config.columns
            )));
        }
        if grid_config.rows == 0 || grid_config.columns == 0 {
            return Err(Error::WriterValidation(
                "grid must have at least one row and column".to_string(),
            ));
        }

        let grid = ImageGrid {
            rows_minus_one: grid_config.rows - 1,
            columns_minus_one: grid_config.columns - 1,
            output_width: grid_config.output_width,
            output_height: grid_config.output_height,
        };
        let item_id = add_descriptor_item(builder, ctx, "grid", &grid.to_vec());

        for referenced_item in &referenced {
            builder
                .iref
                .add_reference(FourCC::new("dimg"), item_id, *referenced_item);
        }
        let ispe_index = builder.iprp.container.add_property(
            ImageSpatialExtentsProperty {
                width: grid_config.output_width,
                height: grid_config.output_height,
            }
            .to_heifbox(),
        );
        builder.iprp.associate(item_id, ispe_index, false);

        ctx.publish(
            grid_config.uniq_bsid,
            RegistryEntry {
                capsulation: Capsulation::Meta,
                item_ids: vec![item_id],
                track_id: None,
            },
        )?;
    }
    Ok(())
}

fn write_overlays(
    content: &ContentConfig,
    ctx: &mut WriteContext,
    builder: &mut FileBuilder,
) -> Result<()> {
    for overlay_config in &content.derived.overlays {
        let mut referenced = Vec::new();
        for refs in &overlay_config.refs {
            referenced.extend(ctx.resolve_list(refs)?);
        }
        // One placement per dimg reference, the count is implicit in
        // the descriptor.
        if referenced.len() != overlay_config.offsets.len() {
            return Err(Error::WriterValidation(format!(
                "overlay uniq_bsid {}: {} references but {} offsets",
                overlay_config.uniq_bsid,
                referenced.len(),
                overlay_config.offsets.len()
            )));
        }

        let overlay = ImageOverlay {
            canvas_fill_value_r: overlay_config.canvas_fill[0],
            canvas_fill_value_g: overlay_config.canvas_fill[1],
            canvas_fill_value_b: overlay_config.canvas_fill[2],
            canvas_fill_value_a: overlay_config.canvas_fill[3],
            output_width: overlay_config.output_width,
            output_height: overlay_config.output_height,
            offsets: overlay_config
                .offsets
                .iter()
                .map(|&(h, v)| OverlayOffset {
                    horizontal_offset: h,
                    vertical_offset: v,
                })
                .collect(),
        };
        let item_id = add_descriptor_item(builder, ctx, "iovl", &overlay.to_vec());

        for referenced_item in &referenced {
            builder
                .iref
                .add_reference(FourCC::new("dimg"), item_id, *referenced_item);
        }
        let ispe_index = builder.iprp.container.add_property(
            ImageSpatialExtentsProperty {
                width: overlay_config.output_width,
                height: overlay_config.output_height,
            }
            .to_heifbox(),
        );
        builder.iprp.associate(item_id, ispe_index, false);

        ctx.publish(
            overlay_config.uniq_bsid,
            RegistryEntry {
                capsulation: Capsulation::Meta,
                item_ids: vec![item_id],
                track_id: None,
            },
        )?;
    }
    Ok(())
}

fn write_pre_derived(
    content: &ContentConfig,
    ctx: &mut WriteContext,
    builder: &mut FileBuilder,
) -> Result<()> {
    for pre in &content.derived.pre_derived {
        let data = pre.input.read().map_err(Error::FileRead)?;
        let intake = intake_bitstream(&data, &pre.code_type, content.master.fps)?;
        let item_ids = builder.add_image_items(ctx, &intake, false)?;

        let mut referenced = Vec::new();
        for refs in &pre.base_refs {
            referenced.extend(ctx.resolve_list(refs)?);
        }
        for &item_id in &item_ids {
            for &base in &referenced {
                builder
                    .iref
                    .add_reference(FourCC::new("base"), item_id, base);
            }
        }

        ctx.publish(
            pre.uniq_bsid,
            RegistryEntry {
                capsulation: Capsulation::Meta,
                item_ids,
                track_id: None,
            },
        )?;
    }
    Ok(())
}

// A derived descriptor becomes an item whose payload lives in the
// MediaDataBox, addressed with the file_offset construction method.
fn add_descriptor_item(
    builder: &mut FileBuilder,
    ctx: &mut WriteContext,
    item_type: &str,
    descriptor: &[u8],
) -> u32 {
    let item_id = ctx.ids.alloc();
    let offset = builder.push_payload(descriptor);

    let mut entry = ItemInfoEntry::default();
    entry.item_id = item_id;
    entry.item_type = FourCC::new(item_type);
    builder.iinf.add_entry(entry);

    builder.iloc.add_location(ItemLocation {
        item_id,
        construction_method: ConstructionMethod::FileOffset,
        data_reference_index: 0,
        base_offset: 0,
        extents: vec![ItemLocationExtent {
            index: 0,
            offset,
            length: descriptor.len() as u64,
        }],
    });
    item_id
}
