//! Config-driven HEIF writer.
//!
//! Two passes. Pass 1 walks the declarative configuration: it parses
//! every input bitstream, allocates item and track ids, builds the
//! MetaBox graph (infos, locations, properties, references) and the
//! track boxes, and records every payload at an offset relative to
//! the future mdat payload. Pass 2 fixes the location offsets up to
//! absolute file positions and serializes `ftyp`, `meta`, `moov` and
//! `mdat`.
//!
//! Writer errors abort the write; no partial file is emitted.

pub mod auxiliary;
pub mod config;
pub mod context;
pub mod derived;
pub mod media;
pub mod metadata;
pub mod thumbs;
pub mod track;

#[cfg(test)]
pub(crate) mod testutil;

use std::fs;
use std::io::Write as _;

use crate::boxes::*;
use crate::error::{Error, Result};
use crate::io::{CountBytes, MemBuffer};
use crate::serialize::{BoxBytes, ToBytes};
use crate::types::FourCC;

use self::config::{ContentConfig, RefId, WriterConfig};
use self::context::{Capsulation, RegistryEntry, WriteContext};
use self::media::{intake_bitstream, DecoderConfig, MediaIntake};

/// One track under construction (offsets still mdat-relative).
pub(crate) struct TrackData {
    pub trak: TrackBox,
    /// Chunk offsets relative to the mdat payload start, per stco entry.
    pub relative_chunk_offsets: Vec<u64>,
}

/// Everything pass 1 produces.
#[derive(Default)]
pub(crate) struct FileBuilder {
    pub iinf:         ItemInfoBox,
    pub iloc:         ItemLocationBox,
    pub iref:         ItemReferenceBox,
    pub iprp:         ItemPropertiesBox,
    pub pitm:         Option<PrimaryItemBox>,
    pub grpl:         Option<GroupsListBox>,
    pub tracks:       Vec<TrackData>,
    pub movie_timescale: u32,
    /// The future mdat payload; iloc extents point into it.
    pub mdat_payload: Vec<u8>,
}

impl Default for TrackData {
    fn default() -> TrackData {
        TrackData {
            trak: TrackBox::default(),
            relative_chunk_offsets: Vec::new(),
        }
    }
}

impl FileBuilder {
    /// Append payload bytes, returning their payload-relative offset.
    pub fn push_payload(&mut self, data: &[u8]) -> u64 {
        let offset = self.mdat_payload.len() as u64;
        self.mdat_payload.extend_from_slice(data);
        offset
    }

    pub fn has_items(&self) -> bool {
        !self.iinf.entries.is_empty()
    }

    /// Add the coded images of an intake as items. Returns their ids.
    ///
    /// Every image gets an infe entry, an iloc entry against the
    /// future mdat, and essential associations to the shared decoder
    /// configuration and spatial extents properties.
    pub fn add_image_items(
        &mut self,
        ctx: &mut WriteContext,
        intake: &MediaIntake,
        hidden: bool,
    ) -> Result<Vec<u32>> {
        let (width, height) = intake.config.dimensions();
        let (item_type, config_property) = match &intake.config {
            DecoderConfig::Hevc(c) => ("hvc1", c.clone().to_heifbox()),
            DecoderConfig::Avc(c) => ("avc1", c.clone().to_heifbox()),
        };

        let config_index = self.iprp.container.add_property(config_property);
        let ispe_index = self.iprp.container.add_property(
            ImageSpatialExtentsProperty { width, height }.to_heifbox(),
        );

        let mut item_ids = Vec::with_capacity(intake.images.len());
        for image in &intake.images {
            let item_id = ctx.ids.alloc();
            let offset = self.push_payload(&image.data);

            let mut entry = ItemInfoEntry::default();
            entry.item_id = item_id;
            entry.item_type = FourCC::new(item_type);
            entry.set_hidden(hidden);
            self.iinf.add_entry(entry);

            self.iloc.add_location(ItemLocation {
                item_id,
                construction_method: ConstructionMethod::FileOffset,
                data_reference_index: 0,
                base_offset: 0,
                extents: vec![ItemLocationExtent {
                    index: 0,
                    offset,
                    length: image.data.len() as u64,
                }],
            });

            self.iprp.associate(item_id, config_index, true);
            self.iprp.associate(item_id, ispe_index, true);
            item_ids.push(item_id);
        }
        Ok(item_ids)
    }

    /// The 1-based ispe association index of an existing item.
    pub fn ispe_index_of(&self, item_id: u32) -> Option<u16> {
        self.iprp
            .associations_for_item(item_id)
            .into_iter()
            .find(|a| {
                matches!(
                    self.iprp.container.get(a.property_index),
                    Some(HeifBox::ImageSpatialExtentsProperty(_))
                )
            })
            .map(|a| a.property_index)
    }
}

/// The writer: consumes a configuration, emits a conforming file.
pub struct HeifWriter {
    config: WriterConfig,
}

impl HeifWriter {
    pub fn new(config: WriterConfig) -> HeifWriter {
        HeifWriter { config }
    }

    /// Serialize to an in-memory buffer.
    pub fn write_to_vec(&self) -> Result<Vec<u8>> {
        let mut ctx = WriteContext::new();
        let mut builder = FileBuilder::default();
        builder.movie_timescale = 1000;

        // Pass 1: identity and reference materialization.
        for content in &self.config.content {
            self.process_content(content, &mut ctx, &mut builder)?;
        }
        self.process_primary_item(&mut ctx, &mut builder)?;
        self.process_entity_groups(&mut ctx, &mut builder)?;

        // Pass 2: serialize.
        self.assemble(builder)
    }

    /// Serialize to a file (the config output_file, or `path`).
    pub fn write_file(&self, path: Option<&str>) -> Result<()> {
        let path = path
            .or(self.config.general.output_file.as_deref())
            .ok_or_else(|| Error::WriterValidation("no output file configured".to_string()))?;
        let data = self.write_to_vec()?;
        let mut file = fs::File::create(path).map_err(Error::FileRead)?;
        file.write_all(&data).map_err(Error::FileRead)?;
        Ok(())
    }

    fn process_content(
        &self,
        content: &ContentConfig,
        ctx: &mut WriteContext,
        builder: &mut FileBuilder,
    ) -> Result<()> {
        let master = &content.master;
        let data = master.input.read().map_err(Error::FileRead)?;
        let intake = intake_bitstream(&data, &master.code_type, master.fps)?;

        match master.encapsulation.as_str() {
            "meta" => {
                let item_ids = builder.add_image_items(ctx, &intake, master.hidden)?;
                ctx.publish(
                    master.uniq_bsid,
                    RegistryEntry {
                        capsulation: Capsulation::Meta,
                        item_ids: item_ids.clone(),
                        track_id: None,
                    },
                )?;

                thumbs::write_thumbs(content, &item_ids, ctx, builder)?;
                auxiliary::write_auxiliary(content, &item_ids, ctx, builder)?;
                derived::write_derived(content, ctx, builder)?;
                metadata::write_metadata(content, &item_ids, ctx, builder)?;
            },
            "trak" => {
                let track_id = ctx.ids.alloc();
                track::write_track(master, &intake, track_id, None, builder)?;
                ctx.publish(
                    master.uniq_bsid,
                    RegistryEntry {
                        capsulation: Capsulation::Trak,
                        item_ids: Vec::new(),
                        track_id: Some(track_id),
                    },
                )?;

                // Thumbnail tracks reference the master track.
                for thumb in &content.thumbs {
                    let thumb_data = thumb.input.read().map_err(Error::FileRead)?;
                    let thumb_intake =
                        intake_bitstream(&thumb_data, &thumb.code_type, master.fps)?;
                    let thumb_track_id = ctx.ids.alloc();
                    track::write_track(
                        master,
                        &thumb_intake,
                        thumb_track_id,
                        Some(track_id),
                        builder,
                    )?;
                    ctx.publish(
                        thumb.uniq_bsid,
                        RegistryEntry {
                            capsulation: Capsulation::Trak,
                            item_ids: Vec::new(),
                            track_id: Some(thumb_track_id),
                        },
                    )?;
                }
            },
            other => {
                return Err(Error::WriterValidation(format!(
                    "unknown encapsulation {}",
                    other
                )));
            },
        }
        Ok(())
    }

    fn process_primary_item(
        &self,
        ctx: &mut WriteContext,
        builder: &mut FileBuilder,
    ) -> Result<()> {
        if !builder.has_items() {
            return Ok(());
        }
        let item_id = match self.config.general.primary_item.as_ref() {
            // An unresolvable reference is an error, never a silent
            // item id 0.
            Some(reference) => ctx.resolve(reference)?,
            None => {
                // Default: the first non-hidden master image item.
                let iref = &builder.iref;
                builder
                    .iinf
                    .entries
                    .iter()
                    .find(|e| {
                        (e.item_type == b"hvc1" || e.item_type == b"avc1")
                            && !e.is_hidden()
                            && iref.to_item_ids(FourCC::new("thmb"), e.item_id).is_empty()
                            && iref.to_item_ids(FourCC::new("auxl"), e.item_id).is_empty()
                    })
                    .map(|e| e.item_id)
                    .ok_or_else(|| {
                        Error::WriterValidation(
                            "no master image item for the primary item".to_string(),
                        )
                    })?
            },
        };
        builder.pitm = Some(PrimaryItemBox { item_id });
        Ok(())
    }

    fn process_entity_groups(
        &self,
        ctx: &mut WriteContext,
        builder: &mut FileBuilder,
    ) -> Result<()> {
        if self.config.egroups.is_empty() {
            return Ok(());
        }
        let mut grpl = GroupsListBox::default();
        for group in &self.config.egroups {
            let mut entity_ids = crate::types::ArraySized32::new();
            for reference in &group.refs {
                // Tracks are referenced by their track id, items by id.
                let entry = ctx.lookup(reference.uniq_bsid).ok_or_else(|| {
                    Error::WriterValidation(format!("unknown uniq_bsid {}", reference.uniq_bsid))
                })?;
                match entry.capsulation {
                    Capsulation::Meta => entity_ids.push(ctx.resolve(reference)?),
                    Capsulation::Trak => {
                        entity_ids.push(entry.track_id.ok_or_else(|| {
                            Error::WriterValidation("track entry without id".to_string())
                        })?);
                    },
                }
            }
            grpl.boxes.push(
                EntityToGroupBox {
                    group_id: ctx.ids.alloc(),
                    entity_ids,
                }
                .to_heifbox(),
            );
        }
        builder.grpl = Some(grpl);
        Ok(())
    }

    // Build the ftyp box, making sure the brand combination the
    // readers require is present.
    fn build_ftyp(&self, builder: &FileBuilder) -> FileTypeBox {
        let brands = &self.config.general.brands;
        let mut compatible: Vec<FourCC> =
            brands.other.iter().map(|b| FourCC::new(b)).collect();

        let mut ensure = |brand: &str| {
            let fourcc = FourCC::new(brand);
            if !compatible.contains(&fourcc) {
                log::debug!("ftyp: adding required compatible brand {}", brand);
                compatible.push(fourcc);
            }
        };
        if builder.has_items() {
            ensure("mif1");
            ensure("heic");
        }
        if !builder.tracks.is_empty() {
            ensure("msf1");
            ensure("hevc");
        }

        FileTypeBox {
            major_brand: FourCC::new(&brands.major),
            minor_version: 0,
            compatible_brands: compatible,
        }
    }

    fn build_meta(&self, builder: &FileBuilder) -> Option<MetaBox> {
        if !builder.has_items() {
            return None;
        }
        let mut meta = MetaBox::default();
        meta.boxes.push(HandlerBox::picture().to_heifbox());
        if let Some(pitm) = builder.pitm.clone() {
            meta.boxes.push(pitm.to_heifbox());
        }
        meta.boxes.push(builder.iloc.clone().to_heifbox());
        meta.boxes.push(builder.iinf.clone().to_heifbox());
        if !builder.iref.references.is_empty() {
            meta.boxes.push(builder.iref.clone().to_heifbox());
        }
        meta.boxes.push(builder.iprp.clone().to_heifbox());
        if let Some(grpl) = builder.grpl.clone() {
            meta.boxes.push(grpl.to_heifbox());
        }
        Some(meta)
    }

    fn build_moov(&self, builder: &FileBuilder) -> Option<MovieBox> {
        if builder.tracks.is_empty() {
            return None;
        }
        let mut moov = MovieBox::default();
        let mut mvhd = MovieHeaderBox::default();
        mvhd.timescale = builder.movie_timescale;
        let max_duration = builder
            .tracks
            .iter()
            .map(|t| t.trak.track_header().duration.0)
            .max()
            .unwrap_or(0);
        mvhd.duration = max_duration.into();
        mvhd.next_track_id = builder
            .tracks
            .iter()
            .map(|t| t.trak.track_id())
            .max()
            .unwrap_or(0)
            + 1;
        moov.boxes.push(mvhd.to_heifbox());
        for track in &builder.tracks {
            moov.boxes.push(track.trak.clone().to_heifbox());
        }
        Some(moov)
    }

    // Pass 2: fix up offsets and serialize the box sequence.
    fn assemble(&self, mut builder: FileBuilder) -> Result<Vec<u8>> {
        if !builder.has_items() && builder.tracks.is_empty() {
            return Err(Error::WriterValidation("nothing to write".to_string()));
        }
        if builder.iprp.associations.is_empty() && builder.has_items() {
            return Err(Error::WriterValidation(
                "items without property associations".to_string(),
            ));
        }

        let ftyp = self.build_ftyp(&builder);
        let ftyp_size = box_size(&ftyp.clone().to_heifbox())?;

        let payload_len = builder.mdat_payload.len() as u64;
        let mdat_header_len: u64 = if payload_len + 8 > u32::MAX as u64 { 16 } else { 8 };

        // The location offsets depend on where the mdat payload lands,
        // which depends on the size of meta/moov, which depends on the
        // field widths of the offsets. Iterate to the fixed point.
        let mut payload_offset: u64 = 0;
        for _ in 0..4 {
            for location in builder.iloc.locations.iter_mut() {
                if location.construction_method == ConstructionMethod::FileOffset {
                    location.base_offset = payload_offset;
                }
            }
            for track in builder.tracks.iter_mut() {
                let stco = track.trak.sample_table_mut_chunk_offsets();
                stco.entries.clear();
                for &rel in &track.relative_chunk_offsets {
                    stco.entries.push(rel + payload_offset);
                }
            }

            let mut total = ftyp_size;
            if let Some(meta) = self.build_meta(&builder) {
                total += box_size(&meta.to_heifbox())?;
            }
            if let Some(moov) = self.build_moov(&builder) {
                total += box_size(&moov.to_heifbox())?;
            }
            let new_offset = total + mdat_header_len;
            if new_offset == payload_offset {
                break;
            }
            payload_offset = new_offset;
        }

        // Serialize the final tree.
        let mut out = MemBuffer::new();
        ftyp.to_bytes(&mut out)?;
        if let Some(meta) = self.build_meta(&builder) {
            meta.to_bytes(&mut out)?;
        }
        if let Some(moov) = self.build_moov(&builder) {
            moov.to_bytes(&mut out)?;
        }

        // mdat header + payload.
        if mdat_header_len == 16 {
            1u32.to_bytes(&mut out)?;
            FourCC::new("mdat").to_bytes(&mut out)?;
            (payload_len + 16).to_bytes(&mut out)?;
        } else {
            ((payload_len + 8) as u32).to_bytes(&mut out)?;
            FourCC::new("mdat").to_bytes(&mut out)?;
        }
        let data = builder.mdat_payload;
        let mut buf = out.into_vec();
        if buf.len() as u64 != payload_offset {
            return Err(Error::WriterValidation(format!(
                "mdat payload offset mismatch: computed {}, actual {}",
                payload_offset,
                buf.len()
            )));
        }
        buf.extend_from_slice(&data);
        Ok(buf)
    }
}

impl TrackBox {
    // Writer-side helper: the chunk offset table of this track.
    fn sample_table_mut_chunk_offsets(&mut self) -> &mut ChunkOffsetBox {
        self.media_mut()
            .media_info_mut()
            .sample_table_mut()
            .chunk_offset_table_mut()
    }
}

fn box_size(b: &HeifBox) -> Result<u64> {
    let mut cb = CountBytes::new();
    b.to_bytes(&mut cb)?;
    Ok(cb.size())
}
