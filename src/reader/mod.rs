//! Read a HEIF file and answer queries over it.
//!
//! [`Heif`] is the parsed box tree. [`HeifReader`] assigns a context
//! id to the root MetaBox and to every track, synthesizes feature
//! sets, and exposes the query API: item lists, item data (with NAL
//! start codes reinserted), properties, derived-image descriptors,
//! and presentation timestamps.

pub mod features;

use std::collections::HashMap;
use std::io;

use crate::boxes::*;
use crate::derived::{ImageGrid, ImageOverlay};
use crate::error::{Error, Result};
use crate::mp4box::BoxInfo;
use crate::nal::{self, HevcNalUnitType, NalCodec};
use crate::sample_info::sample_info_iter;
use crate::serialize::{FromBytes, ReadBytes};
use crate::timeline::Timeline;
use crate::types::FourCC;

use self::features::*;

/// A parsed HEIF file: the top-level box tree.
pub struct Heif {
    pub boxes: Vec<HeifBox>,
}

impl Heif {
    /// Read all top-level boxes from a stream.
    ///
    /// Exactly one `ftyp` must be present, at most one root `meta`,
    /// at most one `moov`. Unknown root boxes are logged and kept
    /// opaque.
    pub fn read<R: ReadBytes>(stream: &mut R) -> io::Result<Heif> {
        let mut boxes = Vec::new();
        let mut n_ftyp = 0;
        let mut n_meta = 0;
        let mut n_moov = 0;
        while stream.left() >= 8 {
            // Remember where this box ends, so a structurally broken
            // root box can be skipped and the rest still be parsed.
            let pos = stream.pos();
            let header = crate::mp4box::BoxHeader::peek(stream)?;
            let box_end = match header.size {
                // A zero size means "to the end of the file".
                0 => pos + stream.left(),
                1 => {
                    let data = stream.peek(16)?;
                    use std::convert::TryInto;
                    pos + u64::from_be_bytes(data[8..16].try_into().unwrap())
                },
                size => pos + size,
            };

            let b = match HeifBox::from_bytes(stream) {
                Ok(b) => b,
                Err(e) => {
                    let stream_end = stream.pos() + stream.left();
                    if header.fourcc == b"ftyp" || box_end > stream_end {
                        return Err(e);
                    }
                    log::warn!(
                        "Heif::read: {}: {}; skipping to next root box",
                        header.fourcc,
                        e
                    );
                    stream.seek(box_end)?;
                    continue;
                },
            };
            match &b {
                HeifBox::FileTypeBox(_) => n_ftyp += 1,
                HeifBox::MetaBox(_) => n_meta += 1,
                HeifBox::MovieBox(_) => n_moov += 1,
                HeifBox::GenericBox(g) => {
                    log::warn!("Heif::read: skipping unknown root box {}", g.fourcc);
                },
                _ => {},
            }
            boxes.push(b);
        }
        if n_ftyp != 1 {
            return Err(ioerr!(InvalidData, "expected exactly one ftyp box, found {}", n_ftyp));
        }
        if n_meta > 1 {
            return Err(ioerr!(InvalidData, "more than one root meta box"));
        }
        if n_moov > 1 {
            return Err(ioerr!(InvalidData, "more than one moov box"));
        }
        Ok(Heif { boxes })
    }

    pub fn ftyp(&self) -> &FileTypeBox {
        first_box!(&self.boxes, FileTypeBox).unwrap()
    }

    pub fn meta(&self) -> Option<&MetaBox> {
        first_box!(&self.boxes, MetaBox)
    }

    pub fn movie(&self) -> Option<&MovieBox> {
        first_box!(&self.boxes, MovieBox)
    }

    pub fn mdats(&self) -> Vec<&MediaDataBox> {
        iter_box!(&self.boxes, MediaDataBox).collect()
    }

    /// Read a byte range addressed by absolute file offset, from
    /// whichever mdat box covers it.
    pub fn read_file_range(&self, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        for mdat in self.mdats() {
            if mdat.contains(offset, len) {
                return mdat.read_at(offset, len);
            }
        }
        Err(ioerr!(
            UnexpectedEof,
            "byte range {}+{} not inside any mdat box",
            offset,
            len
        ))
    }
}

/// Image item info exposed by the reader.
#[derive(Clone, Debug, Default)]
pub struct ImageInfo {
    pub item_type: String,
    pub width:     u32,
    pub height:    u32,
}

/// A grid item: descriptor plus its input item ids.
#[derive(Clone, Debug, Default)]
pub struct GridItem {
    pub grid:     ImageGrid,
    pub item_ids: Vec<u32>,
}

/// An overlay item: descriptor plus its input item ids.
#[derive(Clone, Debug, Default)]
pub struct IovlItem {
    pub overlay:  ImageOverlay,
    pub item_ids: Vec<u32>,
}

/// Decoder parameter sets, each with a start code in front.
#[derive(Clone, Debug, Default)]
pub struct DecoderParameterSets {
    pub vps: Vec<u8>,
    pub sps: Vec<u8>,
    pub pps: Vec<u8>,
}

// Output/reference classification of a track sample.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SampleType {
    OutputReferenceFrame,
    OutputNonReferenceFrame,
    NonOutputReferenceFrame,
}

#[derive(Clone, Debug)]
struct SampleProps {
    fpos:              u64,
    size:              u32,
    sample_description_index: u32,
    entry_type:        FourCC,
    sample_type:       SampleType,
    composition_times: Vec<i64>,
}

struct MetaContext {
    context_id:     u32,
    feature:        MetaBoxFeature,
    image_features: HashMap<u32, ImageFeature>,
    item_features:  HashMap<u32, ItemFeature>,
    image_info:     HashMap<u32, ImageInfo>,
    grids:          HashMap<u32, GridItem>,
    overlays:       HashMap<u32, IovlItem>,
    displayable_master_images: u32,
    forced_fps:     Option<f64>,
    forced_loop:    bool,
}

struct TrackContext {
    track_id:    u32,
    feature:     TrackFeature,
    timescale:   u32,
    duration_ms: u64,
    samples:     Vec<SampleProps>,
    timeline:    Timeline,
    forced_loop: bool,
}

struct ReaderData {
    heif:         Heif,
    file_feature: FileFeature,
    meta:         Option<MetaContext>,
    tracks:       HashMap<u32, TrackContext>,
}

/// The reader façade.
///
/// Starts out uninitialized; [`HeifReader::initialize`] parses a
/// stream and moves it to ready. `close` drops the state again.
#[derive(Default)]
pub struct HeifReader {
    data: Option<ReaderData>,
}

impl HeifReader {
    pub fn new() -> HeifReader {
        HeifReader { data: None }
    }

    /// Parse a stream and build the context registry.
    pub fn initialize<R: ReadBytes>(&mut self, stream: &mut R) -> Result<()> {
        self.data = None;

        let heif = Heif::read(stream)?;

        // Accept only the recognized brand combinations.
        let ftyp = heif.ftyp();
        if !ftyp.has_heif_major_brand() {
            return Err(Error::UnsupportedInput(format!(
                "major brand {} is not a HEIF brand",
                ftyp.major_brand
            )));
        }
        if !ftyp.has_image_collection_brands() && !ftyp.has_image_sequence_brands() {
            return Err(Error::UnsupportedInput(
                "compatible brands contain neither mif1+heic nor msf1+hevc".to_string(),
            ));
        }

        let mut data = ReaderData {
            heif,
            file_feature: FileFeature::default(),
            meta: None,
            tracks: HashMap::new(),
        };

        if let Some(moov) = data.heif.movie() {
            if !moov.is_valid() {
                return Err(Error::FileRead(ioerr!(
                    InvalidData,
                    "moov box is structurally invalid"
                )));
            }
        }

        // Context ids: tracks use their track id, the root meta gets
        // an id above all of them.
        let track_ids: Vec<u32> = data
            .heif
            .movie()
            .map(|moov| moov.tracks().iter().map(|t| t.track_id()).collect())
            .unwrap_or_default();
        let meta_context_id = track_ids.iter().max().map(|&id| id + 1).unwrap_or(0);

        if data.heif.meta().is_some() {
            data.meta = Some(extract_meta_context(&data.heif, meta_context_id)?);
        }
        for track_id in track_ids {
            let ctx = extract_track_context(&data.heif, track_id)?;
            data.tracks.insert(track_id, ctx);
        }

        data.file_feature = synthesize_file_feature(&data);

        self.data = Some(data);
        Ok(())
    }

    /// Drop all state; the reader becomes uninitialized again.
    pub fn close(&mut self) {
        self.data = None;
    }

    fn data(&self) -> Result<&ReaderData> {
        self.data.as_ref().ok_or(Error::Uninitialized)
    }

    fn meta_context(&self, context_id: u32) -> Result<&MetaContext> {
        let data = self.data()?;
        match data.meta.as_ref() {
            Some(meta) if meta.context_id == context_id => Ok(meta),
            _ => Err(Error::InvalidContextId(context_id)),
        }
    }

    fn track_context(&self, context_id: u32) -> Result<&TrackContext> {
        let data = self.data()?;
        data.tracks
            .get(&context_id)
            .ok_or(Error::InvalidContextId(context_id))
    }

    fn meta_box(&self) -> Result<&MetaBox> {
        self.data()?.heif.meta().ok_or(Error::Uninitialized)
    }

    //
    // Contexts and features.
    //

    /// All context ids: root meta first, then the tracks.
    pub fn context_ids(&self) -> Result<Vec<u32>> {
        let data = self.data()?;
        let mut v = Vec::new();
        if let Some(meta) = data.meta.as_ref() {
            v.push(meta.context_id);
        }
        let mut tracks: Vec<u32> = data.tracks.keys().copied().collect();
        tracks.sort();
        v.extend(tracks);
        Ok(v)
    }

    /// The context id of the root-level MetaBox.
    pub fn root_meta_context_id(&self) -> Result<u32> {
        let data = self.data()?;
        data.meta
            .as_ref()
            .map(|m| m.context_id)
            .ok_or(Error::NotApplicable("file has no root-level meta box"))
    }

    pub fn file_feature(&self) -> Result<FileFeature> {
        Ok(self.data()?.file_feature)
    }

    pub fn meta_box_feature(&self, context_id: u32) -> Result<MetaBoxFeature> {
        Ok(self.meta_context(context_id)?.feature)
    }

    pub fn image_features(&self, context_id: u32, item_id: u32) -> Result<ImageFeature> {
        self.meta_context(context_id)?
            .image_features
            .get(&item_id)
            .copied()
            .ok_or(Error::InvalidItemId(item_id))
    }

    pub fn item_features(&self, context_id: u32, item_id: u32) -> Result<ItemFeature> {
        self.meta_context(context_id)?
            .item_features
            .get(&item_id)
            .copied()
            .ok_or(Error::InvalidItemId(item_id))
    }

    pub fn track_feature(&self, context_id: u32) -> Result<TrackFeature> {
        Ok(self.track_context(context_id)?.feature)
    }

    //
    // Item lists and item info.
    //

    /// List items by type.
    ///
    /// For a meta context, `item_type` matches the reader-assigned
    /// type ("master", "thmb", "auxl", "hidden", "pre-computed") or a
    /// raw item type ("grid", "iovl", "Exif", ..). For a track
    /// context, "samples" lists all samples, "display" the output
    /// frames in composition order, and "out_ref" / "non_out_ref" /
    /// "out_non_ref" partition by sample classification.
    pub fn get_item_list_by_type(&self, context_id: u32, item_type: &str) -> Result<Vec<u32>> {
        let data = self.data()?;
        if let Some(meta) = data.meta.as_ref() {
            if meta.context_id == context_id {
                let iinf = self
                    .meta_box()?
                    .item_info()
                    .ok_or(Error::NotApplicable("meta box has no item info"))?;
                let mut v = Vec::new();
                for entry in &iinf.entries {
                    if self.get_item_type(context_id, entry.item_id)? == item_type {
                        v.push(entry.item_id);
                    }
                }
                return Ok(v);
            }
        }

        let track = self.track_context(context_id)?;
        let list_by = |wanted: SampleType| -> Vec<u32> {
            track
                .samples
                .iter()
                .enumerate()
                .filter(|(_, s)| s.sample_type == wanted)
                .map(|(i, _)| i as u32)
                .collect()
        };
        match item_type {
            "samples" => Ok((0..track.samples.len() as u32).collect()),
            "out_ref" => Ok(list_by(SampleType::OutputReferenceFrame)),
            "out_non_ref" => Ok(list_by(SampleType::OutputNonReferenceFrame)),
            "non_out_ref" => Ok(list_by(SampleType::NonOutputReferenceFrame)),
            "display" => {
                // Output frames, sorted into composition order.
                let mut pairs: Vec<(u32, i64)> = Vec::new();
                for (i, sample) in track.samples.iter().enumerate() {
                    if sample.sample_type == SampleType::NonOutputReferenceFrame {
                        continue;
                    }
                    for &ts in &sample.composition_times {
                        pairs.push((i as u32, ts));
                    }
                }
                pairs.sort_by_key(|&(_, ts)| ts);
                Ok(pairs.into_iter().map(|(i, _)| i).collect())
            },
            _ => Err(Error::InvalidFunctionParameter("unknown track item type")),
        }
    }

    /// The reader-assigned type of an item (or the sample entry type
    /// of a track sample).
    pub fn get_item_type(&self, context_id: u32, item_id: u32) -> Result<String> {
        let data = self.data()?;
        if let Some(meta) = data.meta.as_ref() {
            if meta.context_id == context_id {
                if let Some(info) = meta.image_info.get(&item_id) {
                    return Ok(info.item_type.clone());
                }
                let iinf = self
                    .meta_box()?
                    .item_info()
                    .ok_or(Error::InvalidItemId(item_id))?;
                return iinf
                    .entry_by_id(item_id)
                    .map(|e| e.item_type.to_string())
                    .ok_or(Error::InvalidItemId(item_id));
            }
        }
        let track = self.track_context(context_id)?;
        track
            .samples
            .get(item_id as usize)
            .map(|s| s.entry_type.to_string())
            .ok_or(Error::InvalidItemId(item_id))
    }

    /// Display width of an image item (ispe, post conformance crop).
    pub fn get_width(&self, context_id: u32, item_id: u32) -> Result<u32> {
        self.meta_context(context_id)?
            .image_info
            .get(&item_id)
            .map(|i| i.width)
            .ok_or(Error::InvalidItemId(item_id))
    }

    /// Display height of an image item.
    pub fn get_height(&self, context_id: u32, item_id: u32) -> Result<u32> {
        self.meta_context(context_id)?
            .image_info
            .get(&item_id)
            .map(|i| i.height)
            .ok_or(Error::InvalidItemId(item_id))
    }

    /// Id of the cover image (the primary item).
    pub fn get_cover_image_item_id(&self, context_id: u32) -> Result<u32> {
        let meta = self.meta_context(context_id)?;
        meta.image_features
            .iter()
            .find(|(_, f)| f.has(ImageFeature::IS_COVER_IMAGE))
            .map(|(&id, _)| id)
            .ok_or(Error::NotApplicable("no cover image"))
    }

    //
    // References.
    //

    /// Items referenced _from_ the given item with the reference type.
    pub fn get_referenced_from_item_list_by_type(
        &self,
        context_id: u32,
        from_item_id: u32,
        reference_type: &str,
    ) -> Result<Vec<u32>> {
        self.meta_context(context_id)?;
        let iref = match self.meta_box()?.item_reference() {
            Some(iref) => iref,
            None => return Ok(Vec::new()),
        };
        Ok(iref.to_item_ids(FourCC::new(reference_type), from_item_id))
    }

    /// Items that reference the given item with the reference type.
    pub fn get_referenced_to_item_list_by_type(
        &self,
        context_id: u32,
        to_item_id: u32,
        reference_type: &str,
    ) -> Result<Vec<u32>> {
        self.meta_context(context_id)?;
        let iref = match self.meta_box()?.item_reference() {
            Some(iref) => iref,
            None => return Ok(Vec::new()),
        };
        Ok(iref.from_item_ids(FourCC::new(reference_type), to_item_id))
    }

    //
    // Item data.
    //

    fn is_protected(&self, item_id: u32) -> Result<bool> {
        let iinf = self
            .meta_box()?
            .item_info()
            .ok_or(Error::InvalidItemId(item_id))?;
        let entry = iinf.entry_by_id(item_id).ok_or(Error::InvalidItemId(item_id))?;
        Ok(entry.item_protection_index > 0)
    }

    // Gather the raw item bytes through the item location.
    fn read_item_bytes(&self, item_id: u32) -> Result<Vec<u8>> {
        let data = self.data()?;
        let meta = self.meta_box()?;
        let iloc = meta
            .item_location()
            .ok_or(Error::InvalidItemId(item_id))?;
        let location = iloc
            .location_by_id(item_id)
            .ok_or(Error::InvalidItemId(item_id))?;

        let mut out = Vec::new();
        match location.construction_method {
            ConstructionMethod::FileOffset => {
                for extent in &location.extents {
                    let offset = location.base_offset + extent.offset;
                    out.extend(data.heif.read_file_range(offset, extent.length)?);
                }
            },
            ConstructionMethod::IdatOffset => {
                let idat = meta
                    .item_data()
                    .ok_or(Error::NotApplicable("iloc references an absent idat box"))?;
                for extent in &location.extents {
                    let offset = location.base_offset + extent.offset;
                    out.extend_from_slice(idat.read(offset, extent.length)?);
                }
            },
            ConstructionMethod::ItemOffset => {
                return Err(Error::NotApplicable("item_offset construction method"));
            },
        }
        Ok(out)
    }

    /// Item bytes. HEVC image items are rewritten from length-prefixed
    /// NAL units to byte-stream (start code) form.
    pub fn get_item_data(&self, context_id: u32, item_id: u32) -> Result<Vec<u8>> {
        let data = self.data()?;
        if let Some(meta) = data.meta.as_ref() {
            if meta.context_id == context_id {
                if self.is_protected(item_id)? {
                    return Err(Error::ProtectedItem(item_id));
                }
                let raw = self.read_item_bytes(item_id)?;
                let iinf = self.meta_box()?.item_info().unwrap();
                let raw_type = iinf
                    .entry_by_id(item_id)
                    .map(|e| e.item_type)
                    .unwrap_or_default();
                if raw_type == b"hvc1" {
                    return Ok(nal::length_prefixed_to_byte_stream(&raw, NalCodec::Hevc)?);
                } else if raw_type == b"avc1" {
                    return Ok(nal::length_prefixed_to_byte_stream(&raw, NalCodec::Avc)?);
                }
                return Ok(raw);
            }
        }

        // Track sample: read at the chunk offset + position.
        let track = self.track_context(context_id)?;
        let sample = track
            .samples
            .get(item_id as usize)
            .ok_or(Error::InvalidItemId(item_id))?;
        let raw = data.heif.read_file_range(sample.fpos, sample.size as u64)?;
        Ok(nal::length_prefixed_to_byte_stream(&raw, NalCodec::Hevc)?)
    }

    /// Item bytes with VPS, SPS and PPS (start-code form) in front.
    pub fn get_item_data_with_decoder_parameters(
        &self,
        context_id: u32,
        item_id: u32,
    ) -> Result<Vec<u8>> {
        let sets = self.get_decoder_parameter_sets(context_id, item_id)?;
        let mut out = Vec::new();
        out.extend_from_slice(&sets.vps);
        out.extend_from_slice(&sets.sps);
        out.extend_from_slice(&sets.pps);
        out.extend(self.get_item_data(context_id, item_id)?);
        Ok(out)
    }

    /// The parameter sets of the decoder configuration associated
    /// with an item or track sample.
    pub fn get_decoder_parameter_sets(
        &self,
        context_id: u32,
        item_id: u32,
    ) -> Result<DecoderParameterSets> {
        let data = self.data()?;
        if let Some(meta) = data.meta.as_ref() {
            if meta.context_id == context_id {
                let iprp = self
                    .meta_box()?
                    .item_properties()
                    .ok_or(Error::NotApplicable("meta box has no item properties"))?;
                if let Some(HeifBox::HevcConfigurationBox(hvcc)) =
                    iprp.property_by_type(item_id, FourCC::new("hvcC"))
                {
                    let rec = &hvcc.configuration;
                    return Ok(DecoderParameterSets {
                        vps: rec.parameter_set_with_start_code(HevcNalUnitType::Vps),
                        sps: rec.parameter_set_with_start_code(HevcNalUnitType::Sps),
                        pps: rec.parameter_set_with_start_code(HevcNalUnitType::Pps),
                    });
                }
                if let Some(HeifBox::AvcConfigurationBox(avcc)) =
                    iprp.property_by_type(item_id, FourCC::new("avcC"))
                {
                    use crate::nal::AvcNalUnitType;
                    let rec = &avcc.configuration;
                    return Ok(DecoderParameterSets {
                        vps: Vec::new(),
                        sps: rec.parameter_set_with_start_code(AvcNalUnitType::Sps),
                        pps: rec.parameter_set_with_start_code(AvcNalUnitType::Pps),
                    });
                }
                return Err(Error::InvalidItemId(item_id));
            }
        }

        let track = self.track_context(context_id)?;
        let sample = track
            .samples
            .get(item_id as usize)
            .ok_or(Error::InvalidItemId(item_id))?;
        let moov = data.heif.movie().ok_or(Error::Uninitialized)?;
        let trak = moov
            .track_by_id(track.track_id)
            .ok_or(Error::InvalidContextId(context_id))?;
        let stsd = trak.sample_table().sample_description();
        match stsd.entry(sample.sample_description_index) {
            Some(HeifBox::HevcSampleEntry(entry)) => {
                let rec = &entry
                    .configuration()
                    .ok_or(Error::MediaParsing("hvc1 entry without hvcC".to_string()))?
                    .configuration;
                Ok(DecoderParameterSets {
                    vps: rec.parameter_set_with_start_code(HevcNalUnitType::Vps),
                    sps: rec.parameter_set_with_start_code(HevcNalUnitType::Sps),
                    pps: rec.parameter_set_with_start_code(HevcNalUnitType::Pps),
                })
            },
            Some(HeifBox::AvcSampleEntry(entry)) => {
                use crate::nal::AvcNalUnitType;
                let rec = &entry
                    .configuration()
                    .ok_or(Error::MediaParsing("avc1 entry without avcC".to_string()))?
                    .configuration;
                Ok(DecoderParameterSets {
                    vps: Vec::new(),
                    sps: rec.parameter_set_with_start_code(AvcNalUnitType::Sps),
                    pps: rec.parameter_set_with_start_code(AvcNalUnitType::Pps),
                })
            },
            Some(_) | None => Err(Error::InvalidSampleDescriptionIndex(
                sample.sample_description_index,
            )),
        }
    }

    /// The raw protection scheme information of a protected item.
    pub fn get_item_protection_scheme(&self, context_id: u32, item_id: u32) -> Result<Vec<u8>> {
        self.meta_context(context_id)?;
        let iinf = self
            .meta_box()?
            .item_info()
            .ok_or(Error::InvalidItemId(item_id))?;
        let entry = iinf.entry_by_id(item_id).ok_or(Error::InvalidItemId(item_id))?;
        if entry.item_protection_index == 0 {
            return Err(Error::UnprotectedItem(item_id));
        }
        let ipro = self
            .meta_box()?
            .item_protection()
            .ok_or(Error::UnprotectedItem(item_id))?;
        ipro.scheme(entry.item_protection_index)
            .map(|sinf| sinf.data.0.clone())
            .ok_or(Error::InvalidItemId(item_id))
    }

    //
    // Derived images and properties.
    //

    pub fn get_item_grid(&self, context_id: u32, item_id: u32) -> Result<GridItem> {
        let meta = self.meta_context(context_id)?;
        meta.grids
            .get(&item_id)
            .cloned()
            .ok_or(Error::InvalidItemId(item_id))
    }

    pub fn get_item_overlay(&self, context_id: u32, item_id: u32) -> Result<IovlItem> {
        let meta = self.meta_context(context_id)?;
        meta.overlays
            .get(&item_id)
            .cloned()
            .ok_or(Error::InvalidItemId(item_id))
    }

    /// `(fourcc, 1-based property index, essential)` for each property
    /// associated with the item.
    pub fn get_item_properties(
        &self,
        context_id: u32,
        item_id: u32,
    ) -> Result<Vec<(FourCC, u16, bool)>> {
        self.meta_context(context_id)?;
        let iprp = self
            .meta_box()?
            .item_properties()
            .ok_or(Error::NotApplicable("meta box has no item properties"))?;
        Ok(iprp
            .associations_for_item(item_id)
            .into_iter()
            .filter_map(|a| {
                iprp.container
                    .get(a.property_index)
                    .map(|p| (p.fourcc(), a.property_index, a.essential))
            })
            .collect())
    }

    /// A property by 1-based index, cloned out of the container.
    pub fn get_property_by_index(&self, context_id: u32, index: u16) -> Result<HeifBox> {
        self.meta_context(context_id)?;
        let iprp = self
            .meta_box()?
            .item_properties()
            .ok_or(Error::InvalidPropertyIndex(index))?;
        iprp.container
            .get(index)
            .cloned()
            .ok_or(Error::InvalidPropertyIndex(index))
    }

    pub fn get_property_auxc(&self, context_id: u32, index: u16) -> Result<AuxiliaryTypeProperty> {
        match self.get_property_by_index(context_id, index)? {
            HeifBox::AuxiliaryTypeProperty(p) => Ok(p),
            _ => Err(Error::InvalidPropertyIndex(index)),
        }
    }

    pub fn get_property_irot(&self, context_id: u32, index: u16) -> Result<ImageRotation> {
        match self.get_property_by_index(context_id, index)? {
            HeifBox::ImageRotation(p) => Ok(p),
            _ => Err(Error::InvalidPropertyIndex(index)),
        }
    }

    pub fn get_property_imir(&self, context_id: u32, index: u16) -> Result<ImageMirror> {
        match self.get_property_by_index(context_id, index)? {
            HeifBox::ImageMirror(p) => Ok(p),
            _ => Err(Error::InvalidPropertyIndex(index)),
        }
    }

    pub fn get_property_rloc(
        &self,
        context_id: u32,
        index: u16,
    ) -> Result<ImageRelativeLocationProperty> {
        match self.get_property_by_index(context_id, index)? {
            HeifBox::ImageRelativeLocationProperty(p) => Ok(p),
            _ => Err(Error::InvalidPropertyIndex(index)),
        }
    }

    pub fn get_property_clap(&self, context_id: u32, index: u16) -> Result<CleanApertureBox> {
        match self.get_property_by_index(context_id, index)? {
            HeifBox::CleanApertureBox(p) => Ok(p),
            _ => Err(Error::InvalidPropertyIndex(index)),
        }
    }

    pub fn get_property_oinf(
        &self,
        context_id: u32,
        index: u16,
    ) -> Result<OperatingPointsInformation> {
        match self.get_property_by_index(context_id, index)? {
            HeifBox::OperatingPointsInformation(p) => Ok(p),
            _ => Err(Error::InvalidPropertyIndex(index)),
        }
    }

    /// The operating points of a layered (L-HEVC) image item.
    ///
    /// Returns the associated `oinf` property when present; otherwise
    /// it is synthesized from the VPS of the item's decoder
    /// configuration. Plain single-layer items have no operating
    /// points and fail with `MediaParsing`.
    pub fn get_operating_points(
        &self,
        context_id: u32,
        item_id: u32,
    ) -> Result<OperatingPointsInformation> {
        self.meta_context(context_id)?;
        let iprp = self
            .meta_box()?
            .item_properties()
            .ok_or(Error::NotApplicable("meta box has no item properties"))?;
        if let Some(HeifBox::OperatingPointsInformation(oinf)) =
            iprp.property_by_type(item_id, FourCC::new("oinf"))
        {
            return Ok(oinf.clone());
        }

        // Synthesize from the VPS.
        let vps = match iprp.property_by_type(item_id, FourCC::new("lhvC")) {
            Some(HeifBox::LHevcConfigurationBox(lhvc)) => lhvc
                .configuration
                .nal_units_of_type(HevcNalUnitType::Vps)
                .first()
                .cloned(),
            _ => match iprp.property_by_type(item_id, FourCC::new("hvcC")) {
                Some(HeifBox::HevcConfigurationBox(hvcc)) => hvcc
                    .configuration
                    .nal_units_of_type(HevcNalUnitType::Vps)
                    .first()
                    .cloned(),
                _ => None,
            },
        };
        let vps = vps.ok_or(Error::InvalidItemId(item_id))?;
        let info = crate::parser::hevc::make_oinf(&vps)
            .map_err(|e| Error::MediaParsing(e.to_string()))?;
        Ok(OperatingPointsInformation { info })
    }

    //
    // Timing.
    //

    /// Force an untimed image collection to play at a fixed rate.
    pub fn set_forced_timed_playback(&mut self, context_id: u32, fps: f64) -> Result<()> {
        self.meta_context(context_id)?;
        if fps <= 0.0 {
            return Err(Error::InvalidFunctionParameter("fps must be positive"));
        }
        if let Some(meta) = self.data.as_mut().and_then(|d| d.meta.as_mut()) {
            meta.forced_fps = Some(fps);
        }
        Ok(())
    }

    /// Force looped playback for a context.
    pub fn set_forced_loop_playback(&mut self, context_id: u32, looping: bool) -> Result<()> {
        let data = self.data.as_mut().ok_or(Error::Uninitialized)?;
        if let Some(meta) = data.meta.as_mut() {
            if meta.context_id == context_id {
                meta.forced_loop = looping;
                return Ok(());
            }
        }
        match data.tracks.get_mut(&context_id) {
            Some(track) => {
                track.forced_loop = looping;
                Ok(())
            },
            None => Err(Error::InvalidContextId(context_id)),
        }
    }

    /// `(timestamp ms, item id)` pairs in presentation order.
    pub fn get_item_timestamps(&self, context_id: u32) -> Result<Vec<(i64, u32)>> {
        let data = self.data()?;
        if let Some(meta) = data.meta.as_ref() {
            if meta.context_id == context_id {
                let fps = meta
                    .forced_fps
                    .ok_or(Error::Uninitialized)?;
                let masters = self.get_item_list_by_type(context_id, "master")?;
                let ms_per_image = 1000.0 / fps;
                return Ok(masters
                    .iter()
                    .enumerate()
                    .map(|(n, &id)| ((n as f64 * ms_per_image) as i64, id))
                    .collect());
            }
        }

        let track = self.track_context(context_id)?;
        let looped = track.forced_loop
            || track.feature.has(TrackFeature::HAS_INFINITE_LOOP_PLAYBACK);
        let pmap = if looped {
            let target = std::cmp::max(track.duration_ms, 1);
            track.timeline.presentation_map_looped(track.timescale, target)
        } else {
            track.timeline.presentation_map(track.timescale)
        };
        Ok(pmap.into_iter().map(|(ts, id)| (ts, id as u32)).collect())
    }

    /// Looped timestamps: the presentation map is repeated, offset by
    /// its span, until `target_duration_ms` is reached.
    pub fn get_item_timestamps_looped(
        &self,
        context_id: u32,
        target_duration_ms: u64,
    ) -> Result<Vec<(i64, u32)>> {
        let track = self.track_context(context_id)?;
        let pmap = track
            .timeline
            .presentation_map_looped(track.timescale, target_duration_ms);
        Ok(pmap.into_iter().map(|(ts, id)| (ts, id as u32)).collect())
    }

    /// All presentation timestamps of one item.
    pub fn get_timestamps_of_item(&self, context_id: u32, item_id: u32) -> Result<Vec<i64>> {
        let all = self.get_item_timestamps(context_id)?;
        let v: Vec<i64> = all
            .into_iter()
            .filter(|&(_, id)| id == item_id)
            .map(|(ts, _)| ts)
            .collect();
        if v.is_empty() {
            return Err(Error::InvalidItemId(item_id));
        }
        Ok(v)
    }

    /// `(item id, timestamp ms)` pairs in decoding order.
    pub fn get_items_in_decoding_order(&self, context_id: u32) -> Result<Vec<(u32, i64)>> {
        let data = self.data()?;
        if let Some(meta) = data.meta.as_ref() {
            if meta.context_id == context_id {
                return Ok(self
                    .get_item_timestamps(context_id)?
                    .into_iter()
                    .map(|(ts, id)| (id, ts))
                    .collect());
            }
        }

        let track = self.track_context(context_id)?;
        let mut v = Vec::new();
        for (i, sample) in track.samples.iter().enumerate() {
            for &ts in &sample.composition_times {
                v.push((i as u32, ts));
            }
        }
        // Decoding order is the sample order; timestamps within a
        // sample stay sorted.
        Ok(v)
    }

    /// Item ids this item directly depends on for decoding.
    pub fn get_item_decode_dependencies(&self, context_id: u32, item_id: u32) -> Result<Vec<u32>> {
        let data = self.data()?;
        if let Some(meta) = data.meta.as_ref() {
            if meta.context_id == context_id {
                if !meta.image_info.contains_key(&item_id) {
                    return Err(Error::InvalidItemId(item_id));
                }
                let mut deps = self.get_referenced_from_item_list_by_type(context_id, item_id, "dimg")?;
                deps.extend(self.get_referenced_from_item_list_by_type(context_id, item_id, "base")?);
                return Ok(deps);
            }
        }

        // Track: resolve the 'refs' sample group of the sample.
        let track = self.track_context(context_id)?;
        if track.samples.get(item_id as usize).is_none() {
            return Err(Error::InvalidItemId(item_id));
        }
        let moov = data.heif.movie().ok_or(Error::Uninitialized)?;
        let trak = moov
            .track_by_id(track.track_id)
            .ok_or(Error::InvalidContextId(context_id))?;
        let stbl = trak.sample_table();
        let sgpd = match stbl.sample_group_description() {
            Some(sgpd) if sgpd.grouping_type == b"refs" => sgpd,
            _ => return Ok(Vec::new()),
        };
        let sbgp = match stbl
            .sample_to_groups()
            .into_iter()
            .find(|s| s.grouping_type == b"refs")
        {
            Some(sbgp) => sbgp,
            None => return Ok(Vec::new()),
        };

        let index = sbgp.group_description_index(item_id + 1);
        let refs = match sgpd.entry(index) {
            Some(SampleGroupDescriptionEntry::DirectReferenceSamplesList(refs)) => refs,
            _ => return Ok(Vec::new()),
        };

        // Ids in the entry are sample-group sample ids; map them back
        // to 0-based sample indexes through the group entries.
        let mut deps = Vec::new();
        for &ref_id in &refs.direct_reference_sample_ids {
            for (entry_idx, item) in sgpd.entries.iter().enumerate() {
                if let SampleGroupDescriptionEntry::DirectReferenceSamplesList(e) = &item.entry {
                    if e.sample_id == ref_id {
                        for sample in sbgp.samples_with_index(entry_idx as u32 + 1) {
                            deps.push(sample - 1);
                        }
                    }
                }
            }
        }
        Ok(deps)
    }

    /// Playback duration of a context in milliseconds.
    pub fn get_playback_duration_ms(&self, context_id: u32) -> Result<u64> {
        let data = self.data()?;
        if let Some(meta) = data.meta.as_ref() {
            if meta.context_id == context_id {
                return match meta.forced_fps {
                    Some(fps) => {
                        Ok((meta.displayable_master_images as f64 * 1000.0 / fps) as u64)
                    },
                    None => Ok(0),
                };
            }
        }
        let track = self.track_context(context_id)?;
        Ok(track.duration_ms)
    }
}

//
// Context extraction.
//

fn is_image_item_type(item_type: FourCC) -> bool {
    item_type == b"hvc1"
        || item_type == b"avc1"
        || item_type == b"grid"
        || item_type == b"iovl"
        || item_type == b"iden"
        || item_type == b"lhv1"
}

fn extract_meta_context(heif: &Heif, context_id: u32) -> io::Result<MetaContext> {
    let meta = heif.meta().unwrap();
    if !meta.is_valid() {
        return Err(ioerr!(InvalidData, "meta box is structurally invalid"));
    }

    let iinf = match meta.item_info() {
        Some(iinf) => iinf,
        None => {
            // An empty meta context.
            return Ok(MetaContext {
                context_id,
                feature: MetaBoxFeature::default(),
                image_features: HashMap::new(),
                item_features: HashMap::new(),
                image_info: HashMap::new(),
                grids: HashMap::new(),
                overlays: HashMap::new(),
                displayable_master_images: 0,
                forced_fps: None,
                forced_loop: false,
            });
        },
    };

    let primary_id = meta.primary_item().map(|pitm| pitm.item_id);
    let refs_from = |item_id: u32, rtype: &str| -> bool {
        meta.item_reference()
            .map(|iref| !iref.to_item_ids(FourCC::new(rtype), item_id).is_empty())
            .unwrap_or(false)
    };
    let refs_to = |item_id: u32, rtype: &str| -> bool {
        meta.item_reference()
            .map(|iref| !iref.from_item_ids(FourCC::new(rtype), item_id).is_empty())
            .unwrap_or(false)
    };

    let mut image_features = HashMap::new();
    let mut item_features = HashMap::new();
    let mut image_info = HashMap::new();

    for entry in &iinf.entries {
        let item_id = entry.item_id;
        if is_image_item_type(entry.item_type) {
            let mut f = ImageFeature::default();
            if entry.item_protection_index > 0 {
                f.set(ImageFeature::IS_PROTECTED);
            }
            if refs_from(item_id, "thmb") {
                f.set(ImageFeature::IS_THUMBNAIL_IMAGE);
            }
            if refs_from(item_id, "auxl") {
                f.set(ImageFeature::IS_AUXILIARY_IMAGE);
            }
            if refs_from(item_id, "base") {
                f.set(ImageFeature::IS_PRE_COMPUTED_DERIVED_IMAGE);
            }
            if refs_from(item_id, "dimg") {
                f.set(ImageFeature::IS_DERIVED_IMAGE);
            }
            if !f.has(ImageFeature::IS_THUMBNAIL_IMAGE) && !f.has(ImageFeature::IS_AUXILIARY_IMAGE)
            {
                f.set(ImageFeature::IS_MASTER_IMAGE);
            }
            if refs_to(item_id, "thmb") {
                f.set(ImageFeature::HAS_LINKED_THUMBNAILS);
            }
            if refs_to(item_id, "auxl") {
                f.set(ImageFeature::HAS_LINKED_AUXILIARY_IMAGE);
            }
            if refs_to(item_id, "cdsc") {
                f.set(ImageFeature::HAS_LINKED_METADATA);
            }
            if refs_to(item_id, "base") {
                f.set(ImageFeature::HAS_LINKED_PRE_COMPUTED_DERIVED_IMAGE);
            }
            if refs_to(item_id, "tbas") {
                f.set(ImageFeature::HAS_LINKED_TILES);
            }
            if refs_to(item_id, "dimg") {
                f.set(ImageFeature::HAS_LINKED_DERIVED_IMAGE);
            }
            if primary_id == Some(item_id) {
                f.set(ImageFeature::IS_PRIMARY_IMAGE);
                f.set(ImageFeature::IS_COVER_IMAGE);
            }
            if entry.is_hidden() {
                f.set(ImageFeature::IS_HIDDEN_IMAGE);
            }
            image_features.insert(item_id, f);

            // Reader-assigned item type.
            let item_type = if entry.item_type == b"hvc1" || entry.item_type == b"avc1" {
                if entry.is_hidden() {
                    "hidden".to_string()
                } else if f.has(ImageFeature::IS_THUMBNAIL_IMAGE) {
                    "thmb".to_string()
                } else if f.has(ImageFeature::IS_AUXILIARY_IMAGE) {
                    "auxl".to_string()
                } else if f.has(ImageFeature::IS_PRE_COMPUTED_DERIVED_IMAGE) {
                    "pre-computed".to_string()
                } else {
                    "master".to_string()
                }
            } else {
                entry.item_type.to_string()
            };

            // Dimensions from the associated ispe.
            let (width, height) = match meta
                .item_properties()
                .and_then(|iprp| iprp.property_by_type(item_id, FourCC::new("ispe")))
            {
                Some(HeifBox::ImageSpatialExtentsProperty(ispe)) => (ispe.width, ispe.height),
                _ => {
                    log::warn!("no ispe property for image item {}", item_id);
                    (0, 0)
                },
            };
            image_info.insert(
                item_id,
                ImageInfo {
                    item_type,
                    width,
                    height,
                },
            );
        } else {
            let mut f = ItemFeature::default();
            if entry.item_protection_index > 0 {
                f.set(ItemFeature::IS_PROTECTED);
            }
            if refs_from(item_id, "cdsc") {
                f.set(ItemFeature::IS_METADATA_ITEM);
            }
            if entry.item_type == b"Exif" {
                f.set(ItemFeature::IS_EXIF_ITEM);
            } else if entry.item_type == b"mime" {
                f.set(ItemFeature::IS_MIME_ITEM);
            } else if entry.item_type == b"hvt1" {
                f.set(ItemFeature::IS_TILE_IMAGE_ITEM);
            }
            item_features.insert(item_id, f);
        }
    }

    // Grid and overlay descriptors.
    let mut grids = HashMap::new();
    let mut overlays = HashMap::new();
    for entry in &iinf.entries {
        let item_id = entry.item_id;
        if entry.item_protection_index > 0 {
            continue;
        }
        if entry.item_type == b"grid" || entry.item_type == b"iovl" {
            let data = load_item_payload(heif, meta, item_id)?;
            let item_ids = meta
                .item_reference()
                .map(|iref| iref.to_item_ids(FourCC::new("dimg"), item_id))
                .unwrap_or_default();
            if entry.item_type == b"grid" {
                grids.insert(
                    item_id,
                    GridItem {
                        grid: ImageGrid::parse(&data)?,
                        item_ids,
                    },
                );
            } else {
                overlays.insert(
                    item_id,
                    IovlItem {
                        overlay: ImageOverlay::parse(&data)?,
                        item_ids,
                    },
                );
            }
        }
    }

    // MetaBox feature synthesis.
    let mut feature = MetaBoxFeature::default();
    if meta.groups_list().is_some() {
        feature.set(MetaBoxFeature::HAS_GROUP_LISTS);
    }
    if image_features.len() == 1 {
        feature.set(MetaBoxFeature::IS_SINGLE_IMAGE);
    } else if image_features.len() > 1 {
        feature.set(MetaBoxFeature::IS_IMAGE_COLLECTION);
    }
    for f in image_features.values() {
        if f.has(ImageFeature::IS_MASTER_IMAGE) {
            feature.set(MetaBoxFeature::HAS_MASTER_IMAGES);
        }
        if f.has(ImageFeature::IS_THUMBNAIL_IMAGE) {
            feature.set(MetaBoxFeature::HAS_THUMBNAILS);
        }
        if f.has(ImageFeature::IS_COVER_IMAGE) {
            feature.set(MetaBoxFeature::HAS_COVER_IMAGE);
        }
        if f.has(ImageFeature::IS_AUXILIARY_IMAGE) {
            feature.set(MetaBoxFeature::HAS_AUXILIARY_IMAGES);
        }
        if f.has(ImageFeature::IS_DERIVED_IMAGE) {
            feature.set(MetaBoxFeature::HAS_DERIVED_IMAGES);
        }
        if f.has(ImageFeature::IS_PRE_COMPUTED_DERIVED_IMAGE) {
            feature.set(MetaBoxFeature::HAS_PRE_COMPUTED_DERIVED_IMAGES);
        }
        if f.has(ImageFeature::IS_HIDDEN_IMAGE) {
            feature.set(MetaBoxFeature::HAS_HIDDEN_IMAGES);
        }
    }

    let displayable_master_images = image_info
        .values()
        .filter(|i| i.item_type == "master")
        .count() as u32;

    Ok(MetaContext {
        context_id,
        feature,
        image_features,
        item_features,
        image_info,
        grids,
        overlays,
        displayable_master_images,
        forced_fps: None,
        forced_loop: false,
    })
}

// Raw item payload via the item location (no NAL processing).
fn load_item_payload(heif: &Heif, meta: &MetaBox, item_id: u32) -> io::Result<Vec<u8>> {
    let iloc = meta
        .item_location()
        .ok_or_else(|| ioerr!(InvalidData, "no iloc box"))?;
    let location = iloc
        .location_by_id(item_id)
        .ok_or_else(|| ioerr!(InvalidData, "no iloc entry for item {}", item_id))?;
    let mut out = Vec::new();
    for extent in &location.extents {
        let offset = location.base_offset + extent.offset;
        match location.construction_method {
            ConstructionMethod::FileOffset => {
                out.extend(heif.read_file_range(offset, extent.length)?);
            },
            ConstructionMethod::IdatOffset => {
                let idat = meta
                    .item_data()
                    .ok_or_else(|| ioerr!(InvalidData, "iloc references an absent idat box"))?;
                out.extend_from_slice(idat.read(offset, extent.length)?);
            },
            ConstructionMethod::ItemOffset => {
                return Err(ioerr!(InvalidData, "item_offset construction method"));
            },
        }
    }
    Ok(out)
}

fn extract_track_context(heif: &Heif, track_id: u32) -> io::Result<TrackContext> {
    let moov = heif.movie().unwrap();
    let trak = moov
        .track_by_id(track_id)
        .ok_or_else(|| ioerr!(InvalidData, "no track with id {}", track_id))?;
    if !trak.is_valid() || !trak.sample_table().is_valid() {
        return Err(ioerr!(InvalidData, "track {} is structurally invalid", track_id));
    }

    let mvhd = moov.movie_header();
    let tkhd = trak.track_header();
    let stbl = trak.sample_table();
    let mdhd = trak.media().media_header();

    // Feature synthesis.
    let mut feature = TrackFeature::default();
    if tkhd.flags.get_enabled() {
        feature.set(TrackFeature::IS_ENABLED);
    }
    if tkhd.flags.get_in_movie() {
        feature.set(TrackFeature::IS_IN_MOVIE);
    }
    if tkhd.flags.get_in_preview() {
        feature.set(TrackFeature::IS_IN_PREVIEW);
    }
    if tkhd.alt_group != 0 {
        feature.set(TrackFeature::HAS_ALTERNATIVES);
    }

    let thumb_refs = trak
        .track_reference()
        .map(|tref| tref.track_ids_of_type(FourCC::new("thmb")))
        .unwrap_or_default();
    let aux_refs = trak
        .track_reference()
        .map(|tref| tref.track_ids_of_type(FourCC::new("auxl")))
        .unwrap_or_default();
    if !thumb_refs.is_empty() {
        feature.set(TrackFeature::IS_THUMBNAIL_IMAGE_SEQUENCE);
    }
    if !aux_refs.is_empty() {
        feature.set(TrackFeature::IS_AUXILIARY_IMAGE_SEQUENCE);
    }
    if thumb_refs.is_empty() && aux_refs.is_empty() {
        feature.set(TrackFeature::IS_MASTER_IMAGE_SEQUENCE);
    }

    if stbl.sync_samples().is_some() {
        feature.set(TrackFeature::HAS_SYNC_SAMPLES);
    }
    if stbl.sample_group_description().is_some() || !stbl.sample_to_groups().is_empty() {
        feature.set(TrackFeature::HAS_SAMPLE_GROUPS);
    }

    let elst = trak.edit_list();
    if elst.is_some() {
        feature.set(TrackFeature::HAS_EDIT_LIST);
        // Infinite looping: edit list flagged repeating plus an
        // indefinite track duration.
        if elst.map(|e| e.flags.get_looping()).unwrap_or(false)
            && tkhd.duration.0 == 0xffffffff
        {
            feature.set(TrackFeature::HAS_INFINITE_LOOP_PLAYBACK);
        }
    }

    // Per-sample properties.
    let stsd = stbl.sample_description();
    let refs_sgpd = stbl
        .sample_group_description()
        .filter(|sgpd| sgpd.grouping_type == b"refs");
    let refs_sbgp = stbl
        .sample_to_groups()
        .into_iter()
        .find(|sbgp| sbgp.grouping_type == b"refs")
        .cloned();

    let mut samples = Vec::new();
    for (index, info) in sample_info_iter(trak).enumerate() {
        let entry_type = stsd
            .entry(info.sample_description_index)
            .map(|e| e.fourcc())
            .unwrap_or_default();

        if let Some(HeifBox::HevcSampleEntry(entry)) = stsd.entry(info.sample_description_index) {
            if entry.coding_constraints().is_some() {
                feature.set(TrackFeature::HAS_CODING_CONSTRAINTS);
            }
        }

        // Classified through the 'refs' grouping: a listed sample with
        // sample_id 0 is an output non-reference frame.
        let mut sample_type = SampleType::OutputReferenceFrame;
        if let (Some(sgpd), Some(sbgp)) = (refs_sgpd, refs_sbgp.as_ref()) {
            let gdi = sbgp.group_description_index(index as u32 + 1);
            if let Some(SampleGroupDescriptionEntry::DirectReferenceSamplesList(refs)) =
                sgpd.entry(gdi)
            {
                if refs.sample_id == 0 {
                    sample_type = SampleType::OutputNonReferenceFrame;
                }
            }
        }

        samples.push(SampleProps {
            fpos: info.fpos,
            size: info.size,
            sample_description_index: info.sample_description_index,
            entry_type,
            sample_type,
            composition_times: Vec::new(),
        });
    }

    // Timing: unravel the sample tables into the movie timeline.
    let timeline = Timeline::unravel(
        stbl.time_to_sample(),
        stbl.composition_offset(),
        trak.edit_list(),
    )?;
    for (&ts, &sample) in timeline.presentation_map(mdhd.timescale).iter() {
        if let Some(props) = samples.get_mut(sample as usize) {
            props.composition_times.push(ts);
        }
    }

    // An all-ones track duration means "indefinite" (looping); give
    // such a track two spans so loop consumers see the repetition.
    let duration_ms = if tkhd.duration.0 == 0xffffffff {
        let span_ms = if mdhd.timescale > 0 {
            timeline.span().saturating_mul(1000) / mdhd.timescale as u64
        } else {
            0
        };
        span_ms * 2
    } else if mvhd.timescale > 0 {
        tkhd.duration.0.saturating_mul(1000) / mvhd.timescale as u64
    } else {
        0
    };

    Ok(TrackContext {
        track_id,
        feature,
        timescale: mdhd.timescale,
        duration_ms,
        samples,
        timeline,
        forced_loop: false,
    })
}

fn synthesize_file_feature(data: &ReaderData) -> FileFeature {
    let mut feature = FileFeature::default();
    if let Some(meta) = data.meta.as_ref() {
        feature.set(FileFeature::HAS_ROOT_LEVEL_META_BOX);
        if meta.feature.has(MetaBoxFeature::HAS_COVER_IMAGE) {
            feature.set(FileFeature::HAS_COVER_IMAGE);
        }
        if meta.feature.has(MetaBoxFeature::IS_SINGLE_IMAGE) {
            feature.set(FileFeature::HAS_SINGLE_IMAGE);
        }
        if meta.feature.has(MetaBoxFeature::IS_IMAGE_COLLECTION) {
            feature.set(FileFeature::HAS_IMAGE_COLLECTION);
        }
    }
    for track in data.tracks.values() {
        if track.feature.has(TrackFeature::IS_MASTER_IMAGE_SEQUENCE) {
            feature.set(FileFeature::HAS_IMAGE_SEQUENCE);
        }
        if track.feature.has(TrackFeature::HAS_ALTERNATIVES) {
            feature.set(FileFeature::HAS_ALTERNATE_TRACKS);
        }
    }
    feature
}
