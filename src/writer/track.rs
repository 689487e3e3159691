//! Image sequence (TrackBox) writer.
//!
//! Every coded image becomes a sample; all samples of a track go into
//! one chunk. Sync information is implicit (every image is a random
//! access point, so no stss is written) and the sample entry carries
//! a CodingConstraintsBox.

use crate::boxes::prelude::*;
use crate::boxes::{
    AvcSampleEntry, CodingConstraintsBox, DataInformationBox, EditBox, EditListBox, EditListEntry,
    EditListFlags, HandlerBox, HevcSampleEntry, MediaBox, MediaHeaderBox, MediaInformationBox,
    SampleDescriptionBox, SampleSizeBox, SampleTableBox, SampleToChunkBox, SampleToChunkEntry,
    ChunkOffsetBox, TimeToSampleBox, TimeToSampleEntry, TrackBox, TrackHeaderBox,
    TrackReferenceBox, VideoMediaHeaderBox,
};
use crate::error::{Error, Result};
use crate::writer::config::MasterConfig;
use crate::writer::media::{DecoderConfig, MediaIntake};
use crate::writer::{FileBuilder, TrackData};

pub(crate) fn write_track(
    master: &MasterConfig,
    intake: &MediaIntake,
    track_id: u32,
    thumb_of: Option<u32>,
    builder: &mut FileBuilder,
) -> Result<()> {
    if master.fps <= 0.0 {
        return Err(Error::WriterValidation("fps must be positive".to_string()));
    }
    let timescale = master.timescale;
    let sample_delta = (timescale as f64 / master.fps).round() as u32;
    if sample_delta == 0 {
        return Err(Error::WriterValidation(
            "timescale too small for the configured fps".to_string(),
        ));
    }

    // Payload: one chunk holding all samples, back to back.
    let chunk_offset = builder.mdat_payload.len() as u64;
    let mut sizes = Vec::with_capacity(intake.images.len());
    for image in &intake.images {
        builder.push_payload(&image.data);
        sizes.push(image.data.len() as u32);
    }
    let sample_count = sizes.len() as u32;
    let media_duration = sample_count as u64 * sample_delta as u64;
    let movie_duration = media_duration * builder.movie_timescale as u64 / timescale as u64;

    let (width, height) = intake.config.dimensions();

    // Sample tables.
    let mut stbl = SampleTableBox::default();

    let mut stsd = SampleDescriptionBox::default();
    let ccst = CodingConstraintsBox {
        all_ref_pics_intra: true,
        intra_pred_used: true,
        max_ref_per_pic: 0,
    };
    match &intake.config {
        DecoderConfig::Hevc(config) => {
            let mut entry = HevcSampleEntry::default();
            entry.width = width as u16;
            entry.height = height as u16;
            entry.boxes.push(config.clone().to_heifbox());
            entry.boxes.push(ccst.to_heifbox());
            stsd.entries.push(entry.to_heifbox());
        },
        DecoderConfig::Avc(config) => {
            let mut entry = AvcSampleEntry::default();
            entry.width = width as u16;
            entry.height = height as u16;
            entry.boxes.push(config.clone().to_heifbox());
            entry.boxes.push(ccst.to_heifbox());
            stsd.entries.push(entry.to_heifbox());
        },
    }
    stbl.boxes.push(stsd.to_heifbox());

    let mut stts = TimeToSampleBox::default();
    stts.entries.push(TimeToSampleEntry {
        count: sample_count,
        delta: sample_delta,
    });
    stbl.boxes.push(stts.to_heifbox());

    let mut stsc = SampleToChunkBox::default();
    stsc.entries.push(SampleToChunkEntry {
        first_chunk: 1,
        samples_per_chunk: sample_count,
        sample_description_index: 1,
    });
    stbl.boxes.push(stsc.to_heifbox());

    // Offsets are patched to absolute positions in pass 2.
    stbl.boxes.push(ChunkOffsetBox::default().to_heifbox());

    let mut stsz = SampleSizeBox::default();
    stsz.entries = sizes;
    stbl.boxes.push(stsz.to_heifbox());

    // Media box.
    let mut minf = MediaInformationBox::default();
    minf.boxes.push(VideoMediaHeaderBox::default().to_heifbox());
    minf.boxes.push(DataInformationBox::default().to_heifbox());
    minf.boxes.push(stbl.to_heifbox());

    let mdhd = MediaHeaderBox {
        cr_time: Time::default(),
        mod_time: Time::default(),
        timescale,
        duration: media_duration.into(),
        language: IsoLanguageCode::default(),
        quality: 0,
    };

    let mut mdia = MediaBox::default();
    mdia.boxes.push(mdhd.to_heifbox());
    mdia.boxes.push(HandlerBox::picture().to_heifbox());
    mdia.boxes.push(minf.to_heifbox());

    // Track header.
    let mut tkhd = TrackHeaderBox::default();
    tkhd.track_id = track_id;
    tkhd.flags.set_enabled(true);
    tkhd.flags.set_in_movie(thumb_of.is_none());
    tkhd.flags.set_in_preview(thumb_of.is_none());
    tkhd.width = (width as f64).into();
    tkhd.height = (height as f64).into();
    tkhd.duration = if master.looping {
        0xffffffffu64.into()
    } else {
        movie_duration.into()
    };

    let mut trak = TrackBox::default();
    trak.boxes.push(tkhd.to_heifbox());

    if let Some(master_track_id) = thumb_of {
        let mut tref = TrackReferenceBox::default();
        tref.add_reference(FourCC::new("thmb"), master_track_id);
        trak.boxes.push(tref.to_heifbox());
    }

    if master.looping {
        let mut flags = EditListFlags::default();
        flags.set_looping(true);
        let mut elst = EditListBox::default();
        elst.flags = flags;
        elst.entries.push(EditListEntry {
            segment_duration: movie_duration,
            media_time: 0,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        });
        let mut edts = EditBox::default();
        edts.boxes.push(elst.to_heifbox());
        trak.boxes.push(edts.to_heifbox());
    }

    trak.boxes.push(mdia.to_heifbox());

    builder.tracks.push(TrackData {
        trak,
        relative_chunk_offsets: vec![chunk_offset],
    });
    Ok(())
}
