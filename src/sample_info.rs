//! Iterate over all samples in a track.
use crate::boxes::ctts::CompositionOffsetIterator;
use crate::boxes::stsc::SampleToChunkIterator;
use crate::boxes::stss::SyncSampleIterator;
use crate::boxes::stsz::SampleSizeIterator;
use crate::boxes::stts::TimeToSampleIterator;
use crate::boxes::TrackBox;

/// Information about one sample.
#[derive(Default, Debug, Clone)]
pub struct SampleInfo {
    /// File position.
    pub fpos:              u64,
    /// Size.
    pub size:              u32,
    /// Duration.
    pub duration:          u32,
    /// Decode time.
    pub decode_time:       u64,
    /// Composition time delta.
    pub composition_delta: i64,
    /// Is it a sync sample.
    pub is_sync:           bool,
    /// What chunk is it in (1-based).
    pub chunk:             u32,
    /// Which sample description applies (1-based).
    pub sample_description_index: u32,
}

/// Iterator that yields SampleInfo.
pub struct SampleInfoIterator<'a> {
    stsz_iter:       SampleSizeIterator<'a>,
    stts_iter:       TimeToSampleIterator<'a>,
    stsc_iter:       SampleToChunkIterator<'a>,
    ctts_iter:       Option<CompositionOffsetIterator<'a>>,
    stss_iter:       Option<SyncSampleIterator<'a>>,
    chunk_offsets:   &'a [u64],
    media_timescale: u32,
    fpos:            u64,
    cur_chunk:       u32,
}

impl SampleInfoIterator<'_> {
    /// Timescale of the media being iterated over.
    pub fn timescale(&self) -> u32 {
        self.media_timescale
    }
}

/// Return an iterator over the SampleTableBox of this track.
///
/// It iterates over multiple tables within the SampleTableBox, and
/// for each sample returns a SampleInfo.
pub fn sample_info_iter<'a>(trak: &'a TrackBox) -> SampleInfoIterator<'a> {
    let mdhd = trak.media().media_header();
    let stbl = trak.sample_table();

    SampleInfoIterator {
        stsz_iter: stbl.sample_size().iter(),
        stts_iter: stbl.time_to_sample().iter(),
        stsc_iter: stbl.sample_to_chunk().iter(),
        ctts_iter: stbl.composition_offset().map(|ctts| ctts.iter()),
        stss_iter: stbl.sync_samples().map(|stss| stss.iter()),
        chunk_offsets: &stbl.chunk_offset_table().entries,
        media_timescale: mdhd.timescale,
        fpos: 0,
        cur_chunk: 0,
    }
}

impl<'a> Iterator for SampleInfoIterator<'a> {
    type Item = SampleInfo;

    fn next(&mut self) -> Option<Self::Item> {
        let size = match self.stsz_iter.next() {
            Some(size) => size,
            None => return None,
        };

        let chunk_info = match self.stsc_iter.next() {
            Some(chunk_info) => chunk_info,
            None => return None,
        };

        if chunk_info.chunk_index != self.cur_chunk {
            // First sample of a new chunk: jump to the chunk offset.
            self.cur_chunk = chunk_info.chunk_index;
            let idx = self.cur_chunk.saturating_sub(1) as usize;
            self.fpos = self.chunk_offsets.get(idx).copied().unwrap_or(self.fpos);
        }

        let mut sample = SampleInfo {
            fpos: self.fpos,
            size,
            chunk: self.cur_chunk,
            is_sync: true,
            sample_description_index: chunk_info.sample_description_index,
            ..SampleInfo::default()
        };
        self.fpos += size as u64;

        if let Some((duration, decode_time)) = self.stts_iter.next() {
            sample.duration = duration;
            sample.decode_time = decode_time;
        }

        if let Some(ctts_iter) = self.ctts_iter.as_mut() {
            if let Some(delta) = ctts_iter.next() {
                sample.composition_delta = delta;
            }
        }

        if let Some(stss_iter) = self.stss_iter.as_mut() {
            sample.is_sync = stss_iter.next().unwrap_or(false);
        }

        Some(sample)
    }
}
