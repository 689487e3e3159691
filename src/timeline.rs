//! Presentation timestamps for the samples of a track.
//!
//! Takes the decoding deltas (stts), the composition offsets (ctts)
//! and the edit list (elst) of a track and unravels them into a
//! movie-presentation-time map: presentation time to 0-based sample
//! index. Edit list segments are classified as empty, dwell or shift
//! edits and replayed in order.

use std::collections::BTreeMap;
use std::io;

use crate::boxes::{CompositionOffsetBox, EditListBox, TimeToSampleBox};

/// Presentation map: presentation time (ms) to 0-based sample index.
pub type PMap = BTreeMap<i64, u64>;

/// Unraveled track timing.
#[derive(Debug, Default, Clone)]
pub struct Timeline {
    media_pts:    BTreeMap<i64, u64>,
    movie_pts:    BTreeMap<i64, u64>,
    movie_offset: u64,
}

impl Timeline {
    /// Generate presentation timestamps.
    ///
    /// All inputs are in media timescale units; the edit list is
    /// replayed into the movie timeline.
    pub fn unravel(
        stts: &TimeToSampleBox,
        ctts: Option<&CompositionOffsetBox>,
        elst: Option<&EditListBox>,
    ) -> io::Result<Timeline> {
        let mut timeline = Timeline::default();

        // First fetch the decode time stamps.
        let media_dts = stts.sample_times();

        // If a composition offset box is present, add the deltas to
        // the decode time stamps.
        let media_pts: Vec<i64> = match ctts {
            Some(ctts) => {
                let deltas = ctts.sample_offsets();
                if deltas.len() < media_dts.len() {
                    return Err(ioerr!(
                        InvalidData,
                        "ctts covers {} samples, stts {}",
                        deltas.len(),
                        media_dts.len()
                    ));
                }
                media_dts
                    .iter()
                    .zip(deltas.iter())
                    .map(|(&dts, &delta)| dts as i64 + delta)
                    .collect()
            },
            None => media_dts.iter().map(|&dts| dts as i64).collect(),
        };

        // Link the presentation times to the sample ids presented.
        for (sample_id, &pts) in media_pts.iter().enumerate() {
            timeline.media_pts.entry(pts).or_insert(sample_id as u64);
        }

        match elst {
            // If edits are present, apply them in order to make a
            // movie timeline.
            Some(elst) => {
                for entry in elst.entries.iter() {
                    if entry.is_empty_edit() {
                        timeline.apply_empty_edit(entry.segment_duration);
                    } else if entry.is_dwell_edit() {
                        timeline.apply_dwell_edit(entry.media_time, entry.segment_duration);
                    } else if entry.media_time >= 0 {
                        timeline.apply_shift_edit(entry.media_time, entry.segment_duration);
                    }
                }
            },
            // Else the media presentation times are the movie
            // presentation times.
            None => {
                timeline.movie_pts = timeline.media_pts.clone();
                let mut iter = timeline.movie_pts.keys().rev();
                match (iter.next(), iter.next()) {
                    (Some(&last), Some(&prev)) => {
                        timeline.movie_offset = (last + (last - prev)) as u64;
                    },
                    _ => {
                        timeline.movie_offset = 0;
                    },
                }
            },
        }

        Ok(timeline)
    }

    fn apply_empty_edit(&mut self, segment_duration: u64) {
        self.movie_offset += segment_duration;
    }

    fn apply_dwell_edit(&mut self, media_time: i64, segment_duration: u64) {
        // Find the sample at media_time. On an exact hit that sample
        // dwells; otherwise the sample just before it does.
        let sample = if let Some(&sample) = self.media_pts.get(&media_time) {
            Some(sample)
        } else {
            self.media_pts
                .range(..media_time)
                .next_back()
                .map(|(_, &sample)| sample)
        };
        let sample = match sample {
            Some(sample) => sample,
            None => {
                // Dwell before the first sample; use the first one.
                log::warn!("edit list: dwell at {} precedes all samples", media_time);
                match self.media_pts.values().next() {
                    Some(&sample) => sample,
                    None => return,
                }
            },
        };
        self.movie_pts.entry(self.movie_offset as i64).or_insert(sample);
        self.movie_offset += segment_duration;
    }

    fn apply_shift_edit(&mut self, media_time: i64, segment_duration: u64) {
        let segment_end = media_time + segment_duration as i64;

        let entries: Vec<(i64, u64)> = self.media_pts.iter().map(|(&k, &v)| (k, v)).collect();
        for (i, &(pts, sample)) in entries.iter().enumerate() {
            // Select the samples presented in this edit.
            if pts < media_time || pts >= segment_end {
                continue;
            }

            // If the pts of the first sample of this edit does not fall
            // exactly on the start of the edit, also present the sample
            // before it, for the time until this sample starts.
            if i >= 2 && entries[i - 1].0 < media_time && pts != media_time {
                self.movie_pts
                    .entry(self.movie_offset as i64)
                    .or_insert(entries[i - 1].1);
                self.movie_offset += (pts - media_time) as u64;
            }

            self.movie_pts.entry(self.movie_offset as i64).or_insert(sample);

            // Advance by the inter-sample delta if the next sample also
            // falls in the segment; otherwise to the segment end.
            match entries.get(i + 1) {
                Some(&(next_pts, _)) if next_pts <= segment_end => {
                    self.movie_offset += (next_pts - pts) as u64;
                },
                _ => {
                    self.movie_offset += (segment_end - pts) as u64;
                },
            }
        }
    }

    /// Duration of the (edited) track in media timescale units.
    pub fn span(&self) -> u64 {
        self.movie_offset
    }

    /// The movie presentation map, keys converted to milliseconds.
    pub fn presentation_map(&self, timescale: u32) -> PMap {
        let mut pmap = PMap::new();
        for (&pts, &sample) in &self.movie_pts {
            pmap.entry(pts * 1000 / timescale as i64).or_insert(sample);
        }
        pmap
    }

    /// The media presentation map (edit list not applied), in ms.
    pub fn media_presentation_map(&self, timescale: u32) -> PMap {
        let mut pmap = PMap::new();
        for (&pts, &sample) in &self.media_pts {
            pmap.entry(pts * 1000 / timescale as i64).or_insert(sample);
        }
        pmap
    }

    /// Looped presentation map: the movie map is repeated, offset by
    /// the span, until `target_duration` (ms) is reached.
    pub fn presentation_map_looped(&self, timescale: u32, target_duration: u64) -> PMap {
        let mut pmap = PMap::new();
        let mut end_time: u64 = 0;
        let mut repetition: u64 = 1;

        loop {
            for (&pts, &sample) in &self.movie_pts {
                pmap.entry(pts * 1000 / timescale as i64 + end_time as i64)
                    .or_insert(sample);
            }
            if self.movie_offset == 0 {
                // Only one sample, or nothing at all.
                break;
            }
            end_time = (self.movie_offset * 1000 / timescale as u64) * repetition;
            repetition += 1;
            if end_time >= target_duration {
                break;
            }
        }
        pmap
    }

    /// Number of samples in the movie timeline.
    pub fn len(&self) -> usize {
        self.movie_pts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boxes::{CompositionOffsetEntry, EditListEntry, TimeToSampleEntry};

    fn stts(deltas: &[(u32, u32)]) -> TimeToSampleBox {
        let mut stts = TimeToSampleBox::default();
        for &(count, delta) in deltas {
            stts.entries.push(TimeToSampleEntry { count, delta });
        }
        stts
    }

    #[test]
    fn no_edit_list() {
        let stts = stts(&[(3, 100)]);
        let timeline = Timeline::unravel(&stts, None, None).unwrap();
        let pmap = timeline.presentation_map(1000);
        assert_eq!(pmap.len(), 3);
        assert_eq!(pmap[&0], 0);
        assert_eq!(pmap[&100], 1);
        assert_eq!(pmap[&200], 2);
        // span = last + (last - prev)
        assert_eq!(timeline.span(), 300);
    }

    #[test]
    fn single_sample_has_zero_span() {
        let stts = stts(&[(1, 100)]);
        let timeline = Timeline::unravel(&stts, None, None).unwrap();
        assert_eq!(timeline.span(), 0);
    }

    #[test]
    fn ctts_reorders_samples() {
        let stts_box = stts(&[(3, 10)]);
        let mut ctts = CompositionOffsetBox::default();
        // dts 0,10,20 + offsets 20,0,10 -> pts 20,10,30
        ctts.entries.push(CompositionOffsetEntry { count: 1, offset: 20 });
        ctts.entries.push(CompositionOffsetEntry { count: 1, offset: 0 });
        ctts.entries.push(CompositionOffsetEntry { count: 1, offset: 10 });
        let timeline = Timeline::unravel(&stts_box, Some(&ctts), None).unwrap();
        let pmap = timeline.presentation_map(1000);
        let samples: Vec<u64> = pmap.values().copied().collect();
        assert_eq!(samples, vec![1, 0, 2]);
    }

    #[test]
    fn dwell_edit() {
        // stts deltas [100,100,100] at timescale 1000, one dwell segment
        // media_time=100, duration=300, rate 0.
        let stts_box = stts(&[(3, 100)]);
        let mut elst = EditListBox::default();
        elst.entries.push(EditListEntry {
            segment_duration: 300,
            media_time: 100,
            media_rate_integer: 0,
            media_rate_fraction: 0,
        });
        let timeline = Timeline::unravel(&stts_box, None, Some(&elst)).unwrap();
        let pmap = timeline.presentation_map(1000);
        assert_eq!(pmap.len(), 1);
        assert_eq!(pmap[&0], 1);
        assert_eq!(timeline.span(), 300);
    }

    #[test]
    fn empty_edit_shifts_the_timeline() {
        let stts_box = stts(&[(2, 100)]);
        let mut elst = EditListBox::default();
        elst.entries.push(EditListEntry {
            segment_duration: 50,
            media_time: -1,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        });
        elst.entries.push(EditListEntry {
            segment_duration: 200,
            media_time: 0,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        });
        let timeline = Timeline::unravel(&stts_box, None, Some(&elst)).unwrap();
        let pmap = timeline.presentation_map(1000);
        assert_eq!(pmap[&50], 0);
        assert_eq!(pmap[&150], 1);
    }

    #[test]
    fn shift_edit_selects_a_range() {
        let stts_box = stts(&[(4, 100)]);
        let mut elst = EditListBox::default();
        // Present samples with pts in [100, 300).
        elst.entries.push(EditListEntry {
            segment_duration: 200,
            media_time: 100,
            media_rate_integer: 1,
            media_rate_fraction: 0,
        });
        let timeline = Timeline::unravel(&stts_box, None, Some(&elst)).unwrap();
        let pmap = timeline.presentation_map(1000);
        assert_eq!(pmap.len(), 2);
        assert_eq!(pmap[&0], 1);
        assert_eq!(pmap[&100], 2);
        assert_eq!(timeline.span(), 200);
    }

    #[test]
    fn looped_map_repeats() {
        let stts_box = stts(&[(2, 100)]);
        let timeline = Timeline::unravel(&stts_box, None, None).unwrap();
        assert_eq!(timeline.span(), 200);
        let pmap = timeline.presentation_map_looped(1000, 600);
        // ceil(600/200) * 2 = 6 entries at least.
        assert!(pmap.len() >= 6);
        assert_eq!(pmap[&0], 0);
        assert_eq!(pmap[&200], 0);
        assert_eq!(pmap[&300], 1);
    }
}
