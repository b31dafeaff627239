use std::collections::{BTreeMap, BTreeSet};

use crate::timeline::decode::{AudioDecoder, AudioPcm};
use crate::timeline::model::{Timeline, Track, TrackId, TrackPosition, TrackSource};

/// Default number of decoded tracks kept resident at once.
pub const DEFAULT_RESIDENCY_CAP: usize = 3;

#[derive(Debug)]
struct DecodedBuffer {
    pcm: AudioPcm,
    last_used: u64,
}

/// Borrowed view of a resident track, ready to be mixed.
#[derive(Clone, Copy, Debug)]
pub struct ActiveBuffer<'a> {
    /// Index in play order.
    pub index: usize,
    /// Track metadata.
    pub track: &'a Track,
    /// Decoded PCM.
    pub pcm: &'a AudioPcm,
    /// Global start time of the track.
    pub start_secs: f64,
    /// Declared duration of the track.
    pub duration_secs: f64,
}

/// Counters describing cache behavior since construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Tracks currently decoded.
    pub resident: usize,
    /// Successful whole-track decodes.
    pub decodes: u64,
    /// Requests served from a resident buffer.
    pub hits: u64,
    /// Buffers dropped by the LRU policy.
    pub evictions: u64,
    /// Tracks that failed to decode.
    pub failures: u64,
}

/// Session-owned map from global time to decoded audio.
///
/// Tracks are decoded whole on first need and kept under a residency cap with least-recently-used
/// eviction. Tracks needed by the window being prepared are never evicted, so a window wider
/// than the cap temporarily exceeds it. Recency is a logical clock advanced on every access.
///
/// A track that fails to decode is logged, remembered and treated as silence; it is not retried
/// until it is removed from the timeline.
pub struct TimelineCache {
    timeline: Timeline,
    decoder: Box<dyn AudioDecoder>,
    cap: usize,
    entries: BTreeMap<TrackId, DecodedBuffer>,
    failed: BTreeSet<TrackId>,
    clock: u64,
    stats: CacheStats,
}

impl std::fmt::Debug for TimelineCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineCache")
            .field("tracks", &self.timeline.tracks().len())
            .field("cap", &self.cap)
            .field("resident", &self.entries.keys().collect::<Vec<_>>())
            .field("failed", &self.failed)
            .finish()
    }
}

impl TimelineCache {
    /// Cache over `timeline` with the default residency cap.
    pub fn new(timeline: Timeline, decoder: impl AudioDecoder + 'static) -> Self {
        Self::with_capacity(timeline, decoder, DEFAULT_RESIDENCY_CAP)
    }

    /// Cache with an explicit residency cap (minimum 1).
    pub fn with_capacity(
        timeline: Timeline,
        decoder: impl AudioDecoder + 'static,
        cap: usize,
    ) -> Self {
        Self {
            timeline,
            decoder: Box::new(decoder),
            cap: cap.max(1),
            entries: BTreeMap::new(),
            failed: BTreeSet::new(),
            clock: 0,
            stats: CacheStats::default(),
        }
    }

    /// The timeline being served.
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Residency cap.
    pub fn residency_cap(&self) -> usize {
        self.cap
    }

    /// Change the residency cap (minimum 1), evicting least-recently-used tracks down to it.
    pub fn set_residency_cap(&mut self, cap: usize) {
        self.cap = cap.max(1);
        self.evict(&BTreeSet::new());
        self.stats.resident = self.entries.len();
    }

    /// Resolve global time to a track and track-relative time.
    pub fn track_at_time(&self, t: f64) -> Option<TrackPosition<'_>> {
        self.timeline.track_at_time(t)
    }

    /// Decode every track overlapping `[start, end)` that is not resident, then evict.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn ensure_resident(&mut self, start: f64, end: f64) {
        let needed = self.timeline.overlapping(start, end);
        for &idx in &needed {
            let id = self.timeline.tracks()[idx].id;
            let stamp = self.tick();
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.last_used = stamp;
                self.stats.hits += 1;
                continue;
            }
            if self.failed.contains(&id) {
                continue;
            }
            self.decode_track(idx, stamp);
        }

        let keep: BTreeSet<TrackId> = needed
            .iter()
            .map(|&i| self.timeline.tracks()[i].id)
            .collect();
        self.evict(&keep);
        self.stats.resident = self.entries.len();
    }

    fn decode_track(&mut self, idx: usize, stamp: u64) {
        let track = &self.timeline.tracks()[idx];
        let id = track.id;
        let span = tracing::debug_span!("decode_track", track = %id, name = %track.name);
        let _enter = span.enter();

        let decoded = match &track.source {
            TrackSource::Path(p) => self.decoder.decode_path(p),
            TrackSource::Bytes(b) => self.decoder.decode(b),
        };
        match decoded {
            Ok(pcm) => {
                tracing::debug!(
                    frames = pcm.frames(),
                    sample_rate = pcm.sample_rate,
                    channels = pcm.channels,
                    "decoded"
                );
                self.stats.decodes += 1;
                self.entries.insert(
                    id,
                    DecodedBuffer {
                        pcm,
                        last_used: stamp,
                    },
                );
            }
            Err(e) => {
                tracing::warn!(track = %id, error = %e, "track decode failed; its span will be silent");
                self.stats.failures += 1;
                self.failed.insert(id);
            }
        }
    }

    fn evict(&mut self, keep: &BTreeSet<TrackId>) {
        if self.entries.len() <= self.cap {
            return;
        }
        let mut candidates: Vec<(u64, TrackId)> = self
            .entries
            .iter()
            .filter(|(id, _)| !keep.contains(id))
            .map(|(id, e)| (e.last_used, *id))
            .collect();
        candidates.sort_unstable();

        for (_, id) in candidates {
            if self.entries.len() <= self.cap {
                break;
            }
            self.entries.remove(&id);
            self.stats.evictions += 1;
            tracing::debug!(track = %id, "evicted");
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Resident buffers overlapping `[start, end)`, refreshing their recency.
    ///
    /// Tracks that are not resident (failed or never ensured) are omitted.
    pub fn active_buffers(&mut self, start: f64, end: f64) -> Vec<ActiveBuffer<'_>> {
        let needed = self.timeline.overlapping(start, end);
        for &idx in &needed {
            let id = self.timeline.tracks()[idx].id;
            let stamp = self.tick();
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.last_used = stamp;
            }
        }

        let timeline = &self.timeline;
        let entries = &self.entries;
        needed
            .into_iter()
            .filter_map(|idx| {
                let track = &timeline.tracks()[idx];
                let entry = entries.get(&track.id)?;
                Some(ActiveBuffer {
                    index: idx,
                    track,
                    pcm: &entry.pcm,
                    start_secs: timeline.start_of(idx),
                    duration_secs: track.duration_secs,
                })
            })
            .collect()
    }

    /// `true` when the track's PCM is currently held.
    pub fn is_resident(&self, id: TrackId) -> bool {
        self.entries.contains_key(&id)
    }

    /// `true` when the track failed to decode.
    pub fn is_failed(&self, id: TrackId) -> bool {
        self.failed.contains(&id)
    }

    /// Resident track ids, least recently used first.
    pub fn resident_ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<(u64, TrackId)> = self
            .entries
            .iter()
            .map(|(id, e)| (e.last_used, *id))
            .collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Ids of tracks that failed to decode.
    pub fn failed_ids(&self) -> Vec<TrackId> {
        self.failed.iter().copied().collect()
    }

    /// Remove a track: the timeline is rebuilt and its decode is dropped.
    pub fn remove_track(&mut self, id: TrackId) -> Option<Track> {
        let idx = self.timeline.index_of(id)?;
        let mut tracks = self.timeline.tracks().to_vec();
        let removed = tracks.remove(idx);
        self.timeline = Timeline::new(tracks);
        self.entries.remove(&id);
        self.failed.remove(&id);
        self.stats.resident = self.entries.len();
        Some(removed)
    }

    /// Update a track's display fields. Cached audio is unaffected.
    pub fn rename_track(&mut self, id: TrackId, name: &str, artist: &str) -> bool {
        let Some(idx) = self.timeline.index_of(id) else {
            return false;
        };
        let mut tracks = self.timeline.tracks().to_vec();
        tracks[idx].name = name.to_string();
        tracks[idx].artist = artist.to_string();
        self.timeline = Timeline::new(tracks);
        true
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            resident: self.entries.len(),
            ..self.stats
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/cache.rs"]
mod tests;
