use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::foundation::error::{VibeError, VibeResult};
use crate::timeline::decode::probe_duration_secs;

/// Stable identity of a track; survives renames and reordering.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "track#{}", self.0)
    }
}

/// Where a track's encoded bytes come from.
#[derive(Clone)]
pub enum TrackSource {
    /// File on disk, read in full at decode time.
    Path(PathBuf),
    /// Encoded bytes already in memory.
    Bytes(Arc<[u8]>),
}

impl std::fmt::Debug for TrackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Self::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
        }
    }
}

/// One playlist entry.
///
/// `duration_secs` is fixed when the track is created and is what the timeline is built from;
/// only the display fields change afterwards.
#[derive(Clone, Debug)]
pub struct Track {
    /// Stable id.
    pub id: TrackId,
    /// Encoded audio source.
    pub source: TrackSource,
    /// Display title.
    pub name: String,
    /// Display artist; empty when unknown.
    pub artist: String,
    /// Declared duration in seconds.
    pub duration_secs: f64,
}

impl Track {
    /// Create a track with an explicit duration. Negative or non-finite durations become 0.
    pub fn new(
        id: TrackId,
        source: TrackSource,
        name: impl Into<String>,
        artist: impl Into<String>,
        duration_secs: f64,
    ) -> Self {
        Self {
            id,
            source,
            name: name.into(),
            artist: artist.into(),
            duration_secs: sanitize_duration(duration_secs),
        }
    }

    /// Create a track from a file, probing its duration once.
    ///
    /// A failed probe yields a zero-length track rather than an error. The name defaults to the
    /// file stem.
    pub fn from_path(
        id: TrackId,
        path: impl Into<PathBuf>,
        name: Option<String>,
        artist: Option<String>,
    ) -> Self {
        let path = path.into();
        let duration_secs = match probe_duration_secs(&path) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "duration probe failed; using 0");
                0.0
            }
        };
        let name = name.unwrap_or_else(|| file_stem(&path));
        Self::new(
            id,
            TrackSource::Path(path),
            name,
            artist.unwrap_or_default(),
            duration_secs,
        )
    }

    /// Title line as drawn on screen.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "Untitled"
        } else {
            &self.name
        }
    }

    /// Artist line as drawn on screen.
    pub fn display_artist(&self) -> &str {
        if self.artist.trim().is_empty() {
            "Unknown Artist"
        } else {
            &self.artist
        }
    }
}

fn sanitize_duration(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 { secs } else { 0.0 }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Ordered, editable list of tracks.
///
/// Every structural change bumps [`Playlist::revision`], so a [`Timeline`] built earlier can
/// tell that it is stale.
#[derive(Clone, Debug, Default)]
pub struct Playlist {
    tracks: Vec<Track>,
    next_id: u64,
    revision: u64,
}

impl Playlist {
    /// Empty playlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks in play order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Number of tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// `true` when there are no tracks.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Current structural revision.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Allocate the next track id.
    pub fn next_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Append a track with an explicit duration.
    pub fn add(
        &mut self,
        source: TrackSource,
        name: impl Into<String>,
        artist: impl Into<String>,
        duration_secs: f64,
    ) -> TrackId {
        let id = self.next_id();
        self.push(Track::new(id, source, name, artist, duration_secs));
        id
    }

    /// Append a file, probing its duration.
    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> TrackId {
        let id = self.next_id();
        self.push(Track::from_path(id, path, None, None));
        id
    }

    /// Append an already-built track. Its id must not collide with an existing one.
    pub fn push(&mut self, track: Track) {
        self.next_id = self.next_id.max(track.id.0 + 1);
        self.tracks.push(track);
        self.revision += 1;
    }

    /// Remove a track by id.
    pub fn remove(&mut self, id: TrackId) -> Option<Track> {
        let idx = self.index_of(id)?;
        self.revision += 1;
        Some(self.tracks.remove(idx))
    }

    /// Update display fields. Does not change the timeline.
    pub fn rename(&mut self, id: TrackId, name: &str, artist: &str) -> VibeResult<()> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| VibeError::validation(format!("unknown {id}")))?;
        let t = &mut self.tracks[idx];
        t.name = name.to_string();
        t.artist = artist.to_string();
        Ok(())
    }

    /// Move the track at `from` so that it ends up at index `to`.
    pub fn move_track(&mut self, from: usize, to: usize) -> VibeResult<()> {
        let n = self.tracks.len();
        if from >= n || to >= n {
            return Err(VibeError::validation(format!(
                "move_track index out of range ({from} -> {to}, len {n})"
            )));
        }
        if from != to {
            let t = self.tracks.remove(from);
            self.tracks.insert(to, t);
            self.revision += 1;
        }
        Ok(())
    }

    /// Index of the track with `id`.
    pub fn index_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }
}

/// A track's resolved position at a point in global time.
#[derive(Clone, Copy, Debug)]
pub struct TrackPosition<'a> {
    /// Index in play order.
    pub index: usize,
    /// The track.
    pub track: &'a Track,
    /// Global time the track starts at.
    pub start_secs: f64,
    /// Time relative to the track start.
    pub offset_secs: f64,
}

/// Gapless concatenation of tracks on one global time axis.
///
/// Track `i` occupies `[start(i), start(i) + duration(i))` and `start(i) + duration(i) ==
/// start(i + 1)` exactly; the end of the last span is the total duration.
#[derive(Clone, Debug)]
pub struct Timeline {
    tracks: Vec<Track>,
    // starts.len() == tracks.len() + 1; last entry is the total.
    starts: Vec<f64>,
    revision: u64,
}

impl Timeline {
    /// Build from tracks in play order.
    pub fn new(tracks: Vec<Track>) -> Self {
        Self::with_revision(tracks, 0)
    }

    /// Snapshot a playlist.
    pub fn from_playlist(playlist: &Playlist) -> Self {
        Self::with_revision(playlist.tracks.clone(), playlist.revision)
    }

    fn with_revision(tracks: Vec<Track>, revision: u64) -> Self {
        let mut starts = Vec::with_capacity(tracks.len() + 1);
        let mut acc = 0.0f64;
        starts.push(acc);
        for t in &tracks {
            acc += t.duration_secs;
            starts.push(acc);
        }
        Self {
            tracks,
            starts,
            revision,
        }
    }

    /// Tracks in play order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// `true` when built from the given playlist revision.
    pub fn is_current(&self, playlist: &Playlist) -> bool {
        self.revision == playlist.revision
    }

    /// Global start time of track `index`.
    pub fn start_of(&self, index: usize) -> f64 {
        self.starts[index]
    }

    /// Global end time (exclusive) of track `index`.
    pub fn end_of(&self, index: usize) -> f64 {
        self.starts[index + 1]
    }

    /// Sum of all track durations.
    pub fn total_duration(&self) -> f64 {
        self.starts.last().copied().unwrap_or(0.0)
    }

    /// Index of the track with `id`.
    pub fn index_of(&self, id: TrackId) -> Option<usize> {
        self.tracks.iter().position(|t| t.id == id)
    }

    /// Resolve global time `t`. Defined on `[0, total)` only.
    pub fn track_at_time(&self, t: f64) -> Option<TrackPosition<'_>> {
        if !t.is_finite() || t < 0.0 || t >= self.total_duration() {
            return None;
        }
        // Last start <= t; zero-length tracks share their start with the next one and are skipped.
        let index = self.starts[1..].partition_point(|&end| end <= t);
        let track = self.tracks.get(index)?;
        let start_secs = self.starts[index];
        Some(TrackPosition {
            index,
            track,
            start_secs,
            offset_secs: t - start_secs,
        })
    }

    /// Indices of tracks whose span intersects `[start, end)`.
    pub fn overlapping(&self, start: f64, end: f64) -> Vec<usize> {
        (0..self.tracks.len())
            .filter(|&i| {
                let (s, e) = (self.starts[i], self.starts[i + 1]);
                e > s && s < end && e > start
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/timeline/model.rs"]
mod tests;
