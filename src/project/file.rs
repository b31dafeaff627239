use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::audio::envelope::EnvelopeConfig;
use crate::foundation::error::{VibeError, VibeResult};
use crate::render::style::VisualSettings;
use crate::session::render_session::{RenderConfig, RenderSession};
use crate::timeline::cache::TimelineCache;
use crate::timeline::decode::AudioDecoder;
use crate::timeline::model::{Playlist, Timeline, Track, TrackSource};

/// One playlist entry in a project file.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrackEntry {
    /// Audio file, relative to the project file's directory unless absolute.
    pub path: PathBuf,
    /// Display title. Defaults to the file stem.
    #[serde(default)]
    pub name: Option<String>,
    /// Display artist.
    #[serde(default)]
    pub artist: Option<String>,
    /// Declared duration. Probed from the file when absent.
    #[serde(default)]
    pub duration_secs: Option<f64>,
}

/// JSON-facing description of one export: tracks, background and settings.
///
/// Every field except `tracks` has a default, so the smallest project is
/// `{"tracks": [{"path": "song.wav"}]}`.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Project {
    /// Tracks in play order.
    pub tracks: Vec<TrackEntry>,
    /// Optional cover image drawn behind the visualization.
    pub background_image: Option<PathBuf>,
    /// Export parameters.
    pub render: RenderConfig,
    /// Visual settings.
    pub visual: VisualSettings,
    /// Envelope tuning.
    pub envelope: EnvelopeConfig,
    /// Directory relative paths resolve against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Project {
    /// Parse a project from a JSON reader. Relative paths resolve against the working directory.
    pub fn from_reader<R: std::io::Read>(r: R) -> VibeResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| VibeError::serde(format!("parse project JSON: {e}")))
    }

    /// Parse a project file. Relative paths resolve against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> VibeResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            VibeError::validation(format!("open project JSON '{}': {e}", path.display()))
        })?;
        let mut project = Self::from_reader(BufReader::new(f))?;
        project.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(project)
    }

    /// Check the settings and the track list.
    pub fn validate(&self) -> VibeResult<()> {
        if self.tracks.is_empty() {
            return Err(VibeError::validation("project has no tracks"));
        }
        for (i, t) in self.tracks.iter().enumerate() {
            if t.path.as_os_str().is_empty() {
                return Err(VibeError::validation(format!("track {i} has an empty path")));
            }
            if let Some(d) = t.duration_secs
                && (!d.is_finite() || d < 0.0)
            {
                return Err(VibeError::validation(format!(
                    "track {i} duration_secs must be finite and >= 0"
                )));
            }
        }
        self.render.validate()?;
        self.visual.validate()?;
        self.envelope.validate()
    }

    /// Resolve a path from the project file against [`Project::base_dir`].
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Build the playlist, probing durations the project does not declare.
    pub fn playlist(&self) -> Playlist {
        let mut playlist = Playlist::new();
        for entry in &self.tracks {
            let path = self.resolve(&entry.path);
            let id = playlist.next_id();
            let track = match entry.duration_secs {
                Some(d) => {
                    let name = entry.name.clone().unwrap_or_else(|| {
                        path.file_stem()
                            .map(|s| s.to_string_lossy().into_owned())
                            .unwrap_or_default()
                    });
                    Track::new(
                        id,
                        TrackSource::Path(path),
                        name,
                        entry.artist.clone().unwrap_or_default(),
                        d,
                    )
                }
                None => Track::from_path(id, path, entry.name.clone(), entry.artist.clone()),
            };
            playlist.push(track);
        }
        playlist
    }

    /// Validate and assemble a ready-to-render session.
    pub fn into_session(self, decoder: impl AudioDecoder + 'static) -> VibeResult<RenderSession> {
        self.validate()?;
        let timeline = Timeline::from_playlist(&self.playlist());
        let cache = TimelineCache::with_capacity(timeline, decoder, self.render.residency_cap);
        let background = self.background_image.as_deref().map(|p| self.resolve(p));
        let font_path = self.visual.font_path.as_deref().map(|p| self.resolve(p));
        let visual = VisualSettings {
            font_path,
            ..self.visual
        };
        let session = RenderSession::new(cache, self.render, visual, self.envelope)?;
        Ok(match background {
            Some(path) => session.with_background_path(path),
            None => session,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/project/file.rs"]
mod tests;
