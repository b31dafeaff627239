use super::*;
use crate::render::style::VisualizationMode;
use crate::timeline::decode::WavDecoder;

fn write_wav(path: &Path, secs: f64, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut w = hound::WavWriter::create(path, spec).unwrap();
    let n = (secs * f64::from(sample_rate)).round() as u32;
    for i in 0..n {
        let v = ((i % 64) as f32 / 64.0) - 0.5;
        w.write_sample(v).unwrap();
        w.write_sample(-v).unwrap();
    }
    w.finalize().unwrap();
}

#[test]
fn minimal_project_uses_defaults() {
    let p = Project::from_reader(r#"{"tracks": [{"path": "a.wav"}]}"#.as_bytes()).unwrap();
    assert_eq!(p.tracks.len(), 1);
    assert_eq!(p.tracks[0].name, None);
    assert_eq!(p.render, RenderConfig::default());
    assert_eq!(p.visual, VisualSettings::default());
    assert!(p.background_image.is_none());
    assert!(p.validate().is_ok());
}

#[test]
fn nested_settings_override_individual_fields() {
    let json = r##"{
        "tracks": [{"path": "a.wav", "name": "Intro", "artist": "Band", "duration_secs": 12.5}],
        "render": {"width": 1920, "height": 1080, "chunk_secs": 2.0},
        "visual": {"mode": "orbital", "color": "#00ff00"},
        "envelope": {"gain": 2.0}
    }"##;
    let p = Project::from_reader(json.as_bytes()).unwrap();
    assert_eq!(p.render.width, 1920);
    assert_eq!(p.render.chunk_secs, 2.0);
    assert_eq!(p.render.fps, RenderConfig::default().fps);
    assert_eq!(p.visual.mode, VisualizationMode::Orbital);
    assert_eq!(p.envelope.gain, 2.0);
    assert_eq!(p.envelope.attack, EnvelopeConfig::default().attack);
}

#[test]
fn unknown_fields_are_rejected() {
    let err = Project::from_reader(r#"{"tracks": [], "tempo": 120}"#.as_bytes()).unwrap_err();
    assert!(matches!(err, VibeError::Serde(_)));
}

#[test]
fn validate_rejects_bad_tracks() {
    let mut p = Project::default();
    assert!(p.validate().is_err());
    p.tracks.push(TrackEntry {
        path: PathBuf::from("x.wav"),
        name: None,
        artist: None,
        duration_secs: Some(-1.0),
    });
    assert!(p.validate().is_err());
    p.tracks[0].duration_secs = Some(3.0);
    assert!(p.validate().is_ok());
    p.render.fps.num = 0;
    assert!(p.validate().is_err());
}

#[test]
fn declared_durations_skip_probing() {
    let p = Project {
        tracks: vec![
            TrackEntry {
                path: PathBuf::from("music/one.flac"),
                name: None,
                artist: Some("A".to_string()),
                duration_secs: Some(10.0),
            },
            TrackEntry {
                path: PathBuf::from("/abs/two.mp3"),
                name: Some("Second".to_string()),
                artist: None,
                duration_secs: Some(15.0),
            },
        ],
        base_dir: PathBuf::from("/projects/demo"),
        ..Project::default()
    };
    let playlist = p.playlist();
    let tracks = playlist.tracks();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0].name, "one");
    assert_eq!(tracks[0].artist, "A");
    assert_eq!(tracks[1].name, "Second");
    assert_eq!(tracks[1].duration_secs, 15.0);
    match &tracks[0].source {
        TrackSource::Path(path) => assert_eq!(path, &PathBuf::from("/projects/demo/music/one.flac")),
        other => panic!("unexpected source {other:?}"),
    }
    match &tracks[1].source {
        TrackSource::Path(path) => assert_eq!(path, &PathBuf::from("/abs/two.mp3")),
        other => panic!("unexpected source {other:?}"),
    }
    assert_ne!(tracks[0].id, tracks[1].id);
}

#[test]
fn project_file_builds_a_session() {
    let dir = tempfile::tempdir().unwrap();
    write_wav(&dir.path().join("a.wav"), 1.0, 8000);
    write_wav(&dir.path().join("b.wav"), 0.5, 8000);
    let json = r#"{
        "tracks": [{"path": "a.wav"}, {"path": "b.wav", "name": "B"}],
        "background_image": "missing.png",
        "render": {"width": 32, "height": 18, "sample_rate": 8000}
    }"#;
    let project_path = dir.path().join("project.json");
    std::fs::write(&project_path, json).unwrap();

    let p = Project::from_path(&project_path).unwrap();
    assert_eq!(p.base_dir, dir.path());
    let session = p.into_session(WavDecoder).unwrap();
    assert!((session.total_duration() - 1.5).abs() < 1e-9);
    assert_eq!(session.total_frames(), 45);
    let names: Vec<&str> = session
        .cache()
        .timeline()
        .tracks()
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "B"]);
}

#[test]
fn missing_project_file_is_a_validation_error() {
    let err = Project::from_path("/definitely/not/here.json").unwrap_err();
    assert!(matches!(err, VibeError::Validation(_)));
}
