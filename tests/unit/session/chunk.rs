use std::sync::Arc;

use super::*;
use crate::timeline::model::{Track, TrackId, TrackSource};

fn timeline(durations: &[f64]) -> Timeline {
    Timeline::new(
        durations
            .iter()
            .enumerate()
            .map(|(i, &d)| {
                Track::new(
                    TrackId(i as u64),
                    TrackSource::Bytes(Arc::from(&b""[..])),
                    format!("t{i}"),
                    "",
                    d,
                )
            })
            .collect(),
    )
}

#[test]
fn thirty_seconds_in_five_second_chunks() {
    let tl = timeline(&[10.0, 15.0, 5.0]);
    let fps = Fps::new(30, 1).unwrap();
    let planner = ChunkPlanner::new(&tl, fps, 48_000, 5.0);
    assert_eq!(planner.total_frames(), 900);
    assert_eq!(planner.chunk_count(), 6);

    let chunks: Vec<RenderChunk> = planner.collect();
    assert_eq!(chunks.len(), 6);
    assert_eq!(chunks[0].frames.start, FrameIndex(0));
    assert_eq!(chunks[0].frames.end, FrameIndex(150));
    assert_eq!(chunks[5].frames.end, FrameIndex(900));
    assert_eq!(chunks[1].start_sample, 240_000);
    assert_eq!(chunks[5].end_sample, 1_440_000);
    assert_eq!(chunks[2].tracks, vec![1]);
    assert_eq!(chunks[5].tracks, vec![2]);
    for w in chunks.windows(2) {
        assert_eq!(w[0].frames.end, w[1].frames.start);
        assert_eq!(w[0].end_sample, w[1].start_sample);
    }
}

#[test]
fn partial_last_chunk_is_clamped() {
    let tl = timeline(&[3.0, 4.5]);
    let fps = Fps::new(24, 1).unwrap();
    let chunks: Vec<RenderChunk> = ChunkPlanner::new(&tl, fps, 1000, 2.0).collect();
    assert_eq!(chunks.len(), 4);
    let last = chunks.last().unwrap();
    assert_eq!(last.start_secs, 6.0);
    assert_eq!(last.end_secs, 7.5);
    assert_eq!(last.sample_count(), 1500);
    assert_eq!(last.frames.end, FrameIndex(180));
    assert_eq!(chunks[1].tracks, vec![0, 1]);
}

#[test]
fn every_frame_belongs_to_exactly_one_chunk() {
    let tl = timeline(&[1.37, 2.11, 0.52]);
    let fps = Fps::new(30_000, 1001).unwrap();
    for chunk_secs in [0.25, 0.7, 1.0, 5.0] {
        let planner = ChunkPlanner::new(&tl, fps, 44_100, chunk_secs);
        let total = planner.total_frames();
        let mut next = 0;
        for c in planner {
            assert_eq!(c.frames.start.0, next, "chunk {chunk_secs}");
            next = c.frames.end.0;
        }
        assert_eq!(next, total);
    }
}

#[test]
fn empty_timeline_has_no_chunks() {
    let tl = timeline(&[]);
    let fps = Fps::new(30, 1).unwrap();
    assert_eq!(ChunkPlanner::new(&tl, fps, 48_000, 5.0).count(), 0);
}
