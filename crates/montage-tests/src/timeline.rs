//! Integration tests for the timeline subsystem.
//!
//! Exercises scene edits from montage-timeline against clips backed by
//! montage-media sources and rendered by montage-engine.

use crate::support::{cpu_composer, media, project};
use montage_core::{seconds, FrameRate, MontageError, PipelineConfig, Pts};
use montage_effects::{Filter, Opacity};
use montage_timeline::{Chain, ClipId, PlacedFilter, Scene, SceneEdit, Source};
use std::sync::Arc;

// ── Helpers ────────────────────────────────────────────────────

/// A = [0, 10) and B = [10, 20) on track 0.
fn two_clip_scene() -> (Scene, ClipId, ClipId) {
    let mut scene = Scene::with_tracks(project(FrameRate::FPS_25), &PipelineConfig::default(), 1);
    let mut ids = Vec::new();
    for (name, pos) in [("a", 0.0), ("b", 10.0)] {
        let source = Source::probe(Arc::new(media(name, 30.0, FrameRate::FPS_25))).unwrap();
        let clip = scene.create_clip(source, seconds(pos), 0.0, seconds(10.0));
        ids.push(clip.id());
        SceneEdit::AddClip { clip, track: 0 }.apply(&mut scene).unwrap();
    }
    scene.take_update();
    (scene, ids[0], ids[1])
}

fn move_b(b: ClipId, to: f64) -> SceneEdit {
    SceneEdit::Move {
        clip: b,
        track: 0,
        position: seconds(to),
        new_track: 0,
    }
}

fn position(scene: &Scene, id: ClipId) -> Pts {
    scene.find(id).unwrap().1.position()
}

// ── Placement ──────────────────────────────────────────────────

#[test]
fn overlap_beyond_margin_is_rejected_and_scene_unchanged() {
    let (mut scene, _, b) = two_clip_scene();
    let err = move_b(b, 5.0).apply(&mut scene).unwrap_err();
    assert!(matches!(err, MontageError::Placement(_)));
    assert_eq!(position(&scene, b), seconds(10.0));
    assert!(scene.find(b).unwrap().1.transition().is_none());
    assert!(!scene.take_update());
}

#[test]
fn overlap_within_margin_creates_transition() {
    let (mut scene, a, b) = two_clip_scene();
    move_b(b, 9.0).apply(&mut scene).unwrap();

    let t = scene.find(b).unwrap().1.transition().unwrap().clone();
    assert_eq!(t.position, seconds(9.0));
    assert_eq!(t.end(), seconds(10.0));
    assert_eq!(t.from, a);

    // Back to exact adjacency drops the blend.
    move_b(b, 10.0).apply(&mut scene).unwrap();
    assert!(scene.find(b).unwrap().1.transition().is_none());
}

#[test]
fn rejected_batch_rolls_back_earlier_edits() {
    let (mut scene, _, b) = two_clip_scene();
    let batch = SceneEdit::Batch(vec![move_b(b, 12.0), move_b(b, 5.0)]);
    assert!(batch.apply(&mut scene).is_err());
    assert_eq!(position(&scene, b), seconds(10.0));
}

// ── Rendering edited scenes ────────────────────────────────────

#[test]
fn transition_reads_both_clips() {
    let (mut scene, _, b) = two_clip_scene();
    move_b(b, 9.0).apply(&mut scene).unwrap();
    let mut composer = cpu_composer(scene);

    let frame = composer.run_one_shot(seconds(9.5)).unwrap();
    assert_eq!(frame.pts, seconds(9.5));
    assert_eq!(composer.sampler().input_count(), 2);

    composer.seek(seconds(9.5), false);
    let (_, audio) = composer.render().unwrap();
    assert_eq!(audio.audio_samples(), 320);
}

#[test]
fn split_clip_plays_through_the_cut() {
    let (mut scene, a, _) = two_clip_scene();
    SceneEdit::AddFilter {
        clip: a,
        chain: Chain::Video,
        filter: PlacedFilter::new(Filter::video(Opacity::default()), seconds(3.0), seconds(2.0)),
    }
    .apply(&mut scene)
    .unwrap();
    SceneEdit::Split {
        clip: a,
        track: 0,
        pts: seconds(4.0),
    }
    .apply(&mut scene)
    .unwrap();

    let track = scene.track(0).unwrap();
    assert_eq!(track.clip_count(), 3);
    assert_eq!(track.clips()[0].video_filters[0].length, Some(seconds(1.0)));
    assert_eq!(track.clips()[1].video_filters[0].offset, 0.0);
    assert_eq!(track.clips()[1].start(), seconds(4.0));

    let mut composer = cpu_composer(scene);
    let d = composer.scene().lock().profile().frame_duration();
    composer.seek(seconds(3.8), false);
    let pts: Vec<Pts> = (0..10).map(|_| composer.render().unwrap().0.pts).collect();
    assert!(pts.windows(2).all(|w| w[1] - w[0] == d));
}
