//! Integration tests for the decode and compose pipeline.
//!
//! Exercises montage-media inputs feeding the montage-engine composer.

use crate::support::{cpu_composer, media, project, single_clip_scene};
use montage_core::{seconds, BufferPool, Frame, FrameRate, PipelineConfig, Profile, Pts};
use montage_media::{frame_tag, Input};
use std::sync::Arc;

fn input(profile: &Profile) -> Input {
    Input::new(profile, &PipelineConfig::default(), &BufferPool::default())
}

/// Frames up to the first held duplicate, which marks end of video.
fn drain_video(input: &Input, limit: usize) -> Vec<(Pts, u32)> {
    let mut out = Vec::new();
    for _ in 0..limit {
        let Some(f) = input.get_video_frame() else {
            break;
        };
        if f.is_duplicate {
            f.release();
            break;
        }
        out.push((f.pts, frame_tag(&f).unwrap_or(u32::MAX)));
        f.release();
    }
    out
}

// ── Frame-rate conversion ──────────────────────────────────────

#[test]
fn thirty_fps_source_plays_as_twenty_five_in_one_second() {
    let profile = project(FrameRate::FPS_25);
    let mut input = input(&profile);
    input.open_seek_play(Arc::new(media("thirty", 1.0, FrameRate::FPS_30)), 0.0, false);

    let frames = drain_video(&input, 100);
    assert_eq!(frames.len(), 25);
    for (i, (pts, _)) in frames.iter().enumerate() {
        assert!((pts - i as f64 * 40_000.0).abs() < 1e-6);
    }
    // Dropping keeps source order.
    assert!(frames.windows(2).all(|w| w[1].1 > w[0].1));
}

#[test]
fn composer_output_steps_by_one_frame() {
    let profile = project(FrameRate::FPS_25);
    let scene = single_clip_scene(media("thirty", 1.0, FrameRate::FPS_30), profile.clone());
    let mut composer = cpu_composer(scene);
    let d = profile.frame_duration();
    let mut last: Option<Pts> = None;
    while !composer.at_end() {
        let (video, audio) = composer.render().unwrap();
        if let Some(prev) = last {
            assert_eq!(video.pts - prev, d);
        }
        assert_eq!(audio.audio_samples(), 320);
        last = Some(video.pts);
    }
    assert_eq!(last, Some(24.0 * d));
}

// ── Decode errors ──────────────────────────────────────────────

#[test]
fn video_decode_error_keeps_audio_flowing() {
    let profile = project(FrameRate::FPS_25);
    let mut input = input(&profile);
    let source = media("flaky", 2.0, FrameRate::FPS_25).fail_video_at(10);
    input.open_seek_play(Arc::new(source), 0.0, false);

    let tags: Vec<u32> = drain_video(&input, 100).into_iter().map(|(_, t)| t).collect();
    assert_eq!(tags, (0..10).collect::<Vec<_>>());
    assert!(input.eof_video());

    // 2 s at 8 kHz in 320-sample frames.
    let mut chunks = 0;
    while let Some(f) = input.get_audio_frame(320) {
        assert_eq!(f.audio_samples(), 320);
        f.release();
        chunks += 1;
        assert!(chunks <= 50);
    }
    assert_eq!(chunks, 50);
    assert!(input.eof_audio());
}

#[test]
fn broken_video_holds_last_picture_in_composer() {
    let profile = project(FrameRate::FPS_25);
    let source = media("flaky", 2.0, FrameRate::FPS_25).fail_video_at(5);
    let mut composer = cpu_composer(single_clip_scene(source, profile));
    for _ in 0..20 {
        let (video, audio) = composer.render().unwrap();
        assert_eq!(video.width(), 8);
        assert_eq!(audio.audio_samples(), 320);
    }
}

// ── Backward playback ──────────────────────────────────────────

#[test]
fn backward_input_is_exact_reverse_of_forward() {
    let profile = project(FrameRate::FPS_25);
    let source: Arc<dyn montage_media::MediaSource> = Arc::new(media("rev", 2.0, FrameRate::FPS_25));

    let mut forward = input(&profile);
    forward.open_seek_play(Arc::clone(&source), seconds(0.4), false);
    let ahead: Vec<(Pts, u32)> = drain_video(&forward, 20);

    let mut backward = input(&profile);
    backward.open_seek_play(source, seconds(1.2), true);
    let mut behind = Vec::new();
    for _ in 0..20 {
        let f = backward.get_video_frame().unwrap();
        behind.push((f.pts, frame_tag(&f).unwrap()));
        f.release();
    }

    behind.reverse();
    assert_eq!(ahead, behind);
}

#[test]
fn backward_composer_shows_forward_pictures_in_reverse() {
    let profile = project(FrameRate::FPS_25);
    let d = profile.frame_duration();

    let mut forward = cpu_composer(single_clip_scene(media("a", 1.0, FrameRate::FPS_25), profile.clone()));
    let ahead: Vec<(Pts, Option<u32>)> = (0..20)
        .map(|_| {
            let video = forward.render().unwrap().0;
            (video.pts, frame_tag(&video))
        })
        .collect();

    let mut backward = cpu_composer(single_clip_scene(media("a", 1.0, FrameRate::FPS_25), profile));
    backward.seek(19.0 * d, true);
    let mut behind: Vec<(Pts, Option<u32>)> = (0..20)
        .map(|_| {
            let video = backward.render().unwrap().0;
            (video.pts, frame_tag(&video))
        })
        .collect();
    assert!(backward.at_end());

    behind.reverse();
    assert_eq!(ahead, behind);
    assert_eq!(ahead[7].1, Some(7));
}

#[test]
fn backward_composer_from_last_frame_reaches_the_start() {
    let profile = project(FrameRate::FPS_25);
    let d = profile.frame_duration();
    let mut composer = cpu_composer(single_clip_scene(media("a", 2.0, FrameRate::FPS_25), profile));
    composer.seek(49.0 * d, true);

    let mut tags = Vec::new();
    while !composer.at_end() {
        let (video, _) = composer.render().unwrap();
        tags.push(frame_tag(&video).unwrap());
        assert!(tags.len() <= 50);
    }
    assert_eq!(tags, (0..50).rev().collect::<Vec<u32>>());
}

// ── Buffer sharing ─────────────────────────────────────────────

#[test]
fn shared_picture_outlives_its_input_frame() {
    let profile = project(FrameRate::FPS_25);
    let buffers = BufferPool::default();
    let mut input = Input::new(&profile, &PipelineConfig::default(), &buffers);
    input.open_seek_play(Arc::new(media("s", 1.0, FrameRate::FPS_25)), 0.0, false);

    let decoded = input.get_video_frame().unwrap();
    let mut copy = Frame::transient(&buffers);
    copy.share_video(&decoded);
    assert!(copy.buffer().unwrap().ptr_eq(decoded.buffer().unwrap()));
    let bytes = decoded.data().to_vec();
    decoded.release();

    assert_eq!(copy.data(), &bytes[..]);
    assert_eq!(frame_tag(&copy), Some(0));
}
