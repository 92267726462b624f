//! End-to-end runs of the composer thread.

use crate::support::{cpu_composer, media, project, single_clip_scene};
use montage_core::{FrameRate, Pts};
use montage_engine::{ChannelSink, Engine, SinkEvent};
use std::sync::Arc;
use std::time::Duration;

/// Everything the sink saw until end of stream.
fn collect(events: &crossbeam_channel::Receiver<SinkEvent>) -> (Vec<Pts>, Vec<usize>) {
    let mut video = Vec::new();
    let mut audio = Vec::new();
    loop {
        match events.recv_timeout(Duration::from_secs(20)).unwrap() {
            SinkEvent::Video(f) => video.push(f.pts),
            SinkEvent::Audio(f) => audio.push(f.audio_samples()),
            SinkEvent::EndOfStream => break,
        }
    }
    (video, audio)
}

#[test]
fn plays_thirty_fps_source_into_twenty_five_fps_project() {
    let profile = project(FrameRate::FPS_25);
    let scene = single_clip_scene(media("thirty", 1.0, FrameRate::FPS_30), profile.clone());
    let (sink, events) = ChannelSink::new(4);
    let engine = Engine::start(cpu_composer(scene), Arc::new(sink)).unwrap();
    engine.play(true).unwrap();

    let (video, audio) = collect(&events);
    let d = profile.frame_duration();
    assert_eq!(video, (0..25).map(|i| i as f64 * d).collect::<Vec<_>>());
    assert_eq!(audio, vec![320; 25]);
    assert!(!engine.is_playing());
}

#[test]
fn plays_backward_to_the_start() {
    let profile = project(FrameRate::FPS_25);
    let scene = single_clip_scene(media("rev", 0.4, FrameRate::FPS_25), profile.clone());
    let (sink, events) = ChannelSink::new(4);
    let engine = Engine::start(cpu_composer(scene), Arc::new(sink)).unwrap();
    let d = profile.frame_duration();
    engine.seek(9.0 * d, true).unwrap();
    engine.play(true).unwrap();

    let (video, audio) = collect(&events);
    assert_eq!(video, (0..10).rev().map(|i| i as f64 * d).collect::<Vec<_>>());
    assert_eq!(audio.len(), 10);
}

#[test]
fn audio_cadence_follows_ntsc_rate() {
    let profile = montage_core::Profile {
        sample_rate: 48_000,
        ..project(FrameRate::FPS_29_97)
    };
    let scene = single_clip_scene(media("ntsc", 0.2, FrameRate::FPS_29_97), profile);
    let (sink, events) = ChannelSink::new(4);
    let engine = Engine::start(cpu_composer(scene), Arc::new(sink)).unwrap();
    engine.play(true).unwrap();

    let (video, audio) = collect(&events);
    assert_eq!(video.len(), 6);
    // 48000 * 1001 / 30000 per frame; five frames carry 8008 samples.
    assert_eq!(audio[..5].iter().sum::<usize>(), 8008);
    assert!(audio.iter().all(|&n| n == 1601 || n == 1602));
}
