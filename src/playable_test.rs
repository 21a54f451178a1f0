use super::*;
use std::time::Duration;

use tokio::time::advance;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

fn frames(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("/media/p/poster/{i:04}.png")).collect()
}

// =============================================================================
// StreamUnit
// =============================================================================

#[tokio::test(start_paused = true)]
async fn stream_not_ready_until_loaded() {
    let mut unit = StreamUnit::new("/media/p/phone/clip.mp4");
    assert_eq!(unit.play(), Err(PlayError::NotReady(UnitKind::Stream)));
    assert!(!unit.is_playing());

    unit.mark_loaded(Some(10.0));
    assert!(unit.play().is_ok());
    assert!(unit.is_playing());
}

#[tokio::test(start_paused = true)]
async fn stream_position_advances_while_playing() {
    let mut unit = StreamUnit::loaded("a.mp4", Some(30.0));
    unit.play().expect("play");
    advance(Duration::from_millis(1_500)).await;
    assert!(approx(unit.position(), 1.5));

    unit.pause();
    advance(Duration::from_secs(2)).await;
    assert!(approx(unit.position(), 1.5));
    assert!(!unit.is_playing());
}

#[tokio::test(start_paused = true)]
async fn stream_loops_at_duration() {
    let mut unit = StreamUnit::loaded("a.mp4", Some(10.0));
    unit.seek(8.0);
    unit.play().expect("play");
    advance(Duration::from_secs(3)).await;
    assert!(approx(unit.position(), 1.0));
}

#[tokio::test(start_paused = true)]
async fn stream_seek_wraps_modulo_duration() {
    let mut unit = StreamUnit::loaded("a.mp4", Some(10.0));
    unit.seek(25.0);
    assert!(approx(unit.position(), 5.0));
}

#[tokio::test(start_paused = true)]
async fn stream_seek_without_duration_is_unwrapped() {
    let mut unit = StreamUnit::loaded("live.mp4", None);
    unit.seek(25.0);
    assert!(approx(unit.position(), 25.0));
    assert_eq!(unit.duration(), None);
    assert_eq!(unit.current_frame(), None);
}

#[tokio::test(start_paused = true)]
async fn stream_seek_before_load_is_ignored() {
    let mut unit = StreamUnit::new("a.mp4");
    unit.seek(4.0);
    assert!(approx(unit.position(), 0.0));
}

#[tokio::test(start_paused = true)]
async fn stream_stop_rewinds_and_pauses() {
    let mut unit = StreamUnit::loaded("a.mp4", Some(10.0));
    unit.play().expect("play");
    advance(Duration::from_secs(4)).await;
    unit.stop();
    assert!(!unit.is_playing());
    assert!(approx(unit.position(), 0.0));
}

#[tokio::test(start_paused = true)]
async fn stream_playback_rate_scales_progress() {
    let mut unit = StreamUnit::loaded("a.mp4", Some(60.0));
    unit.set_playback_rate(1.5);
    unit.play().expect("play");
    advance(Duration::from_secs(2)).await;
    assert!(approx(unit.position(), 3.0));
}

#[test]
fn mark_loaded_discards_bogus_duration() {
    let mut unit = StreamUnit::new("a.mp4");
    unit.mark_loaded(Some(f64::NAN));
    assert_eq!(unit.duration(), None);
    unit.mark_loaded(Some(0.0));
    assert_eq!(unit.duration(), None);
}

// =============================================================================
// FrameSequenceUnit
// =============================================================================

#[test]
fn empty_sequence_is_not_ready() {
    let mut unit = FrameSequenceUnit::default();
    assert_eq!(unit.play(), Err(PlayError::NotReady(UnitKind::FrameSequence)));
    assert_eq!(unit.duration(), None);
    assert_eq!(unit.current_frame(), None);
}

#[test]
fn sequence_duration_is_frames_over_fps() {
    let unit = FrameSequenceUnit::new(frames(240));
    assert!(approx(unit.duration().unwrap_or_default(), 10.0));
    assert_eq!(unit.kind(), UnitKind::FrameSequence);
}

#[test]
fn sequence_seek_quantizes_to_frame() {
    let mut unit = FrameSequenceUnit::new(frames(240));
    unit.seek(1.03);
    // floor(1.03 * 24) = 24
    assert_eq!(unit.current_index(), 24);
    assert!(approx(unit.position(), 1.0));
    assert_eq!(unit.current_frame(), Some("/media/p/poster/0024.png"));
}

#[test]
fn sequence_seek_wraps() {
    let mut unit = FrameSequenceUnit::new(frames(240));
    unit.seek(25.0);
    assert!(approx(unit.position(), 5.0));
}

#[test]
fn sequence_seek_round_trips_every_frame() {
    let mut unit = FrameSequenceUnit::new(frames(48));
    for k in 0..48_u32 {
        unit.seek(f64::from(k) / FRAME_SEQUENCE_FPS);
        assert_eq!(unit.current_index(), k as usize);
    }
}

#[tokio::test(start_paused = true)]
async fn sequence_advances_at_24_fps_and_loops() {
    let mut unit = FrameSequenceUnit::new(frames(48));
    unit.play().expect("play");
    advance(Duration::from_millis(500)).await;
    assert_eq!(unit.current_index(), 12);

    advance(Duration::from_millis(2_000)).await;
    // 2.5 s = frame 60, wrapped into 48 frames.
    assert_eq!(unit.current_index(), 12);
}

#[tokio::test(start_paused = true)]
async fn sequence_stop_rewinds_to_first_frame() {
    let mut unit = FrameSequenceUnit::new(frames(48));
    unit.play().expect("play");
    advance(Duration::from_secs(1)).await;
    unit.stop();
    assert_eq!(unit.current_index(), 0);
    assert!(!unit.is_playing());
}

// =============================================================================
// Playhead
// =============================================================================

#[tokio::test(start_paused = true)]
async fn playhead_set_while_running_restarts_from_new_anchor() {
    let mut head = Playhead::default();
    head.resume();
    advance(Duration::from_secs(3)).await;
    head.set(10.0);
    advance(Duration::from_secs(1)).await;
    assert!(approx(head.raw(), 11.0));
}

#[tokio::test(start_paused = true)]
async fn playhead_resume_twice_keeps_first_instant() {
    let mut head = Playhead::default();
    head.resume();
    advance(Duration::from_secs(1)).await;
    head.resume();
    advance(Duration::from_secs(1)).await;
    assert!(approx(head.raw(), 2.0));
}
