//! Frame normalization, preview and resize handling through a session

mod mocks;

use std::sync::Arc;

use mocks::{Call, CallLog, LoopbackDriver, ManualLoopback, ManualWindow, RecordingDevice, WindowDriver, WHITE};
use wincap_core::capture::SyntheticWindow;
use wincap_core::gpu::{SoftwareDevice, SoftwareTexture};
use wincap_core::types::{Color, Pixel, WaveFormat};
use wincap_core::{CaptureConfig, CaptureSession, SessionState, Size};

type Session = CaptureSession<RecordingDevice, ManualWindow, ManualLoopback>;

fn started_session(size: Size) -> (Session, WindowDriver, LoopbackDriver, CallLog) {
    started_session_with(size, |device| device)
}

fn started_session_with(
    size: Size,
    device: impl FnOnce(RecordingDevice) -> RecordingDevice,
) -> (Session, WindowDriver, LoopbackDriver, CallLog) {
    let log = CallLog::new();
    let (window, video) = ManualWindow::new(size, log.clone());
    let (loopback, audio) = ManualLoopback::new(WaveFormat::default());
    let session = CaptureSession::new(
        Arc::new(device(RecordingDevice::new(log.clone()))),
        window,
        loopback,
        CaptureConfig::default(),
    )
    .unwrap();
    session.start().unwrap();
    (session, video, audio, log)
}

fn next_surface(session: &Session) -> SoftwareTexture {
    session.wait_for_video().expect("video sample").into_surface()
}

#[test]
fn test_pixels_outside_content_are_blank() {
    let (session, video, _audio, _log) = started_session(Size::new(800, 600));
    assert!(video.deliver(Size::new(400, 300), WHITE));

    let surface = next_surface(&session);
    let blank = Color::BLACK.to_pixel();
    assert_eq!(blank, Pixel::bgra(0, 0, 0, 255));
    assert_eq!(surface.size(), Size::new(800, 600));
    for y in 0..600 {
        for x in 0..800 {
            let expected = if x < 400 && y < 300 { WHITE } else { blank };
            assert_eq!(surface.pixel(x, y), expected, "pixel ({}, {})", x, y);
        }
    }
}

#[test]
fn test_grow_resizes_preview_before_present_before_pool() {
    let (session, video, _audio, log) = started_session(Size::new(800, 600));
    let new_size = Size::new(1024, 768);

    assert!(video.deliver(new_size, WHITE));

    let resize = log.position(Call::ResizeBuffers(new_size)).expect("preview resized");
    let present = log.position(Call::Present).expect("preview presented");
    let recreate = log.position(Call::Recreate(new_size)).expect("pool recreated");
    assert!(resize < present, "{:?}", log.calls());
    assert!(present < recreate, "{:?}", log.calls());

    // The in-flight frame still came from the old buffers
    assert_eq!(next_surface(&session).size(), Size::new(800, 600));
    assert_eq!(session.region_size(), new_size);
    assert_eq!(session.preview_size(), new_size);
    assert_eq!(video.surface_size(), new_size);

    log.clear();
    assert!(video.deliver(new_size, WHITE));
    assert_eq!(log.calls(), vec![Call::Present]);
    let surface = next_surface(&session);
    assert_eq!(surface.size(), new_size);
    assert!(surface.pixels().iter().all(|p| *p == WHITE));
    assert_eq!(session.stats().resizes, 1);
}

#[test]
fn test_shrink_keeps_stale_pixels_out() {
    let (session, video, _audio, _log) = started_session(Size::new(64, 64));
    let red = Pixel::bgra(0, 0, 255, 255);

    // Buffers are still 64x64 but only 32x16 of them is live content
    assert!(video.deliver(Size::new(32, 16), red));
    let first = next_surface(&session);
    assert_eq!(first.size(), Size::new(64, 64));
    assert_eq!(first.pixel(31, 15), red);
    assert_eq!(first.pixel(32, 0), Color::BLACK.to_pixel());
    assert_eq!(first.pixel(0, 16), Color::BLACK.to_pixel());

    assert!(video.deliver(Size::new(32, 16), red));
    let second = next_surface(&session);
    assert_eq!(second.size(), Size::new(32, 16));
    assert!(second.pixels().iter().all(|p| *p == red));
}

#[test]
fn test_failed_preview_resize_is_retried_on_next_frame() {
    let (session, video, _audio, log) =
        started_session_with(Size::new(80, 60), |device| device.failing_resizes(1));
    let grown = Size::new(100, 75);

    // The resize fails: the old size stays in force and nothing is presented
    assert!(video.deliver(grown, WHITE));
    assert_eq!(session.stats().frames_failed, 1);
    assert_eq!(session.region_size(), Size::new(80, 60));
    assert_eq!(session.preview_size(), Size::new(80, 60));
    assert_eq!(video.surface_size(), Size::new(80, 60));
    assert_eq!(next_surface(&session).size(), Size::new(80, 60));

    assert!(video.deliver(grown, WHITE));
    assert_eq!(session.region_size(), grown);
    assert_eq!(session.preview_size(), grown);
    assert_eq!(video.surface_size(), grown);
    assert_eq!(
        log.calls(),
        vec![Call::ResizeBuffers(grown), Call::Present, Call::Recreate(grown)]
    );
    assert_eq!(next_surface(&session).size(), Size::new(80, 60));

    for _ in 0..3 {
        assert!(video.deliver(grown, WHITE));
        let surface = next_surface(&session);
        assert_eq!(surface.size(), grown);
        assert_eq!(surface.pixel(90, 70), WHITE);
    }
    let stats = session.stats();
    assert_eq!(stats.frames_failed, 1);
    assert_eq!(stats.resizes, 1);
}

#[test]
fn test_failed_pool_recreate_is_retried_on_next_frame() {
    let (session, video, _audio, log) = started_session(Size::new(80, 60));
    let grown = Size::new(100, 75);
    video.fail_recreates(1);

    assert!(video.deliver(grown, WHITE));
    assert_eq!(session.stats().frames_failed, 1);
    assert_eq!(session.region_size(), grown);
    assert_eq!(session.preview_size(), grown);
    assert_eq!(video.surface_size(), Size::new(80, 60));

    // Same content size, but the pool is still owed its new buffers
    log.clear();
    assert!(video.deliver(grown, WHITE));
    assert_eq!(log.calls(), vec![Call::Present, Call::Recreate(grown)]);
    assert_eq!(video.surface_size(), grown);

    assert_eq!(next_surface(&session).size(), Size::new(80, 60));
    let padded = next_surface(&session);
    assert_eq!(padded.size(), grown);
    assert_eq!(padded.pixel(79, 59), WHITE);
    assert_eq!(padded.pixel(90, 70), Color::BLACK.to_pixel());

    log.clear();
    assert!(video.deliver(grown, WHITE));
    assert_eq!(log.calls(), vec![Call::Present]);
    assert!(next_surface(&session).pixels().iter().all(|p| *p == WHITE));
    assert_eq!(session.stats().frames_failed, 1);
}

#[test]
fn test_notification_without_frame_is_skipped() {
    let (session, video, _audio, log) = started_session(Size::new(16, 16));
    assert!(video.notify_without_frame());

    let stats = session.stats();
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(stats.video_enqueued, 0);
    assert_eq!(session.state(), SessionState::Capturing);
    assert!(log.calls().is_empty());
}

#[test]
fn test_stop_halts_producers() {
    let (session, video, audio, _log) = started_session(Size::new(16, 16));
    session.stop();

    assert!(!video.is_running());
    assert!(!audio.is_running());
    assert_eq!(video.stops(), 1);
    assert!(!video.deliver(Size::new(16, 16), WHITE));
    assert!(session.wait_for_video().is_none());
}

#[test]
fn test_synthetic_window_resize_reaches_session() {
    use std::time::Duration;
    use wincap_core::capture::SyntheticLoopback;

    let window = SyntheticWindow::new(Size::new(48, 32), 200)
        .with_resize(Duration::from_millis(30), Size::new(64, 40));
    let session = CaptureSession::new(
        Arc::new(SoftwareDevice::new()),
        window,
        SyntheticLoopback::new(48_000, 2),
        CaptureConfig::default(),
    )
    .unwrap();
    session.start().unwrap();

    let mut sizes = Vec::new();
    while sizes.last() != Some(&Size::new(64, 40)) && sizes.len() < 500 {
        let sample = session.wait_for_video().expect("video sample");
        sizes.push(sample.surface().size());
    }
    session.stop();

    assert_eq!(sizes.first(), Some(&Size::new(48, 32)));
    assert_eq!(sizes.last(), Some(&Size::new(64, 40)));
    assert_eq!(session.preview_size(), Size::new(64, 40));
}
