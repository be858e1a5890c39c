use crate::{
    BusyReason, CameraLease, Consumer, CoreError, LiveViewStreamer, StillCapture,
    settings::LiveViewSettings,
    tests::fakes::{FAKE_JPEG, FakeStill, FakeVideo},
};

use std::{sync::Arc, time::Duration};

use tempfile::TempDir;

const TIMEOUT: Duration = Duration::from_secs(10);

fn jpg_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0)
}

/// WHAT: A still returns its bytes and gives the camera back
/// WHY: Callers need the image; later consumers need the device
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_idle_camera_when_capturing_still_then_bytes_returned_and_lease_released() {
    // Given: An idle lease
    let dir = TempDir::new().unwrap();
    let lease = CameraLease::new();
    let camera = Arc::new(FakeStill::new(Duration::from_millis(100)));
    let still = StillCapture::new(lease.clone(), camera.clone(), dir.path(), TIMEOUT);

    // When: Capturing
    let image = still.capture_one().await.unwrap();

    // Then: Bytes match the file and the lease is free
    assert_eq!(&image.bytes[..], FAKE_JPEG);
    assert_eq!(std::fs::read(&image.path).unwrap(), FAKE_JPEG);
    assert!(image.path.starts_with(dir.path()));
    assert_eq!(lease.snapshot().holder, None);
    assert_eq!(camera.calls(), 1);
}

/// WHAT: Two stills get distinct files
/// WHY: Back-to-back stills within one second must not overwrite each other
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_two_stills_when_captured_in_same_second_then_distinct_files() {
    // Given: An idle lease
    let dir = TempDir::new().unwrap();
    let still = StillCapture::new(
        CameraLease::new(),
        Arc::new(FakeStill::new(Duration::ZERO)),
        dir.path(),
        TIMEOUT,
    );

    // When: Capturing twice
    let first = still.capture_one().await.unwrap();
    let second = still.capture_one().await.unwrap();

    // Then: Two files
    assert_ne!(first.path, second.path);
    assert_eq!(jpg_count(dir.path()), 2);
}

/// WHAT: A still is refused while live view holds the camera
/// WHY: The device is exclusive and stills never wait
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_live_view_running_when_capturing_still_then_busy_camera_held() {
    // Given: A live stream holding the lease
    let dir = TempDir::new().unwrap();
    let lease = CameraLease::new();
    let streamer = LiveViewStreamer::new(
        lease.clone(),
        Arc::new(FakeVideo::new()),
        LiveViewSettings::default(),
    );
    let _viewer = streamer.open_stream().await.unwrap();
    let camera = Arc::new(FakeStill::new(Duration::ZERO));
    let still = StillCapture::new(lease.clone(), camera.clone(), dir.path(), TIMEOUT);

    // When: Capturing
    let err = still.capture_one().await.unwrap_err();

    // Then: Busy(CameraHeld(LiveView)) and the camera was not touched
    assert!(matches!(
        err,
        CoreError::Busy {
            reason: BusyReason::CameraHeld(Consumer::LiveView),
            ..
        }
    ));
    assert_eq!(camera.calls(), 0);

    streamer.kill().await;
}

/// WHAT: A still is refused while an encode is in flight
/// WHY: Idle means no session and no encode job
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_encode_in_flight_when_capturing_still_then_busy_encoding() {
    // Given: The encode slot taken
    let dir = TempDir::new().unwrap();
    let lease = CameraLease::new();
    let _slot = lease.try_begin_encode().unwrap();
    let still = StillCapture::new(
        lease.clone(),
        Arc::new(FakeStill::new(Duration::ZERO)),
        dir.path(),
        TIMEOUT,
    );

    // When: Capturing
    let err = still.capture_one().await.unwrap_err();

    // Then: Busy(Encoding)
    assert!(matches!(
        err,
        CoreError::Busy {
            reason: BusyReason::Encoding,
            ..
        }
    ));
}

/// WHAT: A failed still leaves no file and frees the camera
/// WHY: Partial JPEGs must never be served
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_camera_failure_when_capturing_still_then_error_and_no_file() {
    // Given: A camera that always fails
    let dir = TempDir::new().unwrap();
    let lease = CameraLease::new();
    let camera = Arc::new(FakeStill::new(Duration::ZERO));
    camera.set_fail_always(true);
    let still = StillCapture::new(lease.clone(), camera, dir.path(), TIMEOUT);

    // When: Capturing
    let err = still.capture_one().await.unwrap_err();

    // Then: Program failure, no file, lease free
    assert!(matches!(err, CoreError::ExternalProgramFailure { .. }));
    assert_eq!(jpg_count(dir.path()), 0);
    assert_eq!(lease.snapshot().holder, None);
}
