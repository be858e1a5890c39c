use crate::{
    BusyReason, CameraLease, Consumer, CoreError, LiveViewStreamer, StartParams,
    settings::LiveViewSettings,
    tests::fakes::{FAKE_JPEG, FakeVideo, Harness},
};

use std::{sync::Arc, time::Duration};

use tokio::io::AsyncWriteExt;

fn streamer(video: &Arc<FakeVideo>) -> (CameraLease, LiveViewStreamer) {
    let lease = CameraLease::new();
    let streamer = LiveViewStreamer::new(lease.clone(), video.clone(), LiveViewSettings::default());
    (lease, streamer)
}

/// WHAT: A viewer receives whole frames even when bytes arrive in pieces
/// WHY: Pipe reads do not line up with JPEG boundaries
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_chunked_frame_when_streaming_then_viewer_receives_whole_jpeg() {
    // Given: A running stream with one viewer
    let video = Arc::new(FakeVideo::new());
    let (lease, streamer) = streamer(&video);
    let mut viewer = streamer.open_stream().await.unwrap();
    assert_eq!(lease.snapshot().holder, Some(Consumer::LiveView));
    let mut writer = video.take_writer().unwrap();

    // When: A frame is written in three pieces with noise in front
    writer.write_all(b"noise").await.unwrap();
    writer.write_all(&FAKE_JPEG[..3]).await.unwrap();
    writer.write_all(&FAKE_JPEG[3..8]).await.unwrap();
    writer.write_all(&FAKE_JPEG[8..]).await.unwrap();

    // Then: Exactly the JPEG comes out
    let frame = viewer.next_frame().await.unwrap();
    assert_eq!(&frame[..], FAKE_JPEG);

    streamer.kill().await;
    assert_eq!(lease.snapshot().holder, None);
}

/// WHAT: A second viewer joins the running process
/// WHY: The camera supports one process; viewers must share it
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_running_stream_when_second_viewer_opens_then_no_new_process() {
    // Given: One viewer attached
    let video = Arc::new(FakeVideo::new());
    let (_lease, streamer) = streamer(&video);
    let mut first = streamer.open_stream().await.unwrap();

    // When: A second viewer opens
    let mut second = streamer.open_stream().await.unwrap();
    let mut writer = video.take_writer().unwrap();
    writer.write_all(FAKE_JPEG).await.unwrap();

    // Then: One spawn, both viewers see the frame
    assert_eq!(video.spawns(), vec![false]);
    assert_eq!(streamer.viewer_count(), 2);
    assert_eq!(&first.next_frame().await.unwrap()[..], FAKE_JPEG);
    assert_eq!(&second.next_frame().await.unwrap()[..], FAKE_JPEG);

    streamer.kill().await;
}

/// WHAT: Opening a stream is refused while capturing or encoding
/// WHY: Live view only runs when the system is idle
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_busy_system_when_opening_stream_then_busy_and_no_spawn() {
    // Given: A capture in progress
    let video = Arc::new(FakeVideo::new());
    let (lease, streamer) = streamer(&video);
    let capture = lease.acquire(Consumer::Capture).unwrap();

    // When: Opening
    let err = streamer.open_stream().await.unwrap_err();

    // Then: Busy(Capturing)
    assert!(matches!(
        err,
        CoreError::Busy {
            reason: BusyReason::Capturing,
            ..
        }
    ));
    drop(capture);

    // Given: An encode in flight instead
    let slot = lease.try_begin_encode().unwrap();

    // When: Opening
    let err = streamer.open_stream().await.unwrap_err();

    // Then: Busy(Encoding), and nothing was ever spawned
    assert!(matches!(
        err,
        CoreError::Busy {
            reason: BusyReason::Encoding,
            ..
        }
    ));
    assert!(video.spawns().is_empty());
    drop(slot);
}

/// WHAT: Starting a capture ends the live view for every viewer
/// WHY: The frame loop needs the camera device to itself
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_live_view_when_capture_starts_then_stream_ends() {
    // Given: A viewer on the core's stream
    let harness = Harness::new();
    let timelapse = harness.launch();
    let mut viewer = timelapse.open_stream().await.unwrap();

    // When: A capture starts
    timelapse
        .start(StartParams::manual(Some("takeover".into()), 5))
        .await
        .unwrap();

    // Then: The viewer sees the end of the stream
    assert!(viewer.next_frame().await.is_none());
    assert!(timelapse.capture_status().is_capturing());

    timelapse.shutdown().await;
}

/// WHAT: A process that dies at once is retried once at fallback resolution
/// WHY: Some sensors refuse the preferred preview mode
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_early_exit_when_streaming_then_single_fallback_respawn() {
    // Given: A source whose first process exits immediately
    let video = Arc::new(FakeVideo::exiting_first());
    let (_lease, streamer) = streamer(&video);
    let mut viewer = streamer.open_stream().await.unwrap();

    // When: The supervisor waits out the rate limit and respawns
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let mut writer = video.take_writer().unwrap();
    writer.write_all(FAKE_JPEG).await.unwrap();

    // Then: Normal then fallback, and frames flow from the fallback
    assert_eq!(video.spawns(), vec![false, true]);
    assert_eq!(&viewer.next_frame().await.unwrap()[..], FAKE_JPEG);

    // When: The fallback process dies as well
    drop(writer);

    // Then: No third attempt; the stream ends
    assert!(viewer.next_frame().await.is_none());
    assert_eq!(video.spawns().len(), 2);
}

/// WHAT: A respawn within the minimum interval is refused
/// WHY: Rapid open/close cycles must not hammer the camera stack
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_recent_spawn_when_reopening_then_respawning_until_interval_passes() {
    // Given: A stream opened and killed
    let video = Arc::new(FakeVideo::new());
    let (_lease, streamer) = streamer(&video);
    let viewer = streamer.open_stream().await.unwrap();
    drop(viewer);
    streamer.kill().await;

    // When: Reopening straight away
    let err = streamer.open_stream().await.unwrap_err();

    // Then: Busy(Respawning)
    assert!(matches!(
        err,
        CoreError::Busy {
            reason: BusyReason::Respawning,
            ..
        }
    ));

    // When: After the interval
    tokio::time::sleep(Duration::from_millis(1100)).await;

    // Then: Allowed again
    let _viewer = streamer.open_stream().await.unwrap();
    assert_eq!(video.spawns().len(), 2);
    streamer.kill().await;
}

/// WHAT: The process stops after the idle timeout with no viewers
/// WHY: An abandoned preview must not keep the camera
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_no_viewers_when_idle_timeout_passes_then_process_stops() {
    // Given: A stream whose only viewer leaves
    let video = Arc::new(FakeVideo::new());
    let (lease, streamer) = streamer(&video);
    let viewer = streamer.open_stream().await.unwrap();
    drop(viewer);

    // When: Less than the timeout passes
    tokio::time::sleep(Duration::from_secs(20)).await;

    // Then: Still running
    assert!(streamer.is_running().await);

    // When: The timeout passes
    tokio::time::sleep(Duration::from_secs(12)).await;

    // Then: Stopped and the camera is free
    assert!(!streamer.is_running().await);
    assert_eq!(lease.snapshot().holder, None);
}
