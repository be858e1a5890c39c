use crate::{
    BusyReason, CaptureStatus, CoreError, DiscardReason, IntentOutcome, StartParams, StopParams,
    capture::frame_file_name,
    tests::fakes::{Harness, MIB},
};

use std::time::Duration;

/// WHAT: Concurrent start intents produce exactly one session
/// WHY: At most one session may be active system-wide
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_concurrent_starts_when_drained_then_exactly_one_session_starts() {
    // Given: A launched core and five producers
    let harness = Harness::new();
    let timelapse = harness.launch();

    // When: All submit a start at once
    let mut handles = Vec::new();
    for i in 0..5 {
        let intents = timelapse.intents();
        handles.push(tokio::spawn(async move {
            intents
                .submit(crate::Intent::Start(StartParams::manual(
                    Some(format!("race-{i}")),
                    5,
                )))
                .await
        }));
    }
    let mut started = 0;
    let mut discarded = 0;
    for handle in handles {
        match handle.await.unwrap().unwrap() {
            IntentOutcome::Started(_) => started += 1,
            IntentOutcome::Discarded(DiscardReason::NotIdle(BusyReason::Capturing)) => {
                discarded += 1
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    // Then: One started, the rest were discarded
    assert_eq!(started, 1);
    assert_eq!(discarded, 4);
    assert!(timelapse.capture_status().is_capturing());

    timelapse.shutdown().await;
}

/// WHAT: Stop is a no-op when idle and ignores stops for other sessions
/// WHY: Stale timer or scheduler stops must not end an unrelated session
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_stop_intents_when_idle_or_mismatched_then_no_effect() {
    // Given: An idle core
    let harness = Harness::new();
    let timelapse = harness.launch();

    // When: Stopping while idle
    let idle_stop = timelapse.stop().await.unwrap();

    // Then: Already idle
    assert!(matches!(idle_stop, IntentOutcome::AlreadyIdle));

    // Given: Session "a" is capturing
    let started = timelapse
        .start(StartParams::manual(Some("a".into()), 5))
        .await
        .unwrap();
    assert!(matches!(started, IntentOutcome::Started(_)));

    // When: A stop addressed to "b" is drained
    let mismatched = timelapse
        .intents()
        .submit(crate::Intent::Stop(StopParams::for_session(
            "b",
            crate::IntentOrigin::Timer,
        )))
        .await
        .unwrap();

    // Then: Discarded and "a" keeps capturing
    assert!(matches!(
        mismatched,
        IntentOutcome::Discarded(DiscardReason::SessionMismatch)
    ));
    assert_eq!(timelapse.capture_status().active_session(), Some("a"));

    timelapse.shutdown().await;
}

/// WHAT: Start is refused below the free-space threshold
/// WHY: A full card would fail every frame
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_low_storage_when_starting_then_insufficient_storage_and_idle() {
    // Given: 10 MiB free, 200 MiB required
    let harness = Harness::new();
    harness.storage.set(10 * MIB);
    let timelapse = harness.launch();

    // When: Starting
    let outcome = timelapse
        .start(StartParams::manual(Some("full".into()), 5))
        .await
        .unwrap();

    // Then: Failed with InsufficientStorage; nothing holds the camera
    match outcome {
        IntentOutcome::Failed(CoreError::InsufficientStorage {
            available,
            required,
            ..
        }) => {
            assert_eq!(available, 10 * MIB);
            assert_eq!(required, 200 * MIB);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(timelapse.capture_status().is_idle());
    assert!(timelapse.is_idle());
    assert_eq!(harness.still.calls(), 0);

    timelapse.shutdown().await;
}

/// WHAT: A duration stops the session on its own
/// WHY: Fixed-length captures must not depend on an operator
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_duration_when_elapsed_then_session_stops() {
    // Given: A 10 second session at a 2 second interval
    let harness = Harness::new();
    let timelapse = harness.launch();
    timelapse
        .start(StartParams::manual(Some("short".into()), 2).with_duration(Duration::from_secs(10)))
        .await
        .unwrap();
    match timelapse.capture_status() {
        CaptureStatus::Capturing(active) => assert!(active.planned_end.is_some()),
        other => panic!("unexpected status {other:?}"),
    }

    // When: The duration passes
    tokio::time::sleep(Duration::from_secs(13)).await;

    // Then: Idle, frames kept, camera free
    assert!(timelapse.capture_status().is_idle());
    assert!(timelapse.is_idle());
    let sessions = timelapse.sessions().unwrap();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].frame_count >= 5);

    timelapse.shutdown().await;
}

/// WHAT: Restarting a session continues its numbering
/// WHY: Existing frames must never be overwritten
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_session_with_frames_when_restarted_then_numbering_continues() {
    // Given: "garden" already holds frames 1..=3
    let harness = Harness::new();
    let dir = harness.dir.path().join("sessions").join("garden");
    std::fs::create_dir_all(&dir).unwrap();
    for i in 1..=3 {
        std::fs::write(dir.join(frame_file_name(i)), b"old").unwrap();
    }
    let timelapse = harness.launch();

    // When: Capturing into it for one frame
    timelapse
        .start(StartParams::manual(Some("garden".into()), 60))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;
    timelapse.stop().await.unwrap();

    // Then: The new frame is 4 and the old ones are untouched
    assert_eq!(timelapse.sessions().unwrap()[0].frame_count, 4);
    assert_eq!(std::fs::read(dir.join(frame_file_name(1))).unwrap(), b"old");
    assert!(dir.join(frame_file_name(4)).exists());
    assert!(!dir.join(frame_file_name(5)).exists());

    timelapse.shutdown().await;
}

/// WHAT: The active-capture record exists only while capturing
/// WHY: A leftover record after restart marks an interrupted session
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_capture_when_started_and_stopped_then_record_written_and_removed() {
    // Given: A launched core
    let harness = Harness::new();
    let record = harness.dir.path().join("state").join("capture.toml");
    let timelapse = harness.launch();

    // When: Starting
    timelapse
        .start(StartParams::manual(Some("rec".into()), 5))
        .await
        .unwrap();

    // Then: The record names the session
    let contents = std::fs::read_to_string(&record).unwrap();
    assert!(contents.contains("session = \"rec\""));

    // When: Stopping
    timelapse.stop().await.unwrap();

    // Then: The record is gone
    assert!(!record.exists());

    timelapse.shutdown().await;
}

/// WHAT: A record left by a previous process is cleared on launch
/// WHY: Interrupted sessions are reported once, not resumed blindly
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_leftover_record_when_launching_then_record_cleared_and_idle() {
    // Given: A record from a crashed run
    let harness = Harness::new();
    let state = harness.dir.path().join("state");
    std::fs::create_dir_all(&state).unwrap();
    std::fs::write(
        state.join("capture.toml"),
        "session = \"crashed\"\ninterval_secs = 5\nstarted_at = \"2024-01-01T00:00:00Z\"\n",
    )
    .unwrap();

    // When: Launching and letting the workers start
    let timelapse = harness.launch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Then: Cleared, nothing capturing
    assert!(!state.join("capture.toml").exists());
    assert!(timelapse.capture_status().is_idle());

    timelapse.shutdown().await;
}

/// WHAT: Shutdown stops a running session
/// WHY: The camera and the capture record must be released on exit
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_running_session_when_shutting_down_then_session_stopped() {
    // Given: A capturing core
    let harness = Harness::new();
    let timelapse = harness.launch();
    timelapse
        .start(StartParams::manual(Some("bye".into()), 5))
        .await
        .unwrap();
    let mut status = timelapse.watch_capture();

    // When: Shutting down
    timelapse.shutdown().await;

    // Then: The last published status is idle and the record is gone
    assert!(status.borrow_and_update().is_idle());
    assert!(!harness.dir.path().join("state").join("capture.toml").exists());
}

/// WHAT: A start issued during a still waits for the still to finish
/// WHY: Two programs must never drive the camera at the same time
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used)]
async fn given_still_in_flight_when_capture_starts_then_first_frame_waits_for_still() {
    // Given: A still capture that takes 1.5s is under way
    let harness = Harness::new();
    let timelapse = harness.launch();

    // When: A session start arrives 100ms into the still
    let (still, started) = tokio::join!(timelapse.capture_one(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        timelapse
            .start(StartParams::manual(Some("demo".into()), 5))
            .await
    });
    tokio::time::sleep(Duration::from_secs(3)).await;

    // Then: Both succeed, capture wins the camera, and the camera never ran twice at once
    assert!(still.is_ok());
    assert!(matches!(started.unwrap(), IntentOutcome::Started(_)));
    assert!(harness.still.calls() >= 2);
    assert_eq!(harness.still.max_in_flight(), 1);
    assert_eq!(timelapse.sessions().unwrap()[0].frame_count, 1);

    timelapse.shutdown().await;
}

/// WHAT: A start without an interval uses the configured default
/// WHY: Callers may leave the interval to the rig's configuration
#[tokio::test(start_paused = true)]
#[allow(clippy::unwrap_used, clippy::panic)]
async fn given_zero_interval_when_starting_then_configured_default_used() {
    // Given: A core configured with a 7 second default interval
    let harness = Harness::new();
    let mut settings = harness.settings();
    settings.capture.default_interval_secs = 7;
    let timelapse = harness.launch_with(settings);

    // When: Starting with interval 0
    let outcome = timelapse
        .start(StartParams::manual(Some("default".into()), 0))
        .await
        .unwrap();

    // Then: The session runs at the configured interval
    match outcome {
        IntentOutcome::Started(active) => assert_eq!(active.interval_secs, 7),
        other => panic!("unexpected outcome {other:?}"),
    }

    timelapse.shutdown().await;
}

/// WHAT: Launch refuses a capture timeout that outlasts the stop join
/// WHY: Stop would otherwise abort a loop still waiting on the camera
#[test]
fn given_capture_timeout_above_join_timeout_when_launching_then_invalid_request() {
    // Given: Settings whose capture timeout is longer than the stop join window
    let harness = Harness::new();
    let mut settings = harness.settings();
    settings.capture.capture_timeout_secs = 20;
    settings.capture.stop_join_timeout_secs = 8;

    // When: Launching
    let result = crate::Timelapse::launch(settings, harness.backends());

    // Then: Rejected before anything starts
    assert!(matches!(result, Err(CoreError::InvalidRequest { .. })));
}
