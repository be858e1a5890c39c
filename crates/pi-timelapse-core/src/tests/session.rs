use crate::{
    BusyReason, CoreError, SessionStore,
    capture::{
        frame_file_name, parse_frame_index, sanitize_session_name, timestamped_session_name,
    },
};

use chrono::{Local, TimeZone};
use tempfile::TempDir;

#[allow(clippy::unwrap_used)]
fn store_with_frames(name: &str, indices: &[u64]) -> (TempDir, SessionStore) {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().join("sessions"));
    let session_dir = store.ensure(name).unwrap();
    for index in indices {
        std::fs::write(session_dir.join(frame_file_name(*index)), b"jpg").unwrap();
    }
    (dir, store)
}

/// WHAT: Frame names are six-digit zero-padded indices
/// WHY: The encoder reads the sequence with a %06d pattern
#[test]
fn given_frame_index_when_naming_then_zero_padded_and_parseable() {
    // Given / When: Frame names for a few indices
    let first = frame_file_name(1);
    let large = frame_file_name(1_234_567);

    // Then: Padded to six digits and parsed back; foreign files are ignored
    assert_eq!(first, "000001.jpg");
    assert_eq!(large, "1234567.jpg");
    assert_eq!(parse_frame_index("000042.jpg"), Some(42));
    assert_eq!(parse_frame_index("video.mp4"), None);
    assert_eq!(parse_frame_index("42.jpg"), None);
    assert_eq!(parse_frame_index("still-20240101-000000-abcd.jpg"), None);
}

/// WHAT: Session names keep only filesystem-safe characters
/// WHY: Names become directory names
#[test]
fn given_unsafe_name_when_sanitizing_then_only_safe_characters_remain() {
    // Given / When / Then
    assert_eq!(sanitize_session_name("my garden/../x!"), "mygardenx");
    assert_eq!(sanitize_session_name("tide_2024-05"), "tide_2024-05");
    assert_eq!(sanitize_session_name("../"), "");
}

/// WHAT: Default names derive from the timestamp
/// WHY: Unnamed sessions still need a unique, sortable name
#[test]
#[allow(clippy::unwrap_used)]
fn given_timestamp_when_naming_session_then_session_prefix_and_compact_time() {
    // Given: A fixed local time
    let at = Local.with_ymd_and_hms(2024, 5, 1, 6, 30, 0).single().unwrap();

    // When: Deriving a name
    let name = timestamped_session_name(at);

    // Then: session-YYYYMMDD-HHMMSS
    assert_eq!(name, "session-20240501-063000");
}

/// WHAT: Numbering resumes after the highest existing frame
/// WHY: Restarting a session must never overwrite accepted frames
#[test]
#[allow(clippy::unwrap_used)]
fn given_existing_frames_when_computing_next_index_then_continues_after_highest() {
    // Given: A session with frames 1..=3
    let (_dir, store) = store_with_frames("garden", &[1, 2, 3]);

    // When / Then: Next index is 4; a new session starts at 1
    assert_eq!(store.next_frame_index("garden").unwrap(), 4);
    assert_eq!(store.next_frame_index("fresh").unwrap(), 1);
}

/// WHAT: Catalogue reports counts, latest frame and video presence, newest first
/// WHY: The caller layer lists sessions without touching the filesystem itself
#[test]
#[allow(clippy::unwrap_used)]
fn given_two_sessions_when_listing_then_newest_first_with_details() {
    // Given: An older session with a video and a newer one without
    let (_dir, store) = store_with_frames("session-20240101-080000", &[1, 2]);
    std::fs::write(store.video_path("session-20240101-080000"), b"mp4").unwrap();
    let newer = store.ensure("session-20240102-080000").unwrap();
    std::fs::write(newer.join(frame_file_name(1)), b"jpg").unwrap();

    // When: Listing
    let sessions = store.list().unwrap();

    // Then: Newest first, with details
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].name, "session-20240102-080000");
    assert_eq!(sessions[0].frame_count, 1);
    assert!(!sessions[0].has_video);
    assert_eq!(sessions[1].frame_count, 2);
    assert_eq!(sessions[1].latest_frame.as_deref(), Some("000002.jpg"));
    assert!(sessions[1].has_video);
}

/// WHAT: Rename and delete refuse the active session
/// WHY: The frame loop is still writing into that directory
#[test]
#[allow(clippy::unwrap_used)]
fn given_active_session_when_renaming_or_deleting_then_busy() {
    // Given: "garden" is the active session
    let (_dir, store) = store_with_frames("garden", &[1]);

    // When: Renaming and deleting it
    let renamed = store.rename("garden", "yard", Some("garden"));
    let deleted = store.delete("garden", Some("garden"));

    // Then: Both refused with Busy(Capturing) and the directory is untouched
    assert!(matches!(
        renamed,
        Err(CoreError::Busy {
            reason: BusyReason::Capturing,
            ..
        })
    ));
    assert!(matches!(
        deleted,
        Err(CoreError::Busy {
            reason: BusyReason::Capturing,
            ..
        })
    ));
    assert!(store.session_dir("garden").is_dir());
}

/// WHAT: Inactive sessions can be renamed and deleted
/// WHY: Operators tidy up finished runs
#[test]
#[allow(clippy::unwrap_used)]
fn given_inactive_session_when_renaming_then_deleting_then_directory_follows() {
    // Given: An inactive session and an unrelated active one
    let (_dir, store) = store_with_frames("garden", &[1, 2]);

    // When: Renaming with an unsafe target, then deleting
    let renamed = store.rename("garden", "back yard!", Some("other")).unwrap();

    // Then: Sanitised name holds the frames; delete removes it
    assert_eq!(renamed, "backyard");
    assert_eq!(store.frame_indices("backyard").unwrap(), vec![1, 2]);
    assert!(!store.session_dir("garden").exists());

    store.delete("backyard", None).unwrap();
    assert!(matches!(
        store.frame_indices("backyard"),
        Err(CoreError::SessionNotFound { .. })
    ));
}

/// WHAT: Rename never overwrites another session
/// WHY: Frames of the target session would be lost
#[test]
#[allow(clippy::unwrap_used)]
fn given_existing_target_when_renaming_then_invalid_request() {
    // Given: Two sessions
    let (_dir, store) = store_with_frames("a", &[1]);
    store.ensure("b").unwrap();

    // When: Renaming a onto b
    let result = store.rename("a", "b", None);

    // Then: Refused
    assert!(matches!(result, Err(CoreError::InvalidRequest { .. })));
    assert!(store.session_dir("a").is_dir());
}
