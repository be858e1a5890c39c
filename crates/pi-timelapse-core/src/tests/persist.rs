use crate::{
    CoreError,
    persist::RecordFile,
    schedule::{Schedule, ScheduleBook, ScheduleStore},
};

use chrono::{Duration as TimeDelta, Utc};
use tempfile::TempDir;
use uuid::Uuid;

fn schedule(offset_mins: i64) -> Schedule {
    let start = Utc::now() + TimeDelta::minutes(offset_mins);
    Schedule {
        id: Uuid::new_v4(),
        start,
        end: start + TimeDelta::minutes(30),
        interval_secs: 10,
        frame_rate: 24,
        auto_encode: true,
        session_name: Some("dawn".to_string()),
        created_at: Utc::now(),
    }
}

/// WHAT: A missing record loads as nothing
/// WHY: First boot has no persisted state
#[test]
#[allow(clippy::unwrap_used)]
fn given_no_file_when_loading_then_none() {
    // Given: An empty directory
    let dir = TempDir::new().unwrap();
    let file: RecordFile<ScheduleBook> = RecordFile::new(dir.path().join("schedules.toml"));

    // When / Then
    assert!(file.load().unwrap().is_none());
}

/// WHAT: A save interrupted before its rename leaves the old record readable
/// WHY: A crash mid-write must never corrupt the schedule store
#[test]
#[allow(clippy::unwrap_used)]
fn given_interrupted_save_when_loading_then_previous_record_returned() {
    // Given: One schedule persisted
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state").join("schedules.toml");
    let file: RecordFile<ScheduleBook> = RecordFile::new(&path);
    let first = schedule(10);
    file.save(&ScheduleBook {
        schedules: vec![first.clone()],
    })
    .unwrap();

    // When: A later save died after writing half of its temp file
    std::fs::write(file.temp_path(), "[[schedule]]\nid = \"").unwrap();
    let loaded = file.load().unwrap().unwrap();

    // Then: The previous record is intact
    assert_eq!(loaded.schedules, vec![first.clone()]);

    // And: The next complete save replaces it and consumes the temp file
    let second = schedule(60);
    file.save(&ScheduleBook {
        schedules: vec![first.clone(), second.clone()],
    })
    .unwrap();
    assert_eq!(file.load().unwrap().unwrap().schedules, vec![first, second]);
    assert!(!file.temp_path().exists());
}

/// WHAT: A corrupt record is reported, and the schedule store treats it as empty
/// WHY: Unreadable persistence must never crash startup
#[test]
#[allow(clippy::unwrap_used)]
fn given_corrupt_file_when_loading_then_error_and_store_is_empty() {
    // Given: Garbage where the store lives
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("schedules.toml");
    std::fs::write(&path, "this is = = not toml").unwrap();

    // When: Loading through both layers
    let raw = RecordFile::<ScheduleBook>::new(&path).load();
    let schedules = ScheduleStore::new(&path).load();

    // Then: Typed error from the file, empty list from the store
    assert!(matches!(
        raw,
        Err(CoreError::CorruptOrMissingPersistence { .. })
    ));
    assert!(schedules.is_empty());
}

/// WHAT: Removing a record is idempotent
/// WHY: Stop clears the capture record even when none was written
#[test]
#[allow(clippy::unwrap_used)]
fn given_no_record_when_removing_then_ok() {
    // Given: A record path with nothing on disk
    let dir = TempDir::new().unwrap();
    let file: RecordFile<ScheduleBook> = RecordFile::new(dir.path().join("capture.toml"));

    // When / Then: Removing twice succeeds
    assert!(file.remove().is_ok());
    file.save(&ScheduleBook::default()).unwrap();
    assert!(file.remove().is_ok());
    assert!(!file.path().exists());
}
