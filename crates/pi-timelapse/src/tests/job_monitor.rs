use crate::JobMonitor;

use pi_timelapse_core::{JobState, JobStatus};

fn job(session: &str, state: JobState, progress: u8) -> JobStatus {
    JobStatus {
        session: session.to_string(),
        frame_rate: 24,
        state,
        progress,
        reason: None,
    }
}

/// WHAT: Only state changes are reported
/// WHY: Progress polling every few seconds would flood the log
#[test]
fn given_repeated_polls_when_observing_then_only_state_changes_reported() {
    // Given: A fresh monitor
    let mut monitor = JobMonitor::default();

    // When: A job is first seen
    let first = monitor.observe(vec![job("a", JobState::Encoding, 10)]);

    // Then: Reported
    assert_eq!(first.len(), 1);

    // When: Only progress moves
    let second = monitor.observe(vec![job("a", JobState::Encoding, 60)]);

    // Then: Nothing reported
    assert!(second.is_empty());

    // When: It finishes and another job appears
    let third = monitor.observe(vec![job("a", JobState::Done, 100), job("b", JobState::Queued, 0)]);

    // Then: Both reported
    let sessions: Vec<&str> = third.iter().map(|j| j.session.as_str()).collect();
    assert_eq!(sessions, vec!["a", "b"]);
}
