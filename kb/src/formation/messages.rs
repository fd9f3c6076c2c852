//! Result and observability types for the formation coordinator

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use uuid::Uuid;

use super::GameVariant;
use crate::announcer::AnnouncementHandle;

/// Point-in-time view of one forming game
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormationSnapshot {
    pub formation_id: Uuid,
    pub channel: String,
    pub variant: GameVariant,
    pub participants: Vec<String>,
    pub quorum: usize,
    pub handle: Option<AnnouncementHandle>,
}

impl FormationSnapshot {
    /// Open slots left before the game starts
    pub fn remaining(&self) -> usize {
        self.quorum.saturating_sub(self.participants.len())
    }
}

/// Successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Participant added, game still forming
    Joined { participants: Vec<String>, remaining: usize },
    /// Participant was the last one needed; the game left the registry
    Completed { participants: Vec<String> },
}

/// Successful leave
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Participant removed, game still forming
    Left { participants: Vec<String>, remaining: usize },
    /// Last participant left; the game was cancelled
    Cancelled,
}

/// What happened during [`FormationCoordinator::shutdown`](super::FormationCoordinator::shutdown)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Games removed from the registry
    pub drained: usize,
    /// Announcements deleted successfully
    pub cleaned_up: usize,
    /// Cleanup calls that returned an error
    pub failed: usize,
    /// True if the deadline elapsed before all cleanup calls finished
    pub timed_out: bool,
}

/// Coordinator counters for observability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormationStats {
    #[serde(rename = "active-formations")]
    pub active_formations: usize,
    pub created: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub expired: u64,
    pub rejected: u64,
    #[serde(rename = "external-failures")]
    pub external_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub(crate) created: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) cancelled: AtomicU64,
    pub(crate) expired: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) external_failures: AtomicU64,
}

impl StatsCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, active_formations: usize) -> FormationStats {
        FormationStats {
            active_formations,
            created: self.created.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            external_failures: self.external_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_remaining() {
        let snapshot = FormationSnapshot {
            formation_id: Uuid::now_v7(),
            channel: "C1".to_string(),
            variant: GameVariant::TwoVsTwo,
            participants: vec!["U1".to_string(), "U2".to_string()],
            quorum: 4,
            handle: None,
        };
        assert_eq!(snapshot.remaining(), 2);
    }

    #[test]
    fn test_stats_serialization() {
        let counters = StatsCounters::default();
        StatsCounters::bump(&counters.created);
        StatsCounters::bump(&counters.created);
        StatsCounters::bump(&counters.expired);

        let stats = counters.snapshot(1);
        let yaml = serde_yaml::to_string(&stats).unwrap();
        assert!(yaml.contains("active-formations: 1"));
        assert!(yaml.contains("created: 2"));
        assert!(yaml.contains("expired: 1"));
    }
}
