//! Integration tests for the formation coordinator
//!
//! These tests race many tasks against one coordinator and check the
//! per-channel invariants from the outside.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use kickbot::{
    AnnouncementHandle, Announcer, AnnouncerError, FormationConfig, FormationCoordinator, FormationError, GameVariant,
    JoinOutcome,
};

// =============================================================================
// Recording announcer
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    Announce(String),
    Update(String, usize),
    Complete(String, usize),
    Delete(String),
    Expire(String),
    Notify(String, String),
}

#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<Call>>,
    seq: Mutex<u64>,
}

impl Recorder {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    async fn push(&self, call: Call) {
        // Give other tasks a chance to interleave with the external call
        tokio::task::yield_now().await;
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Announcer for Recorder {
    async fn announce(
        &self,
        channel: &str,
        _initiator: &str,
        _variant: GameVariant,
    ) -> Result<AnnouncementHandle, AnnouncerError> {
        self.push(Call::Announce(channel.to_string())).await;
        let mut seq = self.seq.lock().unwrap();
        *seq += 1;
        Ok(AnnouncementHandle::new(format!("h{}", *seq)))
    }

    async fn update_announcement(
        &self,
        channel: &str,
        _handle: &AnnouncementHandle,
        participants: &[String],
        _quorum: usize,
    ) -> Result<(), AnnouncerError> {
        self.push(Call::Update(channel.to_string(), participants.len())).await;
        Ok(())
    }

    async fn complete_announcement(
        &self,
        channel: &str,
        _handle: &AnnouncementHandle,
        participants: &[String],
    ) -> Result<(), AnnouncerError> {
        self.push(Call::Complete(channel.to_string(), participants.len())).await;
        Ok(())
    }

    async fn delete_announcement(&self, channel: &str, _handle: &AnnouncementHandle) -> Result<(), AnnouncerError> {
        self.push(Call::Delete(channel.to_string())).await;
        Ok(())
    }

    async fn expire_announcement(&self, channel: &str, _handle: &AnnouncementHandle) -> Result<(), AnnouncerError> {
        self.push(Call::Expire(channel.to_string())).await;
        Ok(())
    }

    async fn notify_participant(&self, channel: &str, participant: &str, _text: &str) -> Result<(), AnnouncerError> {
        self.push(Call::Notify(channel.to_string(), participant.to_string())).await;
        Ok(())
    }
}

fn setup() -> (Arc<Recorder>, FormationCoordinator) {
    let recorder = Arc::new(Recorder::default());
    let coordinator = FormationCoordinator::new(FormationConfig::default(), recorder.clone());
    (recorder, coordinator)
}

// =============================================================================
// Create races
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_create_storm_yields_single_formation() {
    let (recorder, coordinator) = setup();

    let tasks: Vec<_> = (0..50)
        .map(|i| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.create("C1", &format!("P{i}"), GameVariant::TwoVsTwo).await })
        })
        .collect();

    let mut created = 0;
    let mut already_forming = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => created += 1,
            Err(FormationError::AlreadyForming { .. }) => already_forming += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(already_forming, 49);
    assert_eq!(recorder.count(|c| matches!(c, Call::Announce(_))), 1);
    assert_eq!(coordinator.active_formations().await.len(), 1);
}

// =============================================================================
// Join races
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_joins_fill_quorum() {
    let (recorder, coordinator) = setup();
    coordinator.create("C1", "P0", GameVariant::TwoVsTwo).await.unwrap();

    let tasks: Vec<_> = ["P1", "P2", "P3"]
        .into_iter()
        .map(|p| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.join("C1", p).await })
        })
        .collect();

    let mut completions = 0;
    for task in tasks {
        if let JoinOutcome::Completed { participants } = task.await.unwrap().unwrap() {
            assert_eq!(participants.len(), 4);
            completions += 1;
        }
    }

    assert_eq!(completions, 1);
    assert_eq!(recorder.count(|c| matches!(c, Call::Announce(_))), 1);
    assert_eq!(recorder.count(|c| matches!(c, Call::Update(..))), 2);
    assert_eq!(recorder.count(|c| matches!(c, Call::Complete(_, 4))), 1);
    assert_eq!(recorder.count(|c| matches!(c, Call::Notify(..))), 4);
    assert!(coordinator.snapshot("C1").await.is_none());

    // Channel is immediately reusable
    coordinator.create("C1", "P9", GameVariant::OneVsOne).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_oversubscribed_joins_never_exceed_quorum() {
    let (recorder, coordinator) = setup();
    coordinator.create("C1", "P0", GameVariant::TwoVsTwo).await.unwrap();

    let tasks: Vec<_> = (1..=12)
        .map(|i| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.join("C1", &format!("P{i}")).await })
        })
        .collect();

    let mut accepted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(FormationError::FormationFull { .. } | FormationError::NoActiveFormation { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(accepted, 3);
    assert_eq!(recorder.count(|c| matches!(c, Call::Complete(..))), 1);
    assert!(
        recorder
            .calls()
            .iter()
            .all(|c| !matches!(c, Call::Update(_, n) | Call::Complete(_, n) if *n > 4))
    );
}

#[tokio::test]
async fn test_repeat_join_is_rejected() {
    let (_recorder, coordinator) = setup();
    coordinator.create("C1", "P0", GameVariant::TwoVsTwo).await.unwrap();

    coordinator.join("C1", "P1").await.unwrap();
    let err = coordinator.join("C1", "P1").await.unwrap_err();

    assert!(matches!(err, FormationError::AlreadyJoined { .. }));
    let participants = coordinator.snapshot("C1").await.unwrap().participants;
    let unique: HashSet<_> = participants.iter().collect();
    assert_eq!(unique.len(), participants.len());
}

// =============================================================================
// Leave and empty channels
// =============================================================================

#[tokio::test]
async fn test_sole_leave_frees_channel() {
    let (recorder, coordinator) = setup();
    coordinator.create("C1", "P0", GameVariant::TwoVsTwo).await.unwrap();

    coordinator.leave("C1", "P0").await.unwrap();

    assert_eq!(recorder.count(|c| matches!(c, Call::Delete(_))), 1);
    assert!(coordinator.snapshot("C1").await.is_none());
    coordinator.create("C1", "P0", GameVariant::TwoVsTwo).await.unwrap();
}

#[tokio::test]
async fn test_operations_on_empty_channel() {
    let (_recorder, coordinator) = setup();

    assert!(matches!(
        coordinator.join("C1", "P1").await,
        Err(FormationError::NoActiveFormation { .. })
    ));
    assert!(matches!(
        coordinator.leave("C1", "P1").await,
        Err(FormationError::NoActiveFormation { .. })
    ));
    assert!(coordinator.active_formations().await.is_empty());
    assert_eq!(coordinator.stats().await.rejected, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_leave_churn_across_channels() {
    let (_recorder, coordinator) = setup();
    for ch in 0..5 {
        coordinator
            .create(&format!("C{ch}"), "host", GameVariant::TwoVsTwo)
            .await
            .unwrap();
    }

    let tasks: Vec<_> = (0..40)
        .map(|i| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let channel = format!("C{}", i % 5);
                let player = format!("P{}", i % 7);
                let _ = coordinator.join(&channel, &player).await;
                let _ = coordinator.leave(&channel, &player).await;
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    for snapshot in coordinator.active_formations().await {
        assert!(!snapshot.participants.is_empty());
        assert!(snapshot.participants.len() < snapshot.quorum);
        let unique: HashSet<_> = snapshot.participants.iter().collect();
        assert_eq!(unique.len(), snapshot.participants.len());
    }
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_abandoned_game_expires_exactly_once() {
    let (recorder, coordinator) = setup();
    coordinator
        .create_with_timeout("C1", "P0", GameVariant::TwoVsTwo, Duration::from_secs(30))
        .await
        .unwrap();
    coordinator.join("C1", "P1").await.unwrap();

    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(recorder.count(|c| matches!(c, Call::Expire(_))), 1);
    assert!(coordinator.snapshot("C1").await.is_none());
    assert!(matches!(
        coordinator.join("C1", "P2").await,
        Err(FormationError::NoActiveFormation { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_game_never_expires() {
    let (recorder, coordinator) = setup();
    coordinator
        .create_with_timeout("C1", "P0", GameVariant::TwoVsTwo, Duration::from_secs(30))
        .await
        .unwrap();
    coordinator.cancel("C1", "P0").await.unwrap();

    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(recorder.count(|c| matches!(c, Call::Expire(_))), 0);
}

// =============================================================================
// Shutdown
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_cleans_up_every_channel() {
    let (recorder, coordinator) = setup();
    for ch in 0..10 {
        coordinator
            .create(&format!("C{ch}"), "host", GameVariant::OneVsOne)
            .await
            .unwrap();
    }

    let report = coordinator.shutdown(Duration::from_secs(5)).await;

    assert_eq!(report.drained, 10);
    assert_eq!(report.cleaned_up, 10);
    assert!(!report.timed_out);
    assert_eq!(recorder.count(|c| matches!(c, Call::Delete(_))), 10);
    assert!(matches!(
        coordinator.join("C0", "P1").await,
        Err(FormationError::ShuttingDown)
    ));
}
