//! Formation coordinator: registry, operations and the expiry worker

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::config::FormationConfig;
use super::error::FormationError;
use super::expiry::{ExpiryRequest, ExpiryTimer};
use super::messages::{FormationSnapshot, FormationStats, JoinOutcome, LeaveOutcome, ShutdownReport, StatsCounters};
use super::record::{FormationRecord, Phase, Termination};
use super::GameVariant;
use crate::announcer::{AnnouncementHandle, Announcer, AnnouncerError};
use crate::message;

struct Inner {
    config: FormationConfig,
    announcer: Arc<dyn Announcer>,
    /// Channel -> live record. Guards the map only, never held across an await
    /// on a record lock or an announcer call.
    registry: Mutex<HashMap<String, Arc<FormationRecord>>>,
    expiry_tx: mpsc::Sender<ExpiryRequest>,
    worker: Mutex<Option<JoinHandle<()>>>,
    shutting_down: AtomicBool,
    stats: StatsCounters,
}

/// Coordinates game formation across channels
///
/// At most one game forms per channel. Every operation resolves the record
/// through the registry lock, mutates it under the record's own lock, and
/// talks to the [`Announcer`] only after both locks are released. Lock order
/// is record then registry: the registry lock is taken while a record lock is
/// held (to remove a finished game), never the other way around.
///
/// The handle is cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct FormationCoordinator {
    inner: Arc<Inner>,
}

impl FormationCoordinator {
    /// Create a coordinator and start its expiry worker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: FormationConfig, announcer: Arc<dyn Announcer>) -> Self {
        debug!(?config, "FormationCoordinator::new: called");
        let (expiry_tx, expiry_rx) = mpsc::channel(config.expiry_channel_buffer.max(1));

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let worker = tokio::spawn(Self::run_expiry_worker(weak.clone(), expiry_rx));
            Inner {
                config,
                announcer,
                registry: Mutex::new(HashMap::new()),
                expiry_tx,
                worker: Mutex::new(Some(worker)),
                shutting_down: AtomicBool::new(false),
                stats: StatsCounters::default(),
            }
        });

        Self { inner }
    }

    pub fn config(&self) -> &FormationConfig {
        &self.inner.config
    }

    /// Start a game with the configured default timeout
    pub async fn create(
        &self,
        channel: &str,
        participant: &str,
        variant: GameVariant,
    ) -> Result<FormationSnapshot, FormationError> {
        let timeout = self.inner.config.timeout();
        self.create_with_timeout(channel, participant, variant, timeout).await
    }

    /// Start a game that expires after `timeout` unless it completes first
    pub async fn create_with_timeout(
        &self,
        channel: &str,
        participant: &str,
        variant: GameVariant,
        timeout: Duration,
    ) -> Result<FormationSnapshot, FormationError> {
        debug!(%channel, %participant, ?variant, ?timeout, "FormationCoordinator::create_with_timeout: called");
        if self.is_shutting_down() {
            return Err(self.reject(channel, participant, FormationError::ShuttingDown).await);
        }

        // Reserve the channel before announcing so a concurrent creator sees it
        let record = Arc::new(FormationRecord::new(channel, participant, variant));
        let reserved = {
            let mut registry = self.inner.registry.lock().await;
            // Re-checked under the registry lock; shutdown flips the flag while holding it
            if self.is_shutting_down() {
                None
            } else if registry.contains_key(channel) {
                Some(false)
            } else {
                registry.insert(channel.to_string(), record.clone());
                Some(true)
            }
        };
        let Some(reserved) = reserved else {
            debug!(%channel, %participant, "create: shutdown began before reservation");
            return Err(self.reject(channel, participant, FormationError::ShuttingDown).await);
        };
        if !reserved {
            debug!(%channel, %participant, "create: channel already reserved");
            return Err(self
                .reject(
                    channel,
                    participant,
                    FormationError::AlreadyForming {
                        channel: channel.to_string(),
                    },
                )
                .await);
        }

        let handle = match self.inner.announcer.announce(channel, participant, variant).await {
            Ok(handle) => handle,
            Err(source) => {
                warn!(%channel, error = %source, transient = source.is_transient(), "Failed to announce game, releasing channel");
                {
                    let mut state = record.state.lock().await;
                    if state.phase == Phase::Announcing {
                        state.close(Termination::Withdrawn);
                    }
                    self.unregister(&record).await;
                }
                StatsCounters::bump(&self.inner.stats.external_failures);
                let err = FormationError::AnnouncementFailed {
                    channel: channel.to_string(),
                    source,
                };
                self.notify(channel, participant, &err.notice()).await;
                return Err(err);
            }
        };

        let snapshot = {
            let mut state = record.state.lock().await;
            if state.phase == Phase::Announcing {
                state.handle = Some(handle.clone());
                state.phase = Phase::Forming;
                state.expiry = Some(ExpiryTimer::schedule(
                    self.inner.expiry_tx.clone(),
                    channel.to_string(),
                    record.id,
                    timeout,
                ));
                Some(record.snapshot(&state))
            } else {
                None
            }
        };

        let Some(snapshot) = snapshot else {
            // Drained by shutdown while the announcement was in flight
            warn!(%channel, %handle, "Game drained during announcement, deleting it");
            self.delete_quietly(channel, &handle).await;
            return Err(self.reject(channel, participant, FormationError::ShuttingDown).await);
        };

        StatsCounters::bump(&self.inner.stats.created);
        info!(%channel, %participant, formation_id = %record.id, quorum = record.quorum, "Game formation started");
        Ok(snapshot)
    }

    /// Add `participant` to the game forming in `channel`
    pub async fn join(&self, channel: &str, participant: &str) -> Result<JoinOutcome, FormationError> {
        debug!(%channel, %participant, "FormationCoordinator::join: called");
        if self.is_shutting_down() {
            return Err(self.reject(channel, participant, FormationError::ShuttingDown).await);
        }

        let Some(record) = self.lookup(channel).await else {
            return Err(self.no_active_formation(channel, participant).await);
        };

        let transition = {
            let mut state = record.state.lock().await;
            match state.join(channel, record.quorum, participant) {
                Ok(completed) => {
                    if completed {
                        self.unregister(&record).await;
                    }
                    Ok((completed, state.participants.clone(), state.handle.clone()))
                }
                Err(err) => Err(err),
            }
        };

        let (completed, participants, handle) = match transition {
            Ok(transition) => transition,
            Err(err) => return Err(self.reject(channel, participant, err).await),
        };

        if completed {
            StatsCounters::bump(&self.inner.stats.completed);
            info!(%channel, formation_id = %record.id, ?participants, "Game formation completed");

            let kickoff = message::kickoff(&participants);
            futures::future::join_all(participants.iter().map(|p| self.notify(channel, p, &kickoff))).await;

            if let Some(handle) = handle
                && let Err(source) = self
                    .inner
                    .announcer
                    .complete_announcement(channel, &handle, &participants)
                    .await
            {
                return Err(self.post_commit_failure(channel, participant, source).await);
            }
            return Ok(JoinOutcome::Completed { participants });
        }

        debug!(%channel, %participant, count = participants.len(), "join: participant added");
        if let Some(handle) = handle
            && let Err(source) = self
                .inner
                .announcer
                .update_announcement(channel, &handle, &participants, record.quorum)
                .await
        {
            return Err(self.post_commit_failure(channel, participant, source).await);
        }

        let remaining = record.quorum - participants.len();
        Ok(JoinOutcome::Joined {
            participants,
            remaining,
        })
    }

    /// Remove `participant` from the game forming in `channel`
    pub async fn leave(&self, channel: &str, participant: &str) -> Result<LeaveOutcome, FormationError> {
        debug!(%channel, %participant, "FormationCoordinator::leave: called");
        if self.is_shutting_down() {
            return Err(self.reject(channel, participant, FormationError::ShuttingDown).await);
        }

        let Some(record) = self.lookup(channel).await else {
            return Err(self.no_active_formation(channel, participant).await);
        };

        let transition = {
            let mut state = record.state.lock().await;
            match state.leave(channel, participant) {
                Ok(emptied) => {
                    if emptied {
                        self.unregister(&record).await;
                    }
                    Ok((emptied, state.participants.clone(), state.handle.clone()))
                }
                Err(err) => Err(err),
            }
        };

        let (emptied, participants, handle) = match transition {
            Ok(transition) => transition,
            Err(err) => return Err(self.reject(channel, participant, err).await),
        };

        if emptied {
            StatsCounters::bump(&self.inner.stats.cancelled);
            info!(%channel, formation_id = %record.id, "Game formation cancelled, last participant left");
            if let Some(handle) = handle
                && let Err(source) = self.inner.announcer.delete_announcement(channel, &handle).await
            {
                return Err(self.post_commit_failure(channel, participant, source).await);
            }
            return Ok(LeaveOutcome::Cancelled);
        }

        if let Some(handle) = handle
            && let Err(source) = self
                .inner
                .announcer
                .update_announcement(channel, &handle, &participants, record.quorum)
                .await
        {
            return Err(self.post_commit_failure(channel, participant, source).await);
        }

        let remaining = record.quorum - participants.len();
        Ok(LeaveOutcome::Left {
            participants,
            remaining,
        })
    }

    /// Cancel the game forming in `channel`; only its initiator may do this
    pub async fn cancel(&self, channel: &str, participant: &str) -> Result<(), FormationError> {
        debug!(%channel, %participant, "FormationCoordinator::cancel: called");
        if self.is_shutting_down() {
            return Err(self.reject(channel, participant, FormationError::ShuttingDown).await);
        }

        let Some(record) = self.lookup(channel).await else {
            return Err(self.no_active_formation(channel, participant).await);
        };

        let transition = {
            let mut state = record.state.lock().await;
            match state.cancel(channel, &record.initiator, participant) {
                Ok(()) => {
                    self.unregister(&record).await;
                    Ok(state.handle.clone())
                }
                Err(err) => Err(err),
            }
        };

        let handle = match transition {
            Ok(handle) => handle,
            Err(err) => return Err(self.reject(channel, participant, err).await),
        };

        StatsCounters::bump(&self.inner.stats.cancelled);
        info!(%channel, %participant, formation_id = %record.id, "Game formation cancelled by initiator");

        if let Some(handle) = handle
            && let Err(source) = self.inner.announcer.delete_announcement(channel, &handle).await
        {
            return Err(self.post_commit_failure(channel, participant, source).await);
        }
        Ok(())
    }

    /// Expire the formation a timer was scheduled for
    ///
    /// Silently does nothing if that formation already finished or the
    /// channel has since been reused by a newer game.
    async fn expire(&self, channel: &str, formation_id: Uuid) {
        debug!(%channel, %formation_id, "FormationCoordinator::expire: called");
        let Some(record) = self.lookup(channel).await else {
            debug!(%channel, "expire: no formation, nothing to do");
            return;
        };
        if record.id != formation_id {
            debug!(%channel, current = %record.id, "expire: channel reused by a newer formation");
            return;
        }

        let handle = {
            let mut state = record.state.lock().await;
            if state.phase != Phase::Forming {
                debug!(%channel, phase = ?state.phase, "expire: formation already closed");
                return;
            }
            let handle = state.close(Termination::Expired);
            self.unregister(&record).await;
            handle
        };

        StatsCounters::bump(&self.inner.stats.expired);
        info!(%channel, %formation_id, "Game formation expired");

        if let Some(handle) = handle
            && let Err(e) = self.inner.announcer.expire_announcement(channel, &handle).await
        {
            warn!(%channel, %handle, error = %e, "Failed to mark announcement as expired");
            StatsCounters::bump(&self.inner.stats.external_failures);
        }
    }

    /// Drain all forming games and stop the expiry worker
    ///
    /// Timers are cancelled first, then every posted announcement is deleted
    /// concurrently. Returns once all deletions finished or `deadline`
    /// elapsed, whichever comes first.
    pub async fn shutdown(&self, deadline: Duration) -> ShutdownReport {
        debug!(?deadline, "FormationCoordinator::shutdown: called");
        let deadline_at = Instant::now() + deadline;

        // Flag and drain share one registry critical section so no create can
        // reserve a channel in between
        let drained: Vec<Arc<FormationRecord>> = {
            let mut registry = self.inner.registry.lock().await;
            if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
                debug!("shutdown: already shutting down");
                return ShutdownReport::default();
            }
            registry.drain().map(|(_, record)| record).collect()
        };
        info!(drained = drained.len(), "Formation coordinator shutting down");

        let mut cleanups: Vec<(String, AnnouncementHandle)> = Vec::with_capacity(drained.len());
        for record in &drained {
            let mut state = record.state.lock().await;
            if let Phase::Closed(termination) = state.phase {
                debug!(channel = %record.channel, ?termination, "shutdown: record already closed");
                continue;
            }
            if let Some(handle) = state.close(Termination::Drained) {
                cleanups.push((record.channel.clone(), handle));
            }
        }

        self.stop_expiry_worker(deadline_at).await;

        let mut report = ShutdownReport {
            drained: drained.len(),
            ..Default::default()
        };

        let announcer = &self.inner.announcer;
        let mut pending: FuturesUnordered<_> = cleanups
            .iter()
            .map(|(channel, handle)| async move {
                announcer
                    .delete_announcement(channel, handle)
                    .await
                    .map_err(|e| (channel.as_str(), e))
            })
            .collect();

        loop {
            let next = tokio::time::timeout_at(deadline_at, pending.next()).await;
            match next {
                Ok(Some(Ok(()))) => report.cleaned_up += 1,
                Ok(Some(Err((channel, e)))) => {
                    warn!(%channel, error = %e, "Failed to delete announcement on shutdown");
                    report.failed += 1;
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(remaining = pending.len(), "Shutdown deadline elapsed before cleanup finished");
                    report.timed_out = true;
                    break;
                }
            }
        }

        info!(?report, "Formation coordinator stopped");
        report
    }

    /// Current state of the game forming in `channel`
    pub async fn snapshot(&self, channel: &str) -> Option<FormationSnapshot> {
        debug!(%channel, "FormationCoordinator::snapshot: called");
        let record = self.lookup(channel).await?;
        let state = record.state.lock().await;
        match state.phase {
            Phase::Closed(_) => None,
            _ => Some(record.snapshot(&state)),
        }
    }

    /// Snapshots of every game currently forming, ordered by channel
    pub async fn active_formations(&self) -> Vec<FormationSnapshot> {
        debug!("FormationCoordinator::active_formations: called");
        let records: Vec<Arc<FormationRecord>> = self.inner.registry.lock().await.values().cloned().collect();

        let mut snapshots = Vec::with_capacity(records.len());
        for record in records {
            let state = record.state.lock().await;
            if !matches!(state.phase, Phase::Closed(_)) {
                snapshots.push(record.snapshot(&state));
            }
        }
        snapshots.sort_by(|a, b| a.channel.cmp(&b.channel));
        snapshots
    }

    pub async fn stats(&self) -> FormationStats {
        let active = self.inner.registry.lock().await.len();
        self.inner.stats.snapshot(active)
    }

    fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }

    async fn lookup(&self, channel: &str) -> Option<Arc<FormationRecord>> {
        self.inner.registry.lock().await.get(channel).cloned()
    }

    /// Remove `record` from the registry if it is still the channel's entry
    async fn unregister(&self, record: &FormationRecord) -> bool {
        let mut registry = self.inner.registry.lock().await;
        match registry.get(&record.channel) {
            Some(current) if current.id == record.id => {
                registry.remove(&record.channel);
                debug!(channel = %record.channel, formation_id = %record.id, "unregister: removed");
                true
            }
            _ => false,
        }
    }

    async fn no_active_formation(&self, channel: &str, participant: &str) -> FormationError {
        self.reject(
            channel,
            participant,
            FormationError::NoActiveFormation {
                channel: channel.to_string(),
            },
        )
        .await
    }

    /// Count and notify a rejected request, handing the error back
    async fn reject(&self, channel: &str, participant: &str, err: FormationError) -> FormationError {
        debug!(%channel, %participant, error = %err, "reject: called");
        StatsCounters::bump(&self.inner.stats.rejected);
        self.notify(channel, participant, &err.notice()).await;
        err
    }

    /// Report an announcer failure after the in-memory transition committed
    async fn post_commit_failure(&self, channel: &str, participant: &str, source: AnnouncerError) -> FormationError {
        warn!(%channel, %participant, error = %source, transient = source.is_transient(), "Announcement out of sync with game state");
        StatsCounters::bump(&self.inner.stats.external_failures);
        let err = FormationError::AnnouncementSyncFailed {
            channel: channel.to_string(),
            source,
        };
        self.notify(channel, participant, &err.notice()).await;
        err
    }

    async fn notify(&self, channel: &str, participant: &str, text: &str) {
        if let Err(e) = self.inner.announcer.notify_participant(channel, participant, text).await {
            warn!(%channel, %participant, error = %e, "Failed to notify participant");
            StatsCounters::bump(&self.inner.stats.external_failures);
        }
    }

    async fn delete_quietly(&self, channel: &str, handle: &AnnouncementHandle) {
        if let Err(e) = self.inner.announcer.delete_announcement(channel, handle).await {
            warn!(%channel, %handle, error = %e, "Failed to delete announcement");
            StatsCounters::bump(&self.inner.stats.external_failures);
        }
    }

    async fn stop_expiry_worker(&self, deadline_at: Instant) {
        debug!("FormationCoordinator::stop_expiry_worker: called");
        let Some(mut worker) = self.inner.worker.lock().await.take() else {
            return;
        };

        let stopped = tokio::time::timeout_at(deadline_at, async {
            if self.inner.expiry_tx.send(ExpiryRequest::Shutdown).await.is_err() {
                debug!("stop_expiry_worker: worker already gone");
            }
            if let Err(e) = (&mut worker).await {
                warn!(error = %e, "Expiry worker ended abnormally");
            }
        })
        .await;

        if stopped.is_err() {
            warn!("Expiry worker did not stop before the deadline, aborting it");
            worker.abort();
        }
    }

    /// Drain expiry requests until shutdown
    async fn run_expiry_worker(inner: Weak<Inner>, mut rx: mpsc::Receiver<ExpiryRequest>) {
        info!("Expiry worker started");

        while let Some(request) = rx.recv().await {
            match request {
                ExpiryRequest::Expire { channel, formation_id } => {
                    let Some(inner) = inner.upgrade() else {
                        debug!("run_expiry_worker: coordinator dropped");
                        break;
                    };
                    FormationCoordinator { inner }.expire(&channel, formation_id).await;
                }
                ExpiryRequest::Shutdown => {
                    info!("Expiry worker shutting down");
                    break;
                }
            }
        }

        info!("Expiry worker stopped");
    }
}
