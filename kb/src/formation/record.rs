//! Formation record: the mutable state of one forming game

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::error::FormationError;
use super::expiry::ExpiryTimer;
use super::messages::FormationSnapshot;
use super::GameVariant;
use crate::announcer::AnnouncementHandle;

/// How a formation left the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Quorum reached
    Completed,
    /// Last participant left or the initiator cancelled
    Cancelled,
    /// Timer fired before quorum
    Expired,
    /// Initial announcement failed
    Withdrawn,
    /// Removed by coordinator shutdown
    Drained,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Reserved in the registry, announcement not posted yet
    Announcing,
    Forming,
    Closed(Termination),
}

/// Fields guarded by the record lock
#[derive(Debug)]
pub(crate) struct RecordState {
    pub(crate) phase: Phase,
    pub(crate) participants: Vec<String>,
    pub(crate) handle: Option<AnnouncementHandle>,
    pub(crate) expiry: Option<ExpiryTimer>,
}

impl RecordState {
    fn new(initiator: &str) -> Self {
        Self {
            phase: Phase::Announcing,
            participants: vec![initiator.to_string()],
            handle: None,
            expiry: None,
        }
    }

    fn ensure_forming(&self, channel: &str) -> Result<(), FormationError> {
        match self.phase {
            Phase::Forming => Ok(()),
            // A completed record keeps its full list, reached through a stale lookup
            Phase::Closed(Termination::Completed) => Err(FormationError::FormationFull {
                channel: channel.to_string(),
            }),
            _ => Err(FormationError::NoActiveFormation {
                channel: channel.to_string(),
            }),
        }
    }

    /// Append `participant`; returns true if this join completed the game
    pub(crate) fn join(&mut self, channel: &str, quorum: usize, participant: &str) -> Result<bool, FormationError> {
        debug!(%channel, %participant, count = self.participants.len(), quorum, "RecordState::join: called");
        self.ensure_forming(channel)?;

        if self.participants.iter().any(|p| p == participant) {
            return Err(FormationError::AlreadyJoined {
                channel: channel.to_string(),
                participant: participant.to_string(),
            });
        }

        if self.participants.len() >= quorum {
            return Err(FormationError::FormationFull {
                channel: channel.to_string(),
            });
        }

        self.participants.push(participant.to_string());

        let completed = self.participants.len() == quorum;
        if completed {
            debug!(%channel, "RecordState::join: quorum reached");
            self.close(Termination::Completed);
        }
        Ok(completed)
    }

    /// Remove `participant`; returns true if the game is now empty
    pub(crate) fn leave(&mut self, channel: &str, participant: &str) -> Result<bool, FormationError> {
        debug!(%channel, %participant, count = self.participants.len(), "RecordState::leave: called");
        self.ensure_forming(channel)?;

        let Some(idx) = self.participants.iter().position(|p| p == participant) else {
            return Err(FormationError::NotInFormation {
                channel: channel.to_string(),
                participant: participant.to_string(),
            });
        };
        self.participants.remove(idx);

        let emptied = self.participants.is_empty();
        if emptied {
            debug!(%channel, "RecordState::leave: last participant left");
            self.close(Termination::Cancelled);
        }
        Ok(emptied)
    }

    /// Cancel on behalf of `participant`, who must be the initiator and still present
    pub(crate) fn cancel(&mut self, channel: &str, initiator: &str, participant: &str) -> Result<(), FormationError> {
        debug!(%channel, %initiator, %participant, "RecordState::cancel: called");
        self.ensure_forming(channel)?;

        let present = self.participants.iter().any(|p| p == participant);
        if participant == initiator && present {
            self.close(Termination::Cancelled);
            return Ok(());
        }
        if present {
            Err(FormationError::NotInitiator {
                channel: channel.to_string(),
                initiator: initiator.to_string(),
            })
        } else {
            Err(FormationError::NotInFormation {
                channel: channel.to_string(),
                participant: participant.to_string(),
            })
        }
    }

    /// Enter a terminal phase, cancelling the expiry timer
    ///
    /// Returns the announcement handle, if one was ever posted.
    pub(crate) fn close(&mut self, termination: Termination) -> Option<AnnouncementHandle> {
        debug!(?termination, "RecordState::close: called");
        self.phase = Phase::Closed(termination);
        if let Some(timer) = self.expiry.take() {
            timer.cancel();
        }
        self.handle.clone()
    }
}

/// One pending game in one channel
///
/// Identity fields are immutable; everything that changes lives behind the
/// record's own lock, independent of the registry lock.
#[derive(Debug)]
pub(crate) struct FormationRecord {
    pub(crate) id: Uuid,
    pub(crate) channel: String,
    pub(crate) variant: GameVariant,
    pub(crate) quorum: usize,
    pub(crate) initiator: String,
    pub(crate) state: Mutex<RecordState>,
}

impl FormationRecord {
    pub(crate) fn new(channel: &str, initiator: &str, variant: GameVariant) -> Self {
        let id = Uuid::now_v7();
        debug!(%channel, %initiator, ?variant, %id, "FormationRecord::new: called");
        Self {
            id,
            channel: channel.to_string(),
            variant,
            quorum: variant.quorum(),
            initiator: initiator.to_string(),
            state: Mutex::new(RecordState::new(initiator)),
        }
    }

    pub(crate) fn snapshot(&self, state: &RecordState) -> FormationSnapshot {
        FormationSnapshot {
            formation_id: self.id,
            channel: self.channel.clone(),
            variant: self.variant,
            participants: state.participants.clone(),
            quorum: self.quorum,
            handle: state.handle.clone(),
        }
    }
}
