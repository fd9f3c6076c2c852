//! Formation error types

use thiserror::Error;

use crate::announcer::AnnouncerError;

/// Errors returned by the formation coordinator
///
/// Every variant is caller-facing and maps to exactly one private notice for
/// the participant who triggered it (see [`FormationError::notice`]).
#[derive(Debug, Error)]
pub enum FormationError {
    #[error("A game is already forming in channel {channel}")]
    AlreadyForming { channel: String },

    #[error("Failed to announce game in channel {channel}: {source}")]
    AnnouncementFailed {
        channel: String,
        #[source]
        source: AnnouncerError,
    },

    #[error("No game is forming in channel {channel}")]
    NoActiveFormation { channel: String },

    #[error("{participant} already joined the game in channel {channel}")]
    AlreadyJoined { channel: String, participant: String },

    #[error("The game in channel {channel} is already full")]
    FormationFull { channel: String },

    #[error("{participant} is not part of the game in channel {channel}")]
    NotInFormation { channel: String, participant: String },

    #[error("Only {initiator} can cancel the game in channel {channel}")]
    NotInitiator { channel: String, initiator: String },

    #[error("Game state in channel {channel} changed but the announcement could not be updated: {source}")]
    AnnouncementSyncFailed {
        channel: String,
        #[source]
        source: AnnouncerError,
    },

    #[error("Coordinator is shutting down")]
    ShuttingDown,
}

impl FormationError {
    /// Private notice shown to the participant whose request failed
    pub fn notice(&self) -> String {
        match self {
            FormationError::AlreadyForming { .. } => "A game is already being set up in this channel!".to_string(),
            FormationError::AnnouncementFailed { .. } => {
                "Something went wrong while announcing your game. Please try again.".to_string()
            }
            FormationError::NoActiveFormation { .. } => "There is no open game in this channel.".to_string(),
            FormationError::AlreadyJoined { .. } => "You are already in this game.".to_string(),
            FormationError::FormationFull { .. } => "This game is already full.".to_string(),
            FormationError::NotInFormation { .. } => "You are not part of the current game.".to_string(),
            FormationError::NotInitiator { initiator, .. } => {
                format!("Only <@{initiator}> can cancel this game.")
            }
            FormationError::AnnouncementSyncFailed { .. } => {
                "There was a technical problem updating the game announcement.".to_string()
            }
            FormationError::ShuttingDown => "The game service is shutting down, please try again later.".to_string(),
        }
    }

    /// True when the in-memory transition happened despite the error
    pub fn is_committed(&self) -> bool {
        matches!(self, FormationError::AnnouncementSyncFailed { .. })
    }
}
