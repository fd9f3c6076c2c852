//! Announcer error types

use thiserror::Error;

/// Errors reported by an [`Announcer`](super::Announcer) implementation
#[derive(Debug, Error)]
pub enum AnnouncerError {
    #[error("Channel {channel} rejected the message: {message}")]
    Rejected { channel: String, message: String },

    #[error("Announcement {handle} not found in channel {channel}")]
    UnknownAnnouncement { channel: String, handle: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AnnouncerError {
    /// Check if the failure is likely transient
    pub fn is_transient(&self) -> bool {
        match self {
            AnnouncerError::Transport(_) => true,
            AnnouncerError::Io(_) => true,
            AnnouncerError::Rejected { .. } => false,
            AnnouncerError::UnknownAnnouncement { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_announcement_message() {
        let err = AnnouncerError::UnknownAnnouncement {
            channel: "C042".to_string(),
            handle: "1700000000.000100".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("C042"));
        assert!(msg.contains("1700000000.000100"));
    }

    #[test]
    fn test_is_transient() {
        assert!(AnnouncerError::Transport("connection reset".to_string()).is_transient());
        assert!(
            !AnnouncerError::Rejected {
                channel: "C042".to_string(),
                message: "not_in_channel".to_string()
            }
            .is_transient()
        );
    }
}
