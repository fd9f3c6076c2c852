//! Announcer trait definition

use std::fmt;

use async_trait::async_trait;

use super::AnnouncerError;
use crate::formation::GameVariant;

/// Opaque reference to a posted announcement (a message timestamp on most platforms)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AnnouncementHandle(String);

impl AnnouncementHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnnouncementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outbound side of the chat platform
///
/// Implementations must be safe to call concurrently: the coordinator issues
/// these calls outside of its locks, so two calls for the same channel may be
/// in flight at once and may land in either order.
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Publish the initial call for players and return its handle
    async fn announce(
        &self,
        channel: &str,
        initiator: &str,
        variant: GameVariant,
    ) -> Result<AnnouncementHandle, AnnouncerError>;

    /// Refresh the visible player list and the number of open slots
    async fn update_announcement(
        &self,
        channel: &str,
        handle: &AnnouncementHandle,
        participants: &[String],
        quorum: usize,
    ) -> Result<(), AnnouncerError>;

    /// Mark the announcement as a full game that is starting
    async fn complete_announcement(
        &self,
        channel: &str,
        handle: &AnnouncementHandle,
        participants: &[String],
    ) -> Result<(), AnnouncerError>;

    /// Remove the announcement (game cancelled)
    async fn delete_announcement(&self, channel: &str, handle: &AnnouncementHandle) -> Result<(), AnnouncerError>;

    /// Mark the announcement as expired
    async fn expire_announcement(&self, channel: &str, handle: &AnnouncementHandle) -> Result<(), AnnouncerError>;

    /// Send a private notice visible only to one participant
    async fn notify_participant(&self, channel: &str, participant: &str, text: &str) -> Result<(), AnnouncerError>;
}
