//! Announcer that prints to the terminal
//!
//! Used by the interactive session: every announcement and notice is written
//! to stdout instead of a chat platform.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use colored::Colorize;
use tracing::{debug, info};

use super::{AnnouncementHandle, Announcer, AnnouncerError};
use crate::formation::GameVariant;
use crate::message;

/// Console-backed [`Announcer`]
pub struct ConsoleAnnouncer {
    /// Announcements that are still visible, keyed by (channel, handle)
    live: Mutex<HashSet<(String, String)>>,
    seq: AtomicU64,
}

impl Default for ConsoleAnnouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleAnnouncer {
    pub fn new() -> Self {
        debug!("ConsoleAnnouncer::new: called");
        Self {
            live: Mutex::new(HashSet::new()),
            seq: AtomicU64::new(1),
        }
    }

    fn next_handle(&self) -> AnnouncementHandle {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        AnnouncementHandle::new(format!("{secs}.{seq:06}"))
    }

    fn key(channel: &str, handle: &AnnouncementHandle) -> (String, String) {
        (channel.to_string(), handle.as_str().to_string())
    }

    fn ensure_live(&self, channel: &str, handle: &AnnouncementHandle) -> Result<(), AnnouncerError> {
        let live = self.live.lock().map_err(|_| AnnouncerError::Transport("console state poisoned".into()))?;
        if live.contains(&Self::key(channel, handle)) {
            Ok(())
        } else {
            Err(AnnouncerError::UnknownAnnouncement {
                channel: channel.to_string(),
                handle: handle.to_string(),
            })
        }
    }

    fn retire(&self, channel: &str, handle: &AnnouncementHandle) -> Result<(), AnnouncerError> {
        let mut live = self.live.lock().map_err(|_| AnnouncerError::Transport("console state poisoned".into()))?;
        if live.remove(&Self::key(channel, handle)) {
            Ok(())
        } else {
            Err(AnnouncerError::UnknownAnnouncement {
                channel: channel.to_string(),
                handle: handle.to_string(),
            })
        }
    }

    fn print(channel: &str, handle: &AnnouncementHandle, text: &str) {
        println!("{} {} {}", format!("[#{channel}]").cyan().bold(), handle.as_str().dimmed(), text);
    }
}

#[async_trait]
impl Announcer for ConsoleAnnouncer {
    async fn announce(
        &self,
        channel: &str,
        initiator: &str,
        variant: GameVariant,
    ) -> Result<AnnouncementHandle, AnnouncerError> {
        debug!(%channel, %initiator, ?variant, "ConsoleAnnouncer::announce: called");
        let handle = self.next_handle();
        self.live
            .lock()
            .map_err(|_| AnnouncerError::Transport("console state poisoned".into()))?
            .insert(Self::key(channel, &handle));
        Self::print(channel, &handle, &message::announcement(initiator, variant));
        info!(%channel, %handle, "Announcement posted");
        Ok(handle)
    }

    async fn update_announcement(
        &self,
        channel: &str,
        handle: &AnnouncementHandle,
        participants: &[String],
        quorum: usize,
    ) -> Result<(), AnnouncerError> {
        debug!(%channel, %handle, count = participants.len(), quorum, "ConsoleAnnouncer::update_announcement: called");
        self.ensure_live(channel, handle)?;
        Self::print(channel, handle, &message::progress(participants, quorum));
        Ok(())
    }

    async fn complete_announcement(
        &self,
        channel: &str,
        handle: &AnnouncementHandle,
        participants: &[String],
    ) -> Result<(), AnnouncerError> {
        debug!(%channel, %handle, "ConsoleAnnouncer::complete_announcement: called");
        self.retire(channel, handle)?;
        Self::print(channel, handle, &message::ready(participants).green().to_string());
        Ok(())
    }

    async fn delete_announcement(&self, channel: &str, handle: &AnnouncementHandle) -> Result<(), AnnouncerError> {
        debug!(%channel, %handle, "ConsoleAnnouncer::delete_announcement: called");
        self.retire(channel, handle)?;
        Self::print(channel, handle, &"(announcement deleted)".dimmed().to_string());
        Ok(())
    }

    async fn expire_announcement(&self, channel: &str, handle: &AnnouncementHandle) -> Result<(), AnnouncerError> {
        debug!(%channel, %handle, "ConsoleAnnouncer::expire_announcement: called");
        self.retire(channel, handle)?;
        Self::print(channel, handle, &message::expired().yellow().to_string());
        Ok(())
    }

    async fn notify_participant(&self, channel: &str, participant: &str, text: &str) -> Result<(), AnnouncerError> {
        debug!(%channel, %participant, "ConsoleAnnouncer::notify_participant: called");
        println!(
            "{} {} {}",
            format!("[#{channel}]").cyan().bold(),
            format!("(only visible to {participant})").magenta(),
            text
        );
        Ok(())
    }
}
