//! Announcer collaborator
//!
//! The coordinator never talks to a chat platform directly. Every externally
//! visible effect (the public game announcement and the private notices to
//! single players) goes through the [`Announcer`] trait.

pub mod client;
mod console;
mod error;

pub use client::{AnnouncementHandle, Announcer};
pub use console::ConsoleAnnouncer;
pub use error::AnnouncerError;
