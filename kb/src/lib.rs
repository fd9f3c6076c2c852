//! kickbot - quorum-based game formation for chat channels
//!
//! Players call for a game in a channel, others join until the quorum is
//! reached, and the game kicks off. Games that never fill up expire.
//!
//! # Modules
//!
//! - [`formation`] - Formation coordinator, records and expiry
//! - [`announcer`] - Announcer trait and the console implementation
//! - [`message`] - Announcement and notice texts
//! - [`session`] - Line-oriented command session driving the coordinator
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod announcer;
pub mod cli;
pub mod config;
pub mod formation;
pub mod message;
pub mod session;

// Re-export commonly used types
pub use announcer::{AnnouncementHandle, Announcer, AnnouncerError, ConsoleAnnouncer};
pub use config::Config;
pub use formation::{
    FormationConfig, FormationCoordinator, FormationError, FormationSnapshot, FormationStats, GameVariant, JoinOutcome,
    LeaveOutcome, ShutdownReport, Termination,
};
pub use session::{Session, SessionCommand};
