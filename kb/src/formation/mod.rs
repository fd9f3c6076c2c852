//! Game formation coordinator
//!
//! Guarantees at most one forming game per channel and serializes the
//! operations that race on it:
//! - **Create:** reserve the channel, then post the announcement
//! - **Join / Leave / Cancel:** mutate the participant list under the game's own lock
//! - **Expire:** a per-game timer ends games that never reach quorum
//!
//! Announcer calls always happen after the in-memory transition committed and
//! outside every lock.

mod config;
mod core;
mod error;
mod expiry;
mod messages;
mod record;
mod variant;

pub use config::FormationConfig;
pub use core::FormationCoordinator;
pub use error::FormationError;
pub use messages::{FormationSnapshot, FormationStats, JoinOutcome, LeaveOutcome, ShutdownReport};
pub use record::Termination;
pub use variant::GameVariant;
