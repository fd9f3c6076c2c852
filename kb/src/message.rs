//! Plain-text rendering of announcements and private notices

use crate::formation::GameVariant;

/// Render a chat mention for a participant id
pub fn mention(participant: &str) -> String {
    format!("<@{participant}>")
}

fn mentions(participants: &[String]) -> Vec<String> {
    participants.iter().map(|p| mention(p)).collect()
}

/// Initial call for players posted when a game is created
pub fn announcement(initiator: &str, variant: GameVariant) -> String {
    match variant {
        GameVariant::OneVsOne => format!(
            "<!here> {} is looking for a challenger for a 1v1 duel. Who dares?",
            mention(initiator)
        ),
        GameVariant::TwoVsTwo => format!(
            "<!here> {} wants to play! Who's in? {} more players needed!",
            mention(initiator),
            variant.quorum() - 1
        ),
    }
}

/// Progress line shown while a game is still forming
pub fn progress(participants: &[String], quorum: usize) -> String {
    let needed = quorum.saturating_sub(participants.len());
    if needed == 0 {
        return ready(participants);
    }
    let noun = if needed == 1 { "player" } else { "players" };
    format!("{} joined. {needed} more {noun} needed!", mentions(participants).join(" "))
}

/// Final line once a game has reached its quorum
pub fn ready(participants: &[String]) -> String {
    format!("{} are ready. Let's go!", mentions(participants).join(" "))
}

/// Notice sent privately to every player of a full game
pub fn kickoff(participants: &[String]) -> String {
    format!("The game is full, {} to the table! :soccer:", mentions(participants).join(", "))
}

/// Replacement text for an announcement nobody completed in time
pub fn expired() -> String {
    "This game request has expired.".to_string()
}
