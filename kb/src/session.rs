//! Line-oriented command session
//!
//! Reads one command per line and drives a [`FormationCoordinator`] with it.
//! Commands run one after another; expiry timers keep firing in the
//! background between lines.

use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use eyre::{Context, Result, eyre};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::formation::{FormationCoordinator, FormationSnapshot, GameVariant, JoinOutcome, LeaveOutcome};

#[derive(Debug, Parser)]
#[command(
    no_binary_name = true,
    disable_help_flag = true,
    disable_version_flag = true,
    disable_help_subcommand = true
)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

/// One session command
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum SessionCommand {
    /// Call for players in a channel
    Create {
        channel: String,
        player: String,

        /// Play 1v1 instead of 2v2
        #[arg(short, long)]
        duel: bool,

        /// Expire the game after this long (e.g. 90s, 15m, 1h)
        #[arg(short, long, value_parser = parse_duration)]
        timeout: Option<Duration>,
    },

    /// Join the game forming in a channel
    Join { channel: String, player: String },

    /// Leave the game forming in a channel
    Leave { channel: String, player: String },

    /// Cancel a game you started
    Cancel { channel: String, player: String },

    /// Show one or all forming games
    Status { channel: Option<String> },

    /// Show coordinator counters
    Stats,

    /// End the session
    Quit,
}

impl SessionCommand {
    /// Parse one input line; blank lines and `#` comments yield `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(None);
        }

        let parsed = SessionLine::try_parse_from(line.split_whitespace()).map_err(|e| {
            let rendered = e.to_string();
            let first = rendered.lines().next().unwrap_or("invalid command");
            eyre!("{}", first.trim_start_matches("error: "))
        })?;
        Ok(Some(parsed.command))
    }
}

/// Parse `90`, `90s`, `15m` or `1h` into a duration
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let (digits, unit) = match value.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => value.split_at(idx),
        None => (value, "s"),
    };

    let amount: u64 = digits
        .parse()
        .context(format!("Invalid duration '{value}'"))?;
    let multiplier = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        other => return Err(eyre!("Unknown duration unit '{other}' in '{value}'")),
    };
    let secs = amount
        .checked_mul(multiplier)
        .ok_or_else(|| eyre!("Duration '{value}' is too large"))?;
    if secs == 0 {
        return Err(eyre!("Duration must be positive"));
    }
    Ok(Duration::from_secs(secs))
}

/// Drives a coordinator from text commands
pub struct Session {
    coordinator: FormationCoordinator,
}

impl Session {
    pub fn new(coordinator: FormationCoordinator) -> Self {
        debug!("Session::new: called");
        Self { coordinator }
    }

    pub fn coordinator(&self) -> &FormationCoordinator {
        &self.coordinator
    }

    /// Read commands until EOF or `quit`, printing one reply per command
    pub async fn run<R>(&self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        info!("Session started");
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await.context("Failed to read command")? {
            let command = match SessionCommand::parse(&line) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(e) => {
                    println!("{} {}", "error:".red().bold(), e);
                    continue;
                }
            };

            if command == SessionCommand::Quit {
                debug!("Session::run: quit requested");
                break;
            }

            println!("{}", self.execute(command).await);
        }

        info!("Session ended");
        Ok(())
    }

    /// Execute one command and render the reply
    pub async fn execute(&self, command: SessionCommand) -> String {
        debug!(?command, "Session::execute: called");
        match command {
            SessionCommand::Create {
                channel,
                player,
                duel,
                timeout,
            } => {
                let variant = if duel { GameVariant::OneVsOne } else { GameVariant::TwoVsTwo };
                let result = match timeout {
                    Some(timeout) => {
                        self.coordinator
                            .create_with_timeout(&channel, &player, variant, timeout)
                            .await
                    }
                    None => self.coordinator.create(&channel, &player, variant).await,
                };
                match result {
                    Ok(snapshot) => format!(
                        "{} game started in #{} by {}, {} more needed",
                        snapshot.variant,
                        channel,
                        player,
                        snapshot.remaining()
                    ),
                    Err(e) => error_line(&e),
                }
            }
            SessionCommand::Join { channel, player } => match self.coordinator.join(&channel, &player).await {
                Ok(JoinOutcome::Joined { remaining, .. }) => {
                    format!("{player} joined #{channel}, {remaining} more needed")
                }
                Ok(JoinOutcome::Completed { participants }) => {
                    format!("game in #{channel} is full: {}", participants.join(", "))
                        .green()
                        .to_string()
                }
                Err(e) => error_line(&e),
            },
            SessionCommand::Leave { channel, player } => match self.coordinator.leave(&channel, &player).await {
                Ok(LeaveOutcome::Left { remaining, .. }) => {
                    format!("{player} left #{channel}, {remaining} more needed")
                }
                Ok(LeaveOutcome::Cancelled) => format!("game in #{channel} cancelled, nobody left"),
                Err(e) => error_line(&e),
            },
            SessionCommand::Cancel { channel, player } => match self.coordinator.cancel(&channel, &player).await {
                Ok(()) => format!("game in #{channel} cancelled by {player}"),
                Err(e) => error_line(&e),
            },
            SessionCommand::Status { channel: Some(channel) } => match self.coordinator.snapshot(&channel).await {
                Some(snapshot) => status_line(&snapshot),
                None => format!("no game forming in #{channel}"),
            },
            SessionCommand::Status { channel: None } => {
                let formations = self.coordinator.active_formations().await;
                if formations.is_empty() {
                    "no games forming".to_string()
                } else {
                    formations.iter().map(status_line).collect::<Vec<_>>().join("\n")
                }
            }
            SessionCommand::Stats => {
                let stats = self.coordinator.stats().await;
                match serde_yaml::to_string(&stats) {
                    Ok(yaml) => yaml.trim_end().to_string(),
                    Err(e) => format!("{} {}", "error:".red().bold(), e),
                }
            }
            SessionCommand::Quit => "bye".to_string(),
        }
    }
}

fn status_line(snapshot: &FormationSnapshot) -> String {
    format!(
        "#{} {} [{}/{}] {}",
        snapshot.channel,
        snapshot.variant,
        snapshot.participants.len(),
        snapshot.quorum,
        snapshot.participants.join(", ")
    )
}

fn error_line(err: &crate::formation::FormationError) -> String {
    format!("{} {}", "error:".red().bold(), err)
}
