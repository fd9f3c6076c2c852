//! Game variants and their quorum sizes

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of game being formed; fixes the number of players needed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameVariant {
    /// Two teams of two
    #[default]
    TwoVsTwo,
    /// Single duel
    OneVsOne,
}

impl GameVariant {
    /// Number of participants needed before the game starts
    pub fn quorum(self) -> usize {
        match self {
            GameVariant::TwoVsTwo => 4,
            GameVariant::OneVsOne => 2,
        }
    }
}

impl fmt::Display for GameVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameVariant::TwoVsTwo => write!(f, "2v2"),
            GameVariant::OneVsOne => write!(f, "1v1"),
        }
    }
}

impl FromStr for GameVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "2v2" | "two-vs-two" | "double" => Ok(GameVariant::TwoVsTwo),
            "1v1" | "one-vs-one" | "duel" => Ok(GameVariant::OneVsOne),
            other => Err(format!("Unknown game variant: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quorum() {
        assert_eq!(GameVariant::TwoVsTwo.quorum(), 4);
        assert_eq!(GameVariant::OneVsOne.quorum(), 2);
    }

    #[test]
    fn test_parse() {
        assert_eq!("duel".parse::<GameVariant>().unwrap(), GameVariant::OneVsOne);
        assert_eq!("2V2".parse::<GameVariant>().unwrap(), GameVariant::TwoVsTwo);
        assert!("3v3".parse::<GameVariant>().is_err());
    }

    #[test]
    fn test_display_roundtrips_through_parse() {
        for variant in [GameVariant::TwoVsTwo, GameVariant::OneVsOne] {
            assert_eq!(variant.to_string().parse::<GameVariant>().unwrap(), variant);
        }
    }
}
