//! Game simulation modules

pub mod buttons;
pub mod combat;
pub mod controller;
pub mod r#match;
pub mod physics;
pub mod snapshot;
pub mod source;

pub use controller::{MatchController, MatchError};
pub use r#match::{GameMatch, MatchHandle, MatchInput, MatchRegistry};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Action a fighter performs for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Attack,
    Block,
    Approach,
    Retreat,
    #[default]
    Idle,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Attack,
        Action::Block,
        Action::Approach,
        Action::Retreat,
        Action::Idle,
    ];

    /// Upper-case keyword used in rule text and script return values
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Attack => "ATTACK",
            Self::Block => "BLOCK",
            Self::Approach => "APPROACH",
            Self::Retreat => "RETREAT",
            Self::Idle => "IDLE",
        }
    }

    /// Case-sensitive keyword lookup
    pub fn from_keyword(word: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.keyword() == word)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Fighter slot inside a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
        }
    }
}

/// Position on the arena plane
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(Action::from_keyword("ATTACK"), Some(Action::Attack));
        assert_eq!(Action::from_keyword("attack"), None);
        assert_eq!(Action::from_keyword("JUMP"), None);
    }

    #[test]
    fn keyword_round_trips() {
        for action in Action::ALL {
            assert_eq!(Action::from_keyword(action.keyword()), Some(action));
        }
    }

    #[test]
    fn sides_are_opposed() {
        assert_eq!(Side::A.opponent(), Side::B);
        assert_eq!(Side::B.opponent().index(), 0);
    }
}
