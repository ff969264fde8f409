//! Match protocol definitions
//! These are the request, reply and event types a transport layer wraps

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::buttons::ActionButton;
use crate::game::{Action, Position, Side};

/// Language a strategy submission is written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    /// Declarative STRATEGY/RULE text
    Rules,
    /// Rhai program with an `execute` entry point
    Script,
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rules" | "rule" | "casl" => Ok(Self::Rules),
            "script" | "rhai" => Ok(Self::Script),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rules => write!(f, "rules"),
            Self::Script => write!(f, "script"),
        }
    }
}

/// Match phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    /// Accepting submissions and readiness, countdown running
    Preparation,
    /// Ticks are being resolved
    Battle,
    /// Results are final
    Finished,
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preparation => write!(f, "preparation"),
            Self::Battle => write!(f, "battle"),
            Self::Finished => write!(f, "finished"),
        }
    }
}

/// What happened during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Swing in range while the cooldown was still running
    Attack,
    /// Blocked hit, or a block with nothing landing on it
    Block,
    /// Unblocked hit
    Damage,
    /// Swing out of range
    Miss,
}

/// The single event reported for a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatEvent {
    pub kind: EventKind,
    pub attacker: Option<Side>,
    pub target: Option<Side>,
    pub damage: Option<f64>,
    /// Where the event happened (the target's position)
    pub position: Option<Position>,
}

/// Per-fighter combat statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatStats {
    pub attacks_landed: u32,
    pub blocks_used: u32,
    pub damage_dealt: f64,
    pub damage_taken: f64,
    pub final_position: Position,
}

/// Fighter state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FighterSnapshot {
    pub participant: Uuid,
    /// Health, clamped at 0
    pub health: f64,
    pub max_health: f64,
    pub position: Position,
    pub attacking: bool,
    pub blocking: bool,
    /// Ticks until the fighter can land another hit
    pub attack_cooldown: u32,
    pub last_action: Action,
}

/// Read-only view of a match after a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub match_id: Uuid,
    pub tick: u64,
    pub phase: MatchPhase,
    /// Simulated time elapsed (tick count times the tick interval)
    pub duration_ms: u64,
    pub fighter_a: FighterSnapshot,
    pub fighter_b: FighterSnapshot,
    pub event: Option<CombatEvent>,
    pub spectator_count: usize,
    /// Seconds left in preparation
    pub countdown_remaining: u32,
}

/// Who won
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    A,
    B,
    Draw,
}

/// Why the match ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// A fighter's health reached zero
    Knockout,
    /// The tick cap was reached
    TickLimit,
    /// A participant left
    Forfeit,
    /// Every handle to the match was dropped
    Aborted,
}

/// Final match results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResults {
    pub match_id: Uuid,
    pub outcome: Outcome,
    pub winner: Option<Uuid>,
    pub reason: FinishReason,
    pub final_health_a: f64,
    pub final_health_b: f64,
    pub ticks: u64,
    pub duration_ms: u64,
    pub stats_a: CombatStats,
    pub stats_b: CombatStats,
    pub finished_at: DateTime<Utc>,
}

/// Reply to a strategy submission
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReply {
    pub accepted: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Reply to an action button trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerReply {
    pub accepted: bool,
    /// Present when the button is still cooling down
    pub cooldown_remaining_ms: Option<u64>,
    /// Actions queued for the next ticks
    pub actions: Vec<Action>,
}

/// Requests a participant sends to a match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Submit or replace a strategy during preparation
    SubmitStrategy { language: Language, source: String },

    /// Mark the participant ready
    SetReady,

    /// Leave the match (forfeit)
    Leave,

    /// Define a custom action button during battle
    RegisterAction {
        /// Label shown on the button; derived from the payload when absent
        #[serde(default)]
        name: Option<String>,
        payload: String,
    },

    /// Press an action button
    TriggerAction { action_id: Uuid },
}

/// Successful replies to a `ClientRequest`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchReply {
    Submitted(SubmitReply),
    Ready,
    Left,
    Registered(ActionButton),
    Triggered(TriggerReply),
}

/// Events published by a running match
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatchEvent {
    /// Preparation countdown
    Countdown { seconds_remaining: u32 },

    /// A participant marked themselves ready
    ParticipantReady { participant: Uuid },

    /// Battle has started
    BattleStarted { fighter_a: Uuid, fighter_b: Uuid },

    /// A custom button was added to a participant's roster
    ActionRegistered {
        participant: Uuid,
        button: ActionButton,
    },

    /// A button fired
    ActionTriggered {
        participant: Uuid,
        action_id: Uuid,
        actions: Vec<Action>,
    },

    /// State after a tick
    Snapshot(BattleSnapshot),

    /// Match has ended
    Finished(MatchResults),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_accepts_aliases() {
        assert_eq!("RULES".parse::<Language>().unwrap(), Language::Rules);
        assert_eq!("rhai".parse::<Language>().unwrap(), Language::Script);
        assert!("lua".parse::<Language>().is_err());
    }

    #[test]
    fn requests_are_tagged() {
        let json = serde_json::to_value(ClientRequest::SubmitStrategy {
            language: Language::Rules,
            source: "STRATEGY X { DEFAULT IDLE }".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "submit_strategy");
        assert_eq!(json["language"], "rules");

        let parsed: ClientRequest = serde_json::from_str(r#"{"type":"set_ready"}"#).unwrap();
        assert!(matches!(parsed, ClientRequest::SetReady));
    }

    #[test]
    fn event_kinds_use_upper_case() {
        let json = serde_json::to_string(&EventKind::Damage).unwrap();
        assert_eq!(json, "\"DAMAGE\"");
    }
}
