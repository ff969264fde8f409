//! Action buttons - per-participant, cooldown-gated manual overrides

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::config::MatchConfig;
use crate::script::screen::{find_call, first_function_name, screen_button};

use super::Action;

/// Built-in buttons: (key, label, action)
const DEFAULT_BUTTONS: [(&str, &str, Action); 4] = [
    ("move_forward", "Move Forward", Action::Approach),
    ("move_backward", "Move Backward", Action::Retreat),
    ("attack", "Attack", Action::Attack),
    ("defend", "Defend", Action::Block),
];

/// Calls recognized in button payloads, in scan order
const PRIMITIVES: [(&[&str], Action); 4] = [
    (&["attack"], Action::Attack),
    (&["move_forward", "approach"], Action::Approach),
    (&["move_backward", "retreat"], Action::Retreat),
    (&["defend", "block"], Action::Block),
];

/// A named trigger that overrides a fighter's next actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionButton {
    pub id: Uuid,
    pub participant: Uuid,
    /// Identifier form of the name (`move_forward`, `power_strike`)
    pub key: String,
    /// Display name
    pub name: String,
    pub cooldown_ms: u64,
    /// Unix millis of the last successful trigger
    pub last_used_at: Option<u64>,
    pub is_default: bool,
    /// Source the button was defined from (empty for built-ins)
    pub payload: String,
    /// Actions queued for the following ticks when fired
    pub actions: Vec<Action>,
}

impl ActionButton {
    /// Milliseconds until the button can fire again, if it is cooling down
    pub fn cooldown_remaining(&self, now_ms: u64) -> Option<u64> {
        let last = self.last_used_at?;
        let elapsed = now_ms.saturating_sub(last);
        (elapsed < self.cooldown_ms).then(|| self.cooldown_ms - elapsed)
    }
}

/// Result of pressing a button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    Fired { actions: Vec<Action> },
    CoolingDown { remaining_ms: u64 },
}

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Participant {0} has no action buttons")]
    UnknownParticipant(Uuid),

    #[error("Action button {0} not found")]
    UnknownAction(Uuid),

    #[error("Action code rejected: {}", .0.join("; "))]
    Rejected(Vec<String>),
}

/// Button rosters keyed by participant
pub struct ActionRegistry {
    buttons: DashMap<Uuid, Vec<ActionButton>>,
    default_cooldown_ms: u64,
    custom_cooldown_ms: u64,
}

impl ActionRegistry {
    pub fn new(default_cooldown_ms: u64, custom_cooldown_ms: u64) -> Self {
        Self {
            buttons: DashMap::new(),
            default_cooldown_ms,
            custom_cooldown_ms,
        }
    }

    pub fn from_config(config: &MatchConfig) -> Self {
        Self::new(config.default_button_cooldown_ms, config.custom_button_cooldown_ms)
    }

    /// Seed the built-in buttons, replacing any existing roster
    pub fn init_defaults(&self, participant: Uuid) -> Vec<ActionButton> {
        let roster: Vec<ActionButton> = DEFAULT_BUTTONS
            .iter()
            .map(|(key, name, action)| ActionButton {
                id: Uuid::new_v4(),
                participant,
                key: key.to_string(),
                name: name.to_string(),
                cooldown_ms: self.default_cooldown_ms,
                last_used_at: None,
                is_default: true,
                payload: String::new(),
                actions: vec![*action],
            })
            .collect();

        self.buttons.insert(participant, roster.clone());
        roster
    }

    /// Screen `payload` and append a custom button
    ///
    /// The name defaults to the humanized first function name.
    pub fn register(
        &self,
        participant: Uuid,
        name: Option<&str>,
        payload: &str,
    ) -> Result<ActionButton, RegistryError> {
        let report = screen_button(payload);
        if !report.is_safe() {
            return Err(RegistryError::Rejected(report.messages()));
        }

        let key = first_function_name(payload).unwrap_or("custom_action").to_string();
        let name = name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| humanize(&key));

        let button = ActionButton {
            id: Uuid::new_v4(),
            participant,
            key,
            name,
            cooldown_ms: self.custom_cooldown_ms,
            last_used_at: None,
            is_default: false,
            payload: payload.to_string(),
            actions: extract_actions(payload),
        };

        debug!(participant = %participant, button = %button.name, actions = ?button.actions, "Action button registered");
        self.buttons.entry(participant).or_default().push(button.clone());
        Ok(button)
    }

    /// Press a button at `now_ms`; check and stamp happen under one lock
    pub fn trigger_at(
        &self,
        participant: Uuid,
        action_id: Uuid,
        now_ms: u64,
    ) -> Result<TriggerOutcome, RegistryError> {
        let mut roster = self
            .buttons
            .get_mut(&participant)
            .ok_or(RegistryError::UnknownParticipant(participant))?;
        let button = roster
            .iter_mut()
            .find(|button| button.id == action_id)
            .ok_or(RegistryError::UnknownAction(action_id))?;

        if let Some(remaining_ms) = button.cooldown_remaining(now_ms) {
            return Ok(TriggerOutcome::CoolingDown { remaining_ms });
        }

        button.last_used_at = Some(now_ms);
        Ok(TriggerOutcome::Fired {
            actions: button.actions.clone(),
        })
    }

    pub fn buttons(&self, participant: Uuid) -> Vec<ActionButton> {
        self.buttons
            .get(&participant)
            .map(|roster| roster.clone())
            .unwrap_or_default()
    }

    pub fn find_by_key(&self, participant: Uuid, key: &str) -> Option<ActionButton> {
        self.buttons
            .get(&participant)?
            .iter()
            .find(|button| button.key == key)
            .cloned()
    }

    pub fn is_on_cooldown_at(&self, participant: Uuid, action_id: Uuid, now_ms: u64) -> bool {
        self.buttons
            .get(&participant)
            .and_then(|roster| {
                roster
                    .iter()
                    .find(|button| button.id == action_id)
                    .map(|button| button.cooldown_remaining(now_ms).is_some())
            })
            .unwrap_or(false)
    }

    pub fn clear(&self, participant: Uuid) {
        self.buttons.remove(&participant);
    }

    pub fn clear_all(&self) {
        self.buttons.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("participants", &self.buttons.len())
            .field("default_cooldown_ms", &self.default_cooldown_ms)
            .field("custom_cooldown_ms", &self.custom_cooldown_ms)
            .finish()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::from_config(&MatchConfig::default())
    }
}

/// Primitive actions a payload calls, in fixed scan order; `[ATTACK]` if none
pub fn extract_actions(payload: &str) -> Vec<Action> {
    let found: Vec<Action> = PRIMITIVES
        .iter()
        .filter(|(names, _)| names.iter().any(|name| find_call(payload, name).is_some()))
        .map(|(_, action)| *action)
        .collect();

    if found.is_empty() {
        vec![Action::Attack]
    } else {
        found
    }
}

/// `power_strike` / `powerStrike` -> `Power Strike`
pub fn humanize(identifier: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();

    for c in identifier.chars() {
        if c == '_' || c == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if c.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(c);
        } else {
            current.push(c);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    if words.is_empty() {
        return "Custom Action".to_string();
    }

    words
        .iter()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
