//! Autonomous decision sources for fighters

use std::fmt::Debug;

use crate::rules::{Context, RuleExecutor, Strategy};
use crate::script::{ScriptProgram, ScriptState};

use super::combat::CombatState;
use super::{Action, Side};

/// The duel as one fighter sees it
#[derive(Debug, Clone, Copy)]
pub struct FighterView<'a> {
    state: &'a CombatState,
    side: Side,
}

impl<'a> FighterView<'a> {
    pub fn new(state: &'a CombatState, side: Side) -> Self {
        Self { state, side }
    }

    /// Values readable from the rule language
    pub fn rule_context(&self) -> Context {
        let me = self.state.fighter(self.side);
        let enemy = self.state.fighter(self.side.opponent());
        Context {
            self_health: me.health,
            self_attack_cooldown: f64::from(me.attack_cooldown),
            enemy_health: enemy.health,
            enemy_attack_cooldown: f64::from(enemy.attack_cooldown),
            distance: self.state.distance(),
        }
    }

    /// Values exposed on the script `Fighter` object
    pub fn script_state(&self) -> ScriptState {
        let me = self.state.fighter(self.side);
        let enemy = self.state.fighter(self.side.opponent());
        ScriptState {
            distance: self.state.distance(),
            health: me.health,
            opponent_health: enemy.health,
            attack_cooldown: me.attack_cooldown,
            opponent_attack_cooldown: enemy.attack_cooldown,
            x: me.position.x,
            y: me.position.y,
            opponent_x: enemy.position.x,
            opponent_y: enemy.position.y,
            tick: self.state.tick,
        }
    }
}

/// Something that picks a fighter's action each tick
pub trait ActionSource: Debug + Send + Sync {
    fn next_action(&self, view: &FighterView<'_>) -> Action;

    /// Short label for logs
    fn kind(&self) -> &'static str;
}

impl ActionSource for Strategy {
    fn next_action(&self, view: &FighterView<'_>) -> Action {
        RuleExecutor::decide(self, &view.rule_context())
    }

    fn kind(&self) -> &'static str {
        "rules"
    }
}

impl ActionSource for ScriptProgram {
    fn next_action(&self, view: &FighterView<'_>) -> Action {
        self.execute(&view.script_state())
    }

    fn kind(&self) -> &'static str {
        "script"
    }
}

/// Always idles; manual-mode fighters only act through buttons
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleSource;

impl ActionSource for IdleSource {
    fn next_action(&self, _view: &FighterView<'_>) -> Action {
        Action::Idle
    }

    fn kind(&self) -> &'static str {
        "idle"
    }
}
