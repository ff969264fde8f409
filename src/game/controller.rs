//! Match lifecycle - preparation, battle and results for one duel
//!
//! The controller is synchronous and owns every piece of mutable match
//! state. The async runner in `r#match` is the only caller in a live
//! server; tests and the CLI step it directly.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{MatchConfig, MatchMode};
use crate::protocol::{
    BattleSnapshot, FinishReason, Language, MatchEvent, MatchPhase, MatchResults, Outcome, SubmitReply,
    TriggerReply,
};
use crate::rules;
use crate::script::ScriptProgram;
use crate::util::time::{simulated_millis, unix_millis};

use super::buttons::{ActionButton, ActionRegistry, RegistryError, TriggerOutcome};
use super::combat::{CombatState, CombatSystem};
use super::snapshot::SnapshotBuilder;
use super::source::{ActionSource, FighterView, IdleSource};
use super::{Action, Side};

/// Lifecycle violations; none of them change match state
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchError {
    #[error("Match is finished")]
    Finished,

    #[error("Participant {0} is not in this match")]
    UnknownParticipant(Uuid),

    #[error("Action button {0} not found")]
    UnknownAction(Uuid),

    #[error("Not allowed during {actual} (requires {expected})")]
    WrongPhase { expected: MatchPhase, actual: MatchPhase },

    #[error("Participant {0} has no accepted strategy")]
    NotSubmitted(Uuid),

    #[error("Rejected: {}", .0.join("; "))]
    Rejected(Vec<String>),

    #[error("Too many requests")]
    RateLimited,

    #[error("Match is no longer running")]
    Closed,
}

impl From<RegistryError> for MatchError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownParticipant(id) => Self::UnknownParticipant(id),
            RegistryError::UnknownAction(id) => Self::UnknownAction(id),
            RegistryError::Rejected(messages) => Self::Rejected(messages),
        }
    }
}

/// One participant's slot in the match
#[derive(Debug)]
struct Seat {
    participant: Uuid,
    source: Box<dyn ActionSource>,
    submitted: Option<Language>,
    ready: bool,
    /// Button actions consumed one per tick before the source is asked
    overrides: VecDeque<Action>,
}

impl Seat {
    fn new(participant: Uuid) -> Self {
        Self {
            participant,
            source: Box::new(IdleSource),
            submitted: None,
            ready: false,
            overrides: VecDeque::new(),
        }
    }
}

/// Authoritative state machine of one duel
#[derive(Debug)]
pub struct MatchController {
    id: Uuid,
    config: MatchConfig,
    phase: MatchPhase,
    seats: [Seat; 2],
    combat: CombatState,
    buttons: ActionRegistry,
    countdown_remaining: u32,
    spectator_count: usize,
    results: Option<MatchResults>,
    outbox: Vec<MatchEvent>,
}

impl MatchController {
    /// Manual matches skip preparation and start in battle
    pub fn new(id: Uuid, participant_a: Uuid, participant_b: Uuid, config: MatchConfig) -> Self {
        let mut controller = Self {
            id,
            phase: MatchPhase::Preparation,
            seats: [Seat::new(participant_a), Seat::new(participant_b)],
            combat: CombatState::new(participant_a, participant_b),
            buttons: ActionRegistry::from_config(&config),
            countdown_remaining: config.preparation_secs,
            spectator_count: 0,
            results: None,
            outbox: Vec::new(),
            config,
        };

        info!(match_id = %id, mode = %controller.config.mode, "Match created");
        if controller.config.mode == MatchMode::Manual {
            controller.start_battle();
        }
        controller
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn participants(&self) -> (Uuid, Uuid) {
        (self.seats[0].participant, self.seats[1].participant)
    }

    pub fn combat(&self) -> &CombatState {
        &self.combat
    }

    pub fn countdown_remaining(&self) -> u32 {
        self.countdown_remaining
    }

    pub fn is_ready(&self, participant: Uuid) -> bool {
        self.seat(participant).is_ok_and(|side| self.seats[side.index()].ready)
    }

    /// Language of the accepted submission, if any
    pub fn submission(&self, participant: Uuid) -> Option<Language> {
        self.seat(participant)
            .ok()
            .and_then(|side| self.seats[side.index()].submitted)
    }

    /// Button actions still queued for upcoming ticks
    pub fn pending_actions(&self, participant: Uuid) -> Vec<Action> {
        self.seat(participant)
            .map(|side| self.seats[side.index()].overrides.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn buttons(&self, participant: Uuid) -> Vec<ActionButton> {
        self.buttons.buttons(participant)
    }

    pub fn results(&self) -> Option<&MatchResults> {
        self.results.as_ref()
    }

    pub fn set_spectator_count(&mut self, count: usize) {
        self.spectator_count = count;
    }

    /// Take the events produced since the last drain
    pub fn drain_events(&mut self) -> Vec<MatchEvent> {
        std::mem::take(&mut self.outbox)
    }

    /// Accept or reject a strategy; an accepted one replaces any earlier one
    pub fn submit_strategy(
        &mut self,
        participant: Uuid,
        language: Language,
        source: &str,
    ) -> Result<SubmitReply, MatchError> {
        self.ensure_phase(MatchPhase::Preparation)?;
        let side = self.seat(participant)?;

        let accepted: Result<(Box<dyn ActionSource>, Vec<String>), Vec<String>> = match language {
            Language::Rules => rules::compile(source)
                .map(|compiled| (Box::new(compiled.strategy) as Box<dyn ActionSource>, compiled.warnings)),
            Language::Script => ScriptProgram::compile(source, self.config.script_budget())
                .map(|program| (Box::new(program) as Box<dyn ActionSource>, Vec::new()))
                .map_err(|report| report.messages()),
        };

        match accepted {
            Ok((strategy, warnings)) => {
                let seat = &mut self.seats[side.index()];
                seat.source = strategy;
                seat.submitted = Some(language);
                info!(match_id = %self.id, participant = %participant, %language, "Strategy accepted");
                Ok(SubmitReply {
                    accepted: true,
                    errors: Vec::new(),
                    warnings,
                })
            }
            Err(errors) => {
                debug!(match_id = %self.id, participant = %participant, %language, errors = ?errors, "Strategy rejected");
                Ok(SubmitReply {
                    accepted: false,
                    errors,
                    warnings: Vec::new(),
                })
            }
        }
    }

    /// Both participants ready starts the battle early
    pub fn set_ready(&mut self, participant: Uuid) -> Result<(), MatchError> {
        self.ensure_phase(MatchPhase::Preparation)?;
        let side = self.seat(participant)?;

        let seat = &mut self.seats[side.index()];
        if seat.submitted.is_none() {
            return Err(MatchError::NotSubmitted(participant));
        }
        if seat.ready {
            return Ok(());
        }
        seat.ready = true;

        info!(match_id = %self.id, participant = %participant, "Participant ready");
        self.outbox.push(MatchEvent::ParticipantReady { participant });

        if self.seats.iter().all(|seat| seat.ready) {
            self.start_battle();
        }
        Ok(())
    }

    /// One second of preparation; returns the seconds left
    pub fn countdown_tick(&mut self) -> Result<u32, MatchError> {
        self.ensure_phase(MatchPhase::Preparation)?;

        self.countdown_remaining = self.countdown_remaining.saturating_sub(1);
        self.outbox.push(MatchEvent::Countdown {
            seconds_remaining: self.countdown_remaining,
        });

        if self.countdown_remaining == 0 {
            self.start_battle();
        }
        Ok(self.countdown_remaining)
    }

    /// Add a custom button; without a name it is labelled after its function
    pub fn register_action(
        &mut self,
        participant: Uuid,
        name: Option<&str>,
        payload: &str,
    ) -> Result<ActionButton, MatchError> {
        self.ensure_phase(MatchPhase::Battle)?;
        self.seat(participant)?;

        let button = self.buttons.register(participant, name, payload)?;
        self.outbox.push(MatchEvent::ActionRegistered {
            participant,
            button: button.clone(),
        });
        Ok(button)
    }

    pub fn trigger_action(&mut self, participant: Uuid, action_id: Uuid) -> Result<TriggerReply, MatchError> {
        self.trigger_action_at(participant, action_id, unix_millis())
    }

    /// Press a button at `now_ms`; a fired button replaces the pending queue
    pub fn trigger_action_at(
        &mut self,
        participant: Uuid,
        action_id: Uuid,
        now_ms: u64,
    ) -> Result<TriggerReply, MatchError> {
        self.ensure_phase(MatchPhase::Battle)?;
        let side = self.seat(participant)?;

        match self.buttons.trigger_at(participant, action_id, now_ms)? {
            TriggerOutcome::Fired { actions } => {
                self.seats[side.index()].overrides = actions.iter().copied().collect();
                debug!(match_id = %self.id, participant = %participant, actions = ?actions, "Action triggered");
                self.outbox.push(MatchEvent::ActionTriggered {
                    participant,
                    action_id,
                    actions: actions.clone(),
                });
                Ok(TriggerReply {
                    accepted: true,
                    cooldown_remaining_ms: None,
                    actions,
                })
            }
            TriggerOutcome::CoolingDown { remaining_ms } => Ok(TriggerReply {
                accepted: false,
                cooldown_remaining_ms: Some(remaining_ms),
                actions: Vec::new(),
            }),
        }
    }

    /// Advance the battle by one tick
    pub fn tick(&mut self) -> Result<BattleSnapshot, MatchError> {
        self.ensure_phase(MatchPhase::Battle)?;

        let action_a = self.next_action(Side::A);
        let action_b = self.next_action(Side::B);
        self.combat = CombatSystem::resolve(&self.combat, action_a, action_b);

        let finished = self
            .termination()
            .map(|(outcome, reason)| self.finish(outcome, reason));

        let snapshot = self.snapshot();
        self.outbox.push(MatchEvent::Snapshot(snapshot.clone()));
        if let Some(results) = finished {
            self.outbox.push(MatchEvent::Finished(results));
        }
        Ok(snapshot)
    }

    /// Forfeit; the other participant wins
    pub fn leave(&mut self, participant: Uuid) -> Result<MatchResults, MatchError> {
        self.ensure_live()?;
        let side = self.seat(participant)?;

        let outcome = match side.opponent() {
            Side::A => Outcome::A,
            Side::B => Outcome::B,
        };
        info!(match_id = %self.id, participant = %participant, "Participant left");

        let results = self.finish(outcome, FinishReason::Forfeit);
        self.outbox.push(MatchEvent::Finished(results.clone()));
        Ok(results)
    }

    /// End without a winner
    pub fn abort(&mut self) -> Result<MatchResults, MatchError> {
        self.ensure_live()?;
        warn!(match_id = %self.id, phase = %self.phase, "Match aborted");

        let results = self.finish(Outcome::Draw, FinishReason::Aborted);
        self.outbox.push(MatchEvent::Finished(results.clone()));
        Ok(results)
    }

    /// Skip any remaining preparation and tick until the match ends
    pub fn run_to_completion(&mut self) -> Result<MatchResults, MatchError> {
        if self.phase == MatchPhase::Preparation {
            self.start_battle();
        }
        while self.phase == MatchPhase::Battle {
            self.tick()?;
        }
        self.results.clone().ok_or(MatchError::WrongPhase {
            expected: MatchPhase::Finished,
            actual: self.phase,
        })
    }

    pub fn snapshot(&self) -> BattleSnapshot {
        SnapshotBuilder::build(
            self.id,
            self.phase,
            &self.combat,
            self.duration_ms(),
            self.spectator_count,
            self.countdown_remaining,
        )
    }

    fn duration_ms(&self) -> u64 {
        simulated_millis(self.combat.tick, self.config.tick_interval_ms)
    }

    fn seat(&self, participant: Uuid) -> Result<Side, MatchError> {
        if self.seats[0].participant == participant {
            Ok(Side::A)
        } else if self.seats[1].participant == participant {
            Ok(Side::B)
        } else {
            Err(MatchError::UnknownParticipant(participant))
        }
    }

    fn ensure_live(&self) -> Result<(), MatchError> {
        if self.phase == MatchPhase::Finished {
            Err(MatchError::Finished)
        } else {
            Ok(())
        }
    }

    fn ensure_phase(&self, expected: MatchPhase) -> Result<(), MatchError> {
        self.ensure_live()?;
        if self.phase != expected {
            return Err(MatchError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn next_action(&mut self, side: Side) -> Action {
        let seat = &mut self.seats[side.index()];
        if let Some(action) = seat.overrides.pop_front() {
            return action;
        }
        seat.source.next_action(&FighterView::new(&self.combat, side))
    }

    fn start_battle(&mut self) {
        let (participant_a, participant_b) = self.participants();

        self.phase = MatchPhase::Battle;
        self.countdown_remaining = 0;
        self.combat = CombatState::new(participant_a, participant_b);

        for seat in &mut self.seats {
            self.buttons.init_defaults(seat.participant);
            seat.overrides.clear();
            if self.config.mode == MatchMode::Scripted && seat.submitted.is_none() {
                seat.source = Box::new(rules::fallback_strategy());
            }
        }

        info!(
            match_id = %self.id,
            source_a = self.seats[0].source.kind(),
            source_b = self.seats[1].source.kind(),
            "Battle started"
        );
        self.outbox.push(MatchEvent::BattleStarted {
            fighter_a: participant_a,
            fighter_b: participant_b,
        });
    }

    fn termination(&self) -> Option<(Outcome, FinishReason)> {
        let a_down = self.combat.fighter_a.is_down();
        let b_down = self.combat.fighter_b.is_down();

        match (a_down, b_down) {
            (true, true) => Some((Outcome::Draw, FinishReason::Knockout)),
            (true, false) => Some((Outcome::B, FinishReason::Knockout)),
            (false, true) => Some((Outcome::A, FinishReason::Knockout)),
            (false, false) if self.combat.tick >= self.config.max_ticks => {
                Some((Outcome::Draw, FinishReason::TickLimit))
            }
            (false, false) => None,
        }
    }

    fn finish(&mut self, outcome: Outcome, reason: FinishReason) -> MatchResults {
        self.phase = MatchPhase::Finished;
        for seat in &mut self.seats {
            seat.overrides.clear();
        }
        self.buttons.clear_all();

        let winner = match outcome {
            Outcome::A => Some(self.seats[0].participant),
            Outcome::B => Some(self.seats[1].participant),
            Outcome::Draw => None,
        };

        let results = MatchResults {
            match_id: self.id,
            outcome,
            winner,
            reason,
            final_health_a: self.combat.fighter_a.reported_health(),
            final_health_b: self.combat.fighter_b.reported_health(),
            ticks: self.combat.tick,
            duration_ms: self.duration_ms(),
            stats_a: self.combat.fighter_a.stats.clone(),
            stats_b: self.combat.fighter_b.stats.clone(),
            finished_at: Utc::now(),
        };

        info!(
            match_id = %self.id,
            outcome = ?outcome,
            reason = ?reason,
            ticks = results.ticks,
            "Match finished"
        );
        self.results = Some(results.clone());
        results
    }
}
