//! Snapshot building for subscribers

use uuid::Uuid;

use crate::protocol::{BattleSnapshot, FighterSnapshot, MatchPhase};

use super::combat::{CombatState, FighterState};

/// Builds the per-tick view published to participants and spectators
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    /// Health is reported clamped at 0
    pub fn fighter(fighter: &FighterState) -> FighterSnapshot {
        FighterSnapshot {
            participant: fighter.participant,
            health: fighter.reported_health(),
            max_health: fighter.max_health,
            position: fighter.position,
            attacking: fighter.attacking,
            blocking: fighter.blocking,
            attack_cooldown: fighter.attack_cooldown,
            last_action: fighter.last_action,
        }
    }

    pub fn build(
        match_id: Uuid,
        phase: MatchPhase,
        state: &CombatState,
        duration_ms: u64,
        spectator_count: usize,
        countdown_remaining: u32,
    ) -> BattleSnapshot {
        BattleSnapshot {
            match_id,
            tick: state.tick,
            phase,
            duration_ms,
            fighter_a: Self::fighter(&state.fighter_a),
            fighter_b: Self::fighter(&state.fighter_b),
            event: state.last_event.clone(),
            spectator_count,
            countdown_remaining,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_is_clamped() {
        let mut state = CombatState::new(Uuid::new_v4(), Uuid::new_v4());
        state.fighter_b.health = -5.0;
        state.tick = 12;

        let snapshot = SnapshotBuilder::build(Uuid::nil(), MatchPhase::Finished, &state, 1200, 3, 0);
        assert_eq!(snapshot.fighter_b.health, 0.0);
        assert_eq!(snapshot.fighter_a.health, 100.0);
        assert_eq!(snapshot.tick, 12);
        assert_eq!(snapshot.spectator_count, 3);
    }
}
