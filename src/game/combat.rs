//! Combat system - one deterministic step of a duel

use uuid::Uuid;

use crate::protocol::{CombatEvent, CombatStats, EventKind};

use super::physics::PhysicsSystem;
use super::{Action, Position, Side};

/// Damage of an unblocked hit
pub const BASE_DAMAGE: f64 = 10.0;
/// Share of damage that gets through a block
pub const BLOCK_MULTIPLIER: f64 = 0.5;
/// Hits land when the fighters are at most this far apart
pub const ATTACK_RANGE: f64 = 2.0;
/// Ticks a fighter waits after landing a hit
pub const ATTACK_COOLDOWN_TICKS: u32 = 3;
/// Starting health
pub const MAX_HEALTH: f64 = 100.0;

pub const SPAWN_A: Position = Position::new(0.0, 0.0);
pub const SPAWN_B: Position = Position::new(10.0, 0.0);

/// Authoritative fighter state
#[derive(Debug, Clone, PartialEq)]
pub struct FighterState {
    pub participant: Uuid,
    /// May go negative; reports clamp it at 0
    pub health: f64,
    pub max_health: f64,
    pub position: Position,
    pub attacking: bool,
    pub blocking: bool,
    pub attack_cooldown: u32,
    pub last_action: Action,
    pub stats: CombatStats,
}

impl FighterState {
    pub fn new(participant: Uuid, spawn: Position) -> Self {
        Self {
            participant,
            health: MAX_HEALTH,
            max_health: MAX_HEALTH,
            position: spawn,
            attacking: false,
            blocking: false,
            attack_cooldown: 0,
            last_action: Action::Idle,
            stats: CombatStats {
                final_position: spawn,
                ..CombatStats::default()
            },
        }
    }

    pub fn is_down(&self) -> bool {
        self.health <= 0.0
    }

    pub fn reported_health(&self) -> f64 {
        self.health.max(0.0)
    }
}

/// Both fighters plus the tick counter
#[derive(Debug, Clone, PartialEq)]
pub struct CombatState {
    pub tick: u64,
    pub fighter_a: FighterState,
    pub fighter_b: FighterState,
    /// Event of the most recent tick
    pub last_event: Option<CombatEvent>,
}

impl CombatState {
    /// Fresh duel with both fighters at their spawn points
    pub fn new(participant_a: Uuid, participant_b: Uuid) -> Self {
        Self {
            tick: 0,
            fighter_a: FighterState::new(participant_a, SPAWN_A),
            fighter_b: FighterState::new(participant_b, SPAWN_B),
            last_event: None,
        }
    }

    pub fn fighter(&self, side: Side) -> &FighterState {
        match side {
            Side::A => &self.fighter_a,
            Side::B => &self.fighter_b,
        }
    }

    pub fn fighter_mut(&mut self, side: Side) -> &mut FighterState {
        match side {
            Side::A => &mut self.fighter_a,
            Side::B => &mut self.fighter_b,
        }
    }

    pub fn distance(&self) -> f64 {
        PhysicsSystem::distance(self.fighter_a.position, self.fighter_b.position)
    }
}

/// Outcome of one fighter's action before it is applied
struct Swing {
    damage_to_opponent: f64,
    event: Option<CombatEvent>,
}

/// Combat system for resolving ticks
pub struct CombatSystem;

impl CombatSystem {
    /// Resolve one tick; `state` is left untouched
    pub fn resolve(state: &CombatState, action_a: Action, action_b: Action) -> CombatState {
        let mut next = state.clone();
        let distance = state.distance();

        for side in [Side::A, Side::B] {
            let fighter = next.fighter_mut(side);
            fighter.attacking = false;
            fighter.blocking = false;
        }

        // Both fighters act against the pre-tick distance and cooldowns
        let swing_a = Self::swing(state, Side::A, action_a, action_b, distance);
        let swing_b = Self::swing(state, Side::B, action_b, action_a, distance);

        for (side, action, swing) in [(Side::A, action_a, &swing_a), (Side::B, action_b, &swing_b)] {
            let landed = swing.damage_to_opponent > 0.0;
            {
                let fighter = next.fighter_mut(side);
                match action {
                    Action::Attack if landed => {
                        fighter.attacking = true;
                        fighter.attack_cooldown = ATTACK_COOLDOWN_TICKS;
                        fighter.stats.attacks_landed += 1;
                        fighter.stats.damage_dealt += swing.damage_to_opponent;
                    }
                    Action::Block => {
                        fighter.blocking = true;
                        fighter.stats.blocks_used += 1;
                    }
                    _ => {}
                }
            }
            if landed {
                let target = next.fighter_mut(side.opponent());
                target.health -= swing.damage_to_opponent;
                target.stats.damage_taken += swing.damage_to_opponent;
            }
        }

        // Movement is sequential: B reacts to A's new position
        next.fighter_a.position =
            PhysicsSystem::apply_movement(next.fighter_a.position, next.fighter_b.position, action_a);
        next.fighter_b.position =
            PhysicsSystem::apply_movement(next.fighter_b.position, next.fighter_a.position, action_b);

        for side in [Side::A, Side::B] {
            let fighter = next.fighter_mut(side);
            // A cooldown set this tick reads in full until the next tick
            if !fighter.attacking {
                fighter.attack_cooldown = fighter.attack_cooldown.saturating_sub(1);
            }
            fighter.stats.final_position = fighter.position;
        }

        next.fighter_a.last_action = action_a;
        next.fighter_b.last_action = action_b;
        next.last_event = swing_a.event.or(swing_b.event);
        next.tick += 1;

        next
    }

    fn swing(
        state: &CombatState,
        side: Side,
        action: Action,
        opponent_action: Action,
        distance: f64,
    ) -> Swing {
        let attacker = state.fighter(side);
        let target = state.fighter(side.opponent());
        let opponent_blocks = opponent_action == Action::Block;

        let (damage_to_opponent, event) = match action {
            Action::Attack if distance > ATTACK_RANGE => (
                0.0,
                Some(CombatEvent {
                    kind: EventKind::Miss,
                    attacker: Some(side),
                    target: Some(side.opponent()),
                    damage: None,
                    position: Some(target.position),
                }),
            ),
            Action::Attack if attacker.attack_cooldown > 0 => (
                0.0,
                Some(CombatEvent {
                    kind: EventKind::Attack,
                    attacker: Some(side),
                    target: Some(side.opponent()),
                    damage: None,
                    position: Some(target.position),
                }),
            ),
            Action::Attack => {
                let damage = Self::calculate_damage(opponent_blocks);
                let kind = if opponent_blocks {
                    EventKind::Block
                } else {
                    EventKind::Damage
                };
                (
                    damage,
                    Some(CombatEvent {
                        kind,
                        attacker: Some(side),
                        target: Some(side.opponent()),
                        damage: Some(damage),
                        position: Some(target.position),
                    }),
                )
            }
            Action::Block => (
                0.0,
                Some(CombatEvent {
                    kind: EventKind::Block,
                    attacker: None,
                    target: Some(side),
                    damage: None,
                    position: Some(attacker.position),
                }),
            ),
            Action::Approach | Action::Retreat | Action::Idle => (0.0, None),
        };

        Swing {
            damage_to_opponent,
            event,
        }
    }

    /// Damage of a hit that lands
    pub fn calculate_damage(target_blocking: bool) -> f64 {
        if target_blocking {
            BASE_DAMAGE * BLOCK_MULTIPLIER
        } else {
            BASE_DAMAGE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duel_at(distance: f64) -> CombatState {
        let mut state = CombatState::new(Uuid::new_v4(), Uuid::new_v4());
        state.fighter_b.position = Position::new(distance, 0.0);
        state
    }

    #[test]
    fn blocked_hit_deals_half_damage() {
        let state = duel_at(1.0);
        let next = CombatSystem::resolve(&state, Action::Attack, Action::Block);

        assert_eq!(next.fighter_b.health, MAX_HEALTH - BASE_DAMAGE * BLOCK_MULTIPLIER);
        assert_eq!(next.fighter_a.attack_cooldown, ATTACK_COOLDOWN_TICKS);
        assert_eq!(next.fighter_a.stats.attacks_landed, 1);
        assert_eq!(next.fighter_b.stats.blocks_used, 1);
        assert!(next.fighter_a.attacking);
        assert!(next.fighter_b.blocking);

        let event = next.last_event.unwrap();
        assert_eq!(event.kind, EventKind::Block);
        assert_eq!(event.damage, Some(5.0));
        assert_eq!(event.attacker, Some(Side::A));
    }

    #[test]
    fn out_of_range_attack_misses() {
        let state = duel_at(5.0);
        let next = CombatSystem::resolve(&state, Action::Attack, Action::Idle);

        assert_eq!(next.fighter_b.health, MAX_HEALTH);
        assert_eq!(next.fighter_a.attack_cooldown, 0);
        assert!(!next.fighter_a.attacking);
        assert_eq!(next.last_event.unwrap().kind, EventKind::Miss);
    }

    #[test]
    fn range_is_inclusive() {
        let next = CombatSystem::resolve(&duel_at(2.0), Action::Attack, Action::Idle);
        assert_eq!(next.fighter_b.health, MAX_HEALTH - BASE_DAMAGE);
        assert_eq!(next.last_event.unwrap().kind, EventKind::Damage);
    }

    #[test]
    fn cooldown_blocks_followup_hits() {
        let mut state = duel_at(1.0);
        let mut landed = 0;
        for _ in 0..4 {
            state = CombatSystem::resolve(&state, Action::Attack, Action::Idle);
            if state.last_event.as_ref().map(|e| e.kind) == Some(EventKind::Damage) {
                landed += 1;
            }
        }
        // Hit on tick 1, cooldown 3 -> 2 -> 1 -> 0, next hit on tick 5
        assert_eq!(landed, 1);
        assert_eq!(state.fighter_a.attack_cooldown, 0);

        state = CombatSystem::resolve(&state, Action::Attack, Action::Idle);
        assert_eq!(state.fighter_b.health, MAX_HEALTH - 2.0 * BASE_DAMAGE);
    }

    #[test]
    fn swing_on_cooldown_reports_attack() {
        let mut state = duel_at(1.0);
        state.fighter_a.attack_cooldown = 2;
        let next = CombatSystem::resolve(&state, Action::Attack, Action::Idle);
        assert_eq!(next.last_event.unwrap().kind, EventKind::Attack);
        assert_eq!(next.fighter_b.health, MAX_HEALTH);
        assert_eq!(next.fighter_a.attack_cooldown, 1);
    }

    #[test]
    fn simultaneous_hits_both_land() {
        let next = CombatSystem::resolve(&duel_at(1.0), Action::Attack, Action::Attack);
        assert_eq!(next.fighter_a.health, MAX_HEALTH - BASE_DAMAGE);
        assert_eq!(next.fighter_b.health, MAX_HEALTH - BASE_DAMAGE);
        assert_eq!(next.last_event.unwrap().attacker, Some(Side::A));
    }

    #[test]
    fn lone_block_is_reported() {
        let next = CombatSystem::resolve(&duel_at(5.0), Action::Idle, Action::Block);
        let event = next.last_event.unwrap();
        assert_eq!(event.kind, EventKind::Block);
        assert_eq!(event.target, Some(Side::B));
        assert_eq!(event.damage, None);
    }

    #[test]
    fn movement_is_sequential() {
        let state = duel_at(10.0);
        let next = CombatSystem::resolve(&state, Action::Approach, Action::Approach);
        assert_eq!(next.fighter_a.position, Position::new(1.0, 0.0));
        assert_eq!(next.fighter_b.position, Position::new(9.0, 0.0));
        assert_eq!(next.fighter_b.stats.final_position, Position::new(9.0, 0.0));
        assert_eq!(next.last_event, None);
    }

    #[test]
    fn input_state_is_untouched() {
        let state = duel_at(1.0);
        let before = state.clone();
        let _ = CombatSystem::resolve(&state, Action::Attack, Action::Attack);
        assert_eq!(state, before);
    }

    #[test]
    fn tick_counter_and_last_action_advance() {
        let next = CombatSystem::resolve(&duel_at(5.0), Action::Retreat, Action::Idle);
        assert_eq!(next.tick, 1);
        assert_eq!(next.fighter_a.last_action, Action::Retreat);
        assert_eq!(next.fighter_b.last_action, Action::Idle);
    }
}
