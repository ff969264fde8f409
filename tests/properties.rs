//! Property-based tests for the rule language and the combat simulator.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use uuid::Uuid;

use fighter_arena::config::MatchConfig;
use fighter_arena::game::combat::{CombatState, CombatSystem};
use fighter_arena::game::{Action, MatchController, Position};
use fighter_arena::protocol::{FinishReason, Language, MatchEvent, Outcome};
use fighter_arena::rules::{
    self, parse, validate, Comparison, Condition, ConditionGroup, Context, Field, Logic, Rule, RuleExecutor,
};

fn arb_action() -> impl Strategy<Value = Action> {
    prop::sample::select(Action::ALL.to_vec())
}

fn arb_comparison() -> impl Strategy<Value = Comparison> {
    prop::sample::select(Comparison::ALL.to_vec())
}

fn arb_logic() -> impl Strategy<Value = Logic> {
    prop::sample::select(vec![Logic::And, Logic::Or])
}

/// Quarter steps render and re-parse exactly
fn arb_value() -> impl Strategy<Value = f64> {
    (0u32..4000).prop_map(|n| f64::from(n) / 4.0)
}

fn arb_condition() -> impl Strategy<Value = Condition> {
    (prop::sample::select(Field::KNOWN.to_vec()), arb_comparison(), arb_value())
        .prop_map(|(field, comparison, value)| Condition::new(field, comparison, value))
}

fn arb_group() -> impl Strategy<Value = ConditionGroup> {
    (arb_condition(), prop::collection::vec((arb_logic(), arb_condition()), 0..4)).prop_map(|(first, rest)| {
        let mut group = ConditionGroup::single(first);
        for (logic, condition) in rest {
            group.push(logic, condition);
        }
        group
    })
}

fn arb_rule() -> impl Strategy<Value = Rule> {
    ("[a-z][a-z0-9_]{0,10}", arb_group(), arb_action()).prop_map(|(name, group, action)| Rule {
        name,
        group,
        action: action.into(),
    })
}

fn arb_strategy() -> impl Strategy<Value = rules::Strategy> {
    ("S[a-z0-9]{0,8}", prop::collection::vec(arb_rule(), 0..6), arb_action()).prop_map(
        |(name, rules, default_action)| rules::Strategy {
            name,
            rules,
            default_action: default_action.into(),
        },
    )
}

fn arb_context() -> impl Strategy<Value = Context> {
    (0.0..=100.0f64, 0u32..=3, 0.0..=100.0f64, 0u32..=3, 0.0..=20.0f64).prop_map(
        |(self_health, self_cd, enemy_health, enemy_cd, distance)| Context {
            self_health,
            self_attack_cooldown: f64::from(self_cd),
            enemy_health,
            enemy_attack_cooldown: f64::from(enemy_cd),
            distance,
        },
    )
}

fn arb_combat() -> impl Strategy<Value = CombatState> {
    (
        (-20i32..20, -20i32..20, -20i32..20, -20i32..20),
        (1u32..=100, 1u32..=100),
        (0u32..=3, 0u32..=3),
    )
        .prop_map(|((ax, ay, bx, by), (ha, hb), (ca, cb))| {
            let mut state = CombatState::new(Uuid::nil(), Uuid::from_u128(1));
            state.fighter_a.position = Position::new(f64::from(ax), f64::from(ay));
            state.fighter_b.position = Position::new(f64::from(bx), f64::from(by));
            state.fighter_a.health = f64::from(ha);
            state.fighter_b.health = f64::from(hb);
            state.fighter_a.attack_cooldown = ca;
            state.fighter_b.attack_cooldown = cb;
            state
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// No rules means the default action, whatever the context.
    #[test]
    fn prop_empty_strategy_uses_default(default in arb_action(), context in arb_context()) {
        let strategy = rules::Strategy {
            name: "Empty".into(),
            rules: Vec::new(),
            default_action: default.into(),
        };
        prop_assert_eq!(RuleExecutor::decide(&strategy, &context), default);
    }

    /// The first rule whose group holds decides, never a later one.
    #[test]
    fn prop_first_matching_rule_wins(strategy in arb_strategy(), context in arb_context()) {
        let expected = strategy
            .rules
            .iter()
            .find(|rule| RuleExecutor::evaluate_group(&rule.group, &context))
            .map(|rule| rule.action.resolve())
            .unwrap_or_else(|| strategy.default_action.resolve());

        prop_assert_eq!(RuleExecutor::decide(&strategy, &context), expected);
        if let Some(index) = RuleExecutor::matching_rule(&strategy, &context) {
            for earlier in &strategy.rules[..index] {
                prop_assert!(!RuleExecutor::evaluate_group(&earlier.group, &context));
            }
        }
    }

    /// AND/OR of two conditions follow their truth tables for every operator.
    #[test]
    fn prop_two_condition_truth_tables(
        left in arb_comparison(),
        right in arb_comparison(),
        threshold_a in arb_value(),
        threshold_b in arb_value(),
        context in arb_context(),
    ) {
        let a = Condition::new(Field::SelfHealth, left, threshold_a);
        let b = Condition::new(Field::Distance, right, threshold_b);
        let a_holds = RuleExecutor::evaluate_condition(&a, &context);
        let b_holds = RuleExecutor::evaluate_condition(&b, &context);

        let mut and = ConditionGroup::single(a.clone());
        and.push(Logic::And, b.clone());
        let mut or = ConditionGroup::single(a);
        or.push(Logic::Or, b);

        prop_assert_eq!(RuleExecutor::evaluate_group(&and, &context), a_holds && b_holds);
        prop_assert_eq!(RuleExecutor::evaluate_group(&or, &context), a_holds || b_holds);
    }

    /// Comparisons agree with the host operators, including at the boundary.
    #[test]
    fn prop_comparisons_match_operators(x in arb_value(), y in arb_value(), equal in any::<bool>()) {
        let y = if equal { x } else { y };
        prop_assert_eq!(Comparison::Lt.apply(x, y), x < y);
        prop_assert_eq!(Comparison::Gt.apply(x, y), x > y);
        prop_assert_eq!(Comparison::Le.apply(x, y), x <= y);
        prop_assert_eq!(Comparison::Ge.apply(x, y), x >= y);
        prop_assert_eq!(Comparison::Eq.apply(x, y), x == y);
        prop_assert_eq!(Comparison::Ne.apply(x, y), x != y);
    }

    /// Rendered text parses back to the same tree with the same verdict.
    #[test]
    fn prop_render_parse_round_trip(strategy in arb_strategy()) {
        let text = strategy.to_string();
        let first = parse(&text).unwrap();
        let second = parse(&first.to_string()).unwrap();

        prop_assert_eq!(&first, &strategy);
        prop_assert_eq!(&second, &first);
        prop_assert_eq!(validate(&first), validate(&second));
        prop_assert!(validate(&first).is_valid());
    }

    /// Resolving the same inputs twice gives identical results.
    #[test]
    fn prop_resolve_is_deterministic(state in arb_combat(), a in arb_action(), b in arb_action()) {
        let first = CombatSystem::resolve(&state, a, b);
        let second = CombatSystem::resolve(&state, a, b);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(first.tick, state.tick + 1);
    }

    /// Health never rises and cooldowns stay within the fixed range.
    #[test]
    fn prop_resolve_bounds(state in arb_combat(), a in arb_action(), b in arb_action()) {
        let next = CombatSystem::resolve(&state, a, b);
        prop_assert!(next.fighter_a.health <= state.fighter_a.health);
        prop_assert!(next.fighter_b.health <= state.fighter_b.health);
        prop_assert!(next.fighter_a.attack_cooldown <= 3);
        prop_assert!(next.fighter_b.attack_cooldown <= 3);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Any pair of strategies ends in exactly one consistent finish.
    #[test]
    fn prop_matches_finish_once(a in arb_strategy(), b in arb_strategy()) {
        let (pa, pb) = (Uuid::new_v4(), Uuid::new_v4());
        let config = MatchConfig {
            max_ticks: 300,
            ..MatchConfig::default()
        };
        let mut controller = MatchController::new(Uuid::new_v4(), pa, pb, config);
        prop_assert!(controller.submit_strategy(pa, Language::Rules, &a.to_string()).unwrap().accepted);
        prop_assert!(controller.submit_strategy(pb, Language::Rules, &b.to_string()).unwrap().accepted);

        let results = controller.run_to_completion().unwrap();
        let finished = controller
            .drain_events()
            .iter()
            .filter(|event| matches!(event, MatchEvent::Finished(_)))
            .count();
        prop_assert_eq!(finished, 1);
        prop_assert!(results.ticks <= 300);

        match (results.reason, results.outcome) {
            (FinishReason::Knockout, Outcome::A) => {
                prop_assert!(results.final_health_a > 0.0);
                prop_assert_eq!(results.final_health_b, 0.0);
                prop_assert_eq!(results.winner, Some(pa));
            }
            (FinishReason::Knockout, Outcome::B) => {
                prop_assert!(results.final_health_b > 0.0);
                prop_assert_eq!(results.final_health_a, 0.0);
                prop_assert_eq!(results.winner, Some(pb));
            }
            (FinishReason::Knockout, Outcome::Draw) => {
                prop_assert_eq!(results.final_health_a, 0.0);
                prop_assert_eq!(results.final_health_b, 0.0);
                prop_assert_eq!(results.winner, None);
            }
            (FinishReason::TickLimit, outcome) => {
                prop_assert_eq!(outcome, Outcome::Draw);
                prop_assert_eq!(results.ticks, 300);
            }
            (reason, _) => prop_assert!(false, "unexpected finish reason {:?}", reason),
        }
    }
}
