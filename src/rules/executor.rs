//! Strategy evaluation

use crate::game::Action;

use super::ast::{Condition, ConditionGroup, Field, Strategy};

/// Values a strategy can read, from one fighter's point of view
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Context {
    pub self_health: f64,
    pub self_attack_cooldown: f64,
    pub enemy_health: f64,
    pub enemy_attack_cooldown: f64,
    pub distance: f64,
}

impl Context {
    /// Unknown fields read as 0
    pub fn read(&self, field: &Field) -> f64 {
        match field {
            Field::SelfHealth => self.self_health,
            Field::SelfAttackCooldown => self.self_attack_cooldown,
            Field::EnemyHealth => self.enemy_health,
            Field::EnemyAttackCooldown => self.enemy_attack_cooldown,
            Field::Distance => self.distance,
            Field::Unknown(_) => 0.0,
        }
    }
}

/// Pure strategy evaluation
pub struct RuleExecutor;

impl RuleExecutor {
    /// Action of the first rule whose conditions hold, else the default
    pub fn decide(strategy: &Strategy, context: &Context) -> Action {
        strategy
            .rules
            .iter()
            .find(|rule| Self::evaluate_group(&rule.group, context))
            .map(|rule| rule.action.resolve())
            .unwrap_or_else(|| strategy.default_action.resolve())
    }

    /// Index of the rule that would fire
    pub fn matching_rule(strategy: &Strategy, context: &Context) -> Option<usize> {
        strategy
            .rules
            .iter()
            .position(|rule| Self::evaluate_group(&rule.group, context))
    }

    /// Fold conditions left to right with no operator precedence
    pub fn evaluate_group(group: &ConditionGroup, context: &Context) -> bool {
        let Some((first, rest)) = group.conditions.split_first() else {
            return false;
        };

        rest.iter()
            .zip(&group.operators)
            .fold(Self::evaluate_condition(first, context), |acc, (condition, logic)| {
                logic.apply(acc, Self::evaluate_condition(condition, context))
            })
    }

    pub fn evaluate_condition(condition: &Condition, context: &Context) -> bool {
        condition
            .comparison
            .apply(context.read(&condition.field), condition.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ast::{ActionToken, Comparison, Logic, Rule};

    fn context(self_health: f64, distance: f64) -> Context {
        Context {
            self_health,
            self_attack_cooldown: 0.0,
            enemy_health: 100.0,
            enemy_attack_cooldown: 0.0,
            distance,
        }
    }

    fn group(parts: &[(Field, Comparison, f64)], operators: Vec<Logic>) -> ConditionGroup {
        ConditionGroup {
            conditions: parts
                .iter()
                .map(|(field, cmp, value)| Condition::new(field.clone(), *cmp, *value))
                .collect(),
            operators,
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        let strategy = Strategy {
            name: "Priority".into(),
            rules: vec![
                Rule {
                    name: "guard".into(),
                    group: group(&[(Field::SelfHealth, Comparison::Lt, 50.0)], vec![]),
                    action: Action::Block.into(),
                },
                Rule {
                    name: "hit".into(),
                    group: group(&[(Field::Distance, Comparison::Le, 2.0)], vec![]),
                    action: Action::Attack.into(),
                },
            ],
            default_action: Action::Approach.into(),
        };

        assert_eq!(RuleExecutor::decide(&strategy, &context(40.0, 1.0)), Action::Block);
        assert_eq!(RuleExecutor::decide(&strategy, &context(90.0, 1.0)), Action::Attack);
        assert_eq!(RuleExecutor::decide(&strategy, &context(90.0, 5.0)), Action::Approach);
        assert_eq!(RuleExecutor::matching_rule(&strategy, &context(90.0, 5.0)), None);
    }

    #[test]
    fn operators_fold_without_precedence() {
        // (true OR false) AND false is false; with AND binding tighter it would be true
        let g = group(
            &[
                (Field::Distance, Comparison::Lt, 5.0),
                (Field::Distance, Comparison::Gt, 5.0),
                (Field::SelfHealth, Comparison::Gt, 100.0),
            ],
            vec![Logic::Or, Logic::And],
        );
        assert!(!RuleExecutor::evaluate_group(&g, &context(50.0, 1.0)));
    }

    #[test]
    fn empty_group_is_false() {
        assert!(!RuleExecutor::evaluate_group(&ConditionGroup::default(), &Context::default()));
    }

    #[test]
    fn unknown_field_reads_zero() {
        let g = group(&[(Field::Unknown("mana".into()), Comparison::Eq, 0.0)], vec![]);
        assert!(RuleExecutor::evaluate_group(&g, &Context::default()));
    }

    #[test]
    fn unknown_action_decides_idle() {
        let strategy = Strategy {
            name: "Odd".into(),
            rules: vec![],
            default_action: ActionToken::Unknown("DANCE".into()),
        };
        assert_eq!(RuleExecutor::decide(&strategy, &Context::default()), Action::Idle);
    }
}
