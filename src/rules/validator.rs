//! Semantic checks on a parsed strategy

use std::fmt;

use crate::game::Action;

use super::ast::{ActionToken, Condition, Field, Strategy};

pub const MAX_RULES: usize = 10;
pub const MAX_CONDITIONS_PER_RULE: usize = 5;
pub const MAX_NAME_LEN: usize = 50;

/// Where a problem sits: a rule (1-based), optionally one of its conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub rule: usize,
    pub rule_name: String,
    pub condition: Option<usize>,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rule {} (\"{}\")", self.rule, self.rule_name)?;
        if let Some(condition) = self.condition {
            write!(f, ", condition {condition}")?;
        }
        Ok(())
    }
}

/// Problems that reject a strategy
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Strategy name cannot be empty")]
    EmptyName,

    #[error("Invalid strategy name \"{0}\": must contain only letters, numbers, and underscores")]
    InvalidName(String),

    #[error("Too many rules: {count} (maximum is {})", MAX_RULES)]
    TooManyRules { count: usize },

    #[error("{at}: Rule name cannot be empty")]
    EmptyRuleName { at: Location },

    #[error("{at}: Must have at least one condition")]
    NoConditions { at: Location },

    #[error("{at}: Too many conditions: {count} (maximum is {})", MAX_CONDITIONS_PER_RULE)]
    TooManyConditions { at: Location, count: usize },

    #[error("{at}: Logical operator count mismatch (expected {expected}, got {found})")]
    OperatorMismatch {
        at: Location,
        expected: usize,
        found: usize,
    },

    #[error("{at}: Invalid field \"{field}\" (valid fields: {})", valid_fields())]
    UnknownField { at: Location, field: String },

    #[error("{at}: Value must be finite")]
    NonFiniteValue { at: Location },

    #[error("{context}: Invalid action \"{action}\" (valid actions: {})", valid_actions())]
    UnknownAction { context: String, action: String },
}

/// Advisory findings that never block acceptance
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    LongName { name: String, len: usize },
    NoRules,
    OutOfRange {
        at: Location,
        field: Field,
        value: f64,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LongName { name, len } => {
                write!(f, "Strategy name \"{name}\" is very long ({len} characters)")
            }
            Self::NoRules => write!(f, "Strategy has no rules, will always use DEFAULT action"),
            Self::OutOfRange { at, field, value } => {
                let (label, max) = match field {
                    Field::SelfHealth | Field::EnemyHealth => ("Health", 100.0),
                    Field::SelfAttackCooldown | Field::EnemyAttackCooldown => ("Attack cooldown", 3.0),
                    _ => ("Distance", 10.0),
                };
                if *value < 0.0 {
                    write!(f, "{at}: {label} cannot be negative")
                } else {
                    write!(f, "{at}: {label} value {value} exceeds typical maximum of {max}")
                }
            }
        }
    }
}

/// Validation verdict
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

/// Check a parsed strategy against the language's limits
pub fn validate(strategy: &Strategy) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_name(&strategy.name, &mut report);

    if strategy.rules.is_empty() {
        report.warnings.push(ValidationWarning::NoRules);
    }
    if strategy.rules.len() > MAX_RULES {
        report.errors.push(ValidationError::TooManyRules {
            count: strategy.rules.len(),
        });
    }

    for (index, rule) in strategy.rules.iter().enumerate() {
        let at = Location {
            rule: index + 1,
            rule_name: rule.name.clone(),
            condition: None,
        };

        if rule.name.trim().is_empty() {
            report
                .errors
                .push(ValidationError::EmptyRuleName { at: at.clone() });
        }

        let count = rule.group.conditions.len();
        if count == 0 {
            report.errors.push(ValidationError::NoConditions { at: at.clone() });
        } else {
            if count > MAX_CONDITIONS_PER_RULE {
                report.errors.push(ValidationError::TooManyConditions {
                    at: at.clone(),
                    count,
                });
            }

            for (cond_index, condition) in rule.group.conditions.iter().enumerate() {
                let at = Location {
                    condition: Some(cond_index + 1),
                    ..at.clone()
                };
                check_condition(condition, at, &mut report);
            }

            if rule.group.operators.len() != count - 1 {
                report.errors.push(ValidationError::OperatorMismatch {
                    at: at.clone(),
                    expected: count - 1,
                    found: rule.group.operators.len(),
                });
            }
        }

        check_action(&rule.action, at.to_string(), &mut report);
    }

    check_action(&strategy.default_action, "DEFAULT".to_string(), &mut report);

    report
}

fn check_name(name: &str, report: &mut ValidationReport) {
    if name.trim().is_empty() {
        report.errors.push(ValidationError::EmptyName);
        return;
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        report
            .errors
            .push(ValidationError::InvalidName(name.to_string()));
    }

    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        report.warnings.push(ValidationWarning::LongName {
            name: name.to_string(),
            len,
        });
    }
}

fn check_condition(condition: &Condition, at: Location, report: &mut ValidationReport) {
    if let Field::Unknown(field) = &condition.field {
        report.errors.push(ValidationError::UnknownField {
            at: at.clone(),
            field: field.clone(),
        });
    }

    if !condition.value.is_finite() {
        report.errors.push(ValidationError::NonFiniteValue { at });
        return;
    }

    let max = match condition.field {
        Field::SelfHealth | Field::EnemyHealth => 100.0,
        Field::SelfAttackCooldown | Field::EnemyAttackCooldown => 3.0,
        Field::Distance => 10.0,
        Field::Unknown(_) => return,
    };
    if condition.value < 0.0 || condition.value > max {
        report.warnings.push(ValidationWarning::OutOfRange {
            at,
            field: condition.field.clone(),
            value: condition.value,
        });
    }
}

fn check_action(action: &ActionToken, context: String, report: &mut ValidationReport) {
    if let ActionToken::Unknown(word) = action {
        report.errors.push(ValidationError::UnknownAction {
            context,
            action: word.clone(),
        });
    }
}

fn valid_fields() -> String {
    Field::KNOWN
        .iter()
        .map(Field::name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn valid_actions() -> String {
    Action::ALL
        .iter()
        .map(|action| action.keyword())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ast::{Comparison, ConditionGroup, Logic, Rule};

    fn rule(name: &str, conditions: Vec<Condition>, action: ActionToken) -> Rule {
        let mut group = ConditionGroup::default();
        for condition in conditions {
            group.push(Logic::And, condition);
        }
        Rule {
            name: name.into(),
            group,
            action,
        }
    }

    fn close_range() -> Condition {
        Condition::new(Field::Distance, Comparison::Lt, 2.0)
    }

    fn strategy(rules: Vec<Rule>) -> Strategy {
        Strategy {
            name: "Valid_Name1".into(),
            rules,
            default_action: Action::Idle.into(),
        }
    }

    #[test]
    fn accepts_well_formed_strategy() {
        let report = validate(&strategy(vec![rule(
            "close",
            vec![close_range()],
            Action::Attack.into(),
        )]));
        assert!(report.is_valid());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn rejects_bad_names() {
        let mut s = strategy(vec![]);
        s.name = "has space".into();
        let report = validate(&s);
        assert_eq!(report.errors, vec![ValidationError::InvalidName("has space".into())]);

        s.name = "   ".into();
        assert_eq!(validate(&s).errors, vec![ValidationError::EmptyName]);
    }

    #[test]
    fn warns_on_long_name_and_no_rules() {
        let mut s = strategy(vec![]);
        s.name = "x".repeat(51);
        let report = validate(&s);
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 2);
        assert!(report.warnings.contains(&ValidationWarning::NoRules));
    }

    #[test]
    fn limits_rule_and_condition_counts() {
        let rules = (0..11)
            .map(|i| rule(&format!("r{i}"), vec![close_range()], Action::Attack.into()))
            .collect();
        let report = validate(&strategy(rules));
        assert_eq!(report.errors, vec![ValidationError::TooManyRules { count: 11 }]);

        let report = validate(&strategy(vec![rule(
            "many",
            vec![close_range(); 6],
            Action::Attack.into(),
        )]));
        assert!(matches!(
            report.errors[0],
            ValidationError::TooManyConditions { count: 6, .. }
        ));
    }

    #[test]
    fn five_conditions_are_allowed() {
        let report = validate(&strategy(vec![rule(
            "five",
            vec![close_range(); 5],
            Action::Attack.into(),
        )]));
        assert!(report.is_valid());
    }

    #[test]
    fn rejects_empty_group_and_operator_mismatch() {
        let report = validate(&strategy(vec![rule("none", vec![], Action::Attack.into())]));
        assert!(matches!(report.errors[0], ValidationError::NoConditions { .. }));

        let mut bad = rule("mismatch", vec![close_range(), close_range()], Action::Attack.into());
        bad.group.operators.push(Logic::Or);
        let report = validate(&strategy(vec![bad]));
        assert!(matches!(
            report.errors[0],
            ValidationError::OperatorMismatch {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unknown_words_and_non_finite_values() {
        let mut s = strategy(vec![rule(
            "weird",
            vec![
                Condition::new(Field::Unknown("self.mana".into()), Comparison::Gt, 1.0),
                Condition::new(Field::Distance, Comparison::Lt, f64::NAN),
                Condition::new(Field::Distance, Comparison::Lt, f64::INFINITY),
            ],
            ActionToken::Unknown("FIREBALL".into()),
        )]);
        s.default_action = ActionToken::Unknown("DANCE".into());

        let messages = validate(&s).error_messages();
        assert_eq!(messages.len(), 5);
        assert!(messages[0].starts_with("Rule 1 (\"weird\"), condition 1: Invalid field \"self.mana\""));
        assert_eq!(messages[1], "Rule 1 (\"weird\"), condition 2: Value must be finite");
        assert!(messages[3].contains("Invalid action \"FIREBALL\""));
        assert!(messages[4].starts_with("DEFAULT: Invalid action \"DANCE\""));
    }

    #[test]
    fn warns_on_out_of_range_values() {
        let report = validate(&strategy(vec![rule(
            "ranges",
            vec![
                Condition::new(Field::EnemyHealth, Comparison::Lt, 150.0),
                Condition::new(Field::SelfAttackCooldown, Comparison::Gt, 4.0),
                Condition::new(Field::Distance, Comparison::Gt, 12.0),
                Condition::new(Field::SelfHealth, Comparison::Lt, 100.0),
            ],
            Action::Block.into(),
        )]));
        assert!(report.is_valid());
        let warnings = report.warning_messages();
        assert_eq!(warnings.len(), 3);
        assert_eq!(
            warnings[0],
            "Rule 1 (\"ranges\"), condition 1: Health value 150 exceeds typical maximum of 100"
        );
    }
}
