//! Rule language: STRATEGY / RULE / WHEN / DO / DEFAULT
//!
//! ```text
//! STRATEGY Brawler {
//!     RULE "finish them" {
//!         WHEN enemy.health < 30 AND distance <= 2
//!         DO ATTACK
//!     }
//!     DEFAULT APPROACH
//! }
//! ```

pub mod ast;
pub mod executor;
pub mod lexer;
pub mod parser;
pub mod validator;

pub use ast::{ActionToken, Comparison, Condition, ConditionGroup, Field, Logic, Rule, Strategy};
pub use executor::{Context, RuleExecutor};
pub use parser::{parse, ParseError};
pub use validator::{validate, ValidationError, ValidationReport, ValidationWarning};

use crate::game::Action;

/// An accepted strategy plus any advisory warnings
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub strategy: Strategy,
    pub warnings: Vec<String>,
}

/// Parse then validate; errors are human-readable messages
pub fn compile(source: &str) -> Result<Compiled, Vec<String>> {
    let strategy = parse(source)
        .map_err(|errors| errors.iter().map(ToString::to_string).collect::<Vec<_>>())?;

    let report = validate(&strategy);
    if !report.is_valid() {
        return Err(report.error_messages());
    }

    Ok(Compiled {
        warnings: report.warning_messages(),
        strategy,
    })
}

/// Strategy for a fighter that entered battle without an accepted submission
pub fn fallback_strategy() -> Strategy {
    let rule = |name: &str, field, comparison, value, action: Action| Rule {
        name: name.to_string(),
        group: ConditionGroup::single(Condition::new(field, comparison, value)),
        action: action.into(),
    };

    Strategy {
        name: "Fallback".to_string(),
        rules: vec![
            rule("Block if low health", Field::SelfHealth, Comparison::Lt, 20.0, Action::Block),
            rule("Attack if in range", Field::Distance, Comparison::Lt, 2.5, Action::Attack),
            rule("Approach if far away", Field::Distance, Comparison::Gt, 3.0, Action::Approach),
        ],
        default_action: Action::Idle.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_returns_warnings_with_strategy() {
        let compiled = compile(
            r#"STRATEGY Cautious {
                RULE "far" { WHEN distance > 20 DO APPROACH }
                DEFAULT BLOCK
            }"#,
        )
        .unwrap();
        assert_eq!(compiled.strategy.name, "Cautious");
        assert_eq!(compiled.warnings.len(), 1);
    }

    #[test]
    fn compile_reports_semantic_errors() {
        let errors = compile("STRATEGY X { RULE \"r\" { WHEN self.mana > 1 DO ATTACK } DEFAULT IDLE }")
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Invalid field \"self.mana\""));
    }

    #[test]
    fn fallback_is_valid_and_behaves() {
        let strategy = fallback_strategy();
        assert!(validate(&strategy).is_valid());

        let at = |self_health, distance| Context {
            self_health,
            distance,
            ..Context::default()
        };
        assert_eq!(RuleExecutor::decide(&strategy, &at(10.0, 1.0)), Action::Block);
        assert_eq!(RuleExecutor::decide(&strategy, &at(80.0, 2.0)), Action::Attack);
        assert_eq!(RuleExecutor::decide(&strategy, &at(80.0, 10.0)), Action::Approach);
        assert_eq!(RuleExecutor::decide(&strategy, &at(80.0, 3.0)), Action::Idle);
    }

    #[test]
    fn fallback_round_trips_through_text() {
        let strategy = fallback_strategy();
        let reparsed = parse(&strategy.to_string()).unwrap();
        assert_eq!(reparsed, strategy);
    }
}
