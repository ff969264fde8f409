//! Strategy syntax tree and canonical rendering
//!
//! A parsed strategy keeps unknown field names and action words as written,
//! so validation can report them with context. `Display` renders the
//! canonical text form, which parses back to an identical tree.

use std::fmt;

use crate::game::Action;

/// Value a condition reads from the execution context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    SelfHealth,
    SelfAttackCooldown,
    EnemyHealth,
    EnemyAttackCooldown,
    Distance,
    /// Anything else written in field position
    Unknown(String),
}

impl Field {
    pub const KNOWN: [Field; 5] = [
        Field::EnemyHealth,
        Field::EnemyAttackCooldown,
        Field::SelfHealth,
        Field::SelfAttackCooldown,
        Field::Distance,
    ];

    pub fn from_name(name: &str) -> Self {
        match name {
            "self.health" => Self::SelfHealth,
            "self.attackCooldown" => Self::SelfAttackCooldown,
            "enemy.health" => Self::EnemyHealth,
            "enemy.attackCooldown" => Self::EnemyAttackCooldown,
            "distance" => Self::Distance,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::SelfHealth => "self.health",
            Self::SelfAttackCooldown => "self.attackCooldown",
            Self::EnemyHealth => "enemy.health",
            Self::EnemyAttackCooldown => "enemy.attackCooldown",
            Self::Distance => "distance",
            Self::Unknown(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    pub const ALL: [Comparison; 6] = [
        Comparison::Lt,
        Comparison::Gt,
        Comparison::Le,
        Comparison::Ge,
        Comparison::Eq,
        Comparison::Ne,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmp| cmp.symbol() == symbol)
    }

    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt => lhs < rhs,
            Self::Gt => lhs > rhs,
            Self::Le => lhs <= rhs,
            Self::Ge => lhs >= rhs,
            Self::Eq => lhs == rhs,
            Self::Ne => lhs != rhs,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Logical connective between two conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Logic {
    And,
    Or,
}

impl Logic {
    pub fn keyword(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }

    pub fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            _ => None,
        }
    }

    pub fn apply(self, lhs: bool, rhs: bool) -> bool {
        match self {
            Self::And => lhs && rhs,
            Self::Or => lhs || rhs,
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// `field comparison value`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: Field,
    pub comparison: Comparison,
    pub value: f64,
}

impl Condition {
    pub fn new(field: Field, comparison: Comparison, value: f64) -> Self {
        Self {
            field,
            comparison,
            value,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.field, self.comparison, self.value)
    }
}

/// Conditions joined left to right; `operators[i]` sits between
/// `conditions[i]` and `conditions[i + 1]`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionGroup {
    pub conditions: Vec<Condition>,
    pub operators: Vec<Logic>,
}

impl ConditionGroup {
    pub fn single(condition: Condition) -> Self {
        Self {
            conditions: vec![condition],
            operators: Vec::new(),
        }
    }

    /// Append `condition`, joined to the group by `logic`
    pub fn push(&mut self, logic: Logic, condition: Condition) {
        if !self.conditions.is_empty() {
            self.operators.push(logic);
        }
        self.conditions.push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

impl fmt::Display for ConditionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                let logic = self.operators.get(i - 1).copied().unwrap_or(Logic::And);
                write!(f, " {logic} ")?;
            }
            write!(f, "{condition}")?;
        }
        Ok(())
    }
}

/// Action word as written after `DO` or `DEFAULT`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionToken {
    Known(Action),
    Unknown(String),
}

impl ActionToken {
    pub fn from_word(word: &str) -> Self {
        Action::from_keyword(word)
            .map(Self::Known)
            .unwrap_or_else(|| Self::Unknown(word.to_string()))
    }

    /// Action to perform; unknown words do nothing
    pub fn resolve(&self) -> Action {
        match self {
            Self::Known(action) => *action,
            Self::Unknown(_) => Action::Idle,
        }
    }
}

impl From<Action> for ActionToken {
    fn from(action: Action) -> Self {
        Self::Known(action)
    }
}

impl fmt::Display for ActionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(action) => write!(f, "{action}"),
            Self::Unknown(word) => f.write_str(word),
        }
    }
}

/// A guarded action
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub name: String,
    pub group: ConditionGroup,
    pub action: ActionToken,
}

/// A named, priority-ordered list of rules plus a default action
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub rules: Vec<Rule>,
    pub default_action: ActionToken,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "STRATEGY {} {{", self.name)?;
        for rule in &self.rules {
            writeln!(f, "    RULE \"{}\" {{", rule.name)?;
            writeln!(f, "        WHEN {}", rule.group)?;
            writeln!(f, "        DO {}", rule.action)?;
            writeln!(f, "    }}")?;
        }
        writeln!(f, "    DEFAULT {}", self.default_action)?;
        write!(f, "}}")
    }
}
