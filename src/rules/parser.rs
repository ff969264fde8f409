//! Recursive-descent parser for strategy text
//!
//! Errors accumulate. A broken rule is reported and skipped, and parsing
//! resumes after its closing brace (or at the next `RULE`/`DEFAULT`).

use super::ast::{ActionToken, Condition, ConditionGroup, Field, Logic, Rule, Strategy};
use super::lexer::{tokenize, Token, TokenKind};

const KEYWORDS: [&str; 7] = ["STRATEGY", "RULE", "WHEN", "DO", "DEFAULT", "AND", "OR"];

/// Structural problems in strategy text
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Missing STRATEGY declaration")]
    MissingStrategy { line: usize },

    #[error("Missing DEFAULT action")]
    MissingDefault { line: usize },

    #[error("line {line}: DEFAULT must be followed by an action")]
    MissingDefaultAction { line: usize },

    #[error("line {line}: invalid condition syntax in rule \"{rule}\": \"{found}\"")]
    InvalidCondition {
        line: usize,
        rule: String,
        found: String,
    },

    #[error("line {line}: error parsing rule \"{rule}\": {reason}")]
    MalformedRule {
        line: usize,
        rule: String,
        reason: String,
    },

    #[error("line {line}: unexpected token \"{found}\"")]
    UnexpectedToken { line: usize, found: String },

    #[error("line {line}: DEFAULT declared more than once")]
    DuplicateDefault { line: usize },

    #[error("line {line}: STRATEGY block is not closed")]
    UnclosedStrategy { line: usize },
}

impl ParseError {
    /// 1-based source line the error points at
    pub fn line(&self) -> usize {
        match self {
            Self::MissingStrategy { line }
            | Self::MissingDefault { line }
            | Self::MissingDefaultAction { line }
            | Self::InvalidCondition { line, .. }
            | Self::MalformedRule { line, .. }
            | Self::UnexpectedToken { line, .. }
            | Self::DuplicateDefault { line }
            | Self::UnclosedStrategy { line } => *line,
        }
    }
}

/// Parse strategy text into a syntax tree
pub fn parse(source: &str) -> Result<Strategy, Vec<ParseError>> {
    Parser::new(tokenize(source)).parse_strategy()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|token| token.kind.clone())
    }

    fn peek_is_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|token| token.is_word(word))
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Line of the next token, or of the last one at end of input
    fn line(&self) -> usize {
        self.peek()
            .or_else(|| self.tokens.last())
            .map(|token| token.line)
            .unwrap_or(1)
    }

    /// True where a rule body has clearly ended without being closed
    fn at_rule_boundary(&self) -> bool {
        match self.peek() {
            None => true,
            Some(token) => {
                token.kind == TokenKind::RBrace || token.is_word("RULE") || token.is_word("DEFAULT")
            }
        }
    }

    fn parse_strategy(mut self) -> Result<Strategy, Vec<ParseError>> {
        let name = match (self.tokens.first(), self.tokens.get(1), self.tokens.get(2)) {
            (Some(keyword), Some(name), Some(open))
                if keyword.is_word("STRATEGY") && open.kind == TokenKind::LBrace =>
            {
                match &name.kind {
                    TokenKind::Word(name) if !is_keyword(name) => name.clone(),
                    _ => return Err(vec![ParseError::MissingStrategy { line: keyword.line }]),
                }
            }
            _ => return Err(vec![ParseError::MissingStrategy { line: self.line() }]),
        };
        self.pos = 3;

        let mut rules = Vec::new();
        let mut default_action: Option<ActionToken> = None;
        let mut closed = false;

        while let Some(token) = self.advance() {
            match &token.kind {
                TokenKind::RBrace => {
                    closed = true;
                    break;
                }
                TokenKind::Word(word) if word == "RULE" => match self.parse_rule() {
                    Ok(rule) => rules.push(rule),
                    Err(err) => {
                        self.errors.push(err);
                        self.recover_rule();
                    }
                },
                TokenKind::Word(word) if word == "DEFAULT" => match self.peek_kind() {
                    Some(TokenKind::Word(action)) if !is_keyword(&action) => {
                        self.pos += 1;
                        if default_action.is_some() {
                            self.errors
                                .push(ParseError::DuplicateDefault { line: token.line });
                        } else {
                            default_action = Some(ActionToken::from_word(&action));
                        }
                    }
                    _ => self
                        .errors
                        .push(ParseError::MissingDefaultAction { line: token.line }),
                },
                _ => self.errors.push(ParseError::UnexpectedToken {
                    line: token.line,
                    found: token.text.clone(),
                }),
            }
        }

        if !closed {
            self.errors.push(ParseError::UnclosedStrategy { line: self.line() });
        } else if let Some(extra) = self.peek() {
            self.errors.push(ParseError::UnexpectedToken {
                line: extra.line,
                found: extra.text.clone(),
            });
        }

        match default_action {
            Some(default_action) if self.errors.is_empty() => Ok(Strategy {
                name,
                rules,
                default_action,
            }),
            Some(_) => Err(self.errors),
            None => {
                let line = self.line();
                self.errors.push(ParseError::MissingDefault { line });
                Err(self.errors)
            }
        }
    }

    /// Parse a rule; the `RULE` keyword has been consumed
    fn parse_rule(&mut self) -> Result<Rule, ParseError> {
        let name = match self.peek_kind() {
            Some(TokenKind::Str(name)) => {
                self.pos += 1;
                name
            }
            _ => return Err(self.malformed("", "expected a quoted rule name")),
        };

        if self.peek_kind() != Some(TokenKind::LBrace) {
            return Err(self.malformed(&name, "expected '{' after rule name"));
        }
        self.pos += 1;

        if !self.peek_is_word("WHEN") {
            return Err(self.malformed(&name, "missing WHEN clause"));
        }
        self.pos += 1;

        let group = self.parse_group(&name)?;
        // parse_group stops on DO
        self.pos += 1;

        let action = match self.peek_kind() {
            Some(TokenKind::Word(word)) if !is_keyword(&word) => {
                self.pos += 1;
                ActionToken::from_word(&word)
            }
            _ => return Err(self.malformed(&name, "missing action after DO")),
        };

        if self.peek_kind() == Some(TokenKind::RBrace) {
            self.pos += 1;
            return Ok(Rule {
                name,
                group,
                action,
            });
        }
        if self.at_rule_boundary() {
            return Err(self.malformed(&name, "rule block is not closed"));
        }

        let found = self.peek().map(|token| token.text.clone()).unwrap_or_default();
        Err(self.malformed(&name, &format!("unexpected \"{found}\" after action")))
    }

    fn parse_group(&mut self, rule: &str) -> Result<ConditionGroup, ParseError> {
        let mut group = ConditionGroup::default();
        if self.peek_is_word("DO") {
            return Ok(group);
        }

        let mut logic = Logic::And;
        loop {
            let condition = self.parse_condition(rule)?;
            group.push(logic, condition);

            if self.peek_is_word("DO") {
                return Ok(group);
            }
            if self.at_rule_boundary() {
                return Err(self.malformed(rule, "missing DO clause"));
            }

            let next = match self.peek_kind() {
                Some(TokenKind::Word(word)) => Logic::from_keyword(&word),
                _ => None,
            };
            match next {
                Some(next) => {
                    logic = next;
                    self.pos += 1;
                }
                None => return Err(self.invalid_condition(rule)),
            }
        }
    }

    fn parse_condition(&mut self, rule: &str) -> Result<Condition, ParseError> {
        if self.at_rule_boundary() {
            return Err(self.malformed(rule, "missing DO clause"));
        }

        let field = match self.tokens.get(self.pos).map(|t| &t.kind) {
            Some(TokenKind::Word(word)) if !is_keyword(word) => Field::from_name(word),
            _ => return Err(self.invalid_condition(rule)),
        };
        let comparison = match self.tokens.get(self.pos + 1).map(|t| &t.kind) {
            Some(TokenKind::Cmp(cmp)) => *cmp,
            _ => return Err(self.invalid_condition(rule)),
        };
        let value = match self.tokens.get(self.pos + 2).map(|t| &t.kind) {
            Some(TokenKind::Number(value)) => *value,
            _ => return Err(self.invalid_condition(rule)),
        };

        self.pos += 3;
        Ok(Condition::new(field, comparison, value))
    }

    fn malformed(&self, rule: &str, reason: &str) -> ParseError {
        ParseError::MalformedRule {
            line: self.line(),
            rule: rule.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Error for the condition text starting at the current token
    fn invalid_condition(&self, rule: &str) -> ParseError {
        let segment: Vec<&str> = self.tokens[self.pos.min(self.tokens.len())..]
            .iter()
            .take_while(|token| {
                !(token.is_word("AND")
                    || token.is_word("OR")
                    || token.is_word("DO")
                    || token.kind == TokenKind::RBrace)
            })
            .map(|token| token.text.as_str())
            .collect();

        let found = if segment.is_empty() {
            self.peek()
                .map(|token| token.text.clone())
                .unwrap_or_default()
        } else {
            segment.join(" ")
        };

        ParseError::InvalidCondition {
            line: self.line(),
            rule: rule.to_string(),
            found,
        }
    }

    /// Skip the rest of a broken rule
    fn recover_rule(&mut self) {
        while let Some(token) = self.peek() {
            if token.is_word("RULE") || token.is_word("DEFAULT") {
                return;
            }
            let closes = token.kind == TokenKind::RBrace;
            self.pos += 1;
            if closes {
                return;
            }
        }
    }
}

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}
