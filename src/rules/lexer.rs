//! Tokenizer for strategy text
//!
//! `//` and `/* */` comments are dropped here. Every token remembers the
//! 1-based line it started on.

use std::fmt;

use super::ast::Comparison;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Keyword, identifier, field path or action word
    Word(String),
    /// Unsigned number, `digits(.digits)?`
    Number(f64),
    /// Double-quoted text, quotes stripped
    Str(String),
    LBrace,
    RBrace,
    Cmp(Comparison),
    /// Text that fits no other token (kept for error reporting)
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
    /// Source text of the token
    pub text: String,
}

impl Token {
    pub fn is_word(&self, word: &str) -> bool {
        matches!(&self.kind, TokenKind::Word(w) if w == word)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Split `source` into tokens
pub fn tokenize(source: &str) -> Vec<Token> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\n' {
            line += 1;
            i += 1;
            continue;
        }
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Comments
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                if chars[i] == '\n' {
                    line += 1;
                }
                i += 1;
            }
            i = (i + 2).min(chars.len());
            continue;
        }

        let start = i;
        let start_line = line;
        let kind = match c {
            '{' => {
                i += 1;
                TokenKind::LBrace
            }
            '}' => {
                i += 1;
                TokenKind::RBrace
            }
            '"' => {
                i += 1;
                while i < chars.len() && chars[i] != '"' && chars[i] != '\n' {
                    i += 1;
                }
                if chars.get(i) == Some(&'"') {
                    let text: String = chars[start + 1..i].iter().collect();
                    i += 1;
                    TokenKind::Str(text)
                } else {
                    TokenKind::Unknown(chars[start..i].iter().collect())
                }
            }
            '<' | '>' | '=' | '!' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let one = c.to_string();
                if let Some(cmp) = Comparison::from_symbol(&two).filter(|_| two.len() == 2) {
                    i += 2;
                    TokenKind::Cmp(cmp)
                } else if let Some(cmp) = Comparison::from_symbol(&one) {
                    i += 1;
                    TokenKind::Cmp(cmp)
                } else {
                    i += 1;
                    TokenKind::Unknown(c.to_string())
                }
            }
            c if c.is_ascii_digit() => {
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if chars.get(i) == Some(&'.')
                    && chars.get(i + 1).is_some_and(|next| next.is_ascii_digit())
                {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                match text.parse::<f64>() {
                    Ok(value) => TokenKind::Number(value),
                    Err(_) => TokenKind::Unknown(text),
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
                {
                    i += 1;
                }
                TokenKind::Word(chars[start..i].iter().collect())
            }
            other => {
                i += 1;
                TokenKind::Unknown(other.to_string())
            }
        };

        tokens.push(Token {
            kind,
            line: start_line,
            text: chars[start..i].iter().collect(),
        });
    }

    tokens
}
