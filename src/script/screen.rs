//! Static screening of participant scripts
//!
//! Screening runs before a script is ever executed. Text patterns are
//! checked first; only a script free of them is compiled and inspected.
//! Calls are checked again on the compiled tree, where comments and
//! layout no longer hide them.

use rhai::{ASTNode, Expr, OptimizationLevel, AST};

use super::sandbox::{build_engine, CAPABILITY_METHODS};

/// Entry point every strategy script must define
pub const ENTRY_POINT: &str = "execute";

/// How a forbidden pattern is matched
#[derive(Debug, Clone, Copy)]
enum Pattern {
    /// Whole word followed by `(`
    Call(&'static str),
    /// Whole word anywhere
    Word(&'static str),
    /// Whole word, then whitespace, then the second token
    Pair(&'static str, &'static str),
}

impl Pattern {
    fn label(self) -> String {
        match self {
            Self::Call(name) => format!("{name}("),
            Self::Word(name) => name.to_string(),
            Self::Pair(first, second) => format!("{first} {second}"),
        }
    }

    fn find(self, source: &str) -> Option<usize> {
        match self {
            Self::Call(name) => find_call(source, name),
            Self::Word(name) => find_word(source, name),
            Self::Pair(first, second) => find_pair(source, first, second),
        }
    }
}

const FORBIDDEN: &[Pattern] = &[
    Pattern::Call("eval"),
    Pattern::Call("Fn"),
    Pattern::Call("call"),
    Pattern::Call("curry"),
    Pattern::Word("import"),
    Pattern::Word("export"),
    Pattern::Call("print"),
    Pattern::Call("debug"),
    Pattern::Call("timestamp"),
    Pattern::Call("sleep"),
    Pattern::Word("process"),
    Pattern::Word("global"),
    Pattern::Call("system"),
    Pattern::Call("open"),
    Pattern::Word("read_file"),
    Pattern::Word("write_file"),
];

/// Function names no compiled script may call, directly or as a method
const FORBIDDEN_CALLS: &[&str] = &[
    "eval",
    "Fn",
    "call",
    "curry",
    "print",
    "debug",
    "timestamp",
    "sleep",
    "system",
    "open",
];

const FORBIDDEN_IN_BUTTONS: &[Pattern] = &[Pattern::Pair("loop", "{"), Pattern::Pair("while", "true")];

/// Why a script was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScreenViolation {
    #[error("line {line}: use of `{pattern}` is not allowed")]
    Forbidden { pattern: String, line: usize },

    #[error("{}syntax error: {message}", line_prefix(.line))]
    Syntax { line: Option<usize>, message: String },

    #[error("script must define `fn execute()`")]
    MissingEntry,

    #[error("`execute` is declared {0} times")]
    DuplicateEntry(usize),

    #[error("`execute` must take no parameters (found {0})")]
    EntryTakesParameters(usize),

    #[error("function `{0}` shadows a built-in Fighter method")]
    ShadowsCapability(String),

    #[error("action code must define a named function")]
    MissingFunction,
}

/// Screening verdict
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScreenReport {
    pub violations: Vec<ScreenViolation>,
}

impl ScreenReport {
    pub fn is_safe(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

/// Screen a strategy script; returns the compiled program when it is safe
pub fn screen_script(source: &str) -> Result<AST, ScreenReport> {
    let violations = scan(source, FORBIDDEN);
    if !violations.is_empty() {
        return Err(ScreenReport { violations });
    }

    let mut engine = build_engine(None);
    engine.set_optimization_level(OptimizationLevel::None);
    let ast = engine.compile(source).map_err(|err| {
        let position = err.position();
        ScreenReport {
            violations: vec![ScreenViolation::Syntax {
                line: position.line(),
                message: err.err_type().to_string(),
            }],
        }
    })?;

    let mut violations = forbidden_calls(&ast);
    let entries: Vec<usize> = ast
        .iter_functions()
        .filter(|f| f.name == ENTRY_POINT)
        .map(|f| f.params.len())
        .collect();

    match entries.as_slice() {
        [] => violations.push(ScreenViolation::MissingEntry),
        [0] => {}
        [params] => violations.push(ScreenViolation::EntryTakesParameters(*params)),
        many => violations.push(ScreenViolation::DuplicateEntry(many.len())),
    }

    for function in ast.iter_functions() {
        if CAPABILITY_METHODS.contains(&function.name) {
            violations.push(ScreenViolation::ShadowsCapability(function.name.to_string()));
        }
    }

    if violations.is_empty() {
        Ok(ast)
    } else {
        Err(ScreenReport { violations })
    }
}

/// Screen an action button payload
///
/// Payloads are scanned, never executed, so no compile step is needed.
/// They must still name a function, which becomes the button's label.
pub fn screen_button(source: &str) -> ScreenReport {
    let mut violations = scan(source, FORBIDDEN);
    violations.extend(scan(source, FORBIDDEN_IN_BUTTONS));

    if first_function_name(source).is_none() {
        violations.push(ScreenViolation::MissingFunction);
    }

    ScreenReport { violations }
}

/// Name of the first `fn name(` in the source
pub fn first_function_name(source: &str) -> Option<&str> {
    let mut offset = 0;
    while let Some(found) = find_word(&source[offset..], "fn") {
        let after = &source[offset + found + 2..];
        let trimmed = after.trim_start();
        let name_len = trimmed
            .find(|c: char| !is_ident_char(c))
            .unwrap_or(trimmed.len());
        let name = &trimmed[..name_len];
        if !name.is_empty()
            && !name.starts_with(|c: char| c.is_ascii_digit())
            && trimmed[name_len..].trim_start().starts_with('(')
            && after.len() != trimmed.len()
        {
            return Some(name);
        }
        offset += found + 2;
    }
    None
}

fn scan(source: &str, patterns: &[Pattern]) -> Vec<ScreenViolation> {
    patterns
        .iter()
        .filter_map(|pattern| {
            pattern.find(source).map(|at| ScreenViolation::Forbidden {
                pattern: pattern.label(),
                line: line_of(source, at),
            })
        })
        .collect()
}

fn forbidden_calls(ast: &AST) -> Vec<ScreenViolation> {
    let mut found: Vec<(String, usize)> = Vec::new();
    ast.walk(&mut |path: &[ASTNode]| {
        if let Some(ASTNode::Expr(Expr::FnCall(call, pos) | Expr::MethodCall(call, pos))) = path.last() {
            let name = call.name.as_str();
            if FORBIDDEN_CALLS.contains(&name) && !found.iter().any(|(seen, _)| seen == name) {
                found.push((name.to_string(), pos.line().unwrap_or_default()));
            }
        }
        true
    });

    found
        .into_iter()
        .map(|(name, line)| ScreenViolation::Forbidden {
            pattern: format!("{name}("),
            line,
        })
        .collect()
}

fn line_prefix(line: &Option<usize>) -> String {
    line.map(|l| format!("line {l}: ")).unwrap_or_default()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn line_of(source: &str, byte_offset: usize) -> usize {
    source[..byte_offset].matches('\n').count() + 1
}

/// Byte offset of `word` standing alone (not part of a longer identifier)
pub(crate) fn find_word(source: &str, word: &str) -> Option<usize> {
    source.match_indices(word).map(|(at, _)| at).find(|&at| {
        let before = source[..at].chars().next_back();
        let after = source[at + word.len()..].chars().next();
        !before.is_some_and(is_ident_char) && !after.is_some_and(is_ident_char)
    })
}

/// Byte offset of `name` used as a call, `name (`
pub(crate) fn find_call(source: &str, name: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(found) = find_word(&source[offset..], name) {
        let at = offset + found;
        if source[at + name.len()..].trim_start().starts_with('(') {
            return Some(at);
        }
        offset = at + name.len();
    }
    None
}

fn find_pair(source: &str, first: &str, second: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(found) = find_word(&source[offset..], first) {
        let at = offset + found;
        let rest = &source[at + first.len()..];
        let trimmed = rest.trim_start();
        if trimmed.starts_with(second) {
            let after = trimmed[second.len()..].chars().next();
            let second_is_word = second.chars().all(is_ident_char);
            if !second_is_word || !after.is_some_and(is_ident_char) {
                return Some(at);
            }
        }
        offset = at + first.len();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        fn execute() {
            if this.distance <= 2.0 { this.attack() } else { this.move_toward("enemy") }
        }
    "#;

    #[test]
    fn accepts_valid_script() {
        assert!(screen_script(VALID).is_ok());
    }

    #[test]
    fn rejects_forbidden_patterns_before_compiling() {
        let report = screen_script("fn execute() { eval(\"1\") } this is not rhai").unwrap_err();
        assert_eq!(
            report.violations,
            vec![ScreenViolation::Forbidden {
                pattern: "eval(".into(),
                line: 1
            }]
        );
    }

    #[test]
    fn each_pattern_is_one_violation() {
        let source = "import \"x\";\nfn execute() { let f = Fn(\"a\"); print(\"hi\"); global }";
        let report = screen_script(source).unwrap_err();
        assert_eq!(report.violations.len(), 4);
        assert!(matches!(&report.violations[0], ScreenViolation::Forbidden { line: 2, .. }));
        assert!(matches!(&report.violations[1], ScreenViolation::Forbidden { line: 1, .. }));
    }

    #[test]
    fn word_boundaries_are_respected() {
        assert_eq!(find_word("processing", "process"), None);
        assert_eq!(find_word("a process", "process"), Some(2));
        assert_eq!(find_call("my_eval(1)", "eval"), None);
        assert_eq!(find_call("eval (1)", "eval"), Some(0));
        assert_eq!(find_call("evaluate(1)", "eval"), None);
    }

    #[test]
    fn comments_do_not_hide_forbidden_calls() {
        let report = screen_script("fn execute() {\n    sleep/**/(2);\n    \"ATTACK\"\n}").unwrap_err();
        assert_eq!(report.violations.len(), 1);
        assert!(matches!(
            &report.violations[0],
            ScreenViolation::Forbidden { pattern, .. } if pattern == "sleep("
        ));

        let source = "fn execute() {\n    let name = \"x\";\n    let f = Fn // later\n (name);\n    let n = 2;\n    n.sleep /* now */ ()\n}";
        let report = screen_script(source).unwrap_err();
        let patterns: Vec<String> = report
            .violations
            .iter()
            .filter_map(|v| match v {
                ScreenViolation::Forbidden { pattern, .. } => Some(pattern.clone()),
                _ => None,
            })
            .collect();
        assert!(patterns.contains(&"Fn(".to_string()));
        assert!(patterns.contains(&"sleep(".to_string()));
    }

    #[test]
    fn reports_syntax_errors_with_line() {
        let report = screen_script("fn execute() {\n  let x = ;\n}").unwrap_err();
        assert!(matches!(
            &report.violations[0],
            ScreenViolation::Syntax { line: Some(2), .. }
        ));
    }

    #[test]
    fn entry_point_shape_is_checked() {
        let missing = screen_script("fn run() { \"ATTACK\" }").unwrap_err();
        assert_eq!(missing.violations, vec![ScreenViolation::MissingEntry]);

        let params = screen_script("fn execute(x) { x }").unwrap_err();
        assert_eq!(params.violations, vec![ScreenViolation::EntryTakesParameters(1)]);

        let twice = screen_script("fn execute() { 1 }\nfn execute(a) { a }").unwrap_err();
        assert_eq!(twice.violations, vec![ScreenViolation::DuplicateEntry(2)]);
    }

    #[test]
    fn capability_methods_cannot_be_shadowed() {
        let report = screen_script("fn attack() { \"IDLE\" }\nfn execute() { \"ATTACK\" }").unwrap_err();
        assert_eq!(
            report.violations,
            vec![ScreenViolation::ShadowsCapability("attack".into())]
        );
    }

    #[test]
    fn buttons_reject_infinite_loops_and_need_a_name() {
        let report = screen_button("fn spin() { loop { attack(); } }");
        assert_eq!(report.violations.len(), 1);
        assert!(report.messages()[0].contains("loop {"));

        let report = screen_button("while true { attack(); }");
        assert_eq!(report.violations.len(), 2);
        assert!(report.violations.contains(&ScreenViolation::MissingFunction));

        assert!(screen_button("fn power_strike() { attack(); retreat(); }").is_safe());
        assert!(screen_button("fn careful() { while true_enough { } }").is_safe());
    }

    #[test]
    fn finds_first_function_name() {
        assert_eq!(first_function_name("fn  power_strike ( ) {}"), Some("power_strike"));
        assert_eq!(first_function_name("let fnord = 1; fn go() {}"), Some("go"));
        assert_eq!(first_function_name("fn(x) {}"), None);
        assert_eq!(first_function_name("no functions"), None);
    }
}
