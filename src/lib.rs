//! Fighter Arena - strategy scripting and deterministic combat core
//!
//! Two participants author fighters either as declarative rule scripts or as
//! small Rhai programs. Matches run on a fixed tick:
//! - `rules` parses, validates and evaluates the rule language
//! - `script` screens and runs sandboxed Rhai programs
//! - `game` holds the simulator, action buttons and the match lifecycle
//! - `protocol` defines the requests, replies and events a transport wraps

pub mod app;
pub mod config;
pub mod game;
pub mod protocol;
pub mod rules;
pub mod script;
pub mod util;
