//! Sandboxed strategy scripts (Rhai)
//!
//! ```text
//! fn execute() {
//!     if this.distance <= 2.0 && this.attack_cooldown == 0 {
//!         this.attack()
//!     } else {
//!         this.move_toward("enemy")
//!     }
//! }
//! ```

pub mod sandbox;
pub mod screen;

pub use sandbox::{build_engine, execute, FighterApi, ScriptProgram, ScriptState, DEFAULT_BUDGET};
pub use screen::{first_function_name, screen_button, screen_script, ScreenReport, ScreenViolation};
