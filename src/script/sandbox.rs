//! Sandboxed Rhai execution
//!
//! Scripts see one host type, `Fighter`, bound as `this` for their
//! `fn execute()`. The engine has no module resolver, no output, no
//! dynamic evaluation, hard size limits and a wall-clock deadline checked
//! from the progress hook. Every failure resolves to `IDLE`.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use rhai::module_resolvers::DummyModuleResolver;
use rhai::packages::{Package, StandardPackage};
use rhai::{
    CallFnOptions, Dynamic, Engine, EvalAltResult, ImmutableString, Module, Scope, Shared, AST, FLOAT, INT,
};
use tracing::{debug, warn};

use crate::game::Action;
use crate::util::time::Timer;

use super::screen::{screen_script, ScreenReport, ENTRY_POINT};

/// Default wall-clock budget per invocation
pub const DEFAULT_BUDGET: Duration = Duration::from_millis(50);

/// Methods the `Fighter` type provides; scripts may not redefine them
pub const CAPABILITY_METHODS: &[&str] = &["attack", "block", "wait", "retreat", "move_toward", "move_to"];

const MAX_OPERATIONS: u64 = 1_000_000;
const MAX_CALL_LEVELS: usize = 32;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_FN_EXPR_DEPTH: usize = 32;
const MAX_STRING_SIZE: usize = 4 * 1024;
const MAX_ARRAY_SIZE: usize = 1024;
const MAX_MAP_SIZE: usize = 256;
/// Progress callbacks between deadline checks
const DEADLINE_CHECK_EVERY: u64 = 256;

/// Game state a script can read, from its fighter's point of view
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScriptState {
    pub distance: f64,
    pub health: f64,
    pub opponent_health: f64,
    pub attack_cooldown: u32,
    pub opponent_attack_cooldown: u32,
    pub x: f64,
    pub y: f64,
    pub opponent_x: f64,
    pub opponent_y: f64,
    pub tick: u64,
}

/// The `Fighter` object scripts receive as `this`
#[derive(Debug, Clone)]
pub struct FighterApi {
    state: ScriptState,
    chosen: Option<Action>,
}

impl FighterApi {
    fn new(state: ScriptState) -> Self {
        Self {
            state,
            chosen: None,
        }
    }

    fn choose(&mut self, action: Action) -> ImmutableString {
        self.chosen = Some(action);
        action.keyword().into()
    }
}

fn standard_package() -> Shared<Module> {
    static PACKAGE: OnceLock<Shared<Module>> = OnceLock::new();
    PACKAGE
        .get_or_init(|| StandardPackage::new().as_shared_module())
        .clone()
}

/// Build a locked-down engine; `deadline` arms the wall-clock budget
pub fn build_engine(deadline: Option<Instant>) -> Engine {
    let mut engine = Engine::new_raw();
    engine.register_global_module(standard_package());
    engine.set_module_resolver(DummyModuleResolver::new());

    engine
        .disable_symbol("eval")
        .disable_symbol("import")
        .disable_symbol("export")
        .disable_symbol("print")
        .disable_symbol("debug");
    engine.on_print(|_| {});
    engine.on_debug(|_, _, _| {});

    engine
        .set_max_operations(MAX_OPERATIONS)
        .set_max_call_levels(MAX_CALL_LEVELS)
        .set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FN_EXPR_DEPTH)
        .set_max_string_size(MAX_STRING_SIZE)
        .set_max_array_size(MAX_ARRAY_SIZE)
        .set_max_map_size(MAX_MAP_SIZE)
        .set_max_modules(0);

    if let Some(deadline) = deadline {
        engine.on_progress(move |operations| {
            if operations % DEADLINE_CHECK_EVERY == 0 && Instant::now() >= deadline {
                Some(Dynamic::UNIT)
            } else {
                None
            }
        });
    }

    deny_clock_access(&mut engine);
    register_fighter(&mut engine);
    engine
}

/// Shadow the standard package's clock functions
///
/// `sleep` blocks inside a native call where the progress hook cannot
/// reach it, so it must fail however the script manages to call it.
fn deny_clock_access(engine: &mut Engine) {
    fn denied(name: &str) -> Box<EvalAltResult> {
        format!("`{name}` is not available to strategies").into()
    }

    engine
        .register_fn("sleep", |_: INT| -> Result<(), Box<EvalAltResult>> { Err(denied("sleep")) })
        .register_fn("sleep", |_: FLOAT| -> Result<(), Box<EvalAltResult>> { Err(denied("sleep")) })
        .register_fn("timestamp", || -> Result<(), Box<EvalAltResult>> { Err(denied("timestamp")) });
}

fn register_fighter(engine: &mut Engine) {
    engine
        .register_type_with_name::<FighterApi>("Fighter")
        .register_get("distance", |api: &mut FighterApi| api.state.distance)
        .register_get("health", |api: &mut FighterApi| api.state.health)
        .register_get("opponent_health", |api: &mut FighterApi| api.state.opponent_health)
        .register_get("attack_cooldown", |api: &mut FighterApi| api.state.attack_cooldown as INT)
        .register_get("opponent_attack_cooldown", |api: &mut FighterApi| {
            api.state.opponent_attack_cooldown as INT
        })
        .register_get("x", |api: &mut FighterApi| api.state.x)
        .register_get("y", |api: &mut FighterApi| api.state.y)
        .register_get("opponent_x", |api: &mut FighterApi| api.state.opponent_x)
        .register_get("opponent_y", |api: &mut FighterApi| api.state.opponent_y)
        .register_get("tick", |api: &mut FighterApi| api.state.tick as INT)
        .register_fn("attack", |api: &mut FighterApi| api.choose(Action::Attack))
        .register_fn("block", |api: &mut FighterApi| api.choose(Action::Block))
        .register_fn("wait", |api: &mut FighterApi| api.choose(Action::Idle))
        .register_fn("retreat", |api: &mut FighterApi| api.choose(Action::Retreat))
        .register_fn("move_toward", |api: &mut FighterApi, target: ImmutableString| {
            if target.as_str() == "enemy" {
                api.choose(Action::Approach)
            } else {
                api.choose(Action::Idle)
            }
        })
        .register_fn("move_to", |api: &mut FighterApi, _x: Dynamic, _y: Dynamic| {
            api.choose(Action::Approach)
        });
}

/// A screened, compiled strategy script
#[derive(Debug, Clone)]
pub struct ScriptProgram {
    ast: AST,
    budget: Duration,
}

impl ScriptProgram {
    /// Screen and compile `source`
    pub fn compile(source: &str, budget: Duration) -> Result<Self, ScreenReport> {
        let ast = screen_script(source)?;
        Ok(Self { ast, budget })
    }

    /// Run `execute()` once; never fails
    pub fn execute(&self, state: &ScriptState) -> Action {
        let timer = Timer::new();
        let engine = build_engine(Some(timer.deadline(self.budget)));

        match run_entry(&engine, &self.ast, *state) {
            Ok(action) => action,
            Err(err) => {
                match *err {
                    EvalAltResult::ErrorTerminated(..) => warn!(
                        elapsed_us = timer.elapsed_micros(),
                        budget_ms = self.budget.as_millis() as u64,
                        "Script exceeded its time budget"
                    ),
                    ref other => debug!(error = %other, "Script failed"),
                }
                Action::Idle
            }
        }
    }
}

fn run_entry(engine: &Engine, ast: &AST, state: ScriptState) -> Result<Action, Box<EvalAltResult>> {
    let mut this = Dynamic::from(FighterApi::new(state));
    let mut scope = Scope::new();
    let options = CallFnOptions::new().eval_ast(false).bind_this_ptr(&mut this);

    let returned = engine.call_fn_with_options::<Dynamic>(options, &mut scope, ast, ENTRY_POINT, ())?;

    let from_return = returned
        .try_cast::<ImmutableString>()
        .and_then(|keyword| Action::from_keyword(keyword.as_str()));
    let from_calls = this.try_cast::<FighterApi>().and_then(|api| api.chosen);

    Ok(from_return.or(from_calls).unwrap_or(Action::Idle))
}

/// Screen, compile and run `source` once; any problem yields `IDLE`
pub fn execute(source: &str, state: &ScriptState, budget: Duration) -> Action {
    match ScriptProgram::compile(source, budget) {
        Ok(program) => program.execute(state),
        Err(report) => {
            debug!(violations = ?report.messages(), "Script rejected before execution");
            Action::Idle
        }
    }
}
