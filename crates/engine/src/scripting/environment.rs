use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, ParseError, Scope, AST};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::entity::ZoneId;
use crate::world::{TurnAction, World};

use super::api::{
    register_api, GameApi, NpcApi, ScriptCallback, ScriptCommand, SharedScriptState, SharedState,
};
use super::log_context::{chunk_label, ScriptLogContext, SharedLogContext};
use super::module::{source_digest, ScriptModule};

const MAX_SCRIPT_OPERATIONS: u64 = 1_000_000;
const MAX_CALL_LEVELS: usize = 32;
const MAX_EXPR_DEPTH: usize = 64;
const MAX_FUNCTION_EXPR_DEPTH: usize = 32;
const MAX_STRING_SIZE: usize = 64 * 1024;
const MAX_ARRAY_SIZE: usize = 4_096;
const MAX_MAP_SIZE: usize = 1_024;

pub const SCRIPT_EXTENSION: &str = "rhai";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("failed to read script {chunk}: {source}")]
    Read {
        chunk: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to compile script {chunk}: {source}")]
    Compile {
        chunk: String,
        #[source]
        source: ParseError,
    },
    #[error("script {chunk} raised an error: {source}")]
    Runtime {
        chunk: String,
        #[source]
        source: Box<EvalAltResult>,
    },
    #[error("Script returned \"{value}\" ({chunk})")]
    Returned { chunk: String, value: String },
    #[error("failed to read script directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedScript {
    pub digest: String,
    pub succeeded: bool,
    pub load_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptDirReport {
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
}

struct CompiledModule {
    ast: AST,
    zone: Option<ZoneId>,
    npcs: Vec<String>,
}

/// Runs script modules in a restricted Rhai engine and applies what they request
/// to the [`World`].
///
/// Scripts only see the `game` and `npcs` capability objects. Module imports and
/// `eval` are unavailable and execution is bounded by operation and depth limits.
pub struct ScriptEnvironment {
    engine: Engine,
    shared: SharedScriptState,
    log: SharedLogContext,
    modules: HashMap<String, CompiledModule>,
    loaded: BTreeMap<String, LoadedScript>,
    in_scope: Vec<String>,
    last_error: Option<String>,
}

impl Default for ScriptEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEnvironment {
    pub fn new() -> Self {
        let log: SharedLogContext = Rc::new(RefCell::new(ScriptLogContext::default()));
        Self {
            engine: build_engine(&log),
            shared: Rc::new(RefCell::new(SharedState::default())),
            log,
            modules: HashMap::new(),
            loaded: BTreeMap::new(),
            in_scope: Vec::new(),
            last_error: None,
        }
    }

    /// Loads and runs `module`. Failures are logged and reported as `false`;
    /// the unload step runs on every path.
    pub fn load(&mut self, module: &mut ScriptModule, world: &mut World) -> bool {
        let chunk = module.chunk_name().to_string();
        self.on_load(&chunk);
        let unload_chunk = chunk.clone();
        let mut env = scopeguard::guard(self, move |env| env.on_unload(&unload_chunk));

        match env.execute(&chunk, module, world) {
            Ok(()) => {
                env.last_error = None;
                info!(chunk = %chunk, "script_loaded");
                true
            }
            Err(error) => {
                warn!(chunk = %chunk, error = %error, "script_load_failed");
                env.last_error = Some(error.to_string());
                false
            }
        }
    }

    pub fn load_file(&mut self, path: impl Into<PathBuf>, world: &mut World) -> bool {
        let mut module = ScriptModule::from_file(path);
        self.load(&mut module, world)
    }

    /// Loads every `.rhai` file below `dir`, in path order.
    pub fn load_dir(
        &mut self,
        dir: &Path,
        world: &mut World,
    ) -> Result<ScriptDirReport, ScriptError> {
        let mut files = Vec::new();
        collect_script_files(dir, &mut files)?;
        files.sort();

        let mut report = ScriptDirReport::default();
        for path in files {
            let chunk = path.display().to_string();
            if self.load_file(path, world) {
                report.loaded.push(chunk);
            } else {
                report.failed.push(chunk);
            }
        }
        info!(
            dir = %dir.display(),
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "script_dir_loaded"
        );
        Ok(report)
    }

    /// Invokes a callback registered by a loaded module. Script functions cannot see
    /// the load-time scope, so the callback receives `game` as its only argument.
    /// Errors are logged, not raised.
    pub fn run_callback(&mut self, callback: &ScriptCallback, world: &mut World) -> bool {
        let Some(module) = self.modules.get(&callback.module) else {
            warn!(module = %callback.module, "script_callback_module_not_loaded");
            return false;
        };

        self.log.borrow_mut().push(callback.module.clone());
        let log = Rc::clone(&self.log);
        let _restore = scopeguard::guard((), move |_| {
            log.borrow_mut().pop();
        });

        self.shared.borrow_mut().zone = module.zone.clone();
        let game = GameApi::new(Rc::clone(&self.shared), Rc::clone(&self.log));
        let result = callback
            .callback
            .call::<Dynamic>(&self.engine, &module.ast, (game,));
        let commands = self.shared.borrow_mut().take_commands();
        let zone = self.shared.borrow_mut().zone.take();
        if let Some(module) = self.modules.get_mut(&callback.module) {
            module.zone = zone;
        }
        let npcs = apply_commands(commands, world, &callback.module);
        if let Some(module) = self.modules.get_mut(&callback.module) {
            module.npcs.extend(npcs);
        }

        match result {
            Ok(_) => true,
            Err(error) => {
                warn!(module = %callback.module, error = %error, "script_callback_failed");
                false
            }
        }
    }

    pub fn current_chunk(&self) -> Option<String> {
        self.log.borrow().current().map(str::to_string)
    }

    pub fn modules_in_scope(&self) -> &[String] {
        &self.in_scope
    }

    pub fn loaded(&self, chunk: &str) -> Option<&LoadedScript> {
        self.loaded.get(chunk)
    }

    pub fn loaded_modules(&self) -> impl Iterator<Item = (&str, &LoadedScript)> {
        self.loaded
            .iter()
            .map(|(chunk, record)| (chunk.as_str(), record))
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn on_load(&mut self, chunk: &str) {
        self.log.borrow_mut().push(chunk);
        self.in_scope.push(chunk.to_string());
        debug!(chunk, "script_on_load");
    }

    fn on_unload(&mut self, chunk: &str) {
        if let Some(index) = self.in_scope.iter().rposition(|name| name == chunk) {
            self.in_scope.remove(index);
        }
        self.log.borrow_mut().pop();
        debug!(chunk, "script_on_unload");
    }

    fn execute(
        &mut self,
        chunk: &str,
        module: &mut ScriptModule,
        world: &mut World,
    ) -> Result<(), ScriptError> {
        let source = module.read_source().map_err(|source| ScriptError::Read {
            chunk: chunk.to_string(),
            source,
        })?;
        let digest = source_digest(&source);
        if self
            .loaded
            .get(chunk)
            .is_some_and(|record| record.succeeded && record.digest == digest)
        {
            info!(chunk, "script_unchanged_skipped");
            return Ok(());
        }

        let result = self.run_body(chunk, &source, world);
        let record = self.loaded.entry(chunk.to_string()).or_insert(LoadedScript {
            digest: String::new(),
            succeeded: false,
            load_count: 0,
        });
        record.digest = digest;
        record.succeeded = result.is_ok();
        record.load_count += 1;
        result
    }

    fn run_body(
        &mut self,
        chunk: &str,
        source: &str,
        world: &mut World,
    ) -> Result<(), ScriptError> {
        let mut ast = self
            .engine
            .compile(source)
            .map_err(|source| ScriptError::Compile {
                chunk: chunk.to_string(),
                source,
            })?;
        ast.set_source(chunk);

        {
            let mut shared = self.shared.borrow_mut();
            shared.zone = None;
            shared.commands.clear();
        }
        let mut scope = Scope::new();
        scope.push("game", GameApi::new(Rc::clone(&self.shared), Rc::clone(&self.log)));
        scope.push("npcs", NpcApi::new(Rc::clone(&self.shared)));

        let evaluated = self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast);
        let commands = self.shared.borrow_mut().take_commands();
        let zone = self.shared.borrow_mut().zone.take();
        let value = evaluated.map_err(|source| ScriptError::Runtime {
            chunk: chunk.to_string(),
            source,
        })?;

        if let Some(previous) = self.modules.remove(chunk) {
            for name in previous.npcs {
                world.npcs_mut().remove(&name);
            }
        }
        let npcs = apply_commands(commands, world, chunk);
        self.modules.insert(
            chunk.to_string(),
            CompiledModule {
                ast,
                zone,
                npcs,
            },
        );

        if body_succeeded(&value) {
            Ok(())
        } else {
            Err(ScriptError::Returned {
                chunk: chunk.to_string(),
                value: value.to_string(),
            })
        }
    }
}

/// Unit, zero and `true` count as success; other ints and `false` as failure.
fn body_succeeded(value: &Dynamic) -> bool {
    if let Ok(code) = value.as_int() {
        code == 0
    } else if let Ok(flag) = value.as_bool() {
        flag
    } else {
        true
    }
}

/// Applies queued commands and returns the names of the NPCs that were registered.
fn apply_commands(commands: Vec<ScriptCommand>, world: &mut World, chunk: &str) -> Vec<String> {
    let mut registered = Vec::new();
    for command in commands {
        match command {
            ScriptCommand::RegisterNpc(builder) => {
                let name = builder.name().to_string();
                if world.npcs_mut().add(builder.build()) {
                    info!(chunk, npc = %name, "script_npc_registered");
                    registered.push(name);
                } else {
                    warn!(chunk, npc = %name, "script_npc_name_taken");
                }
            }
            ScriptCommand::AddMusic(source) => {
                debug!(chunk, zone = %source.zone, music = %source.name, "script_music_added");
                world.add_music_source(source);
            }
            ScriptCommand::RunAfter { turns, callback } => {
                let target = world
                    .turns_mut()
                    .notify_in_turns(turns, TurnAction::Script(callback));
                debug!(chunk, target_turn = target, "script_callback_scheduled");
            }
        }
    }
    registered
}

fn build_engine(log: &SharedLogContext) -> Engine {
    let mut engine = Engine::new();
    engine.set_module_resolver(DummyModuleResolver::new());
    engine.disable_symbol("eval");
    engine.set_max_operations(MAX_SCRIPT_OPERATIONS);
    engine.set_max_call_levels(MAX_CALL_LEVELS);
    engine.set_max_expr_depths(MAX_EXPR_DEPTH, MAX_FUNCTION_EXPR_DEPTH);
    engine.set_max_string_size(MAX_STRING_SIZE);
    engine.set_max_array_size(MAX_ARRAY_SIZE);
    engine.set_max_map_size(MAX_MAP_SIZE);

    let print_log = Rc::clone(log);
    engine.on_print(move |text| info!(chunk = %chunk_label(&print_log), "{text}"));
    let debug_log = Rc::clone(log);
    engine.on_debug(move |text, _source, position| {
        debug!(chunk = %chunk_label(&debug_log), position = ?position, "{text}")
    });

    register_api(&mut engine);
    engine
}

fn collect_script_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), ScriptError> {
    let entries = fs::read_dir(dir).map_err(|source| ScriptError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ScriptError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_script_files(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
        {
            files.push(path);
        }
    }
    Ok(())
}
