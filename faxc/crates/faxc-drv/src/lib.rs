//! The driver: reads a source file, runs it through the pipeline every
//! other crate in this workspace implements a stage of — `faxc-lex` is
//! driven internally by `faxc-par::parse`, then `faxc-sem::analyze`,
//! `faxc-mir::lower_program` plus its parse-time optimizer pass,
//! `faxc-runtime::build_root`, and finally `faxc-vm::{prepare_module,
//! run_to_completion}` — and reports the result or error the way the CLI
//! surface in the spec demands.
//!
//! A second entry point, [`run_line`], runs one already-lowered module
//! against a caller-supplied root and returns the (possibly mutated) root
//! back out; this is the REPL driver's hook (`faxi`), which needs to keep
//! one `GcState`/root alive across many lines instead of tearing the VM
//! down after a single module.

mod dump;

use std::path::{Path, PathBuf};
use std::rc::Rc;

use faxc_mir::CompiledModule;
use faxc_runtime::{box_array, box_string, build_root, ValueCache};
use faxc_util::prepare_key_str;
use faxc_vm::{cycle_count, prepare_module, run_to_completion};
use fgc::{GcConfig, GcState, ObjHandle, Value};

pub use dump::dump_module;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("could not read {path}: {source}")]
    Io { path: PathBuf, #[source] source: std::io::Error },
    #[error("parse error: {0}")]
    Parse(#[from] faxc_par::ParseError),
    #[error("{0}")]
    Sem(#[from] faxc_sem::SemError),
    #[error("{0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;

/// Driver configuration, built from CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub script: PathBuf,
    pub script_args: Vec<String>,
    pub verbose: bool,
}

/// One compiler-driver invocation: owns nothing beyond its configuration,
/// since the GC/root/VM state it builds along the way is scoped to a
/// single [`Session::run`] call.
pub struct Session {
    pub config: Config,
}

impl Session {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Lexes (inside `faxc_par::parse`), parses, validates, lowers to IR,
    /// runs the parse-time optimizer pass, builds a fresh root object, and
    /// executes the module to completion. Returns the module's result
    /// value — the mutated root/scope object, per `faxc-mir`'s module
    /// lowering convention.
    pub fn run(&self) -> Result<Value> {
        tracing::debug!(script = %self.config.script.display(), "reading source");
        let src = std::fs::read_to_string(&self.config.script)
            .map_err(|source| DriverError::Io { path: self.config.script.clone(), source })?;

        let module = compile(&src)?;
        tracing::debug!(functions = module.functions.len(), "lowered module");

        if self.config.verbose {
            dump_module(&module);
        }

        let mut gc = GcState::new(GcConfig::default());
        let (root, vcache) = build_root(&mut gc);
        install_arguments(&mut gc, &vcache, root, &self.config.script_args);

        let mut state = prepare_module(gc, vcache, root, module, Vec::new());
        tracing::info!("running module");
        let result = run_to_completion(&mut state).map_err(DriverError::Runtime)?;

        if self.config.verbose {
            eprintln!("cycles: {}", cycle_count(&state));
        }

        Ok(result)
    }
}

/// Lexes, parses, and validates `src`, then lowers it to a [`CompiledModule`]
/// with the parse-time optimizer pass applied to every function — the
/// subset of the pipeline that needs neither a `GcState` nor a VM, shared
/// by both the one-shot driver and the REPL.
pub fn compile(src: &str) -> Result<CompiledModule> {
    let program = faxc_par::parse(src)?;
    faxc_sem::analyze(&program)?;
    let mut module = faxc_mir::lower_program(&program);
    for f in module.functions.as_mut_slice() {
        faxc_mir::run_parse_time_passes(f);
    }
    Ok(module)
}

/// Runs one compiled module against `root` to completion (the REPL's
/// per-line step): slot 1 of the entry function is `root` itself, so a
/// top-level `var` in the line writes directly onto it. Returns the
/// (possibly unchanged) root object the next line should run against,
/// mirroring `repl.c`'s `root = AS_OBJ(rootval);`.
pub fn run_line(
    gc: GcState,
    vcache: ValueCache,
    root: ObjHandle,
    module: CompiledModule,
) -> std::result::Result<(GcState, ValueCache, ObjHandle), (GcState, ValueCache, String)> {
    let mut state = prepare_module(gc, vcache, root, module, Vec::new());
    match run_to_completion(&mut state) {
        Ok(result) => {
            let root = result.as_object().unwrap_or(root);
            let (gc, vcache) = reclaim(state);
            Ok((gc, vcache, root))
        }
        Err(msg) => {
            let (gc, vcache) = reclaim(state);
            Err((gc, vcache, msg))
        }
    }
}

/// Pulls the `GcState`/`ValueCache` back out of a finished `VMState`. Valid
/// once dispatch has returned to a terminal state: no sub-VM survives past
/// that point, so the `Rc<SharedState>` this holds is uniquely owned.
fn reclaim(state: faxc_vm::VMState) -> (GcState, ValueCache) {
    let shared = Rc::try_unwrap(state.shared)
        .unwrap_or_else(|_| panic!("a sub-VM outlived its parent's dispatch loop"));
    (shared.gc.into_inner(), shared.vcache)
}

fn install_arguments(gc: &mut GcState, vcache: &ValueCache, root: ObjHandle, args: &[String]) {
    let boxed: Vec<Value> = args.iter().map(|s| box_string(gc, vcache, s.clone())).collect();
    let arguments = box_array(gc, vcache, boxed);
    fgc::set(&mut gc.heap, root, prepare_key_str("arguments"), arguments)
        .expect("fresh root is neither closed nor frozen");
}

/// Parses CLI arguments per spec's `interp <script> [args...] [-v]`
/// surface: the first non-flag argument is the script path, everything
/// after becomes the script's `arguments` array, and `-v`/`--verbose` may
/// appear anywhere.
pub fn parse_args(mut args: impl Iterator<Item = String>) -> std::result::Result<Config, String> {
    args.next(); // argv[0]
    let mut verbose = false;
    let mut positional = Vec::new();
    for arg in args {
        match arg.as_str() {
            "-v" | "--verbose" => verbose = true,
            _ => positional.push(arg),
        }
    }
    if positional.is_empty() {
        return Err("usage: interp <script> [args...] [-v]".to_string());
    }
    let script = PathBuf::from(positional.remove(0));
    Ok(Config { script, script_args: positional, verbose })
}

/// Entry point `main.rs` calls: parses `std::env::args`, runs the script,
/// and reports any error — parse, semantic, or VM — to the caller so it
/// can exit 1. Exits 0 implicitly on `Ok`.
pub fn main() -> std::result::Result<(), String> {
    let config = parse_args(std::env::args())?;
    init_logging(config.verbose);
    let session = Session::new(config);
    session.run().map(|_| ()).map_err(|e| e.to_string())
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Resolves a script path as the CLI would, for callers (tests) that want
/// to build a `Config` without going through `std::env::args`.
pub fn config_for(script: impl AsRef<Path>, script_args: Vec<String>, verbose: bool) -> Config {
    Config { script: script.as_ref().to_path_buf(), script_args, verbose }
}
