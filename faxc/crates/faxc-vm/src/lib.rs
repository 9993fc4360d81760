//! The bytecode VM: calling convention, activation records, and the
//! instruction dispatch loop, run against a compiled module from
//! `faxc-mir` and a root object wired up by `faxc-runtime`.

mod calling;
mod callframe;
pub mod dispatch;
pub mod error;
pub mod module_fns;
mod shared;
mod state;

pub use calling::{setup_call, write_value, CallOutcome};
pub use callframe::Callframe;
pub use error::{Result, VmError};
pub use module_fns::ModuleFns;
pub use shared::SharedState;
pub use state::{RunState, VMState};

use std::cell::RefCell;
use std::rc::Rc;

use faxc_mir::CompiledModule;
use faxc_runtime::ValueCache;
use faxc_util::index_vec::Idx;
use fgc::{GcState, ObjHandle, Value};

/// Builds the initial `VMState` for a module: wraps its function table,
/// allocates an entry-frame scope chained off `root`, and pushes the
/// single starting frame. The entry function's own slot/refslot counts
/// come from `faxc-mir`'s lowering of the module's top-level statements.
pub fn prepare_module(
    gc: GcState,
    vcache: ValueCache,
    root: ObjHandle,
    module: CompiledModule,
    args: Vec<Value>,
) -> VMState {
    let (module, entry) = ModuleFns::from_compiled(module);
    let shared = Rc::new(SharedState::new(gc, vcache));
    let (slot_count, refslot_count) = {
        let f = module.get(entry).borrow();
        (f.slot_count, f.refslot_count)
    };
    let mut slots = vec![Value::Null; slot_count.max(2)];
    slots[1] = Value::Object(root);
    for (i, arg) in args.into_iter().enumerate() {
        if i + 2 < slots.len() {
            slots[2 + i] = arg;
        }
    }
    let slots = Rc::new(RefCell::new(slots));
    let root_set = shared.gc.borrow_mut().push_root_set(slots.clone());
    let frame = Callframe {
        module,
        function: entry,
        slots,
        refslots: vec![None; refslot_count],
        block: faxc_mir::BlockId::from_usize(0),
        prev_block: faxc_mir::BlockId::from_usize(0),
        idx: 0,
        root_set,
        write_target: None,
        stack_objects: Vec::new(),
    };
    VMState {
        shared,
        root,
        frames: vec![frame],
        run_state: RunState::Terminated,
        result: Value::Null,
        error: None,
        backtrace: None,
    }
}

/// Runs a prepared `VMState` to completion, returning its result value or
/// the error message/backtrace recorded by the failing instruction.
pub fn run_to_completion(state: &mut VMState) -> std::result::Result<Value, String> {
    dispatch::run(state);
    match state.run_state {
        RunState::Terminated => Ok(state.result),
        RunState::Errored => {
            let mut msg = state.error.clone().unwrap_or_default();
            if let Some(bt) = &state.backtrace {
                msg.push_str("\n");
                msg.push_str(bt);
            }
            Err(msg)
        }
        RunState::Running => unreachable!("dispatch::run always leaves a terminal state"),
    }
}

pub fn cycle_count(state: &VMState) -> u64 {
    state.shared.cyclecount.get()
}
