//! Calling convention: `setup_call` validates the callee and dispatches to
//! either a closure (push a callframe) or a native function (call through
//! directly, no frame). Grounded on `original_source/src/vm/call.c`'s
//! `setup_call`/`call_closure`/`call_function`/`setup_vararg` and the
//! `function_handler`/`method_handler` split — collapsed here into one
//! path branching on `UserFunction::is_method`, since this tree has no
//! separate native dispatch-pointer-per-ClosureObject to distinguish them.

use std::cell::RefCell;
use std::rc::Rc;

use faxc_mir::{UserFunctionId, WriteArg};
use faxc_util::index_vec::Idx;
use fgc::{GcState, ObjHandle, ObjectFlags, ObjectPayload, Value};

use crate::callframe::Callframe;
use crate::error::{Result, VmError};
use crate::module_fns::{self, ModuleFns};
use crate::state::VMState;

/// How `setup_call` disposed of a call: a closure call pushes a new frame
/// (its return value arrives later, at RETURN); a native call completes
/// synchronously and its value has already been written to `write_target`.
pub enum CallOutcome {
    FramePushed,
    Completed,
}

pub fn setup_call(
    state: &mut VMState,
    this: Value,
    callee: Value,
    args: &[Value],
    write_target: Option<WriteArg>,
) -> Result<CallOutcome> {
    let callee_obj = match callee {
        Value::Object(h) => h,
        _ => return Err(VmError::NotCallable),
    };
    let (is_closure, is_function) = {
        let gc = state.shared.gc.borrow();
        (
            fgc::instance_of_or_equal(&gc.heap, callee_obj, state.shared.vcache.closure_base),
            fgc::instance_of_or_equal(&gc.heap, callee_obj, state.shared.vcache.function_base),
        )
    };
    if is_closure {
        call_closure(state, this, callee_obj, args, write_target)?;
        Ok(CallOutcome::FramePushed)
    } else if is_function {
        call_native(state, this, callee_obj, args, write_target)?;
        Ok(CallOutcome::Completed)
    } else {
        Err(VmError::NotCallable)
    }
}

fn call_native(
    state: &mut VMState,
    this: Value,
    callee: ObjHandle,
    args: &[Value],
    write_target: Option<WriteArg>,
) -> Result<()> {
    let native = {
        let gc = state.shared.gc.borrow();
        match &gc.heap.get(callee).payload {
            ObjectPayload::Function(f) => f.clone(),
            _ => return Err(VmError::NotCallable),
        }
    };
    let result = {
        let mut gc = state.shared.gc.borrow_mut();
        native(&mut gc, this, args).map_err(VmError::Native)?
    };
    state.result = result;
    if let Some(target) = write_target {
        write_value(state, target, result);
    }
    Ok(())
}

/// `call.c`'s `call_closure`/`call_function`: bump the call count, kick the
/// hot-call optimizer at the 10th call, build the method/vararg scope, then
/// push a frame positioned at the callee's entry block.
fn call_closure(
    state: &mut VMState,
    this: Value,
    callee: ObjHandle,
    args: &[Value],
    write_target: Option<WriteArg>,
) -> Result<()> {
    let (module, fn_id, context) = {
        let gc = state.shared.gc.borrow();
        match &gc.heap.get(callee).payload {
            ObjectPayload::Closure { context, function } => {
                let (m, id) = module_fns::downcast(function).clone();
                (m, id, *context)
            }
            _ => return Err(VmError::NotCallable),
        }
    };

    maybe_optimize(state, &module, fn_id);

    let (arity, variadic_tail, is_method, slot_count, refslot_count) = {
        let func = module.get(fn_id).borrow();
        (
            func.arity,
            func.variadic_tail,
            func.is_method,
            func.slot_count,
            func.refslot_count,
        )
    };
    if variadic_tail {
        if args.len() < arity {
            return Err(VmError::ArityViolation { expected: arity, got: args.len() });
        }
    } else if args.len() != arity {
        return Err(VmError::ArityViolation { expected: arity, got: args.len() });
    }
    if module.get(fn_id).borrow().body.blocks.is_empty() {
        return Err(VmError::EmptyFunction);
    }

    let _guard = GcState::disable_guard(&state.shared.gc);
    let scope = build_call_scope(state, context, this, is_method, variadic_tail, arity, args)?;
    drop(_guard);

    push_frame(state, module, fn_id, scope, args, arity, slot_count, refslot_count, write_target);
    Ok(())
}

/// Builds the scope object a callee body runs against: a `this`-carrying
/// child scope for methods, further wrapped in an `arguments`-carrying
/// child scope for variadic tails. Either or both may be skipped, in which
/// case the closure's own captured `context` is used unchanged.
fn build_call_scope(
    state: &mut VMState,
    context: ObjHandle,
    this: Value,
    is_method: bool,
    variadic_tail: bool,
    arity: usize,
    args: &[Value],
) -> Result<ObjHandle> {
    let mut scope = context;
    if is_method {
        let mut gc = state.shared.gc.borrow_mut();
        let s = gc.alloc(Some(scope), ObjectPayload::Plain);
        fgc::set(&mut gc.heap, s, faxc_util::prepare_key_str("this"), this)?;
        gc.heap.get(s).set_flag(ObjectFlags::CLOSED);
        scope = s;
    }
    if variadic_tail {
        let varargs: Vec<Value> = args[arity..].to_vec();
        let mut gc = state.shared.gc.borrow_mut();
        let array = gc.alloc(Some(state.shared.vcache.array_base), ObjectPayload::Array(varargs));
        let s = gc.alloc(Some(scope), ObjectPayload::Plain);
        fgc::set(&mut gc.heap, s, faxc_util::prepare_key_str("arguments"), Value::Object(array))?;
        gc.heap.get(s).set_flag(ObjectFlags::CLOSED);
        scope = s;
    }
    Ok(scope)
}

#[allow(clippy::too_many_arguments)]
fn push_frame(
    state: &mut VMState,
    module: Rc<ModuleFns>,
    fn_id: UserFunctionId,
    scope: ObjHandle,
    args: &[Value],
    arity: usize,
    slot_count: usize,
    refslot_count: usize,
    write_target: Option<WriteArg>,
) {
    let mut slots = vec![Value::Null; slot_count];
    slots[1] = Value::Object(scope);
    for (i, arg) in args.iter().take(arity).enumerate() {
        slots[2 + i] = *arg;
    }
    let slots = Rc::new(RefCell::new(slots));
    let root_set = state.shared.gc.borrow_mut().push_root_set(slots.clone());
    state.frames.push(Callframe {
        module,
        function: fn_id,
        slots,
        refslots: vec![None; refslot_count],
        block: faxc_mir::BlockId::from_usize(0),
        prev_block: faxc_mir::BlockId::from_usize(0),
        idx: 0,
        root_set,
        write_target,
        stack_objects: Vec::new(),
    });
}

/// Mirrors `call_closure`'s `cl->num_called == 10` check, except tracked on
/// the shared `UserFunction` rather than per-`ClosureObject` — every
/// closure made from the same function literal shares one optimization
/// history (see DESIGN.md for why this tree made that simplification).
///
/// `compactify_registers` (the pipeline's last pass) remaps slot indices
/// in place, so it must never run while a frame of this same function is
/// still mid-execution lower on the stack — that frame's `idx`/`block` and
/// its already-sized `slots` array would resume against the rewritten IR.
/// A deep-enough recursion (the 10th call is itself a reentry) defers the
/// rewrite; it fires on a later, non-reentrant call instead.
fn maybe_optimize(state: &VMState, module: &ModuleFns, fn_id: UserFunctionId) {
    let mut func = module.get(fn_id).borrow_mut();
    func.num_called += 1;
    if func.num_called >= 10 && !func.opt_status.hot_pipeline_done && !has_live_frame(state, module, fn_id) {
        let gc = state.shared.gc.borrow();
        faxc_mir::run_hot_pipeline(&mut func, &gc);
    }
}

/// Whether `fn_id` (in `module`) already has a live callframe on the stack
/// — i.e. this call is a reentry (direct or mutual recursion).
fn has_live_frame(state: &VMState, module: &ModuleFns, fn_id: UserFunctionId) -> bool {
    state
        .frames
        .iter()
        .any(|f| f.function == fn_id && std::ptr::eq(f.module.as_ref(), module))
}

pub fn write_value(state: &VMState, target: WriteArg, value: Value) {
    match target {
        WriteArg::Slot(s) => state.top().set_slot(s, value),
        WriteArg::Refslot(r) => {
            let entry = state
                .top()
                .refslot(r)
                .expect("refslot read before its DefineRefslot");
            let mut gc = state.shared.gc.borrow_mut();
            gc.heap.get_mut(entry.0).table.set_value_at(entry.1, value);
        }
    }
}
