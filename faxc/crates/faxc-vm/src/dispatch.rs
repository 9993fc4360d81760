//! The bytecode dispatch loop. Grounded on `original_source/src/vm/vm.c`'s
//! per-opcode handlers (`vm_instr_*`) and its `[]`/`[]=` overload fallback
//! through a reentrant sub-VM. The original chains specialized handler
//! function pointers 9-at-a-time for instruction-cache locality; that
//! trick has no counterpart in safe Rust (there is no address to cache a
//! handler pointer into), so this is a plain `match` loop over
//! `InstrKind` instead — see DESIGN.md.

use faxc_mir::{Arg, BlockId, Instr, InstrKind, SetMode, WriteArg};
use faxc_util::index_vec::Idx;
use fgc::{GcState, ObjHandle, ObjectFlags, ObjectPayload, Value};

use crate::calling::{self, CallOutcome};
use crate::error::{Result, VmError};
use crate::module_fns;
use crate::state::{RunState, VMState};

/// Runs `state` to completion (TERMINATED or ERRORED). Used both for the
/// top-level VM and for a sub-VM spawned to resolve an operator overload.
pub fn run(state: &mut VMState) {
    if state.frames.is_empty() {
        state.run_state = RunState::Terminated;
        return;
    }
    state.run_state = RunState::Running;
    state.error = None;
    while state.run_state == RunState::Running {
        step(state);
    }
}

fn step(state: &mut VMState) {
    let instr = {
        let frame = state.top();
        let func = frame.module.get(frame.function).borrow();
        func.body.blocks[frame.block].instrs[frame.idx].clone()
    };
    state.shared.cyclecount.set(state.shared.cyclecount.get() + 1);
    match execute(state, &instr) {
        Ok(true) => {
            // Control-flow instructions (Br/TestBr/Return/Call into a
            // closure) already repositioned the frame cursor themselves.
        }
        Ok(false) => {
            state.top_mut().idx += 1;
        }
        Err(e) => state.fail(e),
    }
}

fn read_arg(state: &VMState, arg: Arg) -> Value {
    match arg {
        Arg::Slot(s) => state.top().slot(s),
        Arg::Refslot(r) => {
            let (obj, idx) = state
                .top()
                .refslot(r)
                .expect("refslot read before its DefineRefslot");
            let gc = state.shared.gc.borrow();
            gc.heap.get(obj).table.value_at(idx)
        }
        Arg::Value(v) => v,
    }
}

fn as_object(state: &VMState, v: Value) -> Result<ObjHandle> {
    match v {
        Value::Object(h) => Ok(h),
        Value::Null => Err(VmError::AccessOnNull),
        _ => {
            // Bridges primitives onto their base prototype so the caller
            // may still look properties up on them (§4.C "value-vs-prototype
            // bridging"). Only `as_object` callers that do property work
            // need this; arithmetic dispatch reads the tag directly.
            let base = match v {
                Value::Int(_) => state.shared.vcache.int_base,
                Value::Float(_) => state.shared.vcache.float_base,
                Value::Bool(_) => state.shared.vcache.bool_base,
                _ => unreachable!(),
            };
            Ok(base)
        }
    }
}

fn string_value(state: &VMState, obj: ObjHandle) -> Option<String> {
    let gc = state.shared.gc.borrow();
    if !fgc::instance_of_or_equal(&gc.heap, obj, state.shared.vcache.string_base) {
        return None;
    }
    match &gc.heap.get(obj).payload {
        ObjectPayload::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Executes one instruction. Returns `Ok(true)` if it repositioned the
/// frame cursor itself (branches, calls, returns); `Ok(false)` if the
/// caller should simply advance to the next instruction in this block.
fn execute(state: &mut VMState, instr: &Instr) -> Result<bool> {
    match &instr.kind {
        InstrKind::AllocObject { parent } => {
            let parent_v = read_arg(state, *parent);
            let parent = match parent_v {
                Value::Null => None,
                Value::Object(h) => {
                    let gc = state.shared.gc.borrow();
                    if gc.heap.get(h).has_flag(ObjectFlags::NOINHERIT) {
                        drop(gc);
                        return Err(VmError::NoInherit);
                    }
                    Some(h)
                }
                _ => return Err(VmError::NoInherit),
            };
            let mut gc = state.shared.gc.borrow_mut();
            let h = gc.alloc(parent, ObjectPayload::Plain);
            drop(gc);
            write(state, instr.write, Value::Object(h));
            Ok(false)
        }
        InstrKind::AllocIntObject { value } => {
            let v = read_arg(state, *value);
            let n = match v {
                Value::Int(n) => n,
                _ => 0,
            };
            let mut gc = state.shared.gc.borrow_mut();
            let h = gc.alloc(Some(state.shared.vcache.int_base), ObjectPayload::Int(n));
            drop(gc);
            write(state, instr.write, Value::Object(h));
            Ok(false)
        }
        InstrKind::AllocBoolObject { value } => {
            let v = read_arg(state, *value);
            let b = matches!(v, Value::Bool(true)) || matches!(v, Value::Int(n) if n != 0);
            let mut gc = state.shared.gc.borrow_mut();
            let h = gc.alloc(Some(state.shared.vcache.bool_base), ObjectPayload::Bool(b));
            drop(gc);
            write(state, instr.write, Value::Object(h));
            Ok(false)
        }
        InstrKind::AllocFloatObject { value } => {
            let v = read_arg(state, *value);
            let f = match v {
                Value::Float(f) => f,
                Value::Int(n) => n as f32,
                _ => 0.0,
            };
            let mut gc = state.shared.gc.borrow_mut();
            let h = gc.alloc(Some(state.shared.vcache.float_base), ObjectPayload::Float(f));
            drop(gc);
            write(state, instr.write, Value::Object(h));
            Ok(false)
        }
        InstrKind::AllocStringObject { value } => {
            let mut gc = state.shared.gc.borrow_mut();
            let h = gc.alloc(
                Some(state.shared.vcache.string_base),
                ObjectPayload::String(value.as_str().to_string()),
            );
            drop(gc);
            write(state, instr.write, Value::Object(h));
            Ok(false)
        }
        InstrKind::AllocArrayObject { values } => {
            let vs: Vec<Value> = values.iter().map(|a| read_arg(state, *a)).collect();
            let len = vs.len();
            // `h` stays unrooted from its `alloc` until `write` below lands
            // it in a slot/refslot; the second `alloc` (and the `set`) in
            // between must not be allowed to collect it out from under us.
            let _guard = GcState::disable_guard(&state.shared.gc);
            let mut gc = state.shared.gc.borrow_mut();
            let h = gc.alloc(Some(state.shared.vcache.array_base), ObjectPayload::Array(vs));
            let len_obj = gc.alloc(Some(state.shared.vcache.int_base), ObjectPayload::Int(len as i32));
            fgc::set(&mut gc.heap, h, faxc_util::prepare_key_str("length"), Value::Object(len_obj))?;
            drop(gc);
            write(state, instr.write, Value::Object(h));
            drop(_guard);
            Ok(false)
        }
        InstrKind::AllocClosureObject { context, function } => {
            let ctx_v = read_arg(state, *context);
            let ctx = as_object(state, ctx_v)?;
            let module = state.top().module.clone();
            let payload = module_fns::make_closure_payload(module, *function);
            let mut gc = state.shared.gc.borrow_mut();
            let h = gc.alloc(
                Some(state.shared.vcache.closure_base),
                ObjectPayload::Closure { context: ctx, function: payload },
            );
            drop(gc);
            write(state, instr.write, Value::Object(h));
            Ok(false)
        }
        InstrKind::AllocStaticObject { parent, fields } => {
            let parent_v = read_arg(state, *parent);
            let parent_obj = match parent_v {
                Value::Null => None,
                Value::Object(h) => Some(h),
                _ => None,
            };
            // `h` stays unrooted through the whole field-population loop
            // below, right up to the `write` that lands it in a slot or
            // refslot; nothing in that window may collect it.
            let _guard = GcState::disable_guard(&state.shared.gc);
            let mut gc = state.shared.gc.borrow_mut();
            let h = gc.alloc(parent_obj, ObjectPayload::Plain);
            drop(gc);
            for field in fields {
                let value = read_arg(state, field.value);
                let mut gc = state.shared.gc.borrow_mut();
                fgc::set(&mut gc.heap, h, field.key, value)?;
                if let Some(constraint) = field.constraint {
                    let c = read_arg(state, constraint);
                    if let Value::Object(c) = c {
                        fgc::set_constraint(&mut gc.heap, h, field.key, c)?;
                    }
                }
                drop(gc);
                if let Some(refslot) = field.refslot {
                    let mut key = field.key;
                    let gc = state.shared.gc.borrow();
                    let idx = gc.heap.get(h).table.lookup_index(&mut key).expect("just inserted");
                    drop(gc);
                    state.top_mut().set_refslot(refslot, (h, idx));
                }
            }
            let gc = state.shared.gc.borrow();
            gc.heap.get(h).set_flag(ObjectFlags::CLOSED);
            drop(gc);
            write(state, instr.write, Value::Object(h));
            drop(_guard);
            Ok(false)
        }

        InstrKind::Access { obj, key } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let key_v = read_arg(state, *key);
            let found = match key_v {
                Value::Object(key_obj) => {
                    if let Some(name) = string_value(state, key_obj) {
                        let mut fk = faxc_util::prepare_key_str(&name);
                        let gc = state.shared.gc.borrow();
                        fgc::lookup_found(&gc.heap, obj_h, &mut fk)
                    } else {
                        None
                    }
                }
                _ => None,
            };
            match found {
                Some((v, _)) => {
                    write(state, instr.write, v);
                    Ok(false)
                }
                None => {
                    let v = access_overload_fallback(state, obj_h, key_v)?;
                    write(state, instr.write, v);
                    Ok(false)
                }
            }
        }
        InstrKind::AccessStringKey { obj, key } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let mut fk = *key;
            let found = {
                let gc = state.shared.gc.borrow();
                fgc::lookup_found(&gc.heap, obj_h, &mut fk)
            };
            match found {
                Some((v, _)) => {
                    write(state, instr.write, v);
                    Ok(false)
                }
                None => {
                    let key_obj = {
                        let mut gc = state.shared.gc.borrow_mut();
                        gc.alloc(Some(state.shared.vcache.string_base), ObjectPayload::String(key.as_str().to_string()))
                    };
                    let v = access_overload_fallback(state, obj_h, Value::Object(key_obj))?;
                    write(state, instr.write, v);
                    Ok(false)
                }
            }
        }

        InstrKind::Assign { obj, key, value, mode } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let value_v = read_arg(state, *value);
            let key_v = read_arg(state, *key);
            match key_v {
                Value::Object(key_obj) if string_value(state, key_obj).is_some() => {
                    let name = string_value(state, key_obj).unwrap();
                    let fk = faxc_util::prepare_key_str(&name);
                    assign_by_key(state, obj_h, fk, value_v, *mode)?;
                }
                _ => {
                    assign_overload_fallback(state, obj_h, key_v, value_v)?;
                }
            }
            Ok(false)
        }
        InstrKind::AssignStringKey { obj, key, value, mode } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let value_v = read_arg(state, *value);
            assign_by_key(state, obj_h, *key, value_v, *mode)?;
            Ok(false)
        }

        InstrKind::KeyInObj { obj, key } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let key_v = read_arg(state, *key);
            let key_obj = match key_v {
                Value::Object(h) => h,
                _ => return Err(VmError::InKeyNotString),
            };
            let name = string_value(state, key_obj).ok_or(VmError::InKeyNotString)?;
            let mut fk = faxc_util::prepare_key_str(&name);
            let gc = state.shared.gc.borrow();
            let present = gc.heap.get(obj_h).table.contains_local(&mut fk)
                || fgc::lookup(&gc.heap, obj_h, &mut fk).is_some();
            drop(gc);
            write(state, instr.write, Value::Bool(present));
            Ok(false)
        }
        InstrKind::StringKeyInObj { obj, key } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let mut fk = *key;
            let gc = state.shared.gc.borrow();
            let present = fgc::lookup(&gc.heap, obj_h, &mut fk).is_some();
            drop(gc);
            write(state, instr.write, Value::Bool(present));
            Ok(false)
        }

        InstrKind::SetConstraint { obj, key, constraint } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let key_v = read_arg(state, *key);
            let key_obj = match key_v {
                Value::Object(h) => h,
                _ => return Err(VmError::ConstraintKeyNotString),
            };
            let name = string_value(state, key_obj).ok_or(VmError::ConstraintKeyNotString)?;
            let fk = faxc_util::prepare_key_str(&name);
            let c_v = read_arg(state, *constraint);
            let c = match c_v {
                Value::Object(h) => h,
                _ => return Err(VmError::ConstraintKeyNotString),
            };
            let mut gc = state.shared.gc.borrow_mut();
            fgc::set_constraint(&mut gc.heap, obj_h, fk, c)?;
            Ok(false)
        }
        InstrKind::SetConstraintStringKey { obj, key, constraint } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let c_v = read_arg(state, *constraint);
            let c = match c_v {
                Value::Object(h) => h,
                _ => return Err(VmError::ConstraintKeyNotString),
            };
            let mut gc = state.shared.gc.borrow_mut();
            fgc::set_constraint(&mut gc.heap, obj_h, *key, c)?;
            Ok(false)
        }

        InstrKind::CloseObject { obj } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let gc = state.shared.gc.borrow();
            gc.heap.get(obj_h).set_flag(ObjectFlags::CLOSED);
            Ok(false)
        }
        InstrKind::FreezeObject { obj } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let gc = state.shared.gc.borrow();
            gc.heap.get(obj_h).set_flag(ObjectFlags::FROZEN);
            Ok(false)
        }

        InstrKind::Identical { a, b } => {
            let av = read_arg(state, *a);
            let bv = read_arg(state, *b);
            write(state, instr.write, Value::Bool(av.identical(&bv)));
            Ok(false)
        }
        InstrKind::InstanceOf { obj, proto } => {
            let obj_v = read_arg(state, *obj);
            let proto_v = read_arg(state, *proto);
            let result = match (obj_v, proto_v) {
                (Value::Object(o), Value::Object(p)) => {
                    let gc = state.shared.gc.borrow();
                    fgc::instance_of(&gc.heap, o, p)
                }
                _ => false,
            };
            write(state, instr.write, Value::Bool(result));
            Ok(false)
        }
        InstrKind::Test { value } => {
            let v = read_arg(state, *value);
            let gc = state.shared.gc.borrow();
            let truthy = fgc::is_truthy(&gc.heap, v);
            drop(gc);
            write(state, instr.write, Value::Bool(truthy));
            Ok(false)
        }

        InstrKind::Br { target } => {
            jump(state, *target);
            Ok(true)
        }
        InstrKind::TestBr { cond, true_blk, false_blk } => {
            let v = read_arg(state, *cond);
            let truthy = {
                let gc = state.shared.gc.borrow();
                fgc::is_truthy(&gc.heap, v)
            };
            let target = if truthy { *true_blk } else { *false_blk };
            jump(state, target);
            Ok(true)
        }
        InstrKind::Phi { incoming } => {
            let prev = state.top().prev_block;
            let value = incoming
                .iter()
                .find(|(blk, _)| *blk == prev)
                .map(|(_, arg)| read_arg(state, *arg))
                .expect("phi has no incoming value for the predecessor actually taken");
            write(state, instr.write, value);
            Ok(false)
        }
        InstrKind::Return { value } => {
            let v = read_arg(state, *value);
            let write_target = state.top().write_target;
            state.pop_frame();
            if state.frames.is_empty() {
                state.result = v;
                state.run_state = RunState::Terminated;
            } else if let Some(target) = write_target {
                calling::write_value(state, target, v);
            }
            Ok(true)
        }

        InstrKind::Call { callee, this, args } => {
            let callee_v = read_arg(state, *callee);
            let this_v = read_arg(state, *this);
            let arg_vs: Vec<Value> = args.iter().map(|a| read_arg(state, *a)).collect();
            state.top_mut().idx += 1;
            match calling::setup_call(state, this_v, callee_v, &arg_vs, instr.write)? {
                CallOutcome::FramePushed => {}
                CallOutcome::Completed => {}
            }
            Ok(true)
        }
        InstrKind::CallFunctionDirect { function, this, args } => {
            let module = state.top().module.clone();
            let fn_entry_obj = {
                let mut gc = state.shared.gc.borrow_mut();
                let payload = module_fns::make_closure_payload(module, *function);
                gc.alloc(Some(state.shared.vcache.closure_base), ObjectPayload::Closure {
                    context: state.root,
                    function: payload,
                })
            };
            let this_v = read_arg(state, *this);
            let arg_vs: Vec<Value> = args.iter().map(|a| read_arg(state, *a)).collect();
            state.top_mut().idx += 1;
            calling::setup_call(state, this_v, Value::Object(fn_entry_obj), &arg_vs, instr.write)?;
            Ok(true)
        }

        InstrKind::DefineRefslot { obj, key, refslot } => {
            let obj_v = read_arg(state, *obj);
            let obj_h = as_object(state, obj_v)?;
            let mut fk = *key;
            let idx = {
                let gc = state.shared.gc.borrow();
                gc.heap.get(obj_h).table.lookup_index(&mut fk)
            };
            let idx = idx.ok_or_else(|| VmError::PropertyNotFound(key.as_str().to_string()))?;
            state.top_mut().set_refslot(*refslot, (obj_h, idx));
            Ok(false)
        }
        InstrKind::Move { src } => {
            let v = read_arg(state, *src);
            write(state, instr.write, v);
            Ok(false)
        }
    }
}

fn write(state: &mut VMState, target: Option<WriteArg>, value: Value) {
    if let Some(target) = target {
        calling::write_value(state, target, value);
    }
}

fn jump(state: &mut VMState, target: BlockId) {
    let frame = state.top_mut();
    frame.prev_block = frame.block;
    frame.block = target;
    frame.idx = 0;
}

fn assign_by_key(
    state: &mut VMState,
    obj: ObjHandle,
    key: faxc_util::FastKey,
    value: Value,
    mode: SetMode,
) -> Result<()> {
    let mut gc = state.shared.gc.borrow_mut();
    match mode {
        SetMode::Plain => fgc::set(&mut gc.heap, obj, key, value)?,
        SetMode::Existing => fgc::set_existing(&mut gc.heap, obj, key, value)?,
        SetMode::Shadowing => fgc::set_shadowing(&mut gc.heap, obj, key, value)?,
    }
    Ok(())
}

/// `[]` overload fallback: look up `[]` on the receiver's prototype chain
/// and invoke it via a reentrant sub-VM, per `vm_instr_access`'s tail.
fn access_overload_fallback(state: &mut VMState, obj: ObjHandle, key: Value) -> Result<Value> {
    let mut fk = faxc_util::prepare_key_str("[]");
    let overload = {
        let gc = state.shared.gc.borrow();
        fgc::lookup(&gc.heap, obj, &mut fk)
    };
    match overload {
        Some(f) => run_overload(state, "[]", f, Value::Object(obj), &[key]),
        None => Err(VmError::PropertyNotFoundAnonymous),
    }
}

/// `[]=` overload fallback, per `vm_instr_assign`'s non-string-key path.
fn assign_overload_fallback(state: &mut VMState, obj: ObjHandle, key: Value, value: Value) -> Result<()> {
    let mut fk = faxc_util::prepare_key_str("[]=");
    let overload = {
        let gc = state.shared.gc.borrow();
        fgc::lookup(&gc.heap, obj, &mut fk)
    };
    match overload {
        Some(f) => {
            run_overload(state, "[]=", f, Value::Object(obj), &[key, value])?;
            Ok(())
        }
        None => Err(VmError::NonStringKeyNoOverload("[]=".to_string())),
    }
}

/// Spawns a sub-VM sharing this VM's `SharedState`, drives it to
/// completion, and folds any error into this VM's own error with the
/// sub-VM's backtrace appended — "spawn and join", never merging frame
/// stacks (§5).
pub fn run_overload(state: &mut VMState, name: &'static str, callee: Value, this: Value, args: &[Value]) -> Result<Value> {
    let mut sub = state.sub_vm();
    match calling::setup_call(&mut sub, this, callee, args, None)? {
        CallOutcome::FramePushed => {
            run(&mut sub);
            if sub.run_state == RunState::Errored {
                state.backtrace = sub.backtrace;
                return Err(VmError::OverloadFailed(name, sub.error.unwrap_or_default()));
            }
            Ok(sub.result)
        }
        CallOutcome::Completed => Ok(sub.result),
    }
}
