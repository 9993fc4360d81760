//! Helpers to allocate boxed primitive objects against a [`ValueCache`],
//! used by every builtin that hands a result back to the VM.

use fgc::{GcState, ObjHandle, ObjectPayload, Value};

use crate::value_cache::ValueCache;

pub fn box_int(gc: &mut GcState, vcache: &ValueCache, n: i32) -> Value {
    Value::Object(gc.alloc(Some(vcache.int_base), ObjectPayload::Int(n)))
}

pub fn box_float(gc: &mut GcState, vcache: &ValueCache, f: f32) -> Value {
    Value::Object(gc.alloc(Some(vcache.float_base), ObjectPayload::Float(f)))
}

pub fn box_bool(gc: &mut GcState, vcache: &ValueCache, b: bool) -> Value {
    Value::Object(gc.alloc(Some(vcache.bool_base), ObjectPayload::Bool(b)))
}

pub fn box_string(gc: &mut GcState, vcache: &ValueCache, s: impl Into<String>) -> Value {
    Value::Object(gc.alloc(Some(vcache.string_base), ObjectPayload::String(s.into())))
}

/// Allocates the array object and sets its visible `length` property, same
/// pair every array-producing builtin (`keys`, `push`, `resize`, `[]=`
/// siblings) needs to keep in sync.
pub fn box_array(gc: &mut GcState, vcache: &ValueCache, elems: Vec<Value>) -> Value {
    let len = elems.len() as i32;
    let h = gc.alloc(Some(vcache.array_base), ObjectPayload::Array(elems));
    set_length(gc, vcache, h, len);
    Value::Object(h)
}

pub fn set_length(gc: &mut GcState, vcache: &ValueCache, array: ObjHandle, len: i32) {
    let len_obj = Value::Object(gc.alloc(Some(vcache.int_base), ObjectPayload::Int(len)));
    let _ = fgc::set(&mut gc.heap, array, faxc_util::prepare_key_str("length"), len_obj);
}

pub fn box_pointer(gc: &mut GcState, vcache: &ValueCache, addr: usize) -> Value {
    Value::Object(gc.alloc(
        Some(vcache.pointer_base),
        ObjectPayload::Pointer(fgc::object::payload::RawPointer { addr, on_free: None }),
    ))
}
