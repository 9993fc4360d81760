//! Tag-checked payload extraction: `obj_instance_of(v, base)` followed by a
//! payload match, the same two-step every handler in
//! `original_source/src/vm/runtime.c` performs before touching a value.

use fgc::{GcState, ObjectPayload, Value};

use crate::value_cache::ValueCache;

pub fn as_int(gc: &GcState, vcache: &ValueCache, v: Value) -> Option<i32> {
    let h = v.as_object()?;
    if !fgc::instance_of_or_equal(&gc.heap, h, vcache.int_base) {
        return None;
    }
    match gc.heap.get(h).payload {
        ObjectPayload::Int(n) => Some(n),
        _ => None,
    }
}

pub fn as_float(gc: &GcState, vcache: &ValueCache, v: Value) -> Option<f32> {
    let h = v.as_object()?;
    if !fgc::instance_of_or_equal(&gc.heap, h, vcache.float_base) {
        return None;
    }
    match gc.heap.get(h).payload {
        ObjectPayload::Float(f) => Some(f),
        _ => None,
    }
}

pub fn as_bool(gc: &GcState, vcache: &ValueCache, v: Value) -> Option<bool> {
    let h = v.as_object()?;
    if !fgc::instance_of_or_equal(&gc.heap, h, vcache.bool_base) {
        return None;
    }
    match gc.heap.get(h).payload {
        ObjectPayload::Bool(b) => Some(b),
        _ => None,
    }
}

pub fn as_string(gc: &GcState, vcache: &ValueCache, v: Value) -> Option<String> {
    let h = v.as_object()?;
    if !fgc::instance_of_or_equal(&gc.heap, h, vcache.string_base) {
        return None;
    }
    match &gc.heap.get(h).payload {
        ObjectPayload::String(s) => Some(s.clone()),
        _ => None,
    }
}

pub fn as_array_len(gc: &GcState, vcache: &ValueCache, v: Value) -> Option<usize> {
    let h = v.as_object()?;
    if !fgc::instance_of_or_equal(&gc.heap, h, vcache.array_base) {
        return None;
    }
    match &gc.heap.get(h).payload {
        ObjectPayload::Array(elems) => Some(elems.len()),
        _ => None,
    }
}
