//! Per-object payload.
//!
//! Objects need per-variant mark and free behavior that a generic
//! property table can't express on its own: a closure's captured
//! environment, an array's element vector, a native pointer's external
//! resource. Rather than storing a callable that closes over GC-managed
//! data (which isn't expressible without `unsafe` here), every variant
//! that needs extra marking or freeing is named in this enum, and the
//! heap matches on it directly during mark and sweep.
//!
//! `Closure`'s `function` field is `Rc<dyn Any>` rather than
//! `Rc<faxc_mir::UserFunction>` directly: `faxc-mir` depends on `fgc` for
//! `Value`, so `fgc` cannot depend back on `faxc-mir` without a cycle.
//! `faxc-vm` downcasts this back to `faxc_mir::UserFunction` when it needs
//! the function body.
use std::any::Any;
use std::rc::Rc;

use crate::object::ObjHandle;
use crate::value::Value;

/// Native callables report failure as a string message, same as every
/// other runtime diagnostic — there's no typed exception object to
/// construct from inside a Rust closure that doesn't know the VM's error
/// type.
pub type NativeFn = Rc<dyn Fn(&mut crate::gc::GcState, Value, &[Value]) -> Result<Value, String>>;

pub enum ObjectPayload {
    /// A plain object: nothing beyond its property table needs marking.
    Plain,
    Int(i32),
    Float(f32),
    Bool(bool),
    /// Owns its string data directly; nothing extra for the GC to reach.
    String(String),
    /// Array elements may themselves be object references; mark_fn's
    /// counterpart in the original is exactly this vector scan.
    Array(Vec<Value>),
    /// A closure captures its defining scope; `mark_fn` in the original
    /// marks `context` after the table's own entries.
    Closure { context: ObjHandle, function: Rc<dyn Any> },
    /// A native (builtin or FFI-bound) callable. Not separately GC-tracked.
    Function(NativeFn),
    /// An FFI raw pointer payload; `free_fn`'s counterpart for native
    /// resources that must be released exactly once on sweep.
    Pointer(RawPointer),
}

pub struct RawPointer {
    pub addr: usize,
    pub on_free: Option<Rc<dyn Fn(usize)>>,
}

impl ObjectPayload {
    /// Objects whose extra references (beyond the property table) must be
    /// marked for the GC to see them.
    pub fn extra_refs(&self) -> Vec<Value> {
        match self {
            ObjectPayload::Array(elems) => elems.clone(),
            ObjectPayload::Closure { context, .. } => vec![Value::Object(*context)],
            _ => Vec::new(),
        }
    }
}
