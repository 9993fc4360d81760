//! Core utilities shared across every compiler/runtime crate: symbol
//! interning, typed index vectors, definition ids, diagnostics, source
//! spans, and the interned property-key table.

pub mod def_id;
pub mod diagnostic;
pub mod error;
pub mod fastkey;
pub mod index_vec;
pub mod span;
pub mod symbol;

pub use def_id::{DefId, DefIdGenerator};
pub use fastkey::{prepare_key, prepare_key_str, FastKey};
pub use index_vec::{Idx, IndexVec};
pub use span::Span;
pub use symbol::Symbol;

pub use rustc_hash::{FxHashMap, FxHashSet};
