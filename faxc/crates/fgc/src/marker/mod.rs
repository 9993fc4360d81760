//! Single-threaded recursive mark over [`crate::object::ObjHandle`]s: for
//! each root set, for each value, if the value is an object reference,
//! recursively mark. An object already carrying `GC_MARK` short-circuits,
//! breaking cycles. An object's extra references (closure environment,
//! array elements — see [`crate::object::ObjectPayload::extra_refs`]) are
//! marked after its own table entries.

pub mod roots;

pub use roots::{RootList, RootSetId};
