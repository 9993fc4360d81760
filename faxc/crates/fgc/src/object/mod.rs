//! Object model: prototype-chain nodes, property tables, and the payload
//! each object variant carries.

pub mod header;
pub mod ops;
pub mod payload;
pub mod proptable;

pub use header::{ObjHandle, Object, ObjectFlags};
pub use ops::{instance_of, instance_of_or_equal, is_truthy, lookup, lookup_found, set, set_constraint, set_existing, set_shadowing};
pub use payload::ObjectPayload;
pub use proptable::{PropTable, SetMode};
