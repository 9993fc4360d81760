//! Object model and mark-and-sweep collector for a single-threaded,
//! stop-the-world embedded language runtime: a slab-indexed handle in
//! place of raw object pointers, an open-addressed property table per
//! object, prototype-chain lookup with three assignment modes, and a
//! bump-allocated frame stack for short-lived call-local objects.
//!
//! ```
//! use fgc::{GcConfig, GcState, ObjectPayload};
//!
//! let mut gc = GcState::new(GcConfig::default());
//! let obj = gc.alloc(None, ObjectPayload::Plain);
//! assert_eq!(gc.heap.object_count(), 1);
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod gc;
pub mod heap;
pub mod marker;
pub mod object;
pub mod stats;
pub mod value;

pub use allocator::FrameStack;
pub use config::GcConfig;
pub use error::{FgcError, Result};
pub use gc::{GcDisableGuard, GcState};
pub use heap::Heap;
pub use marker::{RootList, RootSetId};
pub use object::{
    instance_of, instance_of_or_equal, is_truthy, lookup, lookup_found, set, set_constraint,
    set_existing, set_shadowing, ObjHandle, Object, ObjectFlags, ObjectPayload, PropTable, SetMode,
};
pub use stats::GcStats;
pub use value::Value;
