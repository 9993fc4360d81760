//! Component I: root object wiring (int/float/bool/string/array/closure/
//! function/pointer prototypes), value boxing/coercion helpers, and the
//! FFI surface, built on top of `fgc`'s object model and collector.

pub mod boxed;
pub mod coerce;
pub mod ffi;
pub mod root;
pub mod value_cache;

pub use boxed::{box_array, box_bool, box_float, box_int, box_pointer, box_string, set_length};
pub use coerce::{as_array_len, as_bool, as_float, as_int, as_string};
pub use root::build_root;
pub use value_cache::ValueCache;
