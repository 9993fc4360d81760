//! Frame-local ("STACK") allocation: the bump-stack companion to the GC
//! heap, for objects whose lifetime is tied to a callframe rather than to
//! reachability.

pub mod bump;

pub use bump::FrameStack;
