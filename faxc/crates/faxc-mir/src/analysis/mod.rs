//! Control-flow analysis for MIR.

pub mod cfg;

pub use cfg::*;
