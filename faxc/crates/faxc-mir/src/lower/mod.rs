//! Lowers a parsed module (`faxc_par::ast::Program`) into SSA IR via the
//! [`crate::builder::Builder`]. The source language resolves every name
//! dynamically — there is no static slot assignment for locals — so this
//! pass never consults `faxc-sem`'s scope tree; it only emits the same
//! scope-object machinery the VM walks at runtime (see [`ast_to_mir`]'s
//! module doc for the scope-chaining scheme this mirrors).

pub mod ast_to_mir;

pub use ast_to_mir::lower_program;
