//! Entry point for the `tests/e2e/` module tree (Cargo only discovers
//! `tests/*.rs` as integration-test crate roots, not nested directories).
#[path = "e2e/mod.rs"]
mod e2e;
