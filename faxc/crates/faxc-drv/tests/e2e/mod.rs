//! End-to-end tests driving the built `interp` binary directly, covering
//! the spec's seeded scenarios and CLI argument surface.

mod cli_tests;
