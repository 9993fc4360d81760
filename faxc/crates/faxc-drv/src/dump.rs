//! `-v`'s IR dump: one line per instruction, grouped by block and
//! function, to stderr. Loosely mirrors `dump_fn`/`dump_instr` in
//! `original_source/src/vm/dump.c`, minus the raw per-instruction pointer
//! cast dispatch (nothing here is dispatched through a function-pointer
//! header field) and the FFI-specific opcodes that crate doesn't surface.

use faxc_mir::{CompiledModule, UserFunction};
use faxc_util::index_vec::Idx;

pub fn dump_module(module: &CompiledModule) {
    for (id, func) in module.functions.iter_enumerated() {
        let marker = if id == module.entry { " (entry)" } else { "" };
        dump_function(func, marker);
    }
}

fn dump_function(func: &UserFunction, marker: &str) {
    let name = func.name.map(|s| s.as_str().to_string()).unwrap_or_else(|| "<anonymous>".to_string());
    eprintln!(
        "fn {name}{marker}: arity={} variadic={} slots={} refslots={}",
        func.arity, func.variadic_tail, func.slot_count, func.refslot_count
    );
    for (block_id, block) in func.body.blocks.iter_enumerated() {
        eprintln!("  block{}:", block_id.index());
        for instr in &block.instrs {
            eprintln!("    {:?}", instr.kind);
        }
    }
}
