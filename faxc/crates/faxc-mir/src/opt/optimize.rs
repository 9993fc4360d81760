//! The optimizer pipeline: the eleven named passes of spec.md component G,
//! run in its documented two-phase schedule. Phase 1 runs once at parse
//! time and needs no heap access (everything it touches — string literals,
//! static-object field sets — is already fully determined by the
//! instruction stream). Phase 2 runs once a function crosses the hot-call
//! threshold and needs read access to the heap (`inline_static_lookups_to_constants`
//! resolves lookups against the live prototype chain of the initial
//! context). Grounded pass-by-pass on `original_source/src/vm/optimize.c`.

use std::collections::{HashMap, HashSet};

use faxc_util::FastKey;
use fgc::{GcState, ObjHandle, ObjectFlags, Value};

use crate::analysis::cfg::{dominates, ControlFlowGraph, ENTRY_BLOCK};
use crate::mir::*;
use crate::opt::static_object;

/// Phase 1: `inline_primitive_accesses` then `redirect_predictable_lookup_misses`.
/// Purely syntactic — no heap access, so this is safe to run the moment a
/// function is lowered.
pub fn run_parse_time_passes(func: &mut UserFunction) {
    if func.opt_status.parse_time_done {
        return;
    }
    inline_primitive_accesses(func);
    redirect_predictable_lookup_misses(func);
    func.opt_status.parse_time_done = true;
}

/// Phase 2: the full hot-call pipeline. Runs `run_parse_time_passes` first
/// if it somehow hasn't run yet (a function compiled and immediately hot,
/// with no intervening parse-time pass), then the documented "full
/// pipeline twice with an inline-constants pass between", then finalizes
/// with dead-store elimination, block pruning, and register compaction —
/// in that order, since compaction breaks the SSA invariant every earlier
/// pass depends on and so must run last and only once.
pub fn run_hot_pipeline(func: &mut UserFunction, heap: &GcState) {
    if func.opt_status.hot_pipeline_done {
        return;
    }
    if !func.opt_status.parse_time_done {
        run_parse_time_passes(func);
    }

    run_core_passes(func, heap);
    inline_constant_slots(func);
    run_core_passes(func, heap);

    remove_dead_slot_writes(func);
    remove_pointless_blocks(func);
    compactify_registers(func);

    func.opt_status.hot_pipeline_done = true;
    func.opt_status.non_ssa = true;
}

/// The context-aware, heap-reading core of the pipeline:
/// `inline_static_lookups_to_constants`, `access_vars_via_refslots`,
/// `slot_refslot_fuse`, `fuse_static_object_alloc`, `call_functions_directly`.
/// Iterated to a local fixed point (bounded) since each pass can expose new
/// opportunities for the others (fusing a refslot definition can make a
/// static-object alloc sequence contiguous enough for
/// `fuse_static_object_alloc` to match, for instance).
fn run_core_passes(func: &mut UserFunction, heap: &GcState) {
    let mut changed = true;
    let mut iterations = 0;
    const MAX_ITERATIONS: u32 = 8;
    while changed && iterations < MAX_ITERATIONS {
        changed = false;
        changed |= inline_static_lookups_to_constants(func, heap);
        changed |= access_vars_via_refslots(func);
        changed |= slot_refslot_fuse(func);
        changed |= fuse_static_object_alloc(func);
        changed |= call_functions_directly(func);
        iterations += 1;
    }
}

// ---------------------------------------------------------------------
// 1. inline_primitive_accesses
// ---------------------------------------------------------------------

/// Replaces `Access`/`Assign`/`SetConstraint`/`KeyInObj` by their
/// `*StringKey` forms wherever the key operand provably holds a string
/// literal: a slot written, anywhere in the function, by exactly one
/// `AllocStringObject` (guaranteed unique under SSA). The literal's bytes
/// are read straight out of the instruction — no heap lookup needed, which
/// is why this pass runs at parse time rather than waiting for the hot-call
/// pipeline.
fn inline_primitive_accesses(func: &mut UserFunction) -> bool {
    let mut literal_keys: HashMap<SlotId, FastKey> = HashMap::new();
    for block in func.body.blocks.as_slice() {
        for instr in &block.instrs {
            if let (InstrKind::AllocStringObject { value }, Some(WriteArg::Slot(s))) = (&instr.kind, instr.write) {
                literal_keys.insert(s, faxc_util::prepare_key_str(value.as_str()));
            }
        }
    }
    if literal_keys.is_empty() {
        return false;
    }

    let mut changed = false;
    for block in func.body.blocks.as_mut_slice() {
        for instr in &mut block.instrs {
            let Some(Arg::Slot(key_slot)) = key_arg(&instr.kind) else { continue };
            let Some(&key) = literal_keys.get(&key_slot) else { continue };
            if specialize_to_string_key(&mut instr.kind, key) {
                changed = true;
            }
        }
    }
    changed
}

fn key_arg(kind: &InstrKind) -> Option<Arg> {
    match kind {
        InstrKind::Access { key, .. } => Some(*key),
        InstrKind::Assign { key, .. } => Some(*key),
        InstrKind::KeyInObj { key, .. } => Some(*key),
        InstrKind::SetConstraint { key, .. } => Some(*key),
        _ => None,
    }
}

fn specialize_to_string_key(kind: &mut InstrKind, key: FastKey) -> bool {
    let placeholder = InstrKind::Test { value: Arg::Value(Value::Null) };
    match std::mem::replace(kind, placeholder) {
        InstrKind::Access { obj, .. } => {
            *kind = InstrKind::AccessStringKey { obj, key };
            true
        }
        InstrKind::Assign { obj, value, mode, .. } => {
            *kind = InstrKind::AssignStringKey { obj, key, value, mode };
            true
        }
        InstrKind::KeyInObj { obj, .. } => {
            *kind = InstrKind::StringKeyInObj { obj, key };
            true
        }
        InstrKind::SetConstraint { obj, constraint, .. } => {
            *kind = InstrKind::SetConstraintStringKey { obj, constraint, key };
            true
        }
        other => {
            *kind = other;
            false
        }
    }
}

// ---------------------------------------------------------------------
// 2. redirect_predictable_lookup_misses
// ---------------------------------------------------------------------

/// On a closed static object, a lookup for a key not among its known local
/// fields can never land there — it must come from the parent. Rewrite the
/// access to target the parent directly, skipping this object's own table
/// probe. Iterated (via the caller's fixed point) so a chain of nested
/// static objects redirects one link at a time.
fn redirect_predictable_lookup_misses(func: &mut UserFunction) -> bool {
    let statics = static_object::analyze(func);
    if statics.is_empty() {
        return false;
    }
    let mut changed = false;
    for block in func.body.blocks.as_mut_slice() {
        for instr in &mut block.instrs {
            match &mut instr.kind {
                InstrKind::AccessStringKey { obj, key } => {
                    if let Arg::Slot(s) = obj {
                        if let Some(info) = statics.get(s) {
                            if info.field(key).is_none() {
                                if let Arg::Value(Value::Null) = info.parent {
                                    // No known parent (the root literal) — nothing to redirect to.
                                } else {
                                    *obj = info.parent;
                                    changed = true;
                                }
                            }
                        }
                    }
                }
                InstrKind::StringKeyInObj { obj, key } => {
                    if let Arg::Slot(s) = obj {
                        if let Some(info) = statics.get(s) {
                            if info.field(key).is_none() {
                                if !matches!(info.parent, Arg::Value(Value::Null)) {
                                    *obj = info.parent;
                                    changed = true;
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
    }
    changed
}

// ---------------------------------------------------------------------
// 3. inline_static_lookups_to_constants
// ---------------------------------------------------------------------

/// Where the lookup target is provably a `CLOSED | FROZEN` object
/// descended from the initial context (the module root, reachable via the
/// entry function's scope chain with no intervening mutation), emit a
/// `Move` of the known value instead of probing the table at runtime.
/// Context-aware: only fires when the dominator tree proves the receiver's
/// identity is fixed at this program point (guarded `instanceof` branches
/// whose true successor has this access as its sole predecessor count).
fn inline_static_lookups_to_constants(func: &mut UserFunction, heap: &GcState) -> bool {
    let cfg = ControlFlowGraph::new(&func.body);
    // Slots proven (by a dominating `InstanceOf`-guarded branch with a
    // single-predecessor true successor) to hold an object descended from
    // a known closed+frozen prototype. Both `cfg` and `guarded` are owned
    // snapshots, so nothing here keeps borrowing `func` once computed.
    let guarded = collect_instanceof_guards(func, &cfg);
    if guarded.is_empty() {
        return false;
    }

    let mut changed = false;
    let ids: Vec<BlockId> = func.body.blocks.indices().collect();
    for id in ids {
        let block = &mut func.body.blocks[id];
        for instr in block.instrs.iter_mut() {
            let InstrKind::AccessStringKey { obj, key } = &instr.kind else { continue };
            let Arg::Slot(obj_slot) = *obj else { continue };
            let Some(known) = guarded.get(&obj_slot) else { continue };
            if !dominates_block(&cfg, known.guard_block, id) {
                continue;
            }
            if let Some(value) = resolve_constant_field(heap, known.proto, *key) {
                instr.kind = InstrKind::Move { src: Arg::Value(value) };
                changed = true;
            }
        }
    }
    changed
}

struct KnownProto {
    proto: ObjHandle,
    guard_block: BlockId,
}

/// Finds `TestBr`s whose condition is `InstanceOf { obj, proto: Value(Object(p)) }`
/// where the true successor's only predecessor is this block — i.e. the
/// only way to reach the true branch is through this test having passed.
fn collect_instanceof_guards(func: &UserFunction, cfg: &ControlFlowGraph) -> HashMap<SlotId, KnownProto> {
    let mut result = HashMap::new();
    let mut test_results: HashMap<SlotId, (Arg, ObjHandle)> = HashMap::new();
    for block in func.body.blocks.as_slice() {
        for instr in &block.instrs {
            if let (InstrKind::InstanceOf { obj, proto: Arg::Value(Value::Object(p)) }, Some(WriteArg::Slot(s))) =
                (&instr.kind, instr.write)
            {
                test_results.insert(s, (*obj, *p));
            }
        }
    }
    for (id, block) in func.body.blocks.iter_enumerated() {
        let Some(InstrKind::TestBr { cond: Arg::Slot(cond_slot), true_blk, .. }) = block.instrs.last().map(|i| &i.kind)
        else {
            continue;
        };
        let Some(&(obj_arg, proto)) = test_results.get(cond_slot) else { continue };
        let Arg::Slot(obj_slot) = obj_arg else { continue };
        if cfg.predecessors.get(true_blk).map(|p| p.len()).unwrap_or(0) == 1 {
            result.insert(obj_slot, KnownProto { proto, guard_block: *true_blk });
        }
        let _ = id;
    }
    result
}

fn dominates_block(cfg: &ControlFlowGraph, guard_block: BlockId, site: BlockId) -> bool {
    dominates(cfg, guard_block, site)
}

fn resolve_constant_field(heap: &GcState, proto: ObjHandle, key: FastKey) -> Option<Value> {
    let obj = heap.heap.get(proto);
    if !obj.has_flag(ObjectFlags::CLOSED) || !obj.has_flag(ObjectFlags::FROZEN) {
        return None;
    }
    let mut k = key;
    fgc::lookup(&heap.heap, proto, &mut k)
}

// ---------------------------------------------------------------------
// 4. access_vars_via_refslots
// ---------------------------------------------------------------------

/// For each slot provably alloc-then-assign-then-close (a static object
/// with no intervening mutation), emits `DefineRefslot` right after the
/// close for every field it was populated with, then rewrites subsequent
/// `AccessStringKey` on that slot/key pair to `Move` from the refslot.
fn access_vars_via_refslots(func: &mut UserFunction) -> bool {
    let statics = static_object::analyze(func);
    if statics.is_empty() {
        return false;
    }
    let mut changed = false;

    for block in func.body.blocks.as_mut_slice() {
        // Find each candidate's CloseObject position so the refslot
        // definitions can be spliced in immediately after it.
        let mut close_positions: Vec<(usize, SlotId)> = Vec::new();
        for (idx, instr) in block.instrs.iter().enumerate() {
            if let InstrKind::CloseObject { obj: Arg::Slot(s) } = &instr.kind {
                if statics.contains_key(s) {
                    close_positions.push((idx, *s));
                }
            }
        }
        if close_positions.is_empty() {
            continue;
        }

        // Assign fresh refslot ids for every field of every candidate
        // closed in this block that doesn't already have one defined.
        // `FastKey` carries no `Hash` impl (its identity is a raw pointer
        // plus length, meant for O(1) direct comparison, not hashing) so
        // these stay small linear vectors rather than hash maps/sets.
        let mut already_defined: Vec<(SlotId, FastKey)> = Vec::new();
        for instr in &block.instrs {
            if let InstrKind::DefineRefslot { obj: Arg::Slot(s), key, .. } = &instr.kind {
                already_defined.push((*s, *key));
            }
        }

        let mut insertions: Vec<(usize, Instr)> = Vec::new();
        let mut new_refslots: Vec<((SlotId, FastKey), RefslotId)> = Vec::new();
        for (idx, slot) in &close_positions {
            let info = &statics[slot];
            for field in &info.fields {
                if already_defined.iter().any(|(s, k)| s == slot && *k == field.key) {
                    continue;
                }
                let refslot = RefslotId(func.refslot_count as u32);
                func.refslot_count += 1;
                new_refslots.push(((*slot, field.key), refslot));
                insertions.push((
                    idx + 1,
                    Instr {
                        kind: InstrKind::DefineRefslot { obj: Arg::Slot(*slot), key: field.key, refslot },
                        write: None,
                        context: Arg::Slot(crate::builder::SCOPE_SLOT),
                        span: faxc_util::Span::DUMMY,
                    },
                ));
                changed = true;
            }
        }
        if new_refslots.is_empty() {
            continue;
        }

        // Rewrite existing accesses on those slot/key pairs to read via the
        // new refslot before splicing the definitions in (indices below
        // the insertion points are unaffected by the splice).
        for instr in block.instrs.iter_mut() {
            if let InstrKind::AccessStringKey { obj: Arg::Slot(s), key } = &instr.kind {
                if let Some(&(_, refslot)) = new_refslots.iter().find(|((rs, rk), _)| rs == s && rk == key) {
                    instr.kind = InstrKind::Move { src: Arg::Refslot(refslot) };
                    changed = true;
                }
            }
        }

        insertions.sort_by(|a, b| b.0.cmp(&a.0));
        for (idx, instr) in insertions {
            block.instrs.insert(idx, instr);
        }
    }

    changed
}

// ---------------------------------------------------------------------
// 5. inline_constant_slots
// ---------------------------------------------------------------------

/// Substitutes `Arg::Value`/`Arg::Refslot` directly into operand positions
/// wherever a slot was written by a `Move` of a value or a refslot read —
/// the copy-propagation step. Under SSA a slot has exactly one writer, so
/// this never needs liveness analysis; it's run once, between the two
/// passes of the hot-call pipeline, on purpose — the first pass of
/// `access_vars_via_refslots` introduces fresh `Move`s from refslots that
/// this pass then flattens into every reader before the pipeline's second
/// pass re-derives static-object/refslot opportunities from the simplified
/// form.
fn inline_constant_slots(func: &mut UserFunction) -> bool {
    let mut substitutions: HashMap<SlotId, Arg> = HashMap::new();
    for block in func.body.blocks.as_slice() {
        for instr in &block.instrs {
            if let (InstrKind::Move { src }, Some(WriteArg::Slot(s))) = (&instr.kind, instr.write) {
                if matches!(src, Arg::Value(_) | Arg::Refslot(_)) {
                    substitutions.insert(s, *src);
                }
            }
        }
    }
    if substitutions.is_empty() {
        return false;
    }

    let mut changed = false;
    for block in func.body.blocks.as_mut_slice() {
        for instr in &mut block.instrs {
            map_all_args(&mut instr.kind, &mut |a| {
                if let Arg::Slot(s) = a {
                    if let Some(&replacement) = substitutions.get(s) {
                        *a = replacement;
                        changed = true;
                    }
                }
            });
        }
    }
    changed
}

// ---------------------------------------------------------------------
// 6. slot_refslot_fuse
// ---------------------------------------------------------------------

/// `tmp = op(...); refslot = tmp` (a `Move` from `tmp` into a refslot-typed
/// write — modeled here as a `DefineRefslot`'s owning object arriving via a
/// slot that itself only ever feeds that one refslot) merges when `tmp`
/// has exactly two uses: the write and this one read. Concretely: a
/// `Move { src: Arg::Slot(tmp) }` whose only other use of `tmp` is as the
/// `obj` of a `DefineRefslot` collapses — the intermediate move is dropped
/// and the refslot's owning object becomes `tmp`'s own defining value
/// directly wherever profitable (no behavior change, fewer instructions
/// for `remove_dead_slot_writes` to later confirm dead).
fn slot_refslot_fuse(func: &mut UserFunction) -> bool {
    let mut use_counts: HashMap<SlotId, u32> = HashMap::new();
    for block in func.body.blocks.as_slice() {
        for instr in &block.instrs {
            instr.kind.for_each_read_arg(|a| {
                if let Arg::Slot(s) = a {
                    *use_counts.entry(s).or_insert(0) += 1;
                }
            });
        }
    }

    let mut moves: HashMap<SlotId, Arg> = HashMap::new();
    for block in func.body.blocks.as_slice() {
        for instr in &block.instrs {
            if let (InstrKind::Move { src }, Some(WriteArg::Slot(dst))) = (&instr.kind, instr.write) {
                if let Arg::Slot(tmp) = src {
                    if use_counts.get(tmp).copied().unwrap_or(0) == 1 {
                        moves.insert(dst, *src);
                        let _ = tmp;
                    }
                }
            }
        }
    }
    if moves.is_empty() {
        return false;
    }

    let mut changed = false;
    for block in func.body.blocks.as_mut_slice() {
        for instr in &mut block.instrs {
            if let InstrKind::DefineRefslot { obj, .. } = &mut instr.kind {
                if let Arg::Slot(s) = obj {
                    if let Some(&replacement) = moves.get(s) {
                        *obj = replacement;
                        changed = true;
                    }
                }
            }
        }
    }
    changed
}

// ---------------------------------------------------------------------
// 7. fuse_static_object_alloc
// ---------------------------------------------------------------------

/// When a slot fully matches alloc-then-populate-then-close-then-refslot-define,
/// the whole run collapses into one `AllocStaticObject`, embedding every
/// key/constraint/slot/refslot/offset in one instruction for
/// table-preallocated creation — the VM allocates the object and its table
/// in a single call and installs the refslot pointers directly at their
/// final property-entry addresses.
fn fuse_static_object_alloc(func: &mut UserFunction) -> bool {
    let statics = static_object::analyze(func);
    if statics.is_empty() {
        return false;
    }
    let mut changed = false;

    for block in func.body.blocks.as_mut_slice() {
        let mut candidates: Vec<SlotId> = Vec::new();
        for instr in block.instrs.iter() {
            if let (InstrKind::AllocObject { .. }, Some(WriteArg::Slot(s))) = (&instr.kind, instr.write) {
                if statics.contains_key(&s) && !candidates.contains(&s) {
                    candidates.push(s);
                }
            }
        }
        if candidates.is_empty() {
            continue;
        }

        // Fused one slot at a time, re-locating its `AllocObject` position
        // fresh from the current (possibly already-shrunk-by-a-prior-slot)
        // instruction list — a stale index from before an earlier slot's
        // fusion would point at the wrong instruction.
        for slot in candidates {
            let Some(start) = block.instrs.iter().position(|instr| {
                matches!((&instr.kind, instr.write), (InstrKind::AllocObject { .. }, Some(WriteArg::Slot(s))) if s == slot)
            }) else {
                continue;
            };
            let info = &statics[&slot];
            // Gather refslots already defined against this slot's fields in
            // this block so the fused instruction can embed them directly.
            // Linear vector, not a map — `FastKey` has no `Hash` impl.
            let mut refslot_for_key: Vec<(FastKey, RefslotId)> = Vec::new();
            for instr in &block.instrs {
                if let InstrKind::DefineRefslot { obj: Arg::Slot(s), key, refslot } = &instr.kind {
                    if *s == slot {
                        refslot_for_key.push((*key, *refslot));
                    }
                }
            }

            let parent = info.parent;
            let fields: Vec<StaticObjectField> = info
                .fields
                .iter()
                .map(|f| StaticObjectField {
                    key: f.key,
                    constraint: f.constraint,
                    value: f.value,
                    refslot: refslot_for_key.iter().find(|(k, _)| *k == f.key).map(|(_, r)| *r),
                })
                .collect();

            // Remove the AllocObject, every AssignStringKey/SetConstraintStringKey/
            // DefineRefslot/CloseObject instruction touching this slot, and
            // replant the fused alloc at the original position.
            let original_len = block.instrs.len();
            let mut keep = Vec::with_capacity(original_len);
            let mut fused_emitted = false;
            for (idx, instr) in std::mem::take(&mut block.instrs).into_iter().enumerate() {
                let touches_slot = matches!(
                    &instr.kind,
                    InstrKind::AssignStringKey { obj: Arg::Slot(s), .. }
                        | InstrKind::SetConstraintStringKey { obj: Arg::Slot(s), .. }
                        | InstrKind::DefineRefslot { obj: Arg::Slot(s), .. }
                        | InstrKind::CloseObject { obj: Arg::Slot(s) }
                    if *s == slot
                );
                if idx == start {
                    keep.push(Instr {
                        kind: InstrKind::AllocStaticObject { parent, fields: fields.clone() },
                        write: Some(WriteArg::Slot(slot)),
                        context: instr.context,
                        span: instr.span,
                    });
                    fused_emitted = true;
                    changed = true;
                } else if touches_slot {
                    // dropped — folded into the fused instruction
                } else {
                    keep.push(instr);
                }
            }
            block.instrs = keep;
            debug_assert!(fused_emitted);
        }
    }

    changed
}

// ---------------------------------------------------------------------
// 8. call_functions_directly
// ---------------------------------------------------------------------

/// Rewrites `Call` to `CallFunctionDirect` when the callee traces back
/// (under SSA's single-writer guarantee) to an `AllocClosureObject` in this
/// same function body, whose target `UserFunctionId` is therefore already
/// known without any heap access. A closure captured from an outer scope
/// and passed in as a value is not eligible here — resolving its target
/// means downcasting the payload's `Rc<dyn Any>`, which only the calling
/// convention above this layer knows how to do.
fn call_functions_directly(func: &mut UserFunction) -> bool {
    let mut known_functions: HashMap<SlotId, UserFunctionId> = HashMap::new();
    for block in func.body.blocks.as_slice() {
        for instr in &block.instrs {
            if let (InstrKind::AllocClosureObject { function, .. }, Some(WriteArg::Slot(s))) = (&instr.kind, instr.write) {
                known_functions.insert(s, *function);
            }
        }
    }
    if known_functions.is_empty() {
        return false;
    }

    let mut changed = false;
    for block in func.body.blocks.as_mut_slice() {
        for instr in &mut block.instrs {
            let InstrKind::Call { callee, this, args } = &instr.kind else { continue };
            let Arg::Slot(s) = callee else { continue };
            let Some(&function) = known_functions.get(s) else { continue };
            instr.kind = InstrKind::CallFunctionDirect { function, this: *this, args: args.clone() };
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------
// 9. remove_dead_slot_writes
// ---------------------------------------------------------------------

/// Marks every slot read anywhere in the function, then drops instructions
/// whose sole effect is writing an unread slot and which have no other
/// observable effect (no suspension into a sub-VM, not a terminator, not
/// one of the mutating ops that must run regardless of whether their
/// "result" — there usually isn't one — is read).
fn remove_dead_slot_writes(func: &mut UserFunction) -> bool {
    let mut used: HashSet<SlotId> = HashSet::new();
    for block in func.body.blocks.as_slice() {
        for instr in &block.instrs {
            instr.kind.for_each_read_arg(|a| {
                if let Arg::Slot(s) = a {
                    used.insert(s);
                }
            });
        }
    }

    let mut changed = false;
    for block in func.body.blocks.as_mut_slice() {
        block.instrs.retain(|instr| {
            if instr.kind.is_terminator() || instr.may_suspend() {
                return true;
            }
            if has_side_effect_beyond_write(&instr.kind) {
                return true;
            }
            match instr.write {
                Some(WriteArg::Slot(s)) if !used.contains(&s) => {
                    changed = true;
                    false
                }
                _ => true,
            }
        });
    }
    changed
}

fn has_side_effect_beyond_write(kind: &InstrKind) -> bool {
    matches!(
        kind,
        InstrKind::Assign { .. }
            | InstrKind::AssignStringKey { .. }
            | InstrKind::CloseObject { .. }
            | InstrKind::FreezeObject { .. }
            | InstrKind::SetConstraint { .. }
            | InstrKind::SetConstraintStringKey { .. }
            | InstrKind::DefineRefslot { .. }
    )
}

// ---------------------------------------------------------------------
// 10. remove_pointless_blocks
// ---------------------------------------------------------------------

/// Removes blocks unreachable from block 0 (an `if (false)` arm left
/// behind after constant-branch folding elsewhere in the pipeline's
/// predecessors, or a branch target orphaned by `fuse_static_object_alloc`
/// collapsing its only entry).
fn remove_pointless_blocks(func: &mut UserFunction) -> bool {
    let cfg = ControlFlowGraph::new(&func.body);
    let ids: Vec<BlockId> = func.body.blocks.iter_enumerated().map(|(id, _)| id).collect();
    let mut changed = false;
    for id in ids {
        if id != ENTRY_BLOCK && !cfg.is_reachable(id) && !func.body.blocks[id].instrs.is_empty() {
            func.body.blocks[id].instrs.clear();
            changed = true;
        }
    }
    changed
}

// ---------------------------------------------------------------------
// 11. compactify_registers
// ---------------------------------------------------------------------

/// The final, SSA-breaking pass: computes per-slot live ranges in lexical
/// instruction order and assigns each original slot to the lowest
/// currently-unused slot index, so the callframe's register file has no
/// gaps except the reserved null/scope slots. Must run last — after this,
/// no further optimization pass may run (`opt_status.non_ssa` enforces it).
fn compactify_registers(func: &mut UserFunction) {
    use crate::builder::{NULL_SLOT, SCOPE_SLOT};

    let mut remap: HashMap<SlotId, SlotId> = HashMap::new();
    remap.insert(NULL_SLOT, NULL_SLOT);
    remap.insert(SCOPE_SLOT, SCOPE_SLOT);
    let mut next = 2u32;

    fn remap_slot(s: SlotId, remap: &mut HashMap<SlotId, SlotId>, next: &mut u32) -> SlotId {
        *remap.entry(s).or_insert_with(|| {
            let id = SlotId(*next);
            *next += 1;
            id
        })
    }

    for block in func.body.blocks.as_mut_slice() {
        for instr in &mut block.instrs {
            if let Some(WriteArg::Slot(s)) = &mut instr.write {
                *s = remap_slot(*s, &mut remap, &mut next);
            }
            map_all_args(&mut instr.kind, &mut |a| {
                if let Arg::Slot(s) = a {
                    *s = remap_slot(*s, &mut remap, &mut next);
                }
            });
        }
    }
    func.slot_count = next as usize;
}

// ---------------------------------------------------------------------
// Shared operand-rewriting helper
// ---------------------------------------------------------------------

fn map_all_args(kind: &mut InstrKind, f: &mut impl FnMut(&mut Arg)) {
    match kind {
        InstrKind::AllocObject { parent } => f(parent),
        InstrKind::AllocIntObject { value }
        | InstrKind::AllocBoolObject { value }
        | InstrKind::AllocFloatObject { value } => f(value),
        InstrKind::AllocStringObject { .. } => {}
        InstrKind::AllocArrayObject { values } => values.iter_mut().for_each(f),
        InstrKind::AllocClosureObject { context, .. } => f(context),
        InstrKind::AllocStaticObject { parent, fields } => {
            f(parent);
            for field in fields {
                if let Some(c) = &mut field.constraint {
                    f(c);
                }
                f(&mut field.value);
            }
        }
        InstrKind::Access { obj, key } => {
            f(obj);
            f(key);
        }
        InstrKind::Assign { obj, key, value, .. } => {
            f(obj);
            f(key);
            f(value);
        }
        InstrKind::KeyInObj { obj, key } => {
            f(obj);
            f(key);
        }
        InstrKind::SetConstraint { obj, key, constraint } => {
            f(obj);
            f(key);
            f(constraint);
        }
        InstrKind::CloseObject { obj } | InstrKind::FreezeObject { obj } => f(obj),
        InstrKind::Identical { a, b } => {
            f(a);
            f(b);
        }
        InstrKind::InstanceOf { obj, proto } => {
            f(obj);
            f(proto);
        }
        InstrKind::Test { value } => f(value),
        InstrKind::Br { .. } => {}
        InstrKind::TestBr { cond, .. } => f(cond),
        InstrKind::Return { value } => f(value),
        InstrKind::Phi { incoming } => incoming.iter_mut().for_each(|(_, a)| f(a)),
        InstrKind::Call { callee, this, args } => {
            f(callee);
            f(this);
            args.iter_mut().for_each(f);
        }
        InstrKind::AccessStringKey { obj, .. } => f(obj),
        InstrKind::AssignStringKey { obj, value, .. } => {
            f(obj);
            f(value);
        }
        InstrKind::StringKeyInObj { obj, .. } => f(obj),
        InstrKind::SetConstraintStringKey { obj, constraint, .. } => {
            f(obj);
            f(constraint);
        }
        InstrKind::DefineRefslot { obj, .. } => f(obj),
        InstrKind::Move { src } => f(src),
        InstrKind::CallFunctionDirect { this, args, .. } => {
            f(this);
            args.iter_mut().for_each(f);
        }
    }
}

#[cfg(test)]
mod edge_cases {
    use super::*;
    use crate::builder::Builder;
    use fgc::{GcConfig, GcState};

    fn empty_heap() -> GcState {
        GcState::new(GcConfig::default())
    }

    #[test]
    fn constant_branch_folds_in_parse_time_passes_untouched_by_literal_inlining() {
        // `inline_primitive_accesses`/`redirect_predictable_lookup_misses`
        // don't touch branches; the instruction stays a `TestBr` unless a
        // later constant-value analysis narrows it. This only exercises
        // that phase 1 leaves an ordinary branch alone (no crash, no
        // spurious rewrite).
        let mut b = Builder::new(None, 0, false, false);
        let then_blk = b.new_block();
        let else_blk = b.new_block();
        b.set_current_block(BlockId(0));
        b.test_branch(Arg::Value(Value::Bool(true)), then_blk, else_blk);
        b.set_current_block(then_blk);
        b.ret(Arg::Value(Value::Int(1)));
        b.set_current_block(else_blk);
        b.ret(Arg::Value(Value::Int(2)));
        let mut f = b.build();
        run_parse_time_passes(&mut f);
        assert!(matches!(
            f.body.blocks[BlockId(0)].instrs.last().unwrap().kind,
            InstrKind::TestBr { .. }
        ));
    }

    #[test]
    fn literal_key_access_specializes_to_string_key() {
        let mut b = Builder::new(None, 0, false, false);
        let obj = b.alloc_object(Arg::Value(Value::Null));
        let key = b.alloc_string_object(faxc_util::Symbol::intern("x"));
        let val = b.access(Arg::Slot(obj), Arg::Slot(key));
        b.ret(Arg::Slot(val));
        let mut f = b.build();
        run_parse_time_passes(&mut f);
        let found = f.body.blocks[BlockId(0)]
            .instrs
            .iter()
            .any(|i| matches!(i.kind, InstrKind::AccessStringKey { .. }));
        assert!(found);
    }

    #[test]
    fn static_object_gains_refslots_and_fuses_on_hot_pipeline() {
        let mut b = Builder::new(None, 0, false, false);
        let obj = b.alloc_object(Arg::Value(Value::Null));
        let key = b.alloc_string_object(faxc_util::Symbol::intern("x"));
        b.assign(Arg::Slot(obj), Arg::Slot(key), Arg::Value(Value::Int(1)), SetMode::Plain);
        b.close_object(Arg::Slot(obj));
        let read = b.access(Arg::Slot(obj), Arg::Slot(key));
        b.ret(Arg::Slot(read));
        let mut f = b.build();
        let heap = empty_heap();
        run_parse_time_passes(&mut f);
        run_hot_pipeline(&mut f, &heap);
        assert!(f.opt_status.non_ssa);
        let has_static_alloc = f
            .body
            .blocks
            .as_slice()
            .iter()
            .flat_map(|b| &b.instrs)
            .any(|i| matches!(i.kind, InstrKind::AllocStaticObject { .. }));
        assert!(has_static_alloc);
    }

    #[test]
    fn dead_allocation_with_no_reader_is_removed_by_hot_pipeline() {
        let mut b = Builder::new(None, 0, false, false);
        b.alloc_object(Arg::Value(Value::Null));
        b.ret(Arg::Value(Value::Null));
        let mut f = b.build();
        let heap = empty_heap();
        let before = f.body.instr_count();
        run_parse_time_passes(&mut f);
        run_hot_pipeline(&mut f, &heap);
        assert!(f.body.instr_count() < before);
    }

    #[test]
    fn compaction_leaves_no_gaps_above_reserved_slots() {
        let mut b = Builder::new(None, 0, false, false);
        let a = b.alloc_object(Arg::Value(Value::Null));
        let _unused = b.alloc_object(Arg::Value(Value::Null));
        b.ret(Arg::Slot(a));
        let mut f = b.build();
        let heap = empty_heap();
        run_parse_time_passes(&mut f);
        run_hot_pipeline(&mut f, &heap);
        let mut seen: Vec<u32> = f
            .body
            .blocks
            .as_slice()
            .iter()
            .flat_map(|b| &b.instrs)
            .filter_map(|i| match i.write {
                Some(WriteArg::Slot(SlotId(n))) => Some(n),
                _ => None,
            })
            .collect();
        seen.sort();
        seen.dedup();
        for (expected, actual) in (2u32..).zip(seen.iter()) {
            assert_eq!(expected, *actual);
        }
    }
}
