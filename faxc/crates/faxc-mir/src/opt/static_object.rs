//! "Static object" detection: a slot is statically-object iff it is the
//! target of an `AllocObject` followed only by plain `AssignStringKey`
//! writes on that slot, terminated by `CloseObject` — per spec.md §4.G.
//! Such a slot's field names (and, once `inline_primitive_accesses` has
//! run, its constraints) are known entirely from the instruction stream,
//! with no heap access required. This underlies
//! `redirect_predictable_lookup_misses`, `inline_static_lookups_to_constants`,
//! `access_vars_via_refslots`, and `fuse_static_object_alloc`.

use std::collections::{HashMap, HashSet};

use faxc_util::FastKey;

use crate::mir::{Arg, InstrKind, SetMode, SlotId, UserFunction, WriteArg};

#[derive(Debug, Clone)]
pub struct StaticField {
    pub key: FastKey,
    pub value: Arg,
    pub constraint: Option<Arg>,
}

/// A fully-known object literal: every key it will ever hold, and the
/// value/constraint each was assigned, known statically.
#[derive(Debug, Clone)]
pub struct StaticObject {
    pub parent: Arg,
    pub fields: Vec<StaticField>,
}

impl StaticObject {
    pub fn field(&self, key: &FastKey) -> Option<&StaticField> {
        self.fields.iter().find(|f| f.key == *key)
    }
}

/// Scans every block independently — the builder never splits a single
/// object literal's alloc/populate/close run across a branch, so a
/// per-block scan sees every candidate whole. Returns every slot matching
/// the pattern, keyed by the block that defines it (a slot is SSA-unique
/// across the whole function, so the block is only bookkeeping).
pub fn analyze(func: &UserFunction) -> HashMap<SlotId, StaticObject> {
    let mut result = HashMap::new();
    for block in func.body.blocks.as_slice() {
        let mut open: HashMap<SlotId, StaticObject> = HashMap::new();
        let mut closed: HashSet<SlotId> = HashSet::new();
        let mut broken: HashSet<SlotId> = HashSet::new();

        for instr in &block.instrs {
            match &instr.kind {
                InstrKind::AllocObject { parent } => {
                    if let Some(WriteArg::Slot(s)) = instr.write {
                        open.insert(s, StaticObject { parent: *parent, fields: Vec::new() });
                    }
                }
                InstrKind::AssignStringKey { obj: Arg::Slot(s), key, value, mode: SetMode::Plain } => {
                    let s = *s;
                    if closed.contains(&s) {
                        broken.insert(s);
                    } else if let Some(obj) = open.get_mut(&s) {
                        obj.fields.push(StaticField { key: *key, value: *value, constraint: None });
                    }
                }
                InstrKind::SetConstraintStringKey { obj: Arg::Slot(s), key, constraint } => {
                    if let Some(obj) = open.get_mut(s) {
                        if let Some(field) = obj.fields.iter_mut().find(|f| f.key == *key) {
                            field.constraint = Some(*constraint);
                        }
                    }
                }
                InstrKind::CloseObject { obj: Arg::Slot(s) } => {
                    closed.insert(*s);
                }
                other => {
                    // Any other read of a candidate slot (a generic
                    // `Access`/`Assign` through a non-literal key, use as
                    // a call receiver, escape into an array/closure
                    // capture, ...) means its field set can no longer be
                    // proven complete — disqualify it.
                    other.for_each_read_arg(|a| {
                        if let Arg::Slot(s) = a {
                            if open.contains_key(&s) {
                                broken.insert(s);
                            }
                        }
                    });
                }
            }
        }

        for (slot, obj) in open {
            if closed.contains(&slot) && !broken.contains(&slot) {
                result.insert(slot, obj);
            }
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::mir::{Block, Instr};
    use fgc::Value;

    #[test]
    fn alloc_assign_close_is_recognized() {
        let mut b = Builder::new(None, 0, false, false);
        let obj = b.alloc_object(Arg::Value(Value::Null));
        b.close_object(Arg::Slot(obj));
        b.ret(Arg::Slot(obj));
        let mut f = b.build();

        // Splice in the AssignStringKey the real `inline_primitive_accesses`
        // pass would have produced, right after the alloc and before the
        // close (the builder itself only emits generic `Assign`).
        let key = faxc_util::prepare_key_str("x");
        let assign = Instr {
            kind: InstrKind::AssignStringKey {
                obj: Arg::Slot(obj),
                key,
                value: Arg::Value(Value::Int(1)),
                mode: SetMode::Plain,
            },
            write: None,
            context: Arg::Slot(crate::builder::SCOPE_SLOT),
            span: faxc_util::Span::DUMMY,
        };
        let block: &mut Block = &mut f.body.blocks.as_mut_slice()[0];
        block.instrs.insert(1, assign);

        let statics = analyze(&f);
        assert!(statics.contains_key(&obj));
        assert_eq!(statics[&obj].fields.len(), 1);
        assert_eq!(statics[&obj].fields[0].key, key);
    }

    #[test]
    fn escaping_into_a_call_disqualifies_the_slot() {
        let mut b = Builder::new(None, 0, false, false);
        let obj = b.alloc_object(Arg::Value(Value::Null));
        b.close_object(Arg::Slot(obj));
        b.call(Arg::Value(Value::Null), Arg::Slot(obj), vec![]);
        b.ret(Arg::Value(Value::Null));
        let f = b.build();
        let statics = analyze(&f);
        assert!(!statics.contains_key(&obj));
    }
}
