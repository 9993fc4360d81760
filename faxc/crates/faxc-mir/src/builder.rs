//! Emits SSA instructions into a [`UserFunction`] body: new-block/terminate
//! bookkeeping, one `addinstr_*`-style helper per opcode, and the "slot 0 is
//! always null" convention shared with the calling convention.

use faxc_util::{index_vec::IndexVec, FastKey, Span, Symbol};
use fgc::Value;

use crate::mir::*;

/// Slot 0 is reserved to always read as null; slot 1 holds the active scope
/// object. User slots start at 2.
pub const NULL_SLOT: SlotId = SlotId(0);
pub const SCOPE_SLOT: SlotId = SlotId(1);

pub struct Builder {
    function: UserFunction,
    current_block: BlockId,
    slot_count: u32,
    refslot_count: u32,
    block_terminated: bool,
    current_span: Span,
}

impl Builder {
    pub fn new(name: Option<Symbol>, arity: usize, variadic_tail: bool, is_method: bool) -> Self {
        let mut function = UserFunction::new(name, arity, variadic_tail, is_method);
        let entry = function.body.blocks.push(Block::default());
        Self {
            function,
            current_block: entry,
            // Slot 0 = null, slot 1 = scope, slots 2..2+arity are the
            // incoming positional args — reserved here so the first
            // `new_slot` call after lowering the parameter list can't be
            // handed one of those slot ids back.
            slot_count: 2 + arity as u32,
            refslot_count: 0,
            block_terminated: false,
            current_span: Span::DUMMY,
        }
    }

    pub fn set_span(&mut self, span: Span) {
        self.current_span = span;
    }

    pub fn new_slot(&mut self) -> SlotId {
        let id = SlotId(self.slot_count);
        self.slot_count += 1;
        id
    }

    pub fn new_refslot(&mut self) -> RefslotId {
        let id = RefslotId(self.refslot_count);
        self.refslot_count += 1;
        id
    }

    /// Allocates a fresh, empty block and makes it current. Unlike the
    /// pointer-backpatched C builder this doesn't require the previous
    /// block to already be terminated — callers may pre-allocate a branch
    /// target's `BlockId` before filling it in, then switch back with
    /// [`Self::set_current_block`] once the branch referencing it is ready
    /// to emit.
    pub fn new_block(&mut self) -> BlockId {
        let id = self.function.body.blocks.push(Block::default());
        self.current_block = id;
        self.block_terminated = false;
        id
    }

    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Whether the current block already ends in a terminator, i.e. whether
    /// a structured-control-flow lowering needs to append its own fallthrough
    /// branch before switching away from it.
    pub fn is_current_block_terminated(&self) -> bool {
        self.block_terminated
    }

    pub fn set_current_block(&mut self, block: BlockId) {
        self.current_block = block;
        self.block_terminated = self.function.body.blocks[block]
            .instrs
            .last()
            .map(|i| i.kind.is_terminator())
            .unwrap_or(false);
    }

    fn push(&mut self, kind: InstrKind, write: Option<WriteArg>) {
        assert!(!self.block_terminated, "instruction emitted after a terminator");
        let is_term = kind.is_terminator();
        self.function.body.blocks[self.current_block].instrs.push(Instr {
            kind,
            write,
            context: Arg::Slot(SCOPE_SLOT),
            span: self.current_span,
        });
        if is_term {
            self.block_terminated = true;
        }
    }

    /// Emits `kind`, allocating a fresh slot for its result.
    fn push_to_new_slot(&mut self, kind: InstrKind) -> SlotId {
        let slot = self.new_slot();
        self.push(kind, Some(WriteArg::Slot(slot)));
        slot
    }

    // -- Allocation --

    pub fn alloc_object(&mut self, parent: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::AllocObject { parent })
    }

    pub fn alloc_int_object(&mut self, value: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::AllocIntObject { value })
    }

    pub fn alloc_bool_object(&mut self, value: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::AllocBoolObject { value })
    }

    pub fn alloc_float_object(&mut self, value: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::AllocFloatObject { value })
    }

    pub fn alloc_string_object(&mut self, value: Symbol) -> SlotId {
        self.push_to_new_slot(InstrKind::AllocStringObject { value })
    }

    pub fn alloc_array_object(&mut self, values: Vec<Arg>) -> SlotId {
        self.push_to_new_slot(InstrKind::AllocArrayObject { values })
    }

    pub fn alloc_closure_object(&mut self, context: Arg, function: UserFunctionId) -> SlotId {
        self.push_to_new_slot(InstrKind::AllocClosureObject { context, function })
    }

    // -- Table ops --

    pub fn access(&mut self, obj: Arg, key: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::Access { obj, key })
    }

    pub fn assign(&mut self, obj: Arg, key: Arg, value: Arg, mode: SetMode) {
        self.push(InstrKind::Assign { obj, key, value, mode }, None);
    }

    pub fn key_in_obj(&mut self, obj: Arg, key: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::KeyInObj { obj, key })
    }

    pub fn set_constraint(&mut self, obj: Arg, key: Arg, constraint: Arg) {
        self.push(InstrKind::SetConstraint { obj, key, constraint }, None);
    }

    pub fn close_object(&mut self, obj: Arg) {
        self.push(InstrKind::CloseObject { obj }, None);
    }

    pub fn freeze_object(&mut self, obj: Arg) {
        self.push(InstrKind::FreezeObject { obj }, None);
    }

    // -- Type ops --

    pub fn identical(&mut self, a: Arg, b: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::Identical { a, b })
    }

    pub fn instance_of(&mut self, obj: Arg, proto: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::InstanceOf { obj, proto })
    }

    pub fn test(&mut self, value: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::Test { value })
    }

    // -- Control --

    pub fn branch(&mut self, target: BlockId) {
        self.push(InstrKind::Br { target }, None);
    }

    pub fn test_branch(&mut self, cond: Arg, true_blk: BlockId, false_blk: BlockId) {
        self.push(InstrKind::TestBr { cond, true_blk, false_blk }, None);
    }

    pub fn phi(&mut self, incoming: Vec<(BlockId, Arg)>) -> SlotId {
        self.push_to_new_slot(InstrKind::Phi { incoming })
    }

    pub fn ret(&mut self, value: Arg) {
        self.push(InstrKind::Return { value }, None);
    }

    /// Terminates the current block with `return null`, for functions whose
    /// source body falls off the end without an explicit return.
    pub fn terminate_with_null_return(&mut self) {
        if !self.block_terminated {
            self.ret(Arg::Value(Value::Null));
        }
    }

    // -- Call --

    pub fn call(&mut self, callee: Arg, this: Arg, args: Vec<Arg>) -> SlotId {
        self.push_to_new_slot(InstrKind::Call { callee, this, args })
    }

    // -- Refslots --

    pub fn define_refslot(&mut self, obj: Arg, key: FastKey) -> RefslotId {
        let refslot = self.new_refslot();
        self.push(InstrKind::DefineRefslot { obj, key, refslot }, None);
        refslot
    }

    pub fn mov(&mut self, src: Arg) -> SlotId {
        self.push_to_new_slot(InstrKind::Move { src })
    }

    pub fn build(mut self) -> UserFunction {
        self.terminate_with_null_return();
        self.function.slot_count = self.slot_count as usize;
        self.function.refslot_count = self.refslot_count as usize;
        self.function
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_block_ends_in_a_terminator() {
        let mut b = Builder::new(Some(Symbol::intern("f")), 0, false, false);
        let slot = b.alloc_object(Arg::Value(Value::Null));
        b.ret(Arg::Slot(slot));
        let f = b.build();
        for block in f.body.blocks.as_slice() {
            assert!(block.instrs.last().unwrap().kind.is_terminator());
        }
    }

    #[test]
    fn falling_off_the_end_gets_an_implicit_null_return() {
        let mut b = Builder::new(None, 0, false, false);
        b.alloc_object(Arg::Value(Value::Null));
        let f = b.build();
        let last = f.body.blocks.as_slice()[0].instrs.last().unwrap();
        assert!(matches!(last.kind, InstrKind::Return { value: Arg::Value(Value::Null) }));
    }

    #[test]
    fn branch_targets_reach_distinct_blocks() {
        let mut b = Builder::new(None, 0, false, false);
        let then_blk = b.new_block();
        let else_blk = b.new_block();
        b.set_current_block(BlockId(0));
        b.test_branch(Arg::Value(Value::Bool(true)), then_blk, else_blk);
        b.set_current_block(then_blk);
        b.ret(Arg::Value(Value::Int(1)));
        b.set_current_block(else_blk);
        b.ret(Arg::Value(Value::Int(2)));
        let f = b.build();
        assert_eq!(f.body.blocks.len(), 3);
    }
}
