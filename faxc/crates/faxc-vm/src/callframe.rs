//! One call's activation record: the executing function, its slot and
//! refslot arrays, the instruction cursor, where the return value goes in
//! the caller, and the frame-local objects it owns on the GC's bump stack.

use std::cell::RefCell;
use std::rc::Rc;

use faxc_mir::{BlockId, RefslotId, SlotId, UserFunctionId, WriteArg};
use faxc_util::index_vec::Idx;
use fgc::{ObjHandle, RootSetId, Value};

use crate::module_fns::ModuleFns;

pub struct Callframe {
    pub module: Rc<ModuleFns>,
    pub function: UserFunctionId,
    /// Wrapped in `Rc<RefCell<_>>` because this is exactly the node shape
    /// `fgc::marker::roots::RootList` stores: a frame registers its slot
    /// array as a root on push and deregisters it on pop.
    pub slots: Rc<RefCell<Vec<Value>>>,
    pub refslots: Vec<Option<(ObjHandle, usize)>>,
    pub block: BlockId,
    pub prev_block: BlockId,
    pub idx: usize,
    pub root_set: RootSetId,
    /// Where the caller wants this call's return value written. `None`
    /// only for the outermost (module entry) frame, which has no caller.
    pub write_target: Option<WriteArg>,
    /// Objects allocated on the GC's frame bump stack on this frame's
    /// behalf, released in reverse order when the frame returns. Currently
    /// always empty: method/vararg scope objects are allocated on the
    /// regular heap (see `calling::build_call_scope`), matching
    /// `call.c`'s own `make_object` use there. Kept so the pop path (and
    /// `fgc`'s `FrameStack`) stay exercised if a future pass decides to
    /// route scope objects through it.
    pub stack_objects: Vec<ObjHandle>,
}

impl Callframe {
    pub fn slot(&self, id: SlotId) -> Value {
        self.slots.borrow()[id.index()]
    }

    pub fn set_slot(&self, id: SlotId, value: Value) {
        self.slots.borrow_mut()[id.index()] = value;
    }

    pub fn refslot(&self, id: RefslotId) -> Option<(ObjHandle, usize)> {
        self.refslots[id.index()]
    }

    pub fn set_refslot(&mut self, id: RefslotId, entry: (ObjHandle, usize)) {
        self.refslots[id.index()] = Some(entry);
    }
}
