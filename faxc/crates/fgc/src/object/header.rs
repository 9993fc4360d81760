//! Object flags and handles: a plain bitset on the object, no mark-word
//! or forwarding-pointer tricks, since collection is single-threaded and
//! stop-the-world.

use std::cell::Cell;

use crate::object::payload::ObjectPayload;
use crate::object::proptable::PropTable;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ObjectFlags: u16 {
        /// Property set is frozen in membership: no new keys may be added.
        const CLOSED     = 0x01;
        /// Property values are immutable; existing keys may not be overwritten.
        const FROZEN     = 0x02;
        /// Object may not be used as a prototype for `new`.
        const NOINHERIT  = 0x04;
        /// Set during mark phase; cleared by sweep.
        const GC_MARK    = 0x08;
        /// Excluded from sweep.
        const IMMORTAL   = 0x10;
        /// Property table buffer is embedded in the object's allocation.
        const INLINE_TBL = 0x20;
        /// Allocated on the frame bump stack, not the GC heap.
        const STACK      = 0x80;
    }
}

/// An index into [`crate::heap::Heap`]'s object slab. Non-owning; kept live
/// only by the GC root graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjHandle(pub u32);

impl ObjHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A prototype-chain node. `prev` links every live heap object for sweep,
/// most-recently-allocated first; `stack_freed` marks a `STACK`-allocated
/// object that was released while a still-live younger allocation sat
/// above it on the frame stack, deferring its actual reclamation.
pub struct Object {
    pub parent: Option<ObjHandle>,
    pub table: PropTable,
    pub flags: Cell<ObjectFlags>,
    pub size: usize,
    pub prev: Option<ObjHandle>,
    pub stack_freed: Cell<bool>,
    pub payload: ObjectPayload,
}

impl Object {
    pub fn new(parent: Option<ObjHandle>, payload: ObjectPayload) -> Self {
        Self {
            parent,
            table: PropTable::new(),
            flags: Cell::new(ObjectFlags::empty()),
            size: std::mem::size_of::<Self>(),
            prev: None,
            stack_freed: Cell::new(false),
            payload,
        }
    }

    pub fn has_flag(&self, flag: ObjectFlags) -> bool {
        self.flags.get().contains(flag)
    }

    pub fn set_flag(&self, flag: ObjectFlags) {
        self.flags.set(self.flags.get() | flag);
    }

    pub fn is_marked(&self) -> bool {
        self.has_flag(ObjectFlags::GC_MARK)
    }
}
