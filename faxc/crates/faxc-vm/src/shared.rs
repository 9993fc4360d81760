//! State one `VMState` shares with every sub-VM spawned for overload
//! reentrancy: the GC, the prototype-base cache, and the dispatched-
//! instruction cycle counter `-v` reports on exit.

use std::cell::{Cell, RefCell};

use faxc_runtime::ValueCache;
use fgc::GcState;

pub struct SharedState {
    pub gc: RefCell<GcState>,
    pub vcache: ValueCache,
    pub cyclecount: Cell<u64>,
}

impl SharedState {
    pub fn new(gc: GcState, vcache: ValueCache) -> Self {
        Self {
            gc: RefCell::new(gc),
            vcache,
            cyclecount: Cell::new(0),
        }
    }
}
