//! `GcState`: stop-the-world mark-and-sweep coordinator tying the heap, the
//! sentinel root list, and the frame bump stack together.
//!
//! Collection triggers when `Heap::should_collect` crosses the threshold;
//! requesting one while disabled sets a "missed" flag, caught up the
//! moment the disable count returns to zero.

use std::cell::RefCell;
use std::rc::Rc;

use crate::allocator::FrameStack;
use crate::config::GcConfig;
use crate::marker::{RootList, RootSetId};
use crate::object::{ObjHandle, ObjectPayload};
use crate::stats::GcStats;
use crate::value::Value;

pub struct GcState {
    pub heap: crate::heap::Heap,
    pub roots: RootList,
    pub stack: FrameStack,
    pub config: GcConfig,
    pub stats: GcStats,
    disabledness: u32,
    missed_gc: bool,
}

impl GcState {
    pub fn new(config: GcConfig) -> Self {
        let mut heap = crate::heap::Heap::new();
        heap.next_gc_threshold = config.initial_threshold_bytes;
        Self {
            heap,
            roots: RootList::new(),
            stack: FrameStack::new(),
            config,
            stats: GcStats::default(),
            disabledness: 0,
            missed_gc: false,
        }
    }

    pub fn alloc(&mut self, parent: Option<ObjHandle>, payload: ObjectPayload) -> ObjHandle {
        if self.heap.should_collect() {
            self.collect();
        }
        self.heap.alloc(parent, payload)
    }

    /// Allocates without triggering a GC run even if the threshold has been
    /// crossed — used for the rare case where a caller must guarantee no
    /// collection happens mid-sequence (table-template copy in
    /// `ALLOC_STATIC_OBJECT`, for instance) and has already wrapped the
    /// call in a `disable`/`enable` pair.
    pub fn alloc_raw(&mut self, parent: Option<ObjHandle>, payload: ObjectPayload) -> ObjHandle {
        self.heap.alloc(parent, payload)
    }

    pub fn push_root_set(&mut self, values: Rc<RefCell<Vec<Value>>>) -> RootSetId {
        self.roots.push(values)
    }

    pub fn pop_root_set(&mut self, id: RootSetId) {
        self.roots.remove(id);
    }

    /// Runs mark-then-sweep now, unless collection is currently disabled —
    /// in which case it records a "missed" collection to run as soon as
    /// `enable` brings the counter back to zero.
    pub fn collect(&mut self) {
        if self.disabledness > 0 {
            self.missed_gc = true;
            return;
        }
        self.run_collection();
    }

    fn run_collection(&mut self) {
        let before_objects = self.heap.object_count();
        let before_bytes = self.heap.bytes_allocated;
        self.heap.mark_roots(&self.roots);
        self.heap.sweep();
        self.heap.post_collection_resize_threshold();
        let freed_objects = before_objects - self.heap.object_count();
        let freed_bytes = before_bytes - self.heap.bytes_allocated;
        self.stats.record_collection(freed_objects, freed_bytes);
    }

    fn disable(&mut self) {
        self.disabledness += 1;
    }

    fn enable(&mut self) {
        assert!(self.disabledness > 0, "gc_enable without matching gc_disable");
        self.disabledness -= 1;
        if self.disabledness == 0 && self.missed_gc {
            self.missed_gc = false;
            self.run_collection();
        }
    }

    /// Scopes a disable/enable pair as an RAII guard, released on every
    /// exit path including unwinding.
    pub fn disable_guard(state: &RefCell<GcState>) -> GcDisableGuard<'_> {
        state.borrow_mut().disable();
        GcDisableGuard { state }
    }
}

pub struct GcDisableGuard<'a> {
    state: &'a RefCell<GcState>,
}

impl<'a> Drop for GcDisableGuard<'a> {
    fn drop(&mut self) {
        self.state.borrow_mut().enable();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unreachable_objects_are_collected() {
        let mut gc = GcState::new(GcConfig::default());
        let root_parent = gc.alloc_raw(None, ObjectPayload::Plain);
        let _garbage = gc.alloc_raw(Some(root_parent), ObjectPayload::Plain);
        let roots = Rc::new(RefCell::new(vec![Value::Object(root_parent)]));
        gc.push_root_set(roots);
        assert_eq!(gc.heap.object_count(), 2);
        gc.run_collection();
        assert_eq!(gc.heap.object_count(), 1);
    }

    #[test]
    fn reachable_objects_survive_any_number_of_runs() {
        let mut gc = GcState::new(GcConfig::default());
        let a = gc.alloc_raw(None, ObjectPayload::Plain);
        let roots = Rc::new(RefCell::new(vec![Value::Object(a)]));
        gc.push_root_set(roots);
        for _ in 0..50 {
            gc.run_collection();
        }
        assert_eq!(gc.heap.object_count(), 1);
    }

    #[test]
    fn disabled_collection_is_deferred_then_caught_up() {
        let mut gc = GcState::new(GcConfig::default());
        let _garbage = gc.alloc_raw(None, ObjectPayload::Plain);
        let state = RefCell::new(gc);
        {
            let _guard = GcState::disable_guard(&state);
            state.borrow_mut().collect();
            assert_eq!(state.borrow().heap.object_count(), 1);
        }
        assert_eq!(state.borrow().heap.object_count(), 0);
    }
}
