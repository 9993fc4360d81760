//! The GC heap: a slab of objects, a free list for reclaimed slots, and the
//! mark-then-sweep collector itself.
//!
//! Heap objects form an intrusive `prev`-linked list, most-recently
//! allocated first, over stable slab indices rather than raw pointers;
//! sweep walks it head to tail and reclaims everything not marked or
//! immortal.

use crate::allocator::FrameStack;
use crate::marker::RootList;
use crate::object::{ObjHandle, Object, ObjectFlags, ObjectPayload};
use crate::value::Value;

pub struct Heap {
    slots: Vec<Option<Object>>,
    free_list: Vec<u32>,
    last_allocated: Option<ObjHandle>,
    pub bytes_allocated: usize,
    pub next_gc_threshold: usize,
}

const INITIAL_GC_THRESHOLD: usize = 10 * 1024 * 1024;

impl Heap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            last_allocated: None,
            bytes_allocated: 0,
            next_gc_threshold: INITIAL_GC_THRESHOLD,
        }
    }

    pub fn get(&self, handle: ObjHandle) -> &Object {
        self.slots[handle.index()]
            .as_ref()
            .expect("dangling ObjHandle: object was already swept")
    }

    pub fn get_mut(&mut self, handle: ObjHandle) -> &mut Object {
        self.slots[handle.index()]
            .as_mut()
            .expect("dangling ObjHandle: object was already swept")
    }

    /// Allocates a heap object with `parent` and `payload`, linking it at
    /// the head of the sweep chain. Mirrors `alloc_object_internal`:
    /// exclusively owned by the GC from here on.
    pub fn alloc(&mut self, parent: Option<ObjHandle>, payload: ObjectPayload) -> ObjHandle {
        let mut obj = Object::new(parent, payload);
        obj.prev = self.last_allocated;
        self.bytes_allocated += obj.size;
        let handle = if let Some(idx) = self.free_list.pop() {
            self.slots[idx as usize] = Some(obj);
            ObjHandle(idx)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Some(obj));
            ObjHandle(idx)
        };
        self.last_allocated = Some(handle);
        handle
    }

    /// Marks `handle` and, transitively, everything it reaches: its
    /// property table's object-valued entries, its prototype parent, and
    /// any extra references its payload carries.
    pub fn mark(&self, handle: ObjHandle, seen: &mut Vec<bool>) {
        if seen.len() <= handle.index() {
            seen.resize(handle.index() + 1, false);
        }
        if seen[handle.index()] {
            return;
        }
        let obj = match &self.slots[handle.index()] {
            Some(o) => o,
            None => return,
        };
        if obj.is_marked() {
            seen[handle.index()] = true;
            return;
        }
        obj.set_flag(ObjectFlags::GC_MARK);
        seen[handle.index()] = true;

        if let Some(parent) = obj.parent {
            self.mark(parent, seen);
        }
        for (_, value) in obj.table.iter() {
            if let Value::Object(h) = value {
                self.mark(h, seen);
            }
        }
        for v in obj.payload.extra_refs() {
            if let Value::Object(h) = v {
                self.mark(h, seen);
            }
        }
    }

    pub fn mark_roots(&self, roots: &RootList) {
        let mut seen = vec![false; self.slots.len()];
        roots.for_each_value(|v| {
            if let Value::Object(h) = v {
                self.mark(h, &mut seen);
            }
        });
    }

    /// Walks the heap-object `prev` chain from the most recently allocated.
    /// An object lacking `GC_MARK`, `IMMORTAL`, and `STACK` is unlinked, its
    /// byte count subtracted, and its slot reclaimed. `STACK` objects are
    /// skipped regardless of mark state — their lifetime is governed by
    /// [`crate::allocator::FrameStack`], not reachability. Survivors have
    /// `GC_MARK` cleared in place.
    pub fn sweep(&mut self) {
        let mut cur = self.last_allocated;
        let mut new_last: Option<ObjHandle> = None;
        let mut prev_surviving: Option<ObjHandle> = None;

        while let Some(handle) = cur {
            let next = self.slots[handle.index()].as_ref().unwrap().prev;
            let keep = {
                let obj = self.slots[handle.index()].as_ref().unwrap();
                obj.has_flag(ObjectFlags::IMMORTAL)
                    || obj.has_flag(ObjectFlags::GC_MARK)
                    || obj.has_flag(ObjectFlags::STACK)
            };
            if keep {
                let obj = self.slots[handle.index()].as_mut().unwrap();
                obj.flags.set(obj.flags.get() & !ObjectFlags::GC_MARK);
                obj.prev = None;
                if new_last.is_none() {
                    new_last = Some(handle);
                }
                if let Some(prev) = prev_surviving {
                    self.slots[prev.index()].as_mut().unwrap().prev = Some(handle);
                }
                prev_surviving = Some(handle);
            } else {
                let obj = self.slots[handle.index()].take().unwrap();
                self.bytes_allocated -= obj.size;
                self.free_list.push(handle.0);
            }
            cur = next;
        }
        self.last_allocated = new_last;
    }

    /// Whether a collection should run, per the 10 MB / 1.5x growth policy.
    pub fn should_collect(&self) -> bool {
        self.bytes_allocated >= self.next_gc_threshold
    }

    pub fn post_collection_resize_threshold(&mut self) {
        self.next_gc_threshold =
            ((self.bytes_allocated as f64 * 1.5) as usize).max(INITIAL_GC_THRESHOLD / 2);
    }

    pub fn object_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Reclaims a frame-local (`STACK`-flagged) object's slot directly,
    /// bypassing mark-and-sweep. Used only by [`FrameStack`] once it has
    /// determined the handle is safe to release (LIFO order, with any
    /// `STACK_FREED` successors already gone).
    pub fn free_stack_slot(&mut self, handle: ObjHandle) {
        if let Some(obj) = self.slots[handle.index()].take() {
            self.bytes_allocated -= obj.size;
        }
        self.free_list.push(handle.0);
    }

    pub fn stack_freed(&self, handle: ObjHandle) -> bool {
        self.get(handle).stack_freed.get()
    }

    pub fn mark_stack_freed(&self, handle: ObjHandle) {
        self.get(handle).stack_freed.set(true);
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

/// Frame stack objects are never swept by the heap collector — they are
/// released by [`FrameStack`] when their owning callframe returns. This
/// marker type exists purely to document that boundary at call sites.
pub type StackObjects = FrameStack;
