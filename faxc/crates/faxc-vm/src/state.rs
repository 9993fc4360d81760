//! `VMState`: one frame stack plus a handle to the state it shares with
//! any sub-VM spawned for overload reentrancy (§4.H/§5 "spawn and join" —
//! never merge a sub-VM's frame stack into the parent's).

use std::rc::Rc;

use fgc::Value;

use crate::error::VmError;
use crate::shared::SharedState;
use crate::callframe::Callframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Running,
    Terminated,
    Errored,
}

pub struct VMState {
    pub shared: Rc<SharedState>,
    pub root: fgc::ObjHandle,
    pub frames: Vec<Callframe>,
    pub run_state: RunState,
    pub result: Value,
    pub error: Option<String>,
    pub backtrace: Option<String>,
}

impl VMState {
    /// A fresh sub-VM for reentrant overload dispatch: same shared state
    /// and root, empty frame stack of its own.
    pub fn sub_vm(&self) -> VMState {
        VMState {
            shared: self.shared.clone(),
            root: self.root,
            frames: Vec::new(),
            run_state: RunState::Terminated,
            result: Value::Null,
            error: None,
            backtrace: None,
        }
    }

    pub fn top(&self) -> &Callframe {
        self.frames.last().expect("dispatch with no active frame")
    }

    pub fn top_mut(&mut self) -> &mut Callframe {
        self.frames.last_mut().expect("dispatch with no active frame")
    }

    /// Deregisters and pops the top frame, releasing any frame-local
    /// objects it still owns on the GC's bump stack in reverse order.
    pub fn pop_frame(&mut self) {
        let mut frame = self.frames.pop().expect("pop_frame with no active frame");
        let mut gc = self.shared.gc.borrow_mut();
        gc.pop_root_set(frame.root_set);
        let gc = &mut *gc;
        while let Some(handle) = frame.stack_objects.pop() {
            gc.stack.free(&mut gc.heap, handle);
        }
    }

    pub fn fail(&mut self, err: VmError) {
        self.run_state = RunState::Errored;
        self.error = Some(err.to_string());
    }
}
