//! A loaded module's function table, and the closure payload glue between
//! `faxc-mir`'s [`UserFunction`] and `fgc`'s type-erased closure payload.
//!
//! `fgc::ObjectPayload::Closure` carries its function as `Rc<dyn Any>`
//! rather than `Rc<RefCell<UserFunction>>` directly, because `fgc` cannot
//! depend on `faxc-mir` (the dependency runs the other way: `faxc-mir`'s
//! `Value` type comes from `fgc`). [`ClosureFn`] is the concrete type behind
//! that `Any`; [`downcast`] recovers it.
//!
//! A closure needs more than its own body: an `AllocClosureObject`
//! instruction inside that body names a *sibling* function by
//! [`UserFunctionId`], addressed into the same originating module. So the
//! payload carries the whole module's function table (`Rc<ModuleFns>`)
//! alongside the one id this particular closure was made from — any nested
//! closure literal it allocates at runtime is built from the same table.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use faxc_mir::{CompiledModule, UserFunction, UserFunctionId};
use faxc_util::index_vec::Idx;

/// Every function lowered from one parsed module (the entry body plus every
/// function/method literal reachable from it), kept alive for as long as
/// any closure created from it is reachable.
pub struct ModuleFns {
    pub functions: Vec<RefCell<UserFunction>>,
}

impl ModuleFns {
    pub fn from_compiled(module: CompiledModule) -> (Rc<ModuleFns>, UserFunctionId) {
        let entry = module.entry;
        let functions = module
            .functions
            .into_iter_enumerated()
            .map(|(_, f)| RefCell::new(f))
            .collect();
        (Rc::new(ModuleFns { functions }), entry)
    }

    pub fn get(&self, id: UserFunctionId) -> &RefCell<UserFunction> {
        &self.functions[id.index()]
    }
}

/// The concrete payload type behind `fgc::ObjectPayload::Closure`'s
/// `Rc<dyn Any>`.
pub type ClosureFn = (Rc<ModuleFns>, UserFunctionId);

pub fn make_closure_payload(module: Rc<ModuleFns>, id: UserFunctionId) -> Rc<dyn Any> {
    Rc::new((module, id)) as Rc<dyn Any>
}

pub fn downcast(any: &Rc<dyn Any>) -> &ClosureFn {
    any.downcast_ref::<ClosureFn>()
        .expect("faxc-vm is the only writer of ObjectPayload::Closure::function")
}
