//! Prototype handles the VM's dispatch loop needs on every `ALLOC_*` and
//! overload-fallback path. Mirrors `ValueCache` in
//! `original_source/src/vm/vm.h`: a flat cache of the NOINHERIT base
//! objects `create_root` installs under the root, so hot paths never pay
//! for an `object_lookup(root, "int", NULL)` string probe.

use fgc::ObjHandle;

#[derive(Clone, Copy)]
pub struct ValueCache {
    pub int_base: ObjHandle,
    pub float_base: ObjHandle,
    pub bool_base: ObjHandle,
    pub string_base: ObjHandle,
    pub array_base: ObjHandle,
    pub closure_base: ObjHandle,
    pub function_base: ObjHandle,
    pub pointer_base: ObjHandle,
}
