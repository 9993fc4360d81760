//! Interned property-table keys.
//!
//! A [`FastKey`] pairs a byte-range key with a never-zero hash and a stable
//! canonical pointer so that identical key bytes always produce identical
//! hashes and identical pointers. The hash function is djb2 (`hash*33+byte`,
//! seed 5381, unrolled by 8, "if 0 then 1" fixup) — this is distinct from
//! `faxc_util::symbol::Symbol`, which interns *source identifiers* at parse
//! time. `FastKey` interns *property-table keys* at runtime; the property
//! table (`fgc::object::proptable`) stores the resulting pointer directly so
//! two lookups of the same key compare in O(1).

use std::sync::{Mutex, OnceLock};

use rustc_hash::FxHashMap;

/// djb2 hash over raw bytes, unrolled by 8, never returns 0.
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 5381;
    let len = bytes.len();
    let chunks = len & !7;
    let mut i = 0;
    while i < chunks {
        for j in 0..8 {
            hash = hash.wrapping_mul(33).wrapping_add(bytes[i + j] as u64);
        }
        i += 8;
    }
    while i < len {
        hash = hash.wrapping_mul(33).wrapping_add(bytes[i] as u64);
        i += 1;
    }
    if hash == 0 {
        hash = 1;
    }
    hash
}

/// A canonicalized, prehashed property key.
///
/// `last_index` is mutable scratch: the hash table that owns this key's
/// lookup site caches the most recent successful slot index there, so a
/// repeated access to the same key/object pair skips the probe sequence
/// entirely. It has no bearing on key identity — two `FastKey`s with equal
/// `hash`/`ptr`/`len` are the same key regardless of `last_index`.
#[derive(Clone, Copy, Debug)]
pub struct FastKey {
    pub hash: u64,
    pub ptr: *const u8,
    pub len: usize,
    pub last_index: i64,
}

// FastKey's pointer is into the leaked canonical slab below, which lives for
// the remainder of the process; sharing it across threads is safe because
// the slab is append-only and never reallocates in place.
unsafe impl Send for FastKey {}
unsafe impl Sync for FastKey {}

impl PartialEq for FastKey {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.len == other.len
    }
}
impl Eq for FastKey {}

impl FastKey {
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).expect("interned keys are always valid utf-8")
    }
}

struct KeyTable {
    canon: FxHashMap<Box<[u8]>, &'static [u8]>,
}

impl KeyTable {
    fn new() -> Self {
        Self {
            canon: FxHashMap::default(),
        }
    }

    fn canonicalize(&mut self, bytes: &[u8]) -> &'static [u8] {
        if let Some(existing) = self.canon.get(bytes) {
            return existing;
        }
        let leaked: &'static [u8] = Box::leak(bytes.to_vec().into_boxed_slice());
        self.canon.insert(bytes.to_vec().into_boxed_slice(), leaked);
        leaked
    }
}

static TABLE: OnceLock<Mutex<KeyTable>> = OnceLock::new();

/// Intern `bytes`, returning a [`FastKey`] with a stable pointer and
/// deterministic hash. Calling this again with the same bytes (even across
/// threads) yields a `FastKey` that compares equal and hashes identically.
pub fn prepare_key(bytes: &[u8]) -> FastKey {
    let table = TABLE.get_or_init(|| Mutex::new(KeyTable::new()));
    let mut table = table.lock().expect("key table poisoned");
    let canon = table.canonicalize(bytes);
    FastKey {
        hash: hash_bytes(canon),
        ptr: canon.as_ptr(),
        len: canon.len(),
        last_index: -1,
    }
}

pub fn prepare_key_str(s: &str) -> FastKey {
    prepare_key(s.as_bytes())
}

/// Render the canonical string for a hash, for diagnostics only. Returns
/// `None` if no key with this hash has ever been interned.
pub fn diagnostic_name_for_hash(hash: u64) -> Option<String> {
    let table = TABLE.get()?;
    let table = table.lock().ok()?;
    table
        .canon
        .values()
        .find(|bytes| hash_bytes(bytes) == hash)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn injective_on_distinct_bytes() {
        let a = prepare_key_str("foo");
        let b = prepare_key_str("bar");
        assert_ne!(a.hash, b.hash);
        assert_ne!(a.ptr, b.ptr);
    }

    #[test]
    fn same_bytes_yield_same_hash_and_pointer() {
        let a = prepare_key_str("hello world");
        let b = prepare_key_str("hello world");
        assert_eq!(a.hash, b.hash);
        assert_eq!(a.ptr, b.ptr);
    }

    #[test]
    fn hash_never_zero() {
        assert_ne!(hash_bytes(b""), 0);
        assert_ne!(hash_bytes(b"\0\0\0\0\0\0\0\0"), 0);
    }

    #[test]
    fn handles_keys_longer_than_unroll_width() {
        let long_key = "a".repeat(37);
        let k = prepare_key_str(&long_key);
        assert_eq!(k.len, 37);
        assert_ne!(k.hash, 0);
    }
}
