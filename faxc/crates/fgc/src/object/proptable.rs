//! Open-addressed property table.
//!
//! Power-of-two sized, linear probing, empty slots have `hash == 0` (keys
//! never hash to 0 — see `faxc_util::fastkey`). A 64-bit bloom filter of
//! all inserted hashes lets a failing lookup short-circuit without a
//! single probe.

use faxc_util::FastKey;

use crate::object::ObjHandle;
use crate::value::Value;

const INITIAL_CAPACITY: usize = 4;
const FILL_FACTOR_PCT: usize = 70;

#[derive(Clone)]
struct Slot {
    hash: u64,
    key: FastKey,
    constraint: Option<ObjHandle>,
    value: Value,
}

impl Slot {
    fn empty() -> Self {
        Self {
            hash: 0,
            key: FastKey {
                hash: 0,
                ptr: std::ptr::null(),
                len: 0,
                last_index: -1,
            },
            constraint: None,
            value: Value::Null,
        }
    }

    fn is_empty(&self) -> bool {
        self.hash == 0
    }
}

/// How a write was requested; selects which create/overwrite rules apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetMode {
    /// Dictionary-style insert: create if absent, overwrite if present.
    Plain,
    /// Lexical variable write: fails if absent, overwrites where defined.
    Existing,
    /// `obj.x = v`: fails if absent anywhere in the chain, shadows on the
    /// receiver, copying any ancestor constraint forward.
    Shadowing,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PropTableError {
    Closed,
    Frozen,
    ConstraintViolation,
    KeyNotFound,
    ConstraintAlreadySet,
    NoConstraintGiven,
}

pub struct PropTable {
    slots: Vec<Slot>,
    stored: usize,
    bloom: u64,
}

impl PropTable {
    pub fn new() -> Self {
        Self {
            slots: vec![Slot::empty(); INITIAL_CAPACITY],
            stored: 0,
            bloom: 0,
        }
    }

    /// Preallocates a table of exactly `capacity` slots (rounded to the
    /// next power of two), for `ALLOC_STATIC_OBJECT`'s table-preallocated
    /// creation.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut cap = INITIAL_CAPACITY;
        while cap < capacity.max(1) {
            cap *= 2;
        }
        Self {
            slots: vec![Slot::empty(); cap],
            stored: 0,
            bloom: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.stored
    }

    pub fn is_empty(&self) -> bool {
        self.stored == 0
    }

    fn mask(&self) -> u64 {
        (self.slots.len() - 1) as u64
    }

    fn bloom_bit(hash: u64) -> u64 {
        1u64 << (hash & 63)
    }

    fn bloom_maybe_present(&self, hash: u64) -> bool {
        (self.bloom & Self::bloom_bit(hash)) != 0
    }

    /// Lookup fast path: consult `key.last_index`; if that slot's hash
    /// matches, return it without probing. Otherwise probe from
    /// `hash & mask` forward, unrolled four times, bailing on the first
    /// empty slot. Never mutates the table; updates only the key's own
    /// scratch cache.
    pub fn lookup_index(&self, key: &mut FastKey) -> Option<usize> {
        if !self.bloom_maybe_present(key.hash) {
            return None;
        }
        if key.last_index >= 0 && (key.last_index as usize) < self.slots.len() {
            let cached = &self.slots[key.last_index as usize];
            if cached.hash == key.hash && cached.key == *key {
                return Some(key.last_index as usize);
            }
        }
        let mask = self.mask();
        let mut i = key.hash & mask;
        loop {
            let mut found = None;
            for _ in 0..4 {
                let slot = &self.slots[i as usize];
                if slot.is_empty() {
                    return None;
                }
                if slot.hash == key.hash && slot.key == *key {
                    found = Some(i as usize);
                    break;
                }
                i = (i + 1) & mask;
            }
            if let Some(idx) = found {
                key.last_index = idx as i64;
                return Some(idx);
            }
            if self.slots[i as usize].is_empty() {
                return None;
            }
        }
    }

    pub fn get(&self, key: &mut FastKey) -> Option<Value> {
        self.lookup_index(key).map(|i| self.slots[i].value)
    }

    pub fn get_constraint(&self, key: &mut FastKey) -> Option<ObjHandle> {
        self.lookup_index(key).and_then(|i| self.slots[i].constraint)
    }

    /// Returns the index of an existing matching slot, or allocates (and
    /// resizes if needed) a fresh empty slot whose hash the caller must set
    /// by calling [`Self::finish_insert`].
    fn find_or_make_room(&mut self, key: &FastKey) -> Result<usize, usize> {
        let mask = self.mask();
        let mut i = key.hash & mask;
        loop {
            let slot = &self.slots[i as usize];
            if slot.is_empty() {
                return Err(i as usize);
            }
            if slot.hash == key.hash && slot.key == *key {
                return Ok(i as usize);
            }
            i = (i + 1) & mask;
        }
    }

    fn finish_insert(&mut self, idx: usize, key: FastKey, value: Value) {
        self.slots[idx] = Slot {
            hash: key.hash,
            key,
            constraint: None,
            value,
        };
        self.bloom |= Self::bloom_bit(key.hash);
        self.stored += 1;
        if self.stored * 100 >= self.slots.len() * FILL_FACTOR_PCT {
            self.grow();
        }
    }

    fn grow(&mut self) {
        let old = std::mem::replace(&mut self.slots, vec![Slot::empty(); self.slots.len() * 2]);
        self.bloom = 0;
        for slot in old {
            if slot.is_empty() {
                continue;
            }
            let mask = self.mask();
            let mut i = slot.hash & mask;
            loop {
                if self.slots[i as usize].is_empty() {
                    self.bloom |= Self::bloom_bit(slot.hash);
                    self.slots[i as usize] = slot;
                    break;
                }
                i = (i + 1) & mask;
            }
        }
    }

    /// Unconditional local insert/overwrite, bypassing flag/constraint
    /// checks — used by the object model for the already-validated path
    /// (e.g. `ALLOC_STATIC_OBJECT`'s template copy, or once `set`'s own
    /// checks have passed).
    pub fn put_raw(&mut self, mut key: FastKey, value: Value) -> usize {
        match self.find_or_make_room(&key) {
            Ok(idx) => {
                self.slots[idx].value = value;
                key.last_index = idx as i64;
                idx
            }
            Err(idx) => {
                self.finish_insert(idx, key, value);
                idx
            }
        }
    }

    pub fn set_constraint_raw(&mut self, idx: usize, constraint: ObjHandle) {
        self.slots[idx].constraint = Some(constraint);
    }

    pub fn value_at(&self, idx: usize) -> Value {
        self.slots[idx].value
    }

    pub fn set_value_at(&mut self, idx: usize, value: Value) {
        self.slots[idx].value = value;
    }

    pub fn constraint_at(&self, idx: usize) -> Option<ObjHandle> {
        self.slots[idx].constraint
    }

    pub fn contains_local(&self, key: &mut FastKey) -> bool {
        self.lookup_index(key).is_some()
    }

    /// Iterates all occupied entries — used by mark (to reach every object
    /// reference in the table) and by `keys()`.
    pub fn iter(&self) -> impl Iterator<Item = (&FastKey, Value)> {
        self.slots
            .iter()
            .filter(|s| !s.is_empty())
            .map(|s| (&s.key, s.value))
    }
}

impl Default for PropTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faxc_util::prepare_key_str;

    #[test]
    fn insert_then_lookup() {
        let mut t = PropTable::new();
        let mut k = prepare_key_str("x");
        t.put_raw(k.clone(), Value::Int(42));
        assert_eq!(t.get(&mut k), Some(Value::Int(42)));
    }

    #[test]
    fn missing_key_returns_none() {
        let mut t = PropTable::new();
        let mut k = prepare_key_str("missing");
        assert_eq!(t.get(&mut k), None);
    }

    #[test]
    fn grows_past_fill_factor() {
        let mut t = PropTable::new();
        for i in 0..50 {
            let k = prepare_key_str(&format!("key{i}"));
            t.put_raw(k, Value::Int(i));
        }
        for i in 0..50 {
            let mut k = prepare_key_str(&format!("key{i}"));
            assert_eq!(t.get(&mut k), Some(Value::Int(i)));
        }
    }

    #[test]
    fn last_index_cache_hits() {
        let mut t = PropTable::new();
        let mut k = prepare_key_str("cached");
        t.put_raw(k.clone(), Value::Int(7));
        t.get(&mut k);
        assert!(k.last_index >= 0);
        assert_eq!(t.get(&mut k), Some(Value::Int(7)));
    }
}
