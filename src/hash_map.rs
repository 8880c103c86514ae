//! A hash map using Robin Hood linear probing with backward-shift deletion.
//!
//! The table is one contiguous power-of-two array of slots. A slot is a
//! `(hash, key, value)` triple whose key and value storage is uninitialized
//! unless the 64-bit hash field is non-zero; `hash == 0` is the only empty
//! marker, so occupancy needs no side table. User hashes pass through a
//! finalizer that multiplies by a fixed odd constant and ORs in the top
//! bit. Setting the top bit makes a finalized hash unequal to the empty
//! sentinel unconditionally, and the multiply diffuses low-entropy hashes
//! (small integers, identity hashes) whose raw low bits would cluster
//! badly under the AND-with-mask indexing.
//!
//! ## Placement
//!
//! An entry's ideal slot is `hash & mask`. Insertion probes linearly from
//! there; whenever the resident of a probed slot sits closer to its own
//! ideal slot than the incoming entry has already walked, the two swap and
//! the probe continues carrying the displaced resident. The table ends up
//! ordered so that probe distances never decrease along a scan from any
//! ideal slot until an empty slot. Lookups lean on that ordering for an
//! early exit: walking past a resident that is richer (closer to home)
//! than the sought key would be at that point proves the key absent.
//!
//! Removal restores the ordering without rehashing. Starting at the
//! vacated slot, each successor that is displaced (nonzero probe distance)
//! slides back one slot; the walk stops at an empty slot or an entry that
//! already sits at home. The result is indistinguishable from a table the
//! removed key was never inserted into.
//!
//! Growth doubles the raw capacity and moves entries across without any
//! rich/poor comparison: the source is scanned circularly starting from an
//! entry with probe distance zero, which preserves the relative order of
//! entries sharing an ideal slot, so placement in the fresh array reduces
//! to "first empty slot at or after the ideal one".
//!
//! ## Iterator invalidation
//!
//! Every structural change (new key, removal, growth, clear) adds
//! `1 << 32` to a generation counter. Detached [`Cursor`]s store their
//! position as `index - generation`, so the position they compute after a
//! bump lands far past the end of the table and the staleness check is
//! folded into the ordinary termination test instead of costing a branch
//! per step. Replacing the value of an existing key is not a structural
//! change; cursors keep working across it.

use core::borrow::Borrow;
use core::fmt;
use core::fmt::Debug;
use core::fmt::Display;
use core::hash::BuildHasher;
use core::hash::Hash;
use core::hash::Hasher;
use core::mem;
use core::mem::MaybeUninit;

use alloc::boxed::Box;
use siphasher::sip::SipHasher;

use crate::error::Error;
use crate::iter::Cursor;
use crate::iter::Iter;
use crate::iter::Keys;
use crate::iter::Values;
use crate::policy;
use crate::policy::MIN_RAW_CAPACITY;

/// Hash value marking an empty slot. Finalized hashes always have the top
/// bit set and therefore can never equal it.
pub(crate) const EMPTY: u64 = 0;

/// Added to the generation counter on every structural change. Any live
/// cursor's computed position jumps past the slot array on its next
/// advance, which is how invalidation is detected without a per-step
/// comparison. Raw capacities stay far below this value.
pub(crate) const GENERATION_SKIP: u64 = 1 << 32;

/// Odd 64-bit multiplier with good avalanche behavior, borrowed from the
/// finalization step of splitmix-style mixers.
const HASH_SPREAD: u64 = 0xc4ce_b9fe_1a85_ec53;

/// Post-processes a user-supplied hash so it diffuses weak inputs and can
/// never collide with [`EMPTY`].
#[inline(always)]
fn finalize_hash(hash: u64) -> u64 {
    hash.wrapping_mul(HASH_SPREAD) | (1 << 63)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// The default hash builder, a randomly seeded SipHash.
        pub type DefaultHashBuilder = std::collections::hash_map::RandomState;
    } else {
        /// The default hash builder without `std`: fixed-key SipHash-2-4.
        ///
        /// Deterministic across processes. Supply a seeded [`BuildHasher`]
        /// through [`HashMap::with_hasher`] if hash flooding is a concern.
        #[derive(Clone, Copy, Debug, Default)]
        pub struct DefaultHashBuilder;

        impl BuildHasher for DefaultHashBuilder {
            type Hasher = SipHasher;

            fn build_hasher(&self) -> SipHasher {
                SipHasher::new()
            }
        }
    }
}

/// One physical table slot. `key` and `value` are initialized iff
/// `hash != EMPTY`; emptiness is tested on the hash field alone.
pub(crate) struct Slot<K, V> {
    pub(crate) hash: u64,
    key: MaybeUninit<K>,
    value: MaybeUninit<V>,
}

impl<K, V> Slot<K, V> {
    fn empty() -> Self {
        Slot {
            hash: EMPTY,
            key: MaybeUninit::uninit(),
            value: MaybeUninit::uninit(),
        }
    }

    /// Fills an empty slot.
    pub(crate) fn write(&mut self, hash: u64, key: K, value: V) {
        debug_assert_eq!(self.hash, EMPTY);
        debug_assert_ne!(hash, EMPTY);
        self.hash = hash;
        self.key.write(key);
        self.value.write(value);
    }

    /// # Safety
    ///
    /// The slot must be occupied.
    pub(crate) unsafe fn key_ref(&self) -> &K {
        debug_assert_ne!(self.hash, EMPTY);
        // SAFETY: occupied slots hold an initialized key.
        unsafe { self.key.assume_init_ref() }
    }

    /// # Safety
    ///
    /// The slot must be occupied.
    pub(crate) unsafe fn value_ref(&self) -> &V {
        debug_assert_ne!(self.hash, EMPTY);
        // SAFETY: occupied slots hold an initialized value.
        unsafe { self.value.assume_init_ref() }
    }

    /// # Safety
    ///
    /// The slot must be occupied.
    unsafe fn value_mut(&mut self) -> &mut V {
        debug_assert_ne!(self.hash, EMPTY);
        // SAFETY: occupied slots hold an initialized value.
        unsafe { self.value.assume_init_mut() }
    }

    /// Swaps this slot's contents with the entry being carried by an
    /// insertion probe.
    ///
    /// # Safety
    ///
    /// The slot must be occupied.
    unsafe fn swap_payload(&mut self, hash: &mut u64, key: &mut K, value: &mut V) {
        debug_assert_ne!(self.hash, EMPTY);
        mem::swap(&mut self.hash, hash);
        // SAFETY: both sides are initialized; the swap leaves them so.
        unsafe {
            mem::swap(self.key.assume_init_mut(), key);
            mem::swap(self.value.assume_init_mut(), value);
        }
    }

    /// # Safety
    ///
    /// The slot must be occupied.
    unsafe fn replace_value(&mut self, value: V) -> V {
        debug_assert_ne!(self.hash, EMPTY);
        // SAFETY: occupied slots hold an initialized value.
        unsafe { mem::replace(self.value.assume_init_mut(), value) }
    }

    /// Moves the payload out and marks the slot empty.
    ///
    /// # Safety
    ///
    /// The slot must be occupied.
    unsafe fn take(&mut self) -> (K, V) {
        debug_assert_ne!(self.hash, EMPTY);
        self.hash = EMPTY;
        // SAFETY: the slot was occupied; clearing the hash first means the
        // payload can never be read a second time.
        unsafe { (self.key.assume_init_read(), self.value.assume_init_read()) }
    }

    /// Reads the payload out without clearing the slot.
    ///
    /// # Safety
    ///
    /// The slot must be occupied, and the caller must guarantee the slot is
    /// never read or dropped afterwards (used while draining a detached
    /// slot array during a rehash).
    unsafe fn read_out(&self) -> (u64, K, V) {
        debug_assert_ne!(self.hash, EMPTY);
        // SAFETY: per the contract above this is the payload's final read.
        unsafe {
            (
                self.hash,
                self.key.assume_init_read(),
                self.value.assume_init_read(),
            )
        }
    }

    /// Drops the payload in place and marks the slot empty.
    ///
    /// # Safety
    ///
    /// The slot must be occupied.
    unsafe fn drop_payload(&mut self) {
        debug_assert_ne!(self.hash, EMPTY);
        self.hash = EMPTY;
        // SAFETY: the slot was occupied; each payload is dropped once.
        unsafe {
            self.key.assume_init_drop();
            self.value.assume_init_drop();
        }
    }
}

/// Allocates `raw` empty slots.
pub(crate) fn new_slots<K, V>(raw: usize) -> Box<[Slot<K, V>]> {
    debug_assert!(raw == 1 || raw.is_power_of_two());
    (0..raw).map(|_| Slot::empty()).collect()
}

/// Yields the occupied slot indices in a circular scan starting from the
/// first entry that sits in its ideal slot. Reinserting in this order keeps
/// entries that share an ideal slot in their original relative order, which
/// is what lets the rehash placement skip the rich/poor comparison.
fn anchor_scan<K, V>(slots: &[Slot<K, V>], mask: u64) -> impl Iterator<Item = usize> + '_ {
    let start = slots
        .iter()
        .enumerate()
        .find(|&(index, slot)| {
            slot.hash != EMPTY && (index as u64).wrapping_sub(slot.hash) & mask == 0
        })
        .map_or(0, |(index, _)| index);
    let n = slots.len();
    (0..n)
        .map(move |step| (start + step) & (n - 1))
        .filter(move |&index| slots[index].hash != EMPTY)
}

/// Hashes a value with a fixed-key SipHash, independent of the map's own
/// (possibly randomly seeded) builder. Used by the order-independent
/// [`Hash`] impl so that equal maps hash equal even when their builders
/// were seeded differently.
fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = SipHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// A hash map using Robin Hood linear probing with backward-shift deletion.
///
/// See the [module documentation](self) for the layout and probing scheme.
///
/// # Examples
///
/// ```rust
/// use robin_map::HashMap;
///
/// let mut map: HashMap<i32, &str> = HashMap::new();
/// map.insert(1, "one");
/// map.insert(2, "two");
///
/// assert_eq!(map.get(&1), Some(&"one"));
/// assert_eq!(map.remove(&2), Some("two"));
/// assert!(!map.is_empty());
/// ```
pub struct HashMap<K, V, S = DefaultHashBuilder> {
    slots: Box<[Slot<K, V>]>,
    len: usize,
    mask: u64,
    generation: u64,
    hash_builder: S,
}

impl<K, V, S: Default> HashMap<K, V, S> {
    /// Creates an empty map.
    ///
    /// No slots are allocated beyond the degenerate single-slot array until
    /// the first insertion.
    pub fn new() -> Self {
        Self::with_hasher(S::default())
    }

    /// Creates an empty map that can hold `capacity` entries without
    /// growing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_map::HashMap;
    ///
    /// let map: HashMap<u32, u32> = HashMap::with_capacity(100);
    /// assert!(map.capacity() >= 100);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_capacity_and_hasher(capacity, S::default())
    }
}

impl<K, V, S: Default> Default for HashMap<K, V, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// Creates an empty map with the given hash builder.
    pub fn with_hasher(hash_builder: S) -> Self {
        Self::with_capacity_and_hasher(0, hash_builder)
    }

    /// Creates an empty map with the given capacity and hash builder.
    pub fn with_capacity_and_hasher(capacity: usize, hash_builder: S) -> Self {
        let raw = policy::raw_of_real(capacity);
        HashMap {
            slots: new_slots(raw),
            len: 0,
            mask: (raw - 1) as u64,
            generation: 0,
            hash_builder,
        }
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of entries the map can hold before growing.
    pub fn capacity(&self) -> usize {
        policy::real_of_raw(self.slots.len())
    }

    /// Returns a reference to the map's hash builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }

    /// Ensures the map can hold `additional` more entries without growing.
    ///
    /// Growing is a structural change: live [`Cursor`]s are invalidated if
    /// a reallocation actually happens.
    pub fn reserve(&mut self, additional: usize) {
        let want = self.len.checked_add(additional).expect("capacity overflow");
        let raw = policy::raw_of_real(want);
        if raw > self.slots.len() {
            self.grow_to(raw);
        }
    }

    /// Removes every entry. Keeps the allocation; invalidates cursors.
    pub fn clear(&mut self) {
        if self.len > 0 {
            for slot in self.slots.iter_mut() {
                if slot.hash != EMPTY {
                    // SAFETY: occupied slots hold initialized payloads.
                    unsafe { slot.drop_payload() };
                }
            }
        }
        self.len = 0;
        self.invalidate_cursors();
    }

    /// An iterator over `(&key, &value)` pairs in slot order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.slots)
    }

    /// An iterator over the keys in slot order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// An iterator over the values in slot order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Creates a detached cursor positioned before the first entry.
    ///
    /// Unlike [`iter`](Self::iter), a cursor does not borrow the map: the
    /// map can be mutated while the cursor exists, and the cursor reports
    /// [`Error::Invalidated`] on its next advance after any structural
    /// change. Replacing the value of an existing key leaves cursors
    /// valid.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_map::{Error, HashMap};
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::with_capacity(4);
    /// map.insert(1, "one");
    ///
    /// let mut cursor = map.cursor();
    /// map.insert(1, "uno"); // value-only: cursor survives
    /// assert_eq!(map.next_entry(&mut cursor), Ok(Some((&1, &"uno"))));
    /// assert_eq!(map.next_entry(&mut cursor), Ok(None));
    ///
    /// let mut cursor = map.cursor();
    /// map.insert(2, "two"); // new key: structural change
    /// assert_eq!(map.next_entry(&mut cursor), Err(Error::Invalidated));
    /// ```
    pub fn cursor(&self) -> Cursor {
        Cursor {
            index_minus_generation: 0u64.wrapping_sub(self.generation),
        }
    }

    /// Advances a cursor to the next occupied slot.
    ///
    /// Returns `Ok(None)` once the cursor has passed the last slot, or
    /// [`Error::Invalidated`] if the map underwent a structural change
    /// since the cursor was created.
    pub fn next_entry<'a>(&'a self, cursor: &mut Cursor) -> Result<Option<(&'a K, &'a V)>, Error> {
        loop {
            let index = cursor.index_minus_generation.wrapping_add(self.generation);
            if index >= self.slots.len() as u64 {
                return if index >= GENERATION_SKIP {
                    Err(Error::Invalidated)
                } else {
                    Ok(None)
                };
            }
            cursor.index_minus_generation = cursor.index_minus_generation.wrapping_add(1);
            let slot = &self.slots[index as usize];
            if slot.hash != EMPTY {
                // SAFETY: occupied slots hold initialized payloads for the
                // lifetime of the shared borrow.
                return Ok(Some(unsafe { (slot.key_ref(), slot.value_ref()) }));
            }
        }
    }

    /// Calls `visit` on every entry, in slot order.
    ///
    /// Runs on the guarded cursor path, so a structural change observed
    /// mid-traversal surfaces as [`Error::Invalidated`].
    pub fn each<F: FnMut(&K, &V)>(&self, mut visit: F) -> Result<(), Error> {
        let mut cursor = self.cursor();
        while let Some((key, value)) = self.next_entry(&mut cursor)? {
            visit(key, value);
        }
        Ok(())
    }

    /// Returns the first value satisfying the predicate, in slot order.
    pub fn find<P: FnMut(&K, &V) -> bool>(&self, mut predicate: P) -> Option<&V> {
        self.iter().find(|&(k, v)| predicate(k, v)).map(|(_, v)| v)
    }

    /// Returns the first `(key, value)` pair satisfying the predicate, in
    /// slot order.
    pub fn find_item<P: FnMut(&K, &V) -> bool>(&self, mut predicate: P) -> Option<(&K, &V)> {
        self.iter().find(|&(k, v)| predicate(k, v))
    }

    /// Transforms every key-value pair into a new pair, collecting the
    /// results into a fresh map.
    ///
    /// Output keys are hashed from scratch and inserted through the full
    /// probing path; pairs that collapse onto the same key overwrite each
    /// other in slot order.
    pub fn map_items<K2, W>(&self, mut transform: impl FnMut(&K, &V) -> (K2, W)) -> HashMap<K2, W, S>
    where
        K2: Hash + Eq,
        S: BuildHasher + Clone,
    {
        let mut out = HashMap::with_capacity_and_hasher(self.len, self.hash_builder.clone());
        for (key, value) in self.iter() {
            let (new_key, new_value) = transform(key, value);
            out.insert(new_key, new_value);
        }
        out
    }

    #[cfg(any(feature = "rayon", feature = "stats"))]
    pub(crate) fn raw_slots(&self) -> &[Slot<K, V>] {
        &self.slots
    }

    #[cfg(any(feature = "rayon", feature = "stats"))]
    pub(crate) fn raw_mask(&self) -> u64 {
        self.mask
    }

    #[cfg(feature = "rayon")]
    pub(crate) fn from_raw_parts(slots: Box<[Slot<K, V>]>, len: usize, mask: u64, hash_builder: S) -> Self {
        debug_assert_eq!(mask as usize, slots.len() - 1);
        HashMap {
            slots,
            len,
            mask,
            generation: 0,
            hash_builder,
        }
    }

    #[inline(always)]
    fn invalidate_cursors(&mut self) {
        self.generation = self.generation.wrapping_add(GENERATION_SKIP);
    }

    /// Locates the slot holding `key`, exploiting the placement ordering
    /// for an early exit: once a resident is richer than the probe, the
    /// key cannot be further along.
    fn find_index<Q>(&self, hash: u64, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mask = self.mask;
        let mut index = (hash & mask) as usize;
        let mut dist = 0u64;
        loop {
            let slot = &self.slots[index];
            if slot.hash == EMPTY {
                return None;
            }
            // SAFETY: the slot is occupied.
            if slot.hash == hash && unsafe { slot.key_ref() }.borrow() == key {
                return Some(index);
            }
            let entry_dist = (index as u64).wrapping_sub(slot.hash) & mask;
            if entry_dist < dist {
                return None;
            }
            index = (index + 1) & mask as usize;
            dist += 1;
        }
    }

    /// Removes the entry at `index`, sliding displaced successors back so
    /// the placement ordering survives without rehashing anything.
    fn remove_at(&mut self, index: usize) -> (K, V) {
        // SAFETY: callers pass indices obtained from `find_index`, which
        // only returns occupied slots.
        let payload = unsafe { self.slots[index].take() };
        self.len -= 1;
        self.invalidate_cursors();

        let mask = self.mask;
        let mut hole = index;
        loop {
            let next = ((hole as u64 + 1) & mask) as usize;
            let next_hash = self.slots[next].hash;
            if next_hash == EMPTY || (next as u64).wrapping_sub(next_hash) & mask == 0 {
                break;
            }
            // The successor is displaced; slide it into the hole. The hole
            // slot already carries the empty hash from `take`.
            self.slots.swap(hole, next);
            hole = next;
        }
        payload
    }

    fn real_capacity(&self) -> usize {
        policy::real_of_raw(self.slots.len())
    }

    fn grow(&mut self) {
        let new_raw = if self.slots.len() < MIN_RAW_CAPACITY {
            MIN_RAW_CAPACITY
        } else {
            self.slots.len().checked_mul(2).expect("capacity overflow")
        };
        self.grow_to(new_raw);
    }

    /// Moves every entry into a fresh array of `new_raw` slots.
    fn grow_to(&mut self, new_raw: usize) {
        debug_assert!(new_raw.is_power_of_two() && new_raw >= MIN_RAW_CAPACITY);
        debug_assert!(new_raw > self.slots.len() || self.len == 0);

        let old = mem::replace(&mut self.slots, new_slots(new_raw));
        let old_mask = self.mask;
        self.mask = (new_raw - 1) as u64;
        self.invalidate_cursors();

        let mut moved = 0;
        for index in anchor_scan(&old, old_mask) {
            // SAFETY: `anchor_scan` yields occupied slots exactly once, and
            // `old` is discarded below as a plain buffer (slots have no
            // drop glue of their own), so each payload is moved out once.
            let (hash, key, value) = unsafe { old[index].read_out() };
            self.place_rehashed(hash, key, value);
            moved += 1;
        }
        debug_assert_eq!(moved, self.len, "rehash must preserve the entry count");
    }

    /// Placement helper for rehashing: the source array is scanned in
    /// anchor order and the destination starts empty, so the first empty
    /// slot at or after the ideal one is already the Robin Hood position.
    fn place_rehashed(&mut self, hash: u64, key: K, value: V) {
        let mask = self.mask;
        let mut index = (hash & mask) as usize;
        while self.slots[index].hash != EMPTY {
            index = (index + 1) & mask as usize;
        }
        self.slots[index].write(hash, key, value);
    }
}

impl<K: Eq, V, S> HashMap<K, V, S> {
    /// Grow-if-full followed by the full probing insert.
    pub(crate) fn insert_hashed(&mut self, hash: u64, key: K, value: V) -> (usize, Option<V>) {
        if self.len == self.real_capacity() {
            self.grow();
        }
        self.set_hashed(hash, key, value)
    }

    /// The Robin Hood insertion probe. Returns the slot index the new entry
    /// landed in and the previous value if the key was already present.
    ///
    /// The caller must have ensured at least one empty slot exists.
    fn set_hashed(&mut self, hash: u64, key: K, value: V) -> (usize, Option<V>) {
        debug_assert_ne!(hash, EMPTY);
        debug_assert!(self.len < self.slots.len());

        let mask = self.mask;
        let mut index = (hash & mask) as usize;
        let mut dist = 0u64;
        // Where the incoming entry ends up: pinned at the first swap,
        // otherwise wherever the probe stops.
        let mut placed: Option<usize> = None;
        let (mut hash, mut key, mut value) = (hash, key, value);
        loop {
            let slot = &mut self.slots[index];
            if slot.hash == EMPTY {
                slot.write(hash, key, value);
                self.len += 1;
                self.invalidate_cursors();
                return (placed.unwrap_or(index), None);
            }
            // Only the original entry can match an existing key; once a
            // resident has been displaced the probe is carrying an entry
            // that is already unique in the table.
            if placed.is_none() && slot.hash == hash {
                // SAFETY: the slot is occupied.
                if unsafe { slot.key_ref() } == &key {
                    // Value-only replacement: the stored key stays, and no
                    // structural change happens, so cursors stay valid.
                    let old = unsafe { slot.replace_value(value) };
                    return (index, Some(old));
                }
            }
            let entry_dist = (index as u64).wrapping_sub(slot.hash) & mask;
            if entry_dist < dist {
                // The resident is richer; it yields its slot and the probe
                // carries it onward. `dist` keeps counting physical steps.
                // SAFETY: the slot is occupied.
                unsafe { slot.swap_payload(&mut hash, &mut key, &mut value) };
                if placed.is_none() {
                    placed = Some(index);
                }
            }
            index = (index + 1) & mask as usize;
            dist += 1;
        }
    }
}

impl<K, V, S> HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn hash_key<Q: Hash + ?Sized>(&self, key: &Q) -> u64 {
        finalize_hash(self.hash_builder.hash_one(key))
    }

    /// Returns a reference to the value stored for `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_map::HashMap;
    ///
    /// let mut map: HashMap<&str, i32> = HashMap::new();
    /// map.insert("a", 1);
    /// assert_eq!(map.get("a"), Some(&1));
    /// assert_eq!(map.get("b"), None);
    /// ```
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_key(key);
        let index = self.find_index(hash, key)?;
        // SAFETY: `find_index` only returns occupied slots.
        Some(unsafe { self.slots[index].value_ref() })
    }

    /// Returns a mutable reference to the value stored for `key`.
    ///
    /// Mutating a value through this reference is not a structural change;
    /// live cursors stay valid.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_key(key);
        let index = self.find_index(hash, key)?;
        // SAFETY: `find_index` only returns occupied slots.
        Some(unsafe { self.slots[index].value_mut() })
    }

    /// Like [`get`](Self::get), but failing with [`Error::KeyNotFound`]
    /// for an absent key.
    pub fn try_get<Q>(&self, key: &Q) -> Result<&V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns the stored key-value pair for `key`.
    ///
    /// The returned key is the one the entry was first inserted with;
    /// value replacements never touch it.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_key(key);
        let index = self.find_index(hash, key)?;
        let slot = &self.slots[index];
        // SAFETY: `find_index` only returns occupied slots.
        Some(unsafe { (slot.key_ref(), slot.value_ref()) })
    }

    /// Returns `true` if the map holds an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_key(key);
        self.find_index(hash, key).is_some()
    }

    /// Inserts a key-value pair, returning the previous value if the key
    /// was already present.
    ///
    /// Replacing the value of an existing key keeps the originally stored
    /// key and is not a structural change (live cursors survive it) unless
    /// the call had to grow the table first. Inserting a new key always
    /// invalidates cursors.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_map::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// assert_eq!(map.insert(7, "a"), None);
    /// assert_eq!(map.insert(7, "b"), Some("a"));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let hash = self.hash_key(&key);
        self.insert_hashed(hash, key, value).1
    }

    /// Inserts a new key-value pair, failing with [`Error::DuplicateKey`]
    /// if the key is already present. The stored value is untouched on
    /// failure.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<&mut V, Error> {
        let hash = self.hash_key(&key);
        if self.find_index(hash, &key).is_some() {
            return Err(Error::DuplicateKey);
        }
        let (index, _) = self.insert_hashed(hash, key, value);
        // SAFETY: the entry was just placed at `index`.
        Ok(unsafe { self.slots[index].value_mut() })
    }

    /// Inserts only if the key is absent. Returns `true` if the pair was
    /// inserted; an existing entry is left untouched.
    pub fn insert_if_absent(&mut self, key: K, value: V) -> bool {
        self.try_insert(key, value).is_ok()
    }

    /// Returns a mutable reference to the value for `key`, inserting one
    /// produced by `make` if the key is absent. `make` only runs on a miss.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_map::HashMap;
    ///
    /// let mut map: HashMap<&str, i32> = HashMap::new();
    /// *map.get_or_insert_with("hits", || 0) += 1;
    /// *map.get_or_insert_with("hits", || 0) += 1;
    /// assert_eq!(map.get("hits"), Some(&2));
    /// ```
    pub fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        let hash = self.hash_key(&key);
        if let Some(index) = self.find_index(hash, &key) {
            // SAFETY: `find_index` only returns occupied slots.
            return unsafe { self.slots[index].value_mut() };
        }
        let value = make();
        let (index, _) = self.insert_hashed(hash, key, value);
        // SAFETY: the entry was just placed at `index`.
        unsafe { self.slots[index].value_mut() }
    }

    /// Removes the entry for `key`, returning its value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_map::HashMap;
    ///
    /// let mut map: HashMap<i32, &str> = HashMap::new();
    /// map.insert(1, "one");
    /// assert_eq!(map.remove(&1), Some("one"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let hash = self.hash_key(key);
        let index = self.find_index(hash, key)?;
        Some(self.remove_at(index).1)
    }

    /// Like [`remove`](Self::remove), but failing with
    /// [`Error::KeyNotFound`] for an absent key.
    pub fn try_remove<Q>(&mut self, key: &Q) -> Result<V, Error>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.remove(key).ok_or(Error::KeyNotFound)
    }
}

impl<K: Clone + Eq, V, S: Clone> HashMap<K, V, S> {
    /// Transforms every value, keeping the keys, into a fresh map.
    ///
    /// The stored finalized hashes are reused (the keys and the hash
    /// builder are unchanged), so no rehashing happens.
    pub fn map<W>(&self, mut transform: impl FnMut(&K, &V) -> W) -> HashMap<K, W, S> {
        let mut out = HashMap::with_capacity_and_hasher(self.len, self.hash_builder.clone());
        for slot in self.slots.iter().filter(|slot| slot.hash != EMPTY) {
            // SAFETY: the slot is occupied.
            let (key, value) = unsafe { (slot.key_ref(), slot.value_ref()) };
            let mapped = transform(key, value);
            out.insert_hashed(slot.hash, key.clone(), mapped);
        }
        out
    }

    /// Collects the entries satisfying the predicate into a fresh map.
    ///
    /// The result starts small and grows as needed.
    pub fn filter(&self, mut predicate: impl FnMut(&K, &V) -> bool) -> Self
    where
        V: Clone,
    {
        let mut out = Self::with_hasher(self.hash_builder.clone());
        for slot in self.slots.iter().filter(|slot| slot.hash != EMPTY) {
            // SAFETY: the slot is occupied.
            let (key, value) = unsafe { (slot.key_ref(), slot.value_ref()) };
            if predicate(key, value) {
                out.insert_hashed(slot.hash, key.clone(), value.clone());
            }
        }
        out
    }

    /// Clones the map with room for `additional` more entries.
    ///
    /// The clone shares no state with the original and starts at a fresh
    /// generation.
    pub fn clone_reserved(&self, additional: usize) -> Self
    where
        V: Clone,
    {
        let want = self.len.checked_add(additional).expect("capacity overflow");
        let target_raw = policy::raw_of_real(want).max(self.slots.len());
        if target_raw == self.slots.len() {
            return self.clone();
        }
        let mut out = HashMap {
            slots: new_slots(target_raw),
            len: self.len,
            mask: (target_raw - 1) as u64,
            generation: 0,
            hash_builder: self.hash_builder.clone(),
        };
        for index in anchor_scan(&self.slots, self.mask) {
            let slot = &self.slots[index];
            // SAFETY: `anchor_scan` yields occupied slots only.
            let (key, value) = unsafe { (slot.key_ref(), slot.value_ref()) };
            out.place_rehashed(slot.hash, key.clone(), value.clone());
        }
        out
    }
}

impl<K: Clone + Eq, V: Clone, S: Clone> HashMap<K, Option<V>, S> {
    /// Collects the entries holding `Some` value into a fresh map of the
    /// unwrapped values, dropping the `None`s.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_map::HashMap;
    ///
    /// let mut map: HashMap<&str, Option<i32>> = HashMap::new();
    /// map.insert("kept", Some(1));
    /// map.insert("dropped", None);
    ///
    /// let dense = map.filter_none();
    /// assert_eq!(dense.len(), 1);
    /// assert_eq!(dense.get("kept"), Some(&1));
    /// ```
    pub fn filter_none(&self) -> HashMap<K, V, S> {
        let mut out = HashMap::with_hasher(self.hash_builder.clone());
        for slot in self.slots.iter().filter(|slot| slot.hash != EMPTY) {
            // SAFETY: the slot is occupied.
            let (key, value) = unsafe { (slot.key_ref(), slot.value_ref()) };
            if let Some(value) = value {
                out.insert_hashed(slot.hash, key.clone(), value.clone());
            }
        }
        out
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for HashMap<K, V, S> {
    fn clone(&self) -> Self {
        let mut slots = new_slots(self.slots.len());
        for (src, dst) in self.slots.iter().zip(slots.iter_mut()) {
            if src.hash != EMPTY {
                // SAFETY: the source slot is occupied; the destination is
                // freshly allocated and empty.
                unsafe { dst.write(src.hash, src.key_ref().clone(), src.value_ref().clone()) };
            }
        }
        HashMap {
            slots,
            len: self.len,
            mask: self.mask,
            generation: 0,
            hash_builder: self.hash_builder.clone(),
        }
    }
}

impl<K, V, S> Drop for HashMap<K, V, S> {
    fn drop(&mut self) {
        if (mem::needs_drop::<K>() || mem::needs_drop::<V>()) && self.len > 0 {
            for slot in self.slots.iter_mut() {
                if slot.hash != EMPTY {
                    // SAFETY: occupied slots hold initialized payloads and
                    // each is dropped exactly once here.
                    unsafe { slot.drop_payload() };
                }
            }
        }
    }
}

impl<K: Debug, V: Debug, S> Debug for HashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in self.iter() {
            map.entry(k, v);
        }
        map.finish()
    }
}

impl<K: Display, V: Display, S> Display for HashMap<K, V, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (k, v)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        f.write_str("}")
    }
}

impl<K, V, S> PartialEq for HashMap<K, V, S>
where
    K: Hash + Eq,
    V: PartialEq,
    S: BuildHasher,
{
    /// Order-independent equality.
    ///
    /// Scans `self` against `other` only; the length check up front makes
    /// the one-sided scan sufficient.
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        self.iter()
            .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V, S> Eq for HashMap<K, V, S>
where
    K: Hash + Eq,
    V: Eq,
    S: BuildHasher,
{
}

impl<K: Hash, V: Hash, S> Hash for HashMap<K, V, S> {
    /// Order-independent hash, consistent with `==` across maps whose
    /// builders were seeded differently (entries are hashed with a
    /// fixed-key SipHash, not the map's own builder).
    ///
    /// Each entry contributes its key hash mixed with its value hash
    /// rotated by the key hash's low bits, so exchanging values between
    /// two keys changes the sum.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut acc = 0u64;
        for (key, value) in self.iter() {
            let key_hash = stable_hash(key);
            let value_hash = stable_hash(value);
            acc = acc.wrapping_add(key_hash ^ value_hash.rotate_left((key_hash & 63) as u32));
        }
        state.write_u64(acc);
        state.write_usize(self.len);
    }
}

impl<K, V, S> Extend<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        let iter = iter.into_iter();
        self.reserve(iter.size_hint().0);
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for HashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let iter = iter.into_iter();
        let mut map = Self::with_capacity_and_hasher(iter.size_hint().0, S::default());
        for (key, value) in iter {
            map.insert(key, value);
        }
        map
    }
}
