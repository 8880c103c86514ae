//! Parallel bulk operations, available with the `rayon` feature.
//!
//! Both operations lean on rayon's indexed parallel iterators as a
//! "parallel fill by index" primitive: the per-entry closure runs
//! concurrently over the slot array, the collected output is ordered by
//! slot index, and the result table is assembled sequentially from it.
//! Result layout is deterministic; no ordering of keys is required.

use alloc::vec::Vec;

use rayon::iter::IntoParallelRefIterator;
use rayon::iter::ParallelIterator;

use crate::hash_map::new_slots;
use crate::hash_map::HashMap;
use crate::hash_map::EMPTY;

impl<K, V, S> HashMap<K, V, S>
where
    K: Sync,
    V: Sync,
{
    /// Like [`map`](Self::map), but evaluating `transform` in parallel.
    ///
    /// The result preserves the slot layout of the source exactly: every
    /// occupied slot keeps its index and stored hash, empty slots stay
    /// empty, and the clone of each key pairs with the transformed value
    /// produced for its slot. The result starts at a fresh generation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use robin_map::HashMap;
    ///
    /// let mut map = HashMap::new();
    /// for k in 0..100u64 {
    ///     map.insert(k, k);
    /// }
    /// let squared = map.par_map(|_, v| v * v);
    /// assert_eq!(squared.get(&9), Some(&81));
    /// ```
    pub fn par_map<W>(&self, transform: impl Fn(&K, &V) -> W + Sync) -> HashMap<K, W, S>
    where
        K: Clone,
        W: Send,
        S: Clone,
    {
        // Parallel fill by slot index; empty slots produce nothing.
        let produced: Vec<Option<W>> = self
            .raw_slots()
            .par_iter()
            .map(|slot| {
                if slot.hash == EMPTY {
                    None
                } else {
                    // SAFETY: the slot is occupied and the source map is
                    // borrowed shared for the whole operation.
                    let (key, value) = unsafe { (slot.key_ref(), slot.value_ref()) };
                    Some(transform(key, value))
                }
            })
            .collect();

        let mut slots = new_slots(self.raw_slots().len());
        for ((src, dst), value) in self.raw_slots().iter().zip(slots.iter_mut()).zip(produced) {
            if let Some(value) = value {
                // SAFETY: the source slot is occupied (it produced a value).
                dst.write(src.hash, unsafe { src.key_ref() }.clone(), value);
            }
        }
        HashMap::from_raw_parts(slots, self.len(), self.raw_mask(), self.hasher().clone())
    }

    /// Like [`filter`](Self::filter), but evaluating the predicate in
    /// parallel.
    ///
    /// The predicate vector is computed concurrently by slot index, the
    /// matches are counted, and the result is allocated exactly and filled
    /// sequentially. When every entry matches, the result is simply a
    /// clone of the source.
    pub fn par_filter(&self, predicate: impl Fn(&K, &V) -> bool + Sync) -> Self
    where
        K: Clone + Eq,
        V: Clone,
        S: Clone,
    {
        let keep: Vec<bool> = self
            .raw_slots()
            .par_iter()
            .map(|slot| {
                if slot.hash == EMPTY {
                    false
                } else {
                    // SAFETY: the slot is occupied and the source map is
                    // borrowed shared for the whole operation.
                    let (key, value) = unsafe { (slot.key_ref(), slot.value_ref()) };
                    predicate(key, value)
                }
            })
            .collect();

        let matches = keep.iter().filter(|&&kept| kept).count();
        if matches == self.len() {
            return self.clone();
        }

        let mut out = Self::with_capacity_and_hasher(matches, self.hasher().clone());
        for (slot, kept) in self.raw_slots().iter().zip(keep) {
            if kept {
                // SAFETY: only occupied slots were marked as kept.
                let (key, value) = unsafe { (slot.key_ref(), slot.value_ref()) };
                out.insert_hashed(slot.hash, key.clone(), value.clone());
            }
        }
        out
    }
}
