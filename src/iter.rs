//! Iterators over a [`HashMap`] and the detached cursor protocol.
//!
//! All flavors share one skip-empty driver: walk the slot array in
//! physical order and project out the payload of each occupied slot. The
//! borrowed iterators pin the map with a shared borrow, so the borrow
//! checker rules out structural mutation while they live. [`Cursor`] is
//! the dynamic counterpart: a plain value that folds the map's generation
//! counter into its position, so a structural change made between
//! advances is detected (as [`Error::Invalidated`]) instead of being
//! prevented.
//!
//! [`Error::Invalidated`]: crate::Error::Invalidated

use crate::hash_map::HashMap;
use crate::hash_map::Slot;
use crate::hash_map::EMPTY;

/// A detached position in a [`HashMap`] traversal.
///
/// Created by [`HashMap::cursor`] and advanced with
/// [`HashMap::next_entry`]. A cursor borrows nothing; it stores its slot
/// index *minus the map's generation counter*, so the index it computes
/// after any structural change lands far past the end of the slot array
/// and the next advance reports the map as changed. The staleness check
/// therefore costs nothing on the per-entry path; it is part of the
/// end-of-table test.
///
/// A cursor is only meaningful with the map that created it.
#[derive(Clone, Copy, Debug)]
pub struct Cursor {
    pub(crate) index_minus_generation: u64,
}

/// An iterator over the `(&key, &value)` pairs of a [`HashMap`] in slot
/// order.
///
/// Created by [`HashMap::iter`].
pub struct Iter<'a, K, V> {
    slots: &'a [Slot<K, V>],
    index: usize,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(slots: &'a [Slot<K, V>]) -> Self {
        Iter { slots, index: 0 }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.slots.len() {
            let slot = &self.slots[self.index];
            self.index += 1;
            if slot.hash != EMPTY {
                // SAFETY: occupied slots hold initialized payloads for the
                // lifetime of the shared borrow.
                return Some(unsafe { (slot.key_ref(), slot.value_ref()) });
            }
        }
        None
    }
}

/// An iterator over the keys of a [`HashMap`] in slot order.
///
/// Created by [`HashMap::keys`].
pub struct Keys<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }
}

/// An iterator over the values of a [`HashMap`] in slot order.
///
/// Created by [`HashMap::values`].
pub struct Values<'a, K, V> {
    pub(crate) inner: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }
}

impl<'a, K, V, S> IntoIterator for &'a HashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;
    use core::hash::BuildHasher;

    use rand::TryRngCore;
    use rand::rngs::OsRng;
    use siphasher::sip::SipHasher;

    use crate::Error;
    use crate::HashMap;

    #[derive(Clone)]
    struct SipState {
        k0: u64,
        k1: u64,
    }

    impl SipState {
        fn random() -> Self {
            let mut rng = OsRng;
            SipState {
                k0: rng.try_next_u64().unwrap(),
                k1: rng.try_next_u64().unwrap(),
            }
        }
    }

    impl BuildHasher for SipState {
        type Hasher = SipHasher;

        fn build_hasher(&self) -> SipHasher {
            SipHasher::new_with_keys(self.k0, self.k1)
        }
    }

    fn filled(n: u64) -> HashMap<u64, u64, SipState> {
        let mut map = HashMap::with_hasher(SipState::random());
        for k in 0..n {
            map.insert(k, 2 * k);
        }
        map
    }

    #[test]
    fn iterators_agree_on_the_live_set() {
        let map = filled(200);

        let mut items: Vec<(u64, u64)> = map.iter().map(|(k, v)| (*k, *v)).collect();
        items.sort_unstable();
        assert_eq!(items, (0..200).map(|k| (k, 2 * k)).collect::<Vec<_>>());

        let mut keys: Vec<u64> = map.keys().copied().collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..200).collect::<Vec<_>>());

        let mut values: Vec<u64> = map.values().copied().collect();
        values.sort_unstable();
        assert_eq!(values, (0..200).map(|k| 2 * k).collect::<Vec<_>>());
    }

    #[test]
    fn for_loop_over_a_reference() {
        let map = filled(50);
        let mut count = 0;
        for (k, v) in &map {
            assert_eq!(*v, 2 * k);
            count += 1;
        }
        assert_eq!(count, 50);
    }

    #[test]
    fn empty_map_yields_nothing() {
        let map: HashMap<u64, u64, SipState> = HashMap::with_hasher(SipState::random());
        assert_eq!(map.iter().next(), None);
        assert_eq!(map.keys().next(), None);
        assert_eq!(map.values().next(), None);

        let mut cursor = map.cursor();
        assert_eq!(map.next_entry(&mut cursor), Ok(None));
    }

    #[test]
    fn cursor_walks_every_entry() {
        let map = filled(100);
        let mut cursor = map.cursor();
        let mut seen = Vec::new();
        while let Some((k, v)) = map.next_entry(&mut cursor).unwrap() {
            seen.push((*k, *v));
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..100).map(|k| (k, 2 * k)).collect::<Vec<_>>());

        // Past the end the cursor stays exhausted.
        assert_eq!(map.next_entry(&mut cursor), Ok(None));
        assert_eq!(map.next_entry(&mut cursor), Ok(None));
    }

    #[test]
    fn cursor_fails_after_inserting_a_new_key() {
        let mut map = filled(3);
        let mut cursor = map.cursor();
        map.insert(1000, 0);
        assert_eq!(map.next_entry(&mut cursor), Err(Error::Invalidated));
    }

    #[test]
    fn cursor_fails_after_removal_growth_and_clear() {
        let mut map = filled(8);

        let mut cursor = map.cursor();
        map.remove(&3);
        assert_eq!(map.next_entry(&mut cursor), Err(Error::Invalidated));

        let mut cursor = map.cursor();
        map.reserve(10_000);
        assert_eq!(map.next_entry(&mut cursor), Err(Error::Invalidated));

        let mut cursor = map.cursor();
        map.clear();
        assert_eq!(map.next_entry(&mut cursor), Err(Error::Invalidated));
    }

    #[test]
    fn cursor_fails_mid_traversal_too() {
        let mut map = filled(64);
        let mut cursor = map.cursor();
        for _ in 0..10 {
            map.next_entry(&mut cursor).unwrap();
        }
        map.remove(&0);
        assert_eq!(map.next_entry(&mut cursor), Err(Error::Invalidated));
        // The error is sticky.
        assert_eq!(map.next_entry(&mut cursor), Err(Error::Invalidated));
    }

    #[test]
    fn cursor_survives_value_only_replacement() {
        let mut map: HashMap<u64, u64, SipState> =
            HashMap::with_capacity_and_hasher(8, SipState::random());
        for k in 0..4u64 {
            map.insert(k, k);
        }

        let mut cursor = map.cursor();
        let mut seen = 0;
        map.next_entry(&mut cursor).unwrap();
        seen += 1;

        // Replacing values of existing keys is not a structural change,
        // whether through `insert` or `get_mut`.
        map.insert(2, 200);
        *map.get_mut(&3).unwrap() += 300;

        while map.next_entry(&mut cursor).unwrap().is_some() {
            seen += 1;
        }
        assert_eq!(seen, 4);
    }

    #[test]
    fn fresh_cursor_sees_updated_values() {
        let mut map = filled(4);
        map.insert(2, 999);
        let mut cursor = map.cursor();
        let mut found = false;
        while let Some((k, v)) = map.next_entry(&mut cursor).unwrap() {
            if *k == 2 {
                assert_eq!(*v, 999);
                found = true;
            }
        }
        assert!(found);
    }
}
