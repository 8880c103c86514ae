//! Compile-time sizing strategy.
//!
//! The table's physical slot count (*raw* capacity) is always a power of
//! two so mapping a hash to a slot is a single AND. The number of live
//! entries permitted before growth (*real* capacity) is derived from the
//! raw capacity by the strategy selected at build time, the same way the
//! load factor is feature-selected rather than parameterized: swapping
//! strategies never costs a branch on the lookup or insert paths.

use cfg_if::cfg_if;

/// Smallest raw capacity of a table that holds at least one entry.
///
/// The degenerate empty table uses a single slot instead, which keeps the
/// probe loops free of an empty-array special case; the first insertion
/// grows it here.
pub(crate) const MIN_RAW_CAPACITY: usize = 8;

cfg_if! {
    if #[cfg(feature = "load-fifty")] {
        #[cfg(any(feature = "stats", test))]
        pub(crate) const STRATEGY: &str = "conservative";

        #[inline(always)]
        fn load_limit(raw: usize) -> usize {
            raw / 2
        }
    } else if #[cfg(feature = "load-eighty")] {
        #[cfg(any(feature = "stats", test))]
        pub(crate) const STRATEGY: &str = "moderate";

        #[inline(always)]
        fn load_limit(raw: usize) -> usize {
            raw * 4 / 5
        }
    } else {
        #[cfg(any(feature = "stats", test))]
        pub(crate) const STRATEGY: &str = "aggressive";

        #[inline(always)]
        fn load_limit(raw: usize) -> usize {
            (raw * 10 + 9) / 11
        }
    }
}

/// Maximum number of live entries a table of `raw` slots may hold.
#[inline(always)]
pub(crate) fn real_of_raw(raw: usize) -> usize {
    if raw < MIN_RAW_CAPACITY {
        0
    } else {
        load_limit(raw)
    }
}

/// Smallest power-of-two raw capacity whose real capacity is at least
/// `real`. Never below [`MIN_RAW_CAPACITY`], except that a requested real
/// capacity of zero maps to the one-slot degenerate table.
pub(crate) fn raw_of_real(real: usize) -> usize {
    if real == 0 {
        return 1;
    }
    let mut raw = MIN_RAW_CAPACITY;
    while real_of_raw(raw) < real {
        raw = raw.checked_mul(2).expect("capacity overflow");
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_table_holds_nothing() {
        assert_eq!(raw_of_real(0), 1);
        assert_eq!(real_of_raw(1), 0);
    }

    #[test]
    fn first_growth_reaches_min_capacity() {
        assert_eq!(raw_of_real(1), MIN_RAW_CAPACITY);
    }

    #[test]
    fn real_capacity_is_bounded_by_raw() {
        let mut raw = MIN_RAW_CAPACITY;
        while raw <= 1 << 20 {
            assert!(real_of_raw(raw) <= raw);
            assert!(real_of_raw(raw) > 0);
            raw *= 2;
        }
    }

    #[test]
    fn raw_of_real_satisfies_the_request() {
        for real in [1, 7, 8, 9, 100, 1000, 4096] {
            let raw = raw_of_real(real);
            assert!(raw.is_power_of_two());
            assert!(real_of_raw(raw) >= real, "raw {} for real {}", raw, real);
        }
    }

    #[test]
    fn strategy_thresholds() {
        let real = real_of_raw(1 << 10);
        if cfg!(feature = "load-fifty") {
            assert_eq!(STRATEGY, "conservative");
            assert_eq!(real, 512);
        } else if cfg!(feature = "load-eighty") {
            assert_eq!(STRATEGY, "moderate");
            assert_eq!(real, 819);
        } else {
            assert_eq!(STRATEGY, "aggressive");
            assert_eq!(real, 931);
        }
    }
}
