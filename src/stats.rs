//! Probe-distance and occupancy diagnostics, available with the `stats`
//! feature.

use crate::hash_map::HashMap;
use crate::hash_map::EMPTY;
use crate::policy;

/// Number of exact probe-distance buckets tracked by [`ProbeHistogram`];
/// longer probes land in the overflow bucket.
const PROBE_BUCKETS: usize = 16;

/// Occupancy statistics for a [`HashMap`].
#[derive(Debug, Clone)]
pub struct DebugStats {
    /// Number of entries currently in the map.
    pub populated: usize,
    /// Maximum number of entries before the next growth.
    pub capacity: usize,
    /// Number of physical slots allocated.
    pub raw_slots: usize,
    /// `populated / capacity`.
    pub load_factor: f64,
    /// Name of the compile-time sizing strategy.
    pub strategy: &'static str,
    /// Bytes held by the slot array.
    pub slot_bytes: usize,
}

#[cfg(feature = "std")]
impl DebugStats {
    /// Pretty-prints the statistics.
    pub fn print(&self) {
        println!("=== Map Statistics ===");
        println!(
            "Population: {}/{} ({:.2}% load factor, {} strategy)",
            self.populated,
            self.capacity,
            self.load_factor * 100.0,
            self.strategy
        );
        println!("Slots: {} ({} bytes)", self.raw_slots, self.slot_bytes);
    }
}

/// Distribution of probe distances across the occupied slots.
///
/// Distance zero means an entry sits in its ideal slot. Robin Hood
/// placement keeps this distribution tight even near the load limit;
/// the histogram is the cheapest way to see a degenerate hash function.
#[derive(Debug, Clone)]
pub struct ProbeHistogram {
    /// `counts[d]` is the number of entries at probe distance `d`.
    pub counts: [usize; PROBE_BUCKETS],
    /// Entries at probe distance `PROBE_BUCKETS` or beyond.
    pub overflow: usize,
    /// Longest probe distance observed.
    pub max_distance: u64,
}

#[cfg(feature = "std")]
impl ProbeHistogram {
    /// Pretty-prints the histogram.
    pub fn print(&self) {
        let max = self.counts.iter().copied().max().unwrap_or(0).max(self.overflow);
        if max == 0 {
            println!("probe histogram: empty");
            return;
        }
        let max_bar = 60usize;
        for (distance, &count) in self.counts.iter().enumerate() {
            let bar = "█".repeat(count * max_bar / max);
            println!("{:>3} | {} ({})", distance, bar, count);
        }
        let bar = "█".repeat(self.overflow * max_bar / max);
        println!("{:>3}+| {} ({})", PROBE_BUCKETS, bar, self.overflow);
        println!("max probe distance: {}", self.max_distance);
    }
}

impl<K, V, S> HashMap<K, V, S> {
    /// Returns occupancy statistics for the map.
    pub fn debug_stats(&self) -> DebugStats {
        let capacity = self.capacity();
        DebugStats {
            populated: self.len(),
            capacity,
            raw_slots: self.raw_slots().len(),
            load_factor: if capacity == 0 {
                0.0
            } else {
                self.len() as f64 / capacity as f64
            },
            strategy: policy::STRATEGY,
            slot_bytes: core::mem::size_of_val(self.raw_slots()),
        }
    }

    /// Returns the distribution of probe distances across all entries.
    pub fn probe_histogram(&self) -> ProbeHistogram {
        let mask = self.raw_mask();
        let mut histogram = ProbeHistogram {
            counts: [0; PROBE_BUCKETS],
            overflow: 0,
            max_distance: 0,
        };
        for (index, slot) in self.raw_slots().iter().enumerate() {
            if slot.hash == EMPTY {
                continue;
            }
            let distance = (index as u64).wrapping_sub(slot.hash) & mask;
            if (distance as usize) < PROBE_BUCKETS {
                histogram.counts[distance as usize] += 1;
            } else {
                histogram.overflow += 1;
            }
            histogram.max_distance = histogram.max_distance.max(distance);
        }
        histogram
    }
}
