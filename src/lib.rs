#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod hash_map;
pub mod iter;

mod error;
#[cfg(feature = "rayon")]
mod par;
mod policy;
#[cfg(feature = "stats")]
mod stats;

pub use error::Error;
pub use hash_map::DefaultHashBuilder;
pub use hash_map::HashMap;
pub use iter::Cursor;
pub use iter::Iter;
pub use iter::Keys;
pub use iter::Values;
#[cfg(feature = "stats")]
pub use stats::DebugStats;
#[cfg(feature = "stats")]
pub use stats::ProbeHistogram;
