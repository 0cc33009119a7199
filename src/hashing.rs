//! Deterministic hashing for the crate.
//!
//! The hashing data structures in the standard library are randomly seeded, so
//! iteration order changes from run to run. Anything that feeds a random
//! number generator must iterate in a reproducible order, so the crate uses the
//! `rustc-hash` maps and sets everywhere.
//!
//! The `hash_str` free function is used by `crate::random` to derive a seed
//! offset for each named RNG stream.

use xxhash_rust::xxh3::xxh3_64;

pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};

/// Computes a stable 64-bit hash of a `&str`.
pub fn hash_str(data: &str) -> u64 {
    xxh3_64(data.as_bytes())
}
