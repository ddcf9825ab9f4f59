use rustc_hash::FxBuildHasher;

/// Timestamp in microseconds, as produced by a [`Clock`](crate::clock::Clock).
///
/// Timestamps are only meaningful relative to other timestamps from the same
/// clock instance.
pub type Micros = u64;

/// Sentinel for timestamps that have not been stamped yet.
pub(crate) const NEVER: Micros = Micros::MAX;

/// Insertion-ordered map with a fast hasher.
///
/// Resource iteration order must match registration order so trigger fan-out
/// and graph dumps are deterministic.
pub(crate) type IndexMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;
