//! Merging of freshly fetched items with a persisted snapshot.

use std::collections::HashSet;

use super::traits::Cacheable;

/// Merge a fresh (possibly partial) fetch with the last snapshot.
///
/// Fresh items come first, in fetch order. Snapshot items follow in snapshot
/// order, skipping any id already present. When an id appears more than once
/// the first occurrence wins, so fresh fields always beat snapshot fields.
pub fn merge<T: Cacheable>(snapshot: Vec<T>, fresh: Vec<T>) -> Vec<T> {
  let mut seen: HashSet<String> = HashSet::with_capacity(fresh.len() + snapshot.len());
  let mut merged = Vec::with_capacity(fresh.len() + snapshot.len());

  for item in fresh.into_iter().chain(snapshot) {
    if seen.insert(item.cache_key().to_string()) {
      merged.push(item);
    }
  }

  merged
}
