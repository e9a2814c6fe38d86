//! Build-once cardinality override cache.
//!
//! Chained hash table keyed by probe text. Slot count is the square of the
//! entry count (capped), so chains stay short for the handful of overrides a
//! directive carries. Duplicate keys are all inserted; lookups return the
//! first match in insertion order.

use tracing::debug;

use pilotscope_core::hash::bucket_of;

/// Upper bound on slots so a large directive cannot blow up the table.
pub const MAX_SLOTS: usize = 1 << 16;

#[derive(Debug, Clone)]
struct Entry {
    key: String,
    card: f64,
}

#[derive(Debug, Default)]
pub struct CardinalityCache {
    /// Each slot is a chain in insertion order.
    slots: Vec<Vec<Entry>>,
    len: usize,
}

impl CardinalityCache {
    /// Build the table from `(probe text, cardinality)` pairs.
    pub fn build<K: Into<String>>(entries: impl IntoIterator<Item = (K, f64)>) -> Self {
        let entries: Vec<(String, f64)> = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        let n = entries.len();
        let slot_count = n.saturating_mul(n).clamp(1, MAX_SLOTS);

        let mut cache = Self {
            slots: vec![Vec::new(); slot_count],
            len: 0,
        };
        for (key, card) in entries {
            cache.insert(key, card);
        }
        debug!(entries = n, slots = slot_count, "cardinality cache built");
        cache
    }

    /// Build from the parallel sequences of a cardinality-replace anchor.
    /// Callers validate equal length; extra elements on either side are ignored.
    pub fn from_parallel(subquery: &[String], card: &[f64]) -> Self {
        Self::build(subquery.iter().cloned().zip(card.iter().copied()))
    }

    fn insert(&mut self, key: String, card: f64) {
        let idx = bucket_of(&key, self.slots.len());
        self.slots[idx].push(Entry { key, card });
        self.len += 1;
    }

    /// Exact-text lookup; `None` means "keep the host's own estimate".
    pub fn get(&self, key: &str) -> Option<f64> {
        if self.slots.is_empty() {
            return None;
        }
        self.slots[bucket_of(key, self.slots.len())]
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.card)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
