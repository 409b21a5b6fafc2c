//! Duplicate suppression and top-N selection

use budget_rag_core::{DedupKey, ResolvedHit};
use std::collections::HashSet;

/// Tracks the dedup keys already emitted in one search
#[derive(Debug, Default)]
pub struct DedupFilter {
    seen: HashSet<DedupKey>,
}

impl DedupFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a key is offered, `false` afterwards
    pub fn admit(&mut self, hit: &ResolvedHit) -> bool {
        self.seen.insert(hit.dedup_key())
    }
}

/// Keep the first hit per dedup key, in input order, then cap at `max_results`.
pub fn dedup_and_select<I>(hits: I, max_results: usize) -> Vec<ResolvedHit>
where
    I: IntoIterator<Item = ResolvedHit>,
{
    let mut filter = DedupFilter::new();
    hits.into_iter()
        .filter(|hit| filter.admit(hit))
        .take(max_results)
        .collect()
}
