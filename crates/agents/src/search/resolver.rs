//! Chunk resolution - map a raw hit back to its structured chunk record

use budget_rag_core::{extract_chunk_id, ChunkRecord, ResolvedHit, RetrievalHit};
use budget_rag_storage::{object_key_from_uri, ObjectStore};
use tracing::debug;

/// Resolves hits against the bucket the parser writes chunk records to
pub struct ChunkResolver<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
}

impl<'a> ChunkResolver<'a> {
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str) -> Self {
        Self { store, bucket }
    }

    /// Attach whatever chunk metadata can be determined for `hit`.
    ///
    /// Storage and parse failures are absorbed: the hit falls back to the
    /// markdown marker in its own text, or stays unresolved.
    pub async fn resolve(&self, hit: RetrievalHit) -> ResolvedHit {
        if hit.references_chunk_record() {
            if let Some(record) = self.fetch_record(&hit).await {
                return ResolvedHit::from_record(hit, record);
            }
        }

        match extract_chunk_id(&hit.content) {
            Some(chunk_id) => ResolvedHit::unresolved(hit).with_chunk_id(chunk_id),
            None => ResolvedHit::unresolved(hit),
        }
    }

    async fn fetch_record(&self, hit: &RetrievalHit) -> Option<ChunkRecord> {
        let key = object_key_from_uri(&hit.source_uri, self.bucket);

        let bytes = match self.store.get_object(self.bucket, key).await {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!("Chunk record fetch failed for {}: {}", hit.source_uri, e);
                return None;
            }
        };

        match ChunkRecord::from_slice(&bytes) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Chunk record at {} is not usable: {}", hit.source_uri, e);
                None
            }
        }
    }
}
