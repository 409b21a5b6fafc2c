//! Object storage layer for the budget RAG assistant
//!
//! Chunk records and source PDFs live in an S3-style bucket. This crate
//! defines the narrow contract the rest of the workspace needs, an HTTP
//! client for it, and an in-memory store for tests.

pub mod error;
pub mod http;
pub mod memory;
pub mod upload;

pub use error::{Result, StorageError};
pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;
pub use upload::{upload_folder, PDF_EXTENSIONS};

use async_trait::async_trait;

/// Minimal bucket operations used by search and upload
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch an object's bytes
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Lightweight existence probe (HEAD)
    async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Store an object, replacing any existing one
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;
}

/// Object key referenced by a URI inside `bucket`.
///
/// `s3://{bucket}/path/to/key` becomes `path/to/key`; URIs that don't start
/// with the bucket prefix are returned unchanged.
pub fn object_key_from_uri<'a>(uri: &'a str, bucket: &str) -> &'a str {
    let prefix = format!("s3://{}/", bucket);
    uri.strip_prefix(prefix.as_str()).unwrap_or(uri)
}
