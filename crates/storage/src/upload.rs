//! Bulk upload of local source documents

use crate::{ObjectStore, Result};
use std::path::Path;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

/// Extensions picked up by default when uploading budget documents
pub const PDF_EXTENSIONS: &[&str] = &[".pdf", ".PDF"];

/// Upload every file under `local_folder` whose name ends with one of
/// `extensions` to `{prefix}/{relative path}` in `bucket`.
///
/// Returns the number of files uploaded. Files are sent one at a time in
/// directory-walk order.
#[instrument(skip(store, extensions))]
pub async fn upload_folder(
    store: &dyn ObjectStore,
    local_folder: &Path,
    prefix: &str,
    bucket: &str,
    extensions: &[&str],
) -> Result<usize> {
    let prefix = prefix.trim_end_matches('/');
    let mut uploaded = 0;

    for entry in WalkDir::new(local_folder).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !extensions.iter().any(|ext| name.ends_with(ext)) {
            debug!("Skipping {}", entry.path().display());
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(local_folder)
            .unwrap_or(entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let key = if prefix.is_empty() {
            relative
        } else {
            format!("{}/{}", prefix, relative)
        };

        let body = tokio::fs::read(entry.path()).await?;
        store.put_object(bucket, &key, body, "application/pdf").await?;
        info!("Uploaded {} -> s3://{}/{}", entry.path().display(), bucket, key);
        uploaded += 1;
    }

    Ok(uploaded)
}
