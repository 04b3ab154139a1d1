//! Bundle reader

use crate::core::error::PublishError;
use std::path::Path;
use tokio::fs::File;

/// Open the bundle for streaming to the upload call
///
/// The contents are not inspected.
pub async fn open_bundle(path: impl AsRef<Path>) -> Result<File, PublishError> {
    let path = path.as_ref();

    File::open(path)
        .await
        .map_err(|source| PublishError::BundleOpen {
            path: path.to_path_buf(),
            source,
        })
}
