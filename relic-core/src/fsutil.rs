use std::path::Path;

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{RelicError, Result};

/// Atomic JSON write: serialize, write to a sibling temp file, fsync, then
/// rename over `path`. Readers observe either the old or the new contents.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &bytes).await
}

pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(parent).await.map_err(|err| {
        RelicError::store_io(parent, format!("failed to create directory: {err}"))
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    let tmp = parent.join(format!(".{file_name}.tmp-{}", Uuid::new_v4().simple()));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|err| RelicError::store_io(&tmp, format!("failed to create temp file: {err}")))?;
        file.write_all(bytes)
            .await
            .map_err(|err| RelicError::store_io(&tmp, format!("failed to write temp file: {err}")))?;
        file.flush()
            .await
            .map_err(|err| RelicError::store_io(&tmp, format!("failed to flush temp file: {err}")))?;
        file.sync_all()
            .await
            .map_err(|err| RelicError::store_io(&tmp, format!("failed to sync temp file: {err}")))?;
        drop(file);
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|err| RelicError::store_io(path, format!("failed to replace snapshot: {err}")))
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}
