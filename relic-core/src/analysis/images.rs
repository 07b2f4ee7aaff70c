use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::service::EncodedImage;
use crate::error::{RelicError, Result};

/// Media type sent to the reasoning service for a photo.
///
/// Unknown extensions are sent as JPEG, which is what camera uploads almost
/// always are.
pub fn media_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

/// Read and encode every photo, failing on the first unreadable path.
pub async fn load_images(paths: &[PathBuf]) -> Result<Vec<EncodedImage>> {
    let mut images = Vec::with_capacity(paths.len());
    for path in paths {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| RelicError::ImageLoad {
                path: path.clone(),
                source,
            })?;
        images.push(EncodedImage {
            source: path.clone(),
            media_type: media_type_for(path),
            data: STANDARD.encode(bytes),
        });
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_types_follow_extension() {
        assert_eq!(media_type_for(Path::new("a.JPG")), "image/jpeg");
        assert_eq!(media_type_for(Path::new("a.png")), "image/png");
        assert_eq!(media_type_for(Path::new("a.webp")), "image/webp");
        assert_eq!(media_type_for(Path::new("a.heic")), "image/jpeg");
    }

    #[tokio::test]
    async fn missing_file_is_an_image_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let good = tmp.path().join("good.png");
        tokio::fs::write(&good, b"png").await.unwrap();
        let missing = tmp.path().join("missing.jpg");

        let err = load_images(&[good.clone(), missing.clone()]).await.unwrap_err();
        match err {
            RelicError::ImageLoad { path, .. } => assert_eq!(path, missing),
            other => panic!("unexpected error {other:?}"),
        }

        let loaded = load_images(&[good]).await.unwrap();
        assert_eq!(loaded[0].media_type, "image/png");
        assert_eq!(loaded[0].data, "cG5n");
    }
}
