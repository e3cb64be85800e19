//! Filesystem helpers for publishing outputs.

use std::path::Path;
use tokio::fs;

use crate::error::MediaResult;

/// Copy `src` to `dst` so that readers never observe a partial file.
///
/// The data is written to a sibling temp file and renamed into place, which
/// is atomic on the destination filesystem.
pub async fn publish_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<u64> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp_dst = dst.with_extension("part");
    let copied = match fs::copy(src, &tmp_dst).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = fs::remove_file(&tmp_dst).await;
            return Err(e.into());
        }
    };

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = fs::remove_file(&tmp_dst).await;
        return Err(e.into());
    }

    tracing::debug!(
        "Published {} -> {} ({} bytes)",
        src.display(),
        dst.display(),
        copied
    );
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_creates_parent_and_copies() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("work").join("final.mp4");
        fs::create_dir_all(src.parent().unwrap()).await.unwrap();
        fs::write(&src, b"moov").await.unwrap();

        let dst = dir.path().join("public").join("compose_j1_1700000000.mp4");
        let bytes = publish_file(&src, &dst).await.unwrap();

        assert_eq!(bytes, 4);
        assert_eq!(fs::read(&dst).await.unwrap(), b"moov");
        assert!(src.exists());
        assert!(!dst.with_extension("part").exists());
    }

    #[tokio::test]
    async fn test_publish_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = publish_file(dir.path().join("nope.mp4"), dir.path().join("out.mp4")).await;
        assert!(result.is_err());
        assert!(!dir.path().join("out.part").exists());
    }
}
