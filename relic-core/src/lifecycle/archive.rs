use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RelicError;

/// Per-file results of moving a batch into the archive directory.
#[derive(Debug, Default)]
pub struct ArchiveReport {
    pub moved: Vec<PathBuf>,
    pub failed: Vec<RelicError>,
}

impl ArchiveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Move every file in `paths` into `archive_dir`. A failure on one file is
/// logged and recorded; the remaining files are still moved.
pub async fn archive_files(paths: &[PathBuf], archive_dir: &Path) -> ArchiveReport {
    let mut report = ArchiveReport::default();
    if let Err(source) = tokio::fs::create_dir_all(archive_dir).await {
        warn!(
            target: "relic::lifecycle",
            dir = %archive_dir.display(),
            error = %source,
            "cannot create archive directory"
        );
        for path in paths {
            report.failed.push(RelicError::Archive {
                path: path.clone(),
                source: io::Error::new(source.kind(), source.to_string()),
            });
        }
        return report;
    }

    for path in paths {
        match move_one(path, archive_dir).await {
            Ok(dest) => {
                debug!(target: "relic::lifecycle", from = %path.display(), to = %dest.display(), "archived photo");
                report.moved.push(dest);
            }
            Err(source) => {
                warn!(
                    target: "relic::lifecycle",
                    photo = %path.display(),
                    error = %source,
                    "failed to archive photo"
                );
                report.failed.push(RelicError::Archive {
                    path: path.clone(),
                    source,
                });
            }
        }
    }
    report
}

async fn move_one(path: &Path, archive_dir: &Path) -> io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let mut dest = archive_dir.join(file_name);
    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        let prefix = &Uuid::new_v4().simple().to_string()[..8];
        dest = archive_dir.join(format!("{prefix}-{}", file_name.to_string_lossy()));
    }

    match tokio::fs::rename(path, &dest).await {
        Ok(()) => Ok(dest),
        // Rename cannot cross filesystems; fall back to copy + remove.
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            tokio::fs::copy(path, &dest).await?;
            tokio::fs::remove_file(path).await?;
            Ok(dest)
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn moves_files_and_reports_missing_ones() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        tokio::fs::write(&a, b"a").await.unwrap();
        let archive = tmp.path().join("processed");

        let report = archive_files(&[b.clone(), a.clone()], &archive).await;

        assert_eq!(report.moved, vec![archive.join("a.jpg")]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(&report.failed[0], RelicError::Archive { path, .. } if *path == b));
        assert!(!a.exists());
        assert!(archive.join("a.jpg").exists());
    }

    #[tokio::test]
    async fn name_collisions_do_not_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("processed");
        tokio::fs::create_dir_all(&archive).await.unwrap();
        tokio::fs::write(archive.join("a.jpg"), b"old").await.unwrap();
        let incoming = tmp.path().join("a.jpg");
        tokio::fs::write(&incoming, b"new").await.unwrap();

        let report = archive_files(&[incoming], &archive).await;

        assert!(report.is_complete());
        assert_ne!(report.moved[0], archive.join("a.jpg"));
        assert_eq!(tokio::fs::read(archive.join("a.jpg")).await.unwrap(), b"old");
        assert_eq!(tokio::fs::read(&report.moved[0]).await.unwrap(), b"new");
    }
}
