//! Directory scanning
//!
//! One scan lists the feed directory, then the story directory, and hands
//! every regular file to the [`Publisher`] in file-name order. Nothing a
//! single file does can abort the scan.

use chrono::NaiveDateTime;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::publisher::Publisher;
use crate::types::Destination;

/// What happened to one file during a scan
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Published {
        remote_id: Option<String>,
        archived_to: Option<PathBuf>,
    },
    /// Refused before any remote call
    Skipped { reason: String, message: String },
    Failed { reason: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub destination: Destination,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Summary of one pass over both watch directories
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanReport {
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
    pub entries: Vec<ScanEntry>,
}

impl ScanReport {
    fn push(&mut self, entry: ScanEntry) {
        match entry.outcome {
            FileOutcome::Published { .. } => self.published += 1,
            FileOutcome::Skipped { .. } => self.skipped += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
        self.entries.push(entry);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Regular files directly inside `dir`, sorted by file name
pub async fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        // Follows symlinks; a dangling link is skipped
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
            }
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Scan both watch directories using the local clock for each file
pub async fn scan_once(publisher: &mut Publisher) -> ScanReport {
    scan_with_clock(publisher, || chrono::Local::now().naive_local()).await
}

/// Scan both watch directories as if the local time were `now`
pub async fn scan_once_at(publisher: &mut Publisher, now: NaiveDateTime) -> ScanReport {
    scan_with_clock(publisher, || now).await
}

async fn scan_with_clock<F>(publisher: &mut Publisher, clock: F) -> ScanReport
where
    F: Fn() -> NaiveDateTime,
{
    let mut report = ScanReport::default();
    let watch = [
        (publisher.settings().feed_dir.clone(), Destination::Feed),
        (publisher.settings().story_dir.clone(), Destination::Story),
    ];

    for (dir, destination) in watch {
        let files = match list_files(&dir).await {
            Ok(files) => files,
            Err(e) => {
                warn!(dir = %dir.display(), %destination, error = %e, "Cannot read watch directory, skipping");
                continue;
            }
        };

        for path in files {
            let outcome = match publisher.publish_at(&path, destination, clock()).await {
                Ok(receipt) => FileOutcome::Published {
                    remote_id: receipt.remote_id,
                    archived_to: receipt.archived_to,
                },
                Err(error) if error.is_skip() => FileOutcome::Skipped {
                    reason: error.category().to_string(),
                    message: error.to_string(),
                },
                Err(error) => FileOutcome::Failed {
                    reason: error.category().to_string(),
                    message: error.to_string(),
                },
            };
            report.push(ScanEntry {
                path,
                destination,
                outcome,
            });
        }
    }

    publisher.forget_missing_files().await;

    info!(
        published = report.published,
        skipped = report.skipped,
        failed = report.failed,
        "Scan complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_files_sorted_and_regular_only() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("b.jpg"), b"b").unwrap();
        std::fs::write(temp.path().join("a.png"), b"a").unwrap();
        std::fs::create_dir(temp.path().join("nested")).unwrap();

        let files = list_files(temp.path()).await.unwrap();

        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.png", "b.jpg"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_files_follows_symlinks() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let target = outside.path().join("original.jpg");
        std::fs::write(&target, b"media").unwrap();
        std::os::unix::fs::symlink(&target, temp.path().join("linked.jpg")).unwrap();
        std::os::unix::fs::symlink(outside.path(), temp.path().join("linked_dir")).unwrap();

        let files = list_files(temp.path()).await.unwrap();

        assert_eq!(files, vec![temp.path().join("linked.jpg")]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_list_files_skips_dangling_symlink() {
        let temp = TempDir::new().unwrap();
        std::os::unix::fs::symlink(
            temp.path().join("gone.jpg"),
            temp.path().join("a_broken.jpg"),
        )
        .unwrap();
        std::fs::write(temp.path().join("b.jpg"), b"b").unwrap();

        let files = list_files(temp.path()).await.unwrap();

        assert_eq!(files, vec![temp.path().join("b.jpg")]);
    }

    #[tokio::test]
    async fn test_list_files_missing_dir_errors() {
        let temp = TempDir::new().unwrap();
        assert!(list_files(&temp.path().join("absent")).await.is_err());
    }

    #[test]
    fn test_report_counts() {
        let mut report = ScanReport::default();
        report.push(ScanEntry {
            path: PathBuf::from("posts/a.jpg"),
            destination: Destination::Feed,
            outcome: FileOutcome::Published {
                remote_id: Some("1".to_string()),
                archived_to: None,
            },
        });
        report.push(ScanEntry {
            path: PathBuf::from("posts/b.txt"),
            destination: Destination::Feed,
            outcome: FileOutcome::Skipped {
                reason: "unsupported_type".to_string(),
                message: "Unsupported file type: posts/b.txt".to_string(),
            },
        });

        assert_eq!((report.published, report.skipped, report.failed), (1, 1, 0));
        assert!(!report.is_empty());
    }
}
