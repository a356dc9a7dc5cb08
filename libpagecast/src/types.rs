//! Core types for Pagecast

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a file is published on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Feed,
    Story,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Feed => "feed",
            Destination::Story => "story",
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media kind derived from a file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Image,
    Video,
    Unsupported,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Image => write!(f, "image"),
            ContentKind::Video => write!(f, "video"),
            ContentKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// A candidate file found in a watch directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    /// Lower-cased extension including the leading dot, empty when absent
    pub extension: String,
}

impl MediaFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e.to_lowercase()))
            .unwrap_or_default();
        Self { path, extension }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File name used for uploads and for the archived copy
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Successful publish of one file
#[derive(Debug, Clone, Serialize)]
pub struct PublishReceipt {
    pub file_name: String,
    pub destination: Destination,
    pub kind: ContentKind,
    /// Identifier reported by the Graph API, when the final call returned one
    pub remote_id: Option<String>,
    /// Raw body of the final call
    pub response: serde_json::Value,
    /// Where the file ended up; `None` when it was intentionally left in place
    pub archived_to: Option<PathBuf>,
}
