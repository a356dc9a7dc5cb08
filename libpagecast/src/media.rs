//! Extension-based media classification
//!
//! Files are classified purely by their extension; contents are never
//! inspected. A renamed file is accepted and only fails, if at all, inside
//! the remote call.

use std::collections::BTreeSet;
use std::path::Path;

use crate::types::ContentKind;

pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff"];
pub const DEFAULT_VIDEO_EXTENSIONS: &[&str] = &[".mp4"];

/// Lower-case, leading-dot form of an extension ("JPG" -> ".jpg")
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// Image and video extension sets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionTable {
    images: BTreeSet<String>,
    videos: BTreeSet<String>,
}

impl ExtensionTable {
    pub fn new<I, V>(images: I, videos: V) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        V: IntoIterator,
        V::Item: AsRef<str>,
    {
        Self {
            images: images
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .collect(),
            videos: videos
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .collect(),
        }
    }

    /// Extensions listed as both image and video
    pub fn overlap(&self) -> Vec<String> {
        self.images.intersection(&self.videos).cloned().collect()
    }

    pub fn classify_extension(&self, ext: &str) -> ContentKind {
        if ext.is_empty() {
            return ContentKind::Unsupported;
        }
        let ext = normalize_extension(ext);
        if self.images.contains(&ext) {
            ContentKind::Image
        } else if self.videos.contains(&ext) {
            ContentKind::Video
        } else {
            ContentKind::Unsupported
        }
    }

    pub fn classify(&self, path: &Path) -> ContentKind {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.classify_extension(ext),
            None => ContentKind::Unsupported,
        }
    }
}

impl Default for ExtensionTable {
    fn default() -> Self {
        Self::new(DEFAULT_IMAGE_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS)
    }
}

/// MIME type sent with an upload, by extension
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}
