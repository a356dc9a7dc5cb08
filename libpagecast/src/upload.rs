//! The four upload procedures
//!
//! | destination | image               | video                         |
//! |-------------|---------------------|-------------------------------|
//! | feed        | one published photo | one published video           |
//! | story       | unpublished photo, then attach | start, upload bytes, finish |
//!
//! Video stories run as a small state machine ([`VideoStoryStage`]) so a
//! failed attempt can be resumed from the last stage that completed.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::error::{GraphError, PublishError};
use crate::graph::{GraphApi, PhotoUpload, VideoStorySession, VideoUpload};
use crate::media::mime_type;
use crate::types::MediaFile;

/// What a successful procedure hands back to the publisher
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub remote_id: Option<String>,
    pub response: Value,
}

async fn read_media(path: &Path) -> Result<Vec<u8>, PublishError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| PublishError::fs(path, e))
}

fn id_from(response: &Value) -> Option<String> {
    ["post_id", "id", "video_id"]
        .iter()
        .find_map(|key| match response.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
}

/// Publish an image straight to the feed
pub async fn publish_feed_photo(
    api: &dyn GraphApi,
    page_id: &str,
    file: &MediaFile,
    message: &str,
) -> Result<UploadOutcome, PublishError> {
    let bytes = read_media(file.path()).await?;
    let object = api
        .upload_photo(PhotoUpload {
            album_path: format!("{}/photos", page_id),
            file_name: file.file_name(),
            mime_type: mime_type(file.path()),
            bytes,
            message: message.to_string(),
            published: true,
        })
        .await?;

    Ok(UploadOutcome {
        remote_id: Some(object.post_id.clone().unwrap_or_else(|| object.id.clone())),
        response: serde_json::json!({ "id": object.id, "post_id": object.post_id }),
    })
}

/// Publish a video straight to the feed
pub async fn publish_feed_video(
    api: &dyn GraphApi,
    page_id: &str,
    file: &MediaFile,
    message: &str,
) -> Result<UploadOutcome, PublishError> {
    let bytes = read_media(file.path()).await?;
    let object = api
        .upload_video(VideoUpload {
            album_path: format!("{}/videos", page_id),
            file_name: file.file_name(),
            mime_type: mime_type(file.path()),
            bytes,
            title: message.to_string(),
            description: message.to_string(),
            published: true,
        })
        .await?;

    Ok(UploadOutcome {
        remote_id: Some(object.id.clone()),
        response: serde_json::json!({ "id": object.id }),
    })
}

/// Upload an unpublished photo, then attach it to the page's stories
///
/// When the upload fails nothing is attached. When the attach fails the
/// uploaded photo stays on the page unpublished; it is not cleaned up.
pub async fn publish_story_photo(
    api: &dyn GraphApi,
    page_id: &str,
    file: &MediaFile,
    message: &str,
) -> Result<UploadOutcome, PublishError> {
    let bytes = read_media(file.path()).await?;
    let photo = api
        .upload_photo(PhotoUpload {
            album_path: format!("{}/photos", page_id),
            file_name: file.file_name(),
            mime_type: mime_type(file.path()),
            bytes,
            message: message.to_string(),
            published: false,
        })
        .await?;

    debug!(photo_id = %photo.id, "Unpublished story photo uploaded");

    let response = api.attach_photo_to_story(page_id, &photo.id).await?;
    Ok(UploadOutcome {
        remote_id: id_from(&response).or(Some(photo.id)),
        response,
    })
}

/// Progress of one video story upload
#[derive(Debug, Clone, PartialEq)]
pub enum VideoStoryStage {
    NotStarted,
    Started(VideoStorySession),
    BytesUploaded(VideoStorySession),
    Finished { video_id: String, response: Value },
}

impl VideoStoryStage {
    pub fn name(&self) -> &'static str {
        match self {
            VideoStoryStage::NotStarted => "not_started",
            VideoStoryStage::Started(_) => "started",
            VideoStoryStage::BytesUploaded(_) => "bytes_uploaded",
            VideoStoryStage::Finished { .. } => "finished",
        }
    }
}

/// Size and modification time of one version of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    pub async fn read(path: &Path) -> Result<Self, PublishError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| PublishError::fs(path, e))?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

#[derive(Debug)]
struct SavedStage {
    stamp: FileStamp,
    stage: VideoStoryStage,
}

/// In-flight video story sessions keyed by file path
///
/// A saved stage is only resumed for the same version of the file; a file
/// replaced under the same name starts a new session.
#[derive(Debug, Default)]
pub struct VideoStorySessions {
    stages: HashMap<PathBuf, SavedStage>,
}

impl VideoStorySessions {
    /// Remove and return the saved stage, `NotStarted` if none or stale
    pub fn take(&mut self, path: &Path, stamp: FileStamp) -> VideoStoryStage {
        match self.stages.remove(path) {
            Some(saved) if saved.stamp == stamp => saved.stage,
            Some(saved) => {
                debug!(
                    file = %path.display(),
                    stage = saved.stage.name(),
                    "File changed since the last attempt, starting a new session"
                );
                VideoStoryStage::NotStarted
            }
            None => VideoStoryStage::NotStarted,
        }
    }

    /// Keep a partially completed stage for the next attempt
    pub fn store(&mut self, path: &Path, stamp: FileStamp, stage: VideoStoryStage) {
        match stage {
            VideoStoryStage::NotStarted | VideoStoryStage::Finished { .. } => {
                self.stages.remove(path);
            }
            stage => {
                self.stages
                    .insert(path.to_path_buf(), SavedStage { stamp, stage });
            }
        }
    }

    pub fn forget(&mut self, path: &Path) {
        self.stages.remove(path);
    }

    /// Drop sessions whose file no longer exists; returns how many
    pub async fn prune_missing(&mut self) -> usize {
        let mut gone = Vec::new();
        for path in self.stages.keys() {
            if matches!(tokio::fs::try_exists(path).await, Ok(false)) {
                gone.push(path.clone());
            }
        }
        for path in &gone {
            self.stages.remove(path);
        }
        gone.len()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// Drive a video story upload from `stage` to `Finished`
///
/// `stage` is advanced in place, so on error it holds the last stage that
/// completed. A byte upload that is not acknowledged fails immediately
/// without calling finish.
pub async fn publish_story_video(
    api: &dyn GraphApi,
    page_id: &str,
    file: &MediaFile,
    stage: &mut VideoStoryStage,
) -> Result<UploadOutcome, PublishError> {
    loop {
        let next = match &*stage {
            VideoStoryStage::NotStarted => {
                let session = api.start_video_story(page_id).await?;
                debug!(video_id = %session.video_id, "Video story session started");
                VideoStoryStage::Started(session)
            }
            VideoStoryStage::Started(session) => {
                let bytes = read_media(file.path()).await?;
                let file_size = bytes.len() as u64;
                let ack = api
                    .upload_video_bytes(&session.upload_url, 0, file_size, bytes)
                    .await?;

                if !ack.success {
                    return Err(GraphError::UploadRejected {
                        video_id: session.video_id.clone(),
                    }
                    .into());
                }

                debug!(video_id = %session.video_id, file_size, "Video story bytes uploaded");
                VideoStoryStage::BytesUploaded(session.clone())
            }
            VideoStoryStage::BytesUploaded(session) => {
                let response = api.finish_video_story(page_id, &session.video_id).await?;
                info!(video_id = %session.video_id, "Video story session finished");
                VideoStoryStage::Finished {
                    video_id: session.video_id.clone(),
                    response,
                }
            }
            VideoStoryStage::Finished { video_id, response } => {
                return Ok(UploadOutcome {
                    remote_id: Some(video_id.clone()),
                    response: response.clone(),
                });
            }
        };
        *stage = next;
    }
}
