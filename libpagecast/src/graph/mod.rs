//! Graph API abstraction
//!
//! [`GraphApi`] is the contract the upload procedures are written against.
//! [`client::GraphClient`] talks to the real service over HTTP;
//! [`mock::MockGraph`] records calls and replays scripted failures for tests.
//!
//! The access token is owned by the implementation and attached to every
//! call, so callers only deal with page ids, album paths and media bytes.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::GraphError;

pub mod client;

// Mock is available for all builds (not just tests) to support integration tests
pub mod mock;

pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Photo bytes destined for an album edge such as `{page_id}/photos`
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub album_path: String,
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub message: String,
    pub published: bool,
}

/// Video bytes destined for an edge such as `{page_id}/videos`
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub album_path: String,
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
    pub title: String,
    pub description: String,
    pub published: bool,
}

/// Node created by an upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GraphObject {
    pub id: String,
    #[serde(default)]
    pub post_id: Option<String>,
}

/// Handle returned by the `start` phase of a video story upload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VideoStorySession {
    pub video_id: String,
    pub upload_url: String,
}

/// Body returned by the resumable upload endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct UploadAck {
    #[serde(default)]
    pub success: bool,
}

#[async_trait]
pub trait GraphApi: Send + Sync {
    /// Upload an image to an album, published or not
    async fn upload_photo(&self, upload: PhotoUpload) -> GraphResult<GraphObject>;

    /// Upload a video to the page
    async fn upload_video(&self, upload: VideoUpload) -> GraphResult<GraphObject>;

    /// Attach an already uploaded, unpublished photo to the page's stories
    async fn attach_photo_to_story(
        &self,
        page_id: &str,
        photo_id: &str,
    ) -> GraphResult<serde_json::Value>;

    /// Open a video story upload session
    async fn start_video_story(&self, page_id: &str) -> GraphResult<VideoStorySession>;

    /// Send raw video bytes to the session's upload URL
    async fn upload_video_bytes(
        &self,
        upload_url: &str,
        offset: u64,
        file_size: u64,
        bytes: Vec<u8>,
    ) -> GraphResult<UploadAck>;

    /// Close the session and publish the video as a story
    async fn finish_video_story(
        &self,
        page_id: &str,
        video_id: &str,
    ) -> GraphResult<serde_json::Value>;
}
