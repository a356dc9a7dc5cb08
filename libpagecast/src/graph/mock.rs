//! Mock Graph API for testing
//!
//! Records every call and answers with predictable ids. Failures can be
//! scripted per operation (one-shot, in order) or per file name (every time
//! that file is uploaded). Clones share state, so a test can hand one clone
//! to the publisher and inspect the other.

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{
    GraphApi, GraphObject, GraphResult, PhotoUpload, UploadAck, VideoStorySession, VideoUpload,
};
use crate::error::GraphError;

/// Operation names, used to script failures and count calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphOp {
    UploadPhoto,
    UploadVideo,
    AttachPhotoToStory,
    StartVideoStory,
    UploadVideoBytes,
    FinishVideoStory,
}

/// A recorded call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphCall {
    UploadPhoto {
        album_path: String,
        file_name: String,
        message: String,
        published: bool,
    },
    UploadVideo {
        album_path: String,
        file_name: String,
        title: String,
        description: String,
        published: bool,
    },
    AttachPhotoToStory {
        page_id: String,
        photo_id: String,
    },
    StartVideoStory {
        page_id: String,
    },
    UploadVideoBytes {
        upload_url: String,
        offset: u64,
        file_size: u64,
        len: usize,
    },
    FinishVideoStory {
        page_id: String,
        video_id: String,
    },
}

impl GraphCall {
    pub fn op(&self) -> GraphOp {
        match self {
            GraphCall::UploadPhoto { .. } => GraphOp::UploadPhoto,
            GraphCall::UploadVideo { .. } => GraphOp::UploadVideo,
            GraphCall::AttachPhotoToStory { .. } => GraphOp::AttachPhotoToStory,
            GraphCall::StartVideoStory { .. } => GraphOp::StartVideoStory,
            GraphCall::UploadVideoBytes { .. } => GraphOp::UploadVideoBytes,
            GraphCall::FinishVideoStory { .. } => GraphOp::FinishVideoStory,
        }
    }
}

#[derive(Default)]
struct MockState {
    calls: Vec<GraphCall>,
    scripted: HashMap<GraphOp, VecDeque<GraphError>>,
    failing_files: HashMap<String, GraphError>,
    rejected_byte_uploads: usize,
    next_id: u64,
}

/// Mock Graph API
#[derive(Clone)]
pub struct MockGraph {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGraph {
    /// Create a mock that succeeds everywhere, handing out ids from 1
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create a mock whose first generated id is `first_id`
    pub fn starting_at(first_id: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                next_id: first_id,
                ..Default::default()
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        // A panicking test thread must not hide the calls from the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fail the next call of `op` with `error`; repeated calls queue up
    pub fn fail_next(&self, op: GraphOp, error: GraphError) {
        self.lock().scripted.entry(op).or_default().push_back(error);
    }

    /// Fail every photo or video upload of `file_name`
    pub fn fail_file(&self, file_name: &str, error: GraphError) {
        self.lock()
            .failing_files
            .insert(file_name.to_string(), error);
    }

    /// Answer the next `times` byte uploads with `{"success": false}`
    pub fn reject_video_bytes(&self, times: usize) {
        self.lock().rejected_byte_uploads += times;
    }

    pub fn calls(&self) -> Vec<GraphCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    pub fn count(&self, op: GraphOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    /// Record the call, then return the scripted failure if one is queued
    fn enter(&self, call: GraphCall, file_name: Option<&str>) -> GraphResult<u64> {
        let mut state = self.lock();
        let op = call.op();
        state.calls.push(call);

        if let Some(error) = state.scripted.get_mut(&op).and_then(VecDeque::pop_front) {
            return Err(error);
        }

        if let Some(error) = file_name.and_then(|name| state.failing_files.get(name)) {
            return Err(error.clone());
        }

        let id = state.next_id;
        state.next_id += 1;
        Ok(id)
    }
}

#[async_trait]
impl GraphApi for MockGraph {
    async fn upload_photo(&self, upload: PhotoUpload) -> GraphResult<GraphObject> {
        let id = self.enter(
            GraphCall::UploadPhoto {
                album_path: upload.album_path,
                file_name: upload.file_name.clone(),
                message: upload.message,
                published: upload.published,
            },
            Some(&upload.file_name),
        )?;

        Ok(GraphObject {
            id: id.to_string(),
            post_id: upload.published.then(|| format!("page_{}", id)),
        })
    }

    async fn upload_video(&self, upload: VideoUpload) -> GraphResult<GraphObject> {
        let id = self.enter(
            GraphCall::UploadVideo {
                album_path: upload.album_path,
                file_name: upload.file_name.clone(),
                title: upload.title,
                description: upload.description,
                published: upload.published,
            },
            Some(&upload.file_name),
        )?;

        Ok(GraphObject {
            id: id.to_string(),
            post_id: None,
        })
    }

    async fn attach_photo_to_story(
        &self,
        page_id: &str,
        photo_id: &str,
    ) -> GraphResult<serde_json::Value> {
        let id = self.enter(
            GraphCall::AttachPhotoToStory {
                page_id: page_id.to_string(),
                photo_id: photo_id.to_string(),
            },
            None,
        )?;

        Ok(json!({ "success": true, "post_id": format!("story_{}", id) }))
    }

    async fn start_video_story(&self, page_id: &str) -> GraphResult<VideoStorySession> {
        let id = self.enter(
            GraphCall::StartVideoStory {
                page_id: page_id.to_string(),
            },
            None,
        )?;

        Ok(VideoStorySession {
            video_id: format!("video-{}", id),
            upload_url: format!("https://rupload.mock/video-{}", id),
        })
    }

    async fn upload_video_bytes(
        &self,
        upload_url: &str,
        offset: u64,
        file_size: u64,
        bytes: Vec<u8>,
    ) -> GraphResult<UploadAck> {
        self.enter(
            GraphCall::UploadVideoBytes {
                upload_url: upload_url.to_string(),
                offset,
                file_size,
                len: bytes.len(),
            },
            None,
        )?;

        let mut state = self.lock();
        if state.rejected_byte_uploads > 0 {
            state.rejected_byte_uploads -= 1;
            return Ok(UploadAck { success: false });
        }
        Ok(UploadAck { success: true })
    }

    async fn finish_video_story(
        &self,
        page_id: &str,
        video_id: &str,
    ) -> GraphResult<serde_json::Value> {
        self.enter(
            GraphCall::FinishVideoStory {
                page_id: page_id.to_string(),
                video_id: video_id.to_string(),
            },
            None,
        )?;

        Ok(json!({ "success": true, "post_id": video_id }))
    }
}
