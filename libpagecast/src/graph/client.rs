//! HTTP implementation of [`GraphApi`]
//!
//! Regular Graph calls go to `{base_url}/v{version}/...`, video uploads to the
//! dedicated video host, and the raw bytes of a video story to whatever upload
//! URL the `start` phase returned. The access token travels in the request
//! body (or the `Authorization` header for the upload host), never in the URL.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::{
    GraphApi, GraphObject, GraphResult, PhotoUpload, UploadAck, VideoStorySession, VideoUpload,
};
use crate::config::GraphSettings;
use crate::error::GraphError;

/// Longest body excerpt kept in an error message
const BODY_EXCERPT: usize = 300;

pub struct GraphClient {
    http: Client,
    settings: GraphSettings,
}

impl GraphClient {
    pub fn new(settings: GraphSettings) -> GraphResult<Self> {
        let http = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| map_transport_error(e, "create HTTP client"))?;

        Ok(Self { http, settings })
    }

    pub fn page_id(&self) -> &str {
        &self.settings.page_id
    }

    fn graph_url(&self, path: &str) -> String {
        versioned_url(&self.settings.base_url, &self.settings.version, path)
    }

    fn video_url(&self, path: &str) -> String {
        versioned_url(&self.settings.video_base_url, &self.settings.version, path)
    }

    fn token(&self) -> String {
        self.settings.access_token.expose_secret().to_string()
    }

    async fn send<T: DeserializeOwned>(
        &self,
        context: &str,
        request: RequestBuilder,
    ) -> GraphResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| map_transport_error(e, context))?;

        debug!(context, status, "Graph API response received");
        parse_response(context, status, &body)
    }
}

#[async_trait]
impl GraphApi for GraphClient {
    async fn upload_photo(&self, upload: PhotoUpload) -> GraphResult<GraphObject> {
        let context = "upload photo";
        let source = media_part(upload.bytes, upload.file_name, upload.mime_type, context)?;

        let mut form = Form::new()
            .text("access_token", self.token())
            .text("published", upload.published.to_string())
            .part("source", source);
        if !upload.message.is_empty() {
            form = form.text("message", upload.message);
        }

        let request = self
            .http
            .post(self.graph_url(&upload.album_path))
            .multipart(form);
        self.send(context, request).await
    }

    async fn upload_video(&self, upload: VideoUpload) -> GraphResult<GraphObject> {
        let context = "upload video";
        let source = media_part(upload.bytes, upload.file_name, upload.mime_type, context)?;

        let form = Form::new()
            .text("access_token", self.token())
            .text("published", upload.published.to_string())
            .text("title", upload.title)
            .text("description", upload.description)
            .part("source", source);

        let request = self
            .http
            .post(self.video_url(&upload.album_path))
            .multipart(form);
        self.send(context, request).await
    }

    async fn attach_photo_to_story(
        &self,
        page_id: &str,
        photo_id: &str,
    ) -> GraphResult<serde_json::Value> {
        let token = self.token();
        let request = self
            .http
            .post(self.graph_url(&format!("{}/photo_stories", page_id)))
            .form(&[("access_token", token.as_str()), ("photo_id", photo_id)]);
        self.send("attach photo story", request).await
    }

    async fn start_video_story(&self, page_id: &str) -> GraphResult<VideoStorySession> {
        let token = self.token();
        let request = self
            .http
            .post(self.graph_url(&format!("{}/video_stories", page_id)))
            .form(&[("access_token", token.as_str()), ("upload_phase", "start")]);
        self.send("start video story", request).await
    }

    async fn upload_video_bytes(
        &self,
        upload_url: &str,
        offset: u64,
        file_size: u64,
        bytes: Vec<u8>,
    ) -> GraphResult<UploadAck> {
        let request = self
            .http
            .post(upload_url)
            .header("Authorization", format!("OAuth {}", self.token()))
            .header("offset", offset.to_string())
            .header("file_size", file_size.to_string())
            .body(bytes);
        self.send("upload video story bytes", request).await
    }

    async fn finish_video_story(
        &self,
        page_id: &str,
        video_id: &str,
    ) -> GraphResult<serde_json::Value> {
        let token = self.token();
        let request = self
            .http
            .post(self.graph_url(&format!("{}/video_stories", page_id)))
            .form(&[
                ("access_token", token.as_str()),
                ("upload_phase", "finish"),
                ("video_id", video_id),
            ]);
        self.send("finish video story", request).await
    }
}

fn versioned_url(base: &str, version: &str, path: &str) -> String {
    format!(
        "{}/v{}/{}",
        base.trim_end_matches('/'),
        version,
        path.trim_start_matches('/')
    )
}

fn media_part(
    bytes: Vec<u8>,
    file_name: String,
    mime_type: &str,
    context: &str,
) -> GraphResult<Part> {
    Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(mime_type)
        .map_err(|e| GraphError::Response {
            context: context.to_string(),
            message: format!("invalid MIME type {}: {}", mime_type, e),
        })
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ServiceErrorBody,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    code: i64,
    #[serde(default)]
    error_subcode: Option<i64>,
}

/// Turn a status code and body into a typed result
///
/// An `error` object wins over the status code; a non-2xx status without
/// one is reported with an excerpt of the body.
pub(crate) fn parse_response<T: DeserializeOwned>(
    context: &str,
    status: u16,
    body: &str,
) -> GraphResult<T> {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return Err(map_service_error(context, envelope.error));
    }

    if !(200..300).contains(&status) {
        return Err(GraphError::Response {
            context: context.to_string(),
            message: format!("HTTP {}: {}", status, excerpt(body)),
        });
    }

    serde_json::from_str(body).map_err(|e| GraphError::Response {
        context: context.to_string(),
        message: format!("{} in body {}", e, excerpt(body)),
    })
}

fn map_service_error(context: &str, error: ServiceErrorBody) -> GraphError {
    if error.message.contains("scheduled_publish_time") {
        return GraphError::InvalidScheduleField {
            context: context.to_string(),
            message: error.message,
        };
    }

    GraphError::Service {
        context: context.to_string(),
        kind: if error.kind.is_empty() {
            "unknown".to_string()
        } else {
            error.kind
        },
        code: error.code,
        subcode: error.error_subcode,
        message: error.message,
    }
}

fn map_transport_error(error: reqwest::Error, context: &str) -> GraphError {
    let reason = if error.is_timeout() {
        "request timed out"
    } else if error.is_connect() {
        "connection failed"
    } else if error.is_body() || error.is_decode() {
        "response body could not be read"
    } else {
        "request failed"
    };

    GraphError::Transport {
        context: context.to_string(),
        message: format!("{}: {}", reason, error.without_url()),
    }
}

fn excerpt(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= BODY_EXCERPT {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(BODY_EXCERPT).collect();
    format!("{}...", cut)
}
