//! Error types for Pagecast

use std::path::PathBuf;
use thiserror::Error;

use crate::scheduling::SlotTime;
use crate::types::Destination;

pub type Result<T> = std::result::Result<T, PagecastError>;

#[derive(Error, Debug)]
pub enum PagecastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Graph API error: {0}")]
    Graph(#[from] GraphError),

    #[error("Publish failed: {0}")]
    Publish(#[from] PublishError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PagecastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PagecastError::InvalidInput(_) => 3,
            PagecastError::Config(_) => 2,
            PagecastError::Publish(PublishError::UnsupportedType { .. }) => 3,
            PagecastError::Graph(_) | PagecastError::Publish(_) | PagecastError::Io(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by, or while talking to, the Graph API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// The service answered with an error object
    #[error("{context} rejected: {message} (type {kind}, code {code})")]
    Service {
        context: String,
        kind: String,
        code: i64,
        subcode: Option<i64>,
        message: String,
    },

    /// `scheduled_publish_time` sent where the endpoint does not accept it
    #[error("{context} rejected scheduled_publish_time: {message}. This parameter is only valid for regular page photo posts")]
    InvalidScheduleField { context: String, message: String },

    #[error("Network error during {context}: {message}")]
    Transport { context: String, message: String },

    #[error("Unexpected response from {context}: {message}")]
    Response { context: String, message: String },

    /// The resumable upload endpoint did not report success
    #[error("Upload of video {video_id} was not acknowledged")]
    UploadRejected { video_id: String },
}

impl GraphError {
    pub fn is_transport(&self) -> bool {
        matches!(self, GraphError::Transport { .. })
    }
}

/// Outcome taxonomy for a single file
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Daily {destination} quota of {limit} reached")]
    QuotaExceeded { destination: Destination, limit: u32 },

    #[error("Unsupported file type: {}", path.display())]
    UnsupportedType { path: PathBuf },

    #[error("Outside the {destination} posting window, next slot at {next}")]
    OutsideSlot {
        destination: Destination,
        next: SlotTime,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Filesystem error on {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refusing to overwrite existing file {}", path.display())]
    Collision { path: PathBuf },
}

impl PublishError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PublishError::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Short machine-friendly label used in log fields and scan reports
    pub fn category(&self) -> &'static str {
        match self {
            PublishError::QuotaExceeded { .. } => "quota_exceeded",
            PublishError::UnsupportedType { .. } => "unsupported_type",
            PublishError::OutsideSlot { .. } => "outside_slot",
            PublishError::Graph(GraphError::Transport { .. }) => "transport",
            PublishError::Graph(_) => "remote_service",
            PublishError::Filesystem { .. } => "filesystem",
            PublishError::Collision { .. } => "archive_collision",
        }
    }

    /// Whether the file was refused before any remote call was made
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            PublishError::QuotaExceeded { .. }
                | PublishError::UnsupportedType { .. }
                | PublishError::OutsideSlot { .. }
                | PublishError::Collision { .. }
        )
    }
}
