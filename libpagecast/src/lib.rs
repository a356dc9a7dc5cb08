//! Pagecast - publish dropped media files to a page's feed and stories
//!
//! Files placed in a watch directory are classified by extension, checked
//! against a daily quota and uploaded through the Graph API, then moved to
//! an archive directory.

pub mod archive;
pub mod config;
pub mod error;
pub mod graph;
pub mod logging;
pub mod media;
pub mod publisher;
pub mod quota;
pub mod scanner;
pub mod scheduling;
pub mod types;
pub mod upload;

// Re-export commonly used types
pub use config::{Config, PublisherSettings, Settings};
pub use error::{PagecastError, PublishError, Result};
pub use graph::client::GraphClient;
pub use graph::GraphApi;
pub use publisher::Publisher;
pub use scanner::{scan_once, ScanReport};
pub use types::{ContentKind, Destination, MediaFile, PublishReceipt};
