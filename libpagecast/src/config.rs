//! Configuration management for Pagecast
//!
//! The TOML file is deserialized into [`Config`], then [`Config::resolve`]
//! validates it, pulls the page credentials from the environment or the token
//! file, and produces the runtime [`Settings`].

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::media::{ExtensionTable, DEFAULT_IMAGE_EXTENSIONS, DEFAULT_VIDEO_EXTENSIONS};
use crate::quota::DailyLimits;
use crate::scheduling::{parse_interval, Schedule, SlotTable, SlotTime};

pub const ENV_CONFIG: &str = "PAGECAST_CONFIG";
pub const ENV_PAGE_ID: &str = "PAGECAST_PAGE_ID";
pub const ENV_ACCESS_TOKEN: &str = "PAGECAST_ACCESS_TOKEN";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub page: PageConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub directories: DirectoriesConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub logging: LoggingSection,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageConfig {
    pub id: Option<String>,
    pub access_token_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub version: String,
    pub base_url: String,
    pub video_base_url: String,
    pub timeout: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            version: "3.1".to_string(),
            base_url: "https://graph.facebook.com".to_string(),
            video_base_url: "https://graph-video.facebook.com".to_string(),
            timeout: "5m".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoriesConfig {
    pub feed: String,
    pub story: String,
    pub archive: String,
    pub quarantine: Option<String>,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            feed: "posts".to_string(),
            story: "stories".to_string(),
            archive: "posted".to_string(),
            quarantine: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub post_times: Vec<SlotTime>,
    pub story_times: Vec<SlotTime>,
    pub max_posts_per_day: u32,
    pub max_stories_per_day: u32,
    pub scan_interval: String,
    pub check_interval: String,
    pub slot_window: Option<String>,
    pub resume_video_sessions: bool,
    pub max_attempts: Option<u32>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        let default_slot = SlotTime::new(17, 5).into_iter().collect::<Vec<_>>();
        Self {
            post_times: default_slot.clone(),
            story_times: default_slot,
            max_posts_per_day: 1,
            max_stories_per_day: 1,
            scan_interval: "1h".to_string(),
            check_interval: "60s".to_string(),
            slot_window: None,
            resume_video_sessions: true,
            max_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    pub image_extensions: Vec<String>,
    pub video_extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            image_extensions: DEFAULT_IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            video_extensions: DEFAULT_VIDEO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagesConfig {
    pub post: String,
    pub story: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub format: Option<String>,
    pub level: Option<String>,
    pub file: Option<String>,
}

/// Everything the Graph API client needs
#[derive(Debug, Clone)]
pub struct GraphSettings {
    pub page_id: String,
    pub access_token: SecretString,
    /// Bare version number, e.g. "3.1"
    pub version: String,
    pub base_url: String,
    pub video_base_url: String,
    pub timeout: Duration,
}

/// Everything the publisher needs
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub page_id: String,
    pub feed_dir: PathBuf,
    pub story_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub quarantine_dir: Option<PathBuf>,
    pub schedule: Schedule,
    pub limits: DailyLimits,
    pub extensions: ExtensionTable,
    pub post_message: String,
    pub story_message: String,
    pub resume_video_sessions: bool,
    pub max_attempts: Option<u32>,
}

impl PublisherSettings {
    /// Settings with the stock schedule, limits and extension table
    pub fn new(
        page_id: impl Into<String>,
        feed_dir: impl Into<PathBuf>,
        story_dir: impl Into<PathBuf>,
        archive_dir: impl Into<PathBuf>,
    ) -> Self {
        let defaults = ScheduleConfig::default();
        Self {
            page_id: page_id.into(),
            feed_dir: feed_dir.into(),
            story_dir: story_dir.into(),
            archive_dir: archive_dir.into(),
            quarantine_dir: None,
            schedule: Schedule {
                feed: SlotTable::new(defaults.post_times),
                story: SlotTable::new(defaults.story_times),
                window: None,
            },
            limits: DailyLimits::default(),
            extensions: ExtensionTable::default(),
            post_message: String::new(),
            story_message: String::new(),
            resume_video_sessions: true,
            max_attempts: None,
        }
    }

    /// Directories that must exist before scanning
    pub fn directories(&self) -> Vec<&Path> {
        let mut dirs = vec![
            self.feed_dir.as_path(),
            self.story_dir.as_path(),
            self.archive_dir.as_path(),
        ];
        if let Some(quarantine) = &self.quarantine_dir {
            dirs.push(quarantine.as_path());
        }
        dirs
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct Settings {
    pub graph: GraphSettings,
    pub publisher: PublisherSettings,
    pub scan_interval: Duration,
    pub check_interval: Duration,
    pub logging: LoggingSection,
}

impl Config {
    /// Load configuration from the default location
    ///
    /// An explicitly configured file (`PAGECAST_CONFIG`) must exist. A missing
    /// file at the XDG location falls back to built-in defaults so the daemon
    /// can run from environment variables alone.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var(ENV_CONFIG) {
            return Self::load_from_path(&expand_path(&path)?);
        }

        let config_path = resolve_config_path()?;
        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            tracing::debug!(path = %config_path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let mut config = Self::parse(&content)?;
        config.base_dir = path.parent().map(Path::to_path_buf);
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        Ok(config)
    }

    /// Validate and combine with credentials from the environment
    pub fn resolve(&self) -> Result<Settings> {
        let page_id = std::env::var(ENV_PAGE_ID)
            .ok()
            .or_else(|| self.page.id.clone())
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConfigError::MissingField("page.id".to_string()))?;

        let access_token = self.resolve_access_token()?;

        let graph = GraphSettings {
            page_id: page_id.clone(),
            access_token,
            version: self.api.version.trim().trim_start_matches('v').to_string(),
            base_url: self.api.base_url.trim_end_matches('/').to_string(),
            video_base_url: self.api.video_base_url.trim_end_matches('/').to_string(),
            timeout: interval("api.timeout", &self.api.timeout)?,
        };

        if graph.version.is_empty() {
            return Err(ConfigError::invalid("api.version", "must not be empty").into());
        }

        let extensions = ExtensionTable::new(
            &self.media.image_extensions,
            &self.media.video_extensions,
        );
        let overlap = extensions.overlap();
        if !overlap.is_empty() {
            return Err(ConfigError::invalid(
                "media",
                format!("extensions listed as both image and video: {}", overlap.join(", ")),
            )
            .into());
        }

        let window = match &self.schedule.slot_window {
            Some(raw) => {
                let window = interval("schedule.slot_window", raw)?;
                Some(chrono::Duration::from_std(window).map_err(|e| {
                    ConfigError::invalid("schedule.slot_window", e.to_string())
                })?)
            }
            None => None,
        };

        if self.schedule.max_attempts == Some(0) {
            return Err(
                ConfigError::invalid("schedule.max_attempts", "must be at least 1").into(),
            );
        }

        let publisher = PublisherSettings {
            page_id,
            feed_dir: self.resolve_dir(&self.directories.feed)?,
            story_dir: self.resolve_dir(&self.directories.story)?,
            archive_dir: self.resolve_dir(&self.directories.archive)?,
            quarantine_dir: match &self.directories.quarantine {
                Some(dir) => Some(self.resolve_dir(dir)?),
                None => None,
            },
            schedule: Schedule {
                feed: SlotTable::new(self.schedule.post_times.clone()),
                story: SlotTable::new(self.schedule.story_times.clone()),
                window,
            },
            limits: DailyLimits {
                posts: self.schedule.max_posts_per_day,
                stories: self.schedule.max_stories_per_day,
            },
            extensions,
            post_message: self.messages.post.clone(),
            story_message: self.messages.story.clone(),
            resume_video_sessions: self.schedule.resume_video_sessions,
            max_attempts: self.schedule.max_attempts,
        };

        if publisher.archive_dir == publisher.feed_dir || publisher.archive_dir == publisher.story_dir
        {
            return Err(ConfigError::invalid(
                "directories.archive",
                "must differ from the watch directories",
            )
            .into());
        }

        if let Some(quarantine) = &publisher.quarantine_dir {
            let others = [&publisher.feed_dir, &publisher.story_dir, &publisher.archive_dir];
            if others.contains(&quarantine) {
                return Err(ConfigError::invalid(
                    "directories.quarantine",
                    "must differ from the watch and archive directories",
                )
                .into());
            }
        }

        Ok(Settings {
            graph,
            publisher,
            scan_interval: interval("schedule.scan_interval", &self.schedule.scan_interval)?,
            check_interval: interval("schedule.check_interval", &self.schedule.check_interval)?,
            logging: self.logging.clone(),
        })
    }

    fn resolve_access_token(&self) -> Result<SecretString> {
        if let Ok(token) = std::env::var(ENV_ACCESS_TOKEN) {
            let token = token.trim().to_string();
            if !token.is_empty() {
                return Ok(SecretString::from(token));
            }
        }

        let token_file = self
            .page
            .access_token_file
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("page.access_token_file".to_string()))?;

        let path = self.resolve_dir(token_file)?;
        let token = std::fs::read_to_string(&path)
            .map_err(ConfigError::ReadError)?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(ConfigError::invalid(
                "page.access_token_file",
                format!("{} is empty", path.display()),
            )
            .into());
        }

        Ok(SecretString::from(token))
    }

    fn resolve_dir(&self, raw: &str) -> Result<PathBuf> {
        let path = expand_path(raw)?;
        match &self.base_dir {
            Some(base) if path.is_relative() => Ok(base.join(path)),
            _ => Ok(path),
        }
    }
}

fn interval(field: &str, raw: &str) -> Result<Duration> {
    parse_interval(raw).map_err(|reason| ConfigError::invalid(field, reason).into())
}

fn expand_path(raw: &str) -> Result<PathBuf> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| ConfigError::invalid("path", format!("cannot expand '{}': {}", raw, e)))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

/// Resolve the configuration file path under the XDG config directory
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(ENV_CONFIG) {
        return expand_path(&path);
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("pagecast").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use tempfile::TempDir;

    fn clear_env() {
        std::env::remove_var(ENV_PAGE_ID);
        std::env::remove_var(ENV_ACCESS_TOKEN);
        std::env::remove_var(ENV_CONFIG);
    }

    #[test]
    fn test_default_layout() {
        let config = Config::default();
        assert_eq!(config.directories.feed, "posts");
        assert_eq!(config.directories.story, "stories");
        assert_eq!(config.directories.archive, "posted");
        assert_eq!(config.schedule.max_posts_per_day, 1);
        assert_eq!(config.schedule.max_stories_per_day, 1);
        assert_eq!(config.schedule.post_times[0].to_string(), "17:05");
        assert_eq!(config.api.version, "3.1");
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::parse(
            r#"
[page]
id = "12345"

[schedule]
post_times = ["17:00", "09:00"]
max_posts_per_day = 3
"#,
        )
        .unwrap();

        assert_eq!(config.page.id.as_deref(), Some("12345"));
        assert_eq!(config.schedule.post_times.len(), 2);
        assert_eq!(config.schedule.max_posts_per_day, 3);
        assert_eq!(config.schedule.max_stories_per_day, 1);
        assert_eq!(config.directories.archive, "posted");
    }

    #[test]
    fn test_parse_rejects_bad_slot() {
        let result = Config::parse(
            r#"
[schedule]
post_times = ["25:00"]
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_resolve_with_env_credentials() {
        clear_env();
        std::env::set_var(ENV_PAGE_ID, "987");
        std::env::set_var(ENV_ACCESS_TOKEN, "secret-token");

        let settings = Config::default().resolve().unwrap();
        assert_eq!(settings.graph.page_id, "987");
        assert_eq!(settings.graph.access_token.expose_secret(), "secret-token");
        assert_eq!(settings.scan_interval, Duration::from_secs(3600));
        assert_eq!(settings.check_interval, Duration::from_secs(60));
        assert!(settings.publisher.schedule.window.is_none());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_resolve_missing_page_id() {
        clear_env();
        std::env::set_var(ENV_ACCESS_TOKEN, "secret-token");

        let err = Config::default().resolve().unwrap_err();
        assert!(err.to_string().contains("page.id"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_resolve_token_file_relative_to_config() {
        clear_env();
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("page.token"), "  file-token\n").unwrap();
        let config_path = temp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[page]
id = "42"
access_token_file = "page.token"

[api]
version = "v19.0"
base_url = "http://localhost:9999/"
"#,
        )
        .unwrap();

        let settings = Config::load_from_path(&config_path)
            .unwrap()
            .resolve()
            .unwrap();

        assert_eq!(settings.graph.access_token.expose_secret(), "file-token");
        assert_eq!(settings.graph.version, "19.0");
        assert_eq!(settings.graph.base_url, "http://localhost:9999");
        assert_eq!(settings.publisher.feed_dir, temp.path().join("posts"));
        assert_eq!(settings.publisher.archive_dir, temp.path().join("posted"));
    }

    #[test]
    #[serial]
    fn test_resolve_empty_token_file() {
        clear_env();
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("page.token"), "\n").unwrap();
        let config_path = temp.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[page]\nid = \"42\"\naccess_token_file = \"page.token\"\n",
        )
        .unwrap();

        let err = Config::load_from_path(&config_path)
            .unwrap()
            .resolve()
            .unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    #[serial]
    fn test_resolve_rejects_overlapping_extensions() {
        clear_env();
        std::env::set_var(ENV_PAGE_ID, "1");
        std::env::set_var(ENV_ACCESS_TOKEN, "t");

        let mut config = Config::default();
        config.media.video_extensions.push(".GIF".to_string());
        let err = config.resolve().unwrap_err();
        assert!(err.to_string().contains(".gif"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_resolve_slot_window_and_attempts() {
        clear_env();
        std::env::set_var(ENV_PAGE_ID, "1");
        std::env::set_var(ENV_ACCESS_TOKEN, "t");

        let mut config = Config::default();
        config.schedule.slot_window = Some("15m".to_string());
        config.schedule.max_attempts = Some(5);
        let settings = config.resolve().unwrap();
        assert_eq!(
            settings.publisher.schedule.window,
            Some(chrono::Duration::minutes(15))
        );
        assert_eq!(settings.publisher.max_attempts, Some(5));

        config.schedule.max_attempts = Some(0);
        assert!(config.resolve().is_err());

        config.schedule.max_attempts = None;
        config.schedule.scan_interval = "never".to_string();
        assert!(config.resolve().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_resolve_rejects_archive_equal_to_watch_dir() {
        clear_env();
        std::env::set_var(ENV_PAGE_ID, "1");
        std::env::set_var(ENV_ACCESS_TOKEN, "t");

        let mut config = Config::default();
        config.directories.archive = "posts".to_string();
        assert!(config.resolve().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_resolve_rejects_quarantine_equal_to_other_dirs() {
        clear_env();
        std::env::set_var(ENV_PAGE_ID, "1");
        std::env::set_var(ENV_ACCESS_TOKEN, "t");

        let mut config = Config::default();
        for shared in ["posts", "stories", "posted"] {
            config.directories.quarantine = Some(shared.to_string());
            let err = config.resolve().unwrap_err();
            assert!(err.to_string().contains("directories.quarantine"), "{}", err);
        }

        config.directories.quarantine = Some("failed".to_string());
        let settings = config.resolve().unwrap();
        assert!(settings
            .publisher
            .quarantine_dir
            .unwrap()
            .ends_with("failed"));

        clear_env();
    }
}
