//! Publisher: quota, classification, slot check, upload and archival for
//! one file at a time
//!
//! The publisher owns all mutable state of a running process: the quota
//! counters, in-flight video story sessions and per-file failure counts.

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::archive;
use crate::config::PublisherSettings;
use crate::error::{GraphError, PublishError};
use crate::graph::GraphApi;
use crate::quota::{QuotaState, QuotaTracker};
use crate::scheduling::SlotDecision;
use crate::types::{ContentKind, Destination, MediaFile, PublishReceipt};
use crate::upload::{self, FileStamp, UploadOutcome, VideoStorySessions, VideoStoryStage};

pub struct Publisher {
    api: Arc<dyn GraphApi>,
    settings: PublisherSettings,
    quota: QuotaTracker,
    sessions: VideoStorySessions,
    failures: HashMap<PathBuf, u32>,
    archive_on_success: bool,
}

impl Publisher {
    /// Create a publisher with zeroed quotas for the local date
    pub fn new(api: Arc<dyn GraphApi>, settings: PublisherSettings) -> Self {
        let today = chrono::Local::now().date_naive();
        let quota = QuotaTracker::new(settings.limits, today);
        Self {
            api,
            settings,
            quota,
            sessions: VideoStorySessions::default(),
            failures: HashMap::new(),
            archive_on_success: true,
        }
    }

    /// Start from existing quota counters
    pub fn with_quota(mut self, state: QuotaState) -> Self {
        self.quota = QuotaTracker::with_state(self.settings.limits, state);
        self
    }

    /// Leave published files where they are instead of archiving them
    pub fn keep_files(mut self) -> Self {
        self.archive_on_success = false;
        self
    }

    pub fn settings(&self) -> &PublisherSettings {
        &self.settings
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn sessions(&self) -> &VideoStorySessions {
        &self.sessions
    }

    /// Consecutive remote failures recorded for `path`
    pub fn failure_count(&self, path: &Path) -> u32 {
        self.failures.get(path).copied().unwrap_or(0)
    }

    /// Drop session and failure state kept for files that no longer exist
    pub async fn forget_missing_files(&mut self) {
        let sessions = self.sessions.prune_missing().await;

        let mut gone = Vec::new();
        for path in self.failures.keys() {
            if matches!(tokio::fs::try_exists(path).await, Ok(false)) {
                gone.push(path.clone());
            }
        }
        for path in &gone {
            self.failures.remove(path);
        }

        if sessions > 0 || !gone.is_empty() {
            debug!(
                sessions,
                failures = gone.len(),
                "Forgot state for files that disappeared"
            );
        }
    }

    /// Publish `path` to `destination` using the local clock
    pub async fn publish(
        &mut self,
        path: &Path,
        destination: Destination,
    ) -> Result<PublishReceipt, PublishError> {
        self.publish_at(path, destination, chrono::Local::now().naive_local())
            .await
    }

    /// Publish `path` to `destination` as if the local time were `now`
    pub async fn publish_at(
        &mut self,
        path: &Path,
        destination: Destination,
        now: NaiveDateTime,
    ) -> Result<PublishReceipt, PublishError> {
        let media = MediaFile::new(path);
        let file_name = media.file_name();

        if self.quota.reset_if_new_day(now.date()) {
            info!(date = %now.date(), "New day, daily quotas reset");
        }

        if !self.quota.can_post(destination) {
            let limit = self.quota.limit(destination);
            info!(
                file = %file_name,
                %destination,
                limit,
                "Daily quota reached, leaving file for tomorrow"
            );
            return Err(PublishError::QuotaExceeded { destination, limit });
        }

        let kind = self.settings.extensions.classify(path);
        if kind == ContentKind::Unsupported {
            warn!(file = %file_name, %destination, "Unsupported file type, skipping");
            return Err(PublishError::UnsupportedType {
                path: path.to_path_buf(),
            });
        }

        match self.settings.schedule.decide(destination, now.time()) {
            SlotDecision::Proceed { next: Some(next) } => {
                info!(file = %file_name, %destination, next_slot = %next, "Next scheduled slot");
            }
            SlotDecision::Proceed { next: None } => {
                debug!(%destination, "No slots configured");
            }
            SlotDecision::Wait { next } => {
                info!(
                    file = %file_name,
                    %destination,
                    next_slot = %next,
                    "Outside the posting window, waiting"
                );
                return Err(PublishError::OutsideSlot { destination, next });
            }
        }

        if self.archive_on_success {
            let target = self.settings.archive_dir.join(&file_name);
            if tokio::fs::try_exists(&target)
                .await
                .map_err(|e| PublishError::fs(&target, e))?
            {
                warn!(
                    file = %file_name,
                    %destination,
                    archived = %target.display(),
                    "A file with this name is already archived, skipping"
                );
                return Err(PublishError::Collision { path: target });
            }
        }

        info!(file = %file_name, %destination, %kind, "Publishing");
        match self.dispatch(&media, destination, kind).await {
            Ok(outcome) => self.complete(&media, destination, kind, outcome).await,
            Err(error) => {
                self.record_failure(&media, destination, &error).await;
                Err(error)
            }
        }
    }

    async fn dispatch(
        &mut self,
        media: &MediaFile,
        destination: Destination,
        kind: ContentKind,
    ) -> Result<UploadOutcome, PublishError> {
        let api = self.api.as_ref();
        let page_id = self.settings.page_id.as_str();

        match (destination, kind) {
            (Destination::Feed, ContentKind::Image) => {
                upload::publish_feed_photo(api, page_id, media, &self.settings.post_message).await
            }
            (Destination::Feed, ContentKind::Video) => {
                upload::publish_feed_video(api, page_id, media, &self.settings.post_message).await
            }
            (Destination::Story, ContentKind::Image) => {
                upload::publish_story_photo(api, page_id, media, &self.settings.story_message)
                    .await
            }
            (Destination::Story, ContentKind::Video) => {
                let stamp = if self.settings.resume_video_sessions {
                    Some(FileStamp::read(media.path()).await?)
                } else {
                    None
                };
                let mut stage = match stamp {
                    Some(stamp) => self.sessions.take(media.path(), stamp),
                    None => VideoStoryStage::NotStarted,
                };

                if stage != VideoStoryStage::NotStarted {
                    info!(
                        file = %media.file_name(),
                        stage = stage.name(),
                        "Resuming video story session"
                    );
                }

                let result = upload::publish_story_video(api, page_id, media, &mut stage).await;
                if let (Err(_), Some(stamp)) = (&result, stamp) {
                    self.sessions.store(media.path(), stamp, stage);
                }
                result
            }
            (_, ContentKind::Unsupported) => Err(PublishError::UnsupportedType {
                path: media.path().to_path_buf(),
            }),
        }
    }

    async fn complete(
        &mut self,
        media: &MediaFile,
        destination: Destination,
        kind: ContentKind,
        outcome: UploadOutcome,
    ) -> Result<PublishReceipt, PublishError> {
        let file_name = media.file_name();
        self.quota.record_success(destination);
        self.failures.remove(media.path());

        info!(
            file = %file_name,
            %destination,
            %kind,
            remote_id = outcome.remote_id.as_deref().unwrap_or("-"),
            used = self.quota.used(destination),
            remaining = self.quota.remaining(destination),
            "Published"
        );

        let archived_to = if self.archive_on_success {
            match archive::move_into(media.path(), &self.settings.archive_dir).await {
                Ok(target) => {
                    debug!(file = %file_name, archived_to = %target.display(), "Archived");
                    Some(target)
                }
                Err(error) => {
                    error!(
                        file = %file_name,
                        %destination,
                        error = %error,
                        "Published but could not archive; the file is still in the watch directory"
                    );
                    // Already uploaded, so this is a failure rather than a skip
                    return Err(match error {
                        PublishError::Collision { path } => PublishError::fs(
                            path,
                            std::io::Error::new(
                                std::io::ErrorKind::AlreadyExists,
                                "archive target appeared during upload",
                            ),
                        ),
                        other => other,
                    });
                }
            }
        } else {
            None
        };

        Ok(PublishReceipt {
            file_name,
            destination,
            kind,
            remote_id: outcome.remote_id,
            response: outcome.response,
            archived_to,
        })
    }

    async fn record_failure(
        &mut self,
        media: &MediaFile,
        destination: Destination,
        error: &PublishError,
    ) {
        let file_name = media.file_name();

        match error {
            PublishError::Graph(GraphError::InvalidScheduleField { context, message }) => {
                error!(
                    file = %file_name,
                    %destination,
                    context = %context,
                    "Remote rejected scheduled_publish_time, which only applies to regular page photo posts: {}",
                    message
                );
            }
            PublishError::Graph(graph) if graph.is_transport() => {
                warn!(file = %file_name, %destination, error = %graph, "Transport failure, will retry next scan");
            }
            other => {
                error!(
                    file = %file_name,
                    %destination,
                    category = other.category(),
                    error = %other,
                    "Publish failed, will retry next scan"
                );
            }
        }

        if !matches!(error, PublishError::Graph(_)) {
            return;
        }

        let (Some(max_attempts), Some(quarantine_dir)) =
            (self.settings.max_attempts, self.settings.quarantine_dir.clone())
        else {
            return;
        };

        let count = self.failures.entry(media.path().to_path_buf()).or_insert(0);
        *count += 1;
        let attempts = *count;
        if attempts < max_attempts {
            debug!(file = %file_name, attempts, max_attempts, "Failure recorded");
            return;
        }

        self.failures.remove(media.path());
        self.sessions.forget(media.path());

        match archive::move_into(media.path(), &quarantine_dir).await {
            Ok(target) => warn!(
                file = %file_name,
                %destination,
                attempts,
                quarantined_to = %target.display(),
                "Too many failed attempts, file quarantined"
            ),
            Err(move_error) => error!(
                file = %file_name,
                %destination,
                error = %move_error,
                "Could not move file to quarantine"
            ),
        }
    }
}
