use std::collections::HashMap;

use backchat_api::{Comment, ThreadId, Time, VideoId};
use chrono::Utc;

use crate::store::EngineState;
use crate::Engine;

pub(crate) const SNAPSHOT_KEY_PREFIX: &str = "comments_";

/// Durable mirror of one video's comment state. Unread flags are not
/// persisted; they are reloaded from the server at startup.
#[derive(Debug, serde::Deserialize, serde::Serialize)]
pub(crate) struct PersistedSnapshot {
    pub(crate) public: Vec<Comment>,
    pub(crate) threads: HashMap<ThreadId, Vec<Comment>>,
    pub(crate) saved_at: Time,
}

impl Engine {
    /// Write-behind mirror of `video` into the durable cache. Best-effort:
    /// everything here can be re-fetched, so failures are only logged.
    pub(crate) fn persist_snapshot(&self, state: &EngineState, video: &VideoId) {
        let Some(vs) = state.videos.get(video) else {
            return;
        };
        let snapshot = PersistedSnapshot {
            public: vs.public.clone(),
            threads: vs.threads.clone(),
            saved_at: Utc::now(),
        };
        let blob = match serde_json::to_vec(&snapshot) {
            Ok(blob) => blob,
            Err(err) => {
                tracing::error!(?err, video = %video, "failed serializing snapshot");
                return;
            }
        };
        let key = format!("{SNAPSHOT_KEY_PREFIX}{video}");
        if let Err(err) = self.inner.cache.save(&key, &blob) {
            tracing::warn!(?err, video = %video, "failed persisting snapshot");
        }
    }

    /// Read-once-at-boot: populate the store from every cached video so that
    /// data is on screen before the first network round trip completes.
    pub fn load_cached(&self) {
        for key in self.inner.cache.keys(SNAPSHOT_KEY_PREFIX) {
            let Some(raw_video) = key.strip_prefix(SNAPSHOT_KEY_PREFIX) else {
                continue;
            };
            let Some(blob) = self.inner.cache.load(&key) else {
                continue;
            };
            let snapshot: PersistedSnapshot = match serde_json::from_slice(&blob) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    tracing::warn!(?err, key, "discarding unreadable cached snapshot");
                    continue;
                }
            };
            let video = VideoId::new(raw_video);
            tracing::debug!(video = %video, saved_at = %snapshot.saved_at, "restoring cached comments");
            let mut state = self.state();
            let vs = state.video_mut(&video);
            vs.public = snapshot.public;
            vs.threads = snapshot.threads;
            self.refresh_roster(&mut state, &video);
        }
    }
}
