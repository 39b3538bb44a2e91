use anyhow::Context;
use backchat_api::{Error, ThreadId, UnreadReport, VideoId};

use crate::store::EngineState;
use crate::{Engine, UiEvent};

impl Engine {
    /// Fetch the unread breakdown for `video`, fold it into local state, and
    /// re-emit the unread count under the normalized id, so downstream
    /// counters never see a raw storage-prefixed key.
    pub async fn load_unread_counts(&self, video: &VideoId) -> anyhow::Result<()> {
        let user = self
            .inner
            .identity
            .current_user()
            .ok_or(Error::NotAuthenticated)?;
        let raw = self
            .inner
            .remote
            .unread_counts(std::slice::from_ref(video), &user.id)
            .await
            .with_context(|| format!("fetching unread counts for video {video}"))?;

        let mut state = self.state();
        for (raw_key, value) in raw {
            // Server keys may still wear storage prefixes.
            let video = VideoId::new(raw_key);
            let report = match UnreadReport::parse(&value) {
                Ok(report) => report,
                Err(err) => {
                    // Malformed entry carries zero information; the pass
                    // continues with what the server did send.
                    tracing::warn!(video = %video, %err, "ignoring unread entry");
                    continue;
                }
            };
            let unread = apply_report(&mut state, &video, &report);
            self.refresh_roster(&mut state, &video);
            self.emit(UiEvent::UnreadChanged {
                video: video.clone(),
                unread,
            });
        }
        Ok(())
    }

    /// Immediate optimistic unread bump for an inbound private comment: the
    /// indicator must be visible before any network confirmation.
    pub(crate) fn bump_unread(&self, video: &VideoId, thread: &ThreadId) {
        let mut state = self.state();
        state.unread_count.insert(video.clone(), 1);
        state
            .unread_threads
            .insert((video.clone(), thread.clone()), true);
        self.refresh_roster(&mut state, video);
        drop(state);
        self.emit(UiEvent::UnreadChanged {
            video: video.clone(),
            unread: 1,
        });
    }

    /// Clear the unread flag for one thread and acknowledge it remotely in
    /// the background.
    pub fn mark_thread_read(&self, video: &VideoId, thread: &ThreadId) -> Result<(), Error> {
        let user = self
            .inner
            .identity
            .current_user()
            .ok_or(Error::NotAuthenticated)?;
        let unread = {
            let mut state = self.state();
            state.clear_thread_flag(video, thread);
            let left = state.flagged_threads(video);
            state.unread_count.insert(video.clone(), left);
            self.refresh_roster(&mut state, video);
            left
        };
        self.emit(UiEvent::UnreadChanged {
            video: video.clone(),
            unread,
        });

        let this = self.clone();
        let video = video.clone();
        let thread = thread.clone();
        tokio::spawn(async move {
            let acked = this
                .inner
                .remote
                .mark_thread_read(&video, &thread, &user.id)
                .await;
            if let Err(err) = acked {
                tracing::warn!(?err, video = %video, thread = ?thread, "failed acknowledging thread read");
            }
        });
        Ok(())
    }
}

/// Fold one parsed unread report into the store, returning the count to
/// re-emit. Thread flags are one-way here: a zero count from the server never
/// clears a flag that an optimistic bump already set, only `mark_thread_read`
/// does. A zero total while flags are still set is treated as no information.
pub(crate) fn apply_report(
    state: &mut EngineState,
    video: &VideoId,
    report: &UnreadReport,
) -> u32 {
    if let UnreadReport::Detailed { threads, .. } = report {
        for (thread, count) in threads {
            if *count > 0 {
                state
                    .unread_threads
                    .insert((video.clone(), thread.clone()), true);
            }
        }
    }
    let total = report.total();
    let unread = match total == 0 && state.flagged_threads(video) > 0 {
        true => state.unread_count.get(video).copied().unwrap_or(0).max(1),
        false => total,
    };
    state.unread_count.insert(video.clone(), unread);
    unread
}
