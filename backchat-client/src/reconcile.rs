use anyhow::Context;
use backchat_api::{Error, RemoteSnapshot, VideoId};

use crate::store::VideoState;
use crate::Engine;

impl Engine {
    /// Fetch the authoritative state for `video` and merge it into the local
    /// store. Each pass takes a per-video sequence number before the fetch; a
    /// pass that started earlier but resolved later than an already-applied
    /// one is dropped, so a stale response can never overwrite a fresher one.
    pub async fn reconcile(&self, video: &VideoId) -> anyhow::Result<()> {
        let user = self
            .inner
            .identity
            .current_user()
            .ok_or(Error::NotAuthenticated)?;
        let seq = {
            let mut state = self.state();
            let vs = state.video_mut(video);
            vs.next_reconcile_seq += 1;
            vs.next_reconcile_seq
        };

        let snapshot = self
            .inner
            .remote
            .list_comments(video, &user.id)
            .await
            .with_context(|| format!("listing comments for video {video}"))?;

        let mut state = self.state();
        let vs = state.video_mut(video);
        if seq <= vs.applied_reconcile_seq {
            tracing::debug!(video = %video, seq, "dropping stale reconciliation result");
            return Ok(());
        }
        vs.applied_reconcile_seq = seq;
        apply_snapshot(vs, snapshot);
        self.refresh_roster(&mut state, video);
        self.persist_snapshot(&state, video);
        Ok(())
    }
}

/// Merge one server response into a video's local state. The two collections
/// deliberately follow different policies.
pub(crate) fn apply_snapshot(vs: &mut VideoState, snapshot: RemoteSnapshot) {
    let RemoteSnapshot {
        mut comments,
        threads_by_parent,
    } = snapshot;

    // Server sends newest-first; the store keeps creation order.
    comments.reverse();

    // An empty public list is "no update", not "delete everything": with
    // intermittent connectivity, availability wins over strict consistency.
    if !comments.is_empty() {
        vs.public = comments;
    }

    // Private threads are the opposite: the server holds full history and is
    // authoritative for thread existence, so present ids are replaced
    // wholesale and absent ids are dropped.
    vs.threads = threads_by_parent
        .into_iter()
        .map(|(id, mut msgs)| {
            msgs.reverse();
            (id, msgs)
        })
        .collect();
}
