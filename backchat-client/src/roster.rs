use std::collections::{HashMap, HashSet};

use backchat_api::{Comment, ThreadId, UserId, VideoId};

use crate::store::{EngineState, ThreadInfo};
use crate::Engine;

impl Engine {
    /// Regenerate the derived roster for `video` from the store. Runs on
    /// mutation, never on render.
    pub(crate) fn refresh_roster(&self, state: &mut EngineState, video: &VideoId) {
        let me = self.inner.identity.current_user();
        let roster = match state.videos.get(video) {
            Some(vs) => derive(
                video,
                &vs.public,
                &vs.threads,
                &state.unread_threads,
                me.as_ref().map(|u| &u.id),
            ),
            None => Vec::new(),
        };
        if let Some(vs) = state.videos.get_mut(video) {
            vs.roster = roster;
        }
    }
}

/// Derive the user-facing list of private-thread summaries for one video.
pub(crate) fn derive(
    video: &VideoId,
    public: &[Comment],
    threads: &HashMap<ThreadId, Vec<Comment>>,
    unread_threads: &HashMap<(VideoId, ThreadId), bool>,
    me: Option<&UserId>,
) -> Vec<ThreadInfo> {
    let is_unread = |thread: &ThreadId| {
        unread_threads
            .get(&(video.clone(), thread.clone()))
            .copied()
            .unwrap_or(false)
    };

    let mut roster = Vec::new();
    for (thread, messages) in threads {
        let root = public.iter().find(|c| c.id.0 == thread.0);

        let mut participants: HashSet<&UserId> = messages.iter().map(|m| &m.author_id).collect();
        if let Some(root) = root {
            participants.insert(&root.author_id);
        }
        // A thread only I have spoken in is not a conversation yet.
        if participants.len() == 1 && me.map_or(false, |me| participants.contains(me)) {
            continue;
        }

        let counterpart = messages
            .iter()
            .find(|m| Some(&m.author_id) != me)
            .or_else(|| root.filter(|c| Some(&c.author_id) != me));
        let Some(counterpart) = counterpart else {
            // Conversations can start server-side under a parent we have
            // never seen; surface that in the logs rather than showing an
            // undefined participant.
            tracing::warn!(video = %video, thread = ?thread, "no counterpart identity resolvable for thread");
            continue;
        };

        roster.push(ThreadInfo {
            thread: thread.clone(),
            other_participant: counterpart.username.clone(),
            has_unread: is_unread(thread),
        });
    }

    // A public comment by someone else is a conversation waiting to start:
    // surface it under the comment's own id until a real thread exists, so
    // the user can open a private reply from the roster.
    for c in public {
        if Some(&c.author_id) == me {
            continue;
        }
        let provisional = ThreadId::from(&c.id);
        if threads.contains_key(&provisional) {
            continue;
        }
        roster.push(ThreadInfo {
            has_unread: is_unread(&provisional),
            thread: provisional,
            other_participant: c.username.clone(),
        });
    }

    roster.sort_by(|a, b| {
        b.has_unread
            .cmp(&a.has_unread)
            .then_with(|| a.other_participant.cmp(&b.other_participant))
    });
    roster
}
