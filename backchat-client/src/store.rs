use std::collections::{HashMap, HashSet};

use backchat_api::{Comment, CommentId, ThreadId, VideoId};

/// Summary of one private thread for roster display. Regenerated wholesale on
/// every relevant store mutation, never edited in place.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadInfo {
    pub thread: ThreadId,
    pub other_participant: String,
    pub has_unread: bool,
}

/// Everything the engine knows about one video.
#[derive(Debug, Default)]
pub(crate) struct VideoState {
    /// Public feed in creation order.
    pub(crate) public: Vec<Comment>,

    /// Private threads keyed by parent comment id, each in creation order.
    pub(crate) threads: HashMap<ThreadId, Vec<Comment>>,

    /// Derived roster, sorted unread-first then by participant name.
    pub(crate) roster: Vec<ThreadInfo>,

    /// Next sequence number handed out to a reconciliation pass.
    pub(crate) next_reconcile_seq: u64,

    /// Sequence number of the last pass that actually applied; earlier
    /// passes resolving after it are dropped as stale.
    pub(crate) applied_reconcile_seq: u64,
}

impl VideoState {
    pub(crate) fn insert(&mut self, comment: Comment) {
        match comment.parent_id.clone() {
            None => self.public.push(comment),
            Some(thread) => self.threads.entry(thread).or_default().push(comment),
        }
    }

    /// Find a comment wherever it currently lives, public feed or thread.
    pub(crate) fn find_comment_mut(&mut self, id: &CommentId) -> Option<&mut Comment> {
        if let Some(c) = self.public.iter_mut().find(|c| c.id == *id) {
            return Some(c);
        }
        self.threads
            .values_mut()
            .flat_map(|msgs| msgs.iter_mut())
            .find(|c| c.id == *id)
    }

    /// Swap the provisional entry for the server-confirmed one, preserving
    /// its position. An intervening reconciliation may have evicted the
    /// provisional entry, or already delivered the server copy under its
    /// final id; either way the confirmed comment must end up in the store
    /// exactly once.
    pub(crate) fn confirm(&mut self, temp_id: &CommentId, confirmed: Comment) {
        if let Some(slot) = self.find_comment_mut(temp_id) {
            *slot = confirmed;
            return;
        }
        match self.find_comment_mut(&confirmed.id) {
            Some(slot) => *slot = confirmed,
            None => self.insert(confirmed),
        }
    }
}

/// The single mutable owner of all comment and unread data in the process.
/// Mutated only by the write path, the reconciler and the unread tracker;
/// presentation code gets cloned reads.
#[derive(Debug, Default)]
pub(crate) struct EngineState {
    pub(crate) videos: HashMap<VideoId, VideoState>,

    pub(crate) unread_count: HashMap<VideoId, u32>,
    pub(crate) unread_threads: HashMap<(VideoId, ThreadId), bool>,

    /// Videos the presentation layer currently has on screen; these are the
    /// ones the polling fallback reloads.
    pub(crate) watched: HashSet<VideoId>,
}

impl EngineState {
    pub(crate) fn video_mut(&mut self, video: &VideoId) -> &mut VideoState {
        self.videos.entry(video.clone()).or_default()
    }

    pub(crate) fn is_thread_unread(&self, video: &VideoId, thread: &ThreadId) -> bool {
        self.unread_threads
            .get(&(video.clone(), thread.clone()))
            .copied()
            .unwrap_or(false)
    }

    /// Drop the unread flag for one thread entirely. Cleared flags are
    /// removed rather than set to `false`, so the map stays bounded by the
    /// number of currently-unread threads.
    pub(crate) fn clear_thread_flag(&mut self, video: &VideoId, thread: &ThreadId) {
        self.unread_threads.remove(&(video.clone(), thread.clone()));
    }

    /// Number of threads currently flagged unread for `video`.
    pub(crate) fn flagged_threads(&self, video: &VideoId) -> u32 {
        self.unread_threads
            .iter()
            .filter(|((v, _), flagged)| v == video && **flagged)
            .count() as u32
    }
}
