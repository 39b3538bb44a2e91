use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use backchat_api::{
    Comment, CommentId, DurableCache, Error, EventChannel, IdentityProvider, RemoteStore, ThreadId,
    VideoId,
};
use tokio::sync::mpsc;

use crate::store::{EngineState, ThreadInfo};

/// Delay between a successful optimistic post and the follow-up full reload
/// that absorbs concurrent edits from other clients.
pub(crate) const POST_RECONCILE_DELAY: Duration = Duration::from_millis(1500);

/// Typed events the presentation layer subscribes to. Both carry normalized
/// video ids, so downstream counters never see a raw storage-prefixed key.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UiEvent {
    NewCommentPosted { video: VideoId, is_private: bool },
    UnreadChanged { video: VideoId, unread: u32 },
}

/// The synchronization engine for per-video discussion threads.
///
/// Explicitly constructed from its four collaborators; cloning is cheap and
/// shares the same state, which is how background tasks hold on to it.
#[derive(Clone)]
pub struct Engine {
    pub(crate) inner: Arc<EngineInner>,
}

pub(crate) struct EngineInner {
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) channel: Arc<dyn EventChannel>,
    pub(crate) cache: Arc<dyn DurableCache>,
    pub(crate) identity: Arc<dyn IdentityProvider>,

    pub(crate) state: Mutex<EngineState>,
    pub(crate) subscribers: Mutex<Vec<mpsc::UnboundedSender<UiEvent>>>,
}

impl Engine {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        channel: Arc<dyn EventChannel>,
        cache: Arc<dyn DurableCache>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Engine {
        Engine {
            inner: Arc::new(EngineInner {
                remote,
                channel,
                cache,
                identity,
                state: Mutex::new(EngineState::default()),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// All store mutations run under this one lock, and no guard is ever held
    /// across an await: background tasks marshal their results back through
    /// here before touching state.
    pub(crate) fn state(&self) -> MutexGuard<'_, EngineState> {
        self.inner.state.lock().expect("engine state mutex poisoned")
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<UiEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .lock()
            .expect("subscriber list mutex poisoned")
            .push(sender);
        receiver
    }

    pub(crate) fn emit(&self, event: UiEvent) {
        self.inner
            .subscribers
            .lock()
            .expect("subscriber list mutex poisoned")
            .retain_mut(|s| s.send(event.clone()).is_ok());
    }

    // Pure reads. Presentation code only ever goes through these.

    pub fn public_comments(&self, video: &VideoId) -> Vec<Comment> {
        self.state()
            .videos
            .get(video)
            .map(|vs| vs.public.clone())
            .unwrap_or_default()
    }

    pub fn private_thread(&self, video: &VideoId, thread: &ThreadId) -> Vec<Comment> {
        self.state()
            .videos
            .get(video)
            .and_then(|vs| vs.threads.get(thread).cloned())
            .unwrap_or_default()
    }

    pub fn unread_count(&self, video: &VideoId) -> u32 {
        self.state().unread_count.get(video).copied().unwrap_or(0)
    }

    pub fn is_thread_unread(&self, video: &VideoId, thread: &ThreadId) -> bool {
        self.state().is_thread_unread(video, thread)
    }

    pub fn roster(&self, video: &VideoId) -> Vec<ThreadInfo> {
        self.state()
            .videos
            .get(video)
            .map(|vs| vs.roster.clone())
            .unwrap_or_default()
    }

    /// Mark `video` as actively viewed: it joins the polling fallback set and
    /// gets an immediate background reconcile plus unread reload.
    pub fn watch(&self, video: &VideoId) {
        self.state().watched.insert(video.clone());
        self.spawn_refresh(video.clone());
    }

    pub fn unwatch(&self, video: &VideoId) {
        self.state().watched.remove(video);
    }

    pub(crate) fn watched_videos(&self) -> Vec<VideoId> {
        self.state().watched.iter().cloned().collect()
    }

    /// Post a message, optimistically. The provisional comment is in the
    /// store before this returns; server confirmation and the follow-up
    /// reconciliation happen in the background.
    pub fn post_message(
        &self,
        video: &VideoId,
        text: &str,
        thread: Option<ThreadId>,
    ) -> Result<Comment, Error> {
        let author = self
            .inner
            .identity
            .current_user()
            .ok_or(Error::NotAuthenticated)?;
        let comment = Comment::provisional(video.clone(), &author, text.to_owned(), thread);
        {
            let mut state = self.state();
            state.video_mut(video).insert(comment.clone());
            self.refresh_roster(&mut state, video);
            self.persist_snapshot(&state, video);
        }
        if !comment.is_private {
            // Fired exactly once, at insertion time. Reconciliation of the
            // same comment later must not re-fire it, or downstream counters
            // double-count.
            self.emit(UiEvent::NewCommentPosted {
                video: video.clone(),
                is_private: false,
            });
        }

        let this = self.clone();
        let submitted = comment.clone();
        let target = video.clone();
        tokio::spawn(async move {
            let created = this
                .inner
                .remote
                .create_comment(
                    &target,
                    &author,
                    &submitted.text,
                    submitted.parent_id.as_ref(),
                )
                .await;
            match created {
                Ok(confirmed) => {
                    let mut state = this.state();
                    state.video_mut(&target).confirm(&submitted.id, confirmed);
                    this.refresh_roster(&mut state, &target);
                    this.persist_snapshot(&state, &target);
                }
                // No rollback: the user's text stays on screen, the caller
                // decides about retries.
                Err(err) => tracing::warn!(
                    ?err,
                    video = %target,
                    temp_id = ?submitted.id,
                    "comment creation failed, keeping provisional entry"
                ),
            }
        });

        let this = self.clone();
        let target = video.clone();
        tokio::spawn(async move {
            tokio::time::sleep(POST_RECONCILE_DELAY).await;
            if let Err(err) = this.reconcile(&target).await {
                tracing::warn!(?err, video = %target, "post-send reconciliation failed");
            }
        });

        Ok(comment)
    }

    /// Toggle a like, optimistically. Best-effort: the remote call carries
    /// the intended target state and failures are only logged; the next full
    /// reconciliation restores the server's view.
    pub fn like_message(&self, video: &VideoId, comment: &CommentId) -> Result<(), Error> {
        let user = self
            .inner
            .identity
            .current_user()
            .ok_or(Error::NotAuthenticated)?;
        let was_liked = {
            let mut state = self.state();
            let Some(found) = state
                .videos
                .get_mut(video)
                .and_then(|vs| vs.find_comment_mut(comment))
            else {
                tracing::warn!(video = %video, comment = ?comment, "like for comment not in store");
                return Ok(());
            };
            let was = found.liked_by_me;
            found.liked_by_me = !was;
            found.like_count = match was {
                true => found.like_count.saturating_sub(1),
                false => found.like_count + 1,
            };
            was
        };

        let this = self.clone();
        let target = video.clone();
        let comment = comment.clone();
        tokio::spawn(async move {
            let toggled = this
                .inner
                .remote
                .toggle_like(&target, &comment, &user.id, !was_liked)
                .await;
            if let Err(err) = toggled {
                tracing::warn!(?err, comment = ?comment, "like toggle failed, leaving optimistic state");
            }
        });
        Ok(())
    }

    /// Reconcile and reload unread state for `video`, in the background,
    /// logging failures instead of surfacing them.
    pub(crate) fn spawn_refresh(&self, video: VideoId) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(err) = this.reconcile(&video).await {
                tracing::warn!(?err, video = %video, "background reconciliation failed");
            }
            if let Err(err) = this.load_unread_counts(&video).await {
                tracing::warn!(?err, video = %video, "background unread reload failed");
            }
        });
    }
}
