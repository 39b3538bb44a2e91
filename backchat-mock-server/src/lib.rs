use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use backchat_api::{
    ChannelEvent, ChannelState, ChannelSubscription, Comment, CommentId, DurableCache,
    EventChannel, IdentityProvider, LikeResult, RemoteSnapshot, RemoteStore, ThreadId, User,
    UserId, VideoId,
};
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

#[derive(Debug, Default)]
struct VideoRecord {
    /// Stored in creation order; handed out newest-first like the real
    /// server does.
    public: Vec<Comment>,
    threads: HashMap<ThreadId, Vec<Comment>>,
}

#[derive(Debug, Default)]
struct ServerState {
    videos: HashMap<VideoId, VideoRecord>,

    /// Raw unread payloads keyed exactly as the server would key them,
    /// storage prefixes included.
    unread: HashMap<String, serde_json::Value>,

    latency: Duration,
    fail_next_create: bool,

    list_calls: u32,
    read_acks: Vec<(VideoId, ThreadId)>,
    like_calls: Vec<(CommentId, bool)>,
}

/// In-memory stand-in for the remote comment store and the push channel,
/// with injectable latency and failure for exercising the optimistic paths.
#[derive(Clone)]
pub struct MockServer {
    state: Arc<Mutex<ServerState>>,
    channel_state: Arc<watch::Sender<ChannelState>>,
    feeds: Arc<Mutex<Vec<mpsc::UnboundedSender<ChannelEvent>>>>,
}

impl MockServer {
    pub fn new() -> MockServer {
        let (channel_state, _) = watch::channel(ChannelState::Disconnected);
        MockServer {
            state: Arc::new(Mutex::new(ServerState::default())),
            channel_state: Arc::new(channel_state),
            feeds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().expect("mock server state poisoned")
    }

    /// Simulated network delay applied to every remote-store call.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Make the next `create_comment` fail with a transport error.
    pub fn fail_next_create(&self) {
        self.lock().fail_next_create = true;
    }

    pub fn set_channel_state(&self, state: ChannelState) {
        // Subscribers may all be gone; that is fine for a test driver.
        let _ = self.channel_state.send(state);
    }

    /// Push one event to every live channel subscription.
    pub fn push_event(&self, event: ChannelEvent) {
        self.feeds
            .lock()
            .expect("mock server feeds poisoned")
            .retain_mut(|f| f.send(event.clone()).is_ok());
    }

    /// Seed a server-side comment, bypassing the engine entirely.
    pub fn seed_comment(
        &self,
        video: &VideoId,
        author: &User,
        text: &str,
        parent: Option<&ThreadId>,
    ) -> Comment {
        let comment = Comment {
            id: CommentId(format!("c_{}", Uuid::new_v4())),
            video: video.clone(),
            author_id: author.id.clone(),
            username: author.username.clone(),
            text: text.to_owned(),
            created_at: Utc::now(),
            like_count: 0,
            liked_by_me: false,
            is_private: parent.is_some(),
            parent_id: parent.cloned(),
        };
        let mut state = self.lock();
        let record = state.videos.entry(video.clone()).or_default();
        match parent {
            None => record.public.push(comment.clone()),
            Some(thread) => record
                .threads
                .entry(thread.clone())
                .or_default()
                .push(comment.clone()),
        }
        comment
    }

    /// Drop a whole thread server-side, as if its other participant erased it.
    pub fn remove_thread(&self, video: &VideoId, thread: &ThreadId) {
        let mut state = self.lock();
        if let Some(record) = state.videos.get_mut(video) {
            record.threads.remove(thread);
        }
    }

    /// Install the raw unread payload returned for `raw_key` (which may wear
    /// a storage prefix, like the real backend's record keys do).
    pub fn set_unread_payload(&self, raw_key: &str, payload: serde_json::Value) {
        self.lock().unread.insert(raw_key.to_owned(), payload);
    }

    pub fn list_calls(&self) -> u32 {
        self.lock().list_calls
    }

    pub fn read_acks(&self) -> Vec<(VideoId, ThreadId)> {
        self.lock().read_acks.clone()
    }

    pub fn like_calls(&self) -> Vec<(CommentId, bool)> {
        self.lock().like_calls.clone()
    }

    async fn simulate_latency(&self) {
        let latency = self.lock().latency;
        if latency > Duration::ZERO {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for MockServer {
    fn default() -> MockServer {
        MockServer::new()
    }
}

#[async_trait]
impl RemoteStore for MockServer {
    async fn list_comments(
        &self,
        video: &VideoId,
        _as_user: &UserId,
    ) -> anyhow::Result<RemoteSnapshot> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.list_calls += 1;
        let Some(record) = state.videos.get(video) else {
            return Ok(RemoteSnapshot::default());
        };
        let mut comments = record.public.clone();
        comments.reverse();
        let threads_by_parent = record
            .threads
            .iter()
            .map(|(id, msgs)| {
                let mut msgs = msgs.clone();
                msgs.reverse();
                (id.clone(), msgs)
            })
            .collect();
        Ok(RemoteSnapshot {
            comments,
            threads_by_parent,
        })
    }

    async fn create_comment(
        &self,
        video: &VideoId,
        as_user: &User,
        text: &str,
        parent: Option<&ThreadId>,
    ) -> anyhow::Result<Comment> {
        self.simulate_latency().await;
        if std::mem::take(&mut self.lock().fail_next_create) {
            anyhow::bail!("simulated transport failure");
        }
        Ok(self.seed_comment(video, as_user, text, parent))
    }

    async fn toggle_like(
        &self,
        video: &VideoId,
        comment: &CommentId,
        _as_user: &UserId,
        target_liked: bool,
    ) -> anyhow::Result<LikeResult> {
        self.simulate_latency().await;
        let mut state = self.lock();
        state.like_calls.push((comment.clone(), target_liked));
        let found = state.videos.get_mut(video).and_then(|record| {
            record
                .public
                .iter_mut()
                .chain(record.threads.values_mut().flatten())
                .find(|c| c.id == *comment)
        });
        let Some(found) = found else {
            anyhow::bail!("no such comment {comment:?}");
        };
        found.liked_by_me = target_liked;
        found.like_count = match target_liked {
            true => found.like_count + 1,
            false => found.like_count.saturating_sub(1),
        };
        Ok(LikeResult {
            like_count: found.like_count,
            is_liked: found.liked_by_me,
        })
    }

    async fn unread_counts(
        &self,
        videos: &[VideoId],
        _as_user: &UserId,
    ) -> anyhow::Result<HashMap<String, serde_json::Value>> {
        self.simulate_latency().await;
        let state = self.lock();
        Ok(state
            .unread
            .iter()
            .filter(|(raw, _)| videos.contains(&VideoId::new((*raw).clone())))
            .map(|(raw, payload)| (raw.clone(), payload.clone()))
            .collect())
    }

    async fn mark_thread_read(
        &self,
        video: &VideoId,
        thread: &ThreadId,
        _as_user: &UserId,
    ) -> anyhow::Result<()> {
        self.simulate_latency().await;
        self.lock().read_acks.push((video.clone(), thread.clone()));
        Ok(())
    }
}

impl EventChannel for MockServer {
    fn subscribe(&self) -> ChannelSubscription {
        let (sender, events) = mpsc::unbounded_channel();
        self.feeds
            .lock()
            .expect("mock server feeds poisoned")
            .push(sender);
        ChannelSubscription {
            state: self.channel_state.subscribe(),
            events,
        }
    }
}

/// Key-value cache backed by a plain map, shared across engine instances to
/// exercise restart flows.
#[derive(Clone, Default)]
pub struct MemoryCache {
    blobs: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryCache {
    pub fn new() -> MemoryCache {
        MemoryCache::default()
    }
}

impl DurableCache for MemoryCache {
    fn save(&self, key: &str, blob: &[u8]) -> anyhow::Result<()> {
        self.blobs
            .lock()
            .expect("memory cache poisoned")
            .insert(key.to_owned(), blob.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.blobs
            .lock()
            .expect("memory cache poisoned")
            .get(key)
            .cloned()
    }

    fn keys(&self, prefix: &str) -> Vec<String> {
        self.blobs
            .lock()
            .expect("memory cache poisoned")
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// Identity provider pinned to one user, or to nobody.
pub struct FixedIdentity(Option<User>);

impl FixedIdentity {
    pub fn new(user: User) -> FixedIdentity {
        FixedIdentity(Some(user))
    }

    pub fn anonymous() -> FixedIdentity {
        FixedIdentity(None)
    }
}

impl IdentityProvider for FixedIdentity {
    fn current_user(&self) -> Option<User> {
        self.0.clone()
    }
}
