use std::collections::HashMap;

use async_trait::async_trait;

use crate::{Comment, CommentId, Error, ThreadId, User, UserId, VideoId};

/// What the server returns for one video: the public feed plus every private
/// thread the requesting user participates in. Each collection is ordered
/// newest-first; the reconciler reverses them into creation order.
#[derive(Clone, Debug, Default, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct RemoteSnapshot {
    pub comments: Vec<Comment>,
    pub threads_by_parent: HashMap<ThreadId, Vec<Comment>>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LikeResult {
    pub like_count: u32,
    pub is_liked: bool,
}

/// Unread breakdown for one video, parsed from the loosely-shaped payload of
/// the unread-counts endpoint.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UnreadReport {
    /// Whole-video count, no per-thread detail.
    Total(u32),
    Detailed {
        total: u32,
        threads: HashMap<ThreadId, u32>,
    },
}

impl UnreadReport {
    /// The endpoint answers either a bare integer or `{total, threads}`.
    /// Anything else is malformed and carries no information.
    pub fn parse(value: &serde_json::Value) -> Result<UnreadReport, Error> {
        if let Some(n) = value.as_u64() {
            return Ok(UnreadReport::Total(n as u32));
        }
        let obj = value.as_object().ok_or_else(|| {
            Error::MalformedPayload(format!("unread entry is neither integer nor object: {value}"))
        })?;
        let total = obj
            .get("total")
            .and_then(|t| t.as_u64())
            .ok_or_else(|| Error::MalformedPayload(format!("unread entry has no total: {value}")))?
            as u32;
        let mut threads = HashMap::new();
        if let Some(per_thread) = obj.get("threads") {
            let per_thread = per_thread.as_object().ok_or_else(|| {
                Error::MalformedPayload(format!("threads is not an object: {per_thread}"))
            })?;
            for (thread, count) in per_thread {
                let count = count.as_u64().ok_or_else(|| {
                    Error::MalformedPayload(format!("count for thread {thread} is not an integer"))
                })? as u32;
                threads.insert(ThreadId(thread.clone()), count);
            }
        }
        Ok(UnreadReport::Detailed { total, threads })
    }

    pub fn total(&self) -> u32 {
        match self {
            UnreadReport::Total(n) => *n,
            UnreadReport::Detailed { total, .. } => *total,
        }
    }
}

/// The remote authoritative store, REST-shaped. Implementations handle
/// transport; the engine owns all local state and merge policy.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn list_comments(
        &self,
        video: &VideoId,
        as_user: &UserId,
    ) -> anyhow::Result<RemoteSnapshot>;

    async fn create_comment(
        &self,
        video: &VideoId,
        as_user: &User,
        text: &str,
        parent: Option<&ThreadId>,
    ) -> anyhow::Result<Comment>;

    async fn toggle_like(
        &self,
        video: &VideoId,
        comment: &CommentId,
        as_user: &UserId,
        target_liked: bool,
    ) -> anyhow::Result<LikeResult>;

    /// Keys of the returned map are raw video ids exactly as the server sent
    /// them, possibly still wearing storage prefixes; values are the raw JSON
    /// the engine parses through [`UnreadReport::parse`].
    async fn unread_counts(
        &self,
        videos: &[VideoId],
        as_user: &UserId,
    ) -> anyhow::Result<HashMap<String, serde_json::Value>>;

    async fn mark_thread_read(
        &self,
        video: &VideoId,
        thread: &ThreadId,
        as_user: &UserId,
    ) -> anyhow::Result<()>;
}
