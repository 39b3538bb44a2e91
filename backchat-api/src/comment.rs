use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

use crate::{Time, User, UserId, VideoId};

const TEMP_PREFIX: &str = "temp_";

static LAST_TEMP_MILLIS: AtomicI64 = AtomicI64::new(0);

/// An opaque comment id. Server-assigned once confirmed; `temp_<millis>`
/// while the comment is still provisional.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct CommentId(pub String);

impl CommentId {
    /// Mint a `temp_<clientTimestamp>` id for a comment that has not been
    /// confirmed by the server yet. The millisecond counter is bumped past
    /// the last minted value so two posts in the same instant cannot collide.
    pub fn provisional() -> CommentId {
        let now = Utc::now().timestamp_millis();
        let prev = LAST_TEMP_MILLIS.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
            Some(now.max(last + 1))
        });
        let millis = match prev {
            Ok(last) => now.max(last + 1),
            Err(last) => last,
        };
        CommentId(format!("{TEMP_PREFIX}{millis}"))
    }

    pub fn is_provisional(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }
}

/// Identity of a private thread: the id of the comment it is rooted at.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Deserialize, serde::Serialize)]
pub struct ThreadId(pub String);

impl From<&CommentId> for ThreadId {
    fn from(id: &CommentId) -> ThreadId {
        ThreadId(id.0.clone())
    }
}

#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub video: VideoId,

    /// Stable identity of the sender, not their display name.
    pub author_id: UserId,
    pub username: String,

    pub text: String,
    pub created_at: Time,

    pub like_count: u32,
    pub liked_by_me: bool,

    /// `parent_id` is `Some` exactly when the comment belongs to a private
    /// thread rooted at that id.
    pub is_private: bool,
    pub parent_id: Option<ThreadId>,
}

impl Comment {
    /// Build the provisional comment inserted ahead of server confirmation.
    pub fn provisional(
        video: VideoId,
        author: &User,
        text: String,
        parent: Option<ThreadId>,
    ) -> Comment {
        Comment {
            id: CommentId::provisional(),
            video,
            author_id: author.id.clone(),
            username: author.username.clone(),
            text,
            created_at: Utc::now(),
            like_count: 0,
            liked_by_me: false,
            is_private: parent.is_some(),
            parent_id: parent,
        }
    }
}
