mod cache;
mod channel;
mod comment;
mod error;
mod identity;
mod remote;
mod user;
mod video;

pub use cache::DurableCache;
pub use channel::{ChannelEvent, ChannelState, ChannelSubscription, EventChannel};
pub use comment::{Comment, CommentId, ThreadId};
pub use error::Error;
pub use identity::IdentityProvider;
pub use remote::{LikeResult, RemoteSnapshot, RemoteStore, UnreadReport};
pub use user::{User, UserId};
pub use video::VideoId;

pub type Time = chrono::DateTime<chrono::Utc>;
