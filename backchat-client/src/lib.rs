mod cache;
mod engine;
mod feed;
mod reconcile;
mod roster;
mod store;
mod unread;

pub use engine::{Engine, UiEvent};
pub use feed::FeedHandle;
pub use store::ThreadInfo;

pub mod api {
    pub use backchat_api::*;
}
