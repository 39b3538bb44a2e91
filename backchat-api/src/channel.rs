use tokio::sync::{mpsc, watch};

use crate::{ThreadId, VideoId};

/// Connection state of the push channel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// One push notification from the event channel.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum ChannelEvent {
    NewComment {
        video: VideoId,
        thread: Option<ThreadId>,
        is_private: bool,
    },
    UnreadChanged {
        video: VideoId,
    },
}

/// Both halves handed out by [`EventChannel::subscribe`].
pub struct ChannelSubscription {
    pub state: watch::Receiver<ChannelState>,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// The push channel. Connection management (and reconnection) is the
/// channel's own business; subscribers observe the state signal and fall back
/// to polling while it is not [`ChannelState::Connected`].
pub trait EventChannel: Send + Sync {
    fn subscribe(&self) -> ChannelSubscription;
}
