use std::time::Duration;

use backchat_api::{ChannelEvent, ChannelState, ChannelSubscription};
use tokio::sync::oneshot;
use tokio::time::{sleep_until, Instant};

use crate::Engine;

/// How long to give the push channel before the polling fallback starts.
pub(crate) const CONNECT_GRACE: Duration = Duration::from_secs(2);
/// Polling cadence while the push channel is down.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Handle to the live-update driver task; dropping it stops the driver.
pub struct FeedHandle {
    _cancel: oneshot::Sender<()>,
}

impl Engine {
    /// Spawn the live-update driver: applies channel events as they arrive,
    /// and polls the actively-watched videos whenever the channel is down.
    ///
    /// One driver owns the poll timer, so a poll tick can never overlap
    /// itself; staleness across overlapping reloads is handled by the
    /// per-video reconciliation sequence numbers.
    pub fn start_feed(&self) -> FeedHandle {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let this = self.clone();
        tokio::spawn(async move { this.run_feed(cancel_rx).await });
        FeedHandle { _cancel: cancel_tx }
    }

    async fn run_feed(self, mut cancel: oneshot::Receiver<()>) {
        let ChannelSubscription {
            mut state,
            mut events,
        } = self.inner.channel.subscribe();

        let mut polling = false;
        let mut connect_deadline = Instant::now() + CONNECT_GRACE;
        let mut next_poll = Instant::now();
        loop {
            let connected = *state.borrow() == ChannelState::Connected;
            tokio::select! {
                _ = &mut cancel => {
                    tracing::debug!("feed driver cancelled");
                    return;
                }
                changed = state.changed() => {
                    if changed.is_err() {
                        tracing::warn!("event channel dropped its state signal, stopping feed driver");
                        return;
                    }
                    match *state.borrow() {
                        ChannelState::Connected => {
                            if polling {
                                tracing::info!("push channel connected, polling stops");
                            }
                            polling = false;
                        }
                        ChannelState::Connecting | ChannelState::Disconnected => {
                            if !polling {
                                connect_deadline = Instant::now() + CONNECT_GRACE;
                            }
                        }
                    }
                }
                event = events.recv() => match event {
                    Some(event) => self.apply_channel_event(event),
                    None => {
                        tracing::warn!("event channel closed its stream, stopping feed driver");
                        return;
                    }
                },
                _ = sleep_until(connect_deadline), if !connected && !polling => {
                    tracing::info!("push channel not connected within grace period, falling back to polling");
                    polling = true;
                    next_poll = Instant::now();
                }
                _ = sleep_until(next_poll), if polling && !connected => {
                    next_poll = Instant::now() + POLL_INTERVAL;
                    for video in self.watched_videos() {
                        let this = self.clone();
                        tokio::spawn(async move {
                            if let Err(err) = this.reconcile(&video).await {
                                tracing::warn!(?err, video = %video, "poll reload failed");
                            }
                        });
                    }
                }
            }
        }
    }

    fn apply_channel_event(&self, event: ChannelEvent) {
        tracing::debug!(?event, "channel event");
        match event {
            ChannelEvent::NewComment {
                video,
                thread,
                is_private,
            } => {
                if is_private {
                    // The recipient must see the indicator before any network
                    // round trip completes.
                    if let Some(thread) = thread.as_ref() {
                        self.bump_unread(&video, thread);
                    }
                }
                self.spawn_refresh(video);
            }
            ChannelEvent::UnreadChanged { video } => self.spawn_refresh(video),
        }
    }
}
