//! Presentation-side access to the shared channels.
//!
//! [`UiBridge`] is what a desktop or web front end holds: it toggles the
//! microphone flag, exposes the status and response channels, and guards
//! against a `Requested` flag that no consumer ever picks up.
//!
//! # Safety timer
//!
//! Entering `Requested` arms a one-shot countdown tied to that request. The
//! countdown watches the shared microphone channel and disarms as soon as any
//! process publishes to it again, so a consumer in another process resetting
//! the flag cancels it. If nothing touched the flag when it fires, the bridge
//! resets it to `Idle` and the status to `Available`. A later toggle or
//! [`UiBridge::finish_capture`] on this bridge also disarms it.

use crate::channel::{AssistantStatus, ChannelRegistry, MicrophoneFlag, Snapshot, StateView};
use anyhow::Result;
use futures::{Stream, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How often an armed safety timer checks the microphone channel.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct UiBridge {
    channels: Arc<ChannelRegistry>,
    safety_window: Duration,
    poll_interval: Duration,
    timer: Mutex<Option<CancellationToken>>,
}

impl UiBridge {
    pub fn new(channels: Arc<ChannelRegistry>, safety_window: Duration) -> Self {
        Self {
            channels,
            safety_window,
            poll_interval: DEFAULT_POLL_INTERVAL,
            timer: Mutex::new(None),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn channels(&self) -> &Arc<ChannelRegistry> {
        &self.channels
    }

    /// User-facing microphone button. Must be called inside a tokio runtime.
    ///
    /// `Idle → Requested` also sets the status to `Listening` and arms the
    /// safety timer; `Requested → Idle` is a manual cancel. The countdown runs
    /// on the current runtime, so the caller must outlive it for the reset to
    /// happen.
    pub fn toggle_microphone(&self) -> Result<MicrophoneFlag> {
        let next = self.channels.microphone().toggled();
        self.disarm();

        match next {
            MicrophoneFlag::Requested => {
                self.channels.set_microphone(MicrophoneFlag::Requested)?;
                self.channels.set_assistant_status(AssistantStatus::Listening)?;
                self.arm();
                tracing::info!("Microphone requested");
            }
            MicrophoneFlag::Idle => {
                self.channels.set_microphone(MicrophoneFlag::Idle)?;
                tracing::info!("Microphone request cancelled");
            }
        }

        Ok(next)
    }

    /// Consumer-side `Requested → Idle` after a capture cycle.
    pub fn finish_capture(&self) -> Result<()> {
        self.disarm();
        self.channels.set_microphone(MicrophoneFlag::Idle)?;
        Ok(())
    }

    pub fn status(&self) -> AssistantStatus {
        self.channels.assistant_status()
    }

    pub fn microphone(&self) -> MicrophoneFlag {
        self.channels.microphone()
    }

    pub fn view(&self) -> StateView {
        self.channels.view()
    }

    /// Status updates, yielding only when the value or revision changes.
    pub fn watch_status(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Snapshot> + Send + 'static {
        changes(self.channels.status_channel().poll(interval, cancel))
    }

    /// Response updates, yielding only when the value or revision changes.
    pub fn watch_responses(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> impl Stream<Item = Snapshot> + Send + 'static {
        changes(self.channels.response_channel().poll(interval, cancel))
    }

    fn arm(&self) {
        let token = CancellationToken::new();
        let channels = Arc::clone(&self.channels);
        let window = self.safety_window;
        let interval = self.poll_interval;
        let armed_at = channels.microphone_channel().revision();
        let cancelled = token.clone();

        tokio::spawn(async move {
            let mut microphone = Box::pin(
                channels
                    .microphone_channel()
                    .poll(interval, cancelled.clone()),
            );
            let superseded = async {
                while let Some(snapshot) = microphone.next().await {
                    if snapshot.revision != armed_at {
                        return true;
                    }
                }
                false
            };

            tokio::select! {
                biased;
                _ = cancelled.cancelled() => {}
                true = superseded => {
                    tracing::debug!("Microphone flag changed, safety timer disarmed");
                }
                _ = tokio::time::sleep(window) => clear_stuck_microphone(&channels, armed_at),
            }
        });

        if let Some(previous) = self.lock_timer().replace(token) {
            previous.cancel();
        }
    }

    fn disarm(&self) {
        if let Some(token) = self.lock_timer().take() {
            token.cancel();
        }
    }

    fn lock_timer(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        // The guarded value is a plain token; a poisoned lock is still usable.
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn changes(
    snapshots: impl Stream<Item = Snapshot> + Send + 'static,
) -> impl Stream<Item = Snapshot> + Send + 'static {
    let mut last: Option<Snapshot> = None;
    snapshots.filter(move |snapshot| {
        let fresh = last.as_ref() != Some(snapshot);
        if fresh {
            last = Some(snapshot.clone());
        }
        futures::future::ready(fresh)
    })
}

fn clear_stuck_microphone(channels: &ChannelRegistry, armed_at: u64) {
    let microphone = channels.microphone_channel();
    if microphone.revision() != armed_at || channels.microphone() != MicrophoneFlag::Requested {
        return;
    }

    tracing::warn!("Microphone still requested after safety window, resetting");
    if let Err(e) = channels.set_microphone(MicrophoneFlag::Idle) {
        tracing::warn!("Failed to reset microphone: {}", e);
    }
    if let Err(e) = channels.set_assistant_status(AssistantStatus::Available) {
        tracing::warn!("Failed to reset status: {}", e);
    }
}
