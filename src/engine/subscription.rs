//! Listener side of the detector's blow event channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::Stream;
use tokio::sync::mpsc;

use super::classify::BlowSample;

/// The single subscription handed out by
/// [`BlowIntensityDetector::register_listener`](super::BlowIntensityDetector::register_listener).
///
/// Once the detector is deactivated the subscription ends, even if samples
/// are still buffered in the channel.
pub struct BlowSubscription {
    rx: mpsc::Receiver<BlowSample>,
    stopped: Arc<AtomicBool>,
}

impl BlowSubscription {
    pub(crate) fn new(rx: mpsc::Receiver<BlowSample>, stopped: Arc<AtomicBool>) -> Self {
        Self { rx, stopped }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Wait for the next sample. `None` once the detector has stopped.
    pub async fn recv(&mut self) -> Option<BlowSample> {
        if self.is_stopped() {
            self.rx.close();
            return None;
        }
        let sample = self.rx.recv().await?;
        if self.is_stopped() {
            self.rx.close();
            return None;
        }
        Some(sample)
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<BlowSample> {
        if self.is_stopped() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> impl Stream<Item = BlowSample> {
        futures::stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|sample| (sample, subscription))
        })
    }
}
