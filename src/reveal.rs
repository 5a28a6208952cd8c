//! Reveal progress: the blur-clearing consumer of blow samples.
//!
//! A portrait starts fully fogged. Every blowing sample wipes away blur in
//! proportion to its intensity and a tap wipes away a fixed amount. When the
//! blur reaches zero the portrait is revealed, once, and the detector is
//! deactivated.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::RevealConfig;
use crate::engine::{BlowIntensityDetector, BlowSample, BlowSubscription, DetectorState, Lifecycle};
use crate::error::DetectorError;
use crate::telemetry::LifecycleEventKind;

/// What a blow or tap did to the portrait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RevealOutcome {
    /// Not blowing, or already revealed
    Ignored,
    Reduced { blur_radius: f32 },
    /// Blur reached zero; reported exactly once
    Revealed,
}

/// Blur radius bookkeeping for one portrait.
#[derive(Debug, Clone)]
pub struct RevealProgress {
    blur_radius: f32,
    blur_per_intensity: f32,
    tap_reduction: f32,
    revealed: bool,
}

impl RevealProgress {
    pub fn new(config: &RevealConfig) -> Self {
        Self {
            blur_radius: config.initial_blur_radius.max(0.0),
            blur_per_intensity: config.blur_per_intensity,
            tap_reduction: config.tap_reduction,
            revealed: false,
        }
    }

    pub fn blur_radius(&self) -> f32 {
        self.blur_radius
    }

    pub fn is_revealed(&self) -> bool {
        self.revealed
    }

    /// Apply one detector sample. Non-blowing samples change nothing.
    pub fn apply_blow(&mut self, sample: &BlowSample) -> RevealOutcome {
        if !sample.is_blowing {
            return RevealOutcome::Ignored;
        }
        self.reduce(sample.intensity * self.blur_per_intensity)
    }

    /// Tap fallback for devices without a usable microphone.
    pub fn apply_tap(&mut self) -> RevealOutcome {
        self.reduce(self.tap_reduction)
    }

    fn reduce(&mut self, amount: f32) -> RevealOutcome {
        if self.revealed {
            return RevealOutcome::Ignored;
        }

        self.blur_radius = (self.blur_radius - amount.max(0.0)).max(0.0);
        if self.blur_radius == 0.0 {
            self.revealed = true;
            RevealOutcome::Revealed
        } else {
            RevealOutcome::Reduced {
                blur_radius: self.blur_radius,
            }
        }
    }
}

/// Change pushed to reveal subscribers after every blow sample or tap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevealUpdate {
    /// The detector sample that caused the update; `None` for taps
    pub sample: Option<BlowSample>,
    pub blur_radius: f32,
    pub is_revealed: bool,
}

/// Snapshot for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RevealState {
    pub lifecycle: Lifecycle,
    pub detector: DetectorState,
    pub blur_radius: f32,
    pub is_revealed: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One screen visit: a detector, its single listener and the portrait it
/// clears.
pub struct RevealSession {
    detector: BlowIntensityDetector,
    subscription: Mutex<Option<BlowSubscription>>,
    progress: Mutex<RevealProgress>,
    updates: broadcast::Sender<RevealUpdate>,
}

impl RevealSession {
    /// Take ownership of an idle detector and register as its listener.
    pub fn new(
        detector: BlowIntensityDetector,
        config: &RevealConfig,
    ) -> Result<Self, DetectorError> {
        let subscription = detector.register_listener()?;
        let (updates, _) = broadcast::channel(64);
        Ok(Self {
            detector,
            subscription: Mutex::new(Some(subscription)),
            progress: Mutex::new(RevealProgress::new(config)),
            updates,
        })
    }

    pub fn detector(&self) -> &BlowIntensityDetector {
        &self.detector
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RevealUpdate> {
        self.updates.subscribe()
    }

    pub fn state(&self) -> RevealState {
        let progress = lock(&self.progress);
        RevealState {
            lifecycle: self.detector.lifecycle(),
            detector: self.detector.state(),
            blur_radius: progress.blur_radius(),
            is_revealed: progress.is_revealed(),
        }
    }

    /// Request microphone access and start sampling.
    pub async fn start(&self) -> Result<(), DetectorError> {
        self.detector.request_activation().await
    }

    /// Consume blow samples until the detector stops.
    ///
    /// Only the first call drives; later calls return immediately.
    pub async fn drive(&self) {
        let Some(mut subscription) = lock(&self.subscription).take() else {
            log::debug!("[Reveal] Session is already being driven");
            return;
        };

        while let Some(sample) = subscription.recv().await {
            let outcome = self.apply(Some(sample), |progress| progress.apply_blow(&sample));
            if outcome == RevealOutcome::Revealed {
                break;
            }
        }
    }

    /// Start, then drive until revealed or closed.
    pub async fn run(&self) -> Result<(), DetectorError> {
        self.start().await?;
        self.drive().await;
        Ok(())
    }

    pub fn tap(&self) -> RevealOutcome {
        self.apply(None, RevealProgress::apply_tap)
    }

    /// Tear the visit down. Idempotent.
    pub fn close(&self) {
        self.detector.deactivate();
    }

    fn apply(
        &self,
        sample: Option<BlowSample>,
        step: impl FnOnce(&mut RevealProgress) -> RevealOutcome,
    ) -> RevealOutcome {
        let (outcome, update) = {
            let mut progress = lock(&self.progress);
            let outcome = step(&mut progress);
            let update = RevealUpdate {
                sample,
                blur_radius: progress.blur_radius(),
                is_revealed: progress.is_revealed(),
            };
            (outcome, update)
        };

        if outcome != RevealOutcome::Ignored || sample.is_some() {
            let _ = self.updates.send(update);
        }

        if outcome == RevealOutcome::Revealed {
            log::info!("[Reveal] Portrait revealed");
            self.detector
                .telemetry()
                .publish(LifecycleEventKind::Revealed);
            self.detector.deactivate();
        }
        outcome
    }
}
