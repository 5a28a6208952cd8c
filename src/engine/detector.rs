//! BlowIntensityDetector: periodic microphone sampling turned into a
//! discrete blow-intensity signal.
//!
//! One detector serves one screen visit. It is created idle, asks the
//! permission gate once, samples on a dedicated thread while active and is
//! stopped for good by [`deactivate`](BlowIntensityDetector::deactivate) or
//! by being dropped. There is no restart.
//!
//! ```text
//! Idle -> AwaitingPermission -> Sampling -> Stopped
//!                 |                  ^
//!                 +--(denied)--------+
//!                 +--(session failure)--> Degraded
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::audio::Sample;
use crate::config::{AudioSessionConfig, DetectorConfig};
use crate::engine::backend::{AudioInput, InputMeter};
use crate::engine::classify::{BlowSample, DetectorState, Thresholds};
use crate::engine::permission::PermissionGate;
use crate::engine::subscription::BlowSubscription;
use crate::error::{log_audio_error, log_detector_error, AudioError, DetectorError, ErrorCode};
use crate::telemetry::{LifecycleEvent, LifecycleEventKind, TelemetryCollector};

#[cfg(test)]
mod tests;

/// Where a detector is in its one-shot lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Idle,
    AwaitingPermission,
    Sampling,
    /// Deactivated or permission denied
    Stopped,
    /// Audio session could not be configured; never samples
    Degraded,
}

/// Counters for the sampling loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplerStats {
    pub ticks: u64,
    pub emitted: u64,
    /// Samples dropped because the listener channel was full
    pub dropped: u64,
}

#[derive(Default)]
struct SamplerCounters {
    ticks: AtomicU64,
    emitted: AtomicU64,
    dropped: AtomicU64,
}

type ListenerSlot = Arc<Mutex<Option<mpsc::Sender<BlowSample>>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Control {
    lifecycle: Lifecycle,
    worker: Option<SamplerHandle>,
}

pub struct BlowIntensityDetector {
    thresholds: Thresholds,
    interval: Duration,
    listener_capacity: usize,
    session: AudioSessionConfig,
    input: Arc<dyn AudioInput>,
    permission: Arc<dyn PermissionGate>,
    state: Arc<RwLock<DetectorState>>,
    control: Mutex<Control>,
    listener: ListenerSlot,
    listener_registered: AtomicBool,
    stopped: Arc<AtomicBool>,
    counters: Arc<SamplerCounters>,
    telemetry: TelemetryCollector,
}

impl BlowIntensityDetector {
    /// Create an idle detector.
    ///
    /// # Errors
    /// - `InvalidThresholdConfiguration` if the blow threshold is 0 or a
    ///   threshold is not finite
    /// - `InvalidSamplingInterval` if the interval is 0 ms
    pub fn new(
        config: &DetectorConfig,
        session: AudioSessionConfig,
        input: Arc<dyn AudioInput>,
        permission: Arc<dyn PermissionGate>,
    ) -> Result<Self, DetectorError> {
        let thresholds = Thresholds::from_config(config).map_err(|err| {
            log_detector_error(&err, "new");
            err
        })?;
        if config.sample_interval_ms == 0 {
            let err = DetectorError::InvalidSamplingInterval {
                interval_ms: config.sample_interval_ms,
            };
            log_detector_error(&err, "new");
            return Err(err);
        }

        Ok(Self {
            thresholds,
            interval: Duration::from_millis(config.sample_interval_ms),
            listener_capacity: config.listener_capacity.max(1),
            session,
            input,
            permission,
            state: Arc::new(RwLock::new(DetectorState::default())),
            control: Mutex::new(Control {
                lifecycle: Lifecycle::Idle,
                worker: None,
            }),
            listener: Arc::new(Mutex::new(None)),
            listener_registered: AtomicBool::new(false),
            stopped: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(SamplerCounters::default()),
            telemetry: TelemetryCollector::default(),
        })
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn lifecycle(&self) -> Lifecycle {
        lock(&self.control).lifecycle
    }

    /// Snapshot of the published state.
    pub fn state(&self) -> DetectorState {
        match self.state.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn stats(&self) -> SamplerStats {
        SamplerStats {
            ticks: self.counters.ticks.load(Ordering::Relaxed),
            emitted: self.counters.emitted.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
        }
    }

    pub fn telemetry(&self) -> &TelemetryCollector {
        &self.telemetry
    }

    pub fn subscribe_lifecycle(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.telemetry.subscribe()
    }

    /// Register the one and only listener.
    ///
    /// Must happen before [`request_activation`](Self::request_activation)
    /// to see every sample.
    ///
    /// # Errors
    /// - `ListenerAlreadyRegistered` on a second call
    /// - `AlreadyStopped` once the detector is stopped
    pub fn register_listener(&self) -> Result<BlowSubscription, DetectorError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err(DetectorError::AlreadyStopped);
        }
        if self.listener_registered.swap(true, Ordering::AcqRel) {
            return Err(DetectorError::ListenerAlreadyRegistered);
        }

        let (tx, rx) = mpsc::channel(self.listener_capacity);
        *lock(&self.listener) = Some(tx);
        Ok(BlowSubscription::new(rx, Arc::clone(&self.stopped)))
    }

    /// Ask for microphone access and start sampling.
    ///
    /// Resolves once sampling has started, or once the detector has settled
    /// into a terminal state. An audio session failure is logged and leaves
    /// the detector `Degraded`; it is not returned as an error.
    ///
    /// # Errors
    /// - `PermissionDenied` if the user refuses access (not retried)
    /// - `AlreadyActivated` if activation was already requested
    /// - `AlreadyStopped` if the detector was stopped
    /// - `StatePoisoned` if the control lock was poisoned
    pub async fn request_activation(&self) -> Result<(), DetectorError> {
        {
            let mut control = self
                .control
                .lock()
                .map_err(|_| DetectorError::StatePoisoned)?;
            match control.lifecycle {
                Lifecycle::Idle => control.lifecycle = Lifecycle::AwaitingPermission,
                Lifecycle::AwaitingPermission | Lifecycle::Sampling => {
                    return Err(DetectorError::AlreadyActivated)
                }
                Lifecycle::Stopped | Lifecycle::Degraded => {
                    return Err(DetectorError::AlreadyStopped)
                }
            }
        }

        self.telemetry.publish(LifecycleEventKind::PermissionRequested);
        let granted = self
            .permission
            .request_record_permission()
            .await
            .unwrap_or(false);

        let ready_rx = {
            let mut control = self
                .control
                .lock()
                .map_err(|_| DetectorError::StatePoisoned)?;
            if control.lifecycle != Lifecycle::AwaitingPermission {
                log::debug!("[BlowDetector] Deactivated while the permission prompt was open");
                return Ok(());
            }

            if !granted {
                control.lifecycle = Lifecycle::Stopped;
                drop(control);
                self.stopped.store(true, Ordering::Release);
                self.shut_listener();
                self.telemetry.publish(LifecycleEventKind::PermissionDenied);
                let err = DetectorError::PermissionDenied;
                log::warn!("[BlowDetector] {}", err.message());
                return Err(err);
            }

            self.telemetry.publish(LifecycleEventKind::PermissionGranted);
            let (ready_tx, ready_rx) = oneshot::channel();
            match self.spawn_sampler(ready_tx) {
                Ok(worker) => control.worker = Some(worker),
                Err(err) => {
                    control.lifecycle = Lifecycle::Degraded;
                    drop(control);
                    self.degrade(err);
                    return Ok(());
                }
            }
            ready_rx
        };

        let outcome = ready_rx.await.unwrap_or_else(|_| {
            Err(AudioError::StreamFailure {
                reason: "sampler exited before opening the input".to_string(),
            })
        });

        let mut control = lock(&self.control);
        match outcome {
            Ok(()) => {
                if control.lifecycle == Lifecycle::AwaitingPermission {
                    control.lifecycle = Lifecycle::Sampling;
                    drop(control);
                    self.telemetry.publish(LifecycleEventKind::SamplingStarted {
                        interval_ms: self.interval.as_millis() as u64,
                        sample_rate: self.session.sample_rate,
                    });
                    log::info!(
                        "[BlowDetector] Sampling every {:?} via {} (blow > {} dB, peak > {} dB)",
                        self.interval,
                        self.input.name(),
                        self.thresholds.blow_threshold(),
                        self.thresholds.peak_threshold()
                    );
                }
                Ok(())
            }
            Err(audio_err) => {
                let worker = control.worker.take();
                let degraded = control.lifecycle == Lifecycle::AwaitingPermission;
                if degraded {
                    control.lifecycle = Lifecycle::Degraded;
                }
                drop(control);
                if let Some(worker) = worker {
                    worker.shutdown();
                }
                if degraded {
                    self.degrade(audio_err.into());
                } else {
                    log::debug!(
                        "[BlowDetector] Input failed after deactivation: {}",
                        audio_err.message()
                    );
                }
                Ok(())
            }
        }
    }

    /// Stop sampling and release the audio input.
    ///
    /// Idempotent. Blocks until the sampling thread has closed the input, so
    /// no sample is emitted after this returns. Called from `Drop`, which
    /// makes it run on every exit path of the owner.
    pub fn deactivate(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }

        let worker = {
            let mut control = lock(&self.control);
            control.lifecycle = Lifecycle::Stopped;
            control.worker.take()
        };

        self.permission.cancel();
        self.shut_listener();
        if let Some(worker) = worker {
            worker.shutdown();
        }
        self.reset_state();

        let stats = self.stats();
        self.telemetry.publish(LifecycleEventKind::Deactivated {
            ticks: stats.ticks,
            emitted: stats.emitted,
            dropped: stats.dropped,
        });
        log::info!(
            "[BlowDetector] Deactivated after {} ticks ({} emitted, {} dropped)",
            stats.ticks,
            stats.emitted,
            stats.dropped
        );
    }

    fn degrade(&self, err: DetectorError) {
        log_detector_error(&err, "request_activation");
        self.stopped.store(true, Ordering::Release);
        self.shut_listener();
        self.reset_state();
        self.telemetry.publish(LifecycleEventKind::AudioSessionFailed {
            code: err.code(),
            reason: err.message(),
        });
    }

    fn shut_listener(&self) {
        lock(&self.listener).take();
    }

    fn reset_state(&self) {
        match self.state.write() {
            Ok(mut guard) => guard.reset(),
            Err(poisoned) => poisoned.into_inner().reset(),
        }
    }

    fn spawn_sampler(
        &self,
        ready_tx: oneshot::Sender<Result<(), AudioError>>,
    ) -> Result<SamplerHandle, DetectorError> {
        let (stop_tx, stop_rx) = oneshot::channel();
        let sampler = Sampler {
            input: Arc::clone(&self.input),
            session: self.session.clone(),
            thresholds: self.thresholds,
            interval: self.interval,
            state: Arc::clone(&self.state),
            listener: Arc::clone(&self.listener),
            stopped: Arc::clone(&self.stopped),
            counters: Arc::clone(&self.counters),
        };

        let join = std::thread::Builder::new()
            .name("blow-sampler".to_string())
            .spawn(move || sampler.run(ready_tx, stop_rx))
            .map_err(|e| DetectorError::AudioSessionConfigurationFailure {
                reason: format!("failed to spawn sampler thread: {}", e),
            })?;

        Ok(SamplerHandle {
            stop_tx: Some(stop_tx),
            join: Some(join),
        })
    }
}

impl Drop for BlowIntensityDetector {
    fn drop(&mut self) {
        self.deactivate();
    }
}

struct SamplerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SamplerHandle {
    fn shutdown(mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("[BlowDetector] Sampler thread panicked");
            }
        }
    }
}

/// Everything the sampling thread owns or shares.
struct Sampler {
    input: Arc<dyn AudioInput>,
    session: AudioSessionConfig,
    thresholds: Thresholds,
    interval: Duration,
    state: Arc<RwLock<DetectorState>>,
    listener: ListenerSlot,
    stopped: Arc<AtomicBool>,
    counters: Arc<SamplerCounters>,
}

impl Sampler {
    fn run(
        self,
        ready_tx: oneshot::Sender<Result<(), AudioError>>,
        mut stop_rx: oneshot::Receiver<()>,
    ) {
        let span = tracing::info_span!(
            "blow_sampler",
            backend = self.input.name(),
            interval_ms = self.interval.as_millis() as u64
        );
        let _entered = span.enter();

        // Dedicated current-thread runtime: the host may not provide one.
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ready_tx.send(Err(AudioError::HardwareError {
                    details: format!("sampler runtime: {}", err),
                }));
                return;
            }
        };

        let mut meter = match self.input.open(&self.session) {
            Ok(meter) => meter,
            Err(err) => {
                log_audio_error(&err, "open_input");
                let _ = ready_tx.send(Err(err));
                return;
            }
        };

        self.write_state(|state| state.is_active = true);
        if ready_tx.send(Ok(())).is_err() {
            log::debug!("[BlowDetector] Activation abandoned before sampling started");
            meter.close();
            self.write_state(DetectorState::reset);
            return;
        }

        runtime.block_on(async {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        if self.stopped.load(Ordering::Acquire) {
                            break;
                        }
                        self.sample_once(meter.as_mut());
                    }
                }
            }
        });

        meter.close();
        self.write_state(DetectorState::reset);
    }

    fn sample_once(&self, meter: &mut dyn InputMeter) {
        let reading: Sample = meter.update_meters();
        let blow = self.thresholds.classify(&reading);
        self.counters.ticks.fetch_add(1, Ordering::Relaxed);
        self.write_state(|state| state.record(blow));

        log::trace!(
            "[BlowDetector] avg={:.1} dB peak={:.1} dB blowing={} intensity={:.3}",
            reading.average_power,
            reading.peak_power,
            blow.is_blowing,
            blow.intensity
        );

        let slot = lock(&self.listener);
        if let Some(tx) = slot.as_ref() {
            match tx.try_send(blow) {
                Ok(()) => {
                    self.counters.emitted.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(_)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[BlowDetector] Listener lagging, sample dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    log::trace!("[BlowDetector] Listener gone");
                }
            }
        }
    }

    fn write_state(&self, update: impl FnOnce(&mut DetectorState)) {
        match self.state.write() {
            Ok(mut guard) => update(&mut *guard),
            Err(poisoned) => update(&mut *poisoned.into_inner()),
        }
    }
}
