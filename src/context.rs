// RevealContext: Dependency Injection Container
// Owns the configuration, the audio input and at most one reveal session

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;

use crate::audio::Sample;
use crate::config::AppConfig;
use crate::engine::{
    default_input, AudioInput, BlowIntensityDetector, BlowSample, DeferredPermission, Thresholds,
};
use crate::error::{log_detector_error, DetectorError};
use crate::reveal::{RevealOutcome, RevealSession, RevealState, RevealUpdate};
use crate::telemetry::LifecycleEvent;

/// One screen visit: the session plus the permission prompt it waits on
struct ActiveVisit {
    session: Arc<RevealSession>,
    permission: Arc<DeferredPermission>,
}

/// RevealContext: Dependency injection container for the reveal screen
///
/// Holds everything the FFI surface needs:
/// - Loaded configuration (thresholds, session, reveal pacing)
/// - The platform audio input shared by successive visits
/// - The current visit, if any
///
/// Every visit gets a fresh detector; a stopped detector is never reused.
pub struct RevealContext {
    config: AppConfig,
    input: Arc<dyn AudioInput>,
    visit: Mutex<Option<ActiveVisit>>,
}

impl RevealContext {
    /// Create a context with the platform configuration and default input
    pub fn new() -> Self {
        Self::with_input(AppConfig::load(), default_input())
    }

    /// Create a context with injected dependencies
    pub fn with_input(config: AppConfig, input: Arc<dyn AudioInput>) -> Self {
        Self {
            config,
            input,
            visit: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    // ========================================================================
    // LOCK HELPER METHODS
    // ========================================================================

    /// Safely acquire lock on the current visit
    ///
    /// Returns MutexGuard or DetectorError::StatePoisoned on lock failure
    fn lock_visit(&self) -> Result<MutexGuard<'_, Option<ActiveVisit>>, DetectorError> {
        self.visit.lock().map_err(|_| DetectorError::StatePoisoned)
    }

    fn current_session(&self, context: &str) -> Result<Arc<RevealSession>, DetectorError> {
        let guard = self.lock_visit().map_err(|err| {
            log_detector_error(&err, context);
            err
        })?;
        guard
            .as_ref()
            .map(|visit| Arc::clone(&visit.session))
            .ok_or(DetectorError::NoActiveSession)
    }

    // ========================================================================
    // SESSION LIFECYCLE
    // ========================================================================

    /// Open a reveal session for a new screen visit
    ///
    /// Creates a detector, registers the reveal as its listener and starts
    /// activation on a background driver thread. Activation then waits for
    /// [`resolve_permission`](Self::resolve_permission). Any previous visit is
    /// closed first.
    ///
    /// # Errors
    /// - `InvalidThresholdConfiguration` / `InvalidSamplingInterval` from
    ///   the loaded configuration
    /// - `StatePoisoned` on lock failure
    pub fn open_session(&self) -> Result<(), DetectorError> {
        let permission = Arc::new(DeferredPermission::new());
        let detector = BlowIntensityDetector::new(
            &self.config.detector,
            self.config.session.clone(),
            Arc::clone(&self.input),
            permission.clone(),
        )?;
        let session = Arc::new(RevealSession::new(detector, &self.config.reveal)?);

        let previous = {
            let mut guard = self.lock_visit().map_err(|err| {
                log_detector_error(&err, "open_session");
                err
            })?;
            guard.replace(ActiveVisit {
                session: Arc::clone(&session),
                permission,
            })
        };
        if let Some(previous) = previous {
            log::info!("[RevealContext] Replacing previous reveal session");
            previous.session.close();
        }

        spawn_driver(session).map_err(|err| {
            log_detector_error(&err, "open_session");
            err
        })
    }

    /// Answer the microphone permission prompt of the current visit
    ///
    /// Returns `true` if a pending prompt was resolved.
    pub fn resolve_permission(&self, granted: bool) -> Result<bool, DetectorError> {
        let guard = self.lock_visit()?;
        let visit = guard.as_ref().ok_or(DetectorError::NoActiveSession)?;
        Ok(visit.permission.resolve(granted))
    }

    /// Tap fallback on the current portrait
    pub fn tap(&self) -> Result<RevealOutcome, DetectorError> {
        Ok(self.current_session("tap")?.tap())
    }

    /// Close the current visit, deactivating its detector
    ///
    /// Safe to call when no session is open.
    pub fn close_session(&self) -> Result<(), DetectorError> {
        let visit = self
            .lock_visit()
            .map_err(|err| {
                log_detector_error(&err, "close_session");
                err
            })?
            .take();

        if let Some(visit) = visit {
            visit.session.close();
        }
        Ok(())
    }

    // ========================================================================
    // QUERIES AND STREAMS
    // ========================================================================

    pub fn state(&self) -> Result<RevealState, DetectorError> {
        Ok(self.current_session("state")?.state())
    }

    pub fn subscribe_updates(&self) -> Result<broadcast::Receiver<RevealUpdate>, DetectorError> {
        Ok(self.current_session("subscribe_updates")?.subscribe())
    }

    pub fn subscribe_lifecycle(
        &self,
    ) -> Result<broadcast::Receiver<LifecycleEvent>, DetectorError> {
        Ok(self
            .current_session("subscribe_lifecycle")?
            .detector()
            .subscribe_lifecycle())
    }

    /// Classify a single reading against the configured thresholds
    pub fn classify(
        &self,
        average_power: f32,
        peak_power: f32,
    ) -> Result<BlowSample, DetectorError> {
        let thresholds = Thresholds::from_config(&self.config.detector)?;
        Ok(thresholds.classify(&Sample::new(average_power, peak_power)))
    }
}

impl Default for RevealContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Run activation and the reveal loop on a dedicated thread
///
/// The FFI host does not provide a tokio runtime, so the driver builds its
/// own current-thread runtime.
fn spawn_driver(session: Arc<RevealSession>) -> Result<(), DetectorError> {
    std::thread::Builder::new()
        .name("reveal-driver".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    log::error!("[RevealContext] Failed to build driver runtime: {}", err);
                    session.close();
                    return;
                }
            };

            if let Err(err) = runtime.block_on(session.run()) {
                log::warn!("[RevealContext] Reveal session ended: {}", err);
            }
        })
        .map(|_| ())
        .map_err(|e| DetectorError::AudioSessionConfigurationFailure {
            reason: format!("failed to spawn reveal driver: {}", e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::engine::{Lifecycle, ScriptedInput};
    use std::time::{Duration, Instant};

    fn test_context(input: &ScriptedInput) -> RevealContext {
        let config = AppConfig {
            detector: DetectorConfig {
                sample_interval_ms: 5,
                ..DetectorConfig::default()
            },
            ..AppConfig::default()
        };
        RevealContext::with_input(config, Arc::new(input.clone()))
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_context_creation() {
        let context = test_context(&ScriptedInput::default());
        assert_eq!(context.config().detector.blow_threshold, -20.0);
        assert!(matches!(context.state(), Err(DetectorError::NoActiveSession)));
    }

    #[test]
    fn test_calls_without_session() {
        let context = test_context(&ScriptedInput::default());
        assert!(matches!(context.tap(), Err(DetectorError::NoActiveSession)));
        assert!(matches!(
            context.resolve_permission(true),
            Err(DetectorError::NoActiveSession)
        ));
        assert!(context.close_session().is_ok());
    }

    #[test]
    fn test_granted_session_samples_until_closed() {
        let input = ScriptedInput::default();
        let context = test_context(&input);
        context.open_session().unwrap();

        context.resolve_permission(true).unwrap();
        assert!(wait_for(|| {
            context
                .state()
                .map(|state| state.lifecycle == Lifecycle::Sampling)
                .unwrap_or(false)
        }));

        context.close_session().unwrap();
        assert_eq!(input.close_count(), 1);
        assert!(matches!(context.state(), Err(DetectorError::NoActiveSession)));
    }

    #[test]
    fn test_denied_session_stops() {
        let input = ScriptedInput::default();
        let context = test_context(&input);
        context.open_session().unwrap();

        context.resolve_permission(false).unwrap();
        assert!(wait_for(|| {
            context
                .state()
                .map(|state| state.lifecycle == Lifecycle::Stopped)
                .unwrap_or(false)
        }));
        assert_eq!(input.open_count(), 0);
    }

    #[test]
    fn test_taps_reveal_portrait() {
        let context = test_context(&ScriptedInput::default());
        context.open_session().unwrap();

        for _ in 0..3 {
            assert!(matches!(context.tap().unwrap(), RevealOutcome::Reduced { .. }));
        }
        assert_eq!(context.tap().unwrap(), RevealOutcome::Revealed);

        let state = context.state().unwrap();
        assert!(state.is_revealed);
        assert_eq!(state.lifecycle, Lifecycle::Stopped);
    }

    #[test]
    fn test_reopen_replaces_previous_session() {
        let input = ScriptedInput::default();
        let context = test_context(&input);

        context.open_session().unwrap();
        context.resolve_permission(true).unwrap();
        assert!(wait_for(|| input.open_count() == 1));

        context.open_session().unwrap();
        assert_eq!(input.close_count(), 1);
        assert!(matches!(
            context.state().unwrap().lifecycle,
            Lifecycle::Idle | Lifecycle::AwaitingPermission
        ));

        context.close_session().unwrap();
    }

    #[test]
    fn test_classify_uses_configured_thresholds() {
        let context = test_context(&ScriptedInput::default());
        let sample = context.classify(-15.0, -5.0).unwrap();
        assert!(sample.is_blowing);
        assert!((sample.intensity - 0.25).abs() < 1e-6);
        assert_eq!(context.classify(-25.0, -5.0).unwrap(), BlowSample::IDLE);
    }
}
