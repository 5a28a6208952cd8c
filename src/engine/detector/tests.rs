use super::*;
use crate::engine::backend::ScriptedInput;
use crate::engine::permission::{DeferredPermission, FixedPermission};

fn fast_config() -> DetectorConfig {
    DetectorConfig {
        sample_interval_ms: 5,
        ..DetectorConfig::default()
    }
}

fn detector_with(input: &ScriptedInput, granted: bool) -> BlowIntensityDetector {
    let permission = if granted {
        FixedPermission::granted()
    } else {
        FixedPermission::denied()
    };
    BlowIntensityDetector::new(
        &fast_config(),
        AudioSessionConfig::default(),
        Arc::new(input.clone()),
        Arc::new(permission),
    )
    .unwrap()
}

async fn next(subscription: &mut BlowSubscription) -> Option<BlowSample> {
    tokio::time::timeout(Duration::from_secs(2), subscription.recv())
        .await
        .expect("timed out waiting for a blow sample")
}

#[test]
fn test_zero_blow_threshold_fails_at_construction() {
    let config = DetectorConfig {
        blow_threshold: 0.0,
        ..DetectorConfig::default()
    };
    let result = BlowIntensityDetector::new(
        &config,
        AudioSessionConfig::default(),
        Arc::new(ScriptedInput::default()),
        Arc::new(FixedPermission::granted()),
    );
    assert!(matches!(
        result,
        Err(DetectorError::InvalidThresholdConfiguration { .. })
    ));
}

#[test]
fn test_zero_interval_fails_at_construction() {
    let config = DetectorConfig {
        sample_interval_ms: 0,
        ..DetectorConfig::default()
    };
    let result = BlowIntensityDetector::new(
        &config,
        AudioSessionConfig::default(),
        Arc::new(ScriptedInput::default()),
        Arc::new(FixedPermission::granted()),
    );
    assert!(matches!(
        result,
        Err(DetectorError::InvalidSamplingInterval { interval_ms: 0 })
    ));
}

#[test]
fn test_new_detector_is_idle() {
    let input = ScriptedInput::default();
    let detector = detector_with(&input, true);

    assert_eq!(detector.lifecycle(), Lifecycle::Idle);
    assert_eq!(detector.state(), DetectorState::default());
    assert_eq!(input.open_count(), 0);
}

#[tokio::test]
async fn test_emits_classified_samples_in_order() {
    let input = ScriptedInput::new([
        Sample::new(-15.0, -5.0),
        Sample::new(-25.0, -5.0),
        Sample::new(0.0, 0.0),
    ]);
    let detector = detector_with(&input, true);
    let mut subscription = detector.register_listener().unwrap();

    detector.request_activation().await.unwrap();
    assert_eq!(detector.lifecycle(), Lifecycle::Sampling);

    let first = next(&mut subscription).await.unwrap();
    assert!(first.is_blowing);
    assert!((first.intensity - 0.25).abs() < 1e-6);

    let second = next(&mut subscription).await.unwrap();
    assert_eq!(second, BlowSample::IDLE);

    let third = next(&mut subscription).await.unwrap();
    assert!(third.is_blowing);
    assert_eq!(third.intensity, 1.0);

    // Script exhausted: silence
    assert_eq!(next(&mut subscription).await.unwrap(), BlowSample::IDLE);

    detector.deactivate();
}

#[tokio::test]
async fn test_state_tracks_latest_sample() {
    let input = ScriptedInput::default().with_idle(Sample::new(-10.0, -2.0));
    let detector = detector_with(&input, true);
    let mut subscription = detector.register_listener().unwrap();

    detector.request_activation().await.unwrap();
    next(&mut subscription).await.unwrap();

    let state = detector.state();
    assert!(state.is_active);
    assert!(state.is_blowing);
    assert!((state.intensity - 0.5).abs() < 1e-6);

    detector.deactivate();
    assert_eq!(detector.state(), DetectorState::default());
}

#[tokio::test]
async fn test_permission_denied_never_samples() {
    let input = ScriptedInput::default().with_idle(Sample::new(-5.0, -1.0));
    let detector = detector_with(&input, false);
    let mut subscription = detector.register_listener().unwrap();

    let result = detector.request_activation().await;
    assert_eq!(result, Err(DetectorError::PermissionDenied));
    assert_eq!(detector.lifecycle(), Lifecycle::Stopped);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(input.open_count(), 0);
    assert_eq!(input.read_count(), 0);
    assert_eq!(detector.stats().ticks, 0);
    assert_eq!(next(&mut subscription).await, None);

    // Denial is final
    assert_eq!(
        detector.request_activation().await,
        Err(DetectorError::AlreadyStopped)
    );
}

#[tokio::test]
async fn test_audio_session_failure_degrades_silently() {
    let input = ScriptedInput::failing(AudioError::NoInputDevice);
    let detector = detector_with(&input, true);
    let mut subscription = detector.register_listener().unwrap();

    assert!(detector.request_activation().await.is_ok());
    assert_eq!(detector.lifecycle(), Lifecycle::Degraded);
    assert!(!detector.state().is_active);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(detector.stats().ticks, 0);
    assert_eq!(next(&mut subscription).await, None);

    let snapshot = detector.telemetry().snapshot();
    assert!(snapshot.recent.iter().any(|event| matches!(
        event.kind,
        LifecycleEventKind::AudioSessionFailed { code: 3003, .. }
    )));
}

#[tokio::test]
async fn test_deactivate_is_idempotent() {
    let input = ScriptedInput::default();
    let detector = detector_with(&input, true);
    let mut subscription = detector.register_listener().unwrap();

    detector.request_activation().await.unwrap();
    next(&mut subscription).await.unwrap();

    detector.deactivate();
    detector.deactivate();

    assert_eq!(detector.lifecycle(), Lifecycle::Stopped);
    assert_eq!(input.open_count(), 1);
    assert_eq!(input.close_count(), 1);
    assert_eq!(next(&mut subscription).await, None);

    let deactivations = detector
        .telemetry()
        .snapshot()
        .recent
        .iter()
        .filter(|event| matches!(event.kind, LifecycleEventKind::Deactivated { .. }))
        .count();
    assert_eq!(deactivations, 1);
}

#[tokio::test]
async fn test_no_ticks_after_deactivate() {
    let input = ScriptedInput::default();
    let detector = detector_with(&input, true);
    let mut subscription = detector.register_listener().unwrap();

    detector.request_activation().await.unwrap();
    next(&mut subscription).await.unwrap();
    detector.deactivate();

    let reads = input.read_count();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(input.read_count(), reads);
}

#[tokio::test]
async fn test_drop_releases_input_once() {
    let input = ScriptedInput::default();
    {
        let detector = detector_with(&input, true);
        let mut subscription = detector.register_listener().unwrap();
        detector.request_activation().await.unwrap();
        next(&mut subscription).await.unwrap();
    }
    assert_eq!(input.open_count(), 1);
    assert_eq!(input.close_count(), 1);
}

#[tokio::test]
async fn test_cannot_activate_twice_or_restart() {
    let input = ScriptedInput::default();
    let detector = detector_with(&input, true);

    detector.request_activation().await.unwrap();
    assert_eq!(
        detector.request_activation().await,
        Err(DetectorError::AlreadyActivated)
    );

    detector.deactivate();
    assert_eq!(
        detector.request_activation().await,
        Err(DetectorError::AlreadyStopped)
    );
    assert_eq!(input.open_count(), 1);
}

#[test]
fn test_single_listener_enforced() {
    let detector = detector_with(&ScriptedInput::default(), true);
    assert!(detector.register_listener().is_ok());
    assert!(matches!(
        detector.register_listener(),
        Err(DetectorError::ListenerAlreadyRegistered)
    ));
}

#[test]
fn test_listener_rejected_after_stop() {
    let detector = detector_with(&ScriptedInput::default(), true);
    detector.deactivate();
    assert!(matches!(
        detector.register_listener(),
        Err(DetectorError::AlreadyStopped)
    ));
}

#[tokio::test]
async fn test_lagging_listener_drops_instead_of_blocking() {
    let config = DetectorConfig {
        sample_interval_ms: 2,
        listener_capacity: 1,
        ..DetectorConfig::default()
    };
    let input = ScriptedInput::default();
    let detector = BlowIntensityDetector::new(
        &config,
        AudioSessionConfig::default(),
        Arc::new(input.clone()),
        Arc::new(FixedPermission::granted()),
    )
    .unwrap();
    let _subscription = detector.register_listener().unwrap();

    detector.request_activation().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    detector.deactivate();

    let stats = detector.stats();
    assert_eq!(stats.emitted, 1);
    assert!(stats.dropped > 0);
}

#[tokio::test]
async fn test_deactivate_while_permission_prompt_open() {
    let input = ScriptedInput::default();
    let gate = Arc::new(DeferredPermission::new());
    let detector = BlowIntensityDetector::new(
        &fast_config(),
        AudioSessionConfig::default(),
        Arc::new(input.clone()),
        gate.clone(),
    )
    .unwrap();

    let activation = detector.request_activation();
    let teardown = async {
        while !gate.is_pending() {
            tokio::task::yield_now().await;
        }
        detector.deactivate();
        gate.resolve(true);
    };
    let (result, _) = tokio::join!(activation, teardown);

    assert!(result.is_ok());
    assert_eq!(detector.lifecycle(), Lifecycle::Stopped);
    assert_eq!(input.open_count(), 0);
}

/// Input whose open blocks until released, then fails.
struct StalledFailingInput {
    opening: Arc<AtomicBool>,
    release: Mutex<std::sync::mpsc::Receiver<()>>,
}

impl AudioInput for StalledFailingInput {
    fn name(&self) -> &'static str {
        "stalled"
    }

    fn open(&self, _session: &AudioSessionConfig) -> Result<Box<dyn InputMeter>, AudioError> {
        self.opening.store(true, Ordering::SeqCst);
        let _ = lock(&self.release).recv_timeout(Duration::from_secs(2));
        Err(AudioError::NoInputDevice)
    }
}

#[tokio::test]
async fn test_open_failure_after_deactivate_stays_stopped() {
    let opening = Arc::new(AtomicBool::new(false));
    let (release_tx, release_rx) = std::sync::mpsc::channel();
    let detector = BlowIntensityDetector::new(
        &fast_config(),
        AudioSessionConfig::default(),
        Arc::new(StalledFailingInput {
            opening: Arc::clone(&opening),
            release: Mutex::new(release_rx),
        }),
        Arc::new(FixedPermission::granted()),
    )
    .unwrap();
    let mut events = detector.subscribe_lifecycle();

    let activation = detector.request_activation();
    let teardown = async {
        while !opening.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        // Open fails only once deactivate has already marked the detector stopped
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            let _ = release_tx.send(());
        });
        detector.deactivate();
    };
    let (result, _) = tokio::join!(activation, teardown);

    assert!(result.is_ok());
    assert_eq!(detector.lifecycle(), Lifecycle::Stopped);

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    let session_failed = kinds
        .iter()
        .any(|kind| matches!(kind, LifecycleEventKind::AudioSessionFailed { .. }));
    assert!(!session_failed);
    assert!(matches!(
        kinds.last(),
        Some(LifecycleEventKind::Deactivated { .. })
    ));
}

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let input = ScriptedInput::default();
    let detector = detector_with(&input, true);
    let mut events = detector.subscribe_lifecycle();

    detector.request_activation().await.unwrap();
    detector.deactivate();

    let mut kinds = Vec::new();
    while let Ok(event) = events.try_recv() {
        kinds.push(event.kind);
    }
    assert_eq!(kinds[0], LifecycleEventKind::PermissionRequested);
    assert_eq!(kinds[1], LifecycleEventKind::PermissionGranted);
    assert!(matches!(
        kinds[2],
        LifecycleEventKind::SamplingStarted { interval_ms: 5, .. }
    ));
    assert!(matches!(
        kinds.last(),
        Some(LifecycleEventKind::Deactivated { .. })
    ));
}
