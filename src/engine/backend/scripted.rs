use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::audio::Sample;
use crate::config::AudioSessionConfig;
use crate::error::AudioError;

use super::{AudioInput, InputMeter};

/// Scripted input used for deterministic testing and CLI tooling.
///
/// Each tick pops the next queued reading; once the script runs out the
/// meter keeps returning the idle reading (silence by default). Open, read
/// and close calls are counted so tests can assert on resource handling.
#[derive(Clone, Default)]
pub struct ScriptedInput {
    shared: Arc<ScriptedShared>,
}

#[derive(Default)]
struct ScriptedShared {
    script: Mutex<VecDeque<Sample>>,
    idle: Mutex<Option<Sample>>,
    open_error: Mutex<Option<AudioError>>,
    opens: AtomicUsize,
    closes: AtomicUsize,
    reads: AtomicUsize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedInput {
    pub fn new<I>(samples: I) -> Self
    where
        I: IntoIterator<Item = Sample>,
    {
        let input = Self::default();
        lock(&input.shared.script).extend(samples);
        input
    }

    /// Input whose session configuration always fails with `err`.
    pub fn failing(err: AudioError) -> Self {
        let input = Self::default();
        *lock(&input.shared.open_error) = Some(err);
        input
    }

    /// Reading returned once the script is exhausted.
    pub fn with_idle(self, idle: Sample) -> Self {
        *lock(&self.shared.idle) = Some(idle);
        self
    }

    pub fn open_count(&self) -> usize {
        self.shared.opens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.shared.reads.load(Ordering::SeqCst)
    }
}

impl AudioInput for ScriptedInput {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open(&self, _session: &AudioSessionConfig) -> Result<Box<dyn InputMeter>, AudioError> {
        if let Some(err) = lock(&self.shared.open_error).clone() {
            return Err(err);
        }
        self.shared.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedMeter {
            shared: Arc::clone(&self.shared),
            open: true,
        }))
    }
}

struct ScriptedMeter {
    shared: Arc<ScriptedShared>,
    open: bool,
}

impl InputMeter for ScriptedMeter {
    fn update_meters(&mut self) -> Sample {
        self.shared.reads.fetch_add(1, Ordering::SeqCst);
        let next = lock(&self.shared.script).pop_front();
        next.or_else(|| *lock(&self.shared.idle))
            .unwrap_or(Sample::SILENCE)
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.shared.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for ScriptedMeter {
    fn drop(&mut self) {
        self.close();
    }
}
