// LevelRing - lock-free transport from the input callback to the sampler
//
// The audio callback runs on a realtime thread and must never block or
// allocate. It writes mono samples into an SPSC ring; the sampling thread
// drains whatever arrived since the previous tick into a MeterWindow.
//
// Overflow policy: when the sampler falls behind, the callback drops the
// newest frames and counts them instead of waiting.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use super::meter::MeterWindow;

/// Default ring capacity: a little over 300 ms of mono audio at 48 kHz.
pub const DEFAULT_RING_CAPACITY: usize = 16_384;

/// Callback-side half of the ring
pub struct LevelProducer {
    producer: Producer<f32>,
    dropped: Arc<AtomicU64>,
}

/// Sampler-side half of the ring
pub struct LevelConsumer {
    consumer: Consumer<f32>,
    dropped: Arc<AtomicU64>,
}

/// Create a level ring with the given capacity in samples.
///
/// # Panics
/// Panics if `capacity` is 0.
pub fn level_ring(capacity: usize) -> (LevelProducer, LevelConsumer) {
    assert!(capacity > 0, "level ring capacity must be non-zero");
    let (producer, consumer) = RingBuffer::new(capacity);
    let dropped = Arc::new(AtomicU64::new(0));
    (
        LevelProducer {
            producer,
            dropped: Arc::clone(&dropped),
        },
        LevelConsumer { consumer, dropped },
    )
}

impl LevelProducer {
    /// Push interleaved frames, keeping only the first channel.
    ///
    /// Real-time safe: no allocation, no locks.
    pub fn push_interleaved(&mut self, data: &[f32], channels: usize) {
        let channels = channels.max(1);
        for frame in data.chunks(channels) {
            let sample = frame.first().copied().unwrap_or(0.0);
            if self.producer.push(sample).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Push interleaved i16 frames, converting to f32 and keeping the first channel.
    pub fn push_interleaved_i16(&mut self, data: &[i16], channels: usize) {
        let channels = channels.max(1);
        for frame in data.chunks(channels) {
            let sample = frame
                .first()
                .map(|&s| s as f32 / i16::MAX as f32)
                .unwrap_or(0.0);
            if self.producer.push(sample).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl LevelConsumer {
    /// Move every queued sample into `window`, returning how many were moved.
    pub fn drain_into(&mut self, window: &mut MeterWindow) -> usize {
        let mut moved = 0;
        while let Ok(sample) = self.consumer.pop() {
            window.push(sample);
            moved += 1;
        }
        moved
    }

    /// Total samples dropped by the callback because the ring was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
