// Audio module - level metering and realtime sample transport

pub mod level_ring;
pub mod meter;

// Re-export commonly used types for convenience
pub use level_ring::{level_ring, LevelConsumer, LevelProducer, DEFAULT_RING_CAPACITY};
pub use meter::{amplitude_to_dbfs, MeterWindow, Sample, METER_CEILING_DB, METER_FLOOR_DB};
