//! Lifecycle event types describing one detector's session, exposed to the
//! CLI and flutter_rust_bridge streams.

use serde::{Deserialize, Serialize};

/// Lifecycle event with wall-clock timestamp.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleEvent {
    pub timestamp_ms: u64,
    pub kind: LifecycleEventKind,
}

/// Stages a detector passes through during one screen visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum LifecycleEventKind {
    PermissionRequested,
    PermissionGranted,
    PermissionDenied,
    SamplingStarted {
        interval_ms: u64,
        sample_rate: u32,
    },
    AudioSessionFailed {
        code: i32,
        reason: String,
    },
    Deactivated {
        ticks: u64,
        emitted: u64,
        dropped: u64,
    },
    Revealed,
}
