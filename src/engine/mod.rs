//! Engine module housing the blow detection core.
//!
//! `backend` abstracts the platform microphone, `permission` the one-shot
//! permission prompt, `classify` the per-reading threshold logic and
//! `detector` the sampling loop that ties them together.

pub mod backend;
pub mod classify;
pub mod detector;
pub mod permission;
pub mod subscription;

#[cfg(target_os = "android")]
pub use backend::OboeInput;
#[cfg(not(target_os = "android"))]
pub use backend::CpalInput;
pub use backend::{default_input, AudioInput, InputMeter, ScriptedInput, WavInput};
pub use classify::{BlowSample, DetectorState, Thresholds};
pub use detector::{BlowIntensityDetector, Lifecycle, SamplerStats};
pub use permission::{DeferredPermission, FixedPermission, GrantedPermission, PermissionGate};
pub use subscription::BlowSubscription;
