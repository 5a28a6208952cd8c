//! Microphone permission gate.
//!
//! The prompt is a one-shot asynchronous operation with exactly one
//! resolution. A gate hands the detector a oneshot receiver; a dropped
//! sender counts as a denial.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

pub trait PermissionGate: Send + Sync {
    fn request_record_permission(&self) -> oneshot::Receiver<bool>;

    /// Abandon an unanswered prompt; its receiver resolves as denied.
    fn cancel(&self) {}
}

/// Desktop gate: there is no system prompt, access is always granted.
#[derive(Debug, Default, Clone, Copy)]
pub struct GrantedPermission;

impl PermissionGate for GrantedPermission {
    fn request_record_permission(&self) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(true);
        rx
    }
}

/// Gate with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedPermission {
    granted: bool,
}

impl FixedPermission {
    pub fn granted() -> Self {
        Self { granted: true }
    }

    pub fn denied() -> Self {
        Self { granted: false }
    }
}

impl PermissionGate for FixedPermission {
    fn request_record_permission(&self) -> oneshot::Receiver<bool> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(self.granted);
        rx
    }
}

#[derive(Default)]
struct DeferredSlot {
    pending: Option<oneshot::Sender<bool>>,
    early_answer: Option<bool>,
}

/// Gate answered later by the host UI, which owns the real system prompt.
///
/// An answer given before any request is kept for the next request only.
/// A new request replaces an unanswered one, which then resolves as denied.
#[derive(Default)]
pub struct DeferredPermission {
    slot: Mutex<DeferredSlot>,
    requests: AtomicUsize,
}

impl DeferredPermission {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_slot(&self) -> MutexGuard<'_, DeferredSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver the user's answer. Returns true if a request was waiting.
    pub fn resolve(&self, granted: bool) -> bool {
        let mut slot = self.lock_slot();
        match slot.pending.take() {
            Some(tx) => {
                if tx.send(granted).is_err() {
                    log::debug!("[Permission] Requester gone before answer arrived");
                }
                true
            }
            None => {
                slot.early_answer = Some(granted);
                false
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock_slot().pending.is_some()
    }

    /// Number of prompts requested so far
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl PermissionGate for DeferredPermission {
    fn request_record_permission(&self) -> oneshot::Receiver<bool> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        let mut slot = self.lock_slot();
        if let Some(granted) = slot.early_answer.take() {
            let _ = tx.send(granted);
        } else if slot.pending.replace(tx).is_some() {
            log::warn!("[Permission] Unanswered prompt superseded by a new request");
        }
        rx
    }

    fn cancel(&self) {
        let mut slot = self.lock_slot();
        slot.early_answer = None;
        if slot.pending.take().is_some() {
            log::debug!("[Permission] Pending prompt cancelled");
        }
    }
}
