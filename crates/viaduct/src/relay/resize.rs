use std::sync::{Arc, Mutex, PoisonError};

/// A resize request captured from an arbitrary thread.
///
/// Plain data only; the requesting thread never touches graphics state.
/// `present` marks whether the requester expects a repaint for this resize —
/// the bridge presents every cycle regardless, so hosts that coalesce paint
/// requests can set it to `false` without changing behavior here.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PendingResize {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub present: bool,
}

/// Single-slot resize mailbox.
///
/// Writers overwrite, last write wins; there is no queue and no history. The
/// slot is consumed exactly once per render cycle, on the rendering thread,
/// before the tick that would render at the new size.
#[derive(Debug, Default)]
pub struct ResizeCoordinator {
    slot: Mutex<Option<PendingResize>>,
}

impl ResizeCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `request`, superseding any unconsumed one.
    pub fn post(&self, request: PendingResize) {
        // The slot only holds POD, so a poisoned lock left by a panicking
        // writer is still safe to reuse.
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(request);
    }

    /// Takes the pending request, leaving the slot empty.
    pub fn take(&self) -> Option<PendingResize> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Cloneable, thread-safe handle for posting resize requests.
///
/// Obtained from [`FrameBridge::resize_handle`](crate::FrameBridge::resize_handle)
/// and typically handed to a UI or layout thread. Calls are non-blocking,
/// perform no graphics work, and are idempotent for repeated identical values.
#[derive(Debug, Clone)]
pub struct ResizeHandle {
    coordinator: Arc<ResizeCoordinator>,
}

impl ResizeHandle {
    pub(crate) fn new(coordinator: Arc<ResizeCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Requests a resize to `width`×`height` physical pixels at `scale`.
    ///
    /// Zero dimensions and non-positive scales are rejected with a warning;
    /// the previous pending request (if any) stays in place.
    pub fn request(&self, width: u32, height: u32, scale: f32) {
        self.request_with_present(width, height, scale, true);
    }

    /// Like [`request`](Self::request), with an explicit `present` flag.
    pub fn request_with_present(&self, width: u32, height: u32, scale: f32, present: bool) {
        if width == 0 || height == 0 || !(scale > 0.0) {
            log::warn!("ignoring invalid resize request {width}x{height} @ {scale}");
            return;
        }
        self.coordinator.post(PendingResize {
            width,
            height,
            scale,
            present,
        });
    }
}
