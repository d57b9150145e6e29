//! CPU-side frame relay.
//!
//! The pieces that never touch a graphics API: the double-buffered byte store
//! the engine's frames land in, the cross-thread resize mailbox, and the
//! capture step that moves pixels out of the engine.

pub mod buffers;
pub mod readback;
pub mod resize;
