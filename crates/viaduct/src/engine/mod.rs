//! Embedded-engine boundary.
//!
//! The embedded engine is a collaborator, not part of this crate: it owns its
//! own graphics device and scene, and the relay only ever sees its finished
//! pixels. [`EmbeddedEngine`] is the full contract; [`EngineAdapter`] wraps an
//! implementation so that engine faults degrade to "no new frame this cycle"
//! instead of propagating into the host.

mod adapter;
mod api;

pub use adapter::EngineAdapter;
pub use api::{frame_byte_len, EmbeddedEngine, Rgba8, BYTES_PER_PIXEL};
