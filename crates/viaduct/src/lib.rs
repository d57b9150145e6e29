//! Viaduct relays frames from an embedded rendering engine into a host
//! graphics surface.
//!
//! The embedded engine owns its own graphics device and renders into an
//! offscreen surface; the host owns the on-screen framebuffer. The two stacks
//! cannot share GPU objects, so every finished frame crosses through CPU
//! memory: a double-buffered readback on the engine side, a ping-pong staging
//! upload on the host side, and a full-screen blit into the host framebuffer.
//!
//! The whole steady-state cycle runs on a single rendering thread. The only
//! cross-thread entry point is [`relay::resize::ResizeHandle`], a single-slot
//! mailbox consumed at the start of the next cycle.

pub mod bridge;
pub mod engine;
pub mod logging;
pub mod present;
pub mod relay;

pub use bridge::{FrameBridge, HostContext, OutputSurface, RenderStats};
pub use engine::{EmbeddedEngine, Rgba8};
pub use relay::resize::ResizeHandle;
