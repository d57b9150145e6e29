//! Host-side presentation.
//!
//! Everything that touches the host's wgpu device: the ping-pong staging
//! buffers that feed the display texture, and the compositor that owns the
//! blit pipeline and draws the full-screen quad into the host framebuffer.

pub mod compositor;
pub mod transfer;
