use anyhow::{Context, Result};

use super::api::EmbeddedEngine;

/// Fault-absorbing wrapper around an [`EmbeddedEngine`].
///
/// The host must never see an engine fault as anything worse than a frozen
/// frame, so steady-state entry points return `bool` ("did anything happen")
/// and route errors to the log. Only [`configure`](Self::configure) is
/// fallible; it backs the one-time init path where failure is fatal.
pub struct EngineAdapter<E> {
    engine: E,
    warned_tick: bool,
    warned_resize: bool,
}

impl<E: EmbeddedEngine> EngineAdapter<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            warned_tick: false,
            warned_resize: false,
        }
    }

    /// Sets the engine's output size during initialization.
    ///
    /// Unlike [`apply_resize`](Self::apply_resize), a failure here propagates:
    /// an engine that cannot configure its initial backbuffer cannot start.
    pub fn configure(&mut self, width: u32, height: u32, scale: f32) -> Result<()> {
        self.engine
            .resize_output(width, height, scale)
            .with_context(|| format!("engine rejected initial output size {width}x{height}"))
    }

    /// Runs one engine tick. Returns `false` when the tick failed and the
    /// previous frame should be shown again.
    pub fn tick(&mut self) -> bool {
        match self.engine.tick() {
            Ok(()) => true,
            Err(err) => {
                if self.warned_tick {
                    log::debug!("engine tick failed: {err:#}");
                } else {
                    log::warn!("engine tick failed; retaining previous frame: {err:#}");
                    self.warned_tick = true;
                }
                false
            }
        }
    }

    /// Resizes the engine's output on the rendering thread. Returns `false`
    /// when the engine refused, in which case the caller drops the request and
    /// keeps the current surface.
    pub fn apply_resize(&mut self, width: u32, height: u32, scale: f32) -> bool {
        match self.engine.resize_output(width, height, scale) {
            Ok(()) => true,
            Err(err) => {
                if self.warned_resize {
                    log::debug!("engine resize to {width}x{height} failed: {err:#}");
                } else {
                    log::warn!("engine resize to {width}x{height} failed; keeping current size: {err:#}");
                    self.warned_resize = true;
                }
                false
            }
        }
    }

    /// Direct access for the readback step.
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}
