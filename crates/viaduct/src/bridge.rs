//! Top-level render cycle.
//!
//! [`FrameBridge`] ties the pieces together and walks the lifecycle
//! `Uninitialized → Ready → (Resizing) → Ready → … → Disposed`. The host
//! drives it with one [`render`](FrameBridge::render) call per paint pass;
//! the entire cycle runs synchronously on that calling thread.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::engine::{frame_byte_len, EmbeddedEngine, EngineAdapter, BYTES_PER_PIXEL};
use crate::present::compositor::PresentationCompositor;
use crate::present::transfer::TransferBufferPool;
use crate::relay::buffers::PixelBufferPair;
use crate::relay::readback::ReadbackPipeline;
use crate::relay::resize::{ResizeCoordinator, ResizeHandle};

/// Host-facing graphics context (device/queue + target format).
///
/// Borrowed per call; the bridge never clones or stores host GPU handles.
pub struct HostContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub target_format: wgpu::TextureFormat,
}

impl<'a> HostContext<'a> {
    #[inline]
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        target_format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            device,
            queue,
            target_format,
        }
    }
}

/// Dimensions and identity of the embedded engine's output surface.
///
/// `generation` bumps on every applied resize; resources sized for an older
/// generation are recreated or discarded before they can be bound.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct OutputSurface {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
    pub generation: u64,
}

impl OutputSurface {
    /// Relay byte length for this surface.
    pub fn byte_len(&self) -> usize {
        frame_byte_len(self.width, self.height)
    }
}

/// Per-cycle diagnostic counters.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Render cycles the host has driven.
    pub cycles: u64,
    /// Frames successfully captured out of the engine.
    pub frames_captured: u64,
    /// Frames uploaded into the display texture.
    pub frames_uploaded: u64,
    /// Engine/readback/resize faults absorbed as "retain previous frame".
    pub soft_failures: u64,
    /// Resize requests actually applied (no-ops excluded).
    pub resizes_applied: u64,
}

/// GPU-side state, dropped as a unit on dispose.
struct GpuState {
    compositor: PresentationCompositor,
    transfer: Option<TransferBufferPool>,
}

/// Relays the embedded engine's frames into the host framebuffer.
///
/// One instance per embedded engine. All methods except the handle returned
/// by [`resize_handle`](Self::resize_handle) must be called from the host's
/// rendering thread.
pub struct FrameBridge<E> {
    engine: EngineAdapter<E>,
    resize: Arc<ResizeCoordinator>,
    readback: ReadbackPipeline,
    buffers: PixelBufferPair,
    gpu: Option<GpuState>,
    surface: OutputSurface,
    has_pending_frame: bool,
    last_host_scale: f32,
    stats: RenderStats,
    warned_disposed: bool,
}

impl<E: EmbeddedEngine> FrameBridge<E> {
    /// One-time initialization: configures the engine's backbuffer, compiles
    /// the blit pipeline, allocates relay buffers and the display texture, and
    /// primes the relay with a first tick + capture so the host's first paint
    /// shows content.
    ///
    /// Fails on zero dimensions, on an engine that rejects its initial size,
    /// and on shader/pipeline validation errors. These are fatal; the bridge
    /// cannot start.
    pub fn new(
        ctx: &HostContext<'_>,
        engine: E,
        width: u32,
        height: u32,
        scale: f32,
    ) -> Result<Self> {
        anyhow::ensure!(
            width > 0 && height > 0,
            "initial surface size must be non-zero, got {width}x{height}"
        );
        anyhow::ensure!(scale > 0.0, "initial scale must be positive, got {scale}");

        let mut engine = EngineAdapter::new(engine);
        engine.configure(width, height, scale)?;

        let surface = OutputSurface {
            width,
            height,
            scale,
            generation: 0,
        };
        let len = surface.byte_len();

        let compositor = PresentationCompositor::new(ctx, width, height, surface.generation)
            .context("presentation compositor init failed")?;
        let transfer = make_transfer(ctx, width, len);

        let mut bridge = Self {
            engine,
            resize: Arc::new(ResizeCoordinator::new()),
            readback: ReadbackPipeline::new(),
            buffers: PixelBufferPair::new(len),
            gpu: Some(GpuState {
                compositor,
                transfer,
            }),
            surface,
            has_pending_frame: false,
            last_host_scale: scale,
            stats: RenderStats::default(),
            warned_disposed: false,
        };

        bridge.tick_and_capture();
        log::debug!("frame bridge initialized at {width}x{height} @ {scale}");
        Ok(bridge)
    }

    /// Handle for posting resize requests from any thread.
    pub fn resize_handle(&self) -> ResizeHandle {
        ResizeHandle::new(Arc::clone(&self.resize))
    }

    pub fn surface(&self) -> OutputSurface {
        self.surface
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    /// Current relay buffer length in bytes.
    pub fn relay_len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether the byte-span readback fast path is still active.
    pub fn fast_readback_active(&self) -> bool {
        self.readback.fast_path_active()
    }

    /// Whether uploads currently go through the staging buffer pool.
    pub fn staged_uploads_active(&self) -> bool {
        self.gpu
            .as_ref()
            .is_some_and(|gpu| gpu.transfer.is_some())
    }

    pub fn is_disposed(&self) -> bool {
        self.gpu.is_none()
    }

    /// Runs one steady-state cycle: apply pending resize, tick the engine,
    /// capture its frame, upload and draw.
    ///
    /// `pixel_width`/`pixel_height` are the host target's physical pixel size,
    /// used for the viewport; `scale` is the host's current DPI scale. Soft
    /// failures anywhere in the cycle freeze the previously presented frame;
    /// this method itself never fails.
    ///
    /// The engine animates one step per call, so hosts that do not already
    /// repaint continuously should schedule another paint pass after each
    /// call.
    pub fn render(
        &mut self,
        ctx: &HostContext<'_>,
        target: &wgpu::TextureView,
        pixel_width: u32,
        pixel_height: u32,
        scale: f32,
    ) {
        if self.gpu.is_none() {
            if !self.warned_disposed {
                log::warn!("render called after dispose; ignoring");
                self.warned_disposed = true;
            }
            return;
        }

        if scale != self.last_host_scale {
            log::debug!("host scale changed {} -> {scale}", self.last_host_scale);
            self.last_host_scale = scale;
        }

        self.stats.cycles += 1;
        self.apply_pending_resize(ctx);
        self.tick_and_capture();
        self.present(ctx, target, pixel_width, pixel_height);
    }

    /// Releases GPU objects and relay buffers. Idempotent; teardown is
    /// best-effort and never fails.
    pub fn dispose(&mut self) {
        if self.gpu.take().is_none() {
            return;
        }
        self.buffers.realloc(0);
        self.has_pending_frame = false;
        log::debug!("frame bridge disposed");
    }

    fn apply_pending_resize(&mut self, ctx: &HostContext<'_>) {
        let Some(request) = self.resize.take() else {
            return;
        };

        if request.width == self.surface.width && request.height == self.surface.height {
            // Equal dimensions are a no-op; only the recorded scale moves.
            self.surface.scale = request.scale;
            return;
        }

        if !self
            .engine
            .apply_resize(request.width, request.height, request.scale)
        {
            self.stats.soft_failures += 1;
            return;
        }

        let len = frame_byte_len(request.width, request.height);
        self.buffers.realloc(len);
        self.surface = OutputSurface {
            width: request.width,
            height: request.height,
            scale: request.scale,
            generation: self.surface.generation + 1,
        };

        if let Some(gpu) = self.gpu.as_mut() {
            gpu.transfer = make_transfer(ctx, request.width, len);
            gpu.compositor.sync_display(ctx, &self.surface);
        }

        // Anything captured at the old size must not reach the new texture.
        self.has_pending_frame = false;
        self.stats.resizes_applied += 1;
        log::debug!(
            "resize applied: {}x{} @ {} (generation {})",
            request.width,
            request.height,
            request.scale,
            self.surface.generation
        );
    }

    fn tick_and_capture(&mut self) {
        if !self.engine.tick() {
            self.stats.soft_failures += 1;
            return;
        }

        let expected = self.surface.byte_len();
        if self
            .readback
            .capture(self.engine.engine_mut(), &mut self.buffers, expected)
        {
            self.has_pending_frame = true;
            self.stats.frames_captured += 1;
        } else {
            self.stats.soft_failures += 1;
        }
    }

    fn present(
        &mut self,
        ctx: &HostContext<'_>,
        target: &wgpu::TextureView,
        pixel_width: u32,
        pixel_height: u32,
    ) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        // Normally a no-op here; resizes sync the display eagerly. If it does
        // recreate, any staged frame was sized for the old texture.
        if gpu.compositor.sync_display(ctx, &self.surface) {
            self.has_pending_frame = false;
        }

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viaduct present encoder"),
            });

        if self.has_pending_frame {
            let uploaded = gpu.compositor.upload(
                ctx,
                &mut encoder,
                gpu.transfer.as_mut(),
                self.buffers.read_slot(),
            );
            if uploaded {
                self.stats.frames_uploaded += 1;
            }
            // Uploaded or dropped as stale: either way it is no longer pending.
            self.has_pending_frame = false;
        }

        gpu.compositor.draw(&mut encoder, target, pixel_width, pixel_height);
        ctx.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn make_transfer(ctx: &HostContext<'_>, width: u32, len: usize) -> Option<TransferBufferPool> {
    if TransferBufferPool::supports_width(width) {
        Some(TransferBufferPool::new(ctx.device, len as u64))
    } else {
        log::debug!(
            "row pitch {} not copy-aligned; staging pool bypassed, uploading directly",
            width as usize * BYTES_PER_PIXEL
        );
        None
    }
}
