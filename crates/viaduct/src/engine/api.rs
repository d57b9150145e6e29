use anyhow::Result;
use bytemuck::{Pod, Zeroable};

/// Bytes per relayed pixel. The relay is fixed to tightly packed 4-byte RGBA.
pub const BYTES_PER_PIXEL: usize = 4;

/// Relay byte length for a frame of the given dimensions (no row padding).
#[inline]
pub fn frame_byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// One relayed pixel.
///
/// `#[repr(C)]` and `Pod` so that a `&[Rgba8]` frame reinterprets losslessly
/// as the byte stream the host texture upload expects.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

/// Contract the embedded engine must satisfy.
///
/// All methods are called on the rendering thread only, and all are synchronous
/// and bounded; the relay never calls back into the engine from another thread.
///
/// Frame layout: rows are row-major and **bottom-up** (row 0 is the bottom
/// scanline), `width * 4` bytes per row, no padding. The presentation shader
/// compensates with a V flip in the vertex stage.
///
/// Errors returned from `tick`, `read_frame_bytes` and `frame_pixels` are soft
/// faults: the relay logs them and keeps showing the previous frame. Panicking
/// across this boundary is out of contract.
pub trait EmbeddedEngine {
    /// Resizes the engine's render output. The next `tick` renders at the new
    /// size.
    fn resize_output(&mut self, width: u32, height: u32, scale: f32) -> Result<()>;

    /// Runs exactly one simulation + render step into the engine's offscreen
    /// surface.
    fn tick(&mut self) -> Result<()>;

    /// Fast path: copies the finished frame into `dst` as tightly packed RGBA
    /// bytes. `dst` is always sized `width * height * 4` for the dimensions of
    /// the last applied resize.
    ///
    /// Engines without a byte-span readback should return an error from every
    /// call; the relay downgrades to [`frame_pixels`](Self::frame_pixels)
    /// permanently after the first failure.
    fn read_frame_bytes(&mut self, dst: &mut [u8]) -> Result<()>;

    /// Fallback: exposes the finished frame as typed pixels.
    ///
    /// Must describe the same frame `read_frame_bytes` would have produced,
    /// bit for bit.
    fn frame_pixels(&mut self) -> Result<&[Rgba8]>;
}
