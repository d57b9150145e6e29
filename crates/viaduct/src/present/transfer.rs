use crate::engine::BYTES_PER_PIXEL;

/// Ping-pong GPU staging buffers for display-texture uploads.
///
/// Two buffers sized to the current frame byte length, rotated every upload
/// so a frame can be staged while the previous copy is still in flight. The
/// rotation index is independent of the CPU pair's write index.
///
/// Buffer-to-texture copies require the row pitch to be a multiple of
/// `COPY_BYTES_PER_ROW_ALIGNMENT`, and relayed frames are tightly packed, so
/// the pool is only usable for widths whose pitch happens to satisfy that.
/// For other widths the pool is bypassed and uploads go directly through
/// `Queue::write_texture` — functionally identical, less overlapped.
pub struct TransferBufferPool {
    buffers: [wgpu::Buffer; 2],
    upload_index: usize,
    len: u64,
}

impl TransferBufferPool {
    /// Whether staged copies are usable for frames of this width.
    pub fn supports_width(width: u32) -> bool {
        let pitch = width as u64 * BYTES_PER_PIXEL as u64;
        pitch % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as u64 == 0
    }

    pub fn new(device: &wgpu::Device, len: u64) -> Self {
        let make = |label| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: len,
                usage: wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        Self {
            buffers: [make("viaduct transfer buffer 0"), make("viaduct transfer buffer 1")],
            upload_index: 0,
            len,
        }
    }

    /// Length of each staging buffer in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index that the next [`stage`](Self::stage) call will write into.
    pub fn upload_index(&self) -> usize {
        self.upload_index
    }

    /// Stages `bytes` into the current buffer, records a copy into `texture`,
    /// and rotates the pair.
    ///
    /// `bytes` must be a full `width`×`height` frame matching the pool length,
    /// and `width` must satisfy [`supports_width`](Self::supports_width); the
    /// caller guarantees both by reallocating the pool on resize.
    pub fn stage(
        &mut self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        bytes: &[u8],
        texture: &wgpu::Texture,
        width: u32,
        height: u32,
    ) {
        let buffer = &self.buffers[self.upload_index];
        queue.write_buffer(buffer, 0, bytes);

        encoder.copy_buffer_to_texture(
            wgpu::TexelCopyBufferInfo {
                buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(width * BYTES_PER_PIXEL as u32),
                    rows_per_image: Some(height),
                },
            },
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        self.upload_index ^= 1;
    }
}
