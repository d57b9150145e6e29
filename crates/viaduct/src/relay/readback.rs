use crate::engine::EmbeddedEngine;
use crate::relay::buffers::PixelBufferPair;

/// Moves finished frames out of the embedded engine into the CPU buffer pair.
///
/// Capability policy: the byte-span fast path is tried first; its first
/// failure downgrades the pipeline to the structured-pixel path for the rest
/// of the process. The downgrade is sticky and never retried — repeated
/// failed probes are expensive and the fallback is always correct, producing
/// bit-identical output.
pub struct ReadbackPipeline {
    fast_path_disabled: bool,
    warned_fallback: bool,
}

impl ReadbackPipeline {
    pub fn new() -> Self {
        Self {
            fast_path_disabled: false,
            warned_fallback: false,
        }
    }

    /// Whether the byte-span fast path is still in use.
    pub fn fast_path_active(&self) -> bool {
        !self.fast_path_disabled
    }

    /// Captures the engine's current frame into the write buffer, then flips
    /// the pair. Returns `true` when a new frame landed.
    ///
    /// `expected_len` is `width * height * 4` for the current surface; a pair
    /// whose length is stale (resize not yet reflected) is reallocated before
    /// the copy rather than written out of bounds.
    pub fn capture<E: EmbeddedEngine>(
        &mut self,
        engine: &mut E,
        pair: &mut PixelBufferPair,
        expected_len: usize,
    ) -> bool {
        if pair.len() != expected_len {
            log::debug!(
                "relay buffers stale ({} bytes, expected {expected_len}); reallocating",
                pair.len()
            );
            pair.realloc(expected_len);
        }

        if !self.fast_path_disabled {
            match engine.read_frame_bytes(pair.write_slot()) {
                Ok(()) => {
                    pair.flip();
                    return true;
                }
                Err(err) => {
                    self.fast_path_disabled = true;
                    log::warn!(
                        "byte readback unsupported; switching to structured-pixel path: {err:#}"
                    );
                }
            }
        }

        match engine.frame_pixels() {
            Ok(pixels) => {
                let bytes: &[u8] = bytemuck::cast_slice(pixels);
                if bytes.len() != expected_len {
                    if !self.warned_fallback {
                        log::warn!(
                            "engine frame is {} bytes, expected {expected_len}; dropping frame",
                            bytes.len()
                        );
                        self.warned_fallback = true;
                    }
                    return false;
                }
                pair.write_slot().copy_from_slice(bytes);
                pair.flip();
                true
            }
            Err(err) => {
                if self.warned_fallback {
                    log::debug!("frame readback failed: {err:#}");
                } else {
                    log::warn!("frame readback failed; retaining previous frame: {err:#}");
                    self.warned_fallback = true;
                }
                false
            }
        }
    }
}

impl Default for ReadbackPipeline {
    fn default() -> Self {
        Self::new()
    }
}
