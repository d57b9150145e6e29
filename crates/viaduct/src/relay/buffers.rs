/// Double-buffered CPU pixel storage.
///
/// Exactly one buffer is the write target at any instant; the other holds the
/// most recently completed frame. Both are always the same length, and
/// [`realloc`](Self::realloc) is the only operation that moves either backing
/// allocation, so slices handed out by [`write_slot`](Self::write_slot) and
/// [`read_slot`](Self::read_slot) stay valid for the duration of a copy or
/// upload. Raw addresses never leave this type.
pub struct PixelBufferPair {
    buffers: [Box<[u8]>; 2],
    write_index: usize,
}

impl PixelBufferPair {
    pub fn new(len: usize) -> Self {
        Self {
            buffers: [Self::zeroed(len), Self::zeroed(len)],
            write_index: 0,
        }
    }

    fn zeroed(len: usize) -> Box<[u8]> {
        vec![0u8; len].into_boxed_slice()
    }

    /// Current length of each buffer in bytes.
    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index currently designated as the write target.
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// Reallocates both buffers to `len`, discarding their contents.
    ///
    /// A call with the current length is a no-op and preserves contents, so
    /// defensive callers can invoke this unconditionally.
    pub fn realloc(&mut self, len: usize) {
        if len == self.len() {
            return;
        }
        self.buffers = [Self::zeroed(len), Self::zeroed(len)];
    }

    /// The buffer the next frame should be captured into.
    pub fn write_slot(&mut self) -> &mut [u8] {
        &mut self.buffers[self.write_index]
    }

    /// The most recently completed frame (the buffer opposite the write
    /// target).
    pub fn read_slot(&self) -> &[u8] {
        &self.buffers[self.write_index ^ 1]
    }

    /// Marks the write buffer as completed and swaps roles.
    pub fn flip(&mut self) {
        self.write_index ^= 1;
    }
}
