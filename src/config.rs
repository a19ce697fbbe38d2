//! Codec configuration.
//!
//! Buffer sizes and the frame size limit shared by every codec bound to a
//! connection.
//!
//! # Example
//!
//! ```
//! use framewire::CodecConfig;
//!
//! let config = CodecConfig::default()
//!     .with_read_buffer_size(16 * 1024)
//!     .with_max_frame_size(4 * 1024 * 1024);
//! assert_eq!(config.read_buffer_size, 16 * 1024);
//! ```

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Default capacity of the buffered reader (64KB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default capacity of the buffered writer (64KB).
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 64 * 1024;

/// Configuration for a connection-bound codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Capacity of the buffered reader.
    ///
    /// Frames that fit in what is already buffered are decoded in place.
    pub read_buffer_size: usize,
    /// Capacity of the buffered writer.
    pub write_buffer_size: usize,
    /// Largest frame payload accepted from the peer.
    pub max_frame_size: u64,
}

impl CodecConfig {
    /// Set the read buffer capacity.
    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set the write buffer capacity.
    pub fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set the maximum accepted frame payload size.
    pub fn with_max_frame_size(mut self, size: u64) -> Self {
        self.max_frame_size = size;
        self
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
