//! Pixel formats.

/// Pixel format of a resource.
///
/// Buffers are untyped and always use [`Format::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    /// Raw, untyped memory.
    Unknown,
    /// 8-bit RGBA channels, unsigned normalized.
    #[default]
    Rgba8Unorm,
}

impl Format {
    /// Returns the size in bytes of one pixel, or 0 for untyped memory.
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            Self::Rgba8Unorm => 4,
            Self::Unknown => 0,
        }
    }

    /// Returns true if the format describes typed pixels.
    pub fn is_typed(&self) -> bool {
        self.bytes_per_pixel() != 0
    }
}
