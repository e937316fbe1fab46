//! Common types shared across the graphics system.

/// 3D extent for textures and buffers.
///
/// Buffers store their byte size in `width` and use `1` for the other two
/// components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    /// Width in pixels (or bytes for buffers).
    pub width: u32,
    /// Height in pixels (1 for buffers).
    pub height: u32,
    /// Depth in pixels (1 for 2D textures).
    pub depth: u32,
}

impl Extent3d {
    /// Create a 1D extent, as used by buffers.
    pub fn new_1d(width: u32) -> Self {
        Self {
            width,
            height: 1,
            depth: 1,
        }
    }

    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// The extent as a `[width, height, depth]` array.
    pub fn to_array(self) -> [u32; 3] {
        [self.width, self.height, self.depth]
    }

    /// Returns true if any component is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }
}

impl From<[u32; 3]> for Extent3d {
    fn from(value: [u32; 3]) -> Self {
        Self::new_3d(value[0], value[1], value[2])
    }
}
