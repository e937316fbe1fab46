//! Resource descriptors.

use bitflags::bitflags;

use super::{Extent3d, Format};

bitflags! {
    /// Creation flags for resources.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceFlags: u32 {
        /// CPU-writable, linear layout. Only valid for buffers.
        const STAGING = 1 << 0;
        /// Allocated so that it can be opened by another adapter.
        const SHARED = 1 << 1;
    }
}

impl Default for ResourceFlags {
    fn default() -> Self {
        Self::empty()
    }
}

/// Dimensionality of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dimension {
    /// Linear buffer; `extent.width` is the byte size.
    #[default]
    Buffer,
    /// Two-dimensional texture.
    Texture2d,
    /// Three-dimensional texture.
    Texture3d,
}

impl Dimension {
    /// Number of dimensions (1 for buffers).
    pub fn dims(&self) -> u32 {
        match self {
            Self::Buffer => 1,
            Self::Texture2d => 2,
            Self::Texture3d => 3,
        }
    }

    /// Map a dimension count back to a [`Dimension`].
    pub fn from_dims(dims: u32) -> Option<Self> {
        match dims {
            1 => Some(Self::Buffer),
            2 => Some(Self::Texture2d),
            3 => Some(Self::Texture3d),
            _ => None,
        }
    }
}

/// Descriptor for creating a resource.
///
/// Two descriptors are equal only if every field matches. Callers that
/// cache resources compare descriptors to decide whether a cached resource can
/// be reused.
///
/// # Example
///
/// ```
/// use tandem_graphics::{Format, ResourceDescriptor};
///
/// let staging = ResourceDescriptor::staging(4 * 16 * 16);
/// assert!(staging.is_staging());
///
/// let frame = ResourceDescriptor::texture_2d(16, 16, Format::Rgba8Unorm).with_shared(true);
/// assert!(frame.is_shared());
/// assert_ne!(frame, ResourceDescriptor::texture_2d(16, 16, Format::Rgba8Unorm));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ResourceDescriptor {
    /// Pixel format ([`Format::Unknown`] for buffers).
    pub format: Format,
    /// Buffer, 2D or 3D texture.
    pub dimension: Dimension,
    /// Resolution (byte size in `width` for buffers).
    pub extent: Extent3d,
    /// Creation flags.
    pub flags: ResourceFlags,
}

impl ResourceDescriptor {
    /// Create a GPU-local buffer descriptor of `size` bytes.
    pub fn buffer(size: u32) -> Self {
        Self {
            format: Format::Unknown,
            dimension: Dimension::Buffer,
            extent: Extent3d::new_1d(size),
            flags: ResourceFlags::empty(),
        }
    }

    /// Create a CPU-writable staging buffer descriptor of `size` bytes.
    pub fn staging(size: u32) -> Self {
        Self {
            flags: ResourceFlags::STAGING,
            ..Self::buffer(size)
        }
    }

    /// Create a 2D texture descriptor.
    pub fn texture_2d(width: u32, height: u32, format: Format) -> Self {
        Self {
            format,
            dimension: Dimension::Texture2d,
            extent: Extent3d::new_2d(width, height),
            flags: ResourceFlags::empty(),
        }
    }

    /// Create a 3D texture descriptor.
    pub fn texture_3d(width: u32, height: u32, depth: u32, format: Format) -> Self {
        Self {
            format,
            dimension: Dimension::Texture3d,
            extent: Extent3d::new_3d(width, height, depth),
            flags: ResourceFlags::empty(),
        }
    }

    /// Set or clear the shared flag.
    pub fn with_shared(mut self, shared: bool) -> Self {
        self.flags.set(ResourceFlags::SHARED, shared);
        self
    }

    /// Returns true if the resource is a CPU-writable staging buffer.
    pub fn is_staging(&self) -> bool {
        self.flags.contains(ResourceFlags::STAGING)
    }

    /// Returns true if the resource can be opened by another adapter.
    pub fn is_shared(&self) -> bool {
        self.flags.contains(ResourceFlags::SHARED)
    }

    /// Number of dimensions (1, 2 or 3).
    pub fn dims(&self) -> u32 {
        self.dimension.dims()
    }

    /// Size of the packed (tightly pitched) contents in bytes.
    pub fn packed_size(&self) -> u64 {
        match self.dimension {
            Dimension::Buffer => self.extent.width as u64,
            Dimension::Texture2d | Dimension::Texture3d => {
                self.format.bytes_per_pixel() as u64
                    * self.extent.width as u64
                    * self.extent.height as u64
                    * self.extent.depth as u64
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_descriptor() {
        let desc = ResourceDescriptor::staging(1024);
        assert_eq!(desc.dims(), 1);
        assert_eq!(desc.format, Format::Unknown);
        assert!(desc.is_staging());
        assert!(!desc.is_shared());
        assert_eq!(desc.packed_size(), 1024);
    }

    #[test]
    fn test_descriptor_equality_is_field_by_field() {
        let a = ResourceDescriptor::texture_2d(64, 32, Format::Rgba8Unorm);
        assert_eq!(a, ResourceDescriptor::texture_2d(64, 32, Format::Rgba8Unorm));
        assert_ne!(a, ResourceDescriptor::texture_2d(32, 64, Format::Rgba8Unorm));
        assert_ne!(a, ResourceDescriptor::texture_2d(64, 32, Format::Unknown));
        assert_ne!(a, a.with_shared(true));
        assert_ne!(a, ResourceDescriptor::texture_3d(64, 32, 1, Format::Rgba8Unorm));
    }

    #[test]
    fn test_packed_size() {
        let desc = ResourceDescriptor::texture_2d(3, 2, Format::Rgba8Unorm);
        assert_eq!(desc.packed_size(), 24);
        let desc = ResourceDescriptor::texture_3d(2, 2, 2, Format::Rgba8Unorm);
        assert_eq!(desc.packed_size(), 32);
    }

    #[test]
    fn test_dimension_roundtrip() {
        for dims in 1..=3 {
            assert_eq!(Dimension::from_dims(dims).unwrap().dims(), dims);
        }
        assert_eq!(Dimension::from_dims(0), None);
        assert_eq!(Dimension::from_dims(4), None);
    }
}
