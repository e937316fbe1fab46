//! Emulated device memory.
//!
//! Every software resource is backed by an [`Allocation`]: a byte vector plus
//! the layout describing how pixels are placed in it. Textures that live only
//! on one adapter use a padded row pitch (the "native" layout); staging and
//! shared resources are row-major with a tight pitch.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockWriteGuard};

use crate::types::{Dimension, ResourceDescriptor};

/// Row pitch alignment of native texture layouts, in bytes.
pub(crate) const ROW_PITCH_ALIGNMENT: u64 = 256;

static NEXT_ALLOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// Placement of data inside an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MemoryLayout {
    /// Plain bytes.
    Linear { size: u64 },
    /// Rows of pixels, `row_pitch` bytes apart.
    Texture {
        width: u32,
        height: u32,
        depth: u32,
        bytes_per_pixel: u32,
        row_pitch: u64,
    },
}

impl MemoryLayout {
    /// Layout used for a resource created from `desc`.
    pub(crate) fn for_descriptor(desc: &ResourceDescriptor) -> Self {
        match desc.dimension {
            Dimension::Buffer => Self::Linear {
                size: desc.extent.width as u64,
            },
            Dimension::Texture2d | Dimension::Texture3d => {
                let bytes_per_pixel = desc.format.bytes_per_pixel();
                let tight = desc.extent.width as u64 * bytes_per_pixel as u64;
                let row_pitch = if desc.is_shared() || desc.is_staging() {
                    tight
                } else {
                    align_up(tight, ROW_PITCH_ALIGNMENT)
                };
                Self::Texture {
                    width: desc.extent.width,
                    height: desc.extent.height,
                    depth: desc.extent.depth,
                    bytes_per_pixel,
                    row_pitch,
                }
            }
        }
    }

    /// Total allocation size in bytes, or `None` if it overflows.
    pub(crate) fn checked_size(&self) -> Option<u64> {
        match *self {
            Self::Linear { size } => Some(size),
            Self::Texture {
                height,
                depth,
                row_pitch,
                ..
            } => row_pitch
                .checked_mul(height as u64)?
                .checked_mul(depth as u64),
        }
    }

    /// Total allocation size in bytes. Only valid for layouts whose
    /// [`MemoryLayout::checked_size`] succeeded.
    pub(crate) fn size(&self) -> u64 {
        self.checked_size().unwrap_or(u64::MAX)
    }

    /// Distance between rows, for texture layouts.
    pub(crate) fn row_pitch(&self) -> Option<u64> {
        match *self {
            Self::Linear { .. } => None,
            Self::Texture { row_pitch, .. } => Some(row_pitch),
        }
    }
}

pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// A block of emulated GPU memory.
#[derive(Debug)]
pub(crate) struct Allocation {
    id: u64,
    layout: MemoryLayout,
    bytes: RwLock<Vec<u8>>,
}

impl Allocation {
    /// Allocate zeroed memory for `layout`.
    pub(crate) fn new(layout: MemoryLayout) -> Self {
        Self {
            id: NEXT_ALLOCATION_ID.fetch_add(1, Ordering::Relaxed),
            layout,
            bytes: RwLock::new(vec![0u8; layout.size() as usize]),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn layout(&self) -> MemoryLayout {
        self.layout
    }

    pub(crate) fn size(&self) -> u64 {
        self.layout.size()
    }

    /// Map the allocation for CPU writes. Unmapped when the guard drops.
    pub(crate) fn map(&self) -> RwLockWriteGuard<'_, Vec<u8>> {
        self.bytes.write()
    }

    /// Read the contents with row padding removed.
    pub(crate) fn packed_contents(&self) -> Vec<u8> {
        let bytes = self.bytes.read();
        match self.layout {
            MemoryLayout::Linear { .. } => bytes.clone(),
            MemoryLayout::Texture {
                width,
                height,
                depth,
                bytes_per_pixel,
                row_pitch,
            } => {
                let row_len = width as usize * bytes_per_pixel as usize;
                let rows = height as usize * depth as usize;
                let mut packed = Vec::with_capacity(row_len * rows);
                for row in 0..rows {
                    let start = row * row_pitch as usize;
                    packed.extend_from_slice(&bytes[start..start + row_len]);
                }
                packed
            }
        }
    }
}

/// Copy the whole of `src` into `dst`.
///
/// Both allocations describe the same resource shape; only their row pitches
/// may differ.
pub(crate) fn copy_resource(dst: &Allocation, src: &Allocation) {
    let src_bytes = src.bytes.read();
    let mut dst_bytes = dst.bytes.write();

    match (dst.layout, src.layout) {
        (
            MemoryLayout::Texture {
                width,
                height,
                depth,
                bytes_per_pixel,
                row_pitch: dst_pitch,
            },
            MemoryLayout::Texture {
                row_pitch: src_pitch,
                ..
            },
        ) if dst_pitch != src_pitch => {
            let row_len = width as usize * bytes_per_pixel as usize;
            for row in 0..(height as usize * depth as usize) {
                let s = row * src_pitch as usize;
                let d = row * dst_pitch as usize;
                dst_bytes[d..d + row_len].copy_from_slice(&src_bytes[s..s + row_len]);
            }
        }
        _ => {
            let len = dst_bytes.len().min(src_bytes.len());
            dst_bytes[..len].copy_from_slice(&src_bytes[..len]);
        }
    }
}

/// Copy a `width` x `height` pixel region from a linear buffer into the
/// top-left corner of a texture.
pub(crate) fn copy_buffer_to_texture(
    dst: &Allocation,
    src: &Allocation,
    src_bytes_per_row: u32,
    width: u32,
    height: u32,
) {
    let Some(dst_pitch) = dst.layout.row_pitch() else {
        return;
    };
    let bytes_per_pixel = match dst.layout {
        MemoryLayout::Texture {
            bytes_per_pixel, ..
        } => bytes_per_pixel,
        MemoryLayout::Linear { .. } => return,
    };

    let src_bytes = src.bytes.read();
    let mut dst_bytes = dst.bytes.write();
    let row_len = width as usize * bytes_per_pixel as usize;
    for row in 0..height as usize {
        let s = row * src_bytes_per_row as usize;
        let d = row * dst_pitch as usize;
        dst_bytes[d..d + row_len].copy_from_slice(&src_bytes[s..s + row_len]);
    }
}
