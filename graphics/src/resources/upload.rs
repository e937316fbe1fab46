//! Staging upload of decoded images into textures.

use crate::command::staging_copy_region;
use crate::error::GraphicsError;
use crate::image::ImageData;
use crate::queue::Queue;
use crate::types::{BarrierState, ResourceDescriptor};

use super::Resource;

/// Copy `image` into the top-left corner of `dst` and wait for completion.
///
/// The pixels go through a staging buffer sized exactly to the image. `dst`
/// is moved `Common -> CopyDestination -> Common` around the copy. The whole
/// upload is validated before anything is recorded, so a failed upload
/// leaves `dst` in its previous state.
///
/// # Errors
///
/// - [`GraphicsError::DeviceLost`] if the queue's device was dropped
/// - [`GraphicsError::InvalidParameter`] if the image does not fit `dst`
/// - [`GraphicsError::BarrierStateMismatch`] if `dst` is not in `Common`
pub fn upload_image(queue: &Queue, dst: &Resource, image: &ImageData) -> Result<(), GraphicsError> {
    let device = queue.device().ok_or(GraphicsError::DeviceLost)?;

    let size = u32::try_from(image.pixels().len()).map_err(|_| {
        GraphicsError::InvalidParameter(format!(
            "image of {} bytes exceeds the staging limit",
            image.pixels().len()
        ))
    })?;
    let bytes_per_row = image.width() * dst.format().bytes_per_pixel();
    let staging_descriptor = ResourceDescriptor::staging(size);
    staging_copy_region(dst.descriptor(), &staging_descriptor, bytes_per_row)?;

    let staging = device.create_resource(&staging_descriptor)?;
    staging.write(image.pixels())?;

    let mut list = queue.start_recording()?;
    list.barrier(dst, BarrierState::Common, BarrierState::CopyDestination)?;
    list.copy_from_staging(dst, &staging, bytes_per_row)?;
    list.barrier(dst, BarrierState::CopyDestination, BarrierState::Common)?;
    queue.execute(list)?;

    log::debug!(
        "Uploaded {}x{} image on queue {}",
        image.width(),
        image.height(),
        queue.label()
    );
    queue.flush()
}
