//! Resource barrier states.

use crate::error::{GraphicsError, violation};

/// State a resource is declared to be in by a barrier.
///
/// Only the transitions issued by the staging upload are modelled:
///
/// ```text
/// Common ──► CopyDestination ──► Common
/// ```
///
/// Every other transition is rejected by [`BarrierState::validate_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BarrierState {
    /// Shared/common state; implicitly usable as a copy source and for presentation.
    #[default]
    Common,
    /// The resource is the destination of copy operations.
    CopyDestination,
    /// The resource is the source of copy operations.
    CopySource,
}

impl BarrierState {
    /// Check that `self -> after` is a modelled transition.
    pub fn validate_transition(self, after: BarrierState) -> Result<(), GraphicsError> {
        match (self, after) {
            (Self::Common, Self::CopyDestination) | (Self::CopyDestination, Self::Common) => Ok(()),
            (before, after) => Err(violation(GraphicsError::UnsupportedTransition {
                before,
                after,
            })),
        }
    }

    /// Returns true if a resource in this state may be written by a copy.
    pub(crate) fn allows_copy_write(self) -> bool {
        matches!(self, Self::Common | Self::CopyDestination)
    }

    /// Returns true if a resource in this state may be read by a copy.
    pub(crate) fn allows_copy_read(self) -> bool {
        matches!(self, Self::Common | Self::CopySource)
    }
}
