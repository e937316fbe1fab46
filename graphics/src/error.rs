//! Graphics error types.

use thiserror::Error;

use crate::instance::AdapterPreference;
use crate::types::{BarrierState, Format};

/// Errors that can occur in the graphics system.
///
/// Variants fall into three families:
///
/// - initialization failures (no adapter, object creation failed),
/// - contract violations (see [`GraphicsError::is_contract_violation`]),
/// - runtime conditions reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphicsError {
    /// Failed to initialize the graphics system.
    #[error("initialization failed: {0}")]
    InitializationFailed(String),
    /// No adapter with non-zero dedicated memory matched the preference.
    #[error("no suitable {0} adapter found")]
    NoSuitableAdapter(AdapterPreference),
    /// Failed to create a resource, queue, fence or allocator.
    #[error("resource creation failed: {0}")]
    ResourceCreationFailed(String),
    /// Failed to create a presentation surface.
    #[error("surface creation failed: {0}")]
    SurfaceCreationFailed(String),
    /// A requested feature is not supported.
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    /// An invalid parameter was provided.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// The owning device was dropped while one of its objects was still in use.
    #[error("device lost")]
    DeviceLost,
    /// Image decoding failed.
    #[error("image decoding failed: {0}")]
    ImageDecode(String),
    /// A deferred GPU timeline cannot make progress towards a CPU wait.
    #[error("GPU timeline stalled waiting for fence value {0}")]
    Stalled(u64),

    /// A fence was signalled with a value not greater than the previous one.
    #[error("fence signal value {value} must exceed the last signalled value {last}")]
    NonMonotonicSignal { value: u64, last: u64 },
    /// A wait was issued for a fence value that was never signalled.
    #[error("wait for fence value {value} which was never signalled (last signalled {last})")]
    WaitOnUnsignalledValue { value: u64, last: u64 },
    /// A CPU write exceeded the capacity of a staging resource.
    #[error("write of {len} bytes exceeds staging capacity of {capacity} bytes")]
    StagingOverflow { len: u64, capacity: u64 },
    /// A barrier requested a state transition that is not modelled.
    #[error("unsupported barrier transition {before:?} -> {after:?}")]
    UnsupportedTransition {
        before: BarrierState,
        after: BarrierState,
    },
    /// A barrier's `before` state does not match the tracked resource state.
    #[error("barrier expects {expected:?} but the resource is in {actual:?}")]
    BarrierStateMismatch {
        expected: BarrierState,
        actual: BarrierState,
    },
    /// The format cannot be used for the requested operation.
    #[error("unsupported format {0:?}")]
    UnsupportedFormat(Format),
    /// A cross-adapter share was requested for a resource created without the shared flag.
    #[error("resource was not created with the shared flag")]
    NotShareable,
    /// A command list was executed on a queue that did not create it.
    #[error("command list was recorded for a different queue")]
    ForeignCommandList,
    /// A command list outlived a reset of the allocator backing it.
    #[error("command list allocator was reset before execution")]
    StaleCommandList,
    /// A command allocator reset was attempted while its work was still in flight.
    #[error("command allocator reset while GPU work is in flight (pending {pending}, completed {completed})")]
    AllocatorInFlight { pending: u64, completed: u64 },
}

impl GraphicsError {
    /// Returns true if this error reports a programming error rather than
    /// an environmental failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Self::NonMonotonicSignal { .. }
                | Self::WaitOnUnsignalledValue { .. }
                | Self::StagingOverflow { .. }
                | Self::UnsupportedTransition { .. }
                | Self::BarrierStateMismatch { .. }
                | Self::UnsupportedFormat(_)
                | Self::NotShareable
                | Self::ForeignCommandList
                | Self::StaleCommandList
                | Self::AllocatorInFlight { .. }
        )
    }
}

impl From<::image::ImageError> for GraphicsError {
    fn from(err: ::image::ImageError) -> Self {
        Self::ImageDecode(err.to_string())
    }
}

/// Report a contract violation.
///
/// Always logged. With the `fatal-contracts` feature the process panics here;
/// otherwise the error is handed back to be propagated.
#[track_caller]
pub(crate) fn violation(err: GraphicsError) -> GraphicsError {
    log::error!("contract violation: {err}");
    if cfg!(feature = "fatal-contracts") {
        panic!("contract violation: {err}");
    }
    err
}
