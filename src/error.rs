//! Crate-level error types
//!
//! Each subsystem has its own error enum; [`Error`] wraps them for callers
//! that drive the whole relay (the binary, [`crate::server::RelayServer`]).

use thiserror::Error;

use crate::capture::{CaptureError, FrameError};
use crate::hub::HubError;
use crate::rooms::{GatewayError, StoreError};

/// Top-level relay error
#[derive(Debug, Error)]
pub enum Error {
    /// Socket or filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Capture subprocess could not be started or supervised
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Reframer gave up on the capture stream
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// Broadcast hub rejected an operation
    #[error(transparent)]
    Hub(#[from] HubError),

    /// Room or message store failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Chat relay refused a message
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;
