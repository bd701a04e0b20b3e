use thiserror::Error;

/// Non-success statuses from the oscilloscope driver surface.
///
/// Fatality also depends on where an error occurs: the session treats any
/// failure of buffer allocation or `run_streaming` as fatal regardless of
/// variant, while configuration calls only abort on intrinsically fatal ones.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no oscilloscope found")]
    NotFound,
    #[error("oscilloscope failed to open (status {0:#010x})")]
    OpenFailed(u32),
    #[error("device handle is no longer valid")]
    InvalidHandle,
    #[error("streaming values not ready yet")]
    NotReady,
    #[error("{call} returned status {status:#010x}")]
    CallFailed { call: &'static str, status: u32 },
}

impl DeviceError {
    /// Errors that abort startup or reconfiguration and are surfaced to the
    /// operator instead of being retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeviceError::NotFound | DeviceError::OpenFailed(_) | DeviceError::InvalidHandle
        )
    }

    /// Expected transients, retried on the next poll tick without logging.
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::NotReady)
    }
}
