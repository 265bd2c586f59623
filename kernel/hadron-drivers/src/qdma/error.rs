//! Error taxonomy for the context programmer and queue lifecycle.

use hadron_kernel::driver_api::error::DriverError;

/// Errors specific to the indirect context-programming protocol (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    /// The command's busy bit did not clear within the timeout.
    Busy,
}

impl core::fmt::Display for ContextError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Busy => f.write_str("context programmer timed out waiting for busy bit"),
        }
    }
}

impl From<ContextError> for DriverError {
    fn from(_: ContextError) -> Self {
        DriverError::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_error_converts_to_timeout() {
        assert_eq!(DriverError::from(ContextError::Busy), DriverError::Timeout);
    }
}
