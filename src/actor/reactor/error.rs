use thiserror::Error;

use crate::common::config::ConfigError;
use crate::sys::display::WindowHandle;

/// Failures the reactor can observe while talking to the display server.
///
/// Only [`WmError::Connection`] ends the event loop. Everything else is
/// reported and the loop carries on with the next event.
#[derive(Debug, Error)]
pub enum WmError {
    /// The window was destroyed between the event that named it and a
    /// request that used it.
    #[error("window {0} no longer exists")]
    StaleHandle(WindowHandle),
    /// The client does not speak the protocol the way we expected it to.
    #[error("window {window} does not support {what}")]
    ProtocolMismatch { window: WindowHandle, what: String },
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
    #[error("display connection failed: {0}")]
    Connection(String),
}

impl WmError {
    pub fn is_recoverable(&self) -> bool { !matches!(self, WmError::Connection(_)) }

    pub fn stale_window(&self) -> Option<WindowHandle> {
        match self {
            WmError::StaleHandle(handle) => Some(*handle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn only_connection_errors_are_fatal() {
        assert!(WmError::StaleHandle(WindowHandle(7)).is_recoverable());
        assert!(WmError::MalformedMessage("bad".into()).is_recoverable());
        assert!(WmError::ResourceExhausted("ids".into()).is_recoverable());
        assert!(!WmError::Connection("broken pipe".into()).is_recoverable());
    }

    #[test]
    fn stale_window_exposes_handle() {
        assert_eq!(WmError::StaleHandle(WindowHandle(3)).stale_window(), Some(WindowHandle(3)));
        assert_eq!(WmError::Connection("x".into()).stale_window(), None);
    }
}
