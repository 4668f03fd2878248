//! Unified error types.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::shared::safe_error_message;

/// A failure raised by a single call into an injected provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The provider threw or rejected. Holds whatever value was thrown.
    #[error("{}", safe_error_message(.0))]
    Thrown(Value),

    #[error("Method not available: {0}")]
    MissingMethod(String),

    #[error("Provider call timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Failed to encode provider arguments: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl ProviderError {
    /// Wrap a plain message as a thrown value.
    pub fn thrown(message: impl Into<String>) -> Self {
        ProviderError::Thrown(Value::String(message.into()))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout(_))
    }
}

/// Capability-dispatch errors.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("No compatible wallet detected. Please install Ctrl wallet or enable Bitcoin support in your browser.")]
    NoProviderFound,

    #[error("No Bitcoin address returned from wallet")]
    NoAddressReturned,

    #[error("{cause}")]
    ProviderCallFailed { cause: ProviderError },

    #[error("No compatible signing method found in this wallet")]
    NoSigningMethod,

    #[error("Message signing not supported: {last_cause}")]
    SigningUnsupported { last_cause: ProviderError },
}

impl From<ProviderError> for DispatchError {
    fn from(cause: ProviderError) -> Self {
        DispatchError::ProviderCallFailed { cause }
    }
}

/// Errors from the connection state machine.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Another wallet operation is already in progress")]
    Busy,

    #[error("Wallet is already connected")]
    AlreadyConnected,

    #[error("No Bitcoin address available for signing")]
    NotConnected,

    #[error("Wallet connection lost. Please reconnect.")]
    ConnectionLost,

    #[error("Wallet state changed while the operation was in flight")]
    Superseded,

    #[error("Failed to get Bitcoin address: {0}")]
    Address(#[source] DispatchError),

    #[error("Message signing failed: {0}")]
    Signing(#[source] DispatchError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_thrown_displays_message_field() {
        let err = ProviderError::Thrown(json!({ "code": 4001, "message": "User rejected" }));
        assert_eq!(err.to_string(), "User rejected");
    }

    #[test]
    fn test_thrown_undefined_displays_unknown() {
        assert_eq!(ProviderError::Thrown(Value::Null).to_string(), "Unknown error");
    }

    #[test]
    fn test_timeout_display() {
        let err = ProviderError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Provider call timed out after 250ms");
        assert!(err.is_timeout());
    }

    #[test]
    fn test_session_error_prefixes() {
        let err = SessionError::Address(DispatchError::NoAddressReturned);
        assert_eq!(
            err.to_string(),
            "Failed to get Bitcoin address: No Bitcoin address returned from wallet"
        );

        let err = SessionError::Signing(DispatchError::SigningUnsupported {
            last_cause: ProviderError::thrown("nope"),
        });
        assert_eq!(
            err.to_string(),
            "Message signing failed: Message signing not supported: nope"
        );
    }
}
