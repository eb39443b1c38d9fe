//! # Bridge Error Types
//!
//! Structured errors for the bridge core. None of these ever surface as
//! engine-visible exceptions: the engine and transport entry points absorb
//! them through [`BridgeError::log_absorbed`], which picks the log level that
//! matches the kind of fault.

use thiserror::Error;

use crate::registry::CorrelationId;

/// Errors raised while handing work to a scripting thread
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Target thread '{scope}' has shut down")]
    TargetClosed { scope: String },

    #[error("Failed to spawn event loop thread '{name}': {message}")]
    SpawnFailed { name: String, message: String },
}

/// Bridge core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("Invalid arguments to {operation}: {message}")]
    Validation { operation: String, message: String },

    #[error("No {kind} registered under id {id}")]
    UnknownId {
        kind: &'static str,
        id: CorrelationId,
    },

    #[error("Native transport for {operation} is not registered")]
    TransportUnavailable { operation: String },

    #[error("Registered {event} handler is not callable")]
    NotCallable { event: String },

    #[error("Script callback raised: {message}")]
    ScriptException { message: String },

    #[error("Correlation ids exhausted at {ceiling}")]
    IdsExhausted { ceiling: CorrelationId },

    #[error("Property '{property}' of {object} is read-only")]
    ReadOnlyProperty { object: String, property: String },

    #[error("Bridge context already torn down")]
    TornDown,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Dispatch error: {0}")]
    Dispatch(#[from] DispatchError),
}

impl BridgeError {
    pub fn validation(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn script_exception(message: impl Into<String>) -> Self {
        Self::ScriptException {
            message: message.into(),
        }
    }

    /// Log an error that ends at this boundary.
    ///
    /// Unknown ids and a closed dispatch target are expected after teardown and
    /// stay at debug. Integration faults (missing transport, exhausted ids,
    /// writes to read-only properties) are errors.
    pub fn log_absorbed(&self, component: &str) {
        match self {
            Self::Validation { .. } | Self::ScriptException { .. } => {
                tracing::warn!(component = %component, error = %self, "Bridge call absorbed");
            }
            Self::UnknownId { .. }
            | Self::NotCallable { .. }
            | Self::TornDown
            | Self::Dispatch(DispatchError::TargetClosed { .. }) => {
                tracing::debug!(component = %component, error = %self, "Bridge call absorbed");
            }
            Self::TransportUnavailable { .. }
            | Self::IdsExhausted { .. }
            | Self::ReadOnlyProperty { .. }
            | Self::Configuration(_)
            | Self::Dispatch(DispatchError::SpawnFailed { .. }) => {
                tracing::error!(component = %component, error = %self, "Bridge call absorbed");
            }
        }
    }
}

/// Result type alias for BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BridgeError::validation("fetch", "url must be a string");
        assert_eq!(
            err.to_string(),
            "Invalid arguments to fetch: url must be a string"
        );

        let err = BridgeError::UnknownId {
            kind: "fetch callback",
            id: 999,
        };
        assert_eq!(err.to_string(), "No fetch callback registered under id 999");
    }

    #[test]
    fn test_dispatch_error_conversion() {
        let err: BridgeError = DispatchError::TargetClosed {
            scope: "ui".to_string(),
        }
        .into();
        assert!(matches!(err, BridgeError::Dispatch(_)));
        assert_eq!(
            err.to_string(),
            "Dispatch error: Target thread 'ui' has shut down"
        );
    }

    #[test]
    fn test_log_absorbed_does_not_panic_without_subscriber() {
        BridgeError::TornDown.log_absorbed("test");
        BridgeError::TransportUnavailable {
            operation: "fetch".to_string(),
        }
        .log_absorbed("test");
    }
}
