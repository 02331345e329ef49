use thiserror::Error;

use crate::core::value::{ChannelId, ProcessId, RefId, Value};

/// Unified error type for the pipl engine
#[derive(Debug, Error)]
pub enum PiplError {
    /// A builder call was given something it cannot accept
    #[error("Invalid argument to {operation}: {message}")]
    InvalidArgument { operation: String, message: String },

    /// Channel handle does not belong to this engine
    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    /// Process handle does not belong to this engine
    #[error("Unknown process: {0}")]
    UnknownProcess(ProcessId),

    /// Reference cell was released or never allocated
    #[error("Unknown reference: {0}")]
    UnknownReference(RefId),

    /// A name used in channel position did not hold a channel when its step fired
    #[error("Process {process} used {value} as a channel")]
    NotAChannel { process: ProcessId, value: Value },

    /// A function step reported failure
    #[error("Function step failed in process {process}")]
    Function {
        process: ProcessId,
        #[source]
        source: anyhow::Error,
    },

    /// Ready-queue reached its configured capacity
    #[error("Ready queue full: capacity {capacity} reached")]
    QueueFull { capacity: usize },

    /// Run exceeded the configured step guard
    #[error("Step limit exceeded: {limit} steps")]
    StepLimitExceeded { limit: u64 },

    /// Engine bookkeeping reached a state the protocol rules out
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Configuration failed validation
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Configuration document could not be parsed
    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_yaml::Error),
}

impl PiplError {
    /// Create an invalid-argument error for a builder operation
    pub fn invalid_argument<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::InvalidArgument {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an invariant violation error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration(message.into())
    }

    /// Errors raised by a builder or lookup call the caller got wrong, as
    /// opposed to anything that only surfaces while a run is draining
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::UnknownChannel(_) | Self::UnknownProcess(_)
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "argument",
            Self::UnknownChannel(_) | Self::UnknownProcess(_) | Self::UnknownReference(_) => {
                "lookup"
            }
            Self::NotAChannel { .. } => "type",
            Self::Function { .. } => "function",
            Self::QueueFull { .. } | Self::StepLimitExceeded { .. } => "resource",
            Self::InvariantViolation(_) => "internal",
            Self::Configuration(_) | Self::Config(_) => "configuration",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, PiplError>;

/// Macro for creating errors at builder call sites
#[macro_export]
macro_rules! pipl_error {
    (argument, $operation:expr, $message:expr) => {
        $crate::core::errors::PiplError::invalid_argument($operation, $message)
    };
    (internal, $message:expr) => {
        $crate::core::errors::PiplError::internal($message)
    };
    (configuration, $message:expr) => {
        $crate::core::errors::PiplError::configuration($message)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = PiplError::invalid_argument("add_send", "not a channel");
        assert!(matches!(err, PiplError::InvalidArgument { .. }));
        assert_eq!(err.category(), "argument");
        assert!(err.is_programmer_error());
    }

    #[test]
    fn test_error_display() {
        let err = PiplError::NotAChannel {
            process: ProcessId(3),
            value: Value::Int(7),
        };
        let display = err.to_string();
        assert!(display.contains("p3"));
        assert!(display.contains('7'));
        assert!(!err.is_programmer_error());
    }

    #[test]
    fn test_resource_errors_are_not_programmer_errors() {
        assert!(!PiplError::QueueFull { capacity: 4 }.is_programmer_error());
        assert!(!PiplError::StepLimitExceeded { limit: 10 }.is_programmer_error());
        assert_eq!(PiplError::StepLimitExceeded { limit: 10 }.category(), "resource");
    }

    #[test]
    fn test_function_error_keeps_source() {
        let err = PiplError::Function {
            process: ProcessId(0),
            source: anyhow::anyhow!("division by zero"),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("division by zero"));
    }

    #[test]
    fn test_macro() {
        let err = pipl_error!(argument, "add_read", "bad channel");
        assert!(matches!(err, PiplError::InvalidArgument { .. }));

        let err = pipl_error!(internal, "empty queue");
        assert_eq!(err.category(), "internal");
    }
}
