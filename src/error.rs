//! # Error Types
//!
//! Structured error handling for queues, worker trackers and the actor substrate,
//! using thiserror instead of string-typed errors.
//!
//! Errors fall into three groups:
//!
//! - **Caller errors** (`QueueClosed`, `AlreadyStarted`): terminal, returned directly
//!   to the caller and never retried.
//! - **Infrastructure errors** (state store, process dispatch, persistence): retried at
//!   the call site with bounded attempts; exhaustion becomes `RetriesExhausted`.
//! - **Liveness failures**: never raised. They are detected by heartbeat miss counting
//!   and handled by worker recovery.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for queue and worker operations
#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("Queue is closed: {queue}")]
    QueueClosed { queue: String },

    #[error("Worker already started: {worker_id}")]
    AlreadyStarted { worker_id: String },

    #[error("Retries exhausted: {operation} failed after {attempts} attempts: {message}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    #[error("Deferred handle dropped before completion: {handle_id}")]
    HandleDropped { handle_id: Uuid },

    #[error("State store error: {0}")]
    State(#[from] StateStoreError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl BrokerError {
    /// Create a queue closed error
    pub fn queue_closed(queue: impl Into<String>) -> Self {
        Self::QueueClosed {
            queue: queue.into(),
        }
    }

    /// Create an already started error
    pub fn already_started(worker_id: impl Into<String>) -> Self {
        Self::AlreadyStarted {
            worker_id: worker_id.into(),
        }
    }

    /// Create a retries exhausted error
    pub fn retries_exhausted(
        operation: impl Into<String>,
        attempts: u32,
        message: impl Into<String>,
    ) -> Self {
        Self::RetriesExhausted {
            operation: operation.into(),
            attempts,
            message: message.into(),
        }
    }

    /// Terminal errors that belong to the caller and must not be retried
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::QueueClosed { .. } | Self::AlreadyStarted { .. })
    }
}

/// Errors raised by durable state backends
#[derive(Error, Debug)]
pub enum StateStoreError {
    #[error("Backend error: {operation}: {message}")]
    Backend { operation: String, message: String },

    #[error("State serialization error for {key}: {message}")]
    Serialization { key: String, message: String },
}

impl StateStoreError {
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn serialization(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Serialization {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StateStoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::backend("sqlx", err.to_string())
    }
}

/// Errors reported by an external worker process
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    #[error("Task delivery to {location} failed: {message}")]
    DeliveryFailed { location: String, message: String },

    #[error("Worker process at {location} is unreachable")]
    Unreachable { location: String },
}

/// Errors reported by the result store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Failed to persist result of task {task}: {message}")]
    WriteFailed { task: String, message: String },
}

/// Errors reported by the bundle completion sink
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    #[error("Sink delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingRequired { field: String },
}

impl ConfigurationError {
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_required(field: impl Into<String>) -> Self {
        Self::MissingRequired {
            field: field.into(),
        }
    }
}

/// Result type alias for broker operations
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caller_error_classification() {
        assert!(BrokerError::queue_closed("orders").is_caller_error());
        assert!(BrokerError::already_started("worker-1").is_caller_error());
        assert!(!BrokerError::retries_exhausted("dispatch", 5, "boom").is_caller_error());
        assert!(!BrokerError::State(StateStoreError::backend("load", "timeout")).is_caller_error());
    }

    #[test]
    fn test_error_display() {
        let err = BrokerError::retries_exhausted("persist_result", 5, "disk full");
        assert_eq!(
            err.to_string(),
            "Retries exhausted: persist_result failed after 5 attempts: disk full"
        );
        assert_eq!(
            BrokerError::queue_closed("orders").to_string(),
            "Queue is closed: orders"
        );
    }

    #[test]
    fn test_nested_conversion() {
        let err: BrokerError = StateStoreError::backend("save", "connection reset").into();
        assert!(matches!(err, BrokerError::State(_)));
        assert!(err.to_string().contains("connection reset"));
    }
}
