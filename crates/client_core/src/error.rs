use std::fmt;

use shared::{DraftError, OrderId, OrderStatus, RecordError};
use thiserror::Error;

/// Failure reported by an [`OrderTransport`](crate::transport::OrderTransport).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request never produced a usable response: connect, timeout,
    /// encode or decode failures on this side of the wire.
    #[error("{message}")]
    Client { message: String, transient: bool },
    #[error("server responded with status {status}: {message}")]
    Server { status: u16, message: String },
    #[error("order {0} not found")]
    NotFound(OrderId),
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl TransportError {
    pub fn client(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
            transient: true,
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Client {
            message: message.into(),
            transient: false,
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Only connection-level failures, 5xx and 429 are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Client { transient, .. } => *transient,
            Self::Server { status, .. } => *status >= 500 || *status == 429,
            Self::NotFound(_) | Self::Rejected(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    Client,
    Server { status: u16 },
}

/// Transport failure as surfaced to store callers. The rendered message tells
/// a client-side failure apart from a server-side one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkError {
    pub origin: ErrorOrigin,
    pub message: String,
}

impl NetworkError {
    pub fn client(message: impl Into<String>) -> Self {
        Self {
            origin: ErrorOrigin::Client,
            message: message.into(),
        }
    }

    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self {
            origin: ErrorOrigin::Server { status },
            message: message.into(),
        }
    }
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.origin {
            ErrorOrigin::Client => write!(f, "Error: {}", self.message),
            ErrorOrigin::Server { status } => write!(f, "Code: {status}: {}", self.message),
        }
    }
}

impl std::error::Error for NetworkError {}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error("order {0} not found")]
    NotFound(OrderId),
    #[error("invalid order: {0}")]
    Validation(String),
    #[error("illegal status transition for order {id}: {from} -> {to}")]
    IllegalTransition {
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl From<TransportError> for StoreError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Client { message, .. } => Self::Network(NetworkError::client(message)),
            TransportError::Server { status, message } => {
                Self::Network(NetworkError::server(status, message))
            }
            TransportError::NotFound(id) => Self::NotFound(id),
            TransportError::Rejected(message) => Self::Validation(message),
        }
    }
}

impl From<DraftError> for StoreError {
    fn from(err: DraftError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<RecordError> for StoreError {
    fn from(err: RecordError) -> Self {
        Self::Network(NetworkError::client(format!(
            "malformed order payload: {err}"
        )))
    }
}
