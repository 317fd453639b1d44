//! Domain errors for the rowcache data-access layer.

use thiserror::Error;

/// Boxed driver-level error kept as the cause of a wrapped failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by repositories and services.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DataError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Wrap a driver failure, keeping it as the error source.
    pub fn database(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Database {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

pub type DataResult<T> = Result<T, DataError>;

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "row".to_string(),
                id: "unknown".to_string(),
            },
            other => Self::database("Database query error", other),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors raised by cache backends and the cache store.
///
/// Callers on the data path log these and fall back to the relational store.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Operation against a key holding the wrong kind of value: {0}")]
    WrongType(String),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

impl CacheError {
    pub fn backend(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.code() == Some("WRONGTYPE") {
            return Self::WrongType(err.to_string());
        }
        Self::backend("Redis command failed", err)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised while encoding or decoding cache payloads.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("empty payload")]
    Empty,

    #[error("unknown payload format tag: {0:#04x}")]
    UnknownFormat(u8),

    #[error("value could not be encoded: {0}")]
    Encode(String),

    #[error("{format} payload could not be decoded: {message}")]
    Decode {
        format: PayloadFormat,
        message: String,
    },
}

/// Encoding of a cache payload body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    MessagePack,
    Json,
}

impl std::fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MessagePack => write!(f, "msgpack"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_database_error_keeps_cause() {
        let err = DataError::database("insert failed", std::io::Error::other("socket closed"));
        assert_eq!(err.to_string(), "Database error: insert failed");
        let source = err.source().expect("cause should be retained");
        assert_eq!(source.to_string(), "socket closed");
    }

    #[test]
    fn test_not_found_display() {
        let err = DataError::not_found("todos", 42);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "todos not found: 42");
    }
}
