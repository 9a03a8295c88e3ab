//! Error types for the ChainTrace decode pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the ABI parameter codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("parameter {index} ('{name}'): {reason}")]
    Parameter {
        index: usize,
        name: String,
        reason: String,
    },

    #[error("invalid ABI type '{ty}': {reason}")]
    InvalidType { ty: String, reason: String },

    #[error("invalid ABI JSON: {reason}")]
    InvalidAbi { reason: String },

    #[error("type mismatch for '{name}': expected {expected}")]
    TypeMismatch { name: String, expected: String },

    #[error("arity mismatch: expected {expected} values, got {got}")]
    ArityMismatch { expected: usize, got: usize },
}

/// Errors returned by external collaborators (node RPC, ABI sources, price feeds).
///
/// `NotFound` means the data does not exist; `Unavailable`/`Timeout` mean the
/// collaborator could not be reached and the lookup may succeed later.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("{what} not found")]
    NotFound { what: String },

    #[error("{service} unavailable: {reason}")]
    Unavailable { service: String, reason: String },

    #[error("{service} timed out after {ms}ms")]
    Timeout { service: String, ms: u64 },

    #[error("execution reverted: {reason}")]
    Execution { reason: String },
}

impl ProviderError {
    /// True for connectivity failures (as opposed to absent data or reverts).
    pub fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Errors from a metadata store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Corrupt record: {reason}")]
    Corrupt { reason: String },

    #[error("Store lock poisoned")]
    Poisoned,
}

/// Errors building a call tree from tracer output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceError {
    #[error("trace has no root frame")]
    MissingRoot,

    #[error("frame {trace_address:?}: {reason}")]
    InvalidFrame {
        trace_address: Vec<usize>,
        reason: String,
    },

    #[error("unknown call kind '{kind}'")]
    UnknownCallKind { kind: String },
}

/// Request-level error taxonomy surfaced by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoderError {
    #[error("invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("upstream unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("ambiguous signature for {address}: {candidates} anonymous events")]
    AmbiguousSignature { address: String, candidates: usize },
}

impl DecoderError {
    pub fn status(&self) -> ErrorStatus {
        match self {
            Self::InvalidInput { .. } => ErrorStatus::InvalidInput,
            Self::NotFound { .. } => ErrorStatus::NotFound,
            Self::UpstreamUnavailable { .. } => ErrorStatus::UpstreamUnavailable,
            Self::Decode(_) => ErrorStatus::DecodeFailure,
            Self::AmbiguousSignature { .. } => ErrorStatus::AmbiguousSignature,
        }
    }

    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            status: self.status(),
            message: self.to_string(),
        }
    }
}

impl From<ProviderError> for DecoderError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound { what } => Self::NotFound { what },
            other => Self::UpstreamUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

impl From<TraceError> for DecoderError {
    fn from(err: TraceError) -> Self {
        Self::InvalidInput {
            field: "trace",
            reason: err.to_string(),
        }
    }
}

/// Coarse classification of a [`DecoderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatus {
    InvalidInput,
    NotFound,
    UpstreamUnavailable,
    DecodeFailure,
    AmbiguousSignature,
}

/// Serializable error description carried in partial results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub status: ErrorStatus,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_map_to_taxonomy() {
        let nf: DecoderError = ProviderError::NotFound {
            what: "transaction 0xab".into(),
        }
        .into();
        assert_eq!(nf.status(), ErrorStatus::NotFound);

        let down: DecoderError = ProviderError::Timeout {
            service: "node".into(),
            ms: 500,
        }
        .into();
        assert_eq!(down.status(), ErrorStatus::UpstreamUnavailable);
        assert!(down.to_string().contains("timed out after 500ms"));
    }

    #[test]
    fn decode_error_names_parameter() {
        let err = DecoderError::from(DecodeError::Parameter {
            index: 1,
            name: "amount".into(),
            reason: "data too short".into(),
        });
        let record = err.to_record();
        assert_eq!(record.status, ErrorStatus::DecodeFailure);
        assert!(record.message.contains("parameter 1 ('amount')"));
    }
}
