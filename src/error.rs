use crate::model::TradeStatus;
use std::convert::Infallible;

#[derive(thiserror::Error, Debug)]
pub enum LifecycleError {
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("{subject} must be {expected} for this action, but is {actual}")]
    PreconditionFailed {
        subject: String,
        expected: String,
        actual: String,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Event chain of trade {trade_id} is broken at sequence {sequence}")]
    BrokenChain { trade_id: String, sequence: u64 },
    #[error("Storage failure")]
    Storage(#[from] sled::Error),
    #[error("Failed to encode record")]
    Encode(#[from] minicbor::encode::Error<Infallible>),
    #[error("Failed to decode record")]
    Decode(#[from] minicbor::decode::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl LifecycleError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn precondition(
        subject: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::PreconditionFailed {
            subject: subject.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// A trade was found in the wrong phase for the requested action.
    pub fn wrong_phase(trade_id: &str, expected: impl ToString, actual: TradeStatus) -> Self {
        Self::precondition(format!("Trade {trade_id}"), expected, actual)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, Self::PreconditionFailed { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
