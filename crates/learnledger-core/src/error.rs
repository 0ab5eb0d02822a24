use learnledger_store::StoreError;

use crate::lifecycle::TaskEvent;
use crate::model::TaskStatus;

#[derive(thiserror::Error, Debug)]
pub enum LedgerError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{key}: cannot {event} a task in status {from}")]
    InvalidTransition {
        key: String,
        from: TaskStatus,
        event: TaskEvent,
    },
    #[error("store failure: {0}")]
    Collaborator(#[from] StoreError),
    #[error("cannot decode {key}: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("blocking task failed: {0}")]
    Join(String),
}

impl LedgerError {
    pub(crate) fn not_found(kind: &'static str, key: &str) -> Self {
        LedgerError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        LedgerError::InvalidArgument(msg.into())
    }
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
