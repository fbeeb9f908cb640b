// ABOUTME: Error taxonomy surfaced to the host, one stable code per failure kind
// ABOUTME: Silent channel transport faults never reach this type, they become fallbacks

use crate::types::operation::OperationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("Activity not available")]
    NoActivity,
    #[error("{0}")]
    NoSigner(String),
    #[error("Failed to launch signer: {0}")]
    LaunchError(String),
    #[error("User rejected the request")]
    UserRejected,
    #[error("No data returned from signer")]
    NoData,
    #[error("Signer reply is missing the result")]
    MalformedReply,
    #[error("Another signer request is already waiting for the user")]
    RequestInFlight,
    #[error("Signer request was abandoned before a reply arrived")]
    Abandoned,
    #[error("Signer replied to request {reply:?} while {pending:?} was waiting")]
    CorrelationMismatch { pending: String, reply: String },
    #[error("Signer bridge is detached from its engine")]
    Detached,
    #[error("Failed to persist signer: {0}")]
    Storage(String),
}

impl BridgeError {
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::InvalidArgument(_) => "INVALID_ARGUMENT",
            BridgeError::NoActivity => "NO_ACTIVITY",
            BridgeError::NoSigner(_) => "NO_SIGNER",
            BridgeError::LaunchError(_) => "LAUNCH_ERROR",
            BridgeError::UserRejected => "USER_REJECTED",
            BridgeError::NoData => "NO_DATA",
            BridgeError::MalformedReply => "MALFORMED_REPLY",
            BridgeError::RequestInFlight => "REQUEST_IN_FLIGHT",
            BridgeError::Abandoned => "ABANDONED",
            BridgeError::CorrelationMismatch { .. } => "CORRELATION_MISMATCH",
            BridgeError::Detached => "ENGINE_DETACHED",
            BridgeError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub(crate) fn signer_not_set() -> Self {
        BridgeError::NoSigner("Signer package name not set. Call getPublicKey first.".into())
    }
}

impl From<OperationError> for BridgeError {
    fn from(e: OperationError) -> Self {
        BridgeError::InvalidArgument(e.to_string())
    }
}
