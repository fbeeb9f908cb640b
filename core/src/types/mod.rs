pub mod operation;
pub mod outcome;
pub mod response;
pub mod signer_identity;

pub use operation::{KindTokens, Operation, OperationError, OperationKind};
pub use outcome::ChannelOutcome;
pub use response::{ResponseError, SignerResponse};
pub use signer_identity::SignerIdentity;
