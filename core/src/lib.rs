// ABOUTME: Core of the NIP-55 external signer bridge
// ABOUTME: Protocol types, platform seams, both transport channels and the negotiation engine

pub mod channel;
pub mod config;
pub mod directory;
pub mod discovery;
pub mod error;
pub mod external_signer;
pub mod negotiation;
pub mod platform;
pub mod sim;
pub mod types;

pub use config::BridgeConfig;
pub use error::BridgeError;
pub use external_signer::ExternalSigner;
pub use negotiation::{EngineState, NegotiationEngine, PendingReply, Submission};
