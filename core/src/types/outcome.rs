// ABOUTME: Tagged result of one channel attempt
// ABOUTME: Rejected short-circuits negotiation while Unavailable and TransportError fall back

use crate::types::signer_identity::SignerIdentity;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelOutcome {
    Success {
        result: String,
        /// Signed event echoed by the signer, if any
        event: Option<String>,
        /// Signer that produced the result, when the channel knows it
        signer: Option<SignerIdentity>,
    },
    Rejected,
    Unavailable,
    TransportError(String),
}

impl ChannelOutcome {
    /// Whether the engine should try the interactive channel next
    pub fn should_fall_back(&self) -> bool {
        matches!(
            self,
            ChannelOutcome::Unavailable | ChannelOutcome::TransportError(_)
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChannelOutcome::Success { .. } => "success",
            ChannelOutcome::Rejected => "rejected",
            ChannelOutcome::Unavailable => "unavailable",
            ChannelOutcome::TransportError(_) => "transport_error",
        }
    }
}
