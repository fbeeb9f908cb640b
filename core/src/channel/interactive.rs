// ABOUTME: Interactive channel: builds nostrsigner: invocations that show the signer UI
// ABOUTME: and parses the completion the OS delivers once the user answers

use crate::error::BridgeError;
use crate::platform::{
    Activity, ActivityResult, Intent, PlatformError, FLAG_ACTIVITY_CLEAR_TOP, FLAG_ACTIVITY_SINGLE_TOP,
};
use crate::types::{Operation, OperationKind, SignerIdentity};

pub const EXTRA_TYPE: &str = "type";
pub const EXTRA_PERMISSIONS: &str = "permissions";
pub const EXTRA_PUBKEY: &str = "pubkey";
pub const EXTRA_CURRENT_USER: &str = "current_user";
pub const EXTRA_ID: &str = "id";
pub const EXTRA_RESULT: &str = "result";
pub const EXTRA_PACKAGE: &str = "package";
pub const EXTRA_EVENT: &str = "event";

/// Fields read from an affirmed completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionReply {
    pub result: String,
    pub package: Option<String>,
    pub event: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InteractiveChannel {
    scheme: String,
    request_code: i32,
}

impl InteractiveChannel {
    pub fn new(scheme: impl Into<String>, request_code: i32) -> Self {
        Self {
            scheme: scheme.into(),
            request_code,
        }
    }

    /// Unaddressed invocations (`signer == None`) let the OS offer a chooser
    pub fn build_invocation(&self, operation: &Operation, signer: Option<&SignerIdentity>) -> Intent {
        let data = match operation.kind() {
            OperationKind::GetPublicKey => format!("{}:", self.scheme),
            _ => format!("{}:{}", self.scheme, operation.payload()),
        };
        let mut intent = Intent::view(data);
        intent.put_extra(EXTRA_TYPE, operation.kind().interactive_token());

        if let Some(permissions) = operation.permissions() {
            intent.put_extra(EXTRA_PERMISSIONS, permissions);
        }
        if let Some(pubkey) = operation.counterparty_key() {
            intent.put_extra(EXTRA_PUBKEY, pubkey);
        }
        if let Some(current_user) = operation.acting_user() {
            intent.put_extra(EXTRA_CURRENT_USER, current_user);
        }
        if !operation.correlation_id().is_empty() {
            intent.put_extra(EXTRA_ID, operation.correlation_id());
        }

        if let Some(signer) = signer {
            intent.package = Some(signer.to_string());
            intent.flags |= FLAG_ACTIVITY_SINGLE_TOP | FLAG_ACTIVITY_CLEAR_TOP;
        }
        intent
    }

    pub fn launch(&self, activity: &dyn Activity, intent: Intent) -> Result<(), BridgeError> {
        activity
            .start_activity_for_result(intent, self.request_code)
            .map_err(|e| match e {
                PlatformError::NoHandler(detail) => {
                    BridgeError::NoSigner(format!("No signer app found: {}", detail))
                }
                other => BridgeError::LaunchError(other.to_string()),
            })
    }

    /// Completions for other request codes belong to someone else
    pub fn owns(&self, completion: &ActivityResult) -> bool {
        completion.request_code == self.request_code
    }

    pub fn parse_completion(&self, completion: &ActivityResult) -> Result<CompletionReply, BridgeError> {
        if !completion.result_code.is_affirmed() {
            return Err(BridgeError::UserRejected);
        }
        let data = completion.data.as_ref().ok_or(BridgeError::NoData)?;
        let result = data
            .extra(EXTRA_RESULT)
            .ok_or(BridgeError::MalformedReply)?
            .to_string();
        Ok(CompletionReply {
            result,
            package: non_empty_extra(data, EXTRA_PACKAGE),
            event: non_empty_extra(data, EXTRA_EVENT),
            id: non_empty_extra(data, EXTRA_ID),
        })
    }
}

/// Correlation id carried by a completion, if any
pub fn reply_correlation_id(completion: &ActivityResult) -> Option<&str> {
    completion
        .data
        .as_ref()
        .and_then(|data| data.extra(EXTRA_ID))
        .filter(|id| !id.is_empty())
}

fn non_empty_extra(data: &Intent, key: &str) -> Option<String> {
    data.extra(key).filter(|v| !v.is_empty()).map(str::to_string)
}
