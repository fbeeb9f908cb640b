// ABOUTME: Discovery probe answering whether any app on the device handles the signer scheme
// ABOUTME: A failing package query means "not installed", never an error

use crate::platform::{Intent, PackageQuery};
use std::sync::Arc;

#[derive(Clone)]
pub struct DiscoveryProbe {
    packages: Arc<dyn PackageQuery>,
    scheme: String,
}

impl DiscoveryProbe {
    pub fn new(packages: Arc<dyn PackageQuery>, scheme: impl Into<String>) -> Self {
        Self {
            packages,
            scheme: scheme.into(),
        }
    }

    pub fn is_signer_available(&self) -> bool {
        !self.installed_signers().is_empty()
    }

    /// Package ids of every installed signer
    pub fn installed_signers(&self) -> Vec<String> {
        let probe = Intent::view(format!("{}:", self.scheme));
        match self.packages.query_intent_activities(&probe) {
            Ok(handlers) => handlers,
            Err(e) => {
                tracing::debug!(target: "nip55_core::discovery", "Package query failed, assuming no signer: {}", e);
                Vec::new()
            }
        }
    }
}
