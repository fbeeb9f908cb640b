// ABOUTME: Library interface for the NIP-55 bridge method channel
// ABOUTME: Exports the plugin surface and the logging bootstrap used by the harness

pub mod logging;
pub mod plugin;

pub use plugin::{MethodCall, MethodReply, MethodResult, SignerPlugin};
