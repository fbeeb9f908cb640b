// ABOUTME: nip55_sim: drives the bridge method channel against a simulated signer device
// ABOUTME: Reads JSON-lines method calls on stdin and writes one JSON result line per call to stdout

use dotenv::dotenv;
use nip55_bridge::{logging, MethodCall, MethodReply, MethodResult, SignerPlugin};
use nip55_core::directory::memory_store::MemoryStore;
use nip55_core::directory::sqlite_store::SqliteStore;
use nip55_core::directory::KeyValueStore;
use nip55_core::sim::SimulatedSigner;
use nip55_core::BridgeConfig;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const DEFAULT_SIGNER_PACKAGE: &str = "com.greenart7c3.nostrsigner";

#[derive(Debug, Deserialize)]
struct HarnessCall {
    method: String,
    #[serde(default)]
    arguments: Map<String, Value>,
    #[serde(default = "approve_by_default")]
    approve: bool,
    remember: Option<bool>,
}

fn approve_by_default() -> bool {
    true
}

fn render(method: &str, result: MethodResult) -> Value {
    match result {
        MethodResult::Success(value) => json!({"method": method, "ok": true, "value": value}),
        MethodResult::Error { code, message } => {
            json!({"method": method, "ok": false, "code": code, "message": message})
        }
        MethodResult::NotImplemented => json!({
            "method": method,
            "ok": false,
            "code": "NOT_IMPLEMENTED",
            "message": format!("{} is not implemented", method),
        }),
    }
}

async fn run(plugin: &SignerPlugin, device: &SimulatedSigner, call: HarnessCall) -> Value {
    if let Some(remember) = call.remember {
        device.set_remember(remember);
    }

    let reply = plugin
        .on_method_call(MethodCall {
            method: call.method.clone(),
            arguments: call.arguments,
        })
        .await;

    if let MethodReply::Deferred(pending) = &reply {
        tracing::info!(
            "{} is waiting for the simulated user ({})",
            call.method,
            pending.dispatch_id()
        );
        match device.answer_next(call.approve).await {
            Some(completion) => {
                plugin.on_activity_result(completion).await;
            }
            // Nothing reached the device, so nothing will ever answer
            None => plugin.engine().abandon_pending(),
        }
    }

    render(&call.method, reply.resolve().await)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    logging::init()?;

    let config_path = env::var("NIP55_CONFIG").ok().map(PathBuf::from);
    let config = BridgeConfig::load(config_path.as_deref())?;

    let store: Arc<dyn KeyValueStore> = match env::var("NIP55_DATABASE_URL") {
        Ok(url) => {
            tracing::info!("Persisting signer choice in {}", url);
            Arc::new(SqliteStore::connect(&url).await?)
        }
        Err(_) => Arc::new(MemoryStore::new()),
    };

    let package = env::var("NIP55_SIM_PACKAGE").unwrap_or_else(|_| DEFAULT_SIGNER_PACKAGE.to_string());
    let device = Arc::new(SimulatedSigner::generate(package, &config.scheme));
    tracing::info!(
        "Simulated signer {} holds {}",
        device.package(),
        device.public_key().to_hex()
    );

    let plugin = SignerPlugin::build(&config, store, device.clone(), device.clone());
    plugin.attach_activity(device.clone());
    tracing::info!("Bridge listening on channel {}", plugin.channel_name());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let output = match serde_json::from_str::<HarnessCall>(&line) {
            Ok(call) => run(&plugin, &device, call).await,
            Err(e) => {
                tracing::warn!("Unreadable harness line: {}", e);
                json!({"ok": false, "code": "INVALID_ARGUMENT", "message": e.to_string()})
            }
        };
        stdout.write_all(format!("{}\n", output).as_bytes()).await?;
        stdout.flush().await?;
    }

    plugin.detach_from_engine();
    tracing::info!("Bridge shut down");
    Ok(())
}
