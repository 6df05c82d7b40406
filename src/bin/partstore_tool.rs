use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use partstore::{
    CollectionConfig, Container, ContainerState, Data, ReplicationOperation, StateTransferCodec,
    load_payload,
};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "partstore-tool")]
#[command(about = "Developer tooling for partstore state transfer payloads")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a container payload as JSON
    Inspect {
        path: PathBuf,
        /// Include item and reservation values
        #[arg(long)]
        values: bool,
    },
    /// Decode, rebuild and re-encode a container payload
    Verify { path: PathBuf },
    /// Summarize a partition replication frame
    Replication { path: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { path, values } => inspect(&path, values),
        Command::Verify { path } => verify(&path),
        Command::Replication { path } => replication(&path),
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    load_payload(path).with_context(|| format!("Failed to load '{}'", path.display()))
}

fn render_value(value: &Data) -> Value {
    match std::str::from_utf8(value.as_bytes()) {
        Ok(text) => json!(text),
        Err(_) => json!({ "bytes": value.len() }),
    }
}

fn state_json(state: &ContainerState, with_values: bool) -> Value {
    let items: Vec<Value> = state
        .items
        .iter()
        .map(|item| {
            if with_values {
                json!({ "id": item.id, "value": render_value(&item.value) })
            } else {
                json!({ "id": item.id, "bytes": item.value.len() })
            }
        })
        .collect();
    let pending: Vec<Value> = state
        .pending
        .iter()
        .map(|entry| {
            let mut record = json!({
                "id": entry.id,
                "transaction_id": entry.transaction_id.as_str(),
                "is_remove": entry.is_remove,
                "has_value": entry.value.is_some(),
            });
            if with_values {
                if let Some(value) = &entry.value {
                    record["value"] = render_value(value);
                }
            }
            record
        })
        .collect();

    json!({
        "name": state.name,
        "storage": format!("{:?}", state.storage).to_lowercase(),
        "max_id": state.max_id(),
        "item_count": state.items.len(),
        "pending_count": state.pending.len(),
        "items": items,
        "pending": pending,
    })
}

fn inspect(path: &Path, with_values: bool) -> Result<()> {
    let payload = read(path)?;
    let state = StateTransferCodec::decode(&payload)
        .with_context(|| format!("'{}' is not a valid container payload", path.display()))?;
    println!("{}", serde_json::to_string_pretty(&state_json(&state, with_values))?);
    Ok(())
}

fn verify(path: &Path) -> Result<()> {
    let payload = read(path)?;
    let state = StateTransferCodec::decode(&payload)?;
    let config = Arc::new(CollectionConfig::new(&state.name).with_storage(state.storage));
    let container: Container = StateTransferCodec::restore(0, config, &payload)?;
    let reencoded = StateTransferCodec::capture(&container)?;

    if reencoded != payload {
        return Err(anyhow!(
            "payload '{}' decodes but is not canonical ({} bytes vs {} re-encoded)",
            path.display(),
            payload.len(),
            reencoded.len()
        ));
    }
    println!(
        "OK: '{}' ({} items, {} reservations, watermark {})",
        state.name,
        container.size(),
        container.pending_count(),
        container.watermark()
    );
    Ok(())
}

fn replication(path: &Path) -> Result<()> {
    let frame = read(path)?;
    let operation = ReplicationOperation::decode(&frame)?;
    let containers = operation
        .payloads
        .iter()
        .map(|payload| StateTransferCodec::decode(payload).map(|state| state_json(&state, false)))
        .collect::<partstore::Result<Vec<_>>>()?;

    let summary = json!({
        "partition_id": operation.partition_id,
        "replica_index": operation.replica_index,
        "containers": containers,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
