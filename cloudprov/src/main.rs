use clap::{Parser, Subcommand};
use cloudprov::{CloudProvider, LogLevel};
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use tfrecon::types::has_errors;
use tfrecon::{Config, Context, LifecycleController, ResourceDescriptor};

#[derive(Parser)]
#[command(name = "terraform-provider-cloudprov")]
#[command(about = "Reconcile device farm uploads and endpoint configurations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what apply would change
    Plan {
        /// JSON file listing {type, id, config} entries
        file: PathBuf,
    },
    /// Bring every listed resource in line with its configuration
    Apply {
        /// JSON file listing {type, id, config} entries
        file: PathBuf,
    },
    /// Delete every listed resource
    Destroy {
        /// JSON file listing {type, id} entries
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy)]
enum Command {
    Plan,
    Apply,
    Destroy,
}

impl Commands {
    fn split(self) -> (Command, PathBuf) {
        match self {
            Commands::Plan { file } => (Command::Plan, file),
            Commands::Apply { file } => (Command::Apply, file),
            Commands::Destroy { file } => (Command::Destroy, file),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Entry {
    #[serde(rename = "type")]
    type_name: String,
    id: Option<String>,
    #[serde(default)]
    config: Config,
}

async fn reconcile(
    ctx: &Context,
    descriptors: &HashMap<String, ResourceDescriptor>,
    command: Command,
    entry: Entry,
) -> (bool, serde_json::Value) {
    let Some(descriptor) = descriptors.get(&entry.type_name) else {
        tracing::error!("Unknown resource type {}", entry.type_name);
        return (
            false,
            json!({
                "type": entry.type_name,
                "id": entry.id,
                "error": format!("Unknown resource type: {}", entry.type_name),
            }),
        );
    };

    let mut controller = LifecycleController::new(descriptor.clone());
    if let Some(id) = &entry.id {
        controller = controller.with_id(id.clone());
    }

    let outcome = match command {
        Command::Plan => controller
            .plan(ctx, &entry.config)
            .await
            .map(|diff| json!({ "action": diff.action.to_string(), "changes": diff.changed_attributes() })),
        Command::Apply => controller
            .apply(ctx, &entry.config)
            .await
            .map(|result| {
                json!({
                    "action": result.action.to_string(),
                    "state": descriptor.schema.redact(&result.state),
                })
            }),
        Command::Destroy => controller
            .delete(ctx)
            .await
            .map(|()| json!({ "action": "delete" })),
    };

    match outcome {
        Ok(mut result) => {
            tracing::info!("{} {}: done", entry.type_name, command_name(command));
            result["type"] = json!(entry.type_name);
            result["id"] = json!(controller.id().or(entry.id.as_deref()));
            (true, result)
        }
        Err(e) => {
            tracing::error!("{} {} failed: {}", entry.type_name, command_name(command), e);
            (
                false,
                json!({ "type": entry.type_name, "id": entry.id, "error": e.to_string() }),
            )
        }
    }
}

fn command_name(command: Command) -> &'static str {
    match command {
        Command::Plan => "plan",
        Command::Apply => "apply",
        Command::Destroy => "destroy",
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(LogLevel::from_env()))
        .with_writer(std::io::stderr)
        .init();

    let (command, path) = Cli::parse().command.split();

    let entries: Vec<Entry> = serde_json::from_slice(&tokio::fs::read(&path).await?)?;

    let mut provider = CloudProvider::new();
    let diags = provider.configure(&HashMap::new());
    for diag in &diags {
        tracing::error!("{}", diag.summary);
    }
    if has_errors(&diags) {
        return Err("provider configuration failed".into());
    }
    let descriptors = provider.descriptors()?;

    let ctx = Context::new();
    let results = join_all(
        entries
            .into_iter()
            .map(|entry| reconcile(&ctx, &descriptors, command, entry)),
    )
    .await;

    let failed = results.iter().filter(|(ok, _)| !ok).count();
    let output: Vec<serde_json::Value> = results.into_iter().map(|(_, value)| value).collect();
    println!("{}", serde_json::to_string_pretty(&output)?);

    if failed > 0 {
        return Err(format!("{} of {} resources failed", failed, output.len()).into());
    }
    Ok(())
}
