use color_eyre::eyre::{self, eyre, WrapErr};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use wsinfra_common::{InfraConfig, RuntimeIdentity};
use wsinfra_docker::{DockerEngine, DockerEnvironment, InfraContext, StopDetector};

const USAGE: &str = "usage:
  wsinfra machines <workspace-id>
  wsinfra labels <environment.json> <workspace-id> [env-name] [owner-id]";

/// Stop detection runs elsewhere; this process only reports the handle calls.
struct LoggingStopDetector;

impl StopDetector for LoggingStopDetector {
    fn start_detection(&self, container_id: &str, machine_name: &str) {
        debug!(%container_id, machine = %machine_name, "Stop detection requested");
    }

    fn stop_detection(&self, container_id: &str) {
        debug!(%container_id, "Stop detection released");
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = InfraConfig::from_env().wrap_err("Invalid WSINFRA_* configuration")?;

    let engine = DockerEngine::connect_with_local_defaults()
        .wrap_err("Failed to connect to the Docker daemon")?;
    let context = InfraContext::new(config, Arc::new(engine), Arc::new(LoggingStopDetector));

    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["machines", workspace_id] => list_machines(&context, workspace_id).await,
        ["labels", path, workspace_id, rest @ ..] if rest.len() <= 2 => {
            let env_name = rest.first().copied().unwrap_or("default");
            let owner_id = rest.get(1).copied().unwrap_or_default();
            let identity = RuntimeIdentity::new(*workspace_id, env_name, owner_id);
            print_labels(&context, path, &identity).await
        }
        _ => Err(eyre!("{USAGE}")),
    }
}

async fn list_machines(context: &InfraContext, workspace_id: &str) -> eyre::Result<()> {
    info!(%workspace_id, "Collecting workspace machines");
    let machines = context
        .machine_creator
        .create_workspace_machines(workspace_id)
        .await?;

    let report: serde_json::Map<String, serde_json::Value> = machines
        .iter()
        .map(|(name, machine)| {
            let servers: serde_json::Map<String, serde_json::Value> = machine
                .servers()
                .iter()
                .map(|(server, resolved)| (server.clone(), json!(resolved)))
                .collect();
            (
                name.clone(),
                json!({
                    "container": machine.container(),
                    "image": machine.image(),
                    "status": machine.status(),
                    "attributes": machine.attributes(),
                    "servers": servers,
                }),
            )
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn print_labels(
    context: &InfraContext,
    path: &str,
    identity: &RuntimeIdentity,
) -> eyre::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("Failed to read environment file {path}"))?;
    let mut env: DockerEnvironment =
        serde_json::from_str(&raw).wrap_err("Environment file is not valid JSON")?;

    context.provision(&mut env, identity)?;
    info!(
        workspace_id = %identity.workspace_id,
        machines = env.machines.len(),
        "Environment provisioned"
    );

    let labels: serde_json::Map<String, serde_json::Value> = env
        .containers
        .iter()
        .map(|(name, container)| (name.clone(), json!(container.labels)))
        .collect();
    println!("{}", serde_json::to_string_pretty(&labels)?);
    Ok(())
}
