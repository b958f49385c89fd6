use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use inviterole_core::{JoinSerializer, RoleMapper, RoleMapping};
use inviterole_gateway::{GatewayConfig, GatewayListener};
use inviterole_rest::RestClient;
use tokio::sync::{mpsc, Notify};
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod roles;
mod runner;

/// Gateway events buffered between the gateway and the serializer.
const EVENT_QUEUE_CAPACITY: usize = 256;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    // A missing dotenv file is fine; the real environment may carry everything.
    match &args.env_file {
        Some(path) => {
            dotenvy::from_filename(path).with_context(|| format!("failed to load {path}"))?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("inviterole=info")),
        )
        .init();

    let settings = config::Config::load(&args.config)?.validate()?;
    let guild_id = settings.guild_id;

    let rest = Arc::new(RestClient::new(&settings.token, &settings.api_base)?);
    let guild_roles = rest
        .list_roles(guild_id)
        .await
        .with_context(|| format!("failed to list roles of guild {guild_id}"))?;
    let resolved = roles::resolve_roles(&settings.roles, &guild_roles)?;

    let mapping = RoleMapping::from_entries(resolved).context("invalid invite mapping")?;
    let mapper = Arc::new(RoleMapper::new(mapping));

    tracing::info!("Invite mappings for guild {}:", guild_id);
    for (code, role) in mapper.mapping().iter() {
        tracing::info!("  {} -> {} ({})", code, role.name, role.id);
    }

    let serializer = Arc::new(JoinSerializer::new(rest.clone(), mapper, settings.retry));
    match serializer.prime(guild_id).await {
        Ok(snapshot) if snapshot.is_empty() => {
            tracing::warn!("guild has no invites yet, joins cannot be attributed until one is created")
        }
        Ok(snapshot) => tracing::info!(invites = snapshot.len(), "captured initial invite snapshot"),
        Err(e) => tracing::warn!(
            error = %e,
            "could not capture initial invites, the first join will only seed a baseline"
        ),
    }

    let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    let shutdown = Arc::new(Notify::new());

    let listener = GatewayListener::new(
        GatewayConfig::new(settings.gateway_url, settings.token),
        event_tx,
    );
    let mut gateway = tokio::spawn(listener.run(shutdown.clone()));
    let runner = tokio::spawn(runner::run_joins(
        serializer.clone(),
        event_rx,
        guild_id,
        shutdown.clone(),
    ));

    let gateway_result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down (ctrl-c)...");
            None
        }
        finished = &mut gateway => Some(finished),
    };

    serializer.shutdown();
    shutdown.notify_waiters();
    if let Err(e) = runner.await {
        tracing::error!(error = %e, "join runner panicked");
    }

    match gateway_result {
        Some(finished) => finished.context("gateway task panicked")??,
        None => {
            if tokio::time::timeout(std::time::Duration::from_secs(5), &mut gateway)
                .await
                .is_err()
            {
                gateway.abort();
            }
        }
    }

    tracing::info!("stopped");
    Ok(())
}
