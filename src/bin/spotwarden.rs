//! Spotwarden node agent

use axum::{routing::get, Router};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info, warn};

use spotwarden::cloud::{update_ddns, AutoScalingClient, DefaultCredentialChain, MetadataClient};
use spotwarden::coordinator::{Collaborators, Coordinator};
use spotwarden::persistence::{Persistence, PersistenceConfig, TarGzCodec};
use spotwarden::retire::CommandRetirer;
use spotwarden::server::{kill_channel, LaunchSpec, ServerLauncher};
use spotwarden::storage::{BlobRouter, LocalStore, S3Config, S3Store};
use spotwarden::watch::{self, wait_for_shutdown_signal};
use spotwarden::{event, logging, WardenConfig};

#[derive(Parser)]
#[command(name = "spotwarden", version, about = "Game server lifecycle agent for spot instances")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Restore, run and supervise the game server (default)
    Run,
    /// Print an instance init script
    InitScript,
}

fn serve_metrics(addr: String) {
    tokio::spawn(async move {
        let app = Router::new().route(
            "/metrics",
            get(|| async { spotwarden::metrics::gather_lifecycle_metrics() }),
        );

        let listener = match tokio::net::TcpListener::bind(&addr).await {
            Ok(listener) => listener,
            Err(e) => {
                warn!(addr = %addr, error = %e, "metrics listener failed to bind");
                return;
            }
        };
        info!(addr = %addr, "metrics API listening");
        if let Err(e) = axum::serve(listener, app).await {
            warn!(error = %e, "metrics server error");
        }
    });
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = Arc::new(WardenConfig::from_env()?);
    info!(
        max_uptime_secs = config.max_uptime.as_secs(),
        max_idle_secs = config.max_idle.as_secs(),
        kill_mode = ?config.kill_mode,
        group = config.drain_group().unwrap_or("-"),
        "starting spotwarden"
    );

    if let Some(addr) = config.metrics_addr.clone() {
        serve_metrics(addr);
    }

    if let Some(url) = &config.ddns_url {
        update_ddns(url).await;
    }

    let metadata = MetadataClient::new()?;
    match metadata.instance_id().await {
        Ok(id) => info!(instance_id = %id, "running on instance"),
        Err(e) => warn!(error = %e, "instance id unavailable"),
    }
    let credentials = Arc::new(DefaultCredentialChain::new(metadata.clone()));
    let s3 = S3Store::new(
        S3Config {
            region: config.region.clone(),
            ..Default::default()
        },
        credentials.clone(),
    )?;
    let store = Arc::new(
        BlobRouter::new()
            .with_backend("s3", Arc::new(s3))
            .with_backend("file", Arc::new(LocalStore)),
    );
    let persistence = Arc::new(Persistence::new(
        store,
        Arc::new(TarGzCodec::default()),
        PersistenceConfig::from(config.as_ref()),
    ));

    let jar = persistence.fetch_server_binary().await?;
    let workdir = persistence.restore().await?;
    info!(dir = %workdir.path().display(), origin = ?workdir.origin(), "data directory ready");

    let process = ServerLauncher.start(&LaunchSpec::new(&config, jar), workdir.path())?;

    let (emitter, events) = event::channel();
    let (kill_switch, kills) = kill_channel();
    let watchers = watch::spawn_all(
        &config,
        &workdir,
        Arc::new(metadata),
        Box::new(process),
        kills,
        wait_for_shutdown_signal(),
        &emitter,
    );
    drop(emitter);

    let parts = Collaborators {
        snapshotter: persistence,
        cluster: Arc::new(AutoScalingClient::new(config.region.clone(), credentials)?),
        retirer: Arc::new(CommandRetirer::from_config(&config)),
        kill_switch,
    };
    let report = Coordinator::new(config, events, workdir, parts).run().await;
    watchers.abort_all();

    let report = report?;
    info!(
        trigger = report.trigger.map(|e| e.as_label()).unwrap_or("child_exit"),
        drain = ?report.drain,
        exit = %report.exit,
        data_saved = report.data_saved(),
        "shutdown complete"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if let Some(Command::InitScript) = cli.command {
        print!("{}", spotwarden::INIT_SCRIPT);
        return Ok(());
    }

    logging::init_logging();
    if let Err(e) = run().await {
        error!(error = %e, "spotwarden failed");
        return Err(e);
    }
    Ok(())
}
