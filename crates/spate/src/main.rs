use clap::{Parser, Subcommand};
use spate::config::Config;
use spate::controller::Controller;
use spate::docker::{DockerClient, SwarmInspectResult};
use spate::metrics::Metrics;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "spate", about = "Horizontal autoscaler for Docker Swarm services")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    config: Config,
}

#[derive(Subcommand)]
enum Command {
    /// Print orchestrator connection info and exit.
    Info,
    /// Print build metadata and exit.
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("spate={}", cli.config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Some(Command::Version) => {
            println!("{}", spate::version::build_info());
            return Ok(());
        }
        Some(Command::Info) => {
            let docker = DockerClient::new(&cli.config.docker_socket)?;
            print_info(&docker).await?;
            return Ok(());
        }
        None => {}
    }

    run(cli.config).await
}

async fn print_info(docker: &DockerClient) -> Result<(), Box<dyn std::error::Error>> {
    let info = docker.system_info().await?;
    let version = docker.server_version().await?;
    println!("Docker ID:       {}", info.id.unwrap_or_default());
    println!("Docker version:  {}", version.version.unwrap_or_default());

    match docker.swarm_inspect().await? {
        SwarmInspectResult::Manager(swarm) => {
            println!("Swarm role:      manager");
            println!("Swarm cluster ID: {}", swarm.id.unwrap_or_default());
        }
        SwarmInspectResult::Worker => {
            println!("Swarm role:      worker");
        }
        SwarmInspectResult::NotInSwarm => {
            println!("Swarm role:      not in a swarm");
        }
    }
    Ok(())
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    config.validate().map_err(|e| -> Box<dyn std::error::Error> { e.into() })?;

    info!(socket = %config.docker_socket, "connecting to docker daemon");
    let docker: Arc<dyn spate::docker::Orchestrator> =
        Arc::new(DockerClient::new(&config.docker_socket).map_err(|e| {
            error!(error = %e, "failed to connect to docker daemon");
            e
        })?);

    let metrics = Arc::new(Metrics::new());

    let defaults = Arc::new(config.label_defaults());
    let controller = Arc::new(Controller::new(
        docker,
        defaults,
        config.controller_period(),
        metrics.clone(),
    ));

    let app = spate::metrics::router(metrics);
    let listen_address = normalize_listen_address(&config.listen_address);
    let listener = tokio::net::TcpListener::bind(&listen_address).await?;
    info!(address = %listen_address, "metrics endpoint listening");

    let server = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "metrics server exited with an error");
        }
    });

    if let Err(errs) = controller.start().await {
        error!(errors = ?errs, "controller failed to start");
        return Err("controller failed to start".into());
    }
    info!("controller started");

    shutdown_signal().await;

    info!("shutting down");
    controller.stop().await;
    server.abort();

    Ok(())
}

fn normalize_listen_address(addr: &str) -> String {
    if let Some(port) = addr.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else {
        addr.to_string()
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}
