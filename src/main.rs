//! launchtrack - Launch telemetry service
//!
//! Serves launch listings and statistics over HTTP, backfilling from the
//! SpaceX API on demand and on a schedule.

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use launchtrack::app::App;
use launchtrack::cli::{Cli, Command, StartupConfig};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let startup = match StartupConfig::from_cli(&cli) {
        Ok(startup) => startup,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    startup.config.init_logging();
    info!("launchtrack starting");

    if let Err(e) = run(startup).await {
        error!(error = %e, "Fatal error");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    info!("launchtrack stopped");
}

async fn run(startup: StartupConfig) -> anyhow::Result<()> {
    let app = App::from_config(startup.config).context("failed to initialize service")?;

    let result = match startup.command {
        Command::Serve => serve(&app).await,
        Command::Refresh => refresh_once(&app).await,
    };

    app.close().await;
    result
}

async fn serve(app: &App) -> anyhow::Result<()> {
    let addr = app.config().bind_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Listening");

    let refresh = app.spawn_refresh();

    let served = axum::serve(listener, app.router())
        .with_graceful_shutdown(async {
            let _ = signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await
        .context("server failed");

    refresh.shutdown().await;
    served
}

async fn refresh_once(app: &App) -> anyhow::Result<()> {
    let processed = app
        .backfill()
        .ensure_fresh(true)
        .await
        .context("refresh failed")?;
    println!("Processed {} launches", processed);
    Ok(())
}
