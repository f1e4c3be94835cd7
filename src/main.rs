//! SEAO downloader binary entrypoint

use clap::Parser;
use seao_downloader::cli::{execute, Cli};
use seao_downloader::shutdown::{set_global_shutdown, ShutdownCoordinator};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_directive = if verbose {
        "seao_downloader=debug"
    } else {
        "seao_downloader=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let shutdown = ShutdownCoordinator::shared();
    set_global_shutdown(shutdown.clone());
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received, finishing in-flight downloads");
                shutdown.request_shutdown();
            }
        });
    }

    match execute(cli, shutdown).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!(error = %e, "Fatal error");
            std::process::exit(1);
        }
    }
}
