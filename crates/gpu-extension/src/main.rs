use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use gpu_extension::config::Cli;
use gpu_extension::logging;
use gpu_extension::server::ExtensionServer;
use gpu_extension::table::GpuUsageTable;
use gpu_extension::telemetry::nvml::NvmlDriver;
use gpu_extension::telemetry::DeviceMetricsCollector;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio_util::sync::CancellationToken;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();
    let _guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    tracing::info!("Starting GPU telemetry extension {}", &**version::VERSION);

    let driver = match &cli.nvml_lib_path {
        Some(lib_path) => NvmlDriver::with_lib_path(lib_path),
        None => NvmlDriver::new(),
    };
    let collector = Arc::new(DeviceMetricsCollector::new(driver));

    let mut server = ExtensionServer::new(cli.server_options());
    server.register_plugin(GpuUsageTable::new(collector));

    spawn_signal_handler(server.shutdown_token())?;

    server.run().await.map_err(|e| anyhow::anyhow!("{e:?}"))?;
    Ok(())
}

/// Cancel `token` on SIGTERM or SIGINT.
fn spawn_signal_handler(token: CancellationToken) -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating graceful shutdown");
            }
            _ = token.cancelled() => return,
        }
        token.cancel();
    });
    Ok(())
}
