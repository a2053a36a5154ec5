use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use utils::version;

use crate::server::ServerOptions;

/// Exposes GPU utilization and memory usage as a table of a host query engine
#[derive(Debug, Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[arg(
        long,
        env = "OSQUERY_EXTENSION_SOCKET",
        value_hint = clap::ValueHint::FilePath,
        help = "Path of the host's extension manager socket"
    )]
    pub socket: PathBuf,

    #[arg(
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds to wait for registration and for each heartbeat acknowledgement"
    )]
    pub timeout: u64,

    #[arg(
        long,
        default_value_t = 3,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between heartbeat pings"
    )]
    pub interval: u64,

    #[arg(long, help = "Log at debug level unless RUST_LOG says otherwise")]
    pub verbose: bool,

    #[arg(
        long,
        default_value = "gpu_extension",
        help = "Extension name declared to the host"
    )]
    pub extension_name: String,

    #[arg(
        long,
        env = "NVML_LIB_PATH",
        value_hint = clap::ValueHint::FilePath,
        help = "Load NVML from this path instead of the default library lookup"
    )]
    pub nvml_lib_path: Option<PathBuf>,

    #[arg(
        long,
        env = "GPU_EXTENSION_LOG_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Also write logs to this file, rotated daily"
    )]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            name: self.extension_name.clone(),
            version: version::VERSION.clone(),
            socket_path: self.socket.clone(),
            timeout: Duration::from_secs(self.timeout),
            ping_interval: Duration::from_secs(self.interval),
        }
    }
}
