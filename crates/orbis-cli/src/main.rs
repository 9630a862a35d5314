//! Orbis CLI - realtime and offline object-based rendering.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "orbis")]
#[command(author, version, about = "Object-based loudspeaker renderer", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render object signals from an audio device to a loudspeaker array
    Realtime(commands::realtime::RealtimeArgs),

    /// Render a multichannel WAV file of object signals
    Offline(commands::offline::OfflineArgs),

    /// List audio devices
    Devices(commands::devices::DevicesArgs),

    /// Load a loudspeaker array file and describe it
    Array(commands::array::ArrayArgs),

    /// Print the VBAP gains for a source direction
    Pan(commands::pan::PanArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Realtime(args) => commands::realtime::run(args),
        Commands::Offline(args) => commands::offline::run(args),
        Commands::Devices(args) => commands::devices::run(args),
        Commands::Array(args) => commands::array::run(args),
        Commands::Pan(args) => commands::pan::run(args),
    }
}
