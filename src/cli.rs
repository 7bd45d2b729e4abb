use std::path::PathBuf;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// The configuration path to use.
    #[arg(short, long, value_name = "PATH")]
    pub config_path: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, clap::Subcommand)]
pub enum Command {
    /// Replay a recorded trace and print the events it produces.
    Replay {
        /// The JSON trace to replay.
        trace: PathBuf,
        /// Print one JSON object per event.
        #[arg(short, long)]
        json: bool,
    },
    /// List the devices found with the setup of a trace.
    Devices {
        trace: PathBuf,
        /// Print the devices as JSON.
        #[arg(short, long)]
        json: bool,
    },
    /// Check the input configuration for any errors.
    CheckConfiguration,
}
