use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "duorec")]
#[command(about = "Record two audio inputs side by side and mix them", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// List input devices
    Devices(DevicesCliArgs),
    /// Record one or two devices until stopped, then mix them
    Record(RecordCliArgs),
    /// Mix two existing recordings into one file
    Mix(MixCliArgs),
    /// Show the config file location and effective settings
    Config,
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct DevicesCliArgs {
    /// Print the device list as JSON
    #[arg(long)]
    pub json: bool,
    /// Use built-in sine wave devices instead of audio hardware
    #[arg(long)]
    pub synthetic: bool,
}

#[derive(ClapArgs, Debug)]
pub struct RecordCliArgs {
    /// Device for slot 1, by name (overrides config)
    #[arg(long)]
    pub device1: Option<String>,
    /// Device for slot 2, by name (overrides config)
    #[arg(long)]
    pub device2: Option<String>,
    /// Directory for recordings (overrides config)
    #[arg(long)]
    pub savedir: Option<PathBuf>,
    /// Sample rate in Hz (overrides config)
    #[arg(long)]
    pub sample_rate: Option<u32>,
    /// Stop automatically after this many seconds
    #[arg(short, long)]
    pub duration: Option<f64>,
    /// Use built-in sine wave devices instead of audio hardware
    #[arg(long)]
    pub synthetic: bool,
}

#[derive(ClapArgs, Debug)]
pub struct MixCliArgs {
    /// First recording
    pub first: PathBuf,
    /// Recording overlaid onto the first
    pub second: PathBuf,
    /// Output file (default: first file name with `_1.` replaced by `.`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
