use anyhow::Result;
use clap::Parser;
use duorec::cli::{
    handle_config_command, handle_devices_command, handle_mix_command, handle_record_command, Cli,
    CliCommand,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        CliCommand::Version => {
            println!("duorec {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        CliCommand::Devices(args) => handle_devices_command(args),
        CliCommand::Record(args) => handle_record_command(args).await,
        CliCommand::Mix(args) => handle_mix_command(args),
        CliCommand::Config => handle_config_command(),
    }
}
