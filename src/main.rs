use anyhow::Result;
use clap::Parser;
use meetscribe::{
    app,
    cli::{handle_devices_command, handle_saved_list_command, Cli, CliCommand, SavedCommand},
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("meetscribe {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::Devices) => handle_devices_command(),
        Some(CliCommand::Saved(args)) => match args.command {
            SavedCommand::List => handle_saved_list_command(),
            SavedCommand::Retry { id } => app::run_saved_retry(&id).await,
        },
        Some(CliCommand::Record(args)) => app::run_record(args.title).await,
        None => app::run_record(None).await,
    }
}
