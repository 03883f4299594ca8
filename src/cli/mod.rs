//! Command-line interface: argument definitions and subcommand handlers
//! that don't need the full recording service.

use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};

use crate::audio::MicSource;
use crate::recovery::RecoveryStore;

#[derive(Parser, Debug)]
#[command(name = "meetscribe")]
#[command(about = "Record meetings, transcribe them and generate structured notes", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Record a meeting until interrupted, then process it
    Record(RecordCliArgs),
    /// Manage recordings saved after failed processing
    Saved(SavedCliArgs),
    /// List available audio input devices
    Devices,
    /// Print version information
    Version,
}

#[derive(ClapArgs, Debug)]
pub struct RecordCliArgs {
    /// Meeting title used for filenames and notes
    #[arg(short, long)]
    pub title: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct SavedCliArgs {
    #[command(subcommand)]
    pub command: SavedCommand,
}

#[derive(Subcommand, Debug)]
pub enum SavedCommand {
    /// List recordings awaiting a retry
    List,
    /// Retry processing a saved recording
    Retry {
        /// Record id as shown by `saved list`
        id: String,
    },
}

pub fn handle_devices_command() -> Result<()> {
    let devices = MicSource::available_devices()?;
    if devices.is_empty() {
        println!("No audio input devices found");
        return Ok(());
    }
    for (i, name) in devices.iter().enumerate() {
        println!("{}: {}", i, name);
    }
    Ok(())
}

pub fn handle_saved_list_command() -> Result<()> {
    let store = RecoveryStore::open_default()?;
    let records = store.list()?;

    if records.is_empty() {
        println!("No saved recordings");
        return Ok(());
    }

    for record in records {
        println!(
            "{}\n  title: {}\n  saved: {}\n  retries: {}\n  error: {}",
            record.id,
            record.title,
            record.saved_at.to_rfc3339(),
            record.retry_count,
            record.last_error
        );
    }
    Ok(())
}
