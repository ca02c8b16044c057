use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "snapvault")]
#[command(about = "Capture and restore named snapshots of external state, grouped by profile")]
#[command(version)]
pub struct Cli {
    /// File whose contents are treated as the live state
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Override the data directory holding the database and registry
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Output as JSON instead of plain text
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage profiles
    Profile(ProfileArgs),

    /// Capture the live state as a new named snapshot
    Snapshot(SnapshotArgs),

    /// Apply a stored snapshot back onto the live state
    Restore(SnapshotArgs),

    /// Delete one snapshot, or every snapshot in the active profile
    Clear(ClearArgs),

    /// List snapshots in the active profile
    List,

    /// Show which snapshot the live state currently matches
    Current,
}

#[derive(Parser)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub action: ProfileAction,
}

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Switch the active profile, creating it if unknown
    Set { name: String },

    /// Print the active profile
    Get,

    /// List all known profiles
    List,

    /// Delete a profile and all its snapshots
    Delete { name: String },
}

#[derive(Parser)]
pub struct SnapshotArgs {
    /// Snapshot name, unique within the active profile
    pub name: String,
}

#[derive(Parser)]
pub struct ClearArgs {
    /// Snapshot to delete; omit to clear the entire active profile
    pub name: Option<String>,
}
