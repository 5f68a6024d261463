use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(name = "pgfn")]
#[command(about = "Declarative PostgreSQL function migrations")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity level (can be used multiple times)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file
    #[arg(long, global = true, default_value = "pgfn.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Generate a sample configuration file
    Init,

    /// Create the function state table
    Setup {
        /// PostgreSQL connection string
        #[arg(long)]
        connection_string: Option<String>,
    },

    /// Write migrations for functions that changed since the last run
    MakeMigrations {
        /// Name suffix for the generated migrations
        #[arg(long)]
        name: Option<String>,

        /// Show what would be written without touching files or the state table
        #[arg(long)]
        dry_run: bool,

        /// PostgreSQL connection string
        #[arg(long)]
        connection_string: Option<String>,

        /// Directory containing the per-app migration folders
        #[arg(long)]
        migrations_root: Option<PathBuf>,

        /// App for definitions that don't name one
        #[arg(long)]
        default_app: Option<String>,

        /// Command to run afterwards, even if generation fails
        #[arg(last = true, value_name = "CMD")]
        then: Vec<String>,
    },

    /// List migrations per app in dependency order
    ShowMigrations {
        /// Only show this app
        #[arg(long)]
        app: Option<String>,

        /// Directory containing the per-app migration folders
        #[arg(long)]
        migrations_root: Option<PathBuf>,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
