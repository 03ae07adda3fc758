use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "damson")]
#[command(author, version, about = "Movie metadata and artwork manager")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search TMDB for movies matching a title
    Search {
        /// Title text to search for
        #[arg(required = true)]
        query: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch normalized metadata for a TMDB movie id
    Fetch {
        /// TMDB movie id
        #[arg(required = true)]
        tmdb_id: i64,

        /// Skip the on-disk cache and fetch fresh from TMDB
        #[arg(long)]
        no_cache: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
