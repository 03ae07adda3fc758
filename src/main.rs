mod cli;

use damson::config;
use damson::metadata::tmdb::{project, RemoteGate, TmdbClient};
use damson::metadata::MetadataCache;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on the
    // verbose flag.
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "damson=trace".to_string()
        } else {
            "damson=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Search { query, json } => search(&query, json, cli.config.as_deref()).await,
        Commands::Fetch { tmdb_id, no_cache } => {
            fetch(tmdb_id, no_cache, cli.config.as_deref()).await
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("damson {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn client_from_config(config: &config::Config) -> Result<TmdbClient> {
    if config.tmdb.api_key.is_empty() {
        anyhow::bail!("no TMDB API key configured; set [tmdb] api_key in the config file");
    }
    Ok(TmdbClient::new(
        config.tmdb.api_key.clone(),
        config.tmdb.language.clone(),
        RemoteGate::new(),
    ))
}

async fn search(query: &str, json: bool, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let client = client_from_config(&config)?;

    let results = client.search(query).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    if results.is_empty() {
        println!("No results for \"{query}\"");
        return Ok(());
    }

    for result in &results {
        let year = result
            .release_date
            .map(|d| format!(" ({})", d.format("%Y")))
            .unwrap_or_default();
        println!(
            "{:>9}  {}{}",
            result.tmdb_id,
            result.title.as_deref().unwrap_or("<untitled>"),
            year
        );
    }

    Ok(())
}

async fn fetch(tmdb_id: i64, no_cache: bool, config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let client = client_from_config(&config)?;

    let raw = if no_cache {
        client.movie(tmdb_id).await?
    } else {
        MetadataCache::new(config.cache_dir.clone(), client)
            .fetch(tmdb_id)
            .await?
    };

    let metadata = project(&raw);
    println!("{}", serde_json::to_string_pretty(&metadata)?);

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Base URL: {}", config.base_url);
            println!("  Cache dir: {}", config.cache_dir.display());
            println!("  Sources: {}", config.sources.len());
            for source in &config.sources {
                println!(
                    "    {} -> {}",
                    source.folder_path.display(),
                    source.public_url
                );
            }
            println!(
                "  TMDB API key: {}",
                if config.tmdb.api_key.is_empty() {
                    "missing"
                } else {
                    "configured"
                }
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Cache dir: {}", config.cache_dir.display());
        }
    }

    Ok(())
}
