mod cache;
mod collection;
mod config;
mod discogs;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::PathBuf;
use std::time::Duration;

use cache::MasterCache;
use collection::{project, CollectionService, ALL_FOLDER_ID};
use config::Config;
use discogs::client::DiscogsClient;

#[derive(Parser, Debug)]
#[command(name = "waxcrate")]
#[command(about = "Browse a Discogs collection with a persistent master-release cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/waxcrate/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Fetch a user's collection and print it as a table
  Collection {
    /// Discogs username (falls back to the configured one)
    username: Option<String>,
    /// Format label to filter by, e.g. "Vinyl"; "all" passes everything
    #[arg(short, long, default_value = project::ALL_FORMATS)]
    format: String,
  },
  /// List a user's collection folders
  Folders {
    username: Option<String>,
  },
  /// Resolve one master release, filling the cache on a miss
  Master {
    master_id: u64,
  },
  /// Show cache statistics
  CacheStats,
  /// Delete cache entries older than the given number of days
  CachePurge {
    #[arg(long, default_value_t = 90)]
    days: u64,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let config = Config::load(args.config.as_deref())?;
  let cache = MasterCache::open(config.cache.path.as_deref());

  match args.command {
    Command::Collection { username, format } => {
      let username = resolve_username(username, &config)?;
      let service = CollectionService::new(DiscogsClient::new(&config)?, cache);

      let load = service.load_collection(&username, ALL_FOLDER_ID).await?;
      if load.partial {
        eprintln!("warning: pagination cursor repeated; showing partial collection");
      }

      let items = project::project(&load.items, &format);
      println!("{:<40} {:<50} {:>6}  {}", "ARTIST", "TITLE", "YEAR", "FORMATS");
      for item in &items {
        println!(
          "{:<40} {:<50} {:>6}  {}",
          truncate(&item.artist_names(), 40),
          truncate(&item.title, 50),
          item
            .display_year()
            .map(|y| y.to_string())
            .unwrap_or_else(|| "-".to_string()),
          item.format_names(),
        );
      }
      println!("{} of {} items", items.len(), load.items.len());
    }

    Command::Folders { username } => {
      let username = resolve_username(username, &config)?;
      let service = CollectionService::new(DiscogsClient::new(&config)?, cache);

      for folder in service.folders(&username).await? {
        println!("{:>6}  {:<30} {} items", folder.id, folder.name, folder.count);
      }
    }

    Command::Master { master_id } => {
      let service = CollectionService::new(DiscogsClient::new(&config)?, cache);
      let master = service.ensure_master(master_id).await?;

      println!("{} - {} ({})", master.artists.join(", "), master.title, master.year);
      if !master.genres.is_empty() {
        println!("genres: {}", master.genres.join(", "));
      }
      if !master.styles.is_empty() {
        println!("styles: {}", master.styles.join(", "));
      }
    }

    Command::CacheStats => match cache.stats() {
      Some(stats) => {
        println!("entries: {}", stats.count);
        if let Some(oldest) = stats.oldest_cached_at {
          println!("oldest:  {}", oldest.to_rfc3339());
        }
        if let Some(newest) = stats.newest_cached_at {
          println!("newest:  {}", newest.to_rfc3339());
        }
      }
      None => println!("cache unavailable"),
    },

    Command::CachePurge { days } => {
      let removed = cache.purge_older_than(Duration::from_secs(days * 24 * 60 * 60));
      println!("removed {} entries older than {} days", removed, days);
    }
  }

  Ok(())
}

fn resolve_username(arg: Option<String>, config: &Config) -> Result<String> {
  arg
    .or_else(|| config.username.clone())
    .ok_or_else(|| color_eyre::eyre::eyre!("No username given and none configured"))
}

fn truncate(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let cut: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
  }
}
