mod api;
mod app;
mod bindings;
mod cache;
mod commands;
mod config;
mod event;
mod logging;
mod query;
mod ui;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "campus-cache")]
#[command(about = "A terminal client for the campus recruitment portal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/campus-cache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Act as this user id instead of the configured one
  #[arg(short, long)]
  user: Option<u64>,

  /// Keep the cache in memory only
  #[arg(long)]
  no_persist: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = logging::init()?;

  let mut config = config::Config::load(args.config.as_deref())?;

  // Command line overrides
  if let Some(user) = args.user {
    config.user.id = user;
  }
  if args.no_persist {
    config.cache.persist = false;
  }

  tracing::info!(
    user = config.user.id,
    role = %config.user.role,
    persist = config.cache.persist,
    "Starting campus-cache"
  );

  let mut app = app::App::new(config)?;
  app.run().await?;

  Ok(())
}
