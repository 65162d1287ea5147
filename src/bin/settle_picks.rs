//! One-shot settlement run
//!
//! ```bash
//! cargo run --bin settle-picks -- --db ./f1_picks.db
//! cargo run --bin settle-picks -- --dry-run
//! ```
//!
//! Prints the JSON summaries (or previews with `--dry-run`) on stdout.

use anyhow::Result;
use clap::Parser;
use f1_picks_backend::{
    config::{load_env, resolve_data_path, AppConfig},
    notify::notifier_from_config,
    settlement::SettlementEngine,
    store::PicksDb,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "settle-picks")]
#[command(about = "Grade every unsettled pick against official results")]
struct Args {
    /// SQLite database path (relative paths resolve from the crate root)
    #[arg(long, env = "PICKS_DB_PATH")]
    db: Option<String>,

    /// Grade and print without writing results or sending email
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    // Logs go to stderr so stdout stays machine readable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("f1_picks_backend=info,settle_picks=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::from_env()?;
    let db_path = match args.db {
        Some(path) => resolve_data_path(Some(path), "f1_picks.db"),
        None => config.database_path.clone(),
    };

    let db = PicksDb::new(&db_path)?;
    info!("💾 Settling picks in {}", db_path);

    let engine = SettlementEngine::new(
        Arc::new(db),
        notifier_from_config(&config)?,
        config.dashboard_url(),
    )
    .with_email_concurrency(config.email_max_concurrency);

    if args.dry_run {
        let previews = engine.preview_all_picks().await?;
        info!("🔍 Dry run: {} picks would settle", previews.len());
        println!("{}", serde_json::to_string_pretty(&previews)?);
    } else {
        let summaries = engine.settle_all_picks().await?;
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }

    Ok(())
}
