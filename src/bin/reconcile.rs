use anyhow::Result;
use clap::Parser;
use followgraph::config::Config;
use followgraph::db::{migrate, Db};
use followgraph::reconcile;
use followgraph::UserId;
use std::path::Path;

/// Recompute cached follow counters from the edge tables
#[derive(Parser, Debug)]
#[command(name = "reconcile")]
struct Args {
    /// Reconcile a single user
    #[arg(long, conflicts_with = "all")]
    user: Option<String>,

    /// Sweep every user with edges or a counter row
    #[arg(long)]
    all: bool,

    /// Users read per sweep batch (defaults to reconcile.sweep_batch_size)
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = Config::load()?;
    let db = Db::new(config.db_path());
    db.with_connection(|conn| migrate::run_migrations_or_embedded(conn, Path::new("migrations")))
        .await?;

    match (args.user, args.all) {
        (Some(raw), _) => {
            let user = UserId::parse(&raw)?;
            let report = reconcile::reconcile_counters(&db, &user).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        (None, true) => {
            let batch = args.batch_size.unwrap_or(config.reconcile.sweep_batch_size).max(1);
            let report = reconcile::reconcile_all(&db, batch).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if report.failures > 0 {
                anyhow::bail!("{} users failed to reconcile", report.failures);
            }
        }
        (None, false) => anyhow::bail!("pass --user <id> or --all"),
    }
    Ok(())
}
