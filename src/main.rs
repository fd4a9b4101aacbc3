use anyhow::Result;
use followgraph::config::Config;
use followgraph::db::{migrate, Db};
use followgraph::http::{AppState, HttpServer, TrustedHeaderAuthenticator};
use followgraph::{directory, events, ratelimit, reconcile, store};
use followgraph::{FollowService, QueryService};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.followgraph.log_level.as_str()),
    )
    .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("verify");

    match command {
        "serve" => run_http_server(config).await?,
        "verify" => run_schema_verification(config).await?,
        other => anyhow::bail!("unknown command '{}', expected serve or verify", other),
    }

    Ok(())
}

async fn open_db(config: &Config) -> Result<Db> {
    let db = Db::new(config.db_path());
    db.with_connection(|conn| migrate::run_migrations_or_embedded(conn, Path::new("migrations")))
        .await?;
    log::info!("Database ready at {}", config.db_path().display());
    Ok(db)
}

async fn run_http_server(config: Config) -> Result<()> {
    log::info!("Starting followgraph v{}", env!("CARGO_PKG_VERSION"));
    let db = open_db(&config).await?;

    let user_directory = directory::from_config(&config, &db)?;
    let event_sink = events::from_config(&config)?;
    let rate_limiter = ratelimit::from_config(&config);

    let follow = Arc::new(FollowService::new(
        db.clone(),
        user_directory.clone(),
        event_sink,
        rate_limiter,
    ));
    let query = Arc::new(QueryService::new(
        db.clone(),
        user_directory,
        config.pagination.clone(),
        config.lookup.clone(),
    ));

    if config.reconcile.sweep_interval_secs > 0 {
        log::info!(
            "Counter reconciliation sweep every {}s",
            config.reconcile.sweep_interval_secs
        );
        reconcile::spawn_sweep(
            db.clone(),
            Duration::from_secs(config.reconcile.sweep_interval_secs),
            config.reconcile.sweep_batch_size,
        );
    }

    let state = AppState {
        follow,
        query,
        db,
        authenticator: Arc::new(TrustedHeaderAuthenticator::new(&config.http_server.identity_header)),
    };
    let server = HttpServer::new(state, config.http_server.allowed_origins.clone());
    server.run(config.http_server.port).await?;
    Ok(())
}

/// Check schema objects, pragmas and dual-index consistency
async fn run_schema_verification(config: Config) -> Result<()> {
    let db = open_db(&config).await?;

    let mismatches = db
        .with_connection(|conn| {
            let tables = migrate::schema_objects(conn, "table")?;
            for table in migrate::REQUIRED_TABLES {
                if !tables.iter().any(|t| t.as_str() == *table) {
                    return Err(followgraph::FollowGraphError::Config(format!("missing table: {}", table)));
                }
            }
            let indexes = migrate::schema_objects(conn, "index")?;
            for index in migrate::REQUIRED_INDEXES {
                if !indexes.iter().any(|i| i.as_str() == *index) {
                    return Err(followgraph::FollowGraphError::Config(format!("missing index: {}", index)));
                }
            }

            let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
            if !journal_mode.eq_ignore_ascii_case("wal") {
                return Err(followgraph::FollowGraphError::Config(format!(
                    "journal mode is not WAL: {}",
                    journal_mode
                )));
            }

            let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
            if integrity != "ok" {
                return Err(followgraph::FollowGraphError::Config(format!(
                    "integrity check failed: {}",
                    integrity
                )));
            }

            let applied = migrate::get_applied_migrations(conn)?;
            log::info!("{} migrations applied", applied.len());
            store::dual_index_mismatches(conn)
        })
        .await?;

    if mismatches.is_empty() {
        log::info!("Schema verified, follow indexes consistent");
        Ok(())
    } else {
        for m in &mismatches {
            log::error!("{} -> {}: {}", m.follower_id, m.followee_id, m.problem);
        }
        anyhow::bail!("{} follow index mismatches", mismatches.len())
    }
}
