use rusqlite::{Connection, params};
use std::fs;
use std::path::Path;
use crate::error::{Result, FollowGraphError};

/// Migrations compiled into the binary, used when no migrations directory is deployed
const EMBEDDED: &[(&str, &str)] = &[
    ("001_user_directory.sql", include_str!("../../migrations/001_user_directory.sql")),
    ("002_follow_edges.sql", include_str!("../../migrations/002_follow_edges.sql")),
    ("003_follow_counters.sql", include_str!("../../migrations/003_follow_counters.sql")),
];

/// Tables the service cannot run without
pub const REQUIRED_TABLES: &[&str] = &[
    "follow_counters",
    "follows_by_followee",
    "follows_by_follower",
    "schema_migrations",
    "users",
];

/// Pagination indexes created by 002
pub const REQUIRED_INDEXES: &[&str] = &["idx_by_followee_page", "idx_by_follower_page"];

/// Migration metadata
#[derive(Debug)]
struct Migration {
    version: u32,
    name: String,
    sql: String,
}

impl Migration {
    /// Parse "NNN_name.sql" into a migration
    fn parse(filename: &str, sql: &str) -> Result<Self> {
        let version_str = filename
            .split('_')
            .next()
            .ok_or_else(|| FollowGraphError::Config(format!("Invalid migration filename: {}", filename)))?;
        let version: u32 = version_str
            .parse()
            .map_err(|_| FollowGraphError::Config(format!("Invalid migration version: {}", version_str)))?;

        Ok(Self {
            version,
            name: filename.trim_end_matches(".sql").to_string(),
            sql: sql.to_string(),
        })
    }
}

fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

fn load_migrations(migrations_dir: &Path) -> Result<Vec<Migration>> {
    let mut files: Vec<_> = fs::read_dir(migrations_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    files.sort_by_key(|e| e.file_name());

    let mut migrations = Vec::with_capacity(files.len());
    for entry in files {
        let path = entry.path();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FollowGraphError::Config("Invalid migration filename".to_string()))?;
        let sql = fs::read_to_string(&path)?;
        migrations.push(Migration::parse(filename, &sql)?);
    }
    Ok(migrations)
}

fn embedded_migrations() -> Result<Vec<Migration>> {
    EMBEDDED
        .iter()
        .map(|(filename, sql)| Migration::parse(filename, sql))
        .collect()
}

fn apply(conn: &mut Connection, mut migrations: Vec<Migration>) -> Result<()> {
    ensure_migrations_table(conn)?;
    let applied = get_applied_migrations(conn)?;
    migrations.sort_by_key(|m| m.version);

    for migration in migrations {
        if applied.contains(&migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql).map_err(|e| {
            FollowGraphError::Config(format!("Failed to execute migration {}: {}", migration.name, e))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;
    }

    log::info!("All migrations completed");
    Ok(())
}

/// Run all pending migrations found in a directory
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<()> {
    let migrations = load_migrations(migrations_dir)?;
    apply(conn, migrations)
}

/// Run pending migrations from `migrations_dir` when it exists, else the embedded set
pub fn run_migrations_or_embedded(conn: &mut Connection, migrations_dir: &Path) -> Result<()> {
    if migrations_dir.is_dir() {
        run_migrations(conn, migrations_dir)
    } else {
        log::debug!("{} not found, using embedded migrations", migrations_dir.display());
        apply(conn, embedded_migrations()?)
    }
}

/// Names of schema objects of one type ("table", "index", ...)
pub fn schema_objects(conn: &Connection, object_type: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")?;
    let names = stmt
        .query_map([object_type], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}
