// SQLite schema for the local document store.
//
// Users, workspaces and files form a strict ownership tree; credentials are
// kept apart from profiles so an account can exist before its profile.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE credentials (
    email           TEXT PRIMARY KEY COLLATE NOCASE,
    uid             TEXT NOT NULL UNIQUE,
    password_hash   TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE users (
    uid             TEXT PRIMARY KEY,
    name            TEXT NOT NULL,
    email           TEXT NOT NULL
);

CREATE TABLE workspaces (
    workspace_id    TEXT PRIMARY KEY,
    uid             TEXT NOT NULL REFERENCES users (uid) ON DELETE CASCADE,
    name            TEXT NOT NULL,
    created_at      TEXT NOT NULL,
    seq             INTEGER NOT NULL
);

CREATE TABLE files (
    file_id         TEXT PRIMARY KEY,
    workspace_id    TEXT NOT NULL REFERENCES workspaces (workspace_id),
    name            TEXT NOT NULL,
    extension       TEXT NOT NULL,
    contents        TEXT NOT NULL,
    source_path     TEXT NULL,
    seq             INTEGER NOT NULL
);

CREATE INDEX workspaces_owner_idx ON workspaces (uid, seq);
CREATE INDEX files_workspace_idx ON files (workspace_id, seq);
"#;

const MIGRATIONS: &[(i64, &str)] = &[(1, MIGRATION_V1_SQL)];

/// Open (or create) the store database and bring its schema up to date.
pub fn open(path: impl AsRef<Path>) -> Result<Connection> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("failed to create store parent directory `{}`", parent.display())
        })?;
    }

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open store at `{}`", path.display()))?;
    configure(conn)
}

/// In-memory database with the full schema. Used by tests.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory store")?;
    configure(conn)
}

fn configure(mut conn: Connection) -> Result<Connection> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        ",
    )
    .context("failed to configure sqlite pragmas for store")?;

    ensure_migration_table(&conn)?;
    apply_pending_migrations(&mut conn)?;
    Ok(conn)
}

pub fn schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_migrations", [], |row| row.get(0))
        .context("failed to read current schema version")
}

fn ensure_migration_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY,
            applied_at  TEXT NOT NULL
        );
        ",
    )
    .context("failed to ensure schema_migrations table exists")
}

fn apply_pending_migrations(conn: &mut Connection) -> Result<()> {
    let mut current_version = schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current_version {
            continue;
        }

        let tx = conn.transaction().context("failed to start migration transaction")?;
        tx.execute_batch(sql)
            .with_context(|| format!("failed to apply store migration v{version}"))?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, datetime('now'))",
            params![version],
        )
        .with_context(|| format!("failed to record migration v{version}"))?;
        tx.commit().with_context(|| format!("failed to commit migration v{version}"))?;
        current_version = *version;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED_TABLES: &[&str] =
        &["schema_migrations", "credentials", "users", "workspaces", "files"];

    #[test]
    fn open_creates_schema_and_records_latest_migration() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let conn = open(dir.path().join("nested/store.db")).expect("store should open");

        for table in EXPECTED_TABLES {
            let exists: i64 = conn
                .query_row(
                    "SELECT COUNT(1) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .expect("table existence query should succeed");
            assert_eq!(exists, 1, "expected `{table}` table to exist");
        }

        assert_eq!(schema_version(&conn).expect("schema version should be readable"), 1);
    }

    #[test]
    fn reopening_does_not_reapply_migrations() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("store.db");
        drop(open(&path).expect("first open should succeed"));

        let conn = open(&path).expect("second open should succeed");
        let applied: i64 = conn
            .query_row("SELECT COUNT(1) FROM schema_migrations", [], |row| row.get(0))
            .expect("migration count should be readable");
        assert_eq!(applied, 1);
    }

    #[test]
    fn foreign_keys_are_enforced() {
        let conn = open_in_memory().expect("in-memory store should open");
        let result = conn.execute(
            "INSERT INTO workspaces (workspace_id, uid, name, created_at, seq) \
             VALUES ('w', 'missing-user', 'ws', '2024-01-01T00:00:00Z', 0)",
            [],
        );
        assert!(result.is_err(), "workspace without an owner must be rejected");
    }
}
