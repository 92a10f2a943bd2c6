//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth and the arbiter of the `(slug, creator)` and
//! `(geneset, ver_hash)` uniqueness rules.

mod catalog;
mod repository;

pub use catalog::*;
pub use repository::*;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::errors::AppError;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS organisms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            taxonomy_id INTEGER NOT NULL UNIQUE,
            common_name TEXT NOT NULL UNIQUE,
            scientific_name TEXT NOT NULL UNIQUE,
            slug TEXT NOT NULL UNIQUE
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entrezid INTEGER UNIQUE,
            systematic_name TEXT NOT NULL,
            standard_name TEXT,
            description TEXT NOT NULL DEFAULT '',
            organism_id INTEGER NOT NULL REFERENCES organisms(id),
            aliases TEXT NOT NULL DEFAULT '',
            obsolete INTEGER NOT NULL DEFAULT 0,
            weight REAL NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS crossref_dbs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE CHECK (name <> ''),
            url TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS crossrefs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            crossref_db_id INTEGER NOT NULL REFERENCES crossref_dbs(id),
            gene_id INTEGER NOT NULL REFERENCES genes(id),
            xrid TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS publications (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            pmid INTEGER UNIQUE,
            title TEXT NOT NULL,
            authors TEXT NOT NULL,
            date TEXT,
            journal TEXT NOT NULL,
            volume TEXT,
            pages TEXT,
            issue TEXT
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS genesets (
            id TEXT PRIMARY KEY,
            creator TEXT NOT NULL,
            title TEXT NOT NULL,
            slug TEXT NOT NULL,
            organism_id INTEGER NOT NULL REFERENCES organisms(id),
            abstract TEXT,
            public INTEGER NOT NULL DEFAULT 0,
            deleted INTEGER NOT NULL DEFAULT 0,
            fork_of TEXT REFERENCES genesets(id),
            tags TEXT,
            tip_item_count INTEGER,
            created_at TEXT NOT NULL,
            UNIQUE (slug, creator)
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Versions are append-only: the triggers refuse any rewrite.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS versions (
            id TEXT PRIMARY KEY,
            geneset_id TEXT NOT NULL REFERENCES genesets(id),
            creator TEXT NOT NULL,
            ver_hash TEXT NOT NULL,
            description TEXT,
            commit_date TEXT NOT NULL,
            parent_id TEXT REFERENCES versions(id),
            annotations TEXT NOT NULL,
            UNIQUE (geneset_id, ver_hash)
        );

        CREATE TRIGGER IF NOT EXISTS versions_no_update
        BEFORE UPDATE ON versions
        BEGIN
            SELECT RAISE(ABORT, 'versions cannot be modified after they are created');
        END;

        CREATE TRIGGER IF NOT EXISTS versions_no_delete
        BEFORE DELETE ON versions
        BEGIN
            SELECT RAISE(ABORT, 'versions cannot be modified after they are created');
        END;
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_genes_organism ON genes(organism_id);
        CREATE INDEX IF NOT EXISTS idx_genes_standard_name ON genes(standard_name);
        CREATE INDEX IF NOT EXISTS idx_genes_systematic_name ON genes(systematic_name);
        CREATE INDEX IF NOT EXISTS idx_crossrefs_xrid ON crossrefs(xrid);
        CREATE INDEX IF NOT EXISTS idx_crossrefs_gene ON crossrefs(gene_id);
        CREATE INDEX IF NOT EXISTS idx_genesets_creator ON genesets(creator);
        CREATE INDEX IF NOT EXISTS idx_versions_geneset_commit ON versions(geneset_id, commit_date);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Fixed-width UTC form, so text order equals chronological order.
pub(crate) fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Invalid stored timestamp {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2009, 3, 1, 0, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2014, 11, 20, 8, 30, 5).unwrap();
        let early_s = format_timestamp(&early);
        let late_s = format_timestamp(&late);
        assert_eq!(early_s, "2009-03-01T00:00:00.000000Z");
        assert!(early_s < late_s);
        assert_eq!(parse_timestamp(&late_s).unwrap(), late);
    }
}
