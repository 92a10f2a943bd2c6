//! Geneset and version repository.
//!
//! Version appends and fork replays run inside a single transaction, so a
//! failed check leaves no partial chain behind.

use std::collections::HashMap;

use chrono::{DateTime, SubsecRound, Utc};
use sqlx::{Row, SqliteConnection, SqlitePool};

use super::{format_timestamp, parse_timestamp};
use crate::annotations::AnnotationSet;
use crate::chain;
use crate::errors::AppError;
use crate::models::{Geneset, UpdateGenesetRequest, Version};

const GENESET_COLUMNS: &str = "id, creator, title, slug, organism_id, abstract, public, deleted, \
     fork_of, tags, tip_item_count, created_at";

const VERSION_COLUMNS: &str =
    "id, geneset_id, creator, ver_hash, description, commit_date, parent_id, annotations";

/// A geneset row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewGeneset {
    pub creator: String,
    pub title: String,
    pub slug: String,
    pub organism_id: i64,
    pub abstract_text: Option<String>,
    pub public: bool,
    pub tags: Vec<String>,
    pub fork_of: Option<String>,
}

/// A version about to be appended to a geneset's chain.
#[derive(Debug, Clone)]
pub struct NewVersion {
    pub geneset_id: String,
    pub creator: String,
    pub annotations: AnnotationSet,
    /// Hash of the parent version inside the same geneset
    pub parent_hash: Option<String>,
    pub description: Option<String>,
    /// Defaults to now; bulk imports and forks pass an explicit date
    pub commit_date: Option<DateTime<Utc>>,
    /// Reject the append unless this is the current tip hash
    pub expected_tip: Option<String>,
}

/// Database repository for genesets and their version chains.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== GENESET OPERATIONS ====================

    /// Whether `(slug, creator)` is taken, deleted genesets included.
    pub async fn slug_taken(&self, creator: &str, slug: &str) -> Result<bool, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM genesets WHERE creator = ? AND slug = ?")
            .bind(creator)
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }

    /// Insert a geneset with no versions.
    pub async fn create_geneset(&self, new: &NewGeneset) -> Result<Geneset, AppError> {
        let mut conn = self.pool.acquire().await?;
        insert_geneset(&mut conn, new).await
    }

    /// Insert a geneset together with its first version, atomically.
    pub async fn create_geneset_with_version(
        &self,
        new: &NewGeneset,
        first: NewVersion,
    ) -> Result<(Geneset, Version), AppError> {
        let mut tx = self.pool.begin().await?;

        let mut geneset = insert_geneset(&mut tx, new).await?;
        let version = append_version(
            &mut tx,
            NewVersion {
                geneset_id: geneset.id.clone(),
                ..first
            },
        )
        .await?;
        geneset.tip_item_count = Some(version.annotations.distinct_gene_count() as i64);

        tx.commit().await?;
        Ok((geneset, version))
    }

    /// Insert a geneset and replay `history` (oldest first, each entry the
    /// parent of the next) into it, atomically.
    pub async fn create_geneset_with_history(
        &self,
        new: &NewGeneset,
        history: &[Version],
    ) -> Result<(Geneset, Vec<Version>), AppError> {
        let mut tx = self.pool.begin().await?;

        let mut geneset = insert_geneset(&mut tx, new).await?;
        let mut copied_hashes: HashMap<&str, String> = HashMap::new();
        let mut copies = Vec::with_capacity(history.len());

        for original in history {
            let parent_hash = match original.parent_id.as_deref() {
                Some(parent_id) => Some(copied_hashes.get(parent_id).cloned().ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Parent of version {} is not part of the copied history",
                        original.ver_hash
                    ))
                })?),
                None => None,
            };

            let copy = append_version(
                &mut tx,
                NewVersion {
                    geneset_id: geneset.id.clone(),
                    creator: original.creator.clone(),
                    annotations: original.annotations.clone(),
                    parent_hash,
                    description: original.description.clone(),
                    commit_date: Some(original.commit_date),
                    expected_tip: None,
                },
            )
            .await?;
            copied_hashes.insert(original.id.as_str(), copy.ver_hash.clone());
            copies.push(copy);
        }

        if let Some(tip) = copies.last() {
            geneset.tip_item_count = Some(tip.annotations.distinct_gene_count() as i64);
        }

        tx.commit().await?;
        Ok((geneset, copies))
    }

    /// Get a geneset by ID, deleted or not.
    pub async fn get_geneset(&self, id: &str) -> Result<Option<Geneset>, AppError> {
        let sql = format!("SELECT {} FROM genesets WHERE id = ?", GENESET_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(geneset_from_row))
    }

    /// Get a geneset by its creator-scoped slug, deleted or not.
    pub async fn get_geneset_by_slug(
        &self,
        creator: &str,
        slug: &str,
    ) -> Result<Option<Geneset>, AppError> {
        let sql = format!(
            "SELECT {} FROM genesets WHERE creator = ? AND slug = ?",
            GENESET_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(creator)
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(geneset_from_row))
    }

    /// List genesets that are not deleted, optionally for one creator.
    pub async fn list_genesets(&self, creator: Option<&str>) -> Result<Vec<Geneset>, AppError> {
        let sql = format!(
            "SELECT {} FROM genesets WHERE deleted = 0 AND (? IS NULL OR creator = ?) ORDER BY created_at, rowid",
            GENESET_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(creator)
            .bind(creator)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(geneset_from_row).collect())
    }

    /// Ids of every geneset, deleted ones included.
    pub async fn list_geneset_ids(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query("SELECT id FROM genesets ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    /// Update title, abstract, visibility and tags. The slug never changes.
    pub async fn update_geneset(
        &self,
        id: &str,
        request: &UpdateGenesetRequest,
    ) -> Result<Geneset, AppError> {
        let existing = self
            .get_geneset(id)
            .await?
            .filter(|g| !g.deleted)
            .ok_or_else(|| AppError::NotFound(format!("Geneset {} not found", id)))?;

        let title = request.title.clone().unwrap_or(existing.title.clone());
        let abstract_text = match &request.abstract_text {
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(text.clone()),
            None => existing.abstract_text.clone(),
        };
        let public = request.public.unwrap_or(existing.public);
        let tags = request.tags.clone().unwrap_or(existing.tags.clone());
        let tags_json = serde_json::to_string(&tags)?;

        sqlx::query("UPDATE genesets SET title = ?, abstract = ?, public = ?, tags = ? WHERE id = ?")
            .bind(&title)
            .bind(&abstract_text)
            .bind(public as i32)
            .bind(&tags_json)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(Geneset {
            title,
            abstract_text,
            public,
            tags,
            ..existing
        })
    }

    /// Mark a geneset deleted. The row stays so forks keep their lineage.
    pub async fn soft_delete_geneset(&self, id: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE genesets SET deleted = 1 WHERE id = ? AND deleted = 0")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Geneset {} not found", id)));
        }
        Ok(())
    }

    /// Overwrite the cached distinct gene count.
    pub async fn set_tip_item_count(&self, id: &str, count: Option<i64>) -> Result<(), AppError> {
        sqlx::query("UPDATE genesets SET tip_item_count = ? WHERE id = ?")
            .bind(count)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ==================== VERSION OPERATIONS ====================

    /// Append a version to a geneset's chain.
    pub async fn append_version(&self, new: NewVersion) -> Result<Version, AppError> {
        let mut tx = self.pool.begin().await?;
        let version = append_version(&mut tx, new).await?;
        tx.commit().await?;
        Ok(version)
    }

    /// The most recently committed version; ties go to the later insert.
    pub async fn get_tip(&self, geneset_id: &str) -> Result<Option<Version>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_tip(&mut conn, geneset_id).await
    }

    /// Get a version of a geneset by hash.
    pub async fn get_version_by_hash(
        &self,
        geneset_id: &str,
        ver_hash: &str,
    ) -> Result<Option<Version>, AppError> {
        let mut conn = self.pool.acquire().await?;
        fetch_version_by_hash(&mut conn, geneset_id, ver_hash).await
    }

    pub async fn count_versions(&self, geneset_id: &str) -> Result<i64, AppError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM versions WHERE geneset_id = ?")
            .bind(geneset_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// All versions of a geneset, oldest first.
    pub async fn list_versions(&self, geneset_id: &str) -> Result<Vec<Version>, AppError> {
        let sql = format!(
            "SELECT {} FROM versions WHERE geneset_id = ? ORDER BY commit_date, rowid",
            VERSION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(geneset_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(version_from_row).collect()
    }
}

// Transaction-scoped helpers

async fn insert_geneset(conn: &mut SqliteConnection, new: &NewGeneset) -> Result<Geneset, AppError> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = format_timestamp(&Utc::now());
    let tags_json = serde_json::to_string(&new.tags)?;

    sqlx::query(
        "INSERT INTO genesets (id, creator, title, slug, organism_id, abstract, public, deleted, fork_of, tags, tip_item_count, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, NULL, ?)",
    )
    .bind(&id)
    .bind(&new.creator)
    .bind(&new.title)
    .bind(&new.slug)
    .bind(new.organism_id)
    .bind(&new.abstract_text)
    .bind(new.public as i32)
    .bind(&new.fork_of)
    .bind(&tags_json)
    .bind(&now)
    .execute(&mut *conn)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::DuplicateSlug {
            slug: new.slug.clone(),
        },
        other => other,
    })?;

    Ok(Geneset {
        id,
        creator: new.creator.clone(),
        title: new.title.clone(),
        slug: new.slug.clone(),
        organism_id: new.organism_id,
        abstract_text: new.abstract_text.clone(),
        public: new.public,
        deleted: false,
        fork_of: new.fork_of.clone(),
        tags: new.tags.clone(),
        tip_item_count: None,
        created_at: now,
    })
}

async fn append_version(conn: &mut SqliteConnection, new: NewVersion) -> Result<Version, AppError> {
    let row = sqlx::query("SELECT COUNT(*) AS n FROM versions WHERE geneset_id = ?")
        .bind(&new.geneset_id)
        .fetch_one(&mut *conn)
        .await?;
    let existing: i64 = row.get("n");

    let parent = match new.parent_hash.as_deref() {
        Some(hash) => Some(
            fetch_version_by_hash(conn, &new.geneset_id, hash)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Parent version {} not found in geneset {}",
                        hash, new.geneset_id
                    ))
                })?,
        ),
        None => None,
    };
    chain::check_parent(&new.geneset_id, existing, parent.as_ref())?;

    if let Some(expected) = new.expected_tip.as_deref() {
        let tip = fetch_tip(conn, &new.geneset_id).await?;
        let current = tip.as_ref().map(|v| v.ver_hash.as_str());
        if current != Some(expected) {
            return Err(AppError::Conflict(format!(
                "Tip moved: expected {}, current {}",
                expected,
                current.unwrap_or("none")
            )));
        }
    }

    let ver_hash = chain::compute_ver_hash(
        parent.as_ref().map(|p| p.ver_hash.as_str()),
        &new.annotations,
    );
    let id = uuid::Uuid::new_v4().to_string();
    // Same precision as format_timestamp.
    let commit_date = new.commit_date.unwrap_or_else(Utc::now).trunc_subsecs(6);
    let annotations_json = serde_json::to_string(&new.annotations)?;

    sqlx::query(
        "INSERT INTO versions (id, geneset_id, creator, ver_hash, description, commit_date, parent_id, annotations) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&new.geneset_id)
    .bind(&new.creator)
    .bind(&ver_hash)
    .bind(&new.description)
    .bind(format_timestamp(&commit_date))
    .bind(parent.as_ref().map(|p| p.id.as_str()))
    .bind(&annotations_json)
    .execute(&mut *conn)
    .await
    .map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict(format!(
            "Version {} already exists in geneset {}",
            ver_hash, new.geneset_id
        )),
        other => other,
    })?;

    let tip_item_count = new.annotations.distinct_gene_count() as i64;
    sqlx::query("UPDATE genesets SET tip_item_count = ? WHERE id = ?")
        .bind(tip_item_count)
        .bind(&new.geneset_id)
        .execute(&mut *conn)
        .await?;

    Ok(Version {
        id,
        geneset_id: new.geneset_id,
        creator: new.creator,
        ver_hash,
        description: new.description,
        commit_date,
        parent_id: parent.map(|p| p.id),
        annotations: new.annotations,
    })
}

async fn fetch_tip(conn: &mut SqliteConnection, geneset_id: &str) -> Result<Option<Version>, AppError> {
    let sql = format!(
        "SELECT {} FROM versions WHERE geneset_id = ? ORDER BY commit_date DESC, rowid DESC LIMIT 1",
        VERSION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(geneset_id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(version_from_row).transpose()
}

async fn fetch_version_by_hash(
    conn: &mut SqliteConnection,
    geneset_id: &str,
    ver_hash: &str,
) -> Result<Option<Version>, AppError> {
    let sql = format!(
        "SELECT {} FROM versions WHERE geneset_id = ? AND ver_hash = ?",
        VERSION_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(geneset_id)
        .bind(ver_hash)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(version_from_row).transpose()
}

// Helper functions for row conversion

fn geneset_from_row(row: &sqlx::sqlite::SqliteRow) -> Geneset {
    let public: i32 = row.get("public");
    let deleted: i32 = row.get("deleted");
    let tags_str: Option<String> = row.get("tags");
    Geneset {
        id: row.get("id"),
        creator: row.get("creator"),
        title: row.get("title"),
        slug: row.get("slug"),
        organism_id: row.get("organism_id"),
        abstract_text: row.get("abstract"),
        public: public != 0,
        deleted: deleted != 0,
        fork_of: row.get("fork_of"),
        tags: tags_str.map(|s| parse_json_array(&s)).unwrap_or_default(),
        tip_item_count: row.get("tip_item_count"),
        created_at: row.get("created_at"),
    }
}

fn version_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Version, AppError> {
    let commit_date: String = row.get("commit_date");
    let annotations: String = row.get("annotations");
    Ok(Version {
        id: row.get("id"),
        geneset_id: row.get("geneset_id"),
        creator: row.get("creator"),
        ver_hash: row.get("ver_hash"),
        description: row.get("description"),
        commit_date: parse_timestamp(&commit_date)?,
        parent_id: row.get("parent_id"),
        annotations: serde_json::from_str(&annotations)?,
    })
}

fn parse_json_array(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}
