//! Catalog repository: organisms, genes, cross-references and publications.
//!
//! These tables are filled by external loaders; the version chain only reads
//! them to translate identifiers.

use sqlx::{Row, SqlitePool};

use crate::errors::AppError;
use crate::models::{
    slugify, CreateGeneRequest, CreateOrganismRequest, CrossRef, CrossRefDb, Gene, NewPublication,
    Organism, Publication,
};
use crate::resolver::IdentifierKind;

const GENE_COLUMNS: &str = "id, entrezid, systematic_name, standard_name, description, \
     organism_id, aliases, obsolete, weight";

const PUBLICATION_COLUMNS: &str = "id, pmid, title, authors, date, journal, volume, pages, issue";

/// Repository for the identifier database.
#[derive(Clone)]
pub struct Catalog {
    pool: SqlitePool,
}

impl Catalog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ==================== ORGANISM OPERATIONS ====================

    /// Register an organism. The slug is derived from the scientific name.
    pub async fn create_organism(
        &self,
        request: &CreateOrganismRequest,
    ) -> Result<Organism, AppError> {
        let slug = slugify(&request.scientific_name, usize::MAX);
        let result = sqlx::query(
            "INSERT INTO organisms (taxonomy_id, common_name, scientific_name, slug) VALUES (?, ?, ?, ?)",
        )
        .bind(request.taxonomy_id)
        .bind(&request.common_name)
        .bind(&request.scientific_name)
        .bind(&slug)
        .execute(&self.pool)
        .await?;

        Ok(Organism {
            id: result.last_insert_rowid(),
            taxonomy_id: request.taxonomy_id,
            common_name: request.common_name.clone(),
            scientific_name: request.scientific_name.clone(),
            slug,
        })
    }

    /// Get an organism by ID.
    pub async fn get_organism(&self, id: i64) -> Result<Option<Organism>, AppError> {
        let row = sqlx::query(
            "SELECT id, taxonomy_id, common_name, scientific_name, slug FROM organisms WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(organism_from_row))
    }

    // ==================== GENE OPERATIONS ====================

    /// Add a gene.
    pub async fn create_gene(&self, request: &CreateGeneRequest) -> Result<Gene, AppError> {
        if request.systematic_name.trim().is_empty() {
            return Err(AppError::Validation(
                "Genes must have a systematic name".to_string(),
            ));
        }

        let result = sqlx::query(
            "INSERT INTO genes (entrezid, systematic_name, standard_name, description, organism_id, aliases, obsolete, weight) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(request.entrezid)
        .bind(&request.systematic_name)
        .bind(&request.standard_name)
        .bind(&request.description)
        .bind(request.organism_id)
        .bind(&request.aliases)
        .bind(request.obsolete as i32)
        .bind(request.weight)
        .execute(&self.pool)
        .await?;

        Ok(Gene {
            id: result.last_insert_rowid(),
            entrezid: request.entrezid,
            systematic_name: request.systematic_name.clone(),
            standard_name: request.standard_name.clone(),
            description: request.description.clone(),
            organism_id: request.organism_id,
            aliases: request.aliases.clone(),
            obsolete: request.obsolete,
            weight: request.weight,
        })
    }

    /// Fetch genes by internal id, in id order. Unknown ids are skipped.
    pub async fn get_genes(&self, ids: &[i64]) -> Result<Vec<Gene>, AppError> {
        let sql = format!(
            "SELECT {} FROM genes WHERE id IN (SELECT value FROM json_each(?)) ORDER BY id",
            GENE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(serde_json::to_string(ids)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(gene_from_row).collect())
    }

    /// Candidate gene ids for one token of the given kind.
    ///
    /// `organism_id` narrows the search when set. Returns every match so the
    /// caller can tell unique, ambiguous and missing tokens apart.
    pub async fn find_gene_ids(
        &self,
        kind: &IdentifierKind,
        token: &str,
        organism_id: Option<i64>,
    ) -> Result<Vec<i64>, AppError> {
        match kind {
            IdentifierKind::Internal => match token.trim().parse::<i64>() {
                Ok(id) => self.gene_ids_where("id = ?", id, organism_id).await,
                Err(_) => Ok(Vec::new()),
            },
            IdentifierKind::Entrez => match token.trim().parse::<i64>() {
                Ok(entrezid) => {
                    self.gene_ids_where("entrezid = ?", entrezid, organism_id)
                        .await
                }
                Err(_) => Ok(Vec::new()),
            },
            IdentifierKind::StandardName => {
                self.gene_ids_where("standard_name = ?", token.to_string(), organism_id)
                    .await
            }
            IdentifierKind::SystematicName => {
                self.gene_ids_where("systematic_name = ?", token.to_string(), organism_id)
                    .await
            }
            IdentifierKind::Symbol => {
                let by_standard = self
                    .gene_ids_where("standard_name = ?", token.to_string(), organism_id)
                    .await?;
                if !by_standard.is_empty() {
                    return Ok(by_standard);
                }
                self.gene_ids_where("systematic_name = ?", token.to_string(), organism_id)
                    .await
            }
            IdentifierKind::CrossRef(db_name) => {
                let rows = sqlx::query(
                    r#"SELECT DISTINCT c.gene_id AS id
                       FROM crossrefs c
                       JOIN crossref_dbs d ON d.id = c.crossref_db_id
                       JOIN genes g ON g.id = c.gene_id
                       WHERE d.name = ? AND c.xrid = ? AND (? IS NULL OR g.organism_id = ?)
                       ORDER BY c.gene_id"#,
                )
                .bind(db_name)
                .bind(token)
                .bind(organism_id)
                .bind(organism_id)
                .fetch_all(&self.pool)
                .await?;

                Ok(rows.iter().map(|row| row.get("id")).collect())
            }
        }
    }

    async fn gene_ids_where<T>(
        &self,
        predicate: &str,
        value: T,
        organism_id: Option<i64>,
    ) -> Result<Vec<i64>, AppError>
    where
        T: 'static + Send + for<'q> sqlx::Encode<'q, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
    {
        let sql = format!(
            "SELECT id FROM genes WHERE {} AND (? IS NULL OR organism_id = ?) ORDER BY id",
            predicate
        );
        let rows = sqlx::query(&sql)
            .bind(value)
            .bind(organism_id)
            .bind(organism_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|row| row.get("id")).collect())
    }

    /// External identifiers of the given genes in the target kind, as
    /// `(gene_id, identifier)` pairs. Genes without an identifier of that
    /// kind are absent; an unknown cross-reference database yields nothing.
    pub async fn gene_identifiers(
        &self,
        kind: &IdentifierKind,
        gene_ids: &[i64],
    ) -> Result<Vec<(i64, String)>, AppError> {
        let ids_json = serde_json::to_string(gene_ids)?;

        let column = match kind {
            IdentifierKind::CrossRef(db_name) => {
                let rows = sqlx::query(
                    r#"SELECT c.gene_id AS gene_id, c.xrid AS identifier
                       FROM crossrefs c
                       JOIN crossref_dbs d ON d.id = c.crossref_db_id
                       WHERE d.name = ? AND c.gene_id IN (SELECT value FROM json_each(?))
                       ORDER BY c.gene_id, c.xrid"#,
                )
                .bind(db_name)
                .bind(&ids_json)
                .fetch_all(&self.pool)
                .await?;
                return Ok(identifier_pairs(&rows));
            }
            IdentifierKind::Internal => "CAST(id AS TEXT)",
            IdentifierKind::Entrez => "CAST(entrezid AS TEXT)",
            IdentifierKind::Symbol => "COALESCE(NULLIF(standard_name, ''), systematic_name)",
            IdentifierKind::StandardName => "standard_name",
            IdentifierKind::SystematicName => "systematic_name",
        };

        let sql = format!(
            "SELECT id AS gene_id, {} AS identifier FROM genes \
             WHERE id IN (SELECT value FROM json_each(?)) ORDER BY id",
            column
        );
        let rows = sqlx::query(&sql).bind(&ids_json).fetch_all(&self.pool).await?;

        Ok(identifier_pairs(&rows))
    }

    // ==================== CROSS-REFERENCE OPERATIONS ====================

    /// Register a cross-reference database. Blank names are rejected.
    pub async fn create_crossref_db(&self, name: &str, url: &str) -> Result<CrossRefDb, AppError> {
        if name.trim().is_empty() {
            return Err(AppError::Validation(
                "Cross-reference database name must not be blank".to_string(),
            ));
        }

        let result = sqlx::query("INSERT INTO crossref_dbs (name, url) VALUES (?, ?)")
            .bind(name)
            .bind(url)
            .execute(&self.pool)
            .await?;

        Ok(CrossRefDb {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            url: url.to_string(),
        })
    }

    /// Attach an identifier from `db_name` to a gene.
    pub async fn create_crossref(
        &self,
        db_name: &str,
        gene_id: i64,
        xrid: &str,
    ) -> Result<CrossRef, AppError> {
        let db_id: i64 = sqlx::query("SELECT id FROM crossref_dbs WHERE name = ?")
            .bind(db_name)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get("id"))
            .ok_or_else(|| {
                AppError::NotFound(format!("Cross-reference database {} not found", db_name))
            })?;

        let result =
            sqlx::query("INSERT INTO crossrefs (crossref_db_id, gene_id, xrid) VALUES (?, ?, ?)")
                .bind(db_id)
                .bind(gene_id)
                .bind(xrid)
                .execute(&self.pool)
                .await?;

        Ok(CrossRef {
            id: result.last_insert_rowid(),
            crossref_db_id: db_id,
            gene_id,
            xrid: xrid.to_string(),
        })
    }

    // ==================== PUBLICATION OPERATIONS ====================

    /// Stored publications with any of the given PMIDs.
    pub async fn get_publications_by_pmids(
        &self,
        pmids: &[i64],
    ) -> Result<Vec<Publication>, AppError> {
        let sql = format!(
            "SELECT {} FROM publications WHERE pmid IN (SELECT value FROM json_each(?)) ORDER BY pmid",
            PUBLICATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(serde_json::to_string(pmids)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(publication_from_row).collect())
    }

    /// Stored publications by internal id.
    pub async fn get_publications(&self, ids: &[i64]) -> Result<Vec<Publication>, AppError> {
        let sql = format!(
            "SELECT {} FROM publications WHERE id IN (SELECT value FROM json_each(?)) ORDER BY id",
            PUBLICATION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(serde_json::to_string(ids)?)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(publication_from_row).collect())
    }

    /// Insert a publication, or refresh the stored record with the same PMID.
    pub async fn upsert_publication(
        &self,
        publication: &NewPublication,
    ) -> Result<Publication, AppError> {
        let row = sqlx::query(
            r#"INSERT INTO publications (pmid, title, authors, date, journal, volume, pages, issue)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT (pmid) DO UPDATE SET
                   title = excluded.title, authors = excluded.authors, date = excluded.date,
                   journal = excluded.journal, volume = excluded.volume,
                   pages = excluded.pages, issue = excluded.issue
               RETURNING id"#,
        )
        .bind(publication.pmid)
        .bind(&publication.title)
        .bind(&publication.authors)
        .bind(&publication.date)
        .bind(&publication.journal)
        .bind(&publication.volume)
        .bind(&publication.pages)
        .bind(&publication.issue)
        .fetch_one(&self.pool)
        .await?;

        Ok(Publication {
            id: row.get("id"),
            pmid: Some(publication.pmid),
            title: publication.title.clone(),
            authors: publication.authors.clone(),
            date: publication.date.clone(),
            journal: publication.journal.clone(),
            volume: publication.volume.clone(),
            pages: publication.pages.clone(),
            issue: publication.issue.clone(),
        })
    }
}

// Helper functions for row conversion

fn organism_from_row(row: &sqlx::sqlite::SqliteRow) -> Organism {
    Organism {
        id: row.get("id"),
        taxonomy_id: row.get("taxonomy_id"),
        common_name: row.get("common_name"),
        scientific_name: row.get("scientific_name"),
        slug: row.get("slug"),
    }
}

fn gene_from_row(row: &sqlx::sqlite::SqliteRow) -> Gene {
    let obsolete: i32 = row.get("obsolete");
    Gene {
        id: row.get("id"),
        entrezid: row.get("entrezid"),
        systematic_name: row.get("systematic_name"),
        standard_name: row.get("standard_name"),
        description: row.get("description"),
        organism_id: row.get("organism_id"),
        aliases: row.get("aliases"),
        obsolete: obsolete != 0,
        weight: row.get("weight"),
    }
}

fn identifier_pairs(rows: &[sqlx::sqlite::SqliteRow]) -> Vec<(i64, String)> {
    rows.iter()
        .filter_map(|row| {
            let identifier: Option<String> = row.get("identifier");
            identifier
                .filter(|id| !id.is_empty())
                .map(|id| (row.get("gene_id"), id))
        })
        .collect()
}

fn publication_from_row(row: &sqlx::sqlite::SqliteRow) -> Publication {
    Publication {
        id: row.get("id"),
        pmid: row.get("pmid"),
        title: row.get("title"),
        authors: row.get("authors"),
        date: row.get("date"),
        journal: row.get("journal"),
        volume: row.get("volume"),
        pages: row.get("pages"),
        issue: row.get("issue"),
    }
}
