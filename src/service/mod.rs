//! Operations exposed to the outer layer.
//!
//! [`Tribe`] ties the repositories, the identifier resolver and the
//! publication loader together. Each operation validates its input, resolves
//! identifiers, then hands a typed value to the repository.

mod fork;
mod genesets;
mod maintenance;
mod versions;

pub use genesets::GenesetCommit;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::db::{Catalog, Repository};
use crate::errors::AppError;
use crate::models::Geneset;
use crate::publications::{PublicationFetcher, PublicationLoader, PubmedClient};
use crate::resolver::{IdentifierKind, Resolver, Translation};

/// Entry point for geneset and version operations.
#[derive(Clone)]
pub struct Tribe {
    repo: Repository,
    catalog: Catalog,
    resolver: Resolver,
    loader: PublicationLoader,
}

impl Tribe {
    pub fn new(pool: SqlitePool, fetcher: Arc<dyn PublicationFetcher>, config: &Config) -> Self {
        let catalog = Catalog::new(pool.clone());
        Self {
            repo: Repository::new(pool),
            resolver: Resolver::new(catalog.clone()),
            loader: PublicationLoader::new(catalog.clone(), fetcher, config.pubmed.clone()),
            catalog,
        }
    }

    /// Build with the PubMed client from `config`.
    pub fn from_config(pool: SqlitePool, config: &Config) -> Result<Self, AppError> {
        let fetcher = Arc::new(PubmedClient::new(config.pubmed.base_url.clone())?);
        Ok(Self::new(pool, fetcher, config))
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    /// Translate gene tokens between identifier kinds, e.g. `Symbol` to `Entrez`.
    pub async fn translate_genes(
        &self,
        tokens: &[String],
        from: Option<&str>,
        to: Option<&str>,
        organism_id: Option<i64>,
    ) -> Result<Translation, AppError> {
        let from = IdentifierKind::parse(from);
        let to = IdentifierKind::parse(to);
        self.resolver
            .translate_genes(tokens.iter().map(String::as_str), &from, &to, organism_id)
            .await
    }

    /// A geneset that exists and is not deleted.
    async fn live_geneset(&self, id: &str) -> Result<Geneset, AppError> {
        self.repo
            .get_geneset(id)
            .await?
            .filter(|g| !g.deleted)
            .ok_or_else(|| AppError::NotFound(format!("Geneset {} not found", id)))
    }
}
