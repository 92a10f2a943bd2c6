//! Geneset lifecycle.

use serde::Serialize;

use super::Tribe;
use crate::db::{NewGeneset, NewVersion};
use crate::errors::AppError;
use crate::models::{
    is_valid_slug, slugify, CreateGenesetRequest, Geneset, UpdateGenesetRequest, VersionCommit,
    SLUG_MAX_LENGTH,
};
use crate::resolver::IdentifierKind;

const DEFAULT_FIRST_VERSION_DESCRIPTION: &str = "Created with collection.";

/// A new geneset and, when annotations were supplied, its first version.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesetCommit {
    pub geneset: Geneset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<VersionCommit>,
}

impl Tribe {
    /// Create a geneset, optionally with a first version.
    pub async fn create_geneset(
        &self,
        creator: &str,
        request: CreateGenesetRequest,
    ) -> Result<GenesetCommit, AppError> {
        let slug = self
            .claim_slug(creator, &request.title, request.slug.as_deref())
            .await?;

        if self.catalog.get_organism(request.organism_id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "Organism {} not found",
                request.organism_id
            )));
        }

        let new = NewGeneset {
            creator: creator.to_string(),
            title: request.title.trim().to_string(),
            slug,
            organism_id: request.organism_id,
            abstract_text: request.abstract_text,
            public: request.public,
            tags: request.tags,
            fork_of: None,
        };

        let annotations = request.annotations.unwrap_or_default();
        if annotations.is_empty() {
            let geneset = self.repo.create_geneset(&new).await?;
            tracing::info!(geneset_id = %geneset.id, slug = %geneset.slug, "Created geneset");
            return Ok(GenesetCommit {
                geneset,
                version: None,
            });
        }

        let kind = IdentifierKind::parse(request.xrdb.as_deref());
        let (annotation_set, warnings) = self
            .build_annotations(&annotations, &kind, new.organism_id)
            .await?;

        let (geneset, version) = self
            .repo
            .create_geneset_with_version(
                &new,
                NewVersion {
                    geneset_id: String::new(),
                    creator: creator.to_string(),
                    annotations: annotation_set,
                    parent_hash: None,
                    description: Some(
                        request
                            .description
                            .unwrap_or_else(|| DEFAULT_FIRST_VERSION_DESCRIPTION.to_string()),
                    ),
                    commit_date: None,
                    expected_tip: None,
                },
            )
            .await?;

        tracing::info!(
            geneset_id = %geneset.id,
            slug = %geneset.slug,
            ver_hash = %version.ver_hash,
            "Created geneset with first version"
        );

        Ok(GenesetCommit {
            geneset,
            version: Some(VersionCommit { version, warnings }),
        })
    }

    /// Validate the title and pick a slug that `creator` has not used yet.
    ///
    /// Derived slugs are cut to the maximum length first, so titles that only
    /// differ past that point collide here rather than in storage.
    pub(super) async fn claim_slug(
        &self,
        creator: &str,
        title: &str,
        explicit: Option<&str>,
    ) -> Result<String, AppError> {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Title is required".to_string()));
        }

        let slug = match explicit {
            Some(slug) => {
                if !is_valid_slug(slug) {
                    return Err(AppError::Validation(format!(
                        "Slug {:?} must be lowercase letters, digits and single dashes, at most {} characters",
                        slug, SLUG_MAX_LENGTH
                    )));
                }
                slug.to_string()
            }
            None => slugify(title, SLUG_MAX_LENGTH),
        };
        if slug.is_empty() {
            return Err(AppError::Validation(
                "Title has no Latin letters or digits to build a slug from; pass a slug explicitly".to_string(),
            ));
        }

        if self.repo.slug_taken(creator, &slug).await? {
            tracing::debug!(creator = creator, slug = %slug, "Slug already taken");
            return Err(AppError::DuplicateSlug { slug });
        }
        Ok(slug)
    }

    /// Change title, abstract, visibility or tags.
    pub async fn update_geneset(
        &self,
        id: &str,
        request: &UpdateGenesetRequest,
    ) -> Result<Geneset, AppError> {
        if let Some(title) = &request.title {
            if title.trim().is_empty() {
                return Err(AppError::Validation("Title is required".to_string()));
            }
        }
        self.repo.update_geneset(id, request).await
    }

    /// Soft delete. Forks keep pointing at the row.
    pub async fn delete_geneset(&self, id: &str) -> Result<(), AppError> {
        self.repo.soft_delete_geneset(id).await?;
        tracing::info!(geneset_id = id, "Deleted geneset");
        Ok(())
    }

    pub async fn get_geneset(&self, id: &str) -> Result<Geneset, AppError> {
        self.live_geneset(id).await
    }

    pub async fn get_geneset_by_slug(&self, creator: &str, slug: &str) -> Result<Geneset, AppError> {
        self.repo
            .get_geneset_by_slug(creator, slug)
            .await?
            .filter(|g| !g.deleted)
            .ok_or_else(|| {
                AppError::NotFound(format!("Geneset {}/{} not found", creator, slug))
            })
    }

    /// Genesets that are not deleted, optionally for one creator.
    pub async fn list_genesets(&self, creator: Option<&str>) -> Result<Vec<Geneset>, AppError> {
        self.repo.list_genesets(creator).await
    }
}
