//! Forking: copying a geneset's history into a new geneset.

use std::collections::HashMap;

use super::Tribe;
use crate::chain;
use crate::db::NewGeneset;
use crate::errors::AppError;
use crate::models::{ForkRequest, Geneset, Version};

impl Tribe {
    /// Copy `source_id`'s history into a new geneset owned by `new_owner`.
    ///
    /// Only the ancestors of the chosen version (the tip unless
    /// `fork_version` is set) are copied. Content, descriptions, commit dates
    /// and original creators are kept; storage ids are new and every copy
    /// links to the copy of its parent. The source is left untouched.
    pub async fn fork(
        &self,
        source_id: &str,
        new_owner: &str,
        request: ForkRequest,
    ) -> Result<Geneset, AppError> {
        let source = self.live_geneset(source_id).await?;
        let versions = self.repo.list_versions(&source.id).await?;

        let start = match request.fork_version.as_deref() {
            Some(hash) => Some(
                versions
                    .iter()
                    .find(|v| v.ver_hash == hash)
                    .cloned()
                    .ok_or_else(|| {
                        AppError::NotFound(format!(
                            "Version {} not found in geneset {}",
                            hash, source.id
                        ))
                    })?,
            ),
            None => self.repo.get_tip(&source.id).await?,
        };

        let history = match &start {
            Some(start) => {
                let by_id: HashMap<String, Version> =
                    versions.into_iter().map(|v| (v.id.clone(), v)).collect();
                chain::ancestry(start, &by_id)?
            }
            None => Vec::new(),
        };

        let slug = self
            .claim_slug(new_owner, &request.title, request.slug.as_deref())
            .await?;
        let new = NewGeneset {
            creator: new_owner.to_string(),
            title: request.title.trim().to_string(),
            slug,
            organism_id: source.organism_id,
            abstract_text: request.abstract_text.or(source.abstract_text.clone()),
            public: request.public,
            tags: request.tags,
            fork_of: Some(source.id.clone()),
        };

        let (geneset, copies) = self.repo.create_geneset_with_history(&new, &history).await?;

        tracing::info!(
            source_id = %source.id,
            geneset_id = %geneset.id,
            versions = copies.len(),
            "Forked geneset"
        );

        Ok(geneset)
    }
}
