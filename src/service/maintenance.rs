//! Bulk-import commits and chain upkeep.

use chrono::{DateTime, Utc};

use super::Tribe;
use crate::annotations::AnnotationSet;
use crate::chain::{self, ChainMismatch};
use crate::db::NewVersion;
use crate::errors::AppError;
use crate::models::Version;

impl Tribe {
    /// Bring a geneset in line with an externally loaded annotation set.
    ///
    /// Commits on top of the current tip with a generated description and
    /// the given (possibly backdated) commit date. Returns `None` when the
    /// annotations already match the tip.
    pub async fn sync_annotations(
        &self,
        geneset_id: &str,
        creator: &str,
        annotations: AnnotationSet,
        source: &str,
        commit_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Version>, AppError> {
        self.live_geneset(geneset_id).await?;
        if annotations.is_empty() {
            return Err(AppError::BadRequest(
                "New versions must have annotations.".to_string(),
            ));
        }

        let tip = self.repo.get_tip(geneset_id).await?;
        let Some(description) =
            chain::describe_change(tip.as_ref().map(|t| &t.annotations), &annotations, Some(source))
        else {
            tracing::debug!(geneset_id = geneset_id, source = source, "Annotations unchanged");
            return Ok(None);
        };

        let tip_hash = tip.map(|t| t.ver_hash);
        let version = self
            .repo
            .append_version(NewVersion {
                geneset_id: geneset_id.to_string(),
                creator: creator.to_string(),
                annotations,
                parent_hash: tip_hash.clone(),
                description: Some(description),
                commit_date,
                expected_tip: tip_hash,
            })
            .await?;

        tracing::info!(
            geneset_id = geneset_id,
            ver_hash = %version.ver_hash,
            source = source,
            "Synced annotations"
        );
        Ok(Some(version))
    }

    /// Recompute the cached distinct gene count of every geneset from its tip.
    /// Returns how many genesets were visited.
    pub async fn refresh_tip_item_counts(&self) -> Result<usize, AppError> {
        let ids = self.repo.list_geneset_ids().await?;
        for id in &ids {
            let count = self
                .repo
                .get_tip(id)
                .await?
                .map(|tip| tip.annotations.distinct_gene_count() as i64);
            self.repo.set_tip_item_count(id, count).await?;
        }
        tracing::info!(genesets = ids.len(), "Refreshed tip item counts");
        Ok(ids.len())
    }

    /// Recompute every stored hash of a geneset and report the ones that do
    /// not match. Never rewrites anything.
    pub async fn verify_chain(&self, geneset_id: &str) -> Result<Vec<ChainMismatch>, AppError> {
        if self.repo.get_geneset(geneset_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Geneset {} not found", geneset_id)));
        }
        let versions = self.repo.list_versions(geneset_id).await?;
        let mismatches = chain::verify(&versions);
        if !mismatches.is_empty() {
            tracing::warn!(
                geneset_id = geneset_id,
                mismatches = mismatches.len(),
                "Version chain does not verify"
            );
        }
        Ok(mismatches)
    }
}
