//! Version commits, tips and rendering.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::Tribe;
use crate::annotations::{AnnotationSet, GeneId, PublicationId};
use crate::chain;
use crate::db::NewVersion;
use crate::errors::AppError;
use crate::models::{
    CreateVersionRequest, PublicationRef, RawAnnotation, RenderedAnnotation, ResolutionReport,
    Version, VersionCommit,
};
use crate::resolver::IdentifierKind;

impl Tribe {
    /// Commit a new version built from client identifiers.
    ///
    /// Unresolved and ambiguous genes and unloadable publications are left
    /// out and reported in the returned warnings. The commit fails only when
    /// nothing at all resolved or a structural rule is broken.
    pub async fn create_version(
        &self,
        geneset_id: &str,
        creator: &str,
        request: CreateVersionRequest,
    ) -> Result<VersionCommit, AppError> {
        let geneset = self.live_geneset(geneset_id).await?;

        if request.annotations.is_empty() {
            return Err(AppError::BadRequest(
                "New versions must have annotations.".to_string(),
            ));
        }
        if request.parent.is_none() && self.repo.count_versions(geneset_id).await? > 0 {
            return Err(AppError::NoParentVersionSpecified);
        }

        let kind = IdentifierKind::parse(request.xrdb.as_deref());
        let (annotations, warnings) = self
            .build_annotations(&request.annotations, &kind, geneset.organism_id)
            .await?;

        let version = self
            .repo
            .append_version(NewVersion {
                geneset_id: geneset_id.to_string(),
                creator: creator.to_string(),
                annotations,
                parent_hash: request.parent,
                description: request.description,
                commit_date: None,
                expected_tip: request.expected_tip,
            })
            .await?;

        tracing::info!(
            geneset_id = geneset_id,
            version = %version.short_hash(),
            annotations = version.annotations.len(),
            "Committed version"
        );
        if !warnings.is_clean() {
            tracing::warn!(
                geneset_id = geneset_id,
                not_found = warnings.not_found_genes.len(),
                ambiguous = warnings.ambiguous_genes.len(),
                pubs_not_loaded = warnings.pubs_not_loaded.len(),
                "Version committed with unresolved identifiers"
            );
        }

        Ok(VersionCommit { version, warnings })
    }

    /// Resolve client annotations into an annotation set for a geneset of
    /// `organism_id`.
    pub(super) async fn build_annotations(
        &self,
        raw: &[RawAnnotation],
        kind: &IdentifierKind,
        organism_id: i64,
    ) -> Result<(AnnotationSet, ResolutionReport), AppError> {
        if raw.iter().any(|a| a.gene_token().is_none()) {
            return Err(AppError::VersionContainsNoneGene);
        }

        let genes = self
            .resolver
            .resolve_genes(raw.iter().filter_map(RawAnnotation::gene_token), kind, Some(organism_id))
            .await?;

        let pmids: BTreeSet<i64> = raw
            .iter()
            .flat_map(|a| a.publications.iter())
            .filter_map(|p| match p {
                PublicationRef::Pmid(pmid) => Some(*pmid),
                PublicationRef::Record(_) => None,
            })
            .collect();
        let loaded = self.loader.load_pmids(&pmids).await?;

        let mut by_gene: BTreeMap<GeneId, BTreeSet<PublicationId>> = BTreeMap::new();
        for annotation in raw {
            let Some(gene_id) = annotation.gene_token().and_then(|t| genes.resolved.get(t)) else {
                continue;
            };
            let publications = by_gene.entry(*gene_id).or_default();
            for publication in &annotation.publications {
                let id = match publication {
                    PublicationRef::Pmid(pmid) => loaded.ids.get(pmid).copied(),
                    PublicationRef::Record(record) => Some(record.id),
                };
                publications.extend(id);
            }
        }

        let report = ResolutionReport {
            not_found_genes: genes.not_found,
            ambiguous_genes: genes.ambiguous,
            pubs_not_loaded: loaded.not_loaded,
        };
        if by_gene.is_empty() {
            return Err(AppError::NothingResolved(report));
        }

        Ok((AnnotationSet::from_gene_publications(&by_gene), report))
    }

    /// The most recent version of a geneset, or `None` while it has none.
    pub async fn get_tip(&self, geneset_id: &str) -> Result<Option<Version>, AppError> {
        self.live_geneset(geneset_id).await?;
        self.repo.get_tip(geneset_id).await
    }

    /// All versions, oldest first.
    pub async fn list_versions(&self, geneset_id: &str) -> Result<Vec<Version>, AppError> {
        self.live_geneset(geneset_id).await?;
        self.repo.list_versions(geneset_id).await
    }

    pub async fn get_version(&self, geneset_id: &str, ver_hash: &str) -> Result<Version, AppError> {
        self.live_geneset(geneset_id).await?;
        self.repo
            .get_version_by_hash(geneset_id, ver_hash)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Version {} not found in geneset {}",
                    ver_hash, geneset_id
                ))
            })
    }

    /// The version and its ancestors back to the root, oldest first.
    pub async fn history(&self, geneset_id: &str, ver_hash: &str) -> Result<Vec<Version>, AppError> {
        let start = self.get_version(geneset_id, ver_hash).await?;
        let by_id: HashMap<String, Version> = self
            .repo
            .list_versions(geneset_id)
            .await?
            .into_iter()
            .map(|v| (v.id.clone(), v))
            .collect();
        chain::ancestry(&start, &by_id)
    }

    /// Render a version's genes in the target identifier kind, each with the
    /// PMIDs of its publications. Genes with no identifier of that kind are
    /// omitted, so an unknown kind renders as an empty list.
    pub async fn render_annotations(
        &self,
        version: &Version,
        kind: &IdentifierKind,
    ) -> Result<Vec<RenderedAnnotation>, AppError> {
        let by_gene = version.annotations.by_gene();
        let gene_ids: Vec<GeneId> = by_gene.keys().copied().collect();
        let identifiers = self.resolver.render_genes(&gene_ids, kind).await?;

        let publication_ids: Vec<PublicationId> =
            version.annotations.publications().into_iter().collect();
        let pmids: HashMap<PublicationId, i64> = self
            .catalog
            .get_publications(&publication_ids)
            .await?
            .into_iter()
            .filter_map(|p| p.pmid.map(|pmid| (p.id, pmid)))
            .collect();

        let mut rendered = Vec::new();
        for (gene_id, publications) in &by_gene {
            let gene_pmids: Vec<i64> = publications
                .iter()
                .filter_map(|id| pmids.get(id).copied())
                .collect();
            for identifier in identifiers.get(gene_id).into_iter().flatten() {
                rendered.push(RenderedAnnotation {
                    identifier: identifier.clone(),
                    pmids: gene_pmids.clone(),
                });
            }
        }

        Ok(rendered)
    }
}
