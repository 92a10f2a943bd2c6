//! Version models.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PublicationRef;
use crate::annotations::AnnotationSet;

/// An immutable snapshot of a geneset's annotations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    pub geneset_id: String,
    pub creator: String,
    /// 40 hex characters chained from the parent's hash
    pub ver_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub commit_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub annotations: AnnotationSet,
}

impl Version {
    /// First seven characters of the hash.
    pub fn short_hash(&self) -> &str {
        &self.ver_hash[..self.ver_hash.len().min(7)]
    }
}

/// A gene token and its supporting publications as sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawAnnotation {
    /// Gene token; a missing or blank gene rejects the whole version
    #[serde(default)]
    pub gene: Option<String>,
    #[serde(default)]
    pub publications: Vec<PublicationRef>,
}

impl RawAnnotation {
    pub fn new(gene: impl Into<String>, publications: Vec<PublicationRef>) -> Self {
        Self {
            gene: Some(gene.into()),
            publications,
        }
    }

    /// The gene token, if one was given and is not blank.
    pub fn gene_token(&self) -> Option<&str> {
        self.gene.as_deref().map(str::trim).filter(|g| !g.is_empty())
    }
}

/// Request body for committing a new version.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateVersionRequest {
    /// Hash of the parent version; required once the geneset has a version
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub annotations: Vec<RawAnnotation>,
    /// Identifier kind of the gene tokens
    #[serde(default)]
    pub xrdb: Option<String>,
    /// Reject the commit if the tip moved away from this hash
    #[serde(default)]
    pub expected_tip: Option<String>,
}

/// Identifiers that were left out of an annotation set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionReport {
    pub not_found_genes: BTreeSet<String>,
    pub ambiguous_genes: BTreeSet<String>,
    pub pubs_not_loaded: BTreeSet<i64>,
}

impl ResolutionReport {
    pub fn is_clean(&self) -> bool {
        self.not_found_genes.is_empty()
            && self.ambiguous_genes.is_empty()
            && self.pubs_not_loaded.is_empty()
    }
}

/// A committed version together with the identifiers that were skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCommit {
    pub version: Version,
    pub warnings: ResolutionReport,
}

/// One gene rendered in an external identifier kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RenderedAnnotation {
    pub identifier: String,
    pub pmids: Vec<i64>,
}
