//! Gene identifier resolution.
//!
//! Translates client-facing gene identifiers into internal gene ids and back.
//! Resolution is a best-effort batch: tokens that match nothing and tokens
//! that match more than one gene are reported, never guessed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::annotations::GeneId;
use crate::db::Catalog;
use crate::errors::AppError;

/// The namespace a gene token belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentifierKind {
    /// Internal numeric gene id
    Internal,
    /// NCBI Entrez gene id
    Entrez,
    /// Standard name, falling back to systematic name
    Symbol,
    StandardName,
    SystematicName,
    /// Named cross-reference database
    CrossRef(String),
}

impl IdentifierKind {
    /// Parse the `xrdb` value sent by clients. Absent or empty means internal ids.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => IdentifierKind::Internal,
            Some("Entrez") => IdentifierKind::Entrez,
            Some("Symbol") => IdentifierKind::Symbol,
            Some("Standard name") => IdentifierKind::StandardName,
            Some("Systematic name") => IdentifierKind::SystematicName,
            Some(other) => IdentifierKind::CrossRef(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            IdentifierKind::Internal => "Internal",
            IdentifierKind::Entrez => "Entrez",
            IdentifierKind::Symbol => "Symbol",
            IdentifierKind::StandardName => "Standard name",
            IdentifierKind::SystematicName => "Systematic name",
            IdentifierKind::CrossRef(name) => name,
        }
    }

    /// Symbols are only unique within an organism.
    pub fn is_symbol_style(&self) -> bool {
        matches!(
            self,
            IdentifierKind::Symbol | IdentifierKind::StandardName | IdentifierKind::SystematicName
        )
    }
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome for a single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(GeneId),
    Ambiguous(Vec<GeneId>),
    NotFound,
}

impl Resolution {
    fn from_candidates(mut candidates: Vec<GeneId>) -> Self {
        candidates.sort_unstable();
        candidates.dedup();
        match candidates.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Resolved(candidates[0]),
            _ => Resolution::Ambiguous(candidates),
        }
    }
}

/// Result of resolving a batch of tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneResolution {
    pub resolved: BTreeMap<String, GeneId>,
    pub not_found: BTreeSet<String>,
    pub ambiguous: BTreeSet<String>,
}

/// Result of translating tokens from one identifier kind to another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Translation {
    pub translated: BTreeMap<String, Vec<String>>,
    pub not_found: BTreeSet<String>,
    pub ambiguous: BTreeSet<String>,
}

/// Resolves gene identifiers against the catalog.
#[derive(Clone)]
pub struct Resolver {
    catalog: Catalog,
}

impl Resolver {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    /// Resolve one token. `organism_id` only narrows symbol-style kinds.
    pub async fn resolve_gene(
        &self,
        token: &str,
        kind: &IdentifierKind,
        organism_id: Option<i64>,
    ) -> Result<Resolution, AppError> {
        let scope = if kind.is_symbol_style() {
            organism_id
        } else {
            None
        };
        let candidates = self.catalog.find_gene_ids(kind, token, scope).await?;
        Ok(Resolution::from_candidates(candidates))
    }

    /// Resolve a batch of tokens, sorting each into resolved, missing or ambiguous.
    pub async fn resolve_genes<'a, I>(
        &self,
        tokens: I,
        kind: &IdentifierKind,
        organism_id: Option<i64>,
    ) -> Result<GeneResolution, AppError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut result = GeneResolution::default();
        let unique: BTreeSet<&str> = tokens.into_iter().collect();

        for token in unique {
            match self.resolve_gene(token, kind, organism_id).await? {
                Resolution::Resolved(gene_id) => {
                    result.resolved.insert(token.to_string(), gene_id);
                }
                Resolution::Ambiguous(candidates) => {
                    tracing::warn!(
                        token = token,
                        kind = %kind,
                        candidates = ?candidates,
                        "Ambiguous gene identifier left out"
                    );
                    result.ambiguous.insert(token.to_string());
                }
                Resolution::NotFound => {
                    tracing::debug!(token = token, kind = %kind, "Gene identifier not found");
                    result.not_found.insert(token.to_string());
                }
            }
        }

        Ok(result)
    }

    /// Identifiers of each gene in the target kind. Genes with no identifier
    /// of that kind map to an empty list.
    pub async fn render_genes(
        &self,
        gene_ids: &[GeneId],
        kind: &IdentifierKind,
    ) -> Result<BTreeMap<GeneId, Vec<String>>, AppError> {
        let mut rendered: BTreeMap<GeneId, Vec<String>> =
            gene_ids.iter().map(|id| (*id, Vec::new())).collect();

        for (gene_id, identifier) in self.catalog.gene_identifiers(kind, gene_ids).await? {
            rendered.entry(gene_id).or_default().push(identifier);
        }

        Ok(rendered)
    }

    /// Map tokens of kind `from` to their identifiers of kind `to`.
    pub async fn translate_genes<'a, I>(
        &self,
        tokens: I,
        from: &IdentifierKind,
        to: &IdentifierKind,
        organism_id: Option<i64>,
    ) -> Result<Translation, AppError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let resolution = self.resolve_genes(tokens, from, organism_id).await?;
        let gene_ids: Vec<GeneId> = resolution.resolved.values().copied().collect();
        let rendered = self.render_genes(&gene_ids, to).await?;

        let translated = resolution
            .resolved
            .into_iter()
            .map(|(token, gene_id)| {
                let identifiers = rendered.get(&gene_id).cloned().unwrap_or_default();
                (token, identifiers)
            })
            .collect();

        Ok(Translation {
            translated,
            not_found: resolution.not_found,
            ambiguous: resolution.ambiguous,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifier_kind() {
        assert_eq!(IdentifierKind::parse(None), IdentifierKind::Internal);
        assert_eq!(IdentifierKind::parse(Some("")), IdentifierKind::Internal);
        assert_eq!(IdentifierKind::parse(Some("Entrez")), IdentifierKind::Entrez);
        assert_eq!(IdentifierKind::parse(Some("Symbol")), IdentifierKind::Symbol);
        assert_eq!(
            IdentifierKind::parse(Some("Systematic name")),
            IdentifierKind::SystematicName
        );
        assert_eq!(
            IdentifierKind::parse(Some("Ensembl")),
            IdentifierKind::CrossRef("Ensembl".to_string())
        );
    }

    #[test]
    fn test_label_round_trips_through_parse() {
        for kind in [
            IdentifierKind::Entrez,
            IdentifierKind::Symbol,
            IdentifierKind::StandardName,
            IdentifierKind::SystematicName,
            IdentifierKind::CrossRef("UniProtKB".to_string()),
        ] {
            assert_eq!(IdentifierKind::parse(Some(kind.label())), kind);
        }
    }

    #[test]
    fn test_only_symbols_are_organism_scoped() {
        assert!(IdentifierKind::Symbol.is_symbol_style());
        assert!(IdentifierKind::StandardName.is_symbol_style());
        assert!(!IdentifierKind::Entrez.is_symbol_style());
        assert!(!IdentifierKind::CrossRef("ASDF".to_string()).is_symbol_style());
    }

    #[test]
    fn test_candidates_classification() {
        assert_eq!(Resolution::from_candidates(vec![]), Resolution::NotFound);
        assert_eq!(Resolution::from_candidates(vec![4, 4]), Resolution::Resolved(4));
        assert_eq!(
            Resolution::from_candidates(vec![5, 4]),
            Resolution::Ambiguous(vec![4, 5])
        );
    }
}
