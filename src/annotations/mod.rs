//! Annotation sets: the content of a version.
//!
//! An [`AnnotationSet`] is an unordered, duplicate-free collection of
//! `(gene, publication-or-none)` pairs. It is kept sorted so that equality,
//! hashing and the canonical string used for version hashes never depend on
//! insertion order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Internal gene identity.
pub type GeneId = i64;
/// Internal publication identity.
pub type PublicationId = i64;

/// A gene annotated with one supporting publication, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Annotation {
    pub gene: GeneId,
    pub publication: Option<PublicationId>,
}

impl Annotation {
    pub fn new(gene: GeneId, publication: Option<PublicationId>) -> Self {
        Self { gene, publication }
    }
}

/// Immutable set of annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationSet(BTreeSet<Annotation>);

/// Pairs present in one set but not the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationDiff {
    pub added: AnnotationSet,
    pub removed: AnnotationSet,
}

impl AnnotationDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from possibly unresolved pairs. A pair without a gene rejects
    /// the whole set.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (Option<GeneId>, Option<PublicationId>)>,
    {
        let mut set = BTreeSet::new();
        for (gene, publication) in pairs {
            let gene = gene.ok_or(AppError::VersionContainsNoneGene)?;
            set.insert(Annotation { gene, publication });
        }
        Ok(Self(set))
    }

    /// Build from a gene → publications map. Genes without publications are
    /// stored as `(gene, None)`.
    pub fn from_gene_publications(map: &BTreeMap<GeneId, BTreeSet<PublicationId>>) -> Self {
        let mut set = BTreeSet::new();
        for (gene, publications) in map {
            if publications.is_empty() {
                set.insert(Annotation::new(*gene, None));
            } else {
                set.extend(
                    publications
                        .iter()
                        .map(|publication| Annotation::new(*gene, Some(*publication))),
                );
            }
        }
        Self(set)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, annotation: &Annotation) -> bool {
        self.0.contains(annotation)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.0.iter()
    }

    /// Distinct genes, regardless of how many publications each carries.
    pub fn genes(&self) -> BTreeSet<GeneId> {
        self.0.iter().map(|a| a.gene).collect()
    }

    pub fn distinct_gene_count(&self) -> usize {
        self.genes().len()
    }

    /// Publications referenced by any pair.
    pub fn publications(&self) -> BTreeSet<PublicationId> {
        self.0.iter().filter_map(|a| a.publication).collect()
    }

    /// Publications attached to each gene; genes without any map to an empty set.
    pub fn by_gene(&self) -> BTreeMap<GeneId, BTreeSet<PublicationId>> {
        let mut map: BTreeMap<GeneId, BTreeSet<PublicationId>> = BTreeMap::new();
        for annotation in &self.0 {
            let entry = map.entry(annotation.gene).or_default();
            if let Some(publication) = annotation.publication {
                entry.insert(publication);
            }
        }
        map
    }

    /// Pairs in `self` that are not in `other`.
    pub fn difference(&self, other: &AnnotationSet) -> AnnotationSet {
        Self(self.0.difference(&other.0).copied().collect())
    }

    /// Changes going from `previous` to `self`.
    pub fn diff(&self, previous: &AnnotationSet) -> AnnotationDiff {
        AnnotationDiff {
            added: self.difference(previous),
            removed: previous.difference(self),
        }
    }

    /// Order-independent text form fed into version hashes:
    /// `gene:publication` entries (`-` for no publication) joined by `;`.
    pub fn canonical_string(&self) -> String {
        self.0
            .iter()
            .map(|a| match a.publication {
                Some(publication) => format!("{}:{}", a.gene, publication),
                None => format!("{}:-", a.gene),
            })
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl FromIterator<Annotation> for AnnotationSet {
    fn from_iter<T: IntoIterator<Item = Annotation>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a AnnotationSet {
    type Item = &'a Annotation;
    type IntoIter = std::collections::btree_set::Iter<'a, Annotation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(pairs: &[(i64, Option<i64>)]) -> AnnotationSet {
        pairs
            .iter()
            .map(|(gene, publication)| Annotation::new(*gene, *publication))
            .collect()
    }

    #[test]
    fn test_none_gene_rejects_whole_set() {
        let result = AnnotationSet::from_pairs(vec![
            (Some(1), Some(10)),
            (None, Some(11)),
            (Some(2), None),
        ]);
        assert!(matches!(result, Err(AppError::VersionContainsNoneGene)));
    }

    #[test]
    fn test_equality_ignores_insertion_order_and_duplicates() {
        let a = set(&[(1, Some(10)), (2, None), (1, Some(10))]);
        let b = set(&[(2, None), (1, Some(10))]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.canonical_string(), b.canonical_string());
    }

    #[test]
    fn test_distinct_gene_count() {
        let annotations = set(&[(1, Some(1)), (1, Some(2)), (2, None)]);
        assert_eq!(annotations.len(), 3);
        assert_eq!(annotations.distinct_gene_count(), 2);
    }

    #[test]
    fn test_diff_reports_added_and_removed_pairs() {
        let old = set(&[(1, None), (2, Some(5))]);
        let new = set(&[(2, Some(5)), (3, None), (3, Some(6))]);

        let diff = new.diff(&old);
        assert_eq!(diff.added, set(&[(3, None), (3, Some(6))]));
        assert_eq!(diff.removed, set(&[(1, None)]));
        assert!(new.diff(&new).is_empty());
    }

    #[test]
    fn test_canonical_string_format() {
        let annotations = set(&[(2, Some(7)), (1, Some(5)), (1, None)]);
        assert_eq!(annotations.canonical_string(), "1:-;1:5;2:7");
        assert_eq!(AnnotationSet::new().canonical_string(), "");
    }

    #[test]
    fn test_from_gene_publications() {
        let mut map = BTreeMap::new();
        map.insert(4, BTreeSet::new());
        map.insert(5, BTreeSet::from([8, 9]));

        let annotations = AnnotationSet::from_gene_publications(&map);
        assert_eq!(annotations, set(&[(4, None), (5, Some(8)), (5, Some(9))]));
        assert_eq!(annotations.by_gene(), map);
        assert_eq!(annotations.publications(), BTreeSet::from([8, 9]));
    }

    #[test]
    fn test_json_blob_rejects_null_gene() {
        let annotations = set(&[(1, None), (2, Some(3))]);
        let blob = serde_json::to_string(&annotations).unwrap();
        let back: AnnotationSet = serde_json::from_str(&blob).unwrap();
        assert_eq!(back, annotations);

        let bad = r#"[{"gene": null, "publication": 3}]"#;
        assert!(serde_json::from_str::<AnnotationSet>(bad).is_err());
    }
}
