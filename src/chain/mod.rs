//! Version chain rules.
//!
//! Every version hash is a SHA-1 digest seeded with the parent's hex hash (an
//! empty seed for the first version) and updated with the canonical string of
//! the version's annotations. Changing any ancestor therefore changes every
//! descendant hash. Hashes are computed once, on append; [`verify`] is a
//! read-only audit that never rewrites stored rows.

use std::collections::HashMap;

use serde::Serialize;
use sha1::{Digest, Sha1};

use crate::annotations::AnnotationSet;
use crate::errors::AppError;
use crate::models::Version;

/// Compute the chained hash for a new version.
pub fn compute_ver_hash(parent_hash: Option<&str>, annotations: &AnnotationSet) -> String {
    let mut hasher = Sha1::new();
    if let Some(parent_hash) = parent_hash {
        hasher.update(parent_hash.as_bytes());
    }
    hasher.update(annotations.canonical_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Enforce the parent linkage rules for appending to a geneset that already
/// holds `existing_versions` versions.
pub fn check_parent(
    geneset_id: &str,
    existing_versions: i64,
    parent: Option<&Version>,
) -> Result<(), AppError> {
    match parent {
        None if existing_versions > 0 => Err(AppError::NoParentVersionSpecified),
        Some(parent) if parent.geneset_id != geneset_id => Err(AppError::NotFound(format!(
            "Parent version {} not found in geneset {}",
            parent.ver_hash, geneset_id
        ))),
        _ => Ok(()),
    }
}

/// Summary of a change between two annotation sets. `None` when nothing changed.
pub fn describe_change(
    previous: Option<&AnnotationSet>,
    current: &AnnotationSet,
    source: Option<&str>,
) -> Option<String> {
    let suffix = match source {
        Some(source) => format!(" annotations from {}.", source),
        None => " annotations.".to_string(),
    };
    match previous {
        None => Some(format!("Created with {}{}", current.len(), suffix)),
        Some(previous) => {
            let diff = current.diff(previous);
            if diff.is_empty() {
                None
            } else {
                Some(format!(
                    "Added {} and removed {}{}",
                    diff.added.len(),
                    diff.removed.len(),
                    suffix
                ))
            }
        }
    }
}

/// Walk parent links from `start` back to the root. Returns oldest first.
pub fn ancestry(start: &Version, by_id: &HashMap<String, Version>) -> Result<Vec<Version>, AppError> {
    let mut chain = vec![start.clone()];
    let mut current = start;
    while let Some(parent_id) = current.parent_id.as_deref() {
        let parent = by_id.get(parent_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "Ancestor {} of version {} not found",
                parent_id, start.ver_hash
            ))
        })?;
        if chain.len() > by_id.len() {
            return Err(AppError::Internal(format!(
                "Parent links of version {} form a cycle",
                start.ver_hash
            )));
        }
        chain.push(parent.clone());
        current = parent;
    }
    chain.reverse();
    Ok(chain)
}

/// A stored version whose hash does not match its parent and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainMismatch {
    pub version_id: String,
    pub stored_hash: String,
    /// `None` when the parent itself is missing
    pub expected_hash: Option<String>,
}

/// Recompute every hash of one geneset's versions.
pub fn verify(versions: &[Version]) -> Vec<ChainMismatch> {
    let by_id: HashMap<&str, &Version> = versions.iter().map(|v| (v.id.as_str(), v)).collect();

    versions
        .iter()
        .filter_map(|version| {
            let expected = match version.parent_id.as_deref() {
                None => Some(compute_ver_hash(None, &version.annotations)),
                Some(parent_id) => by_id
                    .get(parent_id)
                    .map(|parent| compute_ver_hash(Some(&parent.ver_hash), &version.annotations)),
            };
            if expected.as_deref() == Some(version.ver_hash.as_str()) {
                None
            } else {
                Some(ChainMismatch {
                    version_id: version.id.clone(),
                    stored_hash: version.ver_hash.clone(),
                    expected_hash: expected,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::annotations::Annotation;

    fn annotations(genes: &[i64]) -> AnnotationSet {
        genes.iter().map(|g| Annotation::new(*g, None)).collect()
    }

    fn version(id: &str, parent: Option<&Version>, genes: &[i64]) -> Version {
        let content = annotations(genes);
        Version {
            id: id.to_string(),
            geneset_id: "gs".to_string(),
            creator: "alice".to_string(),
            ver_hash: compute_ver_hash(parent.map(|p| p.ver_hash.as_str()), &content),
            description: None,
            commit_date: Utc::now(),
            parent_id: parent.map(|p| p.id.clone()),
            annotations: content,
        }
    }

    #[test]
    fn test_root_hash_is_sha1_of_content() {
        // sha1("") for an empty first version
        assert_eq!(
            compute_ver_hash(None, &AnnotationSet::new()),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
        assert_eq!(compute_ver_hash(None, &annotations(&[1])).len(), 40);
    }

    #[test]
    fn test_hash_chains_through_parent() {
        let content = annotations(&[1, 2]);
        let a = compute_ver_hash(Some("aaaa"), &content);
        let b = compute_ver_hash(Some("bbbb"), &content);
        assert_ne!(a, b);
        assert_ne!(a, compute_ver_hash(None, &content));
        assert_eq!(a, compute_ver_hash(Some("aaaa"), &annotations(&[2, 1])));
    }

    #[test]
    fn test_check_parent_rules() {
        let root = version("v1", None, &[1]);
        assert!(check_parent("gs", 0, None).is_ok());
        assert!(matches!(
            check_parent("gs", 1, None),
            Err(AppError::NoParentVersionSpecified)
        ));
        assert!(check_parent("gs", 1, Some(&root)).is_ok());
        assert!(matches!(
            check_parent("other", 1, Some(&root)),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_describe_change() {
        let old = annotations(&[1, 2]);
        let new = annotations(&[2, 3, 4]);
        assert_eq!(
            describe_change(None, &new, Some("GO")).as_deref(),
            Some("Created with 3 annotations from GO.")
        );
        assert_eq!(
            describe_change(Some(&old), &new, None).as_deref(),
            Some("Added 2 and removed 1 annotations.")
        );
        assert_eq!(describe_change(Some(&new), &new, Some("KEGG")), None);
    }

    #[test]
    fn test_ancestry_walks_to_root() {
        let v1 = version("v1", None, &[1]);
        let v2 = version("v2", Some(&v1), &[1, 2]);
        let v3 = version("v3", Some(&v2), &[2]);
        let side = version("v4", Some(&v1), &[9]);
        let by_id: HashMap<String, Version> = [&v1, &v2, &v3, &side]
            .into_iter()
            .map(|v| (v.id.clone(), v.clone()))
            .collect();

        let ids: Vec<String> = ancestry(&v3, &by_id).unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["v1", "v2", "v3"]);

        let ids: Vec<String> = ancestry(&side, &by_id).unwrap().into_iter().map(|v| v.id).collect();
        assert_eq!(ids, vec!["v1", "v4"]);
    }

    #[test]
    fn test_ancestry_reports_missing_parent() {
        let v1 = version("v1", None, &[1]);
        let v2 = version("v2", Some(&v1), &[2]);
        let by_id: HashMap<String, Version> = [(v2.id.clone(), v2.clone())].into_iter().collect();
        assert!(matches!(ancestry(&v2, &by_id), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_verify_flags_tampered_content() {
        let v1 = version("v1", None, &[1]);
        let v2 = version("v2", Some(&v1), &[1, 2]);
        assert!(verify(&[v1.clone(), v2.clone()]).is_empty());

        let mut tampered = v1.clone();
        tampered.annotations = annotations(&[7]);
        let mismatches = verify(&[tampered, v2]);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].version_id, "v1");
    }
}
