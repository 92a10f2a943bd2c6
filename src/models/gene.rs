//! Organism, gene and cross-reference models.

use serde::{Deserialize, Serialize};

/// An organism genes and genesets are scoped to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Organism {
    pub id: i64,
    pub taxonomy_id: i64,
    pub common_name: String,
    pub scientific_name: String,
    pub slug: String,
}

/// Request body for registering an organism.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrganismRequest {
    pub taxonomy_id: i64,
    pub common_name: String,
    pub scientific_name: String,
}

/// A gene known to the identifier database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Gene {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrezid: Option<i64>,
    pub systematic_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standard_name: Option<String>,
    pub description: String,
    pub organism_id: i64,
    /// Space separated aliases
    pub aliases: String,
    pub obsolete: bool,
    pub weight: f64,
}

impl Gene {
    /// Standard name when present, otherwise the systematic name.
    pub fn symbol(&self) -> &str {
        match self.standard_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.systematic_name,
        }
    }
}

/// Request body for adding a gene.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeneRequest {
    #[serde(default)]
    pub entrezid: Option<i64>,
    pub systematic_name: String,
    #[serde(default)]
    pub standard_name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub organism_id: i64,
    #[serde(default)]
    pub aliases: String,
    #[serde(default)]
    pub obsolete: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// A named external identifier namespace (e.g. UniProtKB, Ensembl).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrossRefDb {
    pub id: i64,
    pub name: String,
    pub url: String,
}

/// One gene's identifier inside a cross-reference database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CrossRef {
    pub id: i64,
    pub crossref_db_id: i64,
    pub gene_id: i64,
    pub xrid: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gene(standard_name: Option<&str>) -> Gene {
        Gene {
            id: 1,
            entrezid: Some(55982),
            systematic_name: "g1".to_string(),
            standard_name: standard_name.map(str::to_string),
            description: String::new(),
            organism_id: 1,
            aliases: String::new(),
            obsolete: false,
            weight: 1.0,
        }
    }

    #[test]
    fn test_symbol_prefers_standard_name() {
        assert_eq!(gene(Some("Paxip1")).symbol(), "Paxip1");
        assert_eq!(gene(None).symbol(), "g1");
        assert_eq!(gene(Some("")).symbol(), "g1");
    }
}
