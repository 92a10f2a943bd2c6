//! Publication models.

use serde::{Deserialize, Serialize};

/// A stored bibliographic record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pmid: Option<i64>,
    pub title: String,
    pub authors: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub journal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
}

/// A publication as fetched from PubMed, before it has a storage id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NewPublication {
    pub pmid: i64,
    pub title: String,
    pub authors: String,
    #[serde(default)]
    pub date: Option<String>,
    pub journal: String,
    #[serde(default)]
    pub volume: Option<String>,
    #[serde(default)]
    pub pages: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
}

/// Already-resolved publication sent by a client; only `id` is read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicationRecord {
    pub id: i64,
}

/// How a client refers to a publication supporting an annotation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PublicationRef {
    /// Raw PubMed id; fetched and cached on demand
    Pmid(i64),
    /// Full publication object; used as is
    Record(PublicationRecord),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publication_ref_accepts_both_shapes() {
        let refs: Vec<PublicationRef> =
            serde_json::from_str(r#"[20671152, {"id": 3, "pmid": 8887666, "title": "x"}]"#)
                .unwrap();
        assert_eq!(refs[0], PublicationRef::Pmid(20671152));
        assert_eq!(refs[1], PublicationRef::Record(PublicationRecord { id: 3 }));
    }
}
