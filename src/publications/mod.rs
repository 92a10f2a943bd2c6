//! Publication loading.
//!
//! Publications referenced by PMID are fetched from PubMed the first time
//! they are seen and cached in the catalog. Fetch failures never abort a
//! commit: the affected PMIDs are reported as not loaded.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::PubmedConfig;
use crate::db::Catalog;
use crate::errors::AppError;
use crate::models::NewPublication;

/// Source of publication metadata keyed by PMID.
#[async_trait]
pub trait PublicationFetcher: Send + Sync {
    /// Fetch one batch. PMIDs the source does not know are simply absent
    /// from the result; `Err` means the whole request failed.
    async fn fetch(&self, pmids: &[i64]) -> Result<Vec<NewPublication>, AppError>;
}

/// PubMed E-utilities esummary client.
pub struct PubmedClient {
    client: reqwest::Client,
    base_url: String,
}

impl PubmedClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl PublicationFetcher for PubmedClient {
    async fn fetch(&self, pmids: &[i64]) -> Result<Vec<NewPublication>, AppError> {
        let ids = pmids
            .iter()
            .map(|pmid| pmid.to_string())
            .collect::<Vec<_>>()
            .join(",");

        // POST keeps long id lists out of the URL
        let response = self
            .client
            .post(&self.base_url)
            .form(&[("db", "pubmed"), ("retmode", "json"), ("id", ids.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "PubMed returned status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;
        parse_esummary(&body)
    }
}

#[derive(Debug, Deserialize)]
struct SummaryAuthor {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DocumentSummary {
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: Vec<SummaryAuthor>,
    #[serde(default)]
    source: String,
    #[serde(default)]
    volume: String,
    #[serde(default)]
    issue: String,
    #[serde(default)]
    pages: String,
    #[serde(default)]
    sortpubdate: String,
    #[serde(default)]
    error: Option<String>,
}

/// Parse an esummary JSON body into publications.
pub fn parse_esummary(body: &serde_json::Value) -> Result<Vec<NewPublication>, AppError> {
    let result = body
        .get("result")
        .ok_or_else(|| AppError::Upstream("PubMed response has no result".to_string()))?;

    let uids: Vec<String> = match result.get("uids") {
        Some(uids) => serde_json::from_value(uids.clone())?,
        None => Vec::new(),
    };

    let mut publications = Vec::with_capacity(uids.len());
    for uid in uids {
        let Some(raw) = result.get(&uid) else {
            tracing::warn!(pmid = %uid, "PMID has no document summary");
            continue;
        };
        let summary: DocumentSummary = serde_json::from_value(raw.clone())?;
        if let Some(error) = summary.error {
            tracing::warn!(pmid = %uid, error = %error, "PubMed could not summarise PMID");
            continue;
        }
        let Ok(pmid) = uid.parse::<i64>() else {
            tracing::warn!(pmid = %uid, "Skipping non-numeric PMID");
            continue;
        };

        publications.push(NewPublication {
            pmid,
            title: summary.title,
            authors: summary
                .authors
                .into_iter()
                .map(|a| a.name)
                .collect::<Vec<_>>()
                .join(", "),
            date: parse_sort_date(&summary.sortpubdate),
            journal: summary.source,
            volume: non_empty(summary.volume),
            pages: non_empty(summary.pages),
            issue: non_empty(summary.issue),
        });
    }

    Ok(publications)
}

/// `2010/07/01 00:00` becomes `2010-07-01`.
fn parse_sort_date(raw: &str) -> Option<String> {
    let day = raw.split_whitespace().next()?;
    chrono::NaiveDate::parse_from_str(day, "%Y/%m/%d")
        .ok()
        .map(|date| date.format("%Y-%m-%d").to_string())
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Fetches missing publications and caches them in the catalog.
#[derive(Clone)]
pub struct PublicationLoader {
    catalog: Catalog,
    fetcher: Arc<dyn PublicationFetcher>,
    config: PubmedConfig,
}

/// PMIDs mapped to stored publication ids, plus those that could not be loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedPublications {
    pub ids: BTreeMap<i64, i64>,
    pub not_loaded: BTreeSet<i64>,
}

impl PublicationLoader {
    pub fn new(catalog: Catalog, fetcher: Arc<dyn PublicationFetcher>, config: PubmedConfig) -> Self {
        Self {
            catalog,
            fetcher,
            config,
        }
    }

    /// Make sure every PMID has a stored publication, fetching the unknown ones.
    pub async fn load_pmids(&self, pmids: &BTreeSet<i64>) -> Result<LoadedPublications, AppError> {
        let mut loaded = LoadedPublications::default();
        if pmids.is_empty() {
            return Ok(loaded);
        }

        let requested: Vec<i64> = pmids.iter().copied().collect();
        for publication in self.catalog.get_publications_by_pmids(&requested).await? {
            if let Some(pmid) = publication.pmid {
                loaded.ids.insert(pmid, publication.id);
            }
        }

        let missing: Vec<i64> = requested
            .into_iter()
            .filter(|pmid| !loaded.ids.contains_key(pmid))
            .collect();
        if missing.is_empty() {
            return Ok(loaded);
        }
        tracing::info!(count = missing.len(), "Fetching new PMIDs");

        for batch in missing.chunks(self.config.batch_size.max(1)) {
            match self.fetch_with_retry(batch).await {
                Ok(fetched) => {
                    for publication in fetched {
                        let stored = self.catalog.upsert_publication(&publication).await?;
                        loaded.ids.insert(publication.pmid, stored.id);
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        batch_size = batch.len(),
                        error = %e,
                        "Giving up on publication batch"
                    );
                }
            }
        }

        loaded.not_loaded = missing
            .into_iter()
            .filter(|pmid| !loaded.ids.contains_key(pmid))
            .collect();
        if !loaded.not_loaded.is_empty() {
            tracing::warn!(pmids = ?loaded.not_loaded, "Publications could not be loaded");
        }

        Ok(loaded)
    }

    async fn fetch_with_retry(&self, batch: &[i64]) -> Result<Vec<NewPublication>, AppError> {
        let max_attempts = self.config.retries + 1;
        let mut last_error = None;

        for attempt in 0..max_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.config.backoff).await;
            }

            match self.fetcher.fetch(batch).await {
                Ok(publications) => return Ok(publications),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_attempts = max_attempts,
                        error = %e,
                        "Publication request failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| AppError::Upstream("Publication request never ran".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_esummary() {
        let body = serde_json::json!({
            "header": {"type": "esummary"},
            "result": {
                "uids": ["20671152", "99999999"],
                "20671152": {
                    "uid": "20671152",
                    "title": "Tumour suppressor genes.",
                    "authors": [{"name": "Smith J"}, {"name": "Doe A"}],
                    "source": "Nature",
                    "volume": "466",
                    "issue": "",
                    "pages": "12-19",
                    "sortpubdate": "2010/07/01 00:00"
                },
                "99999999": {"uid": "99999999", "error": "cannot get document summary"}
            }
        });

        let publications = parse_esummary(&body).unwrap();
        assert_eq!(publications.len(), 1);
        let publication = &publications[0];
        assert_eq!(publication.pmid, 20671152);
        assert_eq!(publication.authors, "Smith J, Doe A");
        assert_eq!(publication.journal, "Nature");
        assert_eq!(publication.date.as_deref(), Some("2010-07-01"));
        assert_eq!(publication.volume.as_deref(), Some("466"));
        assert_eq!(publication.issue, None);
    }

    #[test]
    fn test_parse_esummary_requires_result() {
        let body = serde_json::json!({"error": "API rate limit exceeded"});
        assert!(matches!(parse_esummary(&body), Err(AppError::Upstream(_))));
    }

    #[test]
    fn test_parse_sort_date() {
        assert_eq!(parse_sort_date("1998/11/20 00:00").as_deref(), Some("1998-11-20"));
        assert_eq!(parse_sort_date(""), None);
        assert_eq!(parse_sort_date("sometime"), None);
    }
}
