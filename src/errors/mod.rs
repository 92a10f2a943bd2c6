//! Error handling module for Tribe.
//!
//! Provides centralized error types with stable error codes and a client/server split.

use serde::{Deserialize, Serialize};

use crate::models::ResolutionReport;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const NO_PARENT_VERSION: &str = "NO_PARENT_VERSION_SPECIFIED";
    pub const NONE_GENE: &str = "VERSION_CONTAINS_NONE_GENE";
    pub const DUPLICATE_SLUG: &str = "DUPLICATE_SLUG";
    pub const CONFLICT: &str = "CONFLICT";
    pub const NOTHING_RESOLVED: &str = "NOTHING_RESOLVED";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Guidance returned when a collection URL is already taken.
pub const DUPLICATE_SLUG_MESSAGE: &str = "There is already one collection with this url created \
     by this account. Please choose a different collection title.";

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Resource not found
    NotFound(String),
    /// Validation error
    Validation(String),
    /// Bad request
    BadRequest(String),
    /// A geneset that already has versions was given a new version without a parent
    NoParentVersionSpecified,
    /// An annotation resolved to no gene
    VersionContainsNoneGene,
    /// `(slug, creator)` is already taken
    DuplicateSlug { slug: String },
    /// Unique constraint violation or stale tip
    Conflict(String),
    /// No submitted gene resolved; carries the per-token report
    NothingResolved(ResolutionReport),
    /// External service failure
    Upstream(String),
    /// Database error
    Database(String),
    /// Internal error
    Internal(String),
}

impl AppError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::BadRequest(_) => codes::BAD_REQUEST,
            AppError::NoParentVersionSpecified => codes::NO_PARENT_VERSION,
            AppError::VersionContainsNoneGene => codes::NONE_GENE,
            AppError::DuplicateSlug { .. } => codes::DUPLICATE_SLUG,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::NothingResolved(_) => codes::NOTHING_RESOLVED,
            AppError::Upstream(_) => codes::UPSTREAM_ERROR,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            AppError::NotFound(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::NoParentVersionSpecified => "This geneset already has at least one version. \
                 You must specify the parent version of this new version."
                .to_string(),
            AppError::VersionContainsNoneGene => {
                "A version cannot contain an annotation without a gene.".to_string()
            }
            AppError::DuplicateSlug { .. } => DUPLICATE_SLUG_MESSAGE.to_string(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::NothingResolved(report) => format!(
                "None of the submitted genes could be resolved ({} not found, {} ambiguous)",
                report.not_found_genes.len(),
                report.ambiguous_genes.len()
            ),
            AppError::Upstream(msg) => msg.clone(),
            AppError::Database(msg) => msg.clone(),
            AppError::Internal(msg) => msg.clone(),
        }
    }

    /// Whether the caller caused this error and should change the request.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            AppError::Upstream(_) | AppError::Database(_) | AppError::Internal(_)
        )
    }

    /// Structured details for errors that carry more than a message.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::DuplicateSlug { slug } => Some(serde_json::json!({ "slug": slug })),
            AppError::NothingResolved(report) => serde_json::to_value(report).ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                tracing::debug!("Unique constraint violation: {}", db_err.message());
                return AppError::Conflict(format!(
                    "Unique constraint violation: {}",
                    db_err.message()
                ));
            }
        }
        tracing::error!("Database error: {:?}", err);
        AppError::Database(format!("Database error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("JSON error: {:?}", err);
        AppError::Internal(format!("JSON error: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        tracing::warn!("Upstream request error: {:?}", err);
        AppError::Upstream(format!("Upstream request failed: {}", err))
    }
}

/// Error details in a response envelope for the outer layer.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&AppError> for ErrorDetails {
    fn from(error: &AppError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.message(),
            details: error.details(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(AppError::NoParentVersionSpecified.is_client_error());
        assert!(AppError::VersionContainsNoneGene.is_client_error());
        assert!(AppError::DuplicateSlug {
            slug: "x".to_string()
        }
        .is_client_error());
        assert!(!AppError::Database("boom".to_string()).is_client_error());
        assert!(!AppError::Upstream("down".to_string()).is_client_error());
    }

    #[test]
    fn test_error_details_carry_report() {
        let mut report = ResolutionReport::default();
        report.not_found_genes.insert("NOPE".to_string());
        let err = AppError::NothingResolved(report);

        let details = ErrorDetails::from(&err);
        assert_eq!(details.code, codes::NOTHING_RESOLVED);
        let body = details.details.unwrap();
        assert_eq!(body["notFoundGenes"][0], "NOPE");
    }

    #[test]
    fn test_duplicate_slug_message_asks_for_new_title() {
        let err = AppError::DuplicateSlug {
            slug: "dna-repair".to_string(),
        };
        assert!(err.message().contains("choose a different collection title"));
        assert_eq!(err.to_string(), format!("DUPLICATE_SLUG: {}", DUPLICATE_SLUG_MESSAGE));
    }
}
