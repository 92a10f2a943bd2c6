//! Tribe: versioned gene set collections.
//!
//! Genesets carry an append-only, hash-chained history of annotation sets.
//! This crate holds the storage, identifier resolution and version chain
//! logic; the web layer drives it through [`service::Tribe`].

pub mod annotations;
pub mod chain;
pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod publications;
pub mod resolver;
pub mod service;

pub use errors::AppError;
pub use service::Tribe;
