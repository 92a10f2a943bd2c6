//! Data models for Tribe.
//!
//! Plain records shared by the repositories and the service layer.

mod gene;
mod geneset;
mod publication;
mod version;

pub use gene::*;
pub use geneset::*;
pub use publication::*;
pub use version::*;
