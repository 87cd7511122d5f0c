//! `agriops-core`: identifiers and the domain error model shared by the
//! console's auth crates.
//!
//! This crate contains **pure** primitives (no IO, no async).

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{CollectionPointId, FactoryId, RegionId, SubjectId};
