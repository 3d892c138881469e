//! Domain layer - pure deduplication logic with no runtime dependencies.
//!
//! This layer contains the core concepts of the engine:
//! - Log records and typed attribute values
//! - Content digests (what makes two records "the same")
//! - Cache entries and the duplicate summaries built from them

pub mod digest;
pub mod entry;
pub mod record;
