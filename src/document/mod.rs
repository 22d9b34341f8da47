//! Document model
//!
//! A [`Document`] is the unit persisted by the store and mirrored into the
//! search index. Category and year are derived from the title when the
//! document is built.

mod category;
mod model;

pub use category::{extract_year, Category};
pub use model::{
    bytes_to_mb, parse_timestamp, Document, DocumentDraft, DocumentMetadata, DocumentStatus,
    DATE_FORMAT,
};
