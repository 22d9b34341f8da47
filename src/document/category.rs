//! Title-driven document classification
//!
//! Categories are checked in declaration order against the lower-cased
//! title; the first bucket with a matching keyword wins.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Fixed set of document categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Manuals and Procedures")]
    ManualsAndProcedures,

    #[serde(rename = "Resolutions")]
    Resolutions,

    #[serde(rename = "Codes and Regulations")]
    CodesAndRegulations,

    #[serde(rename = "Management Reports")]
    ManagementReports,

    #[serde(rename = "Bulletins and Publications")]
    BulletinsAndPublications,

    #[serde(rename = "Guides and Protocols")]
    GuidesAndProtocols,

    #[serde(rename = "Other Documents")]
    OtherDocuments,
}

/// Keyword buckets in match order. `OtherDocuments` is the fallback and has none.
const KEYWORD_BUCKETS: &[(Category, &[&str])] = &[
    (
        Category::ManualsAndProcedures,
        &["manual", "funciones", "procedimiento"],
    ),
    (Category::Resolutions, &["resolución", "resolucion"]),
    (
        Category::CodesAndRegulations,
        &["código", "codigo", "disciplinario"],
    ),
    (
        Category::ManagementReports,
        &["informe", "vigilancia", "gestión"],
    ),
    (
        Category::BulletinsAndPublications,
        &["procurando", "boletín", "boletin"],
    ),
    (
        Category::GuidesAndProtocols,
        &["guía", "guia", "cartilla", "protocolo"],
    ),
];

impl Category {
    /// All categories, in classification order
    pub const ALL: [Category; 7] = [
        Self::ManualsAndProcedures,
        Self::Resolutions,
        Self::CodesAndRegulations,
        Self::ManagementReports,
        Self::BulletinsAndPublications,
        Self::GuidesAndProtocols,
        Self::OtherDocuments,
    ];

    /// Classifies a document by its title
    ///
    /// # Arguments
    ///
    /// * `title` - The document title (any case)
    ///
    /// # Returns
    ///
    /// The first category whose keyword occurs in the title, or `OtherDocuments`
    pub fn classify(title: &str) -> Self {
        let lowered = title.to_lowercase();

        KEYWORD_BUCKETS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
            .map(|(category, _)| *category)
            .unwrap_or(Self::OtherDocuments)
    }

    /// Returns the label used on the wire and in the store
    pub fn label(&self) -> &'static str {
        match self {
            Self::ManualsAndProcedures => "Manuals and Procedures",
            Self::Resolutions => "Resolutions",
            Self::CodesAndRegulations => "Codes and Regulations",
            Self::ManagementReports => "Management Reports",
            Self::BulletinsAndPublications => "Bulletins and Publications",
            Self::GuidesAndProtocols => "Guides and Protocols",
            Self::OtherDocuments => "Other Documents",
        }
    }

    /// Parses a category from its label
    ///
    /// Returns None if the label doesn't match any known category.
    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == s)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"20\d{2}").expect("static year pattern"))
}

/// Extracts the first `20xx` token from a title
pub fn extract_year(title: &str) -> Option<i32> {
    year_pattern()
        .find(title)
        .and_then(|m| m.as_str().parse().ok())
}
