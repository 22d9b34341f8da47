use crate::document::category::{extract_year, Category};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp format used for `fecha_descarga` everywhere it leaves the process
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Availability of a document's local file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// The file was downloaded and is present locally
    Available,
    /// The download failed or the file is missing
    Error,
}

impl DocumentStatus {
    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Error => "error",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "available" => Some(Self::Available),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Derived metadata attached to every document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Lower-cased file extension, without the dot
    pub extension: String,

    #[serde(rename = "categoria")]
    pub category: Category,

    #[serde(rename = "año", default)]
    pub year: Option<i32>,
}

/// A materialized document, as persisted in the store and mirrored into the index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Sequential identifier, unique and stable once assigned
    #[serde(rename = "numero")]
    pub id: i64,

    #[serde(rename = "titulo")]
    pub title: String,

    /// Upper-cased extension label (PDF, DOCX, ...)
    #[serde(rename = "tipo")]
    pub file_type: String,

    #[serde(rename = "url_original")]
    pub source_url: String,

    #[serde(rename = "archivo_local")]
    pub file_name: String,

    #[serde(rename = "ruta_completa")]
    pub local_path: String,

    #[serde(rename = "tamano_bytes")]
    pub size_bytes: u64,

    #[serde(rename = "tamano_mb")]
    pub size_mb: f64,

    #[serde(rename = "fecha_descarga", with = "date_format")]
    pub downloaded_at: NaiveDateTime,

    #[serde(rename = "fuente")]
    pub source: String,

    #[serde(rename = "texto_contenido", default)]
    pub text: String,

    #[serde(rename = "archivo_existe")]
    pub file_exists: bool,

    #[serde(rename = "estado")]
    pub status: DocumentStatus,

    #[serde(rename = "metadatos")]
    pub metadata: DocumentMetadata,
}

/// Raw facts known after a download attempt, before derivation
#[derive(Debug, Clone)]
pub struct DocumentDraft {
    pub id: i64,
    pub title: String,
    pub file_type: String,
    pub source_url: String,
    pub file_name: String,
    pub local_path: String,
    pub size_bytes: u64,
    pub downloaded_at: NaiveDateTime,
    pub source: String,
    pub text: String,
    pub file_exists: bool,
}

impl Document {
    /// Builds a document from a draft, deriving size, status and metadata
    ///
    /// A draft whose file does not exist always yields an `Error` document
    /// with empty text.
    pub fn from_draft(draft: DocumentDraft) -> Self {
        let category = Category::classify(&draft.title);
        let year = extract_year(&draft.title);
        let (status, text) = if draft.file_exists {
            (DocumentStatus::Available, draft.text)
        } else {
            (DocumentStatus::Error, String::new())
        };

        Self {
            id: draft.id,
            metadata: DocumentMetadata {
                extension: draft.file_type.to_lowercase(),
                category,
                year,
            },
            size_mb: bytes_to_mb(draft.size_bytes),
            title: draft.title,
            file_type: draft.file_type,
            source_url: draft.source_url,
            file_name: draft.file_name,
            local_path: draft.local_path,
            size_bytes: draft.size_bytes,
            downloaded_at: draft.downloaded_at,
            source: draft.source,
            text,
            file_exists: draft.file_exists,
            status,
        }
    }

    /// Updates the file/text state after a later extraction pass
    pub fn set_file_state(&mut self, file_exists: bool, size_bytes: u64, text: String) {
        self.file_exists = file_exists;
        self.size_bytes = size_bytes;
        self.size_mb = bytes_to_mb(size_bytes);
        if file_exists {
            self.status = DocumentStatus::Available;
            self.text = text;
        } else {
            self.status = DocumentStatus::Error;
            self.text = String::new();
        }
    }

    /// Checks the record-level invariants
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The record may be persisted
    /// * `Err(String)` - Description of the violated invariant
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.id < 1 {
            return Err(format!("numero must be positive, got {}", self.id));
        }

        if !self.file_exists && self.status != DocumentStatus::Error {
            return Err(format!(
                "document {} has no local file but status '{}'",
                self.id, self.status
            ));
        }

        Ok(())
    }

    /// Identifier used for the search index entry
    pub fn index_id(&self) -> String {
        format!("doc_{}", self.id)
    }

    /// Formats the download timestamp the way it is stored
    pub fn downloaded_at_string(&self) -> String {
        self.downloaded_at.format(DATE_FORMAT).to_string()
    }
}

/// Converts a byte count to megabytes rounded to two decimals
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
}

/// Parses a stored `fecha_descarga` value
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATE_FORMAT).ok()
}

mod date_format {
    use super::DATE_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(DATE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, DATE_FORMAT).map_err(serde::de::Error::custom)
    }
}
