//! SQLite document store
//!
//! This module provides a SQLite-based implementation of the DocumentStore trait.
//! Free-text filtering uses a registered `contains_ci` function so that
//! case folding covers accented characters, which `LIKE` does not.

use crate::document::{parse_timestamp, Category, Document, DocumentMetadata, DocumentStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{
    CategoryStats, CountBucket, DocumentFilter, DocumentStore, SortOrder, StorageError,
    StorageResult, StoreStatistics, YearCount,
};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;

const COLUMNS: &str = "numero, titulo, tipo, url_original, archivo_local, ruta_completa, \
    tamano_bytes, tamano_mb, fecha_descarga, fuente, texto_contenido, archivo_existe, estado, \
    extension, categoria, anio";

/// SQLite storage backend
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Opens (or creates) a document store
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Self::from_connection(conn)
    }

    /// Creates an in-memory store
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        register_functions(&conn)?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn write_document(&mut self, document: &Document, replace: bool) -> StorageResult<()> {
        document
            .check_invariants()
            .map_err(StorageError::InvalidDocument)?;

        let verb = if replace {
            "INSERT OR REPLACE"
        } else {
            "INSERT"
        };
        let sql = format!(
            "{} INTO documents ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            verb, COLUMNS
        );

        let result = self.conn.execute(
            &sql,
            params![
                document.id,
                document.title,
                document.file_type,
                document.source_url,
                document.file_name,
                document.local_path,
                document.size_bytes as i64,
                document.size_mb,
                document.downloaded_at_string(),
                document.source,
                document.text,
                document.file_exists,
                document.status.to_db_string(),
                document.metadata.extension,
                document.metadata.category.label(),
                document.metadata.year,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StorageError::ConstraintViolation(format!(
                    "numero {} already exists",
                    document.id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn select_documents(
        &self,
        sql: &str,
        args: &[String],
    ) -> StorageResult<Vec<Document>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), DocumentRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }
}

/// Registers the Unicode-aware substring matcher
fn register_functions(conn: &Connection) -> StorageResult<()> {
    conn.create_scalar_function(
        "contains_ci",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let haystack: Option<String> = ctx.get(0)?;
            let needle: Option<String> = ctx.get(1)?;
            Ok(match (haystack, needle) {
                (Some(h), Some(n)) => h.to_lowercase().contains(&n.to_lowercase()),
                _ => false,
            })
        },
    )?;
    Ok(())
}

/// Builds the WHERE clause and its positional arguments
fn where_clause(filter: &DocumentFilter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut args = Vec::new();

    if let Some(text) = &filter.text {
        clauses.push(
            "(contains_ci(titulo, ?) OR contains_ci(texto_contenido, ?) \
             OR contains_ci(tipo, ?) OR contains_ci(categoria, ?))",
        );
        args.extend(std::iter::repeat(text.clone()).take(4));
    }

    if let Some(category) = &filter.category {
        clauses.push("categoria = ?");
        args.push(category.clone());
    }

    if let Some(file_type) = &filter.file_type {
        clauses.push("tipo = ?");
        args.push(file_type.clone());
    }

    if clauses.is_empty() {
        (String::new(), args)
    } else {
        (format!(" WHERE {}", clauses.join(" AND ")), args)
    }
}

fn order_clause(sort: SortOrder) -> &'static str {
    match sort {
        SortOrder::Relevance | SortOrder::DateDesc => " ORDER BY fecha_descarga DESC, numero DESC",
        SortOrder::DateAsc => " ORDER BY fecha_descarga ASC, numero ASC",
        SortOrder::Title => " ORDER BY titulo ASC, numero ASC",
    }
}

/// Raw column values of one `documents` row
struct DocumentRow {
    id: i64,
    title: String,
    file_type: String,
    source_url: String,
    file_name: String,
    local_path: String,
    size_bytes: i64,
    size_mb: f64,
    downloaded_at: String,
    source: String,
    text: String,
    file_exists: bool,
    status: String,
    extension: String,
    category: String,
    year: Option<i32>,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            file_type: row.get(2)?,
            source_url: row.get(3)?,
            file_name: row.get(4)?,
            local_path: row.get(5)?,
            size_bytes: row.get(6)?,
            size_mb: row.get(7)?,
            downloaded_at: row.get(8)?,
            source: row.get(9)?,
            text: row.get(10)?,
            file_exists: row.get(11)?,
            status: row.get(12)?,
            extension: row.get(13)?,
            category: row.get(14)?,
            year: row.get(15)?,
        })
    }

    fn into_document(self) -> StorageResult<Document> {
        let corrupt = |what: &str, value: &str| {
            StorageError::Corrupt(format!("document {}: bad {} '{}'", self.id, what, value))
        };

        let downloaded_at =
            parse_timestamp(&self.downloaded_at).ok_or_else(|| corrupt("fecha_descarga", &self.downloaded_at))?;
        let status =
            DocumentStatus::from_db_string(&self.status).ok_or_else(|| corrupt("estado", &self.status))?;
        let category =
            Category::from_label(&self.category).ok_or_else(|| corrupt("categoria", &self.category))?;

        let document = Document {
            id: self.id,
            title: self.title,
            file_type: self.file_type,
            source_url: self.source_url,
            file_name: self.file_name,
            local_path: self.local_path,
            size_bytes: self.size_bytes.max(0) as u64,
            size_mb: self.size_mb,
            downloaded_at,
            source: self.source,
            text: self.text,
            file_exists: self.file_exists,
            status,
            metadata: DocumentMetadata {
                extension: self.extension,
                category,
                year: self.year,
            },
        };

        document
            .check_invariants()
            .map_err(StorageError::Corrupt)?;
        Ok(document)
    }
}

impl DocumentStore for SqliteStore {
    fn insert_document(&mut self, document: &Document) -> StorageResult<()> {
        self.write_document(document, false)
    }

    fn upsert_document(&mut self, document: &Document) -> StorageResult<()> {
        self.write_document(document, true)
    }

    fn get_document(&self, id: i64) -> StorageResult<Option<Document>> {
        let sql = format!("SELECT {} FROM documents WHERE numero = ?1", COLUMNS);
        let row = self
            .conn
            .query_row(&sql, params![id], DocumentRow::from_row)
            .optional()?;

        row.map(DocumentRow::into_document).transpose()
    }

    fn query_documents(
        &self,
        filter: &DocumentFilter,
        sort: SortOrder,
        skip: usize,
        limit: usize,
    ) -> StorageResult<Vec<Document>> {
        let (where_sql, args) = where_clause(filter);
        let sql = format!(
            "SELECT {} FROM documents{}{} LIMIT {} OFFSET {}",
            COLUMNS,
            where_sql,
            order_clause(sort),
            limit,
            skip
        );
        self.select_documents(&sql, &args)
    }

    fn count_documents(&self, filter: &DocumentFilter) -> StorageResult<u64> {
        let (where_sql, args) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM documents{}", where_sql);
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(args.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn next_id(&self) -> StorageResult<i64> {
        let next = self.conn.query_row(
            "SELECT COALESCE(MAX(numero), 0) + 1 FROM documents",
            [],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    fn update_text(&mut self, id: i64, text: &str) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents SET texto_contenido = ?1 WHERE numero = ?2",
            params![text, id],
        )?;

        if changed == 0 {
            return Err(StorageError::DocumentNotFound(id));
        }
        Ok(())
    }

    fn statistics(&self, recent_limit: usize) -> StorageResult<StoreStatistics> {
        let (total_documents, total_size_mb): (i64, f64) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(tamano_mb), 0.0) FROM documents",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let mut stmt = self.conn.prepare(
            "SELECT categoria, COUNT(*), COALESCE(SUM(tamano_mb), 0.0) FROM documents
             GROUP BY categoria ORDER BY COUNT(*) DESC, categoria ASC",
        )?;
        let categories = stmt
            .query_map([], |row| {
                Ok(CategoryStats {
                    name: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                    size_mb: round2(row.get(2)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT tipo, COUNT(*) FROM documents GROUP BY tipo ORDER BY COUNT(*) DESC, tipo ASC",
        )?;
        let types = stmt
            .query_map([], |row| {
                Ok(CountBucket {
                    name: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut stmt = self.conn.prepare(
            "SELECT anio, COUNT(*) FROM documents WHERE anio IS NOT NULL
             GROUP BY anio ORDER BY anio DESC",
        )?;
        let years = stmt
            .query_map([], |row| {
                Ok(YearCount {
                    year: row.get(0)?,
                    count: row.get::<_, i64>(1)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let recent = self.query_documents(
            &DocumentFilter::default(),
            SortOrder::DateDesc,
            0,
            recent_limit,
        )?;

        Ok(StoreStatistics {
            total_documents: total_documents as u64,
            total_size_mb: round2(total_size_mb),
            categories,
            types,
            years,
            recent,
        })
    }

    fn scan_titles(&self, needle: &str, limit: usize) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT titulo FROM documents WHERE contains_ci(titulo, ?1)
             ORDER BY titulo ASC LIMIT ?2",
        )?;
        let titles = stmt
            .query_map(params![needle, limit as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(titles)
    }

    fn documents_needing_text(&self, min_chars: usize) -> StorageResult<Vec<Document>> {
        let sql = format!(
            "SELECT {} FROM documents WHERE length(texto_contenido) < {} ORDER BY numero ASC",
            COLUMNS, min_chars
        );
        self.select_documents(&sql, &[])
    }

    fn all_documents(&self) -> StorageResult<Vec<Document>> {
        let sql = format!("SELECT {} FROM documents ORDER BY numero ASC", COLUMNS);
        self.select_documents(&sql, &[])
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
