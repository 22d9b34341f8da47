//! Database schema definitions
//!
//! This module contains the SQL schema for the document store.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per materialized document
CREATE TABLE IF NOT EXISTS documents (
    numero INTEGER PRIMARY KEY,
    titulo TEXT NOT NULL,
    tipo TEXT NOT NULL,
    url_original TEXT NOT NULL,
    archivo_local TEXT NOT NULL,
    ruta_completa TEXT NOT NULL,
    tamano_bytes INTEGER NOT NULL DEFAULT 0,
    tamano_mb REAL NOT NULL DEFAULT 0,
    fecha_descarga TEXT NOT NULL,
    fuente TEXT NOT NULL,
    texto_contenido TEXT NOT NULL DEFAULT '',
    archivo_existe INTEGER NOT NULL,
    estado TEXT NOT NULL CHECK (estado IN ('available', 'error')),
    extension TEXT NOT NULL,
    categoria TEXT NOT NULL,
    anio INTEGER,
    CHECK (archivo_existe = 1 OR estado = 'error')
);

CREATE INDEX IF NOT EXISTS idx_documents_titulo ON documents(titulo);
CREATE INDEX IF NOT EXISTS idx_documents_tipo ON documents(tipo);
CREATE INDEX IF NOT EXISTS idx_documents_categoria ON documents(categoria);
CREATE INDEX IF NOT EXISTS idx_documents_fecha ON documents(fecha_descarga);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
