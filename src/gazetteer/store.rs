//! Read-only access to the gazetteer SQLite file.
//!
//! The file is produced by the ETL pipeline: a `places` table, an FTS5 index
//! `places_fts` over the name columns, and a `_metadata` key/value table
//! with `record_count` and `build_date`. The server never writes to it.
//!
//! The FTS index is built with the unicode61 tokenizer without diacritic
//! removal, so æ, ø and å survive as distinct letters.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OpenFlags, Row};
use serde::Serialize;

/// One place record as stored by the ETL.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceRecord {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alt_names: Vec<String>,
    pub lat: f64,
    pub lon: f64,
    pub place_class: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub municipality_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county_name: Option<String>,
    pub importance: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_county_seat: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_municipality_seat: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GazetteerError {
    #[error("Gazetteer file not found: {0}")]
    NotFound(String),

    #[error("Gazetteer query failed: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Build metadata recorded by the ETL.
#[derive(Debug, Clone, Default)]
pub struct StoreMetadata {
    pub record_count: u64,
    pub build_date: Option<String>,
}

/// The read-only place store. Reads are serialised on one connection;
/// lookups are indexed and fast.
#[derive(Debug)]
pub struct PlaceStore {
    conn: Mutex<Connection>,
    metadata: StoreMetadata,
}

const RECORD_COLUMNS: &str = "ssr_id, primary_name, alt_names, lat, lon, place_class, \
     municipality_code, municipality_name, county_name, importance_score, \
     is_county_seat, is_municipality_seat";

// Same columns, qualified with the source table. Needed when joined against
// `places_fts`, which also exposes `primary_name`/`alt_names` and would
// otherwise make those column names ambiguous.
const RECORD_COLUMNS_QUALIFIED: &str = "places.ssr_id, places.primary_name, places.alt_names, \
     places.lat, places.lon, places.place_class, places.municipality_code, \
     places.municipality_name, places.county_name, places.importance_score, \
     places.is_county_seat, places.is_municipality_seat";

impl PlaceStore {
    /// Open the gazetteer file read-only. Fails when the file is absent so
    /// the caller can continue without the resolver tool.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GazetteerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(GazetteerError::NotFound(path.display().to_string()));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        let metadata = read_metadata(&conn)?;
        tracing::info!(
            path = %path.display(),
            records = metadata.record_count,
            build_date = metadata.build_date.as_deref(),
            "Opened gazetteer store"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            metadata,
        })
    }

    pub fn metadata(&self) -> &StoreMetadata {
        &self.metadata
    }

    /// Case-insensitive equality on the primary name.
    pub fn find_exact_primary(&self, name: &str) -> Result<Vec<PlaceRecord>, GazetteerError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM places WHERE lower(primary_name) = lower(?1) \
             ORDER BY importance_score DESC",
            RECORD_COLUMNS
        ))?;
        let rows = stmt.query_map([name], record_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Case-insensitive membership in the alternative-names set.
    pub fn find_exact_alt(&self, name: &str) -> Result<Vec<PlaceRecord>, GazetteerError> {
        let conn = self.conn.lock().unwrap();
        // The JSON text match over-selects (substring); exact membership is
        // verified on the parsed list below.
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM places WHERE alt_names IS NOT NULL \
             AND instr(lower(alt_names), lower(?1)) > 0 \
             ORDER BY importance_score DESC",
            RECORD_COLUMNS
        ))?;
        let rows = stmt.query_map([name], record_from_row)?;
        let lowered = name.to_lowercase();
        let mut records = Vec::new();
        for record in rows {
            let record = record?;
            if record
                .alt_names
                .iter()
                .any(|alt| alt.to_lowercase() == lowered)
            {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Full-text search over the name columns. Returns records with their
    /// relevance rank; lower rank is a better match.
    pub fn find_full_text(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(PlaceRecord, f64)>, GazetteerError> {
        let Some(match_expr) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {}, bm25(places_fts) AS rank \
             FROM places_fts JOIN places ON places.rowid = places_fts.rowid \
             WHERE places_fts MATCH ?1 \
             ORDER BY rank LIMIT ?2",
            RECORD_COLUMNS_QUALIFIED
        ))?;
        let rows = stmt.query_map(rusqlite::params![match_expr, limit as i64], |row| {
            let record = record_from_row(row)?;
            let rank: f64 = row.get(12)?;
            // bm25 scores are more negative for better matches; expose the
            // magnitude so lower still means better but stays non-negative.
            Ok((record, rank.abs()))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<PlaceRecord> {
    let alt_names: Option<String> = row.get(2)?;
    let alt_names = alt_names
        .as_deref()
        .and_then(|raw| serde_json::from_str::<Vec<String>>(raw).ok())
        .unwrap_or_default();
    Ok(PlaceRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        alt_names,
        lat: row.get(3)?,
        lon: row.get(4)?,
        place_class: row.get(5)?,
        municipality_code: row.get(6)?,
        municipality_name: row.get(7)?,
        county_name: row.get(8)?,
        importance: row.get(9)?,
        is_county_seat: row.get::<_, i64>(10)? != 0,
        is_municipality_seat: row.get::<_, i64>(11)? != 0,
    })
}

fn read_metadata(conn: &Connection) -> Result<StoreMetadata, GazetteerError> {
    let mut metadata = StoreMetadata::default();
    let mut stmt = conn.prepare("SELECT key, value FROM _metadata")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for row in rows {
        let (key, value) = row?;
        match key.as_str() {
            "record_count" => metadata.record_count = value.parse().unwrap_or(0),
            "build_date" => metadata.build_date = Some(value),
            _ => {}
        }
    }
    Ok(metadata)
}

/// Build an FTS5 MATCH expression: each token quoted, the last as a prefix.
fn fts_match_expression(query: &str) -> Option<String> {
    let tokens: Vec<&str> = query
        .split_whitespace()
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return None;
    }
    let last = tokens.len() - 1;
    Some(
        tokens
            .iter()
            .enumerate()
            .map(|(i, token)| {
                let escaped = token.replace('"', "\"\"");
                if i == last {
                    format!("\"{}\"*", escaped)
                } else {
                    format!("\"{}\"", escaped)
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rusqlite::Connection;

    /// Create a gazetteer file with the ETL schema and a few rows.
    pub fn create_fixture(path: &std::path::Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE places (
                ssr_id TEXT PRIMARY KEY,
                primary_name TEXT NOT NULL,
                alt_names TEXT,
                lat REAL NOT NULL,
                lon REAL NOT NULL,
                place_class TEXT NOT NULL,
                municipality_code TEXT,
                municipality_name TEXT,
                county_name TEXT,
                population INTEGER,
                is_county_seat INTEGER NOT NULL DEFAULT 0,
                is_municipality_seat INTEGER NOT NULL DEFAULT 0,
                importance_score REAL NOT NULL DEFAULT 0
            );
            CREATE VIRTUAL TABLE places_fts USING fts5(
                primary_name, alt_names,
                content='places', content_rowid='rowid',
                tokenize = 'unicode61 remove_diacritics 0'
            );
            CREATE TABLE _metadata (key TEXT PRIMARY KEY, value TEXT);
            INSERT INTO _metadata VALUES ('record_count', '5'), ('build_date', '2025-05-01T00:00:00');
            "#,
        )
        .unwrap();

        let rows: &[(&str, &str, Option<&str>, f64, f64, &str, &str, &str, &str, i64, i64, f64)] = &[
            ("1", "Oslo", None, 59.91, 10.75, "city", "0301", "Oslo", "Oslo", 1, 1, 10.0),
            ("2", "Bergen", None, 60.39, 5.32, "city", "4601", "Bergen", "Vestland", 1, 1, 10.0),
            (
                "3",
                "Trondheim",
                Some(r#"["Nidaros","Trondhjem"]"#),
                63.43,
                10.40,
                "city",
                "5001",
                "Trondheim",
                "Trøndelag",
                1,
                1,
                10.0,
            ),
            ("4", "Oslebakke", None, 59.30, 10.42, "farm", "3911", "Færder", "Vestfold", 0, 0, 2.0),
            ("5", "Åsgård", None, 60.10, 11.00, "farm", "3030", "Lillestrøm", "Akershus", 0, 0, 2.0),
        ];
        for row in rows {
            conn.execute(
                "INSERT INTO places (ssr_id, primary_name, alt_names, lat, lon, place_class, \
                 municipality_code, municipality_name, county_name, is_county_seat, \
                 is_municipality_seat, importance_score) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7, row.8, row.9, row.10,
                    row.11
                ],
            )
            .unwrap();
        }
        conn.execute_batch(
            "INSERT INTO places_fts(rowid, primary_name, alt_names) \
             SELECT rowid, primary_name, coalesce(alt_names, '') FROM places;",
        )
        .unwrap();
    }
}
