//! SQLite-based record sink
//!
//! One row per emitted record. Images and features are stored as JSON arrays
//! so the table stays flat; error records fill only `url`, `scraped_at`, `error` and
//! `original_address`.

use crate::extract::PropertyRecord;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use rusqlite::{params, Connection};
use std::path::Path;

/// SQL schema for the records table
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS properties (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    address TEXT,
    suburb TEXT,
    state TEXT,
    postcode TEXT,
    full_address TEXT,
    property_status TEXT,
    price INTEGER,
    price_text TEXT,
    property_type TEXT,
    bedrooms INTEGER,
    bathrooms INTEGER,
    parking_spaces INTEGER,
    land_size INTEGER,
    building_size INTEGER,
    description TEXT,
    features TEXT NOT NULL,
    agent TEXT,
    agency_name TEXT,
    listing_id TEXT,
    images TEXT NOT NULL,
    image_count INTEGER NOT NULL,
    original_address TEXT,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_properties_url ON properties(url);
CREATE INDEX IF NOT EXISTS idx_properties_listing ON properties(listing_id);
"#;

/// SQLite record sink
pub struct SqliteSink {
    conn: Option<Connection>,
    written: usize,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Database opened and schema in place
    /// * `Err(OutputError)` - Failed to open or initialize the database
    pub fn open(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Some(conn),
            written: 0,
        })
    }

    /// Creates an in-memory database
    pub fn open_in_memory() -> OutputResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Some(conn),
            written: 0,
        })
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Number of rows in the table
    pub fn count(&self) -> OutputResult<u64> {
        let conn = self.conn.as_ref().ok_or(OutputError::Finalized)?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM properties", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl RecordSink for SqliteSink {
    fn append(&mut self, record: &PropertyRecord) -> OutputResult<()> {
        let conn = self.conn.as_ref().ok_or(OutputError::Finalized)?;
        let images = serde_json::to_string(&record.images)?;
        let features = serde_json::to_string(&record.features)?;

        conn.execute(
            "INSERT INTO properties (
                url, scraped_at, address, suburb, state, postcode, full_address,
                property_status, price, price_text, property_type, bedrooms, bathrooms,
                parking_spaces, land_size, building_size, description, features, agent,
                agency_name, listing_id, images, image_count, original_address, error
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
            params![
                record.url,
                record.scraped_at.to_rfc3339(),
                record.address,
                record.suburb,
                record.state,
                record.postcode,
                record.full_address,
                record.property_status,
                record.price,
                record.price_text,
                record.property_type,
                record.bedrooms,
                record.bathrooms,
                record.parking_spaces,
                record.land_size,
                record.building_size,
                record.description,
                features,
                record.agent,
                record.agency_name,
                record.listing_id,
                images,
                record.image_count as i64,
                record.original_address,
                record.error,
            ],
        )?;

        self.written += 1;
        Ok(())
    }

    fn finalize(&mut self) -> OutputResult<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| OutputError::Database(e))?;
            tracing::info!("Wrote {} records to SQLite", self.written);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_records() {
        let mut sink = SqliteSink::open_in_memory().unwrap();

        let mut record = PropertyRecord::new("https://www.domain.com.au/listing-1");
        record.price = Some(650_000);
        record.bedrooms = Some(3);
        record.images = vec!["https://img.domain.com.au/1.jpg".to_string()];
        record.image_count = 1;

        sink.append(&record).unwrap();
        sink.append(&PropertyRecord::failed(
            "https://www.domain.com.au/sale/?street=1",
            "blocked",
            Some("1 Main St".to_string()),
        ))
        .unwrap();

        assert_eq!(sink.count().unwrap(), 2);
        assert_eq!(sink.written(), 2);
    }

    #[test]
    fn test_row_contents() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        let mut record = PropertyRecord::new("https://www.domain.com.au/listing-1");
        record.images = vec!["https://img.domain.com.au/1.jpg".to_string()];
        record.image_count = 1;
        record.price = Some(485_000);
        sink.append(&record).unwrap();

        let conn = sink.conn.as_ref().unwrap();
        let (price, images): (Option<i64>, String) = conn
            .query_row("SELECT price, images FROM properties", [], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .unwrap();

        assert_eq!(price, Some(485_000));
        assert_eq!(images, r#"["https://img.domain.com.au/1.jpg"]"#);
    }

    #[test]
    fn test_listing_detail_columns() {
        let mut sink = SqliteSink::open_in_memory().unwrap();
        let mut record = PropertyRecord::new("https://www.domain.com.au/listing-2");
        record.property_status = Some("Under offer".to_string());
        record.features = vec!["Pool".to_string(), "Shed".to_string()];
        record.agency_name = Some("Harbour Realty".to_string());
        sink.append(&record).unwrap();

        let conn = sink.conn.as_ref().unwrap();
        let (status, features, agent, agency): (String, String, Option<String>, String) = conn
            .query_row(
                "SELECT property_status, features, agent, agency_name FROM properties",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .unwrap();

        assert_eq!(status, "Under offer");
        assert_eq!(features, r#"["Pool","Shed"]"#);
        assert_eq!(agent, None);
        assert_eq!(agency, "Harbour Realty");
    }

    #[test]
    fn test_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("properties.db");

        let mut sink = SqliteSink::open(&path).unwrap();
        sink.append(&PropertyRecord::new("https://example.com/listing-1"))
            .unwrap();
        sink.finalize().unwrap();

        let reopened = SqliteSink::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }
}
