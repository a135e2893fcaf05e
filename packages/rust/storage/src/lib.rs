//! libSQL storage layer (local file, offline mode).
//!
//! The [`Storage`] struct wraps a libSQL database holding target sectors,
//! company profiles, and saved leads.
//!
//! **Access rules:**
//! - One connection per handle. Every write takes the handle's write lock;
//!   reads do not.
//! - Rows are soft-deleted (`is_active = 0`) and are then invisible to
//!   every read.
//! - [`Storage::open_readonly`] rejects all writes.

mod leads;
mod migrations;
mod profiles;
mod sectors;

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};
use tokio::sync::Mutex;

use leadsense_shared::{LeadsenseError, Result};

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    write_lock: Mutex<()>,
    readonly: bool,
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| LeadsenseError::io(parent, e))?;
        }

        let storage = Self::connect(path, false).await?;
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Open an existing database at `path` in read-only mode.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, readonly: bool) -> Result<Self> {
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        Ok(Self {
            db,
            conn,
            write_lock: Mutex::new(()),
            readonly,
        })
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        LeadsenseError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    /// Ensure we're in read-write mode before writing.
    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(LeadsenseError::Storage(
                "database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }

    /// Roll back the open transaction. A failed rollback is logged, since it
    /// can leave the shared connection inside a transaction.
    async fn rollback(&self) -> bool {
        match self.conn.execute("ROLLBACK", params![]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "rollback failed");
                false
            }
        }
    }

    /// Run a single-value `COUNT(*)`-style query.
    async fn query_count(&self, sql: &str, params: impl libsql::params::IntoParams) -> Result<u64> {
        let mut rows = self.conn.query(sql, params).await.map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Row helpers
// ---------------------------------------------------------------------------

pub(crate) fn db_err(e: libsql::Error) -> LeadsenseError {
    LeadsenseError::Storage(e.to_string())
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
pub(crate) fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_rfc3339() -> String {
    format_timestamp(Utc::now())
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LeadsenseError::Storage(format!("invalid date '{s}': {e}")))
}

pub(crate) fn get_string(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx).map_err(db_err)
}

/// Nullable text column.
pub(crate) fn get_opt_string(row: &libsql::Row, idx: i32) -> Option<String> {
    row.get::<String>(idx).ok()
}

pub(crate) fn get_timestamp(row: &libsql::Row, idx: i32) -> Result<DateTime<Utc>> {
    parse_timestamp(&get_string(row, idx)?)
}

/// Decode a JSON string-array column; NULL or empty means no entries.
pub(crate) fn get_string_list(row: &libsql::Row, idx: i32) -> Result<Vec<String>> {
    match get_opt_string(row, idx) {
        Some(json) if !json.is_empty() => serde_json::from_str(&json)
            .map_err(|e| LeadsenseError::Storage(format!("invalid JSON list column: {e}"))),
        _ => Ok(Vec::new()),
    }
}

pub(crate) fn encode_string_list(items: &[String]) -> Result<String> {
    serde_json::to_string(items)
        .map_err(|e| LeadsenseError::Storage(format!("failed to encode list: {e}")))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Storage;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    pub async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("leadsense_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::test_storage;
    use super::*;
    use leadsense_shared::PlainCompany;
    use uuid::Uuid;

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        let version = storage.get_schema_version().await;
        assert_eq!(version, 1);
    }

    #[tokio::test]
    async fn rollback_reports_outcome() {
        let storage = test_storage().await;
        assert!(!storage.rollback().await, "no transaction is open");

        storage.conn.execute("BEGIN", params![]).await.unwrap();
        assert!(storage.rollback().await);
        assert!(!storage.rollback().await);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("leadsense_test_{}.db", Uuid::now_v7()));
        let s1 = Storage::open(&tmp).await.expect("first open");
        drop(s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn creates_parent_directories() {
        let dir = std::env::temp_dir().join(format!("leadsense_dir_{}", Uuid::now_v7()));
        let path = dir.join("nested").join("leadsense.db");
        Storage::open(&path).await.expect("open nested db");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn readonly_rejects_writes() {
        let tmp = std::env::temp_dir().join(format!("leadsense_test_{}.db", Uuid::now_v7()));
        let rw = Storage::open(&tmp).await.unwrap();
        rw.get_or_create_sector("Dental practices", None, None)
            .await
            .unwrap();
        drop(rw);

        let ro = Storage::open_readonly(&tmp).await.unwrap();
        assert_eq!(ro.list_sectors().await.unwrap().len(), 1);

        let lead = PlainCompany {
            company_name: "Acme".into(),
            ..Default::default()
        };
        let result = ro.insert_lead(&lead, None, &[]).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("read-only"));
    }

    #[test]
    fn timestamp_roundtrip() {
        let now = parse_timestamp("2026-03-01T08:30:00.250000Z").unwrap();
        assert_eq!(format_timestamp(now), "2026-03-01T08:30:00.250000Z");
        assert!(parse_timestamp("yesterday").is_err());
    }
}
