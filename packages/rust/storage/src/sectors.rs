//! Target sector persistence.

use libsql::params;

use leadsense_shared::{Result, Sector};

use crate::{Storage, db_err, get_opt_string, get_string, get_timestamp, now_rfc3339};

const SECTOR_COLUMNS: &str = "id, name, description, relevance_reason, created_at, updated_at";

impl Storage {
    /// Return the id of the active sector called `name`, creating it if needed.
    ///
    /// A soft-deleted sector with the same name is revived and its
    /// description fields refreshed.
    pub async fn get_or_create_sector(
        &self,
        name: &str,
        description: Option<&str>,
        relevance_reason: Option<&str>,
    ) -> Result<i64> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;

        let mut rows = self
            .conn
            .query(
                "SELECT id, is_active FROM sectors WHERE name = ?1",
                params![name],
            )
            .await
            .map_err(db_err)?;

        if let Some(row) = rows.next().await.map_err(db_err)? {
            let id = row.get::<i64>(0).map_err(db_err)?;
            let active = row.get::<i64>(1).map_err(db_err)? != 0;
            if !active {
                self.conn
                    .execute(
                        "UPDATE sectors SET is_active = 1, description = ?1, relevance_reason = ?2, updated_at = ?3 WHERE id = ?4",
                        params![description, relevance_reason, now_rfc3339(), id],
                    )
                    .await
                    .map_err(db_err)?;
            }
            return Ok(id);
        }

        let now = now_rfc3339();
        self.conn
            .execute(
                "INSERT INTO sectors (name, description, relevance_reason, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![name, description, relevance_reason, now.as_str(), now.as_str()],
            )
            .await
            .map_err(db_err)?;

        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, name, "sector created");
        Ok(id)
    }

    /// Get an active sector by id.
    pub async fn get_sector(&self, id: i64) -> Result<Option<Sector>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SECTOR_COLUMNS} FROM sectors WHERE id = ?1 AND is_active = 1"),
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_sector(&row)?)),
            None => Ok(None),
        }
    }

    /// List active sectors by name.
    pub async fn list_sectors(&self) -> Result<Vec<Sector>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {SECTOR_COLUMNS} FROM sectors WHERE is_active = 1 ORDER BY name"),
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut sectors = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            sectors.push(row_to_sector(&row)?);
        }
        Ok(sectors)
    }

    /// Soft-delete a sector. Returns `false` if no active sector had that id.
    pub async fn delete_sector(&self, id: i64) -> Result<bool> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;
        let changed = self
            .conn
            .execute(
                "UPDATE sectors SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND is_active = 1",
                params![now_rfc3339(), id],
            )
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }
}

fn row_to_sector(row: &libsql::Row) -> Result<Sector> {
    Ok(Sector {
        id: row.get::<i64>(0).map_err(db_err)?,
        name: get_string(row, 1)?,
        description: get_opt_string(row, 2),
        relevance_reason: get_opt_string(row, 3),
        created_at: get_timestamp(row, 4)?,
        updated_at: get_timestamp(row, 5)?,
    })
}
