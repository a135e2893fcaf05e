//! Company profile persistence.

use libsql::params;

use leadsense_shared::{CompanyProfile, Result, StoredProfile};

use crate::{
    Storage, db_err, encode_string_list, get_string, get_string_list, get_timestamp, now_rfc3339,
};

const PROFILE_COLUMNS: &str = "id, company_name, location, description, team_size, core_services, languages, special_offer, created_at, updated_at";

impl Storage {
    /// Insert a new profile and return its id.
    pub async fn insert_profile(&self, profile: &CompanyProfile) -> Result<i64> {
        self.check_writable()?;
        let services = encode_string_list(&profile.core_services)?;
        let languages = encode_string_list(&profile.languages)?;
        let now = now_rfc3339();

        let _guard = self.write_lock.lock().await;
        self.conn
            .execute(
                "INSERT INTO company_profiles (company_name, location, description, team_size, core_services, languages, special_offer, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    profile.company_name.as_str(),
                    profile.location.as_str(),
                    profile.description.as_str(),
                    profile.team_size as i64,
                    services,
                    languages,
                    profile.special_offer.as_str(),
                    now.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;

        let id = self.conn.last_insert_rowid();
        tracing::info!(id, company = %profile.company_name, "profile saved");
        Ok(id)
    }

    /// Get an active profile by id.
    pub async fn get_profile(&self, id: i64) -> Result<Option<StoredProfile>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PROFILE_COLUMNS} FROM company_profiles WHERE id = ?1 AND is_active = 1"
                ),
                params![id],
            )
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_profile(&row)?)),
            None => Ok(None),
        }
    }

    /// List active profiles, oldest first.
    pub async fn list_profiles(&self) -> Result<Vec<StoredProfile>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {PROFILE_COLUMNS} FROM company_profiles WHERE is_active = 1 ORDER BY id"
                ),
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut profiles = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            profiles.push(row_to_profile(&row)?);
        }
        Ok(profiles)
    }

    /// Replace every field of an active profile. Returns `false` if it does not exist.
    pub async fn update_profile(&self, id: i64, profile: &CompanyProfile) -> Result<bool> {
        self.check_writable()?;
        let services = encode_string_list(&profile.core_services)?;
        let languages = encode_string_list(&profile.languages)?;

        let _guard = self.write_lock.lock().await;
        let changed = self
            .conn
            .execute(
                "UPDATE company_profiles
                 SET company_name = ?1, location = ?2, description = ?3, team_size = ?4,
                     core_services = ?5, languages = ?6, special_offer = ?7, updated_at = ?8
                 WHERE id = ?9 AND is_active = 1",
                params![
                    profile.company_name.as_str(),
                    profile.location.as_str(),
                    profile.description.as_str(),
                    profile.team_size as i64,
                    services,
                    languages,
                    profile.special_offer.as_str(),
                    now_rfc3339(),
                    id
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Soft-delete a profile. Returns `false` if no active profile had that id.
    pub async fn delete_profile(&self, id: i64) -> Result<bool> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;
        let changed = self
            .conn
            .execute(
                "UPDATE company_profiles SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND is_active = 1",
                params![now_rfc3339(), id],
            )
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }
}

fn row_to_profile(row: &libsql::Row) -> Result<StoredProfile> {
    Ok(StoredProfile {
        id: row.get::<i64>(0).map_err(db_err)?,
        profile: CompanyProfile {
            company_name: get_string(row, 1)?,
            location: get_string(row, 2)?,
            description: get_string(row, 3)?,
            team_size: row.get::<i64>(4).map_err(db_err)?.max(0) as u32,
            core_services: get_string_list(row, 5)?,
            languages: get_string_list(row, 6)?,
            special_offer: get_string(row, 7)?,
        },
        created_at: get_timestamp(row, 8)?,
        updated_at: get_timestamp(row, 9)?,
    })
}
