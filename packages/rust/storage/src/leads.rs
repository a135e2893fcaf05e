//! Lead persistence.

use chrono::{Duration, Utc};
use libsql::{Value, params};

use leadsense_shared::{
    Lead, LeadPriority, LeadStats, LeadStatus, LeadUpdate, LeadsenseError, PlainCompany, Result,
};

use crate::{
    Storage, db_err, encode_string_list, format_timestamp, get_opt_string, get_string, get_string_list,
    get_timestamp, now_rfc3339,
};

const LEAD_COLUMNS: &str = "id, company_name, website_url, address, contact_email, phone_number, description, automation_proposal, \
     discovered_at, discovered_by_profile_id, discovered_sectors, status, priority, notes, created_at, updated_at";

const INSERT_LEAD: &str = "INSERT INTO leads (company_name, website_url, address, contact_email, phone_number, description, automation_proposal, \
     discovered_at, discovered_by_profile_id, discovered_sectors, created_at, updated_at) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)";

/// Window for [`LeadStats::recent_leads`].
const RECENT_DAYS: i64 = 30;

impl Storage {
    /// Insert a lead and return its id.
    pub async fn insert_lead(
        &self,
        company: &PlainCompany,
        profile_id: Option<i64>,
        sectors: &[String],
    ) -> Result<i64> {
        self.check_writable()?;
        let sectors_json = encode_string_list(sectors)?;

        let _guard = self.write_lock.lock().await;
        self.execute_insert_lead(company, profile_id, &sectors_json)
            .await?;
        let id = self.conn.last_insert_rowid();
        tracing::debug!(id, company = %company.company_name, "lead inserted");
        Ok(id)
    }

    /// Insert several leads in one transaction. Either all are stored or none.
    pub async fn insert_leads_batch(
        &self,
        companies: &[PlainCompany],
        profile_id: Option<i64>,
        sectors: &[String],
    ) -> Result<Vec<i64>> {
        self.check_writable()?;
        if companies.is_empty() {
            return Ok(Vec::new());
        }
        let sectors_json = encode_string_list(sectors)?;

        let _guard = self.write_lock.lock().await;
        self.conn
            .execute("BEGIN", params![])
            .await
            .map_err(db_err)?;

        let mut ids = Vec::with_capacity(companies.len());
        for company in companies {
            if let Err(e) = self
                .execute_insert_lead(company, profile_id, &sectors_json)
                .await
            {
                self.rollback().await;
                return Err(e);
            }
            ids.push(self.conn.last_insert_rowid());
        }

        self.conn
            .execute("COMMIT", params![])
            .await
            .map_err(db_err)?;

        tracing::info!(count = ids.len(), "leads inserted");
        Ok(ids)
    }

    async fn execute_insert_lead(
        &self,
        company: &PlainCompany,
        profile_id: Option<i64>,
        sectors_json: &str,
    ) -> Result<()> {
        let now = now_rfc3339();
        self.conn
            .execute(
                INSERT_LEAD,
                params![
                    company.company_name.as_str(),
                    company.website_url.as_deref(),
                    company.address.as_deref(),
                    company.contact_email.as_deref(),
                    company.phone_number.as_deref(),
                    company.description.as_deref(),
                    company.automation_proposal.as_deref(),
                    now.as_str(),
                    profile_id,
                    sectors_json,
                    now.as_str(),
                    now.as_str()
                ],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Get an active lead by id.
    pub async fn get_lead(&self, id: i64) -> Result<Option<Lead>> {
        let mut leads = self
            .query_leads("WHERE id = ?1 AND is_active = 1", vec![Value::Integer(id)])
            .await?;
        Ok(leads.pop())
    }

    /// List active leads, newest discoveries first.
    pub async fn list_leads(&self, offset: u32, limit: u32) -> Result<Vec<Lead>> {
        self.query_leads(
            "WHERE is_active = 1 ORDER BY discovered_at DESC, id DESC LIMIT ?1 OFFSET ?2",
            vec![Value::Integer(limit as i64), Value::Integer(offset as i64)],
        )
        .await
    }

    /// List active leads with the given status, newest first.
    pub async fn list_leads_by_status(&self, status: LeadStatus) -> Result<Vec<Lead>> {
        self.query_leads(
            "WHERE is_active = 1 AND status = ?1 ORDER BY discovered_at DESC, id DESC",
            vec![Value::Text(status.as_str().to_string())],
        )
        .await
    }

    /// List active leads discovered on behalf of a profile, newest first.
    pub async fn list_leads_by_profile(&self, profile_id: i64) -> Result<Vec<Lead>> {
        self.query_leads(
            "WHERE is_active = 1 AND discovered_by_profile_id = ?1 ORDER BY discovered_at DESC, id DESC",
            vec![Value::Integer(profile_id)],
        )
        .await
    }

    /// Substring search over name, description and automation proposal.
    pub async fn search_leads(&self, term: &str) -> Result<Vec<Lead>> {
        let pattern = format!("%{term}%");
        self.query_leads(
            "WHERE is_active = 1 AND (company_name LIKE ?1 OR description LIKE ?1 OR automation_proposal LIKE ?1) \
             ORDER BY discovered_at DESC, id DESC",
            vec![Value::Text(pattern)],
        )
        .await
    }

    /// Find an active lead by case-insensitive name. When `website_url` is
    /// given it must match exactly as well.
    pub async fn find_saved_lead(
        &self,
        company_name: &str,
        website_url: Option<&str>,
    ) -> Result<Option<Lead>> {
        let url = match website_url {
            Some(u) => Value::Text(u.to_string()),
            None => Value::Null,
        };
        let mut leads = self
            .query_leads(
                "WHERE is_active = 1 AND lower(company_name) = lower(?1) AND (?2 IS NULL OR website_url = ?2) \
                 ORDER BY id LIMIT 1",
                vec![Value::Text(company_name.to_string()), url],
            )
            .await?;
        Ok(leads.pop())
    }

    /// Apply the set fields of `update`. Returns `false` if the lead does not exist.
    pub async fn update_lead(&self, id: i64, update: &LeadUpdate) -> Result<bool> {
        self.check_writable()?;

        let mut assignments = Vec::new();
        let mut values = Vec::new();
        if let Some(status) = update.status {
            values.push(Value::Text(status.as_str().to_string()));
            assignments.push(format!("status = ?{}", values.len()));
        }
        if let Some(priority) = update.priority {
            values.push(Value::Text(priority.as_str().to_string()));
            assignments.push(format!("priority = ?{}", values.len()));
        }
        if let Some(notes) = &update.notes {
            values.push(Value::Text(notes.clone()));
            assignments.push(format!("notes = ?{}", values.len()));
        }
        values.push(Value::Text(now_rfc3339()));
        assignments.push(format!("updated_at = ?{}", values.len()));
        values.push(Value::Integer(id));

        let sql = format!(
            "UPDATE leads SET {} WHERE id = ?{} AND is_active = 1",
            assignments.join(", "),
            values.len()
        );

        let _guard = self.write_lock.lock().await;
        let changed = self
            .conn
            .execute(&sql, libsql::params::Params::Positional(values))
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Soft-delete a lead. Returns `false` if no active lead had that id.
    pub async fn delete_lead(&self, id: i64) -> Result<bool> {
        self.check_writable()?;
        let _guard = self.write_lock.lock().await;
        let changed = self
            .conn
            .execute(
                "UPDATE leads SET is_active = 0, updated_at = ?1 WHERE id = ?2 AND is_active = 1",
                params![now_rfc3339(), id],
            )
            .await
            .map_err(db_err)?;
        Ok(changed > 0)
    }

    /// Totals over active leads.
    pub async fn lead_stats(&self) -> Result<LeadStats> {
        let total_leads = self
            .query_count("SELECT COUNT(*) FROM leads WHERE is_active = 1", params![])
            .await?;

        let cutoff = format_timestamp(Utc::now() - Duration::days(RECENT_DAYS));
        let recent_leads = self
            .query_count(
                "SELECT COUNT(*) FROM leads WHERE is_active = 1 AND discovered_at >= ?1",
                params![cutoff],
            )
            .await?;

        Ok(LeadStats {
            total_leads,
            status_counts: self.count_by("status").await?,
            priority_counts: self.count_by("priority").await?,
            recent_leads,
        })
    }

    async fn count_by(&self, column: &str) -> Result<std::collections::BTreeMap<String, u64>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {column}, COUNT(*) FROM leads WHERE is_active = 1 GROUP BY {column}"
                ),
                params![],
            )
            .await
            .map_err(db_err)?;

        let mut counts = std::collections::BTreeMap::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            let key = get_string(&row, 0)?;
            let count = row.get::<i64>(1).map_err(db_err)?.max(0) as u64;
            counts.insert(key, count);
        }
        Ok(counts)
    }

    async fn query_leads(&self, clause: &str, values: Vec<Value>) -> Result<Vec<Lead>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {LEAD_COLUMNS} FROM leads {clause}"),
                libsql::params::Params::Positional(values),
            )
            .await
            .map_err(db_err)?;

        let mut leads = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            leads.push(row_to_lead(&row)?);
        }
        Ok(leads)
    }
}

fn row_to_lead(row: &libsql::Row) -> Result<Lead> {
    let status: LeadStatus = get_string(row, 11)?
        .parse()
        .map_err(|e: LeadsenseError| LeadsenseError::Storage(e.to_string()))?;
    let priority: LeadPriority = get_string(row, 12)?
        .parse()
        .map_err(|e: LeadsenseError| LeadsenseError::Storage(e.to_string()))?;

    Ok(Lead {
        id: row.get::<i64>(0).map_err(db_err)?,
        company: PlainCompany {
            company_name: get_string(row, 1)?,
            website_url: get_opt_string(row, 2),
            address: get_opt_string(row, 3),
            contact_email: get_opt_string(row, 4),
            phone_number: get_opt_string(row, 5),
            description: get_opt_string(row, 6),
            automation_proposal: get_opt_string(row, 7),
        },
        discovered_at: get_timestamp(row, 8)?,
        discovered_by_profile_id: row.get::<i64>(9).ok(),
        discovered_sectors: get_string_list(row, 10)?,
        status,
        priority,
        notes: get_opt_string(row, 13),
        created_at: get_timestamp(row, 14)?,
        updated_at: get_timestamp(row, 15)?,
    })
}
