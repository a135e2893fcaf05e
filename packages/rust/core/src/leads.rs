//! Lead bookkeeping on top of storage: save, update, delete with the
//! existence and duplicate checks callers expect.

use tracing::{info, warn};

use leadsense_shared::{CompanyData, Lead, LeadUpdate, LeadsenseError, PlainCompany, Result};
use leadsense_storage::Storage;

/// Result of saving a batch of discovered companies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveSummary {
    /// Ids of the newly stored leads.
    pub saved: Vec<i64>,
    /// Names skipped because a matching lead already exists.
    pub duplicates: Vec<String>,
}

/// Id of the profile new leads are attributed to.
async fn attributing_profile(storage: &Storage) -> Result<i64> {
    storage
        .list_profiles()
        .await?
        .first()
        .map(|p| p.id)
        .ok_or_else(|| {
            LeadsenseError::validation("no company profile found; add one before saving leads")
        })
}

/// Save one company as a lead.
///
/// Fails with `Validation` when the name is blank or no profile exists,
/// and with `Conflict` when a lead with the same name (and URL, if given)
/// is already saved. The lead is attributed to the first profile.
pub async fn save_lead(storage: &Storage, company: &PlainCompany, sectors: &[String]) -> Result<Lead> {
    if company.company_name.trim().is_empty() {
        return Err(LeadsenseError::validation("company name is required"));
    }
    let profile_id = attributing_profile(storage).await?;

    if let Some(existing) = storage
        .find_saved_lead(&company.company_name, company.website_url.as_deref())
        .await?
    {
        return Err(LeadsenseError::conflict(format!(
            "lead '{}' is already saved (id {})",
            company.company_name, existing.id
        )));
    }

    let id = storage.insert_lead(company, Some(profile_id), sectors).await?;
    info!(id, company = %company.company_name, "lead saved");
    get_lead(storage, id).await
}

/// Save every new company from a discovery run in one transaction,
/// skipping those already saved.
pub async fn save_discovered(
    storage: &Storage,
    companies: &[CompanyData],
    sectors: &[String],
) -> Result<SaveSummary> {
    let profile_id = attributing_profile(storage).await?;

    let mut fresh = Vec::new();
    let mut summary = SaveSummary::default();
    for company in companies {
        let plain = company.to_plain();
        if storage
            .find_saved_lead(&plain.company_name, plain.website_url.as_deref())
            .await?
            .is_some()
        {
            warn!(company = %plain.company_name, "lead already saved, skipping");
            summary.duplicates.push(plain.company_name);
        } else {
            fresh.push(plain);
        }
    }

    summary.saved = storage
        .insert_leads_batch(&fresh, Some(profile_id), sectors)
        .await?;
    Ok(summary)
}

/// Get an active lead or fail with `NotFound`.
pub async fn get_lead(storage: &Storage, id: i64) -> Result<Lead> {
    storage
        .get_lead(id)
        .await?
        .ok_or_else(|| LeadsenseError::not_found(format!("lead {id}")))
}

/// Apply `update` and return the updated lead.
pub async fn update_lead(storage: &Storage, id: i64, update: &LeadUpdate) -> Result<Lead> {
    if !storage.update_lead(id, update).await? {
        return Err(LeadsenseError::not_found(format!("lead {id}")));
    }
    get_lead(storage, id).await
}

/// Soft-delete a lead.
pub async fn delete_lead(storage: &Storage, id: i64) -> Result<()> {
    if !storage.delete_lead(id).await? {
        return Err(LeadsenseError::not_found(format!("lead {id}")));
    }
    info!(id, "lead deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_profile, temp_storage};
    use leadsense_shared::{LeadPriority, LeadStatus, Provenance};

    fn acme() -> PlainCompany {
        PlainCompany {
            company_name: "Acme GmbH".into(),
            website_url: Some("https://acme.example".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn save_requires_a_profile() {
        let storage = temp_storage().await;
        let err = save_lead(&storage, &acme(), &[]).await.unwrap_err();
        assert!(matches!(err, LeadsenseError::Validation { .. }));
    }

    #[tokio::test]
    async fn save_rejects_blank_name() {
        let storage = temp_storage().await;
        storage.insert_profile(&sample_profile()).await.unwrap();
        let err = save_lead(&storage, &PlainCompany::default(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, LeadsenseError::Validation { .. }));
    }

    #[tokio::test]
    async fn save_attributes_to_first_profile_and_rejects_duplicates() {
        let storage = temp_storage().await;
        let first = storage.insert_profile(&sample_profile()).await.unwrap();
        storage.insert_profile(&sample_profile()).await.unwrap();

        let lead = save_lead(&storage, &acme(), &["Manufacturing".into()])
            .await
            .unwrap();
        assert_eq!(lead.discovered_by_profile_id, Some(first));
        assert_eq!(lead.discovered_sectors, vec!["Manufacturing"]);

        let mut shouting = acme();
        shouting.company_name = "ACME GMBH".into();
        let err = save_lead(&storage, &shouting, &[]).await.unwrap_err();
        assert!(matches!(err, LeadsenseError::Conflict(_)));

        let mut elsewhere = acme();
        elsewhere.website_url = Some("https://acme.de".into());
        assert!(save_lead(&storage, &elsewhere, &[]).await.is_ok());
    }

    #[tokio::test]
    async fn save_discovered_skips_known_leads() {
        let storage = temp_storage().await;
        storage.insert_profile(&sample_profile()).await.unwrap();
        save_lead(&storage, &acme(), &[]).await.unwrap();

        let mut known = CompanyData::new("Acme GmbH", "https://dir.example", Provenance::Aggregator);
        known.website_url = Some("https://acme.example".into());
        let fresh = CompanyData::new("Globex", "https://dir.example", Provenance::Aggregator);

        let summary = save_discovered(&storage, &[known, fresh], &[]).await.unwrap();
        assert_eq!(summary.saved.len(), 1);
        assert_eq!(summary.duplicates, vec!["Acme GmbH"]);
        assert_eq!(storage.list_leads(0, 100).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn update_and_delete_missing_leads_are_not_found() {
        let storage = temp_storage().await;
        storage.insert_profile(&sample_profile()).await.unwrap();
        let lead = save_lead(&storage, &acme(), &[]).await.unwrap();

        let updated = update_lead(
            &storage,
            lead.id,
            &LeadUpdate::new()
                .status(LeadStatus::ProposalSent)
                .priority(LeadPriority::High),
        )
        .await
        .unwrap();
        assert_eq!(updated.status, LeadStatus::ProposalSent);
        assert_eq!(updated.priority, LeadPriority::High);

        delete_lead(&storage, lead.id).await.unwrap();
        assert!(matches!(
            delete_lead(&storage, lead.id).await.unwrap_err(),
            LeadsenseError::NotFound(_)
        ));
        assert!(matches!(
            update_lead(&storage, lead.id, &LeadUpdate::new().notes("gone"))
                .await
                .unwrap_err(),
            LeadsenseError::NotFound(_)
        ));
        assert!(matches!(
            get_lead(&storage, lead.id).await.unwrap_err(),
            LeadsenseError::NotFound(_)
        ));
    }
}
