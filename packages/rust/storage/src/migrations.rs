//! SQL migration definitions for the Leadsense database.
//!
//! Migrations are applied in order on database open. Each migration has a
//! version number and a batch of SQL statements.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: sectors, company_profiles, leads",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Target market sectors
CREATE TABLE IF NOT EXISTS sectors (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    name             TEXT NOT NULL UNIQUE,
    description      TEXT,
    relevance_reason TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    is_active        INTEGER NOT NULL DEFAULT 1
);

-- Profiles of the companies looking for leads
CREATE TABLE IF NOT EXISTS company_profiles (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    company_name  TEXT NOT NULL,
    location      TEXT NOT NULL,
    description   TEXT NOT NULL,
    team_size     INTEGER NOT NULL,
    core_services TEXT NOT NULL,  -- JSON array
    languages     TEXT NOT NULL,  -- JSON array
    special_offer TEXT NOT NULL DEFAULT '',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    is_active     INTEGER NOT NULL DEFAULT 1
);

-- Saved leads
CREATE TABLE IF NOT EXISTS leads (
    id                       INTEGER PRIMARY KEY AUTOINCREMENT,
    company_name             TEXT NOT NULL,
    website_url              TEXT,
    address                  TEXT,
    contact_email            TEXT,
    phone_number             TEXT,
    description              TEXT,
    automation_proposal      TEXT,
    discovered_at            TEXT NOT NULL,
    discovered_by_profile_id INTEGER REFERENCES company_profiles(id),
    discovered_sectors       TEXT,  -- JSON array
    status                   TEXT NOT NULL DEFAULT 'new',
    priority                 TEXT NOT NULL DEFAULT 'medium',
    notes                    TEXT,
    created_at               TEXT NOT NULL,
    updated_at               TEXT NOT NULL,
    is_active                INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_leads_company_name ON leads(company_name);
CREATE INDEX IF NOT EXISTS idx_leads_status ON leads(status);
CREATE INDEX IF NOT EXISTS idx_leads_discovered_at ON leads(discovered_at);
CREATE INDEX IF NOT EXISTS idx_leads_profile_id ON leads(discovered_by_profile_id);
CREATE INDEX IF NOT EXISTS idx_leads_active ON leads(is_active);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
