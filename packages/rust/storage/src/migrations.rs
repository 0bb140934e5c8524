//! SQL migration definitions for the chargen backup database.
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
        description: "Initial schema: character backups keyed by slugged name",
        sql: r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_migrations (
    version   INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Named character snapshots. `key` is the slugged name; `name` keeps the
-- user's spelling for display.
CREATE TABLE IF NOT EXISTS backups (
    key        TEXT PRIMARY KEY,
    id         TEXT NOT NULL,
    name       TEXT NOT NULL,
    timestamp  TEXT NOT NULL,
    data_json  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_backups_timestamp ON backups(timestamp);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
