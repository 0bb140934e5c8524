//! Backup storage for character documents.
//!
//! [`BackupStore`] is the narrow save/load/list/delete/rename interface the
//! rest of chargen talks to. [`Storage`] implements it on a local libSQL
//! database; [`MemoryBackupStore`] keeps snapshots in process memory.
//!
//! Backups are keyed by [`backup_key`]: names that differ only in case or
//! whitespace address the same snapshot.

mod memory;
mod migrations;

use std::future::Future;
use std::path::Path;

use chargen_shared::{
    Backup, BackupId, CharacterDocument, ChargenError, Result, backup_key, backup_name,
};
use chrono::{DateTime, SecondsFormat, Utc};
use libsql::{Connection, Database, params};

pub use memory::MemoryBackupStore;

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Named, timestamped snapshots of character documents.
pub trait BackupStore: Send + Sync {
    /// Save `data` under `name` (blank names become the default), replacing
    /// any snapshot with the same key.
    fn save(
        &self,
        name: &str,
        data: &CharacterDocument,
    ) -> impl Future<Output = Result<Backup>> + Send;

    /// Load the snapshot stored under `name`.
    fn load(&self, name: &str) -> impl Future<Output = Result<Option<Backup>>> + Send;

    /// All snapshots, newest first.
    fn list(&self) -> impl Future<Output = Result<Vec<Backup>>> + Send;

    /// Delete the snapshot stored under `name`. Returns whether one existed.
    fn delete(&self, name: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Move the snapshot stored under `old` to `new`.
    ///
    /// A blank or unchanged `new` is a no-op, and a `new` whose key belongs
    /// to a different backup is refused. Returns `false` when nothing was
    /// renamed.
    fn rename(&self, old: &str, new: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Whether a rename request should be carried out at all.
pub(crate) fn rename_target(old: &str, new: &str) -> Option<String> {
    let new = new.trim();
    (!new.is_empty() && new != old).then(|| new.to_string())
}

// ---------------------------------------------------------------------------
// libSQL storage
// ---------------------------------------------------------------------------

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ChargenError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| ChargenError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| ChargenError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
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
                        ChargenError::Storage(format!(
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

    async fn load_by_key(&self, key: &str) -> Result<Option<Backup>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, timestamp, data_json FROM backups WHERE key = ?1",
                params![key],
            )
            .await
            .map_err(|e| ChargenError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_backup(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(ChargenError::Storage(e.to_string())),
        }
    }

    async fn upsert(&self, backup: &Backup) -> Result<()> {
        let data_json = serde_json::to_string(&backup.data)
            .map_err(|e| ChargenError::Storage(format!("failed to encode backup: {e}")))?;
        let id = backup.id.to_string();
        let timestamp = format_timestamp(&backup.timestamp);

        self.conn
            .execute(
                "INSERT INTO backups (key, id, name, timestamp, data_json)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                   id = excluded.id,
                   name = excluded.name,
                   timestamp = excluded.timestamp,
                   data_json = excluded.data_json",
                params![
                    backup.key(),
                    id.as_str(),
                    backup.name.as_str(),
                    timestamp.as_str(),
                    data_json.as_str(),
                ],
            )
            .await
            .map_err(|e| ChargenError::Storage(e.to_string()))?;
        Ok(())
    }
}

impl BackupStore for Storage {
    async fn save(&self, name: &str, data: &CharacterDocument) -> Result<Backup> {
        let backup = Backup {
            id: BackupId::new(),
            name: backup_name(Some(name)),
            timestamp: Utc::now(),
            data: data.clone(),
        };
        self.upsert(&backup).await?;
        tracing::debug!(name = %backup.name, key = %backup.key(), "backup saved");
        Ok(backup)
    }

    async fn load(&self, name: &str) -> Result<Option<Backup>> {
        self.load_by_key(&backup_key(name)).await
    }

    async fn list(&self) -> Result<Vec<Backup>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, timestamp, data_json FROM backups
                 ORDER BY timestamp DESC, id DESC",
                params![],
            )
            .await
            .map_err(|e| ChargenError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_backup(&row) {
                Ok(backup) => results.push(backup),
                // One corrupt row must not hide the rest.
                Err(e) => tracing::warn!(error = %e, "skipping unreadable backup"),
            }
        }
        Ok(results)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let affected = self
            .conn
            .execute("DELETE FROM backups WHERE key = ?1", params![backup_key(name)])
            .await
            .map_err(|e| ChargenError::Storage(e.to_string()))?;
        Ok(affected > 0)
    }

    async fn rename(&self, old: &str, new: &str) -> Result<bool> {
        let Some(new) = rename_target(old, new) else {
            return Ok(false);
        };
        let old_key = backup_key(old);
        let new_key = backup_key(&new);

        // Single statement: the row moves only if no other backup owns the new key.
        let affected = self
            .conn
            .execute(
                "UPDATE backups SET key = ?1, name = ?2
                 WHERE key = ?3
                   AND (?1 = ?3 OR NOT EXISTS (SELECT 1 FROM backups WHERE key = ?1))",
                params![new_key, new.clone(), old_key],
            )
            .await
            .map_err(|e| ChargenError::Storage(e.to_string()))?;

        if affected == 0 {
            tracing::debug!(from = old, to = %new, "backup not renamed");
            return Ok(false);
        }
        tracing::debug!(from = old, to = %new, "backup renamed");
        Ok(true)
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Convert a database row to a [`Backup`].
fn row_to_backup(row: &libsql::Row) -> Result<Backup> {
    let id: String = row
        .get(0)
        .map_err(|e| ChargenError::Storage(e.to_string()))?;
    let data_json: String = row
        .get(3)
        .map_err(|e| ChargenError::Storage(e.to_string()))?;

    Ok(Backup {
        id: id
            .parse()
            .map_err(|e| ChargenError::Storage(format!("invalid backup id: {e}")))?,
        name: row
            .get::<String>(1)
            .map_err(|e| ChargenError::Storage(e.to_string()))?,
        timestamp: {
            let s: String = row
                .get(2)
                .map_err(|e| ChargenError::Storage(e.to_string()))?;
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ChargenError::Storage(format!("invalid date: {e}")))?
        },
        data: serde_json::from_str(&data_json)
            .map_err(|e| ChargenError::Storage(format!("invalid backup data: {e}")))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    /// Create a temp file storage for testing.
    async fn test_storage() -> Storage {
        let tmp = std::env::temp_dir().join(format!("chargen_test_{}.db", Uuid::now_v7()));
        Storage::open(&tmp).await.expect("open test db")
    }

    fn doc(name: &str) -> CharacterDocument {
        CharacterDocument {
            name: name.into(),
            bio: vec!["A test character.".into()],
            knowledge: vec!["Fact one.".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let storage = test_storage().await;
        assert_eq!(storage.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("chargen_test_{}.db", Uuid::now_v7()));
        let _s1 = Storage::open(&tmp).await.expect("first open");
        drop(_s1);
        let s2 = Storage::open(&tmp).await.expect("second open");
        assert_eq!(s2.get_schema_version().await, 1);
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let storage = test_storage().await;
        let saved = storage.save("Pirate Draft", &doc("Mira")).await.expect("save");
        assert_eq!(saved.name, "Pirate Draft");

        // Lookup is by slugged key, so spelling variants resolve to the same backup.
        let loaded = storage
            .load("pirate   draft")
            .await
            .expect("load")
            .expect("backup exists");
        assert_eq!(loaded.name, "Pirate Draft");
        assert_eq!(loaded.data, doc("Mira"));
        assert_eq!(loaded.id, saved.id);
    }

    #[tokio::test]
    async fn blank_name_saves_as_autosave() {
        let storage = test_storage().await;
        let saved = storage.save("  ", &doc("Mira")).await.unwrap();
        assert_eq!(saved.name, "Autosave");
        assert!(storage.load("Autosave").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn save_overwrites_same_key() {
        let storage = test_storage().await;
        storage.save("Autosave", &doc("First")).await.unwrap();
        storage.save("autosave", &doc("Second")).await.unwrap();

        let all = storage.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].data.name, "Second");
        assert_eq!(all[0].name, "autosave");
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let storage = test_storage().await;
        storage.save("one", &doc("A")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage.save("two", &doc("B")).await.unwrap();

        let names: Vec<_> = storage
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["two", "one"]);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let storage = test_storage().await;
        storage.save("gone", &doc("A")).await.unwrap();
        assert!(storage.delete("Gone").await.unwrap());
        assert!(!storage.delete("gone").await.unwrap());
        assert!(storage.load("gone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rename_moves_snapshot() {
        let storage = test_storage().await;
        storage.save("draft", &doc("A")).await.unwrap();

        assert!(storage.rename("draft", "Final Cut").await.unwrap());
        assert!(storage.load("draft").await.unwrap().is_none());
        let moved = storage.load("final cut").await.unwrap().expect("renamed");
        assert_eq!(moved.name, "Final Cut");
        assert_eq!(moved.data, doc("A"));
    }

    #[tokio::test]
    async fn rename_edge_cases() {
        let storage = test_storage().await;
        storage.save("draft", &doc("A")).await.unwrap();

        assert!(!storage.rename("draft", "").await.unwrap());
        assert!(!storage.rename("draft", "draft").await.unwrap());
        assert!(!storage.rename("missing", "other").await.unwrap());
        assert!(storage.load("draft").await.unwrap().is_some());

        // Case-only rename keeps the key, updates the display name.
        assert!(storage.rename("draft", "Draft").await.unwrap());
        let b = storage.load("draft").await.unwrap().unwrap();
        assert_eq!(b.name, "Draft");
        assert_eq!(storage.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rename_refuses_to_overwrite_another_backup() {
        let storage = test_storage().await;
        storage.save("draft", &doc("A")).await.unwrap();
        storage.save("keeper", &doc("B")).await.unwrap();

        assert!(!storage.rename("draft", "Keeper").await.unwrap());

        assert_eq!(storage.list().await.unwrap().len(), 2);
        let draft = storage.load("draft").await.unwrap().expect("draft kept");
        assert_eq!(draft.data, doc("A"));
        let keeper = storage.load("keeper").await.unwrap().expect("keeper kept");
        assert_eq!(keeper.name, "keeper");
        assert_eq!(keeper.data, doc("B"));
    }
}
