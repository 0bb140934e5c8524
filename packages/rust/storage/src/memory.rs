//! In-process backup store, for tests and ephemeral sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use chargen_shared::{
    Backup, BackupId, CharacterDocument, ChargenError, Result, backup_key, backup_name,
};
use chrono::Utc;

use crate::{BackupStore, rename_target};

/// [`BackupStore`] backed by a mutex-guarded map. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackupStore {
    backups: Mutex<HashMap<String, Backup>>,
}

impl MemoryBackupStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut HashMap<String, Backup>) -> T) -> Result<T> {
        let mut map = self
            .backups
            .lock()
            .map_err(|_| ChargenError::Storage("backup map lock poisoned".into()))?;
        Ok(f(&mut map))
    }
}

impl BackupStore for MemoryBackupStore {
    async fn save(&self, name: &str, data: &CharacterDocument) -> Result<Backup> {
        let backup = Backup {
            id: BackupId::new(),
            name: backup_name(Some(name)),
            timestamp: Utc::now(),
            data: data.clone(),
        };
        let stored = backup.clone();
        self.with_map(|map| map.insert(stored.key(), stored))?;
        Ok(backup)
    }

    async fn load(&self, name: &str) -> Result<Option<Backup>> {
        self.with_map(|map| map.get(&backup_key(name)).cloned())
    }

    async fn list(&self) -> Result<Vec<Backup>> {
        let mut all = self.with_map(|map| map.values().cloned().collect::<Vec<_>>())?;
        all.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.0.cmp(&a.id.0))
        });
        Ok(all)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        self.with_map(|map| map.remove(&backup_key(name)).is_some())
    }

    async fn rename(&self, old: &str, new: &str) -> Result<bool> {
        let Some(new) = rename_target(old, new) else {
            return Ok(false);
        };
        let (old_key, new_key) = (backup_key(old), backup_key(&new));
        self.with_map(|map| {
            if old_key != new_key && map.contains_key(&new_key) {
                return false;
            }
            match map.remove(&old_key) {
                Some(mut backup) => {
                    backup.name = new;
                    map.insert(new_key, backup);
                    true
                }
                None => false,
            }
        })
    }
}
