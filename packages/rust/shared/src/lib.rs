//! Shared types, error model, and configuration for chargen.
//!
//! This crate is the foundation depended on by all other chargen crates.
//! It provides:
//! - [`ChargenError`]: the unified error type
//! - Domain types ([`CharacterDocument`], [`MessageExample`], [`Backup`])
//! - Configuration ([`AppConfig`], [`ProviderConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BackupsConfig, KnowledgeConfig, OpenRouterConfig, ProviderConfig, ServerConfig,
    api_key_from_env, apply_env_overrides, backup_db_path, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{ChargenError, Result};
pub use types::{
    BACKUP_KEY_PREFIX, Backup, BackupId, CharacterDocument, DEFAULT_BACKUP_NAME,
    DEFAULT_CHARACTER_TAG, MessageContent, MessageExample, MessageTurn, REQUIRED_FIELDS, Settings,
    Style, USER_PLACEHOLDER, Voice, backup_key, backup_name,
};
