//! Application configuration for chargen.
//!
//! User config lives at `~/.chargen/chargen.toml`.
//! CLI flags and environment variables override config file values, which
//! override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ChargenError, Result};
use crate::types::DEFAULT_BACKUP_NAME;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "chargen.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".chargen";

// ---------------------------------------------------------------------------
// Config structs (matching chargen.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,

    /// Backup storage and autosave.
    #[serde(default)]
    pub backups: BackupsConfig,

    /// Knowledge file conversion.
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public URL sent to the provider as `HTTP-Referer`.
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            app_url: default_app_url(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    4001
}
fn default_app_url() -> String {
    "http://localhost:4000".into()
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// API base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model used when the caller does not pick one.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            default_model: default_model(),
            timeout_secs: default_timeout_secs(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-3.5-sonnet".into()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4000
}

/// `[backups]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupsConfig {
    /// Backup database path. Empty means `~/.chargen/backups.db`.
    #[serde(default)]
    pub db_path: String,

    /// Seconds between autosave snapshots.
    #[serde(default = "default_autosave_interval")]
    pub autosave_interval_secs: u64,

    /// Name autosave snapshots are stored under.
    #[serde(default = "default_backup_name")]
    pub default_name: String,
}

impl Default for BackupsConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            autosave_interval_secs: default_autosave_interval(),
            default_name: default_backup_name(),
        }
    }
}

fn default_autosave_interval() -> u64 {
    5 * 60
}
fn default_backup_name() -> String {
    DEFAULT_BACKUP_NAME.into()
}

/// `[knowledge]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// External PDF-to-text command. Reads PDF bytes on stdin, writes text to stdout.
    #[serde(default = "default_pdf_command")]
    pub pdf_command: String,

    /// Arguments passed to `pdf_command`.
    #[serde(default = "default_pdf_args")]
    pub pdf_args: Vec<String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            pdf_command: default_pdf_command(),
            pdf_args: default_pdf_args(),
        }
    }
}

fn default_pdf_command() -> String {
    "pdftotext".into()
}
fn default_pdf_args() -> Vec<String> {
    vec!["-".into(), "-".into()]
}

// ---------------------------------------------------------------------------
// Provider config (runtime, merged from config + env)
// ---------------------------------------------------------------------------

/// Runtime provider configuration handed to the OpenRouter client.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Chat-completions base URL.
    pub base_url: Url,
    /// Sent as `HTTP-Referer`.
    pub app_url: String,
    /// Sent as `X-Title`.
    pub app_title: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl TryFrom<&AppConfig> for ProviderConfig {
    type Error = ChargenError;

    fn try_from(config: &AppConfig) -> Result<Self> {
        let base_url = Url::parse(&config.openrouter.base_url).map_err(|e| {
            ChargenError::config(format!(
                "invalid openrouter.base_url '{}': {e}",
                config.openrouter.base_url
            ))
        })?;
        let app_url =
            std::env::var("APP_URL").unwrap_or_else(|_| config.server.app_url.clone());

        Ok(Self {
            base_url,
            app_url,
            app_title: "Eliza Character Generator".into(),
            timeout_secs: config.openrouter.timeout_secs,
            temperature: config.openrouter.temperature,
            max_tokens: config.openrouter.max_tokens,
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.chargen/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ChargenError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.chargen/chargen.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve the backup database path, defaulting to `~/.chargen/backups.db`.
pub fn backup_db_path(config: &AppConfig) -> Result<PathBuf> {
    if config.backups.db_path.is_empty() {
        Ok(config_dir()?.join("backups.db"))
    } else {
        Ok(PathBuf::from(&config.backups.db_path))
    }
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ChargenError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ChargenError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ChargenError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ChargenError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ChargenError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the OpenRouter API key from the configured env var.
pub fn api_key_from_env(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(ChargenError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}

/// Apply `HOST` / `PORT` environment overrides to the server section.
pub fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(host) = std::env::var("HOST") {
        if !host.is_empty() {
            config.server.host = host;
        }
    }
    if let Ok(port) = std::env::var("PORT") {
        match port.parse() {
            Ok(p) => config.server.port = p,
            Err(_) => tracing::warn!(%port, "ignoring unparseable PORT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("autosave_interval_secs"));
        assert!(toml_str.contains("OPENROUTER_API_KEY"));
        assert!(toml_str.contains("pdftotext"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.server.port, 4001);
        assert_eq!(parsed.openrouter.max_tokens, 4000);
        assert_eq!(parsed.backups.autosave_interval_secs, 300);
        assert_eq!(parsed.backups.default_name, "Autosave");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[server]
port = 8080

[openrouter]
default_model = "openai/gpt-4o-mini"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.openrouter.default_model, "openai/gpt-4o-mini");
        assert_eq!(config.openrouter.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn provider_config_from_app_config() {
        let app = AppConfig::default();
        let provider = ProviderConfig::try_from(&app).expect("provider config");
        assert_eq!(provider.base_url.as_str(), "https://openrouter.ai/api/v1");
        assert_eq!(provider.max_tokens, 4000);
    }

    #[test]
    fn provider_config_rejects_bad_base_url() {
        let mut app = AppConfig::default();
        app.openrouter.base_url = "not a url".into();
        let err = ProviderConfig::try_from(&app).unwrap_err();
        assert!(err.to_string().contains("invalid openrouter.base_url"));
    }

    #[test]
    fn backup_db_path_respects_override() {
        let mut app = AppConfig::default();
        app.backups.db_path = "/tmp/chargen-backups.db".into();
        assert_eq!(
            backup_db_path(&app).unwrap(),
            PathBuf::from("/tmp/chargen-backups.db")
        );
    }

    #[test]
    fn api_key_lookup() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.openrouter.api_key_env = "CHARGEN_TEST_NONEXISTENT_KEY_12345".into();
        let result = api_key_from_env(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
