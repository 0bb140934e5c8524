//! CLI command definitions, routing, and tracing setup.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use chargen_core::{
    CharacterForm, CharacterService, CommandPdfConverter, KnowledgeFile, append_knowledge,
};
use chargen_provider::OpenRouterClient;
use chargen_server::{AppState, ServeOptions};
use chargen_shared::{
    AppConfig, CharacterDocument, ProviderConfig, api_key_from_env, apply_env_overrides,
    backup_db_path, init_config, load_config,
};
use chargen_storage::{BackupStore, MemoryBackupStore, Storage};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// chargen: build character profiles with an LLM.
#[derive(Parser)]
#[command(
    name = "chargen",
    version,
    about = "Generate, refine, and repair character-profile JSON.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Start the HTTP server.
    Serve {
        /// Bind host (overrides config and HOST).
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config and PORT).
        #[arg(long)]
        port: Option<u16>,

        /// Keep backups in memory instead of the backup database.
        #[arg(long)]
        ephemeral: bool,
    },

    /// Repair a JSON character file and print the normalized document.
    FixJson {
        /// Input file, or `-` for stdin.
        input: PathBuf,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Generate a new character from a description.
    Generate {
        /// Character description.
        #[arg(short, long)]
        prompt: String,

        #[command(flatten)]
        model: ModelArgs,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Refine an existing character file.
    Refine {
        /// Character file to refine.
        #[arg(short, long)]
        input: PathBuf,

        /// Refinement instructions.
        #[arg(short, long)]
        prompt: String,

        #[command(flatten)]
        model: ModelArgs,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Extract knowledge lines from files.
    Knowledge {
        /// Text (.txt .md .json .yml .csv) or PDF files.
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Append the lines to this character file's knowledge instead of printing them.
        #[arg(long)]
        into: Option<PathBuf>,
    },

    /// Build a character from a form JSON file.
    Build {
        /// Form state as JSON.
        #[arg(short, long)]
        form: PathBuf,

        /// Knowledge files used when the form has no knowledge of its own.
        #[arg(short, long)]
        knowledge: Vec<PathBuf>,

        /// Write the result here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Manage saved character backups.
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Model selection shared by generating commands.
#[derive(clap::Args)]
pub(crate) struct ModelArgs {
    /// OpenRouter model ID (defaults to `openrouter.default_model`).
    #[arg(short, long)]
    model: Option<String>,

    /// OpenRouter API key (defaults to the configured env var).
    #[arg(long)]
    api_key: Option<String>,
}

/// Backup subcommands.
#[derive(Subcommand)]
pub(crate) enum BackupAction {
    /// Save a character file as a backup.
    Save {
        /// Character file to save.
        input: PathBuf,

        /// Backup name (defaults to `Autosave`).
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Print a backup's character document.
    Load {
        name: String,

        /// Write the document here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// List backups, newest first.
    List,
    /// Delete a backup.
    Delete { name: String },
    /// Rename a backup.
    Rename { old: String, new: String },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "chargen=info",
        1 => "chargen=debug,tower_http=debug",
        _ => "chargen=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Serve {
            host,
            port,
            ephemeral,
        } => cmd_serve(host, port, ephemeral).await,
        Command::FixJson { input, out } => cmd_fix_json(&input, out.as_deref()),
        Command::Generate { prompt, model, out } => {
            cmd_generate(&prompt, &model, out.as_deref()).await
        }
        Command::Refine {
            input,
            prompt,
            model,
            out,
        } => cmd_refine(&input, &prompt, &model, out.as_deref()).await,
        Command::Knowledge { files, into } => cmd_knowledge(&files, into.as_deref()).await,
        Command::Build {
            form,
            knowledge,
            out,
        } => cmd_build(&form, &knowledge, out.as_deref()).await,
        Command::Backup { action } => cmd_backup(action).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A steady spinner on stderr for long-running calls.
fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(
            style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        return std::io::read_to_string(std::io::stdin()).wrap_err("failed to read stdin");
    }
    std::fs::read_to_string(path).wrap_err_with(|| format!("failed to read {}", path.display()))
}

fn read_character(path: &Path) -> Result<CharacterDocument> {
    Ok(chargen_core::fix_json(&read_input(path)?)?)
}

fn write_json(value: &impl serde::Serialize, out: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, format!("{text}\n"))
                .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn read_knowledge_files(paths: &[PathBuf]) -> Result<Vec<KnowledgeFile>> {
    paths
        .iter()
        .map(|path| {
            let bytes = std::fs::read(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(KnowledgeFile::from_path_bytes(name, bytes))
        })
        .collect()
}

/// Build the character service from config.
fn service(config: &AppConfig) -> Result<CharacterService<OpenRouterClient>> {
    let provider = ProviderConfig::try_from(config)?;
    let client = OpenRouterClient::new(provider)?;
    Ok(CharacterService::new(
        client,
        CommandPdfConverter::from(&config.knowledge),
    ))
}

/// Resolve the model ID and credential for a generating command.
fn model_and_key(config: &AppConfig, args: &ModelArgs) -> Result<(String, String)> {
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| config.openrouter.default_model.clone());
    let key = match &args.api_key {
        Some(key) => key.clone(),
        None => api_key_from_env(config)?,
    };
    Ok((model, key))
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_serve(host: Option<String>, port: Option<u16>, ephemeral: bool) -> Result<()> {
    let mut config = load_config()?;
    apply_env_overrides(&mut config);
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| eyre!("invalid bind address {}:{}: {e}", config.server.host, config.server.port))?;
    let options = ServeOptions {
        addr,
        autosave_interval: Duration::from_secs(config.backups.autosave_interval_secs.max(1)),
        autosave_name: config.backups.default_name.clone(),
    };
    let service = service(&config)?;
    let fallback_key = api_key_from_env(&config).ok();

    if ephemeral {
        info!("backups are kept in memory for this session");
        let state = AppState::new(service, Arc::new(MemoryBackupStore::new()));
        serve_with(state, &config, fallback_key, options).await
    } else {
        let db_path = backup_db_path(&config)?;
        info!(path = %db_path.display(), "opening backup database");
        let store = Storage::open(&db_path).await?;
        let state = AppState::new(service, Arc::new(store));
        serve_with(state, &config, fallback_key, options).await
    }
}

async fn serve_with<S: BackupStore + 'static>(
    state: AppState<OpenRouterClient, CommandPdfConverter, S>,
    config: &AppConfig,
    fallback_key: Option<String>,
    options: ServeOptions,
) -> Result<()> {
    let state = state
        .with_default_model(config.openrouter.default_model.clone())
        .with_fallback_credential(fallback_key);
    println!("chargen listening on http://{}", options.addr);
    chargen_server::serve(state, options).await?;
    Ok(())
}

fn cmd_fix_json(input: &Path, out: Option<&Path>) -> Result<()> {
    let character = chargen_core::fix_json(&read_input(input)?)?;
    write_json(&character, out)
}

async fn cmd_generate(prompt: &str, args: &ModelArgs, out: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let (model, key) = model_and_key(&config, args)?;
    let service = service(&config)?;

    info!(%model, "generating character");
    let progress = spinner(&format!("Generating with {model}"));
    let result = service.generate_character(prompt, &model, &key).await;
    progress.finish_and_clear();

    write_json(&result?.character, out)
}

async fn cmd_refine(input: &Path, prompt: &str, args: &ModelArgs, out: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let (model, key) = model_and_key(&config, args)?;
    let previous = read_character(input)?;
    let service = service(&config)?;

    info!(%model, name = %previous.name, "refining character");
    let progress = spinner(&format!("Refining with {model}"));
    let result = service.refine_character(prompt, &model, &key, &previous).await;
    progress.finish_and_clear();

    write_json(&result?.character, out)
}

async fn cmd_knowledge(paths: &[PathBuf], into: Option<&Path>) -> Result<()> {
    let config = load_config()?;
    let files = read_knowledge_files(paths)?;
    let lines =
        chargen_core::knowledge::extract_knowledge(&files, &CommandPdfConverter::from(&config.knowledge))
            .await;

    match into {
        Some(path) => {
            let mut character = read_character(path)?;
            let added = lines.len();
            append_knowledge(&mut character.knowledge, lines);
            write_json(&character, Some(path))?;
            println!("Appended {added} knowledge lines to {}", path.display());
        }
        None => write_json(&lines, None)?,
    }
    Ok(())
}

async fn cmd_build(form_path: &Path, knowledge: &[PathBuf], out: Option<&Path>) -> Result<()> {
    let form: CharacterForm = serde_json::from_str(&read_input(form_path)?)
        .wrap_err_with(|| format!("invalid form JSON in {}", form_path.display()))?;

    let fallback = if knowledge.is_empty() {
        Vec::new()
    } else {
        let config = load_config()?;
        let files = read_knowledge_files(knowledge)?;
        chargen_core::knowledge::extract_knowledge(&files, &CommandPdfConverter::from(&config.knowledge))
            .await
    };

    write_json(&chargen_core::build_character(&form, &fallback), out)
}

async fn cmd_backup(action: BackupAction) -> Result<()> {
    let config = load_config()?;
    let store = Storage::open(&backup_db_path(&config)?).await?;

    match action {
        BackupAction::Save { input, name } => {
            let character = read_character(&input)?;
            let backup = store.save(name.as_deref().unwrap_or_default(), &character).await?;
            println!("Saved backup '{}' ({})", backup.name, backup.timestamp.to_rfc3339());
        }
        BackupAction::Load { name, out } => {
            let backup = store
                .load(&name)
                .await?
                .ok_or_else(|| eyre!("no backup named '{name}'"))?;
            write_json(&backup.data, out.as_deref())?;
        }
        BackupAction::List => {
            let backups = store.list().await?;
            if backups.is_empty() {
                println!("No backups.");
            }
            for backup in backups {
                let display = if backup.data.name.is_empty() {
                    "(unnamed)"
                } else {
                    backup.data.name.as_str()
                };
                println!(
                    "{:<24} {}  {}",
                    backup.name,
                    backup.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    display
                );
            }
        }
        BackupAction::Delete { name } => {
            if !store.delete(&name).await? {
                return Err(eyre!("no backup named '{name}'"));
            }
            println!("Deleted backup '{name}'");
        }
        BackupAction::Rename { old, new } => {
            if store.rename(&old, &new).await? {
                println!("Renamed '{old}' to '{}'", new.trim());
            } else if store.load(&old).await?.is_none() {
                return Err(eyre!("no backup named '{old}'"));
            } else {
                println!("Nothing to rename.");
            }
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let mut config: AppConfig = load_config()?;
    apply_env_overrides(&mut config);
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
