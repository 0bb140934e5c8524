//! Turn uploaded files into knowledge lines.

use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use chargen_repair::sentences;
use chargen_shared::{ChargenError, KnowledgeConfig, Result};

/// Extensions decoded directly as UTF-8 text.
const TEXT_EXTENSIONS: [&str; 5] = ["txt", "md", "json", "yml", "csv"];

const PDF_MIME: &str = "application/pdf";

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct KnowledgeFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl KnowledgeFile {
    /// Guess the MIME type from the file extension.
    pub fn from_path_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = if has_extension(&name, "pdf") {
            PDF_MIME
        } else if is_text_file(&name) {
            "text/plain"
        } else {
            "application/octet-stream"
        };
        Self {
            mime_type: mime_type.into(),
            name,
            bytes,
        }
    }

    fn is_pdf(&self) -> bool {
        self.mime_type == PDF_MIME || has_extension(&self.name, "pdf")
    }
}

/// Whether `name` has one of the plain-text extensions (case-insensitive).
pub fn is_text_file(name: &str) -> bool {
    TEXT_EXTENSIONS.iter().any(|ext| has_extension(name, ext))
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

// ---------------------------------------------------------------------------
// PDF conversion
// ---------------------------------------------------------------------------

/// Converts PDF bytes to plain text.
pub trait PdfConverter: Send + Sync {
    fn to_text(&self, bytes: &[u8]) -> impl Future<Output = Result<String>> + Send;
}

/// Pipes the PDF through an external command (`pdftotext - -` by default).
#[derive(Debug, Clone)]
pub struct CommandPdfConverter {
    command: String,
    args: Vec<String>,
}

impl CommandPdfConverter {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl From<&KnowledgeConfig> for CommandPdfConverter {
    fn from(config: &KnowledgeConfig) -> Self {
        Self::new(config.pdf_command.clone(), config.pdf_args.clone())
    }
}

impl Default for CommandPdfConverter {
    fn default() -> Self {
        Self::from(&KnowledgeConfig::default())
    }
}

impl PdfConverter for CommandPdfConverter {
    async fn to_text(&self, bytes: &[u8]) -> Result<String> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ChargenError::Conversion(format!("failed to spawn {}: {e}", self.command)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChargenError::Conversion("converter stdin unavailable".into()))?;

        // The converter may fill stdout before it has read all of stdin.
        let input = bytes.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ChargenError::Conversion(format!("{} failed: {e}", self.command)))?;

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(error = %e, "converter closed stdin early"),
            Err(e) => debug!(error = %e, "stdin writer task failed"),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ChargenError::Conversion(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Extract knowledge lines from every file, in order.
///
/// Files that are neither PDF nor plain text, or that fail to convert, are
/// skipped with a warning.
#[instrument(skip_all, fields(files = files.len()))]
pub async fn extract_knowledge<P: PdfConverter>(files: &[KnowledgeFile], pdf: &P) -> Vec<String> {
    let mut lines = Vec::new();

    for file in files {
        let text = if file.is_pdf() {
            match pdf.to_text(&file.bytes).await {
                Ok(text) => text,
                Err(e) => {
                    warn!(file = %file.name, error = %e, "skipping file: PDF conversion failed");
                    continue;
                }
            }
        } else if is_text_file(&file.name) {
            String::from_utf8_lossy(&file.bytes).into_owned()
        } else {
            warn!(file = %file.name, mime = %file.mime_type, "skipping unsupported file type");
            continue;
        };

        let extracted = sentences::knowledge_lines(&text);
        debug!(file = %file.name, lines = extracted.len(), "extracted knowledge");
        lines.extend(extracted);
    }

    info!(lines = lines.len(), "knowledge extraction complete");
    lines
}

/// Append new lines after the existing ones. Existing entries are never removed.
pub fn append_knowledge(existing: &mut Vec<String>, new: impl IntoIterator<Item = String>) {
    existing.extend(new);
}
