//! The externally visible character operations.
//!
//! Each operation validates its inputs before doing any work, then runs the
//! extraction pipeline: raw model text → [`chargen_repair::extract`] →
//! [`schema::validate_required`] → [`schema::normalize`] → [`reconcile`].

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, instrument};

use chargen_provider::{Completion, TextGenerator};
use chargen_shared::{CharacterDocument, ChargenError, Result};

use crate::builder::{self, CharacterForm};
use crate::knowledge::{self, CommandPdfConverter, KnowledgeFile, PdfConverter};
use crate::prompts::{self, PromptPair};
use crate::reconcile::{Mode, reconcile};
use crate::schema;

/// A generated or refined document plus the exchange that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCharacter {
    pub character: CharacterDocument,
    /// The caller's description or refinement instruction.
    pub raw_prompt: String,
    /// The model's unprocessed reply.
    pub raw_response: String,
}

/// Repair and normalize a user-supplied JSON text.
#[instrument(skip_all, fields(len = content.len()))]
pub fn fix_json(content: &str) -> Result<CharacterDocument> {
    if content.trim().is_empty() {
        return Err(ChargenError::missing_input("content"));
    }
    let parsed = chargen_repair::extract(content)?;
    Ok(schema::normalize(&parsed, None))
}

/// Build a document from editor form state.
pub fn build_character(form: &CharacterForm, fallback_knowledge: &[String]) -> CharacterDocument {
    builder::build(form, fallback_knowledge)
}

/// Character operations bound to a text generator and a PDF converter.
#[derive(Debug, Clone)]
pub struct CharacterService<G, P = CommandPdfConverter> {
    generator: G,
    pdf: P,
}

impl<G: TextGenerator, P: PdfConverter> CharacterService<G, P> {
    pub fn new(generator: G, pdf: P) -> Self {
        Self { generator, pdf }
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Create a new character from a free-text description.
    #[instrument(skip_all, fields(model = %model))]
    pub async fn generate_character(
        &self,
        prompt: &str,
        model: &str,
        credential: &str,
    ) -> Result<GeneratedCharacter> {
        validate_request(prompt, model, credential)?;
        let start = Instant::now();

        let prompts = prompts::generation(prompt);
        let raw_response = self.complete(&prompts, model, credential).await?;

        let parsed = chargen_repair::extract(&raw_response)?;
        schema::validate_required(&parsed)?;
        let character = reconcile(schema::normalize(&parsed, None), None, Mode::Generate, None);

        info!(
            name = %character.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "character generated"
        );
        Ok(GeneratedCharacter {
            character,
            raw_prompt: prompt.to_string(),
            raw_response,
        })
    }

    /// Revise `previous` according to a free-text instruction.
    ///
    /// Existing knowledge always survives; see [`reconcile`].
    #[instrument(skip_all, fields(model = %model, name = %previous.name))]
    pub async fn refine_character(
        &self,
        prompt: &str,
        model: &str,
        credential: &str,
        previous: &CharacterDocument,
    ) -> Result<GeneratedCharacter> {
        validate_request(prompt, model, credential)?;
        let start = Instant::now();

        let prompts = prompts::refinement(prompt, previous)?;
        let raw_response = self.complete(&prompts, model, credential).await?;

        let parsed = chargen_repair::extract(&raw_response)?;
        schema::validate_required(&parsed)?;
        let candidate = schema::normalize(&parsed, Some(previous));
        let character = reconcile(candidate, Some(previous), Mode::Refine, Some(prompt));

        info!(
            name = %character.name,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "character refined"
        );
        Ok(GeneratedCharacter {
            character,
            raw_prompt: prompt.to_string(),
            raw_response,
        })
    }

    /// Turn uploaded files into knowledge lines.
    pub async fn extract_knowledge(&self, files: &[KnowledgeFile]) -> Result<Vec<String>> {
        if files.is_empty() {
            return Err(ChargenError::missing_input("files"));
        }
        Ok(knowledge::extract_knowledge(files, &self.pdf).await)
    }

    async fn complete(&self, prompts: &PromptPair, model: &str, credential: &str) -> Result<String> {
        let raw = self
            .generator
            .complete(Completion {
                system: &prompts.system,
                user: &prompts.user,
                model,
                credential,
            })
            .await?;
        debug!(response = %raw, "raw model response");
        Ok(raw)
    }
}

fn validate_request(prompt: &str, model: &str, credential: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(ChargenError::missing_input("prompt"));
    }
    if model.trim().is_empty() {
        return Err(ChargenError::missing_input("model"));
    }
    if credential.trim().is_empty() {
        return Err(ChargenError::MissingCredential);
    }
    Ok(())
}
