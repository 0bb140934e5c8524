//! Merge a freshly generated document with the one it replaces.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use chargen_shared::CharacterDocument;

/// Whether the document is new or a revision of an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Generate,
    Refine,
}

/// Capitalized word run after "name"/"named", optionally via is/to/as/should be or `:`/`=`.
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?i:named?)\b\s*(?:(?i:is|to|as|should\s+be)\s+|[:=]\s*)?([\p{Lu}][\p{L}'\-]*(?:[ \t]+[\p{Lu}][\p{L}'\-]*)*)",
    )
    .expect("valid regex")
});

/// Pull a requested character name out of a free-text instruction.
///
/// Only capitalized words are taken, so "name her van Helsing" yields
/// `None` and "name is Ludwig van Beethoven" yields `"Ludwig"`.
pub fn extract_name(instruction: &str) -> Option<String> {
    NAME_RE
        .captures(instruction)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Apply refine carry-forward rules to a generated document.
///
/// Only [`Mode::Refine`] with a previous document changes anything: existing
/// knowledge is never replaced by the model's, the name only changes when the
/// instruction asks for it, and the integration fields (`clients`,
/// `modelProvider`, `settings`, `plugins`, `people`) are taken from
/// `previous` when the new document leaves them empty.
pub fn reconcile(
    mut generated: CharacterDocument,
    previous: Option<&CharacterDocument>,
    mode: Mode,
    instruction: Option<&str>,
) -> CharacterDocument {
    let Some(previous) = previous.filter(|_| mode == Mode::Refine) else {
        return generated;
    };

    if !previous.knowledge.is_empty() {
        generated.knowledge = previous.knowledge.clone();
    }

    match instruction.and_then(extract_name) {
        Some(name) => {
            debug!(%name, "instruction renames character");
            generated.name = name;
        }
        None if !previous.name.is_empty() => generated.name = previous.name.clone(),
        None => {}
    }

    if generated.clients.is_empty() {
        generated.clients = previous.clients.clone();
    }
    if generated.model_provider.is_empty() {
        generated.model_provider = previous.model_provider.clone();
    }
    if generated.settings.is_empty() {
        generated.settings = previous.settings.clone();
    }
    if generated.plugins.is_empty() {
        generated.plugins = previous.plugins.clone();
    }
    if generated.people.is_empty() {
        generated.people = previous.people.clone();
    }

    generated
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargen_shared::{Settings, Voice};

    fn previous() -> CharacterDocument {
        CharacterDocument {
            name: "Mira".into(),
            clients: vec!["discord".into()],
            model_provider: "openai".into(),
            settings: Settings {
                voice: Voice {
                    model: "en_US-female-medium".into(),
                },
                ..Default::default()
            },
            knowledge: vec!["A.".into(), "B.".into()],
            people: vec!["Oren".into()],
            ..Default::default()
        }
    }

    fn generated() -> CharacterDocument {
        CharacterDocument {
            name: "Zed".into(),
            bio: vec!["New bio.".into()],
            knowledge: vec!["C.".into()],
            ..Default::default()
        }
    }

    #[test]
    fn generate_without_previous_is_identity() {
        let doc = generated();
        assert_eq!(reconcile(doc.clone(), None, Mode::Generate, None), doc);
        assert_eq!(reconcile(doc.clone(), None, Mode::Refine, Some("name is Bob")), doc);
    }

    #[test]
    fn refine_keeps_existing_knowledge() {
        let out = reconcile(generated(), Some(&previous()), Mode::Refine, Some("make her grumpier"));
        assert_eq!(out.knowledge, vec!["A.", "B."]);
        assert_eq!(out.bio, vec!["New bio."]);
    }

    #[test]
    fn refine_takes_model_knowledge_when_previous_has_none() {
        let mut prev = previous();
        prev.knowledge.clear();
        let out = reconcile(generated(), Some(&prev), Mode::Refine, None);
        assert_eq!(out.knowledge, vec!["C."]);
    }

    #[test]
    fn refine_preserves_name_unless_instructed() {
        let out = reconcile(generated(), Some(&previous()), Mode::Refine, Some("more pirate slang"));
        assert_eq!(out.name, "Mira");

        let out = reconcile(
            generated(),
            Some(&previous()),
            Mode::Refine,
            Some("Change her name to Captain Mira Vale and make her grumpier"),
        );
        assert_eq!(out.name, "Captain Mira Vale");
    }

    #[test]
    fn integration_fields_carry_forward_when_empty() {
        let out = reconcile(generated(), Some(&previous()), Mode::Refine, None);
        assert_eq!(out.clients, vec!["discord"]);
        assert_eq!(out.model_provider, "openai");
        assert_eq!(out.settings.voice.model, "en_US-female-medium");
        assert_eq!(out.people, vec!["Oren"]);
    }

    #[test]
    fn generate_mode_ignores_previous() {
        let out = reconcile(generated(), Some(&previous()), Mode::Generate, Some("name is Bob"));
        assert_eq!(out, generated());
    }

    #[test]
    fn non_empty_generated_fields_win() {
        let mut doc = generated();
        doc.clients = vec!["twitter".into()];
        doc.model_provider = "anthropic".into();
        let out = reconcile(doc, Some(&previous()), Mode::Refine, None);
        assert_eq!(out.clients, vec!["twitter"]);
        assert_eq!(out.model_provider, "anthropic");
    }

    #[test]
    fn name_extraction_variants() {
        assert_eq!(extract_name("Her name is Zed."), Some("Zed".into()));
        assert_eq!(extract_name("name: Ada Lovelace"), Some("Ada Lovelace".into()));
        assert_eq!(extract_name("Name=Quill"), Some("Quill".into()));
        assert_eq!(extract_name("the name should be Old Tom"), Some("Old Tom".into()));
        assert_eq!(extract_name("a sailor named Pip"), Some("Pip".into()));
        assert_eq!(
            extract_name("name is Ludwig van Beethoven"),
            Some("Ludwig".into())
        );
    }

    #[test]
    fn name_extraction_rejects_non_names() {
        assert_eq!(extract_name("make her braver"), None);
        assert_eq!(extract_name("give her a name that sounds old"), None);
        assert_eq!(extract_name("rename Bob"), None);
        assert_eq!(extract_name("her name is lowercase"), None);
    }
}
