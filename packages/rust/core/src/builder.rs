//! Assemble a [`CharacterDocument`] from editor form fields.

use serde::Deserialize;

use chargen_repair::sentences::{self, split_adjectives, terminate_line};
use chargen_shared::{CharacterDocument, MessageExample, Settings, Style, Voice};

/// Raw editor state. Free-text fields hold prose that is split into
/// sentences; list fields hold one entry per line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterForm {
    pub name: String,
    pub clients: Vec<String>,
    pub model_provider: String,
    pub voice_model: String,
    pub bio: String,
    pub lore: String,
    /// One fact per line.
    pub knowledge: String,
    pub message_examples: Vec<MessageExampleInput>,
    pub post_examples: String,
    pub topics: String,
    pub style_all: String,
    pub style_chat: String,
    pub style_post: String,
    pub adjectives: String,
    /// One name per line.
    pub people: String,
}

/// One user/character exchange as typed into the form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageExampleInput {
    pub user: String,
    pub character: String,
}

/// Build a document from the form.
///
/// When the form's knowledge box is blank, `fallback_knowledge` (usually
/// lines extracted from uploaded files) is used instead.
pub fn build(form: &CharacterForm, fallback_knowledge: &[String]) -> CharacterDocument {
    let name = form.name.trim().to_string();

    let mut clients: Vec<String> = Vec::new();
    for client in form.clients.iter().map(|c| c.trim()).filter(|c| !c.is_empty()) {
        if !clients.iter().any(|c| c == client) {
            clients.push(client.to_string());
        }
    }

    let knowledge = if form.knowledge.trim().is_empty() {
        fallback_knowledge.to_vec()
    } else {
        form.knowledge.lines().filter_map(terminate_line).collect()
    };

    let mut doc = CharacterDocument {
        name,
        clients,
        model_provider: form.model_provider.trim().to_string(),
        settings: Settings {
            voice: Voice {
                model: form.voice_model.trim().to_string(),
            },
            ..Default::default()
        },
        plugins: Vec::new(),
        bio: sentences::normalize(&form.bio),
        lore: sentences::normalize(&form.lore),
        knowledge,
        message_examples: Vec::new(),
        post_examples: sentences::normalize(&form.post_examples),
        topics: sentences::normalize(&form.topics),
        style: Style {
            all: sentences::normalize(&form.style_all),
            chat: sentences::normalize(&form.style_chat),
            post: sentences::normalize(&form.style_post),
        },
        adjectives: split_adjectives(&form.adjectives),
        people: form
            .people
            .lines()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect(),
    };

    let speaker = doc.speaker_tag().to_string();
    doc.message_examples = form
        .message_examples
        .iter()
        .filter(|ex| !ex.user.trim().is_empty() || !ex.character.trim().is_empty())
        .map(|ex| MessageExample::new(ex.user.trim(), &speaker, ex.character.trim()))
        .collect();

    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargen_shared::{DEFAULT_CHARACTER_TAG, USER_PLACEHOLDER};

    fn form() -> CharacterForm {
        CharacterForm {
            name: " Captain Mira ".into(),
            clients: vec!["discord".into(), "telegram".into(), "discord".into()],
            model_provider: "openai".into(),
            voice_model: "en_US-female-medium".into(),
            bio: "Mira commands the Kestrel! She grew up in Vell".into(),
            knowledge: "Airships burn skyoil\n\nThe docks close at dusk.\n".into(),
            message_examples: vec![
                MessageExampleInput {
                    user: "Where to?".into(),
                    character: "Wherever pays.".into(),
                },
                MessageExampleInput {
                    user: "  ".into(),
                    character: "".into(),
                },
                MessageExampleInput {
                    user: "".into(),
                    character: "Hoist the sails.".into(),
                },
            ],
            adjectives: "Bold  WRY\nrestless".into(),
            people: "First Mate Oren\n\n  Harbormaster Quill ".into(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_normalized_document() {
        let doc = build(&form(), &[]);

        assert_eq!(doc.name, "Captain Mira");
        assert_eq!(doc.clients, vec!["discord", "telegram"]);
        assert_eq!(doc.settings.voice.model, "en_US-female-medium");
        assert!(doc.settings.secrets.is_empty());
        assert!(doc.plugins.is_empty());
        assert_eq!(doc.bio, vec!["Mira commands the Kestrel.", "She grew up in Vell."]);
        assert_eq!(doc.knowledge, vec!["Airships burn skyoil.", "The docks close at dusk."]);
        assert_eq!(doc.adjectives, vec!["bold", "wry", "restless"]);
        assert_eq!(doc.people, vec!["First Mate Oren", "Harbormaster Quill"]);
        assert!(doc.lore.is_empty());
        assert_eq!(doc.style, Style::default());
    }

    #[test]
    fn blank_exchanges_are_dropped() {
        let doc = build(&form(), &[]);
        assert_eq!(doc.message_examples.len(), 2);

        let first = &doc.message_examples[0];
        assert_eq!(first.user().user, USER_PLACEHOLDER);
        assert_eq!(first.user().content.text, "Where to?");
        assert_eq!(first.reply().user, "Captain Mira");

        let second = &doc.message_examples[1];
        assert_eq!(second.user().content.text, "");
        assert_eq!(second.reply().content.text, "Hoist the sails.");
    }

    #[test]
    fn unnamed_character_uses_default_tag() {
        let mut form = form();
        form.name.clear();
        let doc = build(&form, &[]);
        assert_eq!(doc.message_examples[0].reply().user, DEFAULT_CHARACTER_TAG);
    }

    #[test]
    fn fallback_knowledge_used_only_when_box_is_blank() {
        let fallback = vec!["From a file.".to_string()];

        let doc = build(&form(), &fallback);
        assert_eq!(doc.knowledge.len(), 2);

        let mut form = form();
        form.knowledge = "  \n ".into();
        let doc = build(&form, &fallback);
        assert_eq!(doc.knowledge, fallback);
    }

    #[test]
    fn form_deserializes_from_camel_case() {
        let form: CharacterForm = serde_json::from_value(serde_json::json!({
            "name": "Ada",
            "styleAll": "Precise",
            "messageExamples": [{"user": "hi", "character": "hello"}]
        }))
        .unwrap();
        let doc = build(&form, &[]);
        assert_eq!(doc.style.all, vec!["Precise."]);
        assert_eq!(doc.message_examples[0].reply().user, "Ada");
    }
}
