//! Core domain types for chargen character documents and backups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder speaker tag for the user side of a message example.
pub const USER_PLACEHOLDER: &str = "{{user1}}";

/// Speaker tag used for the character side when the document has no name.
pub const DEFAULT_CHARACTER_TAG: &str = "character";

/// Top-level fields every returned character document must carry.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "bio",
    "lore",
    "topics",
    "style",
    "adjectives",
    "messageExamples",
    "postExamples",
];

/// Name used for backups saved without an explicit name.
pub const DEFAULT_BACKUP_NAME: &str = "Autosave";

/// Prefix of every backup storage key.
pub const BACKUP_KEY_PREFIX: &str = "character_backup_";

// ---------------------------------------------------------------------------
// CharacterDocument
// ---------------------------------------------------------------------------

/// The canonical character profile, serialized with camelCase keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CharacterDocument {
    pub name: String,
    /// Enabled client integrations; order is irrelevant, duplicates are not kept.
    pub clients: Vec<String>,
    pub model_provider: String,
    pub settings: Settings,
    /// Reserved; currently always empty.
    pub plugins: Vec<String>,
    pub bio: Vec<String>,
    pub lore: Vec<String>,
    /// Period-terminated facts. Append-only unless explicitly edited.
    pub knowledge: Vec<String>,
    pub message_examples: Vec<MessageExample>,
    pub post_examples: Vec<String>,
    pub topics: Vec<String>,
    pub style: Style,
    /// Single lowercase words.
    pub adjectives: Vec<String>,
    pub people: Vec<String>,
}

impl CharacterDocument {
    /// Speaker tag for the character side of message examples.
    pub fn speaker_tag(&self) -> &str {
        if self.name.is_empty() {
            DEFAULT_CHARACTER_TAG
        } else {
            &self.name
        }
    }
}

/// `settings` block: opaque secrets plus voice configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub secrets: serde_json::Map<String, serde_json::Value>,
    pub voice: Voice,
}

impl Settings {
    /// True when neither secrets nor a voice model are configured.
    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty() && self.voice.model.is_empty()
    }
}

/// `settings.voice` block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Voice {
    pub model: String,
}

/// `style` block: sentence lists per context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    pub all: Vec<String>,
    pub chat: Vec<String>,
    pub post: Vec<String>,
}

// ---------------------------------------------------------------------------
// Message examples
// ---------------------------------------------------------------------------

/// One exchange: a user turn followed by a character turn.
///
/// Serializes as a two-element JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageExample(pub MessageTurn, pub MessageTurn);

impl MessageExample {
    /// Build a pair with the user placeholder on the first turn.
    pub fn new(user_text: impl Into<String>, speaker: &str, reply: impl Into<String>) -> Self {
        Self(
            MessageTurn::new(USER_PLACEHOLDER, user_text),
            MessageTurn::new(speaker, reply),
        )
    }

    pub fn user(&self) -> &MessageTurn {
        &self.0
    }

    pub fn reply(&self) -> &MessageTurn {
        &self.1
    }
}

/// A single speaker turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTurn {
    pub user: String,
    pub content: MessageContent,
}

impl MessageTurn {
    pub fn new(user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            content: MessageContent { text: text.into() },
        }
    }
}

/// Turn payload. `text` may be empty but is always present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageContent {
    pub text: String,
}

// ---------------------------------------------------------------------------
// Backups
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for backup identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackupId(pub Uuid);

impl BackupId {
    /// Generate a new time-sortable backup identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BackupId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BackupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for BackupId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A named, timestamped snapshot of a character document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Backup {
    pub id: BackupId,
    /// Display name as the user typed it.
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub data: CharacterDocument,
}

impl Backup {
    /// Storage key for this backup's name.
    pub fn key(&self) -> String {
        backup_key(&self.name)
    }
}

/// Resolve a user-supplied backup name, falling back to the default for blanks.
pub fn backup_name(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => DEFAULT_BACKUP_NAME.to_string(),
    }
}

/// Storage key for a backup name: prefix + name with whitespace runs as `_`, lowercased.
pub fn backup_key(name: &str) -> String {
    let slug = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    format!("{BACKUP_KEY_PREFIX}{slug}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backup_id_roundtrip() {
        let id = BackupId::new();
        let parsed: BackupId = id.to_string().parse().expect("parse BackupId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn document_serializes_with_camel_case_keys() {
        let doc = CharacterDocument {
            name: "Ada".into(),
            model_provider: "openai".into(),
            post_examples: vec!["Hello.".into()],
            ..Default::default()
        };
        let json = serde_json::to_value(&doc).expect("serialize");
        assert_eq!(json["modelProvider"], "openai");
        assert_eq!(json["postExamples"][0], "Hello.");
        assert!(json["messageExamples"].as_array().unwrap().is_empty());
        assert_eq!(json["settings"]["voice"]["model"], "");
        assert!(json["settings"]["secrets"].as_object().unwrap().is_empty());
    }

    #[test]
    fn message_example_is_a_two_element_array() {
        let pair = MessageExample::new("hi", "Ada", "hello there");
        let json = serde_json::to_value(&pair).expect("serialize");
        let turns = json.as_array().expect("array");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0]["user"], USER_PLACEHOLDER);
        assert_eq!(turns[1]["user"], "Ada");
        assert_eq!(turns[1]["content"]["text"], "hello there");
    }

    #[test]
    fn speaker_tag_defaults_when_unnamed() {
        let mut doc = CharacterDocument::default();
        assert_eq!(doc.speaker_tag(), DEFAULT_CHARACTER_TAG);
        doc.name = "Ada".into();
        assert_eq!(doc.speaker_tag(), "Ada");
    }

    #[test]
    fn backup_keys_are_slugged() {
        assert_eq!(backup_key("Autosave"), "character_backup_autosave");
        assert_eq!(backup_key("My  Pirate Draft"), "character_backup_my_pirate_draft");
    }

    #[test]
    fn blank_backup_names_fall_back() {
        assert_eq!(backup_name(None), DEFAULT_BACKUP_NAME);
        assert_eq!(backup_name(Some("   ")), DEFAULT_BACKUP_NAME);
        assert_eq!(backup_name(Some(" draft ")), "draft");
    }

    #[test]
    fn character_fixture_validates() {
        let fixture = std::fs::read_to_string("../../../fixtures/json/character.fixture.json")
            .expect("read fixture");
        let parsed: CharacterDocument =
            serde_json::from_str(&fixture).expect("deserialize fixture character");
        assert_eq!(parsed.name, "Captain Mira");
        assert_eq!(parsed.message_examples.len(), 1);
        assert_eq!(parsed.style.all.len(), 2);
        assert_eq!(parsed.knowledge.len(), 2);
    }
}
