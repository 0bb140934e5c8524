//! Shape a loosely-typed JSON object into a [`CharacterDocument`].
//!
//! Model output and hand-edited files routinely omit fields, use `null`, or
//! put a bare string where a list belongs. [`normalize`] never fails: each
//! field is read if it has a usable shape, otherwise taken from the prior
//! document (when refining) or left at its empty default.

use serde_json::{Map, Value};

use chargen_repair::sentences::{period_line, split_adjectives, terminate_line};
use chargen_shared::{
    CharacterDocument, ChargenError, DEFAULT_CHARACTER_TAG, MessageExample, MessageTurn,
    REQUIRED_FIELDS, Result, Settings, Style, USER_PLACEHOLDER, Voice,
};

/// Check that every required top-level field is present and non-null.
pub fn validate_required(candidate: &Map<String, Value>) -> Result<()> {
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| candidate.get(**field).is_none_or(Value::is_null))
        .map(|field| field.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ChargenError::InvalidCharacterData { missing })
    }
}

/// Fill every field of `candidate`, falling back to `prior` and then to empty defaults.
pub fn normalize(candidate: &Map<String, Value>, prior: Option<&CharacterDocument>) -> CharacterDocument {
    let fallback = prior.cloned().unwrap_or_default();

    let name = string_field(candidate.get("name")).unwrap_or(fallback.name);
    let speaker = if name.is_empty() {
        DEFAULT_CHARACTER_TAG.to_string()
    } else {
        name.clone()
    };

    CharacterDocument {
        clients: string_list(candidate.get("clients"))
            .map(dedup)
            .unwrap_or(fallback.clients),
        model_provider: string_field(candidate.get("modelProvider"))
            .unwrap_or(fallback.model_provider),
        settings: settings(candidate.get("settings"), fallback.settings),
        plugins: string_list(candidate.get("plugins")).unwrap_or(fallback.plugins),
        bio: sentence_list(candidate.get("bio")).unwrap_or(fallback.bio),
        lore: sentence_list(candidate.get("lore")).unwrap_or(fallback.lore),
        knowledge: knowledge_list(candidate.get("knowledge")).unwrap_or(fallback.knowledge),
        message_examples: message_examples(candidate.get("messageExamples"), &speaker)
            .unwrap_or(fallback.message_examples),
        post_examples: sentence_list(candidate.get("postExamples"))
            .unwrap_or(fallback.post_examples),
        topics: sentence_list(candidate.get("topics")).unwrap_or(fallback.topics),
        style: style(candidate.get("style"), fallback.style),
        adjectives: string_list(candidate.get("adjectives"))
            .map(|words| words.iter().flat_map(|w| split_adjectives(w)).collect())
            .unwrap_or(fallback.adjectives),
        people: string_list(candidate.get("people")).unwrap_or(fallback.people),
        name,
    }
}

// ---------------------------------------------------------------------------
// Field readers. `None` means "no usable value": the caller falls back.
// ---------------------------------------------------------------------------

fn string_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()),
        _ => None,
    }
}

/// A list of trimmed, non-empty strings. Scalars inside are stringified; a
/// bare string counts as a one-element list.
fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    match value? {
        Value::Array(items) => Some(items.iter().filter_map(scalar_text).collect()),
        Value::String(s) => Some(scalar_text(&Value::String(s.clone())).into_iter().collect()),
        _ => None,
    }
}

/// A string list whose entries each end in a single period.
fn sentence_list(value: Option<&Value>) -> Option<Vec<String>> {
    string_list(value).map(|items| items.iter().filter_map(|s| period_line(s)).collect())
}

/// Knowledge keeps a trailing `!` or `?`; anything else gets a period.
fn knowledge_list(value: Option<&Value>) -> Option<Vec<String>> {
    string_list(value).map(|items| items.iter().filter_map(|s| terminate_line(s)).collect())
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|s| seen.insert(s.clone())).collect()
}

fn settings(value: Option<&Value>, fallback: Settings) -> Settings {
    let Some(Value::Object(obj)) = value else {
        return fallback;
    };

    let secrets = match obj.get("secrets") {
        Some(Value::Object(secrets)) => secrets.clone(),
        _ => fallback.secrets,
    };
    let model = match obj.get("voice") {
        Some(Value::Object(voice)) => string_field(voice.get("model")).unwrap_or_default(),
        _ => fallback.voice.model,
    };

    Settings {
        secrets,
        voice: Voice { model },
    }
}

fn style(value: Option<&Value>, fallback: Style) -> Style {
    let Some(Value::Object(obj)) = value else {
        return fallback;
    };

    Style {
        all: sentence_list(obj.get("all")).unwrap_or(fallback.all),
        chat: sentence_list(obj.get("chat")).unwrap_or(fallback.chat),
        post: sentence_list(obj.get("post")).unwrap_or(fallback.post),
    }
}

/// Read exchange pairs. Extra turns are dropped, a lone turn gets an empty
/// reply, and entries that are not arrays are skipped.
fn message_examples(value: Option<&Value>, speaker: &str) -> Option<Vec<MessageExample>> {
    let Value::Array(pairs) = value? else {
        return None;
    };

    let examples = pairs
        .iter()
        .filter_map(|pair| {
            let turns = pair.as_array().filter(|t| !t.is_empty())?;
            let user = turn(turns.first(), USER_PLACEHOLDER);
            let reply = turn(turns.get(1), speaker);
            Some(MessageExample(user, reply))
        })
        .collect();
    Some(examples)
}

fn turn(value: Option<&Value>, default_user: &str) -> MessageTurn {
    let Some(Value::Object(obj)) = value else {
        return MessageTurn::new(default_user, "");
    };

    let user = string_field(obj.get("user"))
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| default_user.to_string());
    let text = match obj.get("content") {
        Some(Value::Object(content)) => content
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Some(Value::String(text)) => text.clone(),
        _ => String::new(),
    };

    MessageTurn::new(user, text)
}
