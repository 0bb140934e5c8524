//! Instruction text sent to the text generator.

use chargen_shared::{CharacterDocument, ChargenError, Result};

/// Shared output rules for both generation and refinement.
const OUTPUT_RULES: &str = "\
- Output exactly one JSON object and nothing else: no prose, no markdown fences, no comments.
- Use double quotes for every key and string value.
- Do not leave trailing commas.
- Every array element is a plain string, except messageExamples.
- Every sentence ends with a period.
- Adjectives are single lowercase words.";

/// Example of the expected document structure.
const SKELETON: &str = r#"{
  "name": "Character Name",
  "clients": [],
  "modelProvider": "",
  "settings": { "secrets": {}, "voice": { "model": "" } },
  "plugins": [],
  "bio": ["Sentence about the character."],
  "lore": ["Sentence of backstory."],
  "knowledge": ["A fact the character knows."],
  "messageExamples": [
    [
      { "user": "{{user1}}", "content": { "text": "A question." } },
      { "user": "Character Name", "content": { "text": "The character's answer." } }
    ]
  ],
  "postExamples": ["A short post in the character's voice."],
  "topics": ["A topic."],
  "style": {
    "all": ["A general style rule."],
    "chat": ["A chat style rule."],
    "post": ["A posting style rule."]
  },
  "adjectives": ["adjective"],
  "people": []
}"#;

/// A system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Prompts for creating a character from a description.
pub fn generation(description: &str) -> PromptPair {
    PromptPair {
        system: format!(
            "You are a character creation assistant. You respond only with a valid JSON \
             character profile.\n\nRules:\n{OUTPUT_RULES}"
        ),
        user: format!(
            "Create a character profile with this structure:\n{SKELETON}\n\n\
             Character description: {description}"
        ),
    }
}

/// Prompts for revising `current` according to `instruction`.
///
/// When the current document has knowledge, the model is told to leave it
/// alone; the reconciler enforces that regardless of what comes back.
pub fn refinement(instruction: &str, current: &CharacterDocument) -> Result<PromptPair> {
    let current_json = serde_json::to_string_pretty(current).map_err(|e| {
        ChargenError::malformed(format!("cannot serialize current character: {e}"))
    })?;

    let knowledge_rule = if current.knowledge.is_empty() {
        String::new()
    } else {
        "\n- Keep the knowledge array exactly as it is.".to_string()
    };

    Ok(PromptPair {
        system: format!(
            "You are a character refinement assistant. You respond only with a valid JSON \
             character profile.\n\nRules:\n{OUTPUT_RULES}\n\
             - Keep the character's core traits unless the instructions change them.\n\
             - Keep every field of the current structure.{knowledge_rule}"
        ),
        user: format!(
            "Current character data:\n{current_json}\n\n\
             Refinement instructions: {instruction}\n\n\
             Output the refined character data as a single JSON object with the same structure."
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_embeds_description_and_skeleton() {
        let prompts = generation("a grumpy airship captain");
        assert!(prompts.user.ends_with("Character description: a grumpy airship captain"));
        assert!(prompts.user.contains("\"messageExamples\""));
        assert!(prompts.system.contains("Every sentence ends with a period."));
    }

    #[test]
    fn skeleton_is_valid_json() {
        let value: serde_json::Value = serde_json::from_str(SKELETON).unwrap();
        assert!(value.is_object());
    }

    #[test]
    fn refinement_embeds_current_document() {
        let current = CharacterDocument {
            name: "Mira".into(),
            knowledge: vec!["Skyoil burns hot.".into()],
            ..Default::default()
        };
        let prompts = refinement("make her grumpier", &current).unwrap();
        assert!(prompts.user.contains("\"name\": \"Mira\""));
        assert!(prompts.user.contains("Refinement instructions: make her grumpier"));
        assert!(prompts.system.contains("knowledge array exactly"));
    }

    #[test]
    fn refinement_without_knowledge_omits_rule() {
        let prompts = refinement("x", &CharacterDocument::default()).unwrap();
        assert!(!prompts.system.contains("knowledge array"));
    }
}
