//! Character document logic for chargen.
//!
//! This crate ties JSON repair, schema normalization, reconciliation, and
//! knowledge extraction into the operations exposed by the server and CLI
//! (see [`service`]).

pub mod autosave;
pub mod builder;
pub mod knowledge;
pub mod prompts;
pub mod reconcile;
pub mod schema;
pub mod service;

pub use autosave::Autosaver;
pub use builder::{CharacterForm, MessageExampleInput};
pub use knowledge::{CommandPdfConverter, KnowledgeFile, PdfConverter, append_knowledge};
pub use reconcile::{Mode, reconcile};
pub use service::{CharacterService, GeneratedCharacter, build_character, fix_json};
