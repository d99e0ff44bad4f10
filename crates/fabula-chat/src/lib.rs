//! Conversation assembly and the Fabula application engine.
//!
//! [`ConversationAssembler`] builds each turn's prompt from a character
//! persona (or narrator instruction), retrieval-grounded context under a
//! token budget, and budget-truncated history. [`NovelEngine`] ties the
//! whole pipeline together: upload → chunk → index → extract → chat/story,
//! with persistence through the core blob store.

mod assembler;
mod engine;
mod prompts;
mod session;

pub use assembler::{ChatConfig, ConversationAssembler};
pub use engine::{EngineConfig, NovelEngine};
pub use prompts::{character_system_prompt, context_block, story_system_prompt};
pub use session::{ChatSession, SessionState};
