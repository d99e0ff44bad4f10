//! Per-turn conversation assembly.

use std::sync::Arc;

use fabula::{
    Chapter, Character, ChatModel, ChunkIndex, ChunkRetriever, Message, Result,
};

use crate::prompts::{
    character_system_prompt, context_block, greeting_instruction, story_opening_instruction,
    story_system_prompt,
};
use crate::session::ChatSession;

/// Budgets and retrieval settings for chat turns.
#[derive(Debug, Clone, Copy)]
pub struct ChatConfig {
    /// Chunks retrieved per turn.
    pub top_k: usize,
    /// Token budget for the retrieved context in the system prompt.
    pub context_budget_tokens: usize,
    /// Token budget for the stored history sent with each turn.
    pub history_budget_tokens: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_budget_tokens: 800,
            history_budget_tokens: 1200,
        }
    }
}

/// Assembles grounded prompts and drives the chat model.
///
/// Every turn follows the same machine: retrieve → build the system prompt
/// (persona or narrator plus retrieved context) → truncate history to
/// budget → generate → append the reply.
pub struct ConversationAssembler {
    model: Arc<dyn ChatModel>,
    retriever: ChunkRetriever,
    config: ChatConfig,
}

impl ConversationAssembler {
    /// Create an assembler with default budgets.
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            retriever: ChunkRetriever::new(),
            config: ChatConfig::default(),
        }
    }

    /// Override the budgets and retrieval settings.
    #[must_use]
    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.retriever = ChunkRetriever::new().with_top_k(config.top_k);
        self.config = config;
        self
    }

    /// Run one character chat turn.
    ///
    /// `user_text` is appended to the session, grounded context is
    /// retrieved with the character filter, and the model's reply is
    /// appended before being returned.
    pub async fn chat_turn(
        &self,
        index: &ChunkIndex,
        session: &mut ChatSession,
        character: &Character,
        chapters: &[Chapter],
        user_text: &str,
    ) -> Result<String> {
        let chunks = self
            .retriever
            .retrieve_for_character(index, user_text, character, chapters)
            .await?;
        let context = context_block(&chunks, self.config.context_budget_tokens);
        let system = character_system_prompt(character, &context);

        session.push_user(user_text);
        let reply = self.generate_with_history(&system, session).await?;
        session.push_assistant(reply.clone());
        Ok(reply)
    }

    /// Run one story-mode turn for the reader's `action`.
    pub async fn story_turn(
        &self,
        index: &ChunkIndex,
        session: &mut ChatSession,
        title: &str,
        chapters: &[Chapter],
        characters: &[Character],
        action: &str,
    ) -> Result<String> {
        let chunks = self.retriever.retrieve(index, action).await?;
        let context = context_block(&chunks, self.config.context_budget_tokens);
        let system = story_system_prompt(title, chapters, characters, &context);

        session.push_user(action);
        let reply = self.generate_with_history(&system, session).await?;
        session.push_assistant(reply.clone());
        Ok(reply)
    }

    /// Generate a character's first greeting. Not stored in any session.
    pub async fn greet(&self, character: &Character) -> Result<String> {
        let system = character_system_prompt(character, "");
        let messages = vec![
            Message::system(system),
            Message::user(greeting_instruction(character)),
        ];
        self.model.generate(&messages).await
    }

    /// Generate the story-mode opening scene. Not stored in any session.
    pub async fn open_story(
        &self,
        title: &str,
        chapters: &[Chapter],
        characters: &[Character],
    ) -> Result<String> {
        let system = story_system_prompt(title, chapters, characters, "");
        let messages = vec![
            Message::system(system),
            Message::user(story_opening_instruction(title)),
        ];
        self.model.generate(&messages).await
    }

    async fn generate_with_history(
        &self,
        system: &str,
        session: &mut ChatSession,
    ) -> Result<String> {
        session.truncate_to_budget(self.config.history_budget_tokens);
        let mut messages = Vec::with_capacity(session.messages.len() + 1);
        messages.push(Message::system(system));
        messages.extend(session.messages.iter().cloned());
        tracing::debug!(
            session = %session.id,
            history = session.messages.len(),
            "generating reply"
        );
        self.model.generate(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use async_trait::async_trait;
    use fabula::{Chunk, MockEmbeddings, Role};
    use std::sync::Mutex;

    /// Echoes a canned reply and records every prompt it saw.
    struct RecordingModel {
        reply: String,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl RecordingModel {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> Vec<Message> {
            self.seen
                .lock()
                .expect("lock")
                .last()
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        async fn generate(&self, messages: &[Message]) -> Result<String> {
            self.seen.lock().expect("lock").push(messages.to_vec());
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "recording"
        }
    }

    async fn small_index() -> ChunkIndex {
        let mut index = ChunkIndex::new(Arc::new(MockEmbeddings::new(16)));
        index
            .add(&[
                Chunk::new(0, "Alice met the cat in the garden.", 0, 32),
                Chunk::new(1, "Bob worked the forge all night.", 32, 63),
            ])
            .await
            .expect("indexing");
        index
    }

    #[tokio::test]
    async fn test_chat_turn_appends_both_messages() {
        let model = RecordingModel::new("Why, hello there.");
        let assembler = ConversationAssembler::new(Arc::clone(&model) as Arc<dyn ChatModel>);
        let index = small_index().await;
        let alice = Character::named("Alice");
        let mut session = ChatSession::new(Some("Alice".to_string()));

        let reply = assembler
            .chat_turn(&index, &mut session, &alice, &[], "Who are you?")
            .await
            .expect("turn");
        assert_eq!(reply, "Why, hello there.");
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[0].role, Role::User);
        assert_eq!(session.messages[1].role, Role::Assistant);
        assert_eq!(session.state, SessionState::Active);
    }

    #[tokio::test]
    async fn test_chat_turn_sends_persona_and_context() {
        let model = RecordingModel::new("reply");
        let assembler = ConversationAssembler::new(Arc::clone(&model) as Arc<dyn ChatModel>);
        let index = small_index().await;
        let mut alice = Character::named("Alice");
        alice.traits = vec!["curious".to_string()];
        let mut session = ChatSession::new(Some("Alice".to_string()));

        assembler
            .chat_turn(&index, &mut session, &alice, &[], "Tell me about the garden")
            .await
            .expect("turn");

        let prompt = model.last_prompt();
        assert_eq!(prompt[0].role, Role::System);
        assert!(prompt[0].content.contains("You are Alice"));
        assert!(prompt[0].content.contains("curious"));
        // Retrieved novel text is in the system prompt.
        assert!(prompt[0].content.contains("garden") || prompt[0].content.contains("forge"));
        // The user turn is the last message.
        assert_eq!(
            prompt.last().map(|m| m.content.as_str()),
            Some("Tell me about the garden")
        );
    }

    #[tokio::test]
    async fn test_long_history_is_truncated_before_generation() {
        let model = RecordingModel::new("ok");
        let assembler = ConversationAssembler::new(Arc::clone(&model) as Arc<dyn ChatModel>).with_config(ChatConfig {
            top_k: 1,
            context_budget_tokens: 100,
            history_budget_tokens: 30,
        });
        let index = small_index().await;
        let alice = Character::named("Alice");
        let mut session = ChatSession::new(Some("Alice".to_string()));
        for i in 0..8 {
            session.push_user(format!("an earlier question number {i}"));
            session.push_assistant(format!("an earlier answer number {i}"));
        }

        assembler
            .chat_turn(&index, &mut session, &alice, &[], "newest question")
            .await
            .expect("turn");
        assert_eq!(session.state, SessionState::Truncated);
        let prompt = model.last_prompt();
        // System prompt plus a short tail of the history.
        assert!(prompt.len() < 18);
        assert!(prompt
            .iter()
            .any(|m| m.content == "newest question"));
    }

    #[tokio::test]
    async fn test_story_turn_uses_narrator_prompt() {
        let model = RecordingModel::new("The garden gate creaks open...");
        let assembler = ConversationAssembler::new(Arc::clone(&model) as Arc<dyn ChatModel>);
        let index = small_index().await;
        let mut session = ChatSession::new(None);

        let reply = assembler
            .story_turn(&index, &mut session, "Wonderland", &[], &[], "I open the gate")
            .await
            .expect("turn");
        assert!(reply.contains("gate"));
        let prompt = model.last_prompt();
        assert!(prompt[0].content.contains("narrator"));
        assert!(prompt[0].content.contains("\"Wonderland\""));
    }

    #[tokio::test]
    async fn test_greet_does_not_touch_history() {
        let model = RecordingModel::new("Hello, I am Alice.");
        let assembler = ConversationAssembler::new(model);
        let alice = Character::named("Alice");
        let greeting = assembler.greet(&alice).await.expect("greet");
        assert_eq!(greeting, "Hello, I am Alice.");
    }
}
