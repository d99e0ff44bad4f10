//! Prompt assembly for character chat and story mode.

use fabula::usage::{estimate_tokens, CHARS_PER_TOKEN};
use fabula::{Chapter, Character, Chunk};

/// Concatenate retrieved chunks, most relevant first, within a token
/// budget.
///
/// Chunks that no longer fit are dropped rather than split, except that
/// the most relevant chunk is always present — truncated to the budget if
/// it alone exceeds it.
#[must_use]
pub fn context_block(chunks: &[Chunk], budget_tokens: usize) -> String {
    let mut block = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let candidate_tokens = estimate_tokens(&block) + estimate_tokens(&chunk.text);
        if i > 0 && candidate_tokens > budget_tokens {
            break;
        }
        if i == 0 && candidate_tokens > budget_tokens {
            let budget_chars = budget_tokens.saturating_mul(CHARS_PER_TOKEN).max(1);
            let truncated: String = chunk.text.chars().take(budget_chars).collect();
            block.push_str(&truncated);
            break;
        }
        if !block.is_empty() {
            block.push_str("\n\n");
        }
        block.push_str(&chunk.text);
    }
    block
}

/// System prompt for a character chat turn.
#[must_use]
pub fn character_system_prompt(character: &Character, context: &str) -> String {
    let mut prompt = format!(
        "You are {name}, a character from a novel. Stay fully in character: \
speak in first person as {name}, never mention being an AI or a fictional \
character, and answer from {name}'s knowledge and point of view.\n",
        name = character.name
    );
    if !character.traits.is_empty() {
        prompt.push_str(&format!("Personality: {}\n", character.traits.join(", ")));
    }
    if !character.background.is_empty() {
        prompt.push_str(&format!("Background: {}\n", character.background));
    }
    if !character.role.is_empty() {
        prompt.push_str(&format!("Role in the story: {}\n", character.role));
    }
    if !character.relationships.is_empty() {
        let relations: Vec<String> = character
            .relationships
            .iter()
            .map(|(other, relation)| format!("{other}: {relation}"))
            .collect();
        prompt.push_str(&format!("Relationships: {}\n", relations.join("; ")));
    }
    if !character.description.is_empty() {
        prompt.push_str(&format!("Appearance: {}\n", character.description));
    }
    if !context.is_empty() {
        prompt.push_str(&format!(
            "\nRelevant passages from the novel, most relevant first. Ground \
your answers in them:\n{context}\n"
        ));
    }
    prompt
}

/// System prompt for a story-mode turn.
#[must_use]
pub fn story_system_prompt(
    title: &str,
    chapters: &[Chapter],
    characters: &[Character],
    context: &str,
) -> String {
    let mut prompt = format!(
        "You are the narrator of the novel \"{title}\". The reader takes \
actions inside the story; continue the narrative from each action in the \
novel's voice, keeping characters and events consistent with the book. \
Write vivid prose, 2-4 paragraphs per turn, and end at a moment that \
invites the reader's next action.\n"
    );
    if !characters.is_empty() {
        let names: Vec<String> = characters
            .iter()
            .take(5)
            .map(|c| {
                if c.role.is_empty() {
                    c.name.clone()
                } else {
                    format!("{} ({})", c.name, c.role)
                }
            })
            .collect();
        prompt.push_str(&format!("Main characters: {}\n", names.join(", ")));
    }
    let summaries: Vec<&str> = chapters
        .iter()
        .take(3)
        .map(|ch| ch.summary.as_str())
        .filter(|s| !s.is_empty())
        .collect();
    if !summaries.is_empty() {
        prompt.push_str(&format!("How the story opens: {}\n", summaries.join(" ")));
    }
    if !context.is_empty() {
        prompt.push_str(&format!(
            "\nPassages relevant to the reader's latest action:\n{context}\n"
        ));
    }
    prompt
}

/// One-off instruction asking a character to greet the reader.
#[must_use]
pub fn greeting_instruction(character: &Character) -> String {
    format!(
        "The reader has just opened a conversation with you. Greet them in \
one or two sentences as {} would, and invite a question.",
        character.name
    )
}

/// One-off instruction asking the narrator to open the story.
#[must_use]
pub fn story_opening_instruction(title: &str) -> String {
    format!(
        "Open the interactive story of \"{title}\": set the scene where the \
novel begins in 2-3 paragraphs, then ask the reader what they do."
    )
}
