//! Fixed instructions sent to the reasoning model.

/// System role for all analysis calls.
pub const ANALYST_SYSTEM: &str = "You are a literary analyst. You read novel \
excerpts carefully and respond with a single JSON object, nothing else.";

/// Appended when a reply failed to parse, before the one retry.
pub const CORRECTIVE_INSTRUCTION: &str = "Your previous reply was not a valid \
JSON object matching the requested fields. Respond again with ONLY a JSON \
object, no prose and no code fences, containing exactly the fields described \
above.";

/// Analysis request for one chapter.
#[must_use]
pub fn chapter_analysis_prompt(chapter_number: usize, chapter_text: &str) -> String {
    format!(
        "Below is chapter {chapter_number} of a novel. Analyze it and reply \
with a JSON object with these fields:\n\
- \"title\": the chapter title, or one you coin from the content (string, required)\n\
- \"summary\": a 2-3 sentence summary (string, required)\n\
- \"keywords\": thematic keywords (array of strings)\n\
- \"characters_mentioned\": character names appearing in the chapter (array of strings)\n\
- \"key_events\": the main plot events (array of strings)\n\
- \"emotional_tone\": the dominant emotional tone (string)\n\
- \"setting\": where the chapter takes place (string)\n\
\n\
Chapter text:\n{chapter_text}"
    )
}

/// Request for the novel's main character names.
#[must_use]
pub fn character_list_prompt(opening_sample: &str, mentioned: &[String]) -> String {
    format!(
        "Below is the opening of a novel and the character names mentioned \
per chapter. Identify the 5-10 main characters and reply with a JSON object:\n\
{{\"characters\": [\"name\", ...]}}\n\
\n\
Opening:\n{opening_sample}\n\
\n\
Mentioned characters: {}",
        mentioned.join(", ")
    )
}

/// Analysis request for one character over its mention contexts.
#[must_use]
pub fn character_analysis_prompt(name: &str, contexts: &str) -> String {
    format!(
        "Below are passages from a novel where the character '{name}' is \
mentioned. Based only on them, reply with a JSON object with these fields:\n\
- \"name\": the character's name (string, required)\n\
- \"traits\": personality traits (array of strings)\n\
- \"background\": occupation, origin, history (string)\n\
- \"role\": role in the story, e.g. protagonist, antagonist, supporting (string)\n\
- \"relationships\": other character names mapped to the relation (object)\n\
- \"description\": appearance and notable features (string)\n\
\n\
Passages:\n{contexts}"
    )
}
