//! Prompt builder for the agent pipeline stages.
//!
//! Each stage is an agent with a fixed instruction.  [`PromptBuilder`] turns
//! that instruction, the stage's remembered exchanges and the current input
//! into the `messages` array sent to the chat-completions endpoint.
//!
//! Known stage names (`cook_recipe`, `notes_making`, `final_answer`) get
//! dedicated instructions; any other name gets [`GENERIC_STAGE_INSTRUCTION`].

use crate::llm::client::ChatMessage;

// ---------------------------------------------------------------------------
// Stage instructions
// ---------------------------------------------------------------------------

/// Recipe generation: walks the user through a dish one step at a time.
const COOK_RECIPE_INSTRUCTION: &str = "\
You are an experienced chef guiding a home cook through a recipe.
Task: answer the cooking question, or present the next recipe step.

Rules:
1. Present ONE step at a time, headed `### Current Step: Step N`.
2. Put the main instruction in **bold** and details or tips in *italics*.
3. End a step with a short prompt such as *Let me know when you're done!*
4. When the user says \"done\" or \"next\", move to the following step;
   on \"repeat this step\", repeat the current one.
5. Answer substitution and technique questions directly and briefly.
6. Reply with the step or answer only.";

/// Note extraction: carries the recipe output forward and appends a note.
const NOTES_MAKING_INSTRUCTION: &str = "\
You keep a cook's running notes.
Task: read the previous stage's output, repeat it, and add ONE short note
recording the dish, the current step number, and key quantities or timings.

Rules:
1. First copy the previous stage's output verbatim, unchanged.
2. Then a blank line and one line starting with `Note:`.
3. The note is at most two sentences of plain text, no markdown.
4. Reply with nothing else.";

/// Final formatting: splits the carried recipe text and note into the JSON
/// payload.
const FINAL_ANSWER_INSTRUCTION: &str = "\
You format the assistant's final answer.
Task: the previous stage's output is the recipe step or answer, followed by
a line starting with `Note:`.  Turn it into a single JSON object.

Rules:
1. Output exactly one ```json fenced block and nothing else.
2. The object has two string fields: \"cook_recipe\" (everything before the
   `Note:` line, copied verbatim with markdown preserved and newlines as \\n)
   and \"notes_making\" (the note, without the `Note:` prefix).
3. Do not add, rewrite or drop information.";

/// Fallback for stage names with no dedicated instruction.
pub const GENERIC_STAGE_INSTRUCTION: &str = "\
You are one stage of a cooking assistant pipeline.
Task: improve or transform the previous stage's output so it answers the
user's current question.  Reply with the result only.";

/// Built-in instruction for `stage`, or the generic one.
pub fn instructions_for(stage: &str) -> &'static str {
    match stage {
        "cook_recipe" => COOK_RECIPE_INSTRUCTION,
        "notes_making" => NOTES_MAKING_INSTRUCTION,
        "final_answer" => FINAL_ANSWER_INSTRUCTION,
        _ => GENERIC_STAGE_INSTRUCTION,
    }
}

// ---------------------------------------------------------------------------
// PromptBuilder
// ---------------------------------------------------------------------------

/// Builds the chat `messages` for one stage invocation.
///
/// # Example
/// ```rust
/// use cooking_assistant::llm::PromptBuilder;
///
/// let builder = PromptBuilder::for_stage("cook_recipe");
/// let messages = builder.build_chat(&[], "How do I make pancakes?");
/// assert_eq!(messages.len(), 2);
/// ```
pub struct PromptBuilder {
    instructions: String,
}

impl PromptBuilder {
    /// Builder using the built-in instruction for `stage`.
    pub fn for_stage(stage: &str) -> Self {
        Self::with_instructions(instructions_for(stage))
    }

    /// Builder with caller-supplied instructions.
    pub fn with_instructions(instructions: &str) -> Self {
        Self {
            instructions: instructions.to_string(),
        }
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Build `[system, (user, assistant)*, user]`.
    ///
    /// `memory` holds `(input, output)` pairs, oldest first; they become
    /// alternating user/assistant messages so the model sees its own earlier
    /// answers.
    pub fn build_chat(&self, memory: &[(String, String)], input: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(2 + memory.len() * 2);
        messages.push(ChatMessage::system(self.instructions.as_str()));
        for (past_input, past_output) in memory {
            messages.push(ChatMessage::user(past_input.as_str()));
            messages.push(ChatMessage::assistant(past_output.as_str()));
        }
        messages.push(ChatMessage::user(input));
        messages
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
