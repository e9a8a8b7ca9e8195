//! Default instructions for each stage.

use serde::{Deserialize, Serialize};

/// Stage 1 default: add a person without touching the scene.
pub const DEFAULT_ADD_CONTENT_PROMPT: &str = "Add a realistic person to this scene in a natural pose. \
The person should be doing something interesting but believable. Keep the background, lighting, \
and environment exactly as they are. Only add the person, do not change anything else in the image.";

/// Stage 2 default. The composite is built locally, so this is recorded
/// but never sent.
pub const DEFAULT_COMPOSITE_PROMPT: &str = "Create a side-by-side comparison by placing the first \
image on the left and the second image on the right, with equal spacing and the same height. \
Make it look like a before/after or comparison layout.";

/// Stage 3 default: move the right half's person onto the left half.
pub const DEFAULT_SWAP_PROMPT: &str = "This is a side-by-side composite image. I need you to: \
1) Take the person's appearance from the RIGHT side image, 2) Apply that person's appearance to \
the person on the LEFT side, 3) Keep the LEFT side background, pose, and scene exactly as they are, \
4) Only change the person's appearance, not the environment, 5) Return ONLY the left side image \
with the updated person. The result should be the left side scene with the right side person's \
appearance.";

/// Appended to every swap instruction.
pub const SWAP_LAYOUT_NOTE: &str = " The composite image has two parts: LEFT (scene with person) \
and RIGHT (person source). Transfer the person's appearance from RIGHT to LEFT, keeping the LEFT \
scene intact. Return only the LEFT side result.";

/// Instructions for the three stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePrompts {
    /// Stage 1 instruction.
    pub add_content: String,
    /// Stage 2 instruction.
    pub composite: String,
    /// Stage 3 instruction, before the layout note is appended.
    pub swap: String,
}

impl Default for StagePrompts {
    fn default() -> Self {
        Self {
            add_content: DEFAULT_ADD_CONTENT_PROMPT.to_string(),
            composite: DEFAULT_COMPOSITE_PROMPT.to_string(),
            swap: DEFAULT_SWAP_PROMPT.to_string(),
        }
    }
}

impl StagePrompts {
    /// Sets the stage 1 instruction.
    #[must_use]
    pub fn with_add_content(mut self, prompt: impl Into<String>) -> Self {
        self.add_content = prompt.into();
        self
    }

    /// Sets the stage 2 instruction.
    #[must_use]
    pub fn with_composite(mut self, prompt: impl Into<String>) -> Self {
        self.composite = prompt.into();
        self
    }

    /// Sets the stage 3 instruction.
    #[must_use]
    pub fn with_swap(mut self, prompt: impl Into<String>) -> Self {
        self.swap = prompt.into();
        self
    }

    /// The stage 3 instruction as actually sent.
    #[must_use]
    pub fn swap_instruction(&self) -> String {
        augment_swap_instruction(&self.swap)
    }
}

/// Appends [`SWAP_LAYOUT_NOTE`] so the service knows which half is which.
#[must_use]
pub fn augment_swap_instruction(instruction: &str) -> String {
    format!("{instruction}{SWAP_LAYOUT_NOTE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_instruction_gets_layout_note() {
        let prompts = StagePrompts::default().with_swap("Swap them.");
        let sent = prompts.swap_instruction();
        assert!(sent.starts_with("Swap them. The composite image has two parts"));
        assert!(sent.ends_with("Return only the LEFT side result."));
    }

    #[test]
    fn test_partial_prompts_deserialize_with_defaults() {
        let prompts: StagePrompts =
            serde_json::from_value(serde_json::json!({"add_content": "add a cyclist"})).unwrap();
        assert_eq!(prompts.add_content, "add a cyclist");
        assert_eq!(prompts.swap, DEFAULT_SWAP_PROMPT);
    }
}
