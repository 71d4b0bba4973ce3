//! Prompt assembly
//!
//! The message sequence sent to the model is always:
//! 1. One system message
//! 2. The history slice, untouched and in chronological order
//! 3. One user message carrying grounding context, an optional degraded
//!    notice, and finally the literal user text
//!
//! Grounding precedes the question so the model reads it first.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::ConversationTurn;

/// Header opening the retrieved-context block
pub const CONTEXT_HEADER: &str = "--- Relevant Context ---";

/// Instruction following the retrieved-context block
pub const GROUNDING_INSTRUCTION: &str = "Use the above context to inform your response. \
     If the context doesn't cover the question, say so; don't fabricate.";

/// Notice inserted when every grounding source was unavailable
pub const DEGRADED_NOTICE: &str =
    "(Knowledge base temporarily unavailable; responding from conversation only)";

/// Default system instruction
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are Second, a locally run assistant.\n\
     Be direct, grounded, truth-seeking. Prefer clarity over persuasion.\n\
     If uncertain, say you're uncertain and propose how to verify.";

/// Speaker of a prompt message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message handed to the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    /// Create a system message
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Assemble the full message sequence for one exchange
#[must_use]
pub fn assemble(
    system: &str,
    context: &str,
    history: &[ConversationTurn],
    user_text: &str,
    degraded: bool,
) -> Vec<PromptMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(PromptMessage::system(system));
    messages.extend(history.iter().cloned().map(PromptMessage::from));
    messages.push(PromptMessage::user(build_user_turn(context, user_text, degraded)));
    messages
}

/// Build the final user turn: context block, degraded notice, then the text
#[must_use]
pub fn build_user_turn(context: &str, user_text: &str, degraded: bool) -> String {
    let mut parts: Vec<&str> = Vec::new();

    if !context.is_empty() {
        parts.extend([CONTEXT_HEADER, context, "", GROUNDING_INSTRUCTION, ""]);
    }

    if degraded {
        parts.extend([DEGRADED_NOTICE, ""]);
    }

    parts.push(user_text);
    parts.join("\n")
}
