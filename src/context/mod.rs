//! Context assembly for model prompts
//!
//! Combines:
//! - Sentence-aware truncation of retrieved text
//! - Budgeted packing of retrieval results
//! - Rolling per-conversation history

mod compose;
mod history;
mod truncate;

pub use compose::{ComposedContext, ContextBudget, ContextCompositor, NO_SOURCES};
pub use history::{
    ConversationTurn, ConversationWindow, HISTORY_CHAR_BUDGET, HistoryStore, MAX_HISTORY_TURNS,
};
pub use truncate::{ELLIPSIS, truncate_at_sentence};

pub(crate) use truncate::char_boundary;
