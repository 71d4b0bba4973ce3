//! Short-term conversation history
//!
//! Each conversation keeps a rolling window of its most recent exchanges.
//! An exchange (user turn plus assistant reply) is the atomic unit: it is
//! appended, evicted and budgeted as a whole, so the window never holds an
//! orphaned turn. Windows live for the lifetime of the process only.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::prompt::{PromptMessage, Role};

/// Default number of exchanges kept per conversation
pub const MAX_HISTORY_TURNS: usize = 5;

/// Default character budget for the history slice handed to the prompt
pub const HISTORY_CHAR_BUDGET: usize = 2400;

/// A single turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    /// Either `Role::User` or `Role::Assistant`
    pub role: Role,
    /// Turn text
    pub content: String,
}

impl From<ConversationTurn> for PromptMessage {
    fn from(turn: ConversationTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content,
        }
    }
}

/// One user message and the reply it received
#[derive(Debug, Clone, PartialEq, Eq)]
struct Exchange {
    user: String,
    assistant: String,
}

impl Exchange {
    fn chars(&self) -> usize {
        self.user.chars().count() + self.assistant.chars().count()
    }
}

/// Rolling window of exchanges for a single conversation
#[derive(Debug)]
pub struct ConversationWindow {
    exchanges: VecDeque<Exchange>,
    max_pairs: usize,
}

impl ConversationWindow {
    /// Create an empty window holding at most `max_pairs` exchanges
    #[must_use]
    pub fn new(max_pairs: usize) -> Self {
        Self {
            exchanges: VecDeque::with_capacity(max_pairs + 1),
            max_pairs,
        }
    }

    /// Append an exchange, evicting the oldest ones beyond the cap
    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.exchanges.push_back(Exchange {
            user: user.into(),
            assistant: assistant.into(),
        });
        while self.exchanges.len() > self.max_pairs {
            self.exchanges.pop_front();
        }
    }

    /// Most recent exchanges that fit `char_budget`, in chronological order
    ///
    /// Exchanges are considered newest first; the first one that would push
    /// the running total past the budget stops inclusion of it and of every
    /// older exchange.
    #[must_use]
    pub fn slice(&self, char_budget: usize) -> Vec<ConversationTurn> {
        let mut used = 0;
        let mut kept = Vec::new();

        for exchange in self.exchanges.iter().rev() {
            let chars = exchange.chars();
            if used + chars > char_budget {
                break;
            }
            used += chars;
            kept.push(exchange);
        }

        kept.iter()
            .rev()
            .flat_map(|exchange| {
                [
                    ConversationTurn {
                        role: Role::User,
                        content: exchange.user.clone(),
                    },
                    ConversationTurn {
                        role: Role::Assistant,
                        content: exchange.assistant.clone(),
                    },
                ]
            })
            .collect()
    }

    /// Empty the window, reporting whether anything was removed
    pub fn clear(&mut self) -> bool {
        let had_history = !self.exchanges.is_empty();
        self.exchanges.clear();
        had_history
    }

    /// Number of exchanges held
    #[must_use]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    /// Whether the window holds no exchanges
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

/// Per-conversation history windows
///
/// Windows for different conversations are independent. Each window sits
/// behind its own async lock, so holding [`HistoryStore::lock`] across an
/// entire exchange serializes messages within one conversation without
/// blocking any other.
#[derive(Debug)]
pub struct HistoryStore {
    windows: Mutex<HashMap<String, Arc<AsyncMutex<ConversationWindow>>>>,
    max_pairs: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(MAX_HISTORY_TURNS)
    }
}

impl HistoryStore {
    /// Create a store whose windows hold at most `max_pairs` exchanges
    #[must_use]
    pub fn new(max_pairs: usize) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_pairs,
        }
    }

    /// Cap on exchanges per conversation
    #[must_use]
    pub const fn max_pairs(&self) -> usize {
        self.max_pairs
    }

    /// Lock a conversation's window, creating it on first use
    ///
    /// The guard is the critical section for that conversation.
    pub async fn lock(&self, conversation_id: &str) -> OwnedMutexGuard<ConversationWindow> {
        let window = {
            let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                windows
                    .entry(conversation_id.to_string())
                    .or_insert_with(|| {
                        Arc::new(AsyncMutex::new(ConversationWindow::new(self.max_pairs)))
                    }),
            )
        };
        window.lock_owned().await
    }

    /// Append an exchange to a conversation
    pub async fn append(&self, conversation_id: &str, user: &str, assistant: &str) {
        self.lock(conversation_id).await.push(user, assistant);
    }

    /// Budget-bounded history slice for a conversation
    pub async fn window_for(&self, conversation_id: &str, char_budget: usize) -> Vec<ConversationTurn> {
        match self.existing(conversation_id) {
            Some(window) => window.lock().await.slice(char_budget),
            None => Vec::new(),
        }
    }

    /// Empty a conversation's window, reporting whether anything was removed
    ///
    /// The conversation's entry is dropped as well, unless another exchange
    /// is already queued on its window.
    pub async fn clear(&self, conversation_id: &str) -> bool {
        let Some(window) = self.existing(conversation_id) else {
            return false;
        };
        let mut guard = window.lock().await;
        let cleared = guard.clear();

        // Clones are only handed out under this lock, so the count is exact
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let idle = windows
            .get(conversation_id)
            .is_some_and(|w| Arc::ptr_eq(w, &window) && Arc::strong_count(w) == 2);
        if idle {
            windows.remove(conversation_id);
        }
        drop(windows);
        drop(guard);

        cleared
    }

    /// Number of conversations currently tracked
    #[must_use]
    pub fn conversation_count(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of exchanges cached for a conversation
    pub async fn pair_count(&self, conversation_id: &str) -> usize {
        match self.existing(conversation_id) {
            Some(window) => window.lock().await.len(),
            None => 0,
        }
    }

    fn existing(&self, conversation_id: &str) -> Option<Arc<AsyncMutex<ConversationWindow>>> {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(conversation_id)
            .map(Arc::clone)
    }
}
