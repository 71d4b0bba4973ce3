//! Retrieval from the grounding sources
//!
//! Two independent backends feed the prompt:
//! - Watcher, the episodic memory service (past exchanges and notes)
//! - LOR, the knowledge base (documents and books)
//!
//! Both are queried concurrently for every message. A failing source is
//! absorbed into an empty result set; only when every source fails is the
//! retrieval marked degraded.

mod episodic;
mod knowledge;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub use episodic::WatcherClient;
pub use knowledge::LorClient;

use crate::{Error, Result};

/// Discard search results scoring below this
pub const MIN_RELEVANCE_SCORE: f64 = 0.4;

/// Default timeout for a single source search
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(5);

/// A grounding backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Episodic memory (Watcher)
    Episodic,
    /// Knowledge base (LOR)
    Knowledge,
}

impl Source {
    /// Name used in source summaries
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Knowledge => "knowledge",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Finer-grained origin of a retrieved item, used for labeling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    /// An episode from Watcher
    Episodic,
    /// A passage from the general document collection
    KnowledgeDocs,
    /// A passage from the books collection
    KnowledgeBooks,
}

impl SourceTag {
    /// Map a knowledge-base collection name to a tag
    ///
    /// Anything other than `books` is treated as a general document.
    #[must_use]
    pub fn from_collection(collection: &str) -> Self {
        if collection == "books" {
            Self::KnowledgeBooks
        } else {
            Self::KnowledgeDocs
        }
    }

    /// Label prefixed to the item in the composed context
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Episodic => "[Memory]",
            Self::KnowledgeDocs => "[Docs]",
            Self::KnowledgeBooks => "[Books]",
        }
    }

    /// Backend this tag belongs to
    #[must_use]
    pub const fn source(self) -> Source {
        match self {
            Self::Episodic => Source::Episodic,
            Self::KnowledgeDocs | Self::KnowledgeBooks => Source::Knowledge,
        }
    }
}

/// A single search hit from a grounding source
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalItem {
    /// Retrieved text
    pub text: String,
    /// Relevance score reported by the backend
    pub score: f64,
    /// Origin of the item
    pub tag: SourceTag,
}

impl RetrievalItem {
    /// Create a new retrieval item
    #[must_use]
    pub fn new(text: impl Into<String>, score: f64, tag: SourceTag) -> Self {
        Self {
            text: text.into(),
            score,
            tag,
        }
    }

    /// Whether the item clears the relevance threshold
    #[must_use]
    pub fn is_relevant(&self, min_score: f64) -> bool {
        self.score >= min_score
    }
}

/// Keep only items scoring at or above `min_score`, preserving order
#[must_use]
pub fn retain_relevant(items: Vec<RetrievalItem>, min_score: f64) -> Vec<RetrievalItem> {
    items
        .into_iter()
        .filter(|item| item.is_relevant(min_score))
        .collect()
}

/// A backend that can be searched for grounding context
///
/// Implementations return `Error::SourceUnavailable` for any transport or
/// decoding failure so the caller can tell "no results" apart from
/// "source down".
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Short service name used in logs (e.g. "watcher")
    fn name(&self) -> &'static str;

    /// Which backend this is
    fn source(&self) -> Source;

    /// Search the backend, returning relevance-filtered items
    ///
    /// # Errors
    ///
    /// Returns `Error::SourceUnavailable` if the backend cannot be queried
    async fn search(&self, query: &str) -> Result<Vec<RetrievalItem>>;
}

/// Filtered results grouped by backend
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedItems {
    pub episodic: Vec<RetrievalItem>,
    pub knowledge: Vec<RetrievalItem>,
}

impl RetrievedItems {
    /// Items retrieved from one backend
    #[must_use]
    pub fn for_source(&self, source: Source) -> &[RetrievalItem] {
        match source {
            Source::Episodic => &self.episodic,
            Source::Knowledge => &self.knowledge,
        }
    }

    /// Whether no backend produced anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.episodic.is_empty() && self.knowledge.is_empty()
    }
}

/// Result of a concurrent retrieval across every source
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    /// Items from the sources that answered
    pub items: RetrievedItems,
    /// Names of the sources that failed
    pub failed: Vec<&'static str>,
    /// True only when every source failed
    pub degraded: bool,
}

/// Joint result of retrieval and composition, ready for the prompt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrievalOutcome {
    /// Labeled, budgeted context block (empty when nothing was retrieved)
    pub context_text: String,
    /// Compact audit string such as `episodic:3, knowledge:2`
    pub source_summary: String,
    /// True when every source failed
    pub degraded: bool,
}

/// Runs both sources concurrently and isolates their failures
pub struct Retriever {
    episodic: Arc<dyn SearchSource>,
    knowledge: Arc<dyn SearchSource>,
    timeout: Duration,
}

impl Retriever {
    /// Create a retriever over an episodic and a knowledge source
    #[must_use]
    pub fn new(episodic: Arc<dyn SearchSource>, knowledge: Arc<dyn SearchSource>) -> Self {
        Self {
            episodic,
            knowledge,
            timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }

    /// Override the per-source timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Query both sources concurrently
    ///
    /// A failure or timeout in one source never blocks or fails the other.
    /// One failing source is logged and otherwise ignored; both failing
    /// yields empty results with `degraded` set.
    pub async fn aggregate(&self, query: &str) -> Retrieval {
        let (episodic, knowledge) = tokio::join!(
            search_isolated(self.episodic.as_ref(), query, self.timeout),
            search_isolated(self.knowledge.as_ref(), query, self.timeout),
        );

        let mut retrieval = Retrieval::default();

        match episodic {
            Ok(items) => retrieval.items.episodic = items,
            Err(e) => {
                tracing::warn!(source = self.episodic.name(), error = %e, "source search failed");
                retrieval.failed.push(self.episodic.name());
            }
        }

        match knowledge {
            Ok(items) => retrieval.items.knowledge = items,
            Err(e) => {
                tracing::warn!(source = self.knowledge.name(), error = %e, "source search failed");
                retrieval.failed.push(self.knowledge.name());
            }
        }

        if retrieval.failed.len() == 2 {
            tracing::error!(error = %Error::AllSourcesUnavailable, "responding without grounding");
            retrieval.degraded = true;
        }

        retrieval
    }
}

/// Wrap a transport or decoding failure as a source outage
pub(crate) fn unavailable(name: &'static str, reason: impl fmt::Display) -> Error {
    Error::SourceUnavailable {
        name,
        reason: reason.to_string(),
    }
}

/// Run one source search under its own timeout, capturing every failure
async fn search_isolated(
    source: &dyn SearchSource,
    query: &str,
    timeout: Duration,
) -> Result<Vec<RetrievalItem>> {
    match tokio::time::timeout(timeout, source.search(query)).await {
        Ok(result) => result,
        Err(_) => Err(unavailable(
            source.name(),
            format_args!("timed out after {}ms", timeout.as_millis()),
        )),
    }
}
