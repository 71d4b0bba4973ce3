//! Budgeted context composition
//!
//! Packs retrieved items into a single labeled context block. Each source has
//! its own character budget; budgets never borrow from each other. Sources
//! are packed in priority order and, within a source, items are packed by
//! descending score until the next one would overflow the budget.

use crate::retrieval::{Retrieval, RetrievalItem, RetrievalOutcome, RetrievedItems, Source};

use super::truncate::truncate_at_sentence;

/// Source summary used when nothing was packed
pub const NO_SOURCES: &str = "none";

/// Character budget for one source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    /// Source the budget applies to
    pub source: Source,
    /// Total characters of item text allowed for this source
    pub max_chars: usize,
    /// Per-item cap applied by sentence-aware truncation before accounting
    pub item_chars: usize,
    /// Packing order, lowest first
    pub priority: u8,
}

impl ContextBudget {
    /// Default budget for episodic memory (packed first)
    #[must_use]
    pub const fn episodic() -> Self {
        Self {
            source: Source::Episodic,
            max_chars: 1400,
            item_chars: 300,
            priority: 1,
        }
    }

    /// Default budget for the knowledge base
    #[must_use]
    pub const fn knowledge() -> Self {
        Self {
            source: Source::Knowledge,
            max_chars: 1000,
            item_chars: 400,
            priority: 2,
        }
    }
}

/// A packed context block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedContext {
    /// Labeled items, one per line
    pub text: String,
    /// Audit string such as `episodic:3, knowledge:2`, or `none`
    pub summary: String,
    /// Number of items packed per source, in packing order
    pub counts: Vec<(Source, usize)>,
}

/// Packs retrieval results under per-source budgets
#[derive(Debug, Clone)]
pub struct ContextCompositor {
    budgets: Vec<ContextBudget>,
    min_score: f64,
}

impl Default for ContextCompositor {
    fn default() -> Self {
        Self::new(
            vec![ContextBudget::episodic(), ContextBudget::knowledge()],
            crate::retrieval::MIN_RELEVANCE_SCORE,
        )
    }
}

impl ContextCompositor {
    /// Create a compositor from a set of budgets
    ///
    /// Budgets are sorted by priority; ties keep the given order.
    #[must_use]
    pub fn new(mut budgets: Vec<ContextBudget>, min_score: f64) -> Self {
        budgets.sort_by_key(|b| b.priority);
        Self { budgets, min_score }
    }

    /// Budgets in packing order
    #[must_use]
    pub fn budgets(&self) -> &[ContextBudget] {
        &self.budgets
    }

    /// Pack items into a context block
    ///
    /// Items below the relevance threshold are dropped before any budget is
    /// consumed. Packing for a source stops at the first item that would
    /// overflow its budget; items already packed are kept.
    #[must_use]
    pub fn compose(&self, items: &RetrievedItems) -> ComposedContext {
        let mut lines = Vec::new();
        let mut counts = Vec::new();

        for budget in &self.budgets {
            let packed = self.pack_source(budget, items.for_source(budget.source));
            if !packed.is_empty() {
                counts.push((budget.source, packed.len()));
                lines.extend(packed);
            }
        }

        let summary = if counts.is_empty() {
            NO_SOURCES.to_string()
        } else {
            counts
                .iter()
                .map(|(source, n)| format!("{source}:{n}"))
                .collect::<Vec<_>>()
                .join(", ")
        };

        ComposedContext {
            text: lines.join("\n"),
            summary,
            counts,
        }
    }

    /// Compose a retrieval into the outcome handed to the prompt assembler
    #[must_use]
    pub fn outcome(&self, retrieval: &Retrieval) -> RetrievalOutcome {
        let composed = self.compose(&retrieval.items);
        RetrievalOutcome {
            context_text: composed.text,
            source_summary: composed.summary,
            degraded: retrieval.degraded,
        }
    }

    /// Pack one source's items under its budget, returning labeled lines
    fn pack_source(&self, budget: &ContextBudget, items: &[RetrievalItem]) -> Vec<String> {
        let mut ranked: Vec<&RetrievalItem> = items
            .iter()
            .filter(|item| item.is_relevant(self.min_score))
            .collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut used = 0;
        let mut lines = Vec::new();

        for item in ranked {
            let truncated = truncate_at_sentence(&item.text, budget.item_chars);
            let len = truncated.chars().count();
            if used + len > budget.max_chars {
                break;
            }
            used += len;
            lines.push(format!("{} {truncated}", item.tag.label()));
        }

        tracing::debug!(
            source = %budget.source,
            items = lines.len(),
            chars = used,
            budget = budget.max_chars,
            "packed source context"
        );

        lines
    }
}
