// crates/core/src/cost.rs
//! Token usage accrual and cost estimation.
//!
//! Pricing is a prefix-matched table in USD per million tokens. Cost is
//! accrued entry by entry with the model that produced that entry, so a
//! mid-session model switch keeps the running total correct; totals are
//! never re-derived from the summed counters.

use agentdeck_types::CumulativeUsage;

use crate::entry::{AssistantEntry, TokenCounts};

struct ModelPricing {
    prefix: &'static str,
    input: f64,
    output: f64,
    cache_read: f64,
    cache_creation: f64,
}

const MODEL_PRICING: &[ModelPricing] = &[
    ModelPricing {
        prefix: "claude-opus",
        input: 15.0,
        output: 75.0,
        cache_read: 1.5,
        cache_creation: 18.75,
    },
    ModelPricing {
        prefix: "claude-sonnet",
        input: 3.0,
        output: 15.0,
        cache_read: 0.3,
        cache_creation: 3.75,
    },
    ModelPricing {
        prefix: "claude-haiku",
        input: 0.8,
        output: 4.0,
        cache_read: 0.08,
        cache_creation: 1.0,
    },
];

fn pricing_for(model: &str) -> &'static ModelPricing {
    MODEL_PRICING
        .iter()
        .find(|p| model.starts_with(p.prefix))
        .unwrap_or(&MODEL_PRICING[1]) // unknown models priced as sonnet
}

/// Cost in USD of a single entry's token counts under `model`'s pricing.
pub fn entry_cost(model: &str, counts: &TokenCounts) -> f64 {
    let p = pricing_for(model);
    (counts.input_tokens as f64 * p.input
        + counts.output_tokens as f64 * p.output
        + counts.cache_read_input_tokens.unwrap_or(0) as f64 * p.cache_read
        + counts.cache_creation_input_tokens.unwrap_or(0) as f64 * p.cache_creation)
        / 1_000_000.0
}

/// Fold one entry's counts into the running totals. Counters only grow.
pub fn accrue(usage: &CumulativeUsage, model: &str, counts: &TokenCounts) -> CumulativeUsage {
    CumulativeUsage {
        input_tokens: usage.input_tokens + counts.input_tokens,
        output_tokens: usage.output_tokens + counts.output_tokens,
        cache_read_tokens: usage.cache_read_tokens + counts.cache_read_input_tokens.unwrap_or(0),
        cache_creation_tokens: usage.cache_creation_tokens
            + counts.cache_creation_input_tokens.unwrap_or(0),
        estimated_cost: usage.estimated_cost + entry_cost(model, counts),
    }
}

/// The model reported on an assistant entry, if any.
pub fn reported_model(entry: &AssistantEntry) -> Option<&str> {
    entry
        .message
        .model
        .as_deref()
        .filter(|m| !m.is_empty() && *m != "unknown" && *m != "<synthetic>")
}

/// The token counts reported on an assistant entry, if any.
pub fn reported_counts(entry: &AssistantEntry) -> Option<TokenCounts> {
    entry.message.usage
}
