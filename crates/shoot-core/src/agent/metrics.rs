use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agent::events::TokenUsage;
use crate::agent::types::RunStatus;

/// Accounting for one run's own model calls.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunMetrics {
    pub duration_ms: u64,
    pub num_turns: u32,
    pub total_cost_usd: f64,
    pub usage: TokenUsage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    /// Number of runs folded into this entry (a collector may be called repeatedly).
    #[serde(default = "one")]
    pub runs: u32,
}

fn one() -> u32 {
    1
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self {
            duration_ms: 0,
            num_turns: 0,
            total_cost_usd: 0.0,
            usage: TokenUsage::default(),
            status: None,
            runs: 1,
        }
    }
}

impl RunMetrics {
    /// Folds another run of the same agent into this entry.
    pub fn absorb(&mut self, other: &RunMetrics) {
        self.duration_ms += other.duration_ms;
        self.num_turns += other.num_turns;
        self.total_cost_usd += other.total_cost_usd;
        self.usage.add(&other.usage);
        self.status = other.status;
        self.runs += other.runs;
    }
}

/// Top-level metrics reported for one investigation.
///
/// `usage` and `total_cost_usd` are the sums of the `breakdown` entries, so
/// collector spend is counted exactly once.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InvestigationMetrics {
    pub duration_ms: u64,
    pub num_turns: u32,
    pub total_cost_usd: f64,
    pub usage: TokenUsage,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub breakdown: BTreeMap<String, RunMetrics>,
}

impl InvestigationMetrics {
    pub fn from_breakdown(
        duration_ms: u64,
        num_turns: u32,
        breakdown: BTreeMap<String, RunMetrics>,
    ) -> Self {
        let mut usage = TokenUsage::default();
        let mut total_cost_usd = 0.0;
        for entry in breakdown.values() {
            usage.add(&entry.usage);
            total_cost_usd += entry.total_cost_usd;
        }

        Self {
            duration_ms,
            num_turns,
            total_cost_usd,
            usage,
            breakdown,
        }
    }
}
