//! Multi-factor confidence scoring with temporal decay.
//!
//! A score combines five weighted factors (weights sum to exactly 1.0):
//!
//! | Factor | Weight |
//! |---|---|
//! | source credibility | 0.30 |
//! | cross-validation | 0.25 |
//! | recency | 0.20 |
//! | historical accuracy | 0.15 |
//! | context relevance | 0.10 |
//!
//! `base = Σ value × weight`, then
//! `total = clamp(base × decay × bias_penalty, 0, 1)` where
//! `decay = max(0.10, (1 − weekly_rate)^(age_days / 7))` depends on the fact
//! type and `bias_penalty = 1 − 0.3 × bias` (1.0 for unbiased sources),
//! halved again once the bias reaches [`BiasLevel::High`].
//!
//! Historical accuracy is tracked per fact type over a rolling window of
//! recent outcomes, seeded with type-specific defaults until observations
//! arrive. Scores are never cached.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::config::ConfidenceConfig;
use crate::facts::FactType;
use crate::source::BiasLevel;

pub const SOURCE_CREDIBILITY_WEIGHT: f64 = 0.30;
pub const CROSS_VALIDATION_WEIGHT: f64 = 0.25;
pub const RECENCY_WEIGHT: f64 = 0.20;
pub const HISTORICAL_ACCURACY_WEIGHT: f64 = 0.15;
pub const CONTEXT_RELEVANCE_WEIGHT: f64 = 0.10;

/// Factor names paired with their weights, in scoring order.
pub const FACTOR_WEIGHTS: [(&str, f64); 5] = [
    ("source_credibility", SOURCE_CREDIBILITY_WEIGHT),
    ("cross_validation", CROSS_VALIDATION_WEIGHT),
    ("recency", RECENCY_WEIGHT),
    ("historical_accuracy", HISTORICAL_ACCURACY_WEIGHT),
    ("context_relevance", CONTEXT_RELEVANCE_WEIGHT),
];

/// Lower bound of the decay multiplier.
pub const MIN_DECAY: f64 = 0.10;

/// Weight of the mean source bias in the bias penalty.
pub const BIAS_PENALTY_WEIGHT: f64 = 0.3;

/// Extra multiplier applied when the mean bias is [`BiasLevel::High`].
pub const HIGH_BIAS_PENALTY: f64 = 0.5;

const STALE_AGE_DAYS: f64 = 30.0;
const SIGNIFICANT_DECAY: f64 = 0.5;
const LOW_CREDIBILITY: f64 = 0.4;
const SINGLE_SOURCE_CROSS_VALIDATION: f64 = 0.34;

// ---------------------------------------------------------------------------
// Factor curves
// ---------------------------------------------------------------------------

/// Step-function recency factor over whole days of age.
pub fn recency_factor(age_days: f64) -> f64 {
    let days = age_days.max(0.0).floor();
    if days < 1.0 {
        1.00
    } else if days <= 1.0 {
        0.95
    } else if days <= 7.0 {
        0.85
    } else if days <= 30.0 {
        0.70
    } else if days <= 90.0 {
        0.50
    } else if days <= 180.0 {
        0.30
    } else {
        0.10
    }
}

/// Weekly decay rate for a fact type.
pub fn weekly_decay_rate(fact_type: FactType) -> f64 {
    match fact_type {
        FactType::Factual => 0.10,
        FactType::Pattern => 0.05,
        FactType::News => 0.20,
        FactType::Sentiment => 0.30,
        FactType::Prediction => 0.40,
        FactType::Other => 0.15,
    }
}

/// Exponential decay multiplier, floored at [`MIN_DECAY`].
pub fn decay_multiplier(fact_type: FactType, age_days: f64) -> f64 {
    let weeks = age_days.max(0.0) / 7.0;
    (1.0 - weekly_decay_rate(fact_type)).powf(weeks).max(MIN_DECAY)
}

/// Multiplier for a mean source bias in `[0, 1]`.
///
/// High bias keeps a lone unknown-domain source under the acceptance floor
/// whatever its fact type.
pub fn bias_penalty(bias: f64) -> f64 {
    let bias = bias.clamp(0.0, 1.0);
    let linear = 1.0 - BIAS_PENALTY_WEIGHT * bias;
    match BiasLevel::from_score(bias) {
        BiasLevel::High => linear * HIGH_BIAS_PENALTY,
        _ => linear,
    }
}

/// Historical accuracy assumed before any outcome is recorded.
pub fn default_accuracy(fact_type: FactType) -> f64 {
    match fact_type {
        FactType::Factual => 0.85,
        FactType::Pattern => 0.70,
        FactType::News => 0.75,
        FactType::Sentiment => 0.65,
        FactType::Prediction => 0.50,
        FactType::Other => 0.60,
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One weighted component of a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactor {
    pub name: String,
    pub value: f64,
    pub weight: f64,
}

/// Inputs to [`ConfidenceScorer::score`].
#[derive(Debug, Clone)]
pub struct ScoreInput {
    pub fact_id: String,
    pub fact_type: FactType,
    pub source_credibility: f64,
    pub cross_validation: f64,
    pub age_days: f64,
    /// `None` uses the configured default relevance.
    pub context_relevance: Option<f64>,
    /// Mean bias score of the backing sources.
    pub bias: f64,
}

impl ScoreInput {
    pub fn new(fact_id: impl Into<String>, fact_type: FactType) -> Self {
        Self {
            fact_id: fact_id.into(),
            fact_type,
            source_credibility: 0.0,
            cross_validation: 0.0,
            age_days: 0.0,
            context_relevance: None,
            bias: 0.0,
        }
    }

    pub fn credibility(mut self, value: f64) -> Self {
        self.source_credibility = value;
        self
    }

    pub fn cross_validation(mut self, value: f64) -> Self {
        self.cross_validation = value;
        self
    }

    pub fn age_days(mut self, value: f64) -> Self {
        self.age_days = value;
        self
    }

    pub fn context_relevance(mut self, value: f64) -> Self {
        self.context_relevance = Some(value);
        self
    }

    pub fn bias(mut self, value: f64) -> Self {
        self.bias = value;
        self
    }
}

/// A freshly computed confidence score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceScore {
    pub fact_id: String,
    /// Final confidence in `[0, 1]`.
    pub total: f64,
    /// Weighted factor sum before decay and bias penalty.
    pub base: f64,
    pub factors: Vec<ConfidenceFactor>,
    pub fact_type: FactType,
    pub age_days: f64,
    /// Decay multiplier applied to `base`.
    pub decay_applied: f64,
    /// Bias multiplier applied to `base`.
    pub bias_penalty: f64,
    pub notes: Vec<String>,
}

impl ConfidenceScore {
    /// Value of the named factor, if present.
    pub fn factor(&self, name: &str) -> Option<f64> {
        self.factors.iter().find(|f| f.name == name).map(|f| f.value)
    }
}

/// One fact's contribution to a [`ConfidenceReport`].
#[derive(Debug, Clone, Copy)]
pub struct ReportEntry {
    pub confidence: f64,
    pub fact_type: FactType,
    pub age_days: f64,
}

/// Aggregate view over a collection of scored facts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceReport {
    pub count: usize,
    pub mean_confidence: f64,
    /// Facts at or above the high-confidence threshold.
    pub high_confidence: usize,
    /// Facts below the acceptance floor.
    pub below_floor: usize,
    pub per_type: BTreeMap<FactType, usize>,
    pub oldest_age_days: Option<f64>,
    pub newest_age_days: Option<f64>,
}

// ---------------------------------------------------------------------------
// Scorer
// ---------------------------------------------------------------------------

/// Computes confidence scores and tracks per-type historical accuracy.
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
    outcomes: RwLock<HashMap<FactType, VecDeque<bool>>>,
}

impl Default for ConfidenceScorer {
    fn default() -> Self {
        Self::new(ConfidenceConfig::default())
    }
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self {
            config,
            outcomes: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    /// Record whether a fact of `fact_type` turned out accurate.
    pub fn record_outcome(&self, fact_type: FactType, was_accurate: bool) {
        let mut outcomes = self.outcomes.write().expect("outcomes lock poisoned");
        let window = outcomes.entry(fact_type).or_default();
        window.push_back(was_accurate);
        while window.len() > self.config.accuracy_window {
            window.pop_front();
        }
    }

    /// Observed accuracy over the rolling window, or the type default when empty.
    pub fn historical_accuracy(&self, fact_type: FactType) -> f64 {
        let outcomes = self.outcomes.read().expect("outcomes lock poisoned");
        match outcomes.get(&fact_type) {
            Some(window) if !window.is_empty() => {
                window.iter().filter(|ok| **ok).count() as f64 / window.len() as f64
            }
            _ => default_accuracy(fact_type),
        }
    }

    /// Number of outcomes currently in the window for `fact_type`.
    pub fn observation_count(&self, fact_type: FactType) -> usize {
        self.outcomes
            .read()
            .expect("outcomes lock poisoned")
            .get(&fact_type)
            .map(|w| w.len())
            .unwrap_or(0)
    }

    /// Compute a confidence score.
    pub fn score(&self, input: &ScoreInput) -> ConfidenceScore {
        let credibility = input.source_credibility.clamp(0.0, 1.0);
        let cross_validation = input.cross_validation.clamp(0.0, 1.0);
        let relevance = input
            .context_relevance
            .unwrap_or(self.config.default_context_relevance)
            .clamp(0.0, 1.0);
        let values = [
            credibility,
            cross_validation,
            recency_factor(input.age_days),
            self.historical_accuracy(input.fact_type),
            relevance,
        ];

        let factors: Vec<ConfidenceFactor> = FACTOR_WEIGHTS
            .iter()
            .zip(values)
            .map(|((name, weight), value)| ConfidenceFactor {
                name: (*name).to_owned(),
                value,
                weight: *weight,
            })
            .collect();
        let base: f64 = factors.iter().map(|f| f.value * f.weight).sum();
        let decay = decay_multiplier(input.fact_type, input.age_days);
        let bias_penalty = bias_penalty(input.bias);
        let total = (base * decay * bias_penalty).clamp(0.0, 1.0);

        let mut notes = Vec::new();
        if total >= self.config.high_confidence {
            notes.push(format!("high confidence ({total:.2})"));
        }
        if total < self.config.acceptance_floor {
            notes.push(format!(
                "below acceptance floor ({total:.2} < {:.2})",
                self.config.acceptance_floor
            ));
        }
        if input.age_days > STALE_AGE_DAYS {
            notes.push(format!("stale: {:.0} days old", input.age_days));
        }
        if decay < SIGNIFICANT_DECAY {
            notes.push(format!(
                "significant {} decay (×{decay:.2})",
                input.fact_type
            ));
        }
        if credibility < LOW_CREDIBILITY {
            notes.push(format!("low-credibility source ({credibility:.2})"));
        }
        if cross_validation < SINGLE_SOURCE_CROSS_VALIDATION {
            notes.push("single source, not cross-validated".to_owned());
        }
        if bias_penalty < 1.0 {
            notes.push(format!("biased sources (×{bias_penalty:.2})"));
        }

        tracing::debug!(
            fact_id = %input.fact_id,
            fact_type = %input.fact_type,
            base,
            decay,
            total,
            "scored fact"
        );

        ConfidenceScore {
            fact_id: input.fact_id.clone(),
            total,
            base,
            factors,
            fact_type: input.fact_type,
            age_days: input.age_days,
            decay_applied: decay,
            bias_penalty,
            notes,
        }
    }

    /// Summarize a collection of scored facts.
    pub fn report(&self, entries: &[ReportEntry]) -> ConfidenceReport {
        let mut report = ConfidenceReport {
            count: entries.len(),
            ..Default::default()
        };
        if entries.is_empty() {
            return report;
        }

        report.mean_confidence =
            entries.iter().map(|e| e.confidence).sum::<f64>() / entries.len() as f64;
        for entry in entries {
            if entry.confidence >= self.config.high_confidence {
                report.high_confidence += 1;
            }
            if entry.confidence < self.config.acceptance_floor {
                report.below_floor += 1;
            }
            *report.per_type.entry(entry.fact_type).or_default() += 1;
        }
        report.oldest_age_days = entries.iter().map(|e| e.age_days).reduce(f64::max);
        report.newest_age_days = entries.iter().map(|e| e.age_days).reduce(f64::min);
        report
    }
}
