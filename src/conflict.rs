//! Conflict detection and resolution among candidate facts for one topic.
//!
//! Detection classifies the candidate values (numeric, boolean, categorical,
//! free text) and applies a type-specific disagreement test. A detection call
//! reports **at most one** [`Conflict`] covering all candidates, even when
//! more than two distinct values are present.
//!
//! Resolution picks a single value using one of several strategies:
//!
//! | Strategy | Winner | Confidence |
//! |---|---|---|
//! | `SourceWeight` | most credible source | `cred × (0.5 + 0.5 × support)` |
//! | `Recency` | latest timestamp | source-weight confidence × age factor |
//! | `Consensus` | largest agreeing group | `mean group cred × group share` |
//! | `ExpertPriority` | same as `SourceWeight` | same as `SourceWeight` |
//! | `Combined` | `SourceWeight` ∧ `Consensus` | boosted on agreement, damped otherwise |
//!
//! Every resolution is appended to the resolver's history.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::config::ConflictConfig;
use crate::facts::{SECS_PER_HOUR, now_secs};
use crate::source::SourceVerification;

/// Credibility assumed for a candidate that carries no verification.
const UNVERIFIED_CREDIBILITY: f64 = 0.5;

/// Values that classify a candidate set as boolean.
const BOOLEAN_TOKENS: &[&str] = &["true", "false", "yes", "no", "1", "0"];
const TRUTHY_TOKENS: &[&str] = &["true", "yes", "1"];

/// At most this many distinct values still count as categorical.
const MAX_CATEGORICAL_VALUES: usize = 5;

/// Hours over which recency confidence decays to its floor.
const RECENCY_HORIZON_HOURS: f64 = 168.0;
const RECENCY_FLOOR: f64 = 0.5;

const COMBINED_AGREEMENT_BOOST: f64 = 1.2;
const COMBINED_CONFIDENCE_CAP: f64 = 0.95;
const COMBINED_DISAGREEMENT_PENALTY: f64 = 0.8;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// How the candidate values were classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    Numeric,
    Boolean,
    Categorical,
    Text,
}

/// Algorithm used to pick one value out of a conflict.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    SourceWeight,
    Recency,
    Consensus,
    /// Domain-specific weighting is not implemented yet; behaves like `SourceWeight`.
    ExpertPriority,
    #[default]
    Combined,
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SourceWeight => write!(f, "source_weight"),
            Self::Recency => write!(f, "recency"),
            Self::Consensus => write!(f, "consensus"),
            Self::ExpertPriority => write!(f, "expert_priority"),
            Self::Combined => write!(f, "combined"),
        }
    }
}

/// One source's version of a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateFact {
    pub content: String,
    pub source_url: String,
    pub source_verification: Option<SourceVerification>,
    /// Seconds since the UNIX epoch.
    pub timestamp: Option<u64>,
}

impl CandidateFact {
    pub fn new(content: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source_url: source_url.into(),
            source_verification: None,
            timestamp: None,
        }
    }

    pub fn with_verification(mut self, verification: SourceVerification) -> Self {
        self.source_verification = Some(verification);
        self
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Credibility of the backing source, or 0.5 when unverified.
    pub fn credibility(&self) -> f64 {
        self.source_verification
            .as_ref()
            .map(|v| v.credibility)
            .unwrap_or(UNVERIFIED_CREDIBILITY)
    }
}

/// A detected disagreement among candidates about one topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub topic: String,
    pub conflict_type: ConflictType,
    pub facts: Vec<CandidateFact>,
    pub detected_at: u64,
}

/// The outcome of resolving a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFact {
    pub content: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub strategy: ResolutionStrategy,
    pub supporting_sources: Vec<String>,
    pub conflicting_sources: Vec<String>,
    pub reasoning: String,
    pub resolved_at: u64,
}

/// Summary of the resolution history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionStats {
    pub total: usize,
    pub per_strategy: BTreeMap<ResolutionStrategy, usize>,
    pub mean_confidence: f64,
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// Trimmed, lowercased form used for equality between candidate values.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Parse a numeric claim value, tolerating `$`, `%` and thousands separators.
pub fn parse_numeric(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    cleaned.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Classify a set of values. Tried in order: numeric, boolean, categorical, text.
pub fn classify(values: &[&str]) -> ConflictType {
    if values.iter().all(|v| parse_numeric(v).is_some()) {
        return ConflictType::Numeric;
    }
    if values
        .iter()
        .all(|v| BOOLEAN_TOKENS.contains(&normalize(v).as_str()))
    {
        return ConflictType::Boolean;
    }
    if distinct_normalized(values).len() <= MAX_CATEGORICAL_VALUES {
        ConflictType::Categorical
    } else {
        ConflictType::Text
    }
}

fn distinct_normalized(values: &[&str]) -> Vec<String> {
    let mut distinct: Vec<String> = Vec::new();
    for value in values {
        let key = normalize(value);
        if !distinct.contains(&key) {
            distinct.push(key);
        }
    }
    distinct
}

fn has_disagreement(conflict_type: ConflictType, values: &[&str], threshold: f64) -> bool {
    match conflict_type {
        ConflictType::Numeric => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| parse_numeric(v)).collect();
            let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
            let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if min == 0.0 {
                max > threshold
            } else {
                (max - min) / min.abs() > threshold
            }
        }
        ConflictType::Boolean => {
            let truthy = values
                .iter()
                .any(|v| TRUTHY_TOKENS.contains(&normalize(v).as_str()));
            let falsy = values
                .iter()
                .any(|v| !TRUTHY_TOKENS.contains(&normalize(v).as_str()));
            truthy && falsy
        }
        ConflictType::Categorical | ConflictType::Text => distinct_normalized(values).len() > 1,
    }
}

/// Whether `value` agrees with `reference`: numeric values within `tolerance`
/// relative difference, otherwise equal after normalization.
fn agrees(value: &str, reference: &str, tolerance: f64) -> bool {
    match (parse_numeric(value), parse_numeric(reference)) {
        (Some(v), Some(r)) => {
            if r == 0.0 {
                v == 0.0
            } else {
                (v - r).abs() / r.abs() <= tolerance
            }
        }
        _ => normalize(value) == normalize(reference),
    }
}

/// Intermediate result shared by the strategies.
struct Pick {
    winner: usize,
    confidence: f64,
    supporting: Vec<usize>,
    reasoning: String,
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Detects and resolves conflicts, keeping a history of resolutions.
pub struct ConflictResolver {
    config: ConflictConfig,
    history: Mutex<VecDeque<ResolvedFact>>,
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(ConflictConfig::default())
    }
}

impl ConflictResolver {
    pub fn new(config: ConflictConfig) -> Self {
        Self {
            config,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Detect a conflict using the configured numeric threshold.
    pub fn detect(&self, facts: &[CandidateFact], topic: &str) -> Option<Conflict> {
        self.detect_with_threshold(facts, topic, self.config.numeric_threshold)
    }

    /// Detect a conflict among `facts`. Returns at most one conflict.
    pub fn detect_with_threshold(
        &self,
        facts: &[CandidateFact],
        topic: &str,
        threshold: f64,
    ) -> Option<Conflict> {
        if facts.len() < 2 {
            return None;
        }
        let values: Vec<&str> = facts.iter().map(|f| f.content.as_str()).collect();
        let conflict_type = classify(&values);
        if !has_disagreement(conflict_type, &values, threshold) {
            return None;
        }

        tracing::debug!(topic, ?conflict_type, candidates = facts.len(), "conflict detected");
        Some(Conflict {
            topic: topic.to_owned(),
            conflict_type,
            facts: facts.to_vec(),
            detected_at: now_secs(),
        })
    }

    /// Resolve a conflict with `strategy` and record the outcome.
    pub fn resolve(&self, conflict: &Conflict, strategy: ResolutionStrategy) -> ResolvedFact {
        self.resolve_at(conflict, strategy, now_secs())
    }

    /// Resolve as of `now` (seconds since the UNIX epoch).
    pub fn resolve_at(
        &self,
        conflict: &Conflict,
        strategy: ResolutionStrategy,
        now: u64,
    ) -> ResolvedFact {
        let facts = &conflict.facts;
        let (pick, applied) = match strategy {
            ResolutionStrategy::SourceWeight => (self.by_source_weight(facts), strategy),
            ResolutionStrategy::ExpertPriority => {
                let mut pick = self.by_source_weight(facts);
                pick.reasoning = format!("expert priority (source weight): {}", pick.reasoning);
                (pick, strategy)
            }
            ResolutionStrategy::Recency => match self.by_recency(facts, now) {
                Some(pick) => (pick, strategy),
                None => {
                    let mut pick = self.by_source_weight(facts);
                    pick.reasoning = format!("no timestamps, fell back to {}", pick.reasoning);
                    (pick, ResolutionStrategy::SourceWeight)
                }
            },
            ResolutionStrategy::Consensus => (self.by_consensus(facts), strategy),
            ResolutionStrategy::Combined => (self.combined(facts), strategy),
        };

        let resolved = build_resolution(facts, pick, applied, now);
        tracing::info!(
            topic = %conflict.topic,
            strategy = %resolved.strategy,
            confidence = resolved.confidence,
            supporting = resolved.supporting_sources.len(),
            conflicting = resolved.conflicting_sources.len(),
            "conflict resolved"
        );
        self.record(resolved.clone());
        resolved
    }

    /// Detect and, if a conflict exists, resolve it.
    pub fn detect_and_resolve(
        &self,
        facts: &[CandidateFact],
        topic: &str,
        strategy: ResolutionStrategy,
    ) -> Option<ResolvedFact> {
        self.detect(facts, topic)
            .map(|conflict| self.resolve(&conflict, strategy))
    }

    fn by_source_weight(&self, facts: &[CandidateFact]) -> Pick {
        let mut winner = 0;
        for (i, fact) in facts.iter().enumerate() {
            if fact.credibility() > facts[winner].credibility() {
                winner = i;
            }
        }
        let supporting = self.supporters_of(facts, winner);
        let support_ratio = supporting.len() as f64 / facts.len() as f64;
        let credibility = facts[winner].credibility();
        Pick {
            winner,
            confidence: credibility * (0.5 + 0.5 * support_ratio),
            reasoning: format!(
                "source weight: {} has the highest credibility ({credibility:.2}), \
                 {}/{} sources agree",
                facts[winner].source_url,
                supporting.len(),
                facts.len()
            ),
            supporting,
        }
    }

    fn by_recency(&self, facts: &[CandidateFact], now: u64) -> Option<Pick> {
        let mut winner: Option<(usize, u64)> = None;
        for (i, fact) in facts.iter().enumerate() {
            if let Some(ts) = fact.timestamp {
                if winner.is_none_or(|(_, best)| ts > best) {
                    winner = Some((i, ts));
                }
            }
        }
        let (winner, timestamp) = winner?;

        let supporting = self.supporters_of(facts, winner);
        let support_ratio = supporting.len() as f64 / facts.len() as f64;
        let age_hours = now.saturating_sub(timestamp) as f64 / SECS_PER_HOUR as f64;
        let freshness = (1.0 - age_hours / RECENCY_HORIZON_HOURS).max(RECENCY_FLOOR);
        let credibility = facts[winner].credibility();
        Some(Pick {
            winner,
            confidence: credibility * (0.5 + 0.5 * support_ratio) * freshness,
            reasoning: format!(
                "recency: {} is the most recent ({age_hours:.1}h old, freshness {freshness:.2})",
                facts[winner].source_url
            ),
            supporting,
        })
    }

    fn by_consensus(&self, facts: &[CandidateFact]) -> Pick {
        // Groups in first-encountered order so ties go to the earliest group.
        let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
        for (i, fact) in facts.iter().enumerate() {
            let key = normalize(&fact.content);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(i),
                None => groups.push((key, vec![i])),
            }
        }

        let mut best = 0;
        for (i, (_, members)) in groups.iter().enumerate() {
            if members.len() > groups[best].1.len() {
                best = i;
            }
        }
        let supporting = groups[best].1.clone();
        let mean_credibility = supporting
            .iter()
            .map(|&i| facts[i].credibility())
            .sum::<f64>()
            / supporting.len() as f64;
        let share = supporting.len() as f64 / facts.len() as f64;

        Pick {
            winner: supporting[0],
            confidence: mean_credibility * share,
            reasoning: format!(
                "consensus: {}/{} sources agree on \"{}\" ({} distinct values)",
                supporting.len(),
                facts.len(),
                facts[supporting[0]].content,
                groups.len()
            ),
            supporting,
        }
    }

    fn combined(&self, facts: &[CandidateFact]) -> Pick {
        let weighted = self.by_source_weight(facts);
        let consensus = self.by_consensus(facts);

        let same_content = normalize(&facts[weighted.winner].content)
            == normalize(&facts[consensus.winner].content);
        if same_content {
            let mut supporting = weighted.supporting.clone();
            for i in consensus.supporting {
                if !supporting.contains(&i) {
                    supporting.push(i);
                }
            }
            let mean = (weighted.confidence + consensus.confidence) / 2.0;
            Pick {
                winner: weighted.winner,
                confidence: (mean * COMBINED_AGREEMENT_BOOST).min(COMBINED_CONFIDENCE_CAP),
                reasoning: format!(
                    "combined: source weight and consensus agree on \"{}\"",
                    facts[weighted.winner].content
                ),
                supporting,
            }
        } else {
            Pick {
                winner: weighted.winner,
                confidence: weighted.confidence * COMBINED_DISAGREEMENT_PENALTY,
                reasoning: format!(
                    "combined: source weight picked \"{}\" but consensus favored \"{}\"",
                    facts[weighted.winner].content, facts[consensus.winner].content
                ),
                supporting: weighted.supporting,
            }
        }
    }

    fn supporters_of(&self, facts: &[CandidateFact], winner: usize) -> Vec<usize> {
        let reference = &facts[winner].content;
        facts
            .iter()
            .enumerate()
            .filter(|(_, f)| agrees(&f.content, reference, self.config.agreement_tolerance))
            .map(|(i, _)| i)
            .collect()
    }

    fn record(&self, resolved: ResolvedFact) {
        let mut history = self.history.lock().expect("history lock poisoned");
        history.push_back(resolved);
        if let Some(capacity) = self.config.history_capacity {
            while history.len() > capacity {
                history.pop_front();
            }
        }
    }

    /// Snapshot of every recorded resolution, oldest first.
    pub fn history(&self) -> Vec<ResolvedFact> {
        self.history
            .lock()
            .expect("history lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Forget all recorded resolutions.
    pub fn clear_history(&self) {
        self.history.lock().expect("history lock poisoned").clear();
    }

    /// Counts per strategy and mean confidence over the history.
    pub fn stats(&self) -> ResolutionStats {
        let history = self.history.lock().expect("history lock poisoned");
        let mut stats = ResolutionStats {
            total: history.len(),
            ..Default::default()
        };
        for resolved in history.iter() {
            *stats.per_strategy.entry(resolved.strategy).or_default() += 1;
        }
        if !history.is_empty() {
            stats.mean_confidence =
                history.iter().map(|r| r.confidence).sum::<f64>() / history.len() as f64;
        }
        stats
    }
}

fn build_resolution(
    facts: &[CandidateFact],
    pick: Pick,
    strategy: ResolutionStrategy,
    now: u64,
) -> ResolvedFact {
    let supporting_sources = pick
        .supporting
        .iter()
        .map(|&i| facts[i].source_url.clone())
        .collect();
    let conflicting_sources = facts
        .iter()
        .enumerate()
        .filter(|(i, _)| !pick.supporting.contains(i))
        .map(|(_, f)| f.source_url.clone())
        .collect();
    ResolvedFact {
        content: facts[pick.winner].content.clone(),
        confidence: pick.confidence.clamp(0.0, 1.0),
        strategy,
        supporting_sources,
        conflicting_sources,
        reasoning: pick.reasoning,
        resolved_at: now,
    }
}
