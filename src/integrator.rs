//! End-to-end ingestion pipeline.
//!
//! [`KnowledgeIntegrator::add_verified_fact`] takes one claim about a subject
//! together with the `(url, text)` sources that back it, and:
//!
//! 1. rejects the claim outright when there are no sources,
//! 2. verifies every source independently,
//! 3. averages credibility and derives cross-validation as `min(1, n/3)`,
//! 4. with more than one source, runs conflict detection over what each
//!    source claims (its own [`SourceDocument::claim`], else the claim
//!    content) and, on a conflict, takes the resolved content and confidence
//!    as the claim's content and credibility,
//! 5. scores the claim at age zero,
//! 6. rejects it below the acceptance floor, with the scorer's notes,
//! 7. stores it under its subject and mirrors it into the knowledge graph.
//!
//! Stored facts are never deleted. Only their confidence changes, through
//! [`propagate_confidence`](KnowledgeIntegrator::propagate_confidence) and
//! [`update_fact_accuracy`](KnowledgeIntegrator::update_fact_accuracy).

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::confidence::{ConfidenceReport, ConfidenceScore, ConfidenceScorer, ReportEntry, ScoreInput};
use crate::config::Config;
use crate::conflict::{CandidateFact, ConflictResolver, ResolvedFact};
use crate::error::GraphResult;
use crate::facts::{FactType, SECS_PER_HOUR, days_between, now_secs};
use crate::graph::{KnowledgeEdge, KnowledgeGraph, KnowledgeNode};
use crate::source::{SourceVerification, SourceVerifier};

/// Relation from a subject node to each of its fact nodes.
pub const HAS_FACT: &str = "has_fact";

/// Graph node type of subject nodes.
pub const SUBJECT_NODE_TYPE: &str = "subject";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One source backing a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub url: String,
    #[serde(default)]
    pub text: String,
    /// Publish date, when the caller knows it.
    #[serde(default)]
    pub published: Option<NaiveDate>,
    /// The value this source states, when it differs from the claim content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<String>,
}

impl SourceDocument {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
            published: None,
            claim: None,
        }
    }

    pub fn with_published(mut self, date: NaiveDate) -> Self {
        self.published = Some(date);
        self
    }

    pub fn with_claim(mut self, claim: impl Into<String>) -> Self {
        self.claim = Some(claim.into());
        self
    }
}

/// A claim as supplied by an upstream collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    pub subject: String,
    pub content: String,
    pub fact_type: FactType,
    pub sources: Vec<SourceDocument>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// An accepted claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifiedFact {
    /// `fact:<subject>:<n>`, also the graph node id.
    pub id: String,
    pub subject: String,
    pub content: String,
    pub fact_type: FactType,
    /// The most credible backing source.
    pub source_url: String,
    pub source_verification: SourceVerification,
    pub confidence: ConfidenceScore,
    /// Credibility fed to the scorer (resolution confidence on conflict).
    pub credibility: f64,
    /// Mean bias score of the backing sources.
    pub bias: f64,
    pub source_count: usize,
    /// Set when the sources disagreed.
    pub resolution: Option<ResolvedFact>,
    pub learned_at: u64,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl VerifiedFact {
    /// Current total confidence.
    pub fn confidence(&self) -> f64 {
        self.confidence.total
    }
}

/// Result of [`KnowledgeIntegrator::add_verified_fact`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Accepted(Box<VerifiedFact>),
    Rejected {
        reason: String,
        confidence: Option<f64>,
        notes: Vec<String>,
    },
}

impl IngestOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    pub fn fact(&self) -> Option<&VerifiedFact> {
        match self {
            Self::Accepted(fact) => Some(fact),
            Self::Rejected { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Integrator
// ---------------------------------------------------------------------------

/// Owns the pipeline components and the per-subject fact collections.
pub struct KnowledgeIntegrator {
    config: Config,
    verifier: SourceVerifier,
    resolver: ConflictResolver,
    scorer: ConfidenceScorer,
    graph: KnowledgeGraph,
    /// Subject → facts in learning order.
    facts: RwLock<BTreeMap<String, Vec<VerifiedFact>>>,
}

impl Default for KnowledgeIntegrator {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl KnowledgeIntegrator {
    pub fn new(config: Config) -> Self {
        Self {
            verifier: SourceVerifier::new(config.verifier.clone()),
            resolver: ConflictResolver::new(config.conflict.clone()),
            scorer: ConfidenceScorer::new(config.confidence.clone()),
            graph: KnowledgeGraph::new(),
            facts: RwLock::new(BTreeMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn verifier(&self) -> &SourceVerifier {
        &self.verifier
    }

    pub fn resolver(&self) -> &ConflictResolver {
        &self.resolver
    }

    pub fn scorer(&self) -> &ConfidenceScorer {
        &self.scorer
    }

    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// Ingest a [`Claim`].
    pub fn ingest(&self, claim: &Claim) -> IngestOutcome {
        self.add_verified_fact(
            &claim.subject,
            &claim.content,
            claim.fact_type,
            &claim.sources,
            Some(claim.metadata.clone()),
        )
    }

    /// Verify, reconcile, score and store one claim.
    pub fn add_verified_fact(
        &self,
        subject: &str,
        content: &str,
        fact_type: FactType,
        sources: &[SourceDocument],
        metadata: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> IngestOutcome {
        if sources.is_empty() {
            tracing::info!(subject, "rejected claim without sources");
            return IngestOutcome::Rejected {
                reason: "no sources supplied".into(),
                confidence: None,
                notes: Vec::new(),
            };
        }

        let verifications: Vec<SourceVerification> = sources
            .iter()
            .map(|s| self.verifier.verify(&s.url, Some(&s.text), s.published))
            .collect();

        let n = verifications.len() as f64;
        let mut credibility = verifications.iter().map(|v| v.credibility).sum::<f64>() / n;
        let bias = verifications.iter().map(|v| v.bias_score).sum::<f64>() / n;
        let cross_validation = (n / 3.0).min(1.0);

        let mut content = content.to_owned();
        let mut resolution = None;
        if verifications.len() > 1 {
            let candidates: Vec<CandidateFact> = sources
                .iter()
                .zip(&verifications)
                .map(|(s, v)| {
                    let stated = s.claim.as_deref().unwrap_or(content.as_str());
                    CandidateFact::new(stated, s.url.clone()).with_verification(v.clone())
                })
                .collect();
            if let Some(resolved) =
                self.resolver
                    .detect_and_resolve(&candidates, subject, self.config.conflict.strategy)
            {
                content = resolved.content.clone();
                credibility = resolved.confidence;
                resolution = Some(resolved);
            }
        }

        let mut facts = self.facts.write().expect("facts lock poisoned");
        let collection = facts.entry(subject.to_owned()).or_default();
        let id = format!("fact:{subject}:{}", collection.len());

        let score = self.scorer.score(&ScoreInput {
            fact_id: id.clone(),
            fact_type,
            source_credibility: credibility,
            cross_validation,
            age_days: 0.0,
            context_relevance: None,
            bias,
        });

        if score.total < self.config.confidence.acceptance_floor {
            tracing::info!(
                subject,
                confidence = score.total,
                floor = self.config.confidence.acceptance_floor,
                "rejected claim below acceptance floor"
            );
            if collection.is_empty() {
                facts.remove(subject);
            }
            return IngestOutcome::Rejected {
                reason: "confidence below acceptance floor".into(),
                confidence: Some(score.total),
                notes: score.notes,
            };
        }

        let primary = verifications
            .iter()
            .enumerate()
            .fold(0, |best, (i, v)| {
                if v.credibility > verifications[best].credibility {
                    i
                } else {
                    best
                }
            });

        let fact = VerifiedFact {
            id,
            subject: subject.to_owned(),
            content,
            fact_type,
            source_url: sources[primary].url.clone(),
            source_verification: verifications[primary].clone(),
            confidence: score,
            credibility,
            bias,
            source_count: sources.len(),
            resolution,
            learned_at: now_secs(),
            metadata: metadata.unwrap_or_default(),
        };
        collection.push(fact.clone());
        drop(facts);

        tracing::info!(
            subject,
            id = %fact.id,
            fact_type = %fact.fact_type,
            confidence = fact.confidence(),
            sources = fact.source_count,
            "accepted fact"
        );

        if self.config.integrator.mirror_to_graph {
            if let Err(e) = self.mirror(&fact) {
                tracing::warn!(id = %fact.id, error = %e, "failed to mirror fact into graph");
            }
        }

        IngestOutcome::Accepted(Box::new(fact))
    }

    fn mirror(&self, fact: &VerifiedFact) -> GraphResult<()> {
        if !self.graph.has_node(&fact.subject) {
            self.graph.add_node(KnowledgeNode::new(
                fact.subject.clone(),
                fact.subject.clone(),
                SUBJECT_NODE_TYPE,
            ));
        }
        self.graph.add_node(
            KnowledgeNode::new(fact.id.clone(), fact.content.clone(), fact.fact_type.as_str())
                .with_confidence(fact.confidence())
                .with_property("subject", fact.subject.clone())
                .with_property("source_url", fact.source_url.clone())
                .with_property("domain", fact.source_verification.domain.clone()),
        );
        self.graph.add_edge(
            KnowledgeEdge::new(fact.subject.clone(), fact.id.clone(), HAS_FACT)
                .with_weight(fact.confidence()),
        )
    }

    fn sync_graph_confidence(&self, id: &str, confidence: f64) {
        if let Some(node) = self.graph.node(id) {
            self.graph.add_node(node.with_confidence(confidence));
        }
    }

    /// Index pairs `(i, j)`, `i < j`, of facts learned within the relation window.
    pub fn infer_relationships(&self, subject: &str) -> Vec<(usize, usize)> {
        let facts = self.facts.read().expect("facts lock poisoned");
        match facts.get(subject) {
            Some(collection) => self.related_pairs(collection),
            None => Vec::new(),
        }
    }

    fn related_pairs(&self, facts: &[VerifiedFact]) -> Vec<(usize, usize)> {
        let window = self.config.integrator.relation_window_hours * SECS_PER_HOUR;
        let mut pairs = Vec::new();
        for i in 0..facts.len() {
            for j in (i + 1)..facts.len() {
                if facts[i].learned_at.abs_diff(facts[j].learned_at) <= window {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    /// Boost weak facts that are time-related to strong ones. Single pass.
    ///
    /// Confidences are read as they stood before the pass, so a fact boosted
    /// here never lends support in the same call. Returns the number of facts
    /// whose confidence changed.
    pub fn propagate_confidence(&self, subject: &str) -> usize {
        let cfg = &self.config.integrator;
        let mut facts = self.facts.write().expect("facts lock poisoned");
        let Some(collection) = facts.get_mut(subject) else {
            return 0;
        };

        let before: Vec<f64> = collection.iter().map(|f| f.confidence()).collect();
        let mut supported = vec![false; collection.len()];
        for (i, j) in self.related_pairs(collection) {
            if before[j] >= cfg.propagation_source_min {
                supported[i] = true;
            }
            if before[i] >= cfg.propagation_source_min {
                supported[j] = true;
            }
        }

        let mut updated = Vec::new();
        for (i, fact) in collection.iter_mut().enumerate() {
            if !supported[i] || before[i] >= cfg.propagation_target_max {
                continue;
            }
            let boosted = (before[i] * cfg.propagation_boost).min(cfg.propagation_cap);
            if boosted > before[i] {
                fact.confidence.total = boosted;
                fact.confidence
                    .notes
                    .push(format!("boosted by related high-confidence fact ({:.2} → {boosted:.2})", before[i]));
                updated.push((fact.id.clone(), boosted));
            }
        }
        drop(facts);

        for (id, confidence) in &updated {
            self.sync_graph_confidence(id, *confidence);
        }
        tracing::debug!(subject, boosted = updated.len(), "propagated confidence");
        updated.len()
    }

    /// Case-insensitive substring search over stored content.
    ///
    /// Results are sorted by confidence descending; ties keep subject order,
    /// then learning order.
    pub fn query(
        &self,
        text: &str,
        subject: Option<&str>,
        min_confidence: f64,
        limit: usize,
    ) -> Vec<VerifiedFact> {
        let needle = text.to_lowercase();
        let facts = self.facts.read().expect("facts lock poisoned");
        let mut hits: Vec<VerifiedFact> = facts
            .iter()
            .filter(|(s, _)| subject.is_none_or(|wanted| wanted == s.as_str()))
            .flat_map(|(_, collection)| collection.iter())
            .filter(|f| f.confidence() >= min_confidence)
            .filter(|f| f.content.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.confidence().total_cmp(&a.confidence()));
        hits.truncate(limit);
        hits
    }

    /// Record whether the fact with exactly `content` proved accurate, then
    /// rescore it at its current age.
    ///
    /// Returns `false` when no such fact exists.
    pub fn update_fact_accuracy(&self, subject: &str, content: &str, was_accurate: bool) -> bool {
        let mut facts = self.facts.write().expect("facts lock poisoned");
        let Some(fact) = facts
            .get_mut(subject)
            .and_then(|c| c.iter_mut().find(|f| f.content == content))
        else {
            return false;
        };

        self.scorer.record_outcome(fact.fact_type, was_accurate);
        let previous = fact.confidence();
        fact.confidence = self.scorer.score(&ScoreInput {
            fact_id: fact.id.clone(),
            fact_type: fact.fact_type,
            source_credibility: fact.credibility,
            cross_validation: self.config.integrator.assumed_cross_validation,
            age_days: days_between(fact.learned_at, now_secs()),
            context_relevance: None,
            bias: fact.bias,
        });
        let (id, confidence) = (fact.id.clone(), fact.confidence());
        drop(facts);

        tracing::info!(subject, id = %id, was_accurate, previous, confidence, "updated fact accuracy");
        self.sync_graph_confidence(&id, confidence);
        true
    }

    /// Facts stored for `subject`, in learning order.
    pub fn facts(&self, subject: &str) -> Vec<VerifiedFact> {
        self.facts
            .read()
            .expect("facts lock poisoned")
            .get(subject)
            .cloned()
            .unwrap_or_default()
    }

    /// Subjects with at least one stored fact, sorted.
    pub fn subjects(&self) -> Vec<String> {
        self.facts
            .read()
            .expect("facts lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Confidence report over one subject's facts.
    pub fn subject_summary(&self, subject: &str) -> Option<ConfidenceReport> {
        let now = now_secs();
        let facts = self.facts.read().expect("facts lock poisoned");
        let collection = facts.get(subject)?;
        let entries: Vec<ReportEntry> = collection
            .iter()
            .map(|f| ReportEntry {
                confidence: f.confidence(),
                fact_type: f.fact_type,
                age_days: days_between(f.learned_at, now),
            })
            .collect();
        Some(self.scorer.report(&entries))
    }

    #[cfg(test)]
    fn backdate(&self, subject: &str, index: usize, secs: u64) {
        let mut facts = self.facts.write().expect("facts lock poisoned");
        if let Some(fact) = facts.get_mut(subject).and_then(|c| c.get_mut(index)) {
            fact.learned_at = fact.learned_at.saturating_sub(secs);
        }
    }

    #[cfg(test)]
    fn set_confidence(&self, subject: &str, index: usize, total: f64) {
        let mut facts = self.facts.write().expect("facts lock poisoned");
        if let Some(fact) = facts.get_mut(subject).and_then(|c| c.get_mut(index)) {
            fact.confidence.total = total;
        }
    }
}
