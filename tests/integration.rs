//! End-to-end integration tests for the credence pipeline.
//!
//! These tests exercise the full path from source verification through
//! conflict resolution, scoring, storage and graph export, plus the trigger
//! scheduler driving ingestion.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};

use credence::confidence::{FACTOR_WEIGHTS, MIN_DECAY, decay_multiplier};
use credence::config::Config;
use credence::conflict::{CandidateFact, ConflictResolver, ResolutionStrategy};
use credence::error::TriggerResult;
use credence::facts::FactType;
use credence::graph::{KnowledgeEdge, KnowledgeGraph, KnowledgeNode};
use credence::integrator::{Claim, IngestOutcome, KnowledgeIntegrator, SourceDocument};
use credence::source::SourceVerifier;
use credence::trigger::detectors::{self, DEFAULT_KEYWORDS};
use credence::trigger::{ContextFlag, Trigger, TriggerContext, TriggerManager, TriggerPriority};

const NEUTRAL: &str = "The company reported quarterly revenue of 90 billion dollars.";
const HYPE: &str = "Shocking! This stock is guaranteed to skyrocket, a must buy, you can't lose.";

fn reputable_sources() -> Vec<SourceDocument> {
    vec![
        SourceDocument::new("https://www.reuters.com/markets/apple", NEUTRAL),
        SourceDocument::new("https://www.cnbc.com/apple-earnings", NEUTRAL),
    ]
}

#[test]
fn corroborated_claim_is_stored_and_mirrored() {
    let integrator = KnowledgeIntegrator::default();
    let outcome = integrator.add_verified_fact(
        "AAPL",
        "Apple beat earnings",
        FactType::Factual,
        &reputable_sources(),
        None,
    );

    let fact = outcome.fact().expect("two reputable sources should be accepted");
    assert!(fact.confidence() >= 0.4);
    assert_eq!(integrator.facts("AAPL").len(), 1);
    assert!(integrator.graph().has_node(&fact.id));
    assert_eq!(integrator.query("earnings", None, 0.0, 10).len(), 1);
}

#[test]
fn unknown_hype_source_is_rejected_with_notes() {
    let integrator = KnowledgeIntegrator::default();
    let outcome = integrator.add_verified_fact(
        "PUMP",
        "PUMP will triple",
        FactType::Prediction,
        &[SourceDocument::new("https://random-stock-tips.xyz/pump", HYPE)],
        None,
    );

    let IngestOutcome::Rejected { confidence, notes, .. } = outcome else {
        panic!("expected rejection");
    };
    assert!(confidence.unwrap() < 0.4);
    assert!(!notes.is_empty());
    assert!(integrator.facts("PUMP").is_empty());
    assert_eq!(integrator.graph().node_count(), 0);
}

#[test]
fn verification_is_memoized() {
    let verifier = SourceVerifier::default();
    let first = verifier.verify("https://www.bloomberg.com/x", Some(NEUTRAL), None);
    let second = verifier.verify("https://www.bloomberg.com/x", Some(NEUTRAL), None);
    assert_eq!(first, second);
    assert_eq!(verifier.cache_len(), 1);
}

#[test]
fn weights_and_decay_properties() {
    let sum: f64 = FACTOR_WEIGHTS.iter().map(|(_, w)| w).sum();
    assert!((sum - 1.0).abs() < 1e-12);

    for fact_type in FactType::ALL {
        let d7 = decay_multiplier(fact_type, 7.0);
        let d30 = decay_multiplier(fact_type, 30.0);
        let d90 = decay_multiplier(fact_type, 90.0);
        assert!(d7 > d30 && d30 > d90);
        assert!(decay_multiplier(fact_type, 5_000.0) >= MIN_DECAY);
    }
}

#[test]
fn consensus_over_verified_candidates() {
    let verifier = SourceVerifier::default();
    let resolver = ConflictResolver::default();
    let facts: Vec<CandidateFact> = [
        ("BUY", "https://reddit.com/r/stocks"),
        ("BUY", "https://stocktwits.com/aapl"),
        ("HOLD", "https://reuters.com/aapl"),
    ]
    .into_iter()
    .map(|(content, url)| {
        CandidateFact::new(content, url).with_verification(verifier.verify(url, None, None))
    })
    .collect();

    let resolved = resolver
        .detect_and_resolve(&facts, "AAPL rating", ResolutionStrategy::Consensus)
        .expect("ratings disagree");
    assert_eq!(resolved.content, "BUY");
    assert_eq!(resolved.supporting_sources.len(), 2);
    assert_eq!(resolver.history().len(), 1);
}

#[test]
fn numeric_threshold_boundary() {
    let resolver = ConflictResolver::default();
    let at = [
        CandidateFact::new("100", "https://a.example"),
        CandidateFact::new("105", "https://b.example"),
    ];
    let over = [
        CandidateFact::new("100", "https://a.example"),
        CandidateFact::new("105.1", "https://b.example"),
    ];
    assert!(resolver.detect(&at, "price").is_none());
    assert!(resolver.detect(&over, "price").is_some());
}

#[test]
fn graph_export_import_round_trip() {
    let integrator = KnowledgeIntegrator::default();
    integrator.add_verified_fact("AAPL", "Apple beat earnings", FactType::News, &reputable_sources(), None);
    integrator.add_verified_fact("AAPL", "Apple raised guidance", FactType::News, &reputable_sources(), None);
    let graph = integrator.graph();
    graph.add_node(KnowledgeNode::new("MSFT", "Microsoft", "subject"));
    graph
        .add_edge(KnowledgeEdge::new("AAPL", "MSFT", "competes_with").with_weight(0.5))
        .unwrap();

    let json = graph.to_json().unwrap();
    let restored = KnowledgeGraph::from_json(&json).unwrap();

    let (before, after) = (graph.export(), restored.export());
    let node_keys = |s: &credence::graph::GraphSnapshot| -> BTreeSet<(String, String, String)> {
        s.nodes
            .iter()
            .map(|n| (n.id.clone(), n.label.clone(), n.node_type.clone()))
            .collect()
    };
    let edge_keys = |s: &credence::graph::GraphSnapshot| -> BTreeSet<(String, String, String)> {
        s.edges
            .iter()
            .map(|e| (e.source.clone(), e.target.clone(), e.relation.clone()))
            .collect()
    };
    assert_eq!(node_keys(&before), node_keys(&after));
    assert_eq!(edge_keys(&before), edge_keys(&after));

    let reachable = restored.related("MSFT", None, 2);
    assert_eq!(reachable.len(), 3);
}

#[test]
fn claims_from_json_with_disagreeing_sources() {
    let claims: Vec<Claim> = serde_json::from_str(
        r#"[{
            "subject": "AAPL",
            "content": "Apple Q3 revenue",
            "fact_type": "factual",
            "sources": [
                {"url": "https://www.reuters.com/a", "text": "Revenue was reported.", "claim": "$90,000"},
                {"url": "https://www.cnbc.com/b", "text": "Revenue was reported.", "claim": "90000"},
                {"url": "https://stocktwits.com/c", "text": "Revenue was reported.", "claim": "120000"}
            ]
        }]"#,
    )
    .unwrap();

    let integrator = KnowledgeIntegrator::default();
    let outcome = integrator.ingest(&claims[0]);
    let fact = outcome.fact().expect("two reputable sources agree");
    let resolution = fact.resolution.as_ref().expect("stocktwits disagrees");
    assert_eq!(fact.content, "$90,000");
    assert_eq!(resolution.supporting_sources.len(), 2);
    assert_eq!(resolution.conflicting_sources, vec!["https://stocktwits.com/c".to_owned()]);
    assert_eq!(integrator.resolver().stats().total, 1);
}

#[test]
fn config_strategy_flows_into_pipeline() {
    let config = Config::from_toml_str(
        r#"
        [confidence]
        acceptance_floor = 0.9

        [integrator]
        mirror_to_graph = false
        "#,
    )
    .unwrap();
    let integrator = KnowledgeIntegrator::new(config);
    let outcome = integrator.add_verified_fact(
        "AAPL",
        "Apple beat earnings",
        FactType::Factual,
        &reputable_sources(),
        None,
    );
    // ~0.84 clears the stock floor but not a 0.9 floor.
    assert!(!outcome.is_accepted());
    assert_eq!(integrator.graph().node_count(), 0);
}

#[tokio::test]
async fn detector_driven_trigger_runs_ingestion() {
    let integrator = Arc::new(KnowledgeIntegrator::default());
    let claim = Claim {
        subject: "AAPL".into(),
        content: "Apple beat earnings".into(),
        fact_type: FactType::News,
        sources: reputable_sources(),
        metadata: Default::default(),
    };

    let mut triggers = TriggerManager::default();
    let handle = Arc::clone(&integrator);
    triggers
        .register(
            Trigger::new(
                "news-ingest",
                TriggerPriority::High,
                ContextFlag("news_alert".into()),
                move |_ctx: TriggerContext, _params: Value| {
                    let integrator = Arc::clone(&handle);
                    let claim = claim.clone();
                    async move {
                        let accepted = integrator.ingest(&claim).is_accepted();
                        TriggerResult::Ok(json!({ "accepted": accepted }))
                    }
                },
            )
            .with_cooldown(3600),
        )
        .unwrap();

    let mut quiet = TriggerContext::new();
    detectors::merge(&mut quiet, detectors::news_keywords(&["calm markets"], DEFAULT_KEYWORDS));
    assert!(triggers.run_cycle(&quiet, 2).await.is_empty());

    let mut alert = TriggerContext::new();
    detectors::merge(
        &mut alert,
        detectors::news_keywords(&["Apple earnings beat expectations"], DEFAULT_KEYWORDS),
    );
    let executions = triggers.run_cycle(&alert, 2).await;
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].result, Some(json!({ "accepted": true })));
    assert_eq!(integrator.facts("AAPL").len(), 1);

    // Cooldown holds the trigger back even though the alert persists.
    assert!(triggers.run_cycle(&alert, 2).await.is_empty());
}
