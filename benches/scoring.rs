//! Benchmarks for scoring and resolution.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use credence::confidence::{ConfidenceScorer, ScoreInput};
use credence::conflict::{CandidateFact, ConflictResolver, ResolutionStrategy};
use credence::facts::FactType;
use credence::source::SourceVerifier;

const ARTICLE: &str = "Shares reportedly rose after the company posted massive quarterly \
    growth. Some analysts say the results could signal an unprecedented year.";

fn bench_score(c: &mut Criterion) {
    let scorer = ConfidenceScorer::default();
    let input = ScoreInput::new("bench", FactType::News)
        .credibility(0.8)
        .cross_validation(0.67)
        .age_days(12.0);

    c.bench_function("confidence_score", |bench| {
        bench.iter(|| black_box(scorer.score(black_box(&input))))
    });
}

fn bench_verify_uncached(c: &mut Criterion) {
    let verifier = SourceVerifier::default();

    c.bench_function("verify_source_uncached", |bench| {
        bench.iter(|| {
            verifier.clear_cache();
            black_box(verifier.verify("https://www.cnbc.com/markets", Some(ARTICLE), None))
        })
    });
}

fn bench_resolve_combined(c: &mut Criterion) {
    let verifier = SourceVerifier::default();
    let resolver = ConflictResolver::default();
    let facts: Vec<CandidateFact> = [
        ("101.5", "https://reuters.com/a"),
        ("100.0", "https://cnbc.com/b"),
        ("120.0", "https://reddit.com/r/c"),
        ("101.0", "https://seekingalpha.com/d"),
    ]
    .into_iter()
    .map(|(value, url)| CandidateFact::new(value, url).with_verification(verifier.verify(url, None, None)))
    .collect();
    let conflict = resolver.detect(&facts, "price").expect("values disagree");

    c.bench_function("resolve_combined_4", |bench| {
        bench.iter(|| {
            resolver.clear_history();
            black_box(resolver.resolve(&conflict, ResolutionStrategy::Combined))
        })
    });
}

criterion_group!(benches, bench_score, bench_verify_uncached, bench_resolve_combined);
criterion_main!(benches);
