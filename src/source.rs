//! Source verification: domain credibility tiers, bias cues and recency.
//!
//! Each `(url, text)` pair is scored independently:
//!
//! - **Credibility**: the domain is matched against a fixed, ordered tier
//!   table. The first matching rule wins, so a domain listed in Tier 1 is
//!   never reconsidered by the `.gov`/`.edu` heuristic.
//! - **Bias**: the text is scanned for high/medium/low bias phrases. The
//!   weighted hit count is normalized per 100 words and mapped to a
//!   [`BiasLevel`] via fixed cut points.
//! - **Recency**: only computed when the caller supplies a publish date
//!   (see [`extract_publish_date`] for pulling one out of the text).
//!
//! Results are memoized per verifier instance, keyed by URL and a hash of the
//! text. Only the date-independent part is cached: recency is recomputed on
//! every call against the current day. The cache never evicts unless a
//! capacity is configured.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::VerifierConfig;

// ---------------------------------------------------------------------------
// Tier tables
// ---------------------------------------------------------------------------

/// Wire services, regulators and papers of record.
const TIER1_DOMAINS: &[&str] = &[
    "reuters.com",
    "bloomberg.com",
    "apnews.com",
    "sec.gov",
    "wsj.com",
    "ft.com",
    "federalreserve.gov",
];

/// Major financial and general press.
const TIER2_DOMAINS: &[&str] = &[
    "cnbc.com",
    "marketwatch.com",
    "barrons.com",
    "economist.com",
    "forbes.com",
    "nytimes.com",
    "bbc.com",
    "finance.yahoo.com",
];

/// Analysis sites; matched as substrings of the domain.
const TIER3_PATTERNS: &[&str] = &[
    "seekingalpha",
    "investopedia",
    "morningstar",
    "fool.com",
    "zacks",
    "benzinga",
    "thestreet",
];

/// Social media, forums and self-publishing platforms.
const TIER4_DOMAINS: &[&str] = &[
    "reddit.com",
    "twitter.com",
    "x.com",
    "stocktwits.com",
    "medium.com",
    "substack.com",
];

const TIER1_CREDIBILITY: f64 = 0.95;
const TIER2_CREDIBILITY: f64 = 0.80;
const TIER3_CREDIBILITY: f64 = 0.60;
const TIER4_CREDIBILITY: f64 = 0.40;
const INSTITUTIONAL_CREDIBILITY: f64 = 0.85;
const UNKNOWN_CREDIBILITY: f64 = 0.20;

// ---------------------------------------------------------------------------
// Bias tables
// ---------------------------------------------------------------------------

const HIGH_BIAS_PHRASES: &[&str] = &[
    "you won't believe",
    "shocking",
    "guaranteed",
    "to the moon",
    "must buy",
    "can't lose",
    "once in a lifetime",
    "get rich",
    "skyrocket",
    "crash imminent",
];

const MEDIUM_BIAS_PHRASES: &[&str] = &[
    "massive",
    "huge",
    "incredible",
    "disaster",
    "explosive",
    "soaring",
    "plummeting",
    "unprecedented",
    "amazing",
    "terrible",
];

const LOW_BIAS_PHRASES: &[&str] = &[
    "reportedly",
    "allegedly",
    "rumored",
    "sources say",
    "some analysts",
    "possibly",
    "might",
    "could",
];

const HIGH_BIAS_WEIGHT: f64 = 3.0;
const MEDIUM_BIAS_WEIGHT: f64 = 2.0;
const LOW_BIAS_WEIGHT: f64 = 1.0;

/// Weighted hits per 100 words at which the bias score saturates at 1.0.
const BIAS_SATURATION_PER_100_WORDS: f64 = 10.0;

/// Sources older than this many days get a staleness note.
const STALE_AFTER_DAYS: i64 = 365;

fn phrase_regex(phrases: &[&str]) -> Regex {
    let alternation = phrases
        .iter()
        .map(|p| regex::escape(p))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{alternation})\b")).unwrap()
}

static RE_HIGH_BIAS: LazyLock<Regex> = LazyLock::new(|| phrase_regex(HIGH_BIAS_PHRASES));
static RE_MEDIUM_BIAS: LazyLock<Regex> = LazyLock::new(|| phrase_regex(MEDIUM_BIAS_PHRASES));
static RE_LOW_BIAS: LazyLock<Regex> = LazyLock::new(|| phrase_regex(LOW_BIAS_PHRASES));

// ── Date patterns ───────────────────────────────────────────────────────

static RE_DATE_ISO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

static RE_DATE_US: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());

static RE_DATE_WRITTEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(January|February|March|April|May|June|July|August|September|October|November|December|Jan|Feb|Mar|Apr|Jun|Jul|Aug|Sep|Sept|Oct|Nov|Dec)\.?\s+(\d{1,2}),\s*(\d{4})\b",
    )
    .unwrap()
});

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Ordinal credibility bucket assigned to a source domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SourceTier {
    Tier1 = 1,
    Tier2 = 2,
    Tier3 = 3,
    Tier4 = 4,
    Tier5 = 5,
}

impl SourceTier {
    /// Tier number, 1 (most credible) to 5.
    pub fn number(&self) -> u8 {
        *self as u8
    }
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tier {}", self.number())
    }
}

/// Bias level derived from the bias score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasLevel {
    Minimal,
    Low,
    Medium,
    High,
}

impl BiasLevel {
    /// Map a bias score in `[0, 1]` to a level using cut points 0.70 / 0.40 / 0.15.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.70 {
            Self::High
        } else if score >= 0.40 {
            Self::Medium
        } else if score >= 0.15 {
            Self::Low
        } else {
            Self::Minimal
        }
    }
}

impl std::fmt::Display for BiasLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Minimal => write!(f, "minimal"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Credibility and bias assessment of one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceVerification {
    pub url: String,
    /// Host with any leading `www.` removed; empty when the URL does not parse.
    pub domain: String,
    /// Credibility in `[0, 1]`.
    pub credibility: f64,
    pub tier: SourceTier,
    pub bias_level: BiasLevel,
    /// Bias score in `[0, 1]`.
    pub bias_score: f64,
    /// Days since publication, if a publish date was supplied.
    pub recency_days: Option<i64>,
    pub notes: Vec<String>,
}

/// Aggregate verdict over several sources backing one claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimVerification {
    pub claim: String,
    pub verified: bool,
    pub confidence: f64,
    pub source_count: usize,
    pub mean_credibility: f64,
    pub mean_bias: f64,
    pub verifications: Vec<SourceVerification>,
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Extract the domain from a URL, stripping a leading `www.`.
///
/// Returns an empty string when the URL cannot be parsed or has no host.
pub fn extract_domain(url: &str) -> String {
    match url::Url::parse(url.trim()) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h.to_lowercase())
            .map(|h| h.strip_prefix("www.").map(str::to_owned).unwrap_or(h))
            .unwrap_or_default(),
        Err(_) => String::new(),
    }
}

/// Look up a domain's tier and credibility. First matching rule wins.
pub fn classify_domain(domain: &str) -> (SourceTier, f64) {
    if TIER1_DOMAINS.contains(&domain) {
        (SourceTier::Tier1, TIER1_CREDIBILITY)
    } else if TIER2_DOMAINS.contains(&domain) {
        (SourceTier::Tier2, TIER2_CREDIBILITY)
    } else if !domain.is_empty() && TIER3_PATTERNS.iter().any(|p| domain.contains(p)) {
        (SourceTier::Tier3, TIER3_CREDIBILITY)
    } else if TIER4_DOMAINS.contains(&domain) {
        (SourceTier::Tier4, TIER4_CREDIBILITY)
    } else if domain.ends_with(".gov") || domain.ends_with(".edu") {
        (SourceTier::Tier2, INSTITUTIONAL_CREDIBILITY)
    } else {
        (SourceTier::Tier5, UNKNOWN_CREDIBILITY)
    }
}

/// Score bias cues in `text`: weighted phrase hits per 100 words, saturating at 1.0.
pub fn bias_score(text: &str) -> f64 {
    let words = text.split_whitespace().count();
    if words == 0 {
        return 0.0;
    }
    let weighted = RE_HIGH_BIAS.find_iter(text).count() as f64 * HIGH_BIAS_WEIGHT
        + RE_MEDIUM_BIAS.find_iter(text).count() as f64 * MEDIUM_BIAS_WEIGHT
        + RE_LOW_BIAS.find_iter(text).count() as f64 * LOW_BIAS_WEIGHT;
    let per_100 = weighted * 100.0 / words as f64;
    (per_100 / BIAS_SATURATION_PER_100_WORDS).clamp(0.0, 1.0)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().get(..3)? {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Extract a publish date from free text.
///
/// Patterns are tried in a fixed order: ISO `YYYY-MM-DD`, US `MM/DD/YYYY`,
/// then `Month DD, YYYY`. Within a pattern the first valid calendar date wins.
pub fn extract_publish_date(text: &str) -> Option<NaiveDate> {
    let iso = RE_DATE_ISO.captures_iter(text).find_map(|c| {
        NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
    });
    if iso.is_some() {
        return iso;
    }

    let us = RE_DATE_US.captures_iter(text).find_map(|c| {
        NaiveDate::from_ymd_opt(c[3].parse().ok()?, c[1].parse().ok()?, c[2].parse().ok()?)
    });
    if us.is_some() {
        return us;
    }

    RE_DATE_WRITTEN.captures_iter(text).find_map(|c| {
        NaiveDate::from_ymd_opt(c[3].parse().ok()?, month_number(&c[1])?, c[2].parse().ok()?)
    })
}

fn content_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Fill in the recency of an undated verification as of `today`.
fn with_recency(
    mut verification: SourceVerification,
    publish_date: Option<NaiveDate>,
    today: NaiveDate,
) -> SourceVerification {
    verification.recency_days = publish_date.map(|date| (today - date).num_days().max(0));
    if let Some(days) = verification.recency_days.filter(|d| *d > STALE_AFTER_DAYS) {
        verification.notes.push(format!("published {days} days ago"));
    }
    verification
}

// ---------------------------------------------------------------------------
// Verifier
// ---------------------------------------------------------------------------

/// Scores sources and memoizes the results.
pub struct SourceVerifier {
    config: VerifierConfig,
    cache: DashMap<(String, u64), SourceVerification>,
}

impl Default for SourceVerifier {
    fn default() -> Self {
        Self::new(VerifierConfig::default())
    }
}

impl SourceVerifier {
    pub fn new(config: VerifierConfig) -> Self {
        Self {
            config,
            cache: DashMap::new(),
        }
    }

    /// Verify one source as of today.
    pub fn verify(
        &self,
        url: &str,
        text: Option<&str>,
        publish_date: Option<NaiveDate>,
    ) -> SourceVerification {
        self.verify_on(url, text, publish_date, Utc::now().date_naive())
    }

    /// Verify one source as of `today`. Identical `(url, text)` pairs reuse the
    /// cached credibility and bias; recency is derived on every call.
    pub fn verify_on(
        &self,
        url: &str,
        text: Option<&str>,
        publish_date: Option<NaiveDate>,
        today: NaiveDate,
    ) -> SourceVerification {
        let text = text.unwrap_or("");
        let key = (url.to_owned(), content_hash(text));
        let cached = self.cache.get(&key).map(|hit| hit.value().clone());
        let undated = match cached {
            Some(hit) => hit,
            None => self.compute_and_cache(key, url, text),
        };
        with_recency(undated, publish_date, today)
    }

    fn compute_and_cache(&self, key: (String, u64), url: &str, text: &str) -> SourceVerification {
        let result = self.compute(url, text);
        tracing::debug!(
            url,
            domain = %result.domain,
            tier = result.tier.number(),
            credibility = result.credibility,
            bias = result.bias_score,
            "verified source"
        );

        if let Some(capacity) = self.config.cache_capacity {
            if self.cache.len() >= capacity {
                tracing::debug!(capacity, "verification cache full, clearing");
                self.cache.clear();
            }
        }
        self.cache.insert(key, result.clone());
        result
    }

    fn compute(&self, url: &str, text: &str) -> SourceVerification {
        let domain = extract_domain(url);
        let (tier, credibility) = classify_domain(&domain);
        let bias_score = bias_score(text);
        let bias_level = BiasLevel::from_score(bias_score);

        let mut notes = Vec::new();
        if domain.is_empty() {
            notes.push(format!("could not parse a domain from \"{url}\""));
        }
        notes.push(format!("{tier} source ({domain})"));
        if bias_level != BiasLevel::Minimal {
            notes.push(format!("{bias_level} bias language (score {bias_score:.2})"));
        }

        SourceVerification {
            url: url.to_owned(),
            domain,
            credibility,
            tier,
            bias_level,
            bias_score,
            recency_days: None,
            notes,
        }
    }

    /// Aggregate several `(url, text)` sources into a verdict on `claim`.
    ///
    /// `confidence = mean(credibility) × min(1, n/3) × (1 − mean(bias) × 0.3)`.
    pub fn verify_claim(&self, claim: &str, sources: &[(String, String)]) -> ClaimVerification {
        if sources.is_empty() {
            return ClaimVerification {
                claim: claim.to_owned(),
                verified: false,
                confidence: 0.0,
                source_count: 0,
                mean_credibility: 0.0,
                mean_bias: 0.0,
                verifications: Vec::new(),
            };
        }

        let verifications: Vec<SourceVerification> = sources
            .iter()
            .map(|(url, text)| self.verify(url, Some(text), None))
            .collect();

        let n = verifications.len() as f64;
        let mean_credibility = verifications.iter().map(|v| v.credibility).sum::<f64>() / n;
        let mean_bias = verifications.iter().map(|v| v.bias_score).sum::<f64>() / n;
        let corroboration = (n / 3.0).min(1.0);
        let confidence = mean_credibility * corroboration * (1.0 - mean_bias * 0.3);

        ClaimVerification {
            claim: claim.to_owned(),
            verified: confidence >= self.config.verify_threshold,
            confidence,
            source_count: verifications.len(),
            mean_credibility,
            mean_bias,
            verifications,
        }
    }

    /// Number of memoized verifications.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Drop every memoized verification.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_strips_www_and_lowercases() {
        assert_eq!(extract_domain("https://www.Reuters.com/markets/x"), "reuters.com");
        assert_eq!(extract_domain("http://finance.yahoo.com/q"), "finance.yahoo.com");
        assert_eq!(extract_domain("not a url"), "");
    }

    #[test]
    fn tier_lookup_order() {
        assert_eq!(classify_domain("reuters.com"), (SourceTier::Tier1, 0.95));
        assert_eq!(classify_domain("cnbc.com"), (SourceTier::Tier2, 0.80));
        assert_eq!(classify_domain("blog.seekingalpha.com"), (SourceTier::Tier3, 0.60));
        assert_eq!(classify_domain("reddit.com"), (SourceTier::Tier4, 0.40));
        assert_eq!(classify_domain("treasury.gov"), (SourceTier::Tier2, 0.85));
        assert_eq!(classify_domain("mit.edu"), (SourceTier::Tier2, 0.85));
        assert_eq!(classify_domain("example.org"), (SourceTier::Tier5, 0.20));
        assert_eq!(classify_domain(""), (SourceTier::Tier5, 0.20));
    }

    #[test]
    fn tier1_wins_over_gov_heuristic() {
        // sec.gov is both Tier 1 and a .gov domain; Tier 1 is checked first.
        assert_eq!(classify_domain("sec.gov"), (SourceTier::Tier1, 0.95));
    }

    #[test]
    fn tier4_is_exact_match_only() {
        assert_eq!(classify_domain("old.reddit.com").0, SourceTier::Tier5);
    }

    #[test]
    fn neutral_text_has_minimal_bias() {
        let text = "The company reported quarterly revenue of 12 billion dollars, \
                    in line with consensus estimates published last week.";
        assert_eq!(bias_score(text), 0.0);
        assert_eq!(BiasLevel::from_score(bias_score(text)), BiasLevel::Minimal);
    }

    #[test]
    fn hyped_text_saturates() {
        let text = "Shocking! This stock is guaranteed to skyrocket, a must buy, you can't lose.";
        assert!((bias_score(text) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn bias_levels_use_cut_points() {
        assert_eq!(BiasLevel::from_score(0.70), BiasLevel::High);
        assert_eq!(BiasLevel::from_score(0.69), BiasLevel::Medium);
        assert_eq!(BiasLevel::from_score(0.40), BiasLevel::Medium);
        assert_eq!(BiasLevel::from_score(0.15), BiasLevel::Low);
        assert_eq!(BiasLevel::from_score(0.14), BiasLevel::Minimal);
    }

    #[test]
    fn empty_text_has_zero_bias() {
        assert_eq!(bias_score(""), 0.0);
        assert_eq!(bias_score("   "), 0.0);
    }

    #[test]
    fn extracts_iso_date_first() {
        let text = "Updated 03/04/2024, originally 2024-01-15.";
        assert_eq!(
            extract_publish_date(text),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn extracts_us_date() {
        assert_eq!(
            extract_publish_date("Posted 7/4/2023 by staff"),
            NaiveDate::from_ymd_opt(2023, 7, 4)
        );
    }

    #[test]
    fn extracts_written_date() {
        assert_eq!(
            extract_publish_date("Published March 5, 2024 at noon"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            extract_publish_date("sept 30, 2022"),
            NaiveDate::from_ymd_opt(2022, 9, 30)
        );
    }

    #[test]
    fn invalid_or_missing_dates_yield_none() {
        assert_eq!(extract_publish_date("no dates here"), None);
        assert_eq!(extract_publish_date("2024-13-45"), None);
    }

    #[test]
    fn verify_is_cached() {
        let verifier = SourceVerifier::default();
        let a = verifier.verify("https://reuters.com/a", Some("Shares rose 3%."), None);
        assert_eq!(verifier.cache_len(), 1);
        let b = verifier.verify("https://reuters.com/a", Some("Shares rose 3%."), None);
        assert_eq!(verifier.cache_len(), 1);
        assert_eq!(a, b);

        verifier.verify("https://reuters.com/a", Some("Different text."), None);
        assert_eq!(verifier.cache_len(), 2);
    }

    #[test]
    fn cache_capacity_clears_when_full() {
        let verifier = SourceVerifier::new(VerifierConfig {
            cache_capacity: Some(2),
            ..Default::default()
        });
        verifier.verify("https://a.com", None, None);
        verifier.verify("https://b.com", None, None);
        verifier.verify("https://c.com", None, None);
        assert_eq!(verifier.cache_len(), 1);
    }

    #[test]
    fn recency_only_with_publish_date() {
        let verifier = SourceVerifier::default();
        let undated = verifier.verify("https://cnbc.com/x", Some("text"), None);
        assert_eq!(undated.recency_days, None);

        let ten_days_ago = Utc::now().date_naive() - chrono::Duration::days(10);
        let dated = verifier.verify("https://cnbc.com/x", Some("text"), Some(ten_days_ago));
        assert_eq!(dated.recency_days, Some(10));
        assert_eq!(verifier.cache_len(), 1);
    }

    #[test]
    fn cached_recency_follows_the_clock() {
        let verifier = SourceVerifier::default();
        let published = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let day = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();

        let first = verifier.verify_on("https://cnbc.com/x", Some("text"), Some(published), day(1, 11));
        assert_eq!(first.recency_days, Some(10));

        let later = verifier.verify_on("https://cnbc.com/x", Some("text"), Some(published), day(3, 1));
        assert_eq!(later.recency_days, Some(60));
        assert_eq!(verifier.cache_len(), 1);
        assert_eq!(later.credibility, first.credibility);

        let stale = verifier.verify_on(
            "https://cnbc.com/x",
            Some("text"),
            Some(published),
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        );
        assert!(stale.notes.iter().any(|n| n.starts_with("published")));
        assert!(!later.notes.iter().any(|n| n.starts_with("published")));
    }

    #[test]
    fn verify_claim_aggregates() {
        let verifier = SourceVerifier::default();
        let sources = vec![
            ("https://reuters.com/a".to_string(), "Revenue was 10B.".to_string()),
            ("https://bloomberg.com/b".to_string(), "Revenue was 10B.".to_string()),
            ("https://wsj.com/c".to_string(), "Revenue was 10B.".to_string()),
        ];
        let verdict = verifier.verify_claim("revenue 10B", &sources);
        assert_eq!(verdict.source_count, 3);
        assert!((verdict.confidence - 0.95).abs() < 1e-9);
        assert!(verdict.verified);
    }

    #[test]
    fn verify_claim_single_weak_source_is_unverified() {
        let verifier = SourceVerifier::default();
        let sources = vec![("https://reuters.com/a".to_string(), "ok".to_string())];
        let verdict = verifier.verify_claim("x", &sources);
        // 0.95 × 1/3
        assert!((verdict.confidence - 0.95 / 3.0).abs() < 1e-9);
        assert!(!verdict.verified);
    }

    #[test]
    fn verify_claim_without_sources() {
        let verdict = SourceVerifier::default().verify_claim("x", &[]);
        assert!(!verdict.verified);
        assert_eq!(verdict.confidence, 0.0);
        assert_eq!(verdict.source_count, 0);
    }
}
