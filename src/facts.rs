//! Shared fact vocabulary: fact types and timestamp helpers.

use serde::{Deserialize, Serialize};

/// Seconds in one hour.
pub const SECS_PER_HOUR: u64 = 3_600;
/// Seconds in one day.
pub const SECS_PER_DAY: u64 = 86_400;

/// Classification of a claim, governing its decay rate and default accuracy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactType {
    /// Stable, checkable statements ("X is headquartered in Y").
    Factual,
    /// Recurring behavior observed over time.
    Pattern,
    /// Reported events.
    News,
    /// Opinion or mood about a subject.
    Sentiment,
    /// Forward-looking claims.
    Prediction,
    /// Anything else; uses the default decay rate.
    Other,
}

impl FactType {
    /// All fact types, in declaration order.
    pub const ALL: [FactType; 6] = [
        Self::Factual,
        Self::Pattern,
        Self::News,
        Self::Sentiment,
        Self::Prediction,
        Self::Other,
    ];

    /// Lowercase name used in logs, graph node types and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Factual => "factual",
            Self::Pattern => "pattern",
            Self::News => "news",
            Self::Sentiment => "sentiment",
            Self::Prediction => "prediction",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for FactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "factual" | "fact" => Ok(Self::Factual),
            "pattern" => Ok(Self::Pattern),
            "news" => Ok(Self::News),
            "sentiment" => Ok(Self::Sentiment),
            "prediction" => Ok(Self::Prediction),
            "other" => Ok(Self::Other),
            other => Err(format!("unknown fact type: {other}")),
        }
    }
}

/// Current time in seconds since the UNIX epoch.
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Fractional days elapsed between `earlier` and `later` (0 if `later` precedes `earlier`).
pub fn days_between(earlier: u64, later: u64) -> f64 {
    later.saturating_sub(earlier) as f64 / SECS_PER_DAY as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fact_type_parses_case_insensitively() {
        assert_eq!("News".parse::<FactType>().unwrap(), FactType::News);
        assert_eq!(" prediction ".parse::<FactType>().unwrap(), FactType::Prediction);
        assert!("rumor".parse::<FactType>().is_err());
    }

    #[test]
    fn fact_type_serializes_snake_case() {
        let json = serde_json::to_string(&FactType::Sentiment).unwrap();
        assert_eq!(json, "\"sentiment\"");
    }

    #[test]
    fn days_between_saturates() {
        assert_eq!(days_between(100, 50), 0.0);
        assert!((days_between(0, SECS_PER_DAY * 3) - 3.0).abs() < 1e-9);
    }
}
