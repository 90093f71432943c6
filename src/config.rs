//! Pipeline configuration, loadable from TOML.
//!
//! Every section has defaults matching the documented constants, so an empty
//! file (or `Config::default()`) reproduces the stock behavior. Only override
//! what you need:
//!
//! ```toml
//! [confidence]
//! acceptance_floor = 0.5
//!
//! [conflict]
//! strategy = "consensus"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::conflict::ResolutionStrategy;
use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub verifier: VerifierConfig,
    pub conflict: ConflictConfig,
    pub confidence: ConfidenceConfig,
    pub integrator: IntegratorConfig,
    pub triggers: TriggerConfig,
}

/// Source verification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Minimum aggregate confidence for `verify_claim` to report a claim as verified.
    #[serde(default = "default_verify_threshold")]
    pub verify_threshold: f64,
    /// Cache capacity; `None` keeps every entry for the process lifetime.
    #[serde(default)]
    pub cache_capacity: Option<usize>,
}

/// Conflict detection and resolution settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Relative spread above which numeric values conflict.
    #[serde(default = "default_numeric_threshold")]
    pub numeric_threshold: f64,
    /// Relative tolerance for numeric agreement with a winning value.
    #[serde(default = "default_agreement_tolerance")]
    pub agreement_tolerance: f64,
    /// Strategy the integrator uses when sources disagree.
    #[serde(default)]
    pub strategy: ResolutionStrategy,
    /// Resolution history capacity; `None` keeps every entry.
    #[serde(default)]
    pub history_capacity: Option<usize>,
}

/// Confidence scoring settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceConfig {
    /// Minimum total confidence for a claim to be stored.
    #[serde(default = "default_acceptance_floor")]
    pub acceptance_floor: f64,
    /// Confidence at or above which a fact counts as high confidence.
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f64,
    /// Number of recent outcomes kept per fact type.
    #[serde(default = "default_accuracy_window")]
    pub accuracy_window: usize,
    /// Context relevance used when the caller supplies none.
    #[serde(default = "default_context_relevance")]
    pub default_context_relevance: f64,
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegratorConfig {
    /// Two facts of one subject are related when learned within this many hours.
    #[serde(default = "default_relation_window_hours")]
    pub relation_window_hours: u64,
    /// Facts at or above this confidence lend support during propagation.
    #[serde(default = "default_propagation_source_min")]
    pub propagation_source_min: f64,
    /// Facts below this confidence may receive support during propagation.
    #[serde(default = "default_propagation_target_max")]
    pub propagation_target_max: f64,
    /// Multiplier applied to a supported fact's confidence.
    #[serde(default = "default_propagation_boost")]
    pub propagation_boost: f64,
    /// Ceiling for a boosted confidence.
    #[serde(default = "default_propagation_cap")]
    pub propagation_cap: f64,
    /// Cross-validation assumed when rescoring after an accuracy update.
    #[serde(default = "default_assumed_cross_validation")]
    pub assumed_cross_validation: f64,
    /// Mirror accepted facts into the knowledge graph.
    #[serde(default = "default_true")]
    pub mirror_to_graph: bool,
}

/// Trigger scheduling settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Batch size for `run_cycle`.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Seconds between scheduler ticks when driven by the daemon.
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,
    /// Per-action timeout; `None` lets a stalled action block its slot.
    #[serde(default)]
    pub action_timeout_secs: Option<u64>,
}

fn default_verify_threshold() -> f64 {
    0.6
}
fn default_numeric_threshold() -> f64 {
    0.05
}
fn default_agreement_tolerance() -> f64 {
    0.05
}
fn default_acceptance_floor() -> f64 {
    0.4
}
fn default_high_confidence() -> f64 {
    0.8
}
fn default_accuracy_window() -> usize {
    100
}
fn default_context_relevance() -> f64 {
    0.8
}
fn default_relation_window_hours() -> u64 {
    24
}
fn default_propagation_source_min() -> f64 {
    0.8
}
fn default_propagation_target_max() -> f64 {
    0.6
}
fn default_propagation_boost() -> f64 {
    1.1
}
fn default_propagation_cap() -> f64 {
    0.8
}
fn default_assumed_cross_validation() -> f64 {
    0.7
}
fn default_true() -> bool {
    true
}
fn default_max_concurrent() -> usize {
    4
}
fn default_tick_interval_secs() -> u64 {
    60
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            verify_threshold: default_verify_threshold(),
            cache_capacity: None,
        }
    }
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            numeric_threshold: default_numeric_threshold(),
            agreement_tolerance: default_agreement_tolerance(),
            strategy: ResolutionStrategy::default(),
            history_capacity: None,
        }
    }
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            acceptance_floor: default_acceptance_floor(),
            high_confidence: default_high_confidence(),
            accuracy_window: default_accuracy_window(),
            default_context_relevance: default_context_relevance(),
        }
    }
}

impl Default for IntegratorConfig {
    fn default() -> Self {
        Self {
            relation_window_hours: default_relation_window_hours(),
            propagation_source_min: default_propagation_source_min(),
            propagation_target_max: default_propagation_target_max(),
            propagation_boost: default_propagation_boost(),
            propagation_cap: default_propagation_cap(),
            assumed_cross_validation: default_assumed_cross_validation(),
            mirror_to_graph: true,
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            tick_interval_secs: default_tick_interval_secs(),
            action_timeout_secs: None,
        }
    }
}

impl Config {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Config = toml::from_str(text).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    /// Check every bounded value.
    pub fn validate(&self) -> ConfigResult<()> {
        let unit = [
            ("verifier.verify_threshold", self.verifier.verify_threshold),
            ("conflict.numeric_threshold", self.conflict.numeric_threshold),
            ("conflict.agreement_tolerance", self.conflict.agreement_tolerance),
            ("confidence.acceptance_floor", self.confidence.acceptance_floor),
            ("confidence.high_confidence", self.confidence.high_confidence),
            (
                "confidence.default_context_relevance",
                self.confidence.default_context_relevance,
            ),
            (
                "integrator.propagation_source_min",
                self.integrator.propagation_source_min,
            ),
            (
                "integrator.propagation_target_max",
                self.integrator.propagation_target_max,
            ),
            ("integrator.propagation_cap", self.integrator.propagation_cap),
            (
                "integrator.assumed_cross_validation",
                self.integrator.assumed_cross_validation,
            ),
        ];
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    message: format!("{value} is outside [0.0, 1.0]"),
                });
            }
        }
        if self.integrator.propagation_boost < 1.0 {
            return Err(ConfigError::Invalid {
                field: "integrator.propagation_boost".into(),
                message: "boost must be >= 1.0".into(),
            });
        }
        if self.confidence.accuracy_window == 0 {
            return Err(ConfigError::Invalid {
                field: "confidence.accuracy_window".into(),
                message: "window must be > 0".into(),
            });
        }
        if self.triggers.tick_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "triggers.tick_interval_secs".into(),
                message: "interval must be > 0".into(),
            });
        }
        Ok(())
    }
}
