// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # credence
//!
//! Verified fact ingestion: scores the credibility of claim sources, resolves
//! disagreement between them, computes a decaying confidence for each claim and
//! keeps accepted claims in a queryable in-memory knowledge graph. A trigger
//! scheduler decides when ingestion cycles run.
//!
//! ## Architecture
//!
//! - **Source verification** (`source`): domain credibility tiers, bias cues, publish dates
//! - **Conflict resolution** (`conflict`): disagreement detection and five resolution strategies
//! - **Confidence scoring** (`confidence`): weighted factors with per-type temporal decay
//! - **Knowledge graph** (`graph`): petgraph-backed typed nodes and edges with BFS traversal
//! - **Triggers** (`trigger`): prioritized condition→action rules with cooldowns
//! - **Integration** (`integrator`): the end-to-end ingestion pipeline
//!
//! ## Library usage
//!
//! ```no_run
//! use credence::facts::FactType;
//! use credence::integrator::{KnowledgeIntegrator, SourceDocument};
//!
//! let integrator = KnowledgeIntegrator::default();
//! let outcome = integrator.add_verified_fact(
//!     "AAPL",
//!     "Apple beat earnings estimates",
//!     FactType::News,
//!     &[
//!         SourceDocument::new("https://www.reuters.com/markets/apple", "..."),
//!         SourceDocument::new("https://www.cnbc.com/apple", "..."),
//!     ],
//!     None,
//! );
//! assert!(outcome.is_accepted());
//! ```

pub mod confidence;
pub mod config;
pub mod conflict;
#[cfg(feature = "daemon")]
pub mod daemon;
pub mod error;
pub mod facts;
pub mod graph;
pub mod integrator;
pub mod source;
pub mod trigger;
