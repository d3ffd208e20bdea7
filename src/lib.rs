//! # Recall
//!
//! A hybrid lexical + semantic search engine for a personal
//! project-knowledge store (problems, solutions, learnings, changes).
//!
//! Recall keeps an FTS5 full-text index and an optional embedding
//! vector index consistent with an external record store, and fuses
//! their independently scored results into one ranked list. When no
//! embedding provider is available the engine serves lexical-only
//! results; the vector path is a capability decided once at startup,
//! never a per-call check.
//!
//! ## Architecture
//!
//! ```text
//! record mutation ──▶ Indexer ──▶ { memory_fts, memory_vectors }
//!
//! query ──▶ QueryEngine ──▶ { FTS5 BM25, cosine similarity }
//!                 │
//!                 ▼
//!          merge + weigh + rank ──▶ enrich via RecordStore ──▶ hits
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall init                                  # create index tables
//! recall index problem 1 1 "token expiration too short"
//! recall search "token expiration"
//! recall reindex                               # backfill from record tables
//! recall status                                # counts + vector availability
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Content keys, documents, score breakdowns, results |
//! | [`db`] | SQLite pool |
//! | [`migrate`] | Index-table migrations |
//! | [`embedding`] | Embedding provider abstraction (OpenAI, Ollama, local) |
//! | [`lexical`] | FTS5 lexical index adapter |
//! | [`vector`] | Vector index adapter and startup capability probe |
//! | [`indexer`] | Indexing coordinator (the only index mutation path) |
//! | [`search`] | Hybrid merge/scoring engine |
//! | [`records`] | Record-store trait and adapters |
//! | [`service`] | The injected service facade |

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod lexical;
pub mod migrate;
pub mod models;
pub mod records;
pub mod search;
pub mod service;
pub mod vector;

pub use error::{Error, Result};
pub use models::{
    ContentKey, ContentType, DisplayInfo, IndexableDocument, IndexableRecord, ScoreBreakdown,
    SearchHit, SearchResult,
};
pub use service::{IndexStatus, SearchOptions, SearchService};
