//! Core data types that flow through the indexing and search pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Kind of record a piece of indexed text belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Problem,
    Solution,
    Learning,
    Change,
}

impl ContentType {
    /// Every indexable content type, in the order `reindex_all` walks them.
    pub const ALL: [ContentType; 4] = [
        ContentType::Problem,
        ContentType::Solution,
        ContentType::Learning,
        ContentType::Change,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Problem => "problem",
            ContentType::Solution => "solution",
            ContentType::Learning => "learning",
            ContentType::Change => "change",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "problem" => Ok(ContentType::Problem),
            "solution" => Ok(ContentType::Solution),
            "learning" => Ok(ContentType::Learning),
            "change" => Ok(ContentType::Change),
            other => Err(Error::InvalidRequest(format!(
                "unknown content type: '{other}'. Use problem, solution, learning, or change."
            ))),
        }
    }
}

/// Identifies one indexable unit of text.
///
/// Assigned by the record store and never reused across different
/// underlying records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentKey {
    pub content_type: ContentType,
    pub content_id: i64,
}

impl ContentKey {
    pub fn new(content_type: ContentType, content_id: i64) -> Self {
        Self {
            content_type,
            content_id,
        }
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.content_id)
    }
}

/// What the record store hands the indexing layer when a record is
/// created or materially edited.
///
/// `searchable_text` is a caller-chosen concatenation of user-facing
/// fields; the indexing layer collapses whitespace and otherwise treats
/// it as opaque.
#[derive(Debug, Clone)]
pub struct IndexableDocument {
    pub key: ContentKey,
    pub project_id: i64,
    pub searchable_text: String,
}

/// One record surfaced by the store during a bulk reindex.
#[derive(Debug, Clone)]
pub struct IndexableRecord {
    pub content_id: i64,
    pub project_id: i64,
    pub searchable_text: String,
}

/// Title/snippet pair the enricher attaches to a result for display.
#[derive(Debug, Clone)]
pub struct DisplayInfo {
    pub title: String,
    pub snippet: String,
}

/// Which retrieval paths scored a result, carrying the raw per-path
/// scores.
///
/// A path that did not evaluate a candidate is structurally absent,
/// which keeps "scored zero" and "not scored" distinct.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ScoreBreakdown {
    Lexical { lexical_score: f64 },
    Vector { vector_score: f64 },
    Hybrid { lexical_score: f64, vector_score: f64 },
}

impl ScoreBreakdown {
    pub fn source(&self) -> &'static str {
        match self {
            ScoreBreakdown::Lexical { .. } => "lexical",
            ScoreBreakdown::Vector { .. } => "vector",
            ScoreBreakdown::Hybrid { .. } => "hybrid",
        }
    }

    pub fn lexical_score(&self) -> Option<f64> {
        match self {
            ScoreBreakdown::Lexical { lexical_score }
            | ScoreBreakdown::Hybrid { lexical_score, .. } => Some(*lexical_score),
            ScoreBreakdown::Vector { .. } => None,
        }
    }

    pub fn vector_score(&self) -> Option<f64> {
        match self {
            ScoreBreakdown::Vector { vector_score }
            | ScoreBreakdown::Hybrid { vector_score, .. } => Some(*vector_score),
            ScoreBreakdown::Lexical { .. } => None,
        }
    }

    /// Tie-break rank: a result corroborated by both paths sorts before a
    /// single-source result with the same combined score.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ScoreBreakdown::Hybrid { .. } => 0,
            ScoreBreakdown::Lexical { .. } => 1,
            ScoreBreakdown::Vector { .. } => 2,
        }
    }
}

/// A scored candidate produced by the hybrid query engine.
///
/// Transient: produced per-query, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub key: ContentKey,
    pub project_id: i64,
    #[serde(flatten)]
    pub breakdown: ScoreBreakdown,
    pub combined_score: f64,
}

/// A [`SearchResult`] enriched with display content from the record
/// store; the shape returned to callers.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub result: SearchResult,
    pub title: String,
    pub snippet: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_round_trips() {
        for ct in ContentType::ALL {
            assert_eq!(ct.as_str().parse::<ContentType>().unwrap(), ct);
        }
    }

    #[test]
    fn unknown_content_type_rejected() {
        assert!("story".parse::<ContentType>().is_err());
    }

    #[test]
    fn breakdown_scores_are_optional_per_path() {
        let hybrid = ScoreBreakdown::Hybrid {
            lexical_score: 2.0,
            vector_score: 0.5,
        };
        assert_eq!(hybrid.lexical_score(), Some(2.0));
        assert_eq!(hybrid.vector_score(), Some(0.5));
        assert_eq!(hybrid.source(), "hybrid");

        let lex = ScoreBreakdown::Lexical { lexical_score: 1.0 };
        assert_eq!(lex.vector_score(), None);
        assert_eq!(lex.source(), "lexical");
    }

    #[test]
    fn hybrid_ranks_before_single_source() {
        let hybrid = ScoreBreakdown::Hybrid {
            lexical_score: 1.0,
            vector_score: 1.0,
        };
        let lex = ScoreBreakdown::Lexical { lexical_score: 1.0 };
        let vec = ScoreBreakdown::Vector { vector_score: 1.0 };
        assert!(hybrid.rank() < lex.rank());
        assert!(lex.rank() < vec.rank());
    }
}
