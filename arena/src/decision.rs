//! Decision parser: turns an area chair's free-text answer into a record.
//!
//! Grammar, one marker per line (leading whitespace ignored, markers
//! case-insensitive, free text allowed anywhere in between):
//!
//! ```text
//! Paper ID: <int> [(...)]
//! Willingness to accept: <int>        (ranking)
//! Decision: <label>                   (recommendation)
//! ```
//!
//! A paper id and a rating, in either order, form one pair. The value of a
//! marker is the text after its first `:` up to the next `:`.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ArenaError;

/// How the area chair scores a batch of papers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringMethod {
    /// Relative willingness-to-accept rank across the batch.
    Ranking,
    /// Independent accept/reject label per paper.
    Recommendation,
}

impl FromStr for ScoringMethod {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ranking" => Ok(Self::Ranking),
            "recommendation" => Ok(Self::Recommendation),
            other => Err(ArenaError::config(format!(
                "unknown scoring method: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ranking => write!(f, "ranking"),
            Self::Recommendation => write!(f, "recommendation"),
        }
    }
}

/// Rating given to one paper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rating {
    /// Willingness-to-accept rank; lower is better.
    Rank(i64),
    /// Decision label, e.g. "Accept (poster)".
    Decision(String),
}

impl Rating {
    pub fn rank(&self) -> Option<i64> {
        match self {
            Self::Rank(r) => Some(*r),
            Self::Decision(_) => None,
        }
    }

    pub fn is_accept(&self) -> bool {
        match self {
            Self::Decision(label) => label.starts_with("Accept"),
            Self::Rank(_) => false,
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rank(r) => write!(f, "{}", r),
            Self::Decision(d) => write!(f, "{}", d),
        }
    }
}

/// Paper id → rating. Ordered by paper id for stable serialization.
pub type DecisionRecord = BTreeMap<u64, Rating>;

/// Why a block of text is not a valid decision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionParseError {
    #[error("paper {0} is assigned a rating twice")]
    DuplicatePaper(u64),

    #[error("line {line}: expected an integer, found '{value}'")]
    InvalidInteger { line: usize, value: String },

    #[error("line {line}: marker without a ':' separator")]
    MalformedLine { line: usize },

    #[error("no paper decisions found")]
    NoDecisions,
}

/// Line scanner for area chair decisions.
#[derive(Debug, Clone, Copy)]
pub struct DecisionParser {
    scoring: ScoringMethod,
}

impl DecisionParser {
    pub fn new(scoring: ScoringMethod) -> Self {
        Self { scoring }
    }

    pub fn scoring(&self) -> ScoringMethod {
        self.scoring
    }

    /// Parse a full answer. At least one pair must be found.
    pub fn parse(&self, text: &str) -> Result<DecisionRecord, DecisionParseError> {
        let mut record = DecisionRecord::new();
        let mut pending_id: Option<u64> = None;
        let mut pending_rating: Option<Rating> = None;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw.trim();
            let lower = line.to_lowercase();

            if lower.starts_with("paper id:") {
                let value = marker_value(line, line_no)?;
                let id_text = value.split('(').next().unwrap_or_default().trim();
                let id = id_text
                    .parse::<u64>()
                    .map_err(|_| DecisionParseError::InvalidInteger {
                        line: line_no,
                        value: id_text.to_string(),
                    })?;
                if record.contains_key(&id) {
                    return Err(DecisionParseError::DuplicatePaper(id));
                }
                pending_id = Some(id);
            } else if let Some(rating) = self.rating_on(line, &lower, line_no)? {
                pending_rating = Some(rating);
            }

            if let (Some(id), Some(rating)) = (pending_id, pending_rating.as_ref()) {
                record.insert(id, rating.clone());
                pending_id = None;
                pending_rating = None;
            }
        }

        if record.is_empty() {
            return Err(DecisionParseError::NoDecisions);
        }
        Ok(record)
    }

    fn rating_on(
        &self,
        line: &str,
        lower: &str,
        line_no: usize,
    ) -> Result<Option<Rating>, DecisionParseError> {
        match self.scoring {
            ScoringMethod::Ranking if lower.starts_with("willingness to accept:") => {
                let value = marker_value(line, line_no)?;
                value
                    .parse::<i64>()
                    .map(|r| Some(Rating::Rank(r)))
                    .map_err(|_| DecisionParseError::InvalidInteger {
                        line: line_no,
                        value: value.to_string(),
                    })
            }
            ScoringMethod::Recommendation if lower.starts_with("decision") => {
                let value = marker_value(line, line_no)?;
                Ok(Some(Rating::Decision(value.to_string())))
            }
            _ => Ok(None),
        }
    }
}

/// Trimmed text between the first and second ':' of a marker line.
fn marker_value(line: &str, line_no: usize) -> Result<&str, DecisionParseError> {
    let mut parts = line.split(':');
    parts.next();
    parts
        .next()
        .map(str::trim)
        .ok_or(DecisionParseError::MalformedLine { line: line_no })
}
