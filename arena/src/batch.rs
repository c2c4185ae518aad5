//! AC decision batches: storage, batch planning and acceptance arithmetic.
//!
//! Papers are decided in batches, one batch per area chair. The store is
//! appended to across runs of the same experiment, and every batch but the
//! last must hold exactly `batch_size` papers.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::decision::{DecisionRecord, ScoringMethod};
use crate::error::{ArenaError, ArenaResult};
use crate::rng::SeededRng;

/// Ordered list of per-batch decision records.
#[derive(Debug, Clone)]
pub struct DecisionBatchStore {
    batches: Vec<DecisionRecord>,
    batch_size: usize,
}

impl DecisionBatchStore {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batches: Vec::new(),
            batch_size,
        }
    }

    /// Build from existing batches, dropping empty ones and checking sizes.
    pub fn from_batches(batches: Vec<DecisionRecord>, batch_size: usize) -> ArenaResult<Self> {
        let store = Self {
            batches: batches.into_iter().filter(|b| !b.is_empty()).collect(),
            batch_size,
        };
        store.validate()?;
        Ok(store)
    }

    /// Load from `path`. A missing file is an empty store.
    pub fn load(path: &Path, batch_size: usize) -> ArenaResult<Self> {
        if !path.exists() {
            info!(path = %path.display(), "no existing AC decisions");
            return Ok(Self::new(batch_size));
        }
        let json = fs::read_to_string(path)?;
        let batches: Vec<DecisionRecord> = serde_json::from_str(&json)?;
        let store = Self::from_batches(batches, batch_size)?;
        info!(path = %path.display(), batches = store.len(), "loaded existing AC decisions");
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> ArenaResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.batches)?)?;
        Ok(())
    }

    /// Every non-final batch holds exactly `batch_size` papers.
    pub fn validate(&self) -> ArenaResult<()> {
        let last = self.batches.len().saturating_sub(1);
        for (index, batch) in self.batches.iter().enumerate().take(last) {
            if batch.len() != self.batch_size {
                return Err(ArenaError::BatchInvariant {
                    index,
                    found: batch.len(),
                    expected: self.batch_size,
                });
            }
        }
        Ok(())
    }

    /// Append a batch. The current last batch becomes non-final, so it must be full.
    pub fn push(&mut self, record: DecisionRecord) -> ArenaResult<()> {
        if record.is_empty() {
            warn!("skipping empty decision batch");
            return Ok(());
        }
        if let Some(last) = self.batches.last() {
            if last.len() != self.batch_size {
                return Err(ArenaError::BatchInvariant {
                    index: self.batches.len() - 1,
                    found: last.len(),
                    expected: self.batch_size,
                });
            }
        }
        self.batches.push(record);
        Ok(())
    }

    pub fn batches(&self) -> &[DecisionRecord] {
        &self.batches
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Ids of every paper that already has a decision.
    pub fn decided_papers(&self) -> BTreeSet<u64> {
        self.batches
            .iter()
            .flat_map(|b| b.keys().copied())
            .collect()
    }
}

/// Split `items` into `len / batch_size` batches; the last absorbs the remainder.
/// Fewer items than one batch yields no batches.
pub fn plan_batches<T: Clone>(items: &[T], batch_size: usize) -> Vec<Vec<T>> {
    if batch_size == 0 {
        return Vec::new();
    }
    let num_batches = items.len() / batch_size;
    if num_batches == 0 {
        if !items.is_empty() {
            warn!(
                papers = items.len(),
                batch_size, "not enough papers for a full batch"
            );
        }
        return Vec::new();
    }
    (0..num_batches)
        .map(|i| {
            let start = i * batch_size;
            let end = if i == num_batches - 1 {
                items.len()
            } else {
                start + batch_size
            };
            items[start..end].to_vec()
        })
        .collect()
}

/// Spread `n` acceptances over `batch_number` batches: each gets
/// `n / batch_number`, and `n % batch_number` of them get one more.
pub fn generate_num_papers_to_accept(
    n: usize,
    batch_number: usize,
    rng: Option<&mut SeededRng>,
) -> Vec<usize> {
    if batch_number == 0 {
        return Vec::new();
    }
    let base = n / batch_number;
    let remainder = n % batch_number;
    let mut counts: Vec<usize> = (0..batch_number)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect();
    if let Some(rng) = rng {
        rng.shuffle(&mut counts);
    }
    counts
}

/// Paper ids accepted under `acceptance_rate`.
///
/// Ranking: the best-ranked papers of each batch, with the total
/// `floor(rate * papers)` spread over batches. Recommendation: every paper
/// whose decision starts with "Accept".
pub fn papers_accepted(
    batches: &[DecisionRecord],
    acceptance_rate: f64,
    scoring: ScoringMethod,
    rng: Option<&mut SeededRng>,
) -> ArenaResult<Vec<u64>> {
    if !(0.0..=1.0).contains(&acceptance_rate) {
        return Err(ArenaError::Acceptance(format!(
            "acceptance rate {} is outside [0, 1]",
            acceptance_rate
        )));
    }
    let total: usize = batches.iter().map(|b| b.len()).sum();
    if total == 0 {
        return Err(ArenaError::Acceptance("no papers found in batches".to_string()));
    }

    match scoring {
        ScoringMethod::Recommendation => Ok(batches
            .iter()
            .flat_map(|b| b.iter())
            .filter(|(_, rating)| rating.is_accept())
            .map(|(id, _)| *id)
            .collect()),
        ScoringMethod::Ranking => {
            let mut seen = BTreeSet::new();
            for id in batches.iter().flat_map(|b| b.keys()) {
                if !seen.insert(*id) {
                    return Err(ArenaError::Acceptance(format!(
                        "paper {} appears in more than one batch",
                        id
                    )));
                }
            }

            let n = (acceptance_rate * total as f64).floor() as usize;
            let counts = generate_num_papers_to_accept(n, batches.len(), rng);

            let mut accepted = Vec::with_capacity(n);
            for (batch, k) in batches.iter().zip(counts) {
                let mut ranked = Vec::with_capacity(batch.len());
                for (id, rating) in batch {
                    let rank = rating.rank().ok_or_else(|| {
                        ArenaError::Acceptance(format!(
                            "paper {} has decision '{}' instead of a rank",
                            id, rating
                        ))
                    })?;
                    ranked.push((rank, *id));
                }
                ranked.sort_by_key(|(rank, _)| *rank);
                accepted.extend(ranked.into_iter().take(k).map(|(_, id)| id));
            }
            Ok(accepted)
        }
    }
}
