//! Output directory layout shared by the review and decision runs.

use std::path::{Path, PathBuf};

use crate::decision::ScoringMethod;

/// Short model name: the first two `-`-separated segments
/// (`gpt-35-turbo` → `gpt-35`, `gpt-4o` → `gpt-4o`).
pub fn model_short(model_name: &str) -> String {
    model_name.split('-').take(2).collect::<Vec<_>>().join("-")
}

/// Where transcripts and decision batches live under one output directory.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    output_dir: PathBuf,
    conference: String,
    model_short: String,
}

impl OutputLayout {
    pub fn new(output_dir: &Path, conference: &str, model_name: &str) -> Self {
        Self {
            output_dir: output_dir.to_path_buf(),
            conference: conference.to_string(),
            model_short: model_short(model_name),
        }
    }

    pub fn model_short(&self) -> &str {
        &self.model_short
    }

    /// `<out>/paper_review/<conference>/<model>/<experiment>`
    pub fn review_dir(&self, experiment: &str) -> PathBuf {
        self.output_dir
            .join("paper_review")
            .join(&self.conference)
            .join(&self.model_short)
            .join(experiment)
    }

    /// `<review_dir>/<paper_id>/<paper_id>.json`
    pub fn transcript_path(&self, experiment: &str, paper_id: u64) -> PathBuf {
        let id = paper_id.to_string();
        self.review_dir(experiment)
            .join(&id)
            .join(format!("{}.json", id))
    }

    /// `<out>/decisions/<conference>/<model>/decisions_thru_<scoring>`
    pub fn decision_dir(&self, scoring: ScoringMethod) -> PathBuf {
        self.output_dir
            .join("decisions")
            .join(&self.conference)
            .join(&self.model_short)
            .join(format!("decisions_thru_{}", scoring))
    }

    /// `<decision_dir>/decision_<experiment>.json`
    pub fn decision_path(&self, scoring: ScoringMethod, experiment: &str) -> PathBuf {
        self.decision_dir(scoring)
            .join(format!("decision_{}.json", experiment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_short() {
        assert_eq!(model_short("gpt-35-turbo"), "gpt-35");
        assert_eq!(model_short("gpt-4o"), "gpt-4o");
        assert_eq!(model_short("gpt-4-1106-preview"), "gpt-4");
        assert_eq!(model_short("dummy"), "dummy");
    }

    #[test]
    fn test_paths() {
        let layout = OutputLayout::new(Path::new("out"), "ICLR2023", "gpt-4o-mini");
        assert_eq!(
            layout.transcript_path("BASELINE", 39),
            Path::new("out/paper_review/ICLR2023/gpt-4o/BASELINE/39/39.json")
        );
        assert_eq!(
            layout.decision_path(ScoringMethod::Ranking, "malicious_Rx1"),
            Path::new("out/decisions/ICLR2023/gpt-4o/decisions_thru_ranking/decision_malicious_Rx1.json")
        );
    }
}
