//! Paper text and ground-truth decisions from the data directory.
//!
//! Layout: `<data_dir>/<conference>/id2decision.json` maps paper ids to
//! their real decisions, and `<data_dir>/<conference>/paper/<decision>/<id>.txt`
//! holds the pre-extracted text of each paper.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Prefix of the paper extractor's message.
pub const PAPER_CONTENT_HEADER: &str = "Contents of this paper:\n\n";

/// Supplies the text the paper extractor posts in phase 0.
pub trait PaperSource {
    fn paper_text(&self, paper_id: u64, paper_decision: &str) -> String;
}

/// Pre-extracted paper texts on disk.
#[derive(Debug, Clone)]
pub struct TextDirSource {
    data_dir: PathBuf,
    conference: String,
    max_num_words: usize,
}

impl TextDirSource {
    pub fn new(data_dir: &Path, conference: &str, max_num_words: usize) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            conference: conference.to_string(),
            max_num_words,
        }
    }

    pub fn paper_path(&self, paper_id: u64, paper_decision: &str) -> PathBuf {
        self.data_dir
            .join(&self.conference)
            .join("paper")
            .join(paper_decision)
            .join(format!("{}.txt", paper_id))
    }
}

impl PaperSource for TextDirSource {
    fn paper_text(&self, paper_id: u64, paper_decision: &str) -> String {
        let path = self.paper_path(paper_id, paper_decision);
        info!(paper_id, decision = %paper_decision, conference = %self.conference, "loading paper");
        match fs::read_to_string(&path) {
            Ok(text) => truncate_words(&text, self.max_num_words),
            Err(e) => {
                warn!(paper_id, path = %path.display(), error = %e, "paper text unavailable");
                String::new()
            }
        }
    }
}

/// Header plus at most `max_words` whitespace-separated words.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().take(max_words).collect();
    format!("{}{}", PAPER_CONTENT_HEADER, words.join(" "))
}

/// Paper id → ground-truth decision (e.g. "Accept: poster").
pub fn load_id2decision(data_dir: &Path, conference: &str) -> Result<BTreeMap<u64, String>> {
    let path = data_dir.join(conference).join("id2decision.json");
    let json = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let raw: BTreeMap<String, String> = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    raw.into_iter()
        .map(|(id, decision)| {
            let id = id
                .trim()
                .parse::<u64>()
                .with_context(|| format!("paper id '{}' in {} is not an integer", id, path.display()))?;
            Ok((id, decision))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_truncate_words() {
        assert_eq!(
            truncate_words("one two\nthree  four", 3),
            "Contents of this paper:\n\none two three"
        );
        assert_eq!(truncate_words("", 3), PAPER_CONTENT_HEADER);
    }

    #[test]
    fn test_text_dir_source_reads_and_truncates() {
        let tmp = TempDir::new().unwrap();
        let source = TextDirSource::new(tmp.path(), "ICLR2023", 4);
        let path = source.paper_path(39, "Accept: poster");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "We propose a new method for sparse attention.").unwrap();

        assert_eq!(
            source.paper_text(39, "Accept: poster"),
            "Contents of this paper:\n\nWe propose a new"
        );
        assert_eq!(source.paper_text(40, "Reject"), "");
    }

    #[test]
    fn test_load_id2decision() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("ICLR2023")).unwrap();
        fs::write(
            tmp.path().join("ICLR2023").join("id2decision.json"),
            r#"{"39": "Accept: poster", "7": "Reject"}"#,
        )
        .unwrap();

        let map = load_id2decision(tmp.path(), "ICLR2023").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[&7], "Reject");
        assert!(load_id2decision(tmp.path(), "NeurIPS2023").is_err());
    }
}
