//! Command-line flags, backend credentials and experiment setting loading.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use arena::participant::PAPER_EXTRACTOR_ID;
use arena::{ExperimentSetting, OutputLayout, ScoringMethod, SettingSpec};
use clap::{Args, ValueEnum};

/// Default Azure OpenAI API version when `OPENAI_API_VERSION` is unset.
pub const DEFAULT_AZURE_API_VERSION: &str = "2023-05-15";

/// Which chat backend the LLM-driven participants use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// api.openai.com, authenticated with `OPENAI_API_KEY`.
    #[value(name = "openai")]
    OpenAi,
    /// Azure OpenAI deployment (`AZURE_OPENAI_KEY`, `AZURE_ENDPOINT`, `AZURE_DEPLOYMENT`).
    #[value(name = "azure-openai")]
    AzureOpenAi,
    /// Offline, deterministic. No API calls.
    Dummy,
}

/// Resolved backend credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    OpenAi {
        api_key: String,
    },
    AzureOpenAi {
        api_key: String,
        endpoint: String,
        deployment: String,
        api_version: String,
    },
    Dummy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub model: String,
}

impl BackendConfig {
    /// Resolve credentials from the process environment.
    pub fn from_env(choice: BackendChoice, model: &str) -> Result<Self> {
        Self::resolve(choice, model, |key| std::env::var(key).ok())
    }

    /// Resolve credentials through `lookup`. A missing credential is an error,
    /// raised before any conversation runs.
    pub fn resolve(
        choice: BackendChoice,
        model: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("missing credential: set {}", key))
        };

        let kind = match choice {
            BackendChoice::OpenAi => BackendKind::OpenAi {
                api_key: required("OPENAI_API_KEY")?,
            },
            BackendChoice::AzureOpenAi => BackendKind::AzureOpenAi {
                api_key: required("AZURE_OPENAI_KEY")?,
                endpoint: azure_endpoint(&required("AZURE_ENDPOINT")?),
                deployment: required("AZURE_DEPLOYMENT")?,
                api_version: lookup("OPENAI_API_VERSION")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.into()),
            },
            BackendChoice::Dummy => BackendKind::Dummy,
        };

        Ok(Self {
            kind,
            model: model.to_string(),
        })
    }
}

/// Bare Azure resource names expand to `https://<name>.openai.azure.com`.
pub fn azure_endpoint(raw: &str) -> String {
    let raw = raw.trim();
    if raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}.openai.azure.com", raw)
    }
}

fn parse_scoring(s: &str) -> std::result::Result<ScoringMethod, String> {
    s.parse::<ScoringMethod>().map_err(|e| e.to_string())
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Conference whose papers are evaluated
    #[arg(long, default_value = "ICLR2023")]
    pub conference: String,

    /// Experiment preset name, or the name given to a `--settings` file
    #[arg(long, default_value = "BASELINE")]
    pub experiment_name: String,

    /// Model name sent to the chat backend
    #[arg(long, default_value = "gpt-4o")]
    pub model_name: String,

    /// How the area chair decides: ranking or recommendation
    #[arg(long, default_value = "ranking", value_parser = parse_scoring)]
    pub ac_scoring_method: ScoringMethod,

    /// Expected number of reviewers per paper; must match the experiment setting
    #[arg(long)]
    pub num_reviewers_per_paper: Option<usize>,

    /// Papers assigned to each area chair in the decision phase
    #[arg(long, default_value_t = 10)]
    pub num_papers_per_area_chair: usize,

    /// Fraction of papers to accept
    #[arg(long, default_value_t = 0.32)]
    pub acceptance_rate: f64,

    /// Paper text is truncated to this many words
    #[arg(long, default_value_t = 16384)]
    pub max_num_words: usize,

    /// Input data directory (paper texts, id2decision.json)
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Where transcripts and decisions are written
    #[arg(long, default_value = "outputs")]
    pub output_dir: PathBuf,

    /// Overwrite existing transcripts
    #[arg(long, default_value_t = false)]
    pub overwrite: bool,

    /// Seed for paper shuffling and acceptance spreading
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Chat backend for LLM-driven participants
    #[arg(long, value_enum, default_value = "openai")]
    pub backend: BackendChoice,

    /// Hand a participant (e.g. "Reviewer 1") to a person at the terminal. Repeatable.
    #[arg(long = "human", value_name = "PARTICIPANT")]
    pub humans: Vec<String>,

    /// TOML file with a custom experiment setting
    #[arg(long)]
    pub settings: Option<PathBuf>,
}

impl RunArgs {
    pub fn layout(&self) -> OutputLayout {
        OutputLayout::new(&self.output_dir, &self.conference, &self.model_name)
    }

    /// The experiment setting, from `--settings` or the named preset.
    pub fn setting(&self) -> Result<ExperimentSetting> {
        let setting = load_setting(&self.experiment_name, self.settings.as_deref())?;
        if let Some(expected) = self.num_reviewers_per_paper {
            if expected != setting.num_reviewers() {
                bail!(
                    "experiment '{}' has {} reviewers but --num-reviewers-per-paper is {}",
                    setting.name,
                    setting.num_reviewers(),
                    expected
                );
            }
        }
        Ok(setting)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.acceptance_rate) {
            bail!("--acceptance-rate must be within [0, 1], got {}", self.acceptance_rate);
        }
        if self.num_papers_per_area_chair == 0 {
            bail!("--num-papers-per-area-chair must be at least 1");
        }
        if self.humans.iter().any(|id| id == PAPER_EXTRACTOR_ID) {
            bail!("--human cannot name the {}, paper text is read from the data directory", PAPER_EXTRACTOR_ID);
        }
        Ok(())
    }
}

/// Load an experiment setting: a TOML file when given, otherwise a preset.
pub fn load_setting(experiment_name: &str, settings_path: Option<&Path>) -> Result<ExperimentSetting> {
    match settings_path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read settings file {}", path.display()))?;
            let spec: SettingSpec = toml::from_str(&text)
                .with_context(|| format!("failed to parse settings file {}", path.display()))?;
            Ok(ExperimentSetting::from_spec(experiment_name, &spec)?)
        }
        None => Ok(ExperimentSetting::preset(experiment_name)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::collections::HashMap;

    #[derive(Parser)]
    struct Cli {
        #[command(flatten)]
        args: RunArgs,
    }

    fn parse(flags: &[&str]) -> RunArgs {
        Cli::try_parse_from(std::iter::once("review-agents").chain(flags.iter().copied()))
            .unwrap()
            .args
    }

    #[test]
    fn test_validate_human_participants() {
        let args = parse(&["--human", "Reviewer 1", "--human", "AC"]);
        assert_eq!(args.humans, vec!["Reviewer 1", "AC"]);
        assert!(args.validate().is_ok());

        let err = parse(&["--human", "Paper Extractor"]).validate().unwrap_err();
        assert!(err.to_string().contains("Paper Extractor"));
    }

    #[test]
    fn test_validate_ranges() {
        assert!(parse(&["--acceptance-rate", "1.5"]).validate().is_err());
        assert!(parse(&["--num-papers-per-area-chair", "0"]).validate().is_err());
    }

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_openai_requires_key() {
        let err = BackendConfig::resolve(BackendChoice::OpenAi, "gpt-4o", env(&[])).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let cfg =
            BackendConfig::resolve(BackendChoice::OpenAi, "gpt-4o", env(&[("OPENAI_API_KEY", "sk")]))
                .unwrap();
        assert_eq!(cfg.kind, BackendKind::OpenAi { api_key: "sk".into() });
    }

    #[test]
    fn test_azure_resolution_expands_endpoint() {
        let cfg = BackendConfig::resolve(
            BackendChoice::AzureOpenAi,
            "gpt-4o",
            env(&[
                ("AZURE_OPENAI_KEY", "k"),
                ("AZURE_ENDPOINT", "myres"),
                ("AZURE_DEPLOYMENT", "dep"),
            ]),
        )
        .unwrap();
        assert_eq!(
            cfg.kind,
            BackendKind::AzureOpenAi {
                api_key: "k".into(),
                endpoint: "https://myres.openai.azure.com".into(),
                deployment: "dep".into(),
                api_version: DEFAULT_AZURE_API_VERSION.into(),
            }
        );

        let err = BackendConfig::resolve(
            BackendChoice::AzureOpenAi,
            "gpt-4o",
            env(&[("AZURE_OPENAI_KEY", "k"), ("AZURE_ENDPOINT", "myres")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("AZURE_DEPLOYMENT"));
    }

    #[test]
    fn test_dummy_needs_nothing() {
        let cfg = BackendConfig::resolve(BackendChoice::Dummy, "dummy", env(&[])).unwrap();
        assert_eq!(cfg.kind, BackendKind::Dummy);
    }

    #[test]
    fn test_azure_endpoint_keeps_full_urls() {
        assert_eq!(
            azure_endpoint("https://x.openai.azure.com"),
            "https://x.openai.azure.com"
        );
        assert_eq!(azure_endpoint(" x "), "https://x.openai.azure.com");
    }

    #[test]
    fn test_load_setting_from_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
AC = ["conformist"]
reviewer = ["malicious", "BASELINE"]

[global_settings]
provides_numeric_rating = ["reviewer", "ac"]
"#,
        )
        .unwrap();

        let setting = load_setting("custom_ACx1", Some(&path)).unwrap();
        assert_eq!(setting.name, "custom_ACx1");
        assert_eq!(setting.num_reviewers(), 2);
        assert_eq!(setting.ac, vec![arena::AcVariant::Conformist]);
        assert_eq!(setting.reviewers[0].label(), "malicious");
    }

    #[test]
    fn test_load_setting_rejects_unknown_trait() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "AC = [\"BASELINE\"]\nreviewer = [\"grumpy\"]\n").unwrap();
        assert!(load_setting("bad", Some(&path)).is_err());
        assert!(load_setting("no_such_preset", None).is_err());
    }
}
