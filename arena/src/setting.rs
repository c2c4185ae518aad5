//! Experiment settings: participant variants and global flags.
//!
//! A setting is written as a small spec (`SettingSpec`) naming each
//! participant's traits as strings, either from the built-in presets or from
//! a user TOML file, and resolved once into a typed `ExperimentSetting`.
//! Unknown trait or variant names are configuration errors.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ArenaError, ArenaResult};
use crate::participant::Role;

/// Area chair behavioral variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcVariant {
    /// No characteristics specified; sees everything like an inclusive AC.
    #[serde(rename = "BASELINE")]
    Baseline,
    #[serde(rename = "inclusive")]
    Inclusive,
    #[serde(rename = "conformist")]
    Conformist,
    #[serde(rename = "authoritarian")]
    Authoritarian,
}

impl FromStr for AcVariant {
    type Err = ArenaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BASELINE" => Ok(Self::Baseline),
            "inclusive" => Ok(Self::Inclusive),
            "conformist" => Ok(Self::Conformist),
            "authoritarian" => Ok(Self::Authoritarian),
            other => Err(ArenaError::config(format!(
                "unknown area chair type: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for AcVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Baseline => write!(f, "BASELINE"),
            Self::Inclusive => write!(f, "inclusive"),
            Self::Conformist => write!(f, "conformist"),
            Self::Authoritarian => write!(f, "authoritarian"),
        }
    }
}

/// Whether a reviewer believes the authors are well known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorFame {
    Famous,
    Unfamous,
}

/// Reviewer behavioral traits. `None` means the trait is left unspecified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewerProfile {
    pub benign: Option<bool>,
    pub knowledgeable: Option<bool>,
    pub responsible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub knows_authors: Option<AuthorFame>,
    pub provides_numeric_rating: bool,
}

impl Default for ReviewerProfile {
    fn default() -> Self {
        Self {
            benign: None,
            knowledgeable: None,
            responsible: None,
            knows_authors: None,
            provides_numeric_rating: true,
        }
    }
}

impl ReviewerProfile {
    /// Parse a reviewer type such as `"BASELINE"`, `"malicious"` or
    /// `"malicious irresponsible"`.
    pub fn parse(reviewer_type: &str) -> ArenaResult<Self> {
        let mut profile = Self::default();
        for token in reviewer_type.split_whitespace() {
            match token {
                "BASELINE" => {}
                "benign" => profile.benign = Some(true),
                "malicious" => profile.benign = Some(false),
                "knowledgeable" => profile.knowledgeable = Some(true),
                "unknowledgeable" => profile.knowledgeable = Some(false),
                "responsible" => profile.responsible = Some(true),
                "irresponsible" => profile.responsible = Some(false),
                "authors_are_famous" => profile.knows_authors = Some(AuthorFame::Famous),
                "authors_are_unfamous" => profile.knows_authors = Some(AuthorFame::Unfamous),
                "NoOverallScore" => profile.provides_numeric_rating = false,
                other => {
                    return Err(ArenaError::config(format!(
                        "unknown reviewer trait '{}' in reviewer type '{}'",
                        other, reviewer_type
                    )))
                }
            }
        }
        Ok(profile)
    }

    /// Short type name, checked in the order intention, knowledge, commitment.
    pub fn label(&self) -> &'static str {
        match (self.benign, self.knowledgeable, self.responsible) {
            (Some(true), _, _) => "benign",
            (Some(false), _, _) => "malicious",
            (None, Some(true), _) => "knowledgeable",
            (None, Some(false), _) => "unknowledgeable",
            (None, None, Some(true)) => "responsible",
            (None, None, Some(false)) => "irresponsible",
            (None, None, None) => {
                if !self.provides_numeric_rating {
                    "NoOverallScore"
                } else {
                    match self.knows_authors {
                        Some(AuthorFame::Famous) => "authors_are_famous",
                        Some(AuthorFame::Unfamous) => "authors_are_unfamous",
                        None => "BASELINE",
                    }
                }
            }
        }
    }

    /// Whether any behavioral trait is specified.
    pub fn has_biography(&self) -> bool {
        self.benign.is_some() || self.knowledgeable.is_some() || self.responsible.is_some()
    }
}

/// Flags that apply across participants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Roles (`"reviewer"`, `"ac"`) asked for a numeric rating.
    #[serde(default)]
    pub provides_numeric_rating: Vec<String>,
    /// Roles that know the authors' identities.
    #[serde(default)]
    pub persons_aware_of_authors_identities: Vec<String>,
}

impl GlobalSettings {
    fn role_key(role: Role) -> &'static str {
        match role {
            Role::Reviewer => "reviewer",
            Role::AreaChair => "ac",
            Role::Author => "author",
            Role::PaperExtractor => "paper_extractor",
            Role::Moderator => "moderator",
        }
    }

    pub fn numeric_rating_for(&self, role: Role) -> bool {
        let key = Self::role_key(role);
        self.provides_numeric_rating.iter().any(|r| r == key)
    }

    pub fn aware_of_authors(&self, role: Role) -> bool {
        let key = Self::role_key(role);
        self.persons_aware_of_authors_identities
            .iter()
            .any(|r| r == key)
    }
}

/// Unresolved setting as written in presets and TOML files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingSpec {
    #[serde(rename = "AC")]
    pub ac: Vec<String>,
    pub reviewer: Vec<String>,
    #[serde(default = "default_author")]
    pub author: Vec<String>,
    #[serde(default)]
    pub global_settings: GlobalSettings,
}

fn default_author() -> Vec<String> {
    vec!["BASELINE".to_string()]
}

/// Resolved experiment configuration. Read-only during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSetting {
    /// Experiment name, e.g. `"malicious_Rx1"`.
    pub name: String,
    /// Area chair variants; one AC per conversation.
    pub ac: Vec<AcVariant>,
    /// One profile per reviewer, in reviewer-index order.
    pub reviewers: Vec<ReviewerProfile>,
    pub global_settings: GlobalSettings,
}

/// Names of the built-in experiment presets.
pub const PRESET_NAMES: &[&str] = &[
    "BASELINE",
    "benign_Rx1",
    "malicious_Rx1",
    "malicious_Rx2",
    "malicious_Rx3",
    "knowledgeable_Rx1",
    "unknowledgeable_Rx1",
    "responsible_Rx1",
    "irresponsible_Rx1",
    "irresponsible_Rx2",
    "irresponsible_Rx3",
    "conformist_ACx1",
    "authoritarian_ACx1",
    "inclusive_ACx1",
    "no_numeric_ratings",
    "malicious_and_irresponsible_Rx1",
    "authors_are_famous_Rx1",
    "authors_are_famous_Rx2",
    "authors_are_famous_Rx3",
];

impl ExperimentSetting {
    /// Resolve a spec into a typed setting.
    pub fn from_spec(name: &str, spec: &SettingSpec) -> ArenaResult<Self> {
        let ac = spec
            .ac
            .iter()
            .map(|s| s.parse())
            .collect::<ArenaResult<Vec<AcVariant>>>()?;
        if ac.is_empty() {
            return Err(ArenaError::config("experiment setting needs an area chair"));
        }

        let reviewer_rates = spec
            .global_settings
            .numeric_rating_for(Role::Reviewer);
        let reviewers = spec
            .reviewer
            .iter()
            .map(|t| {
                let mut profile = ReviewerProfile::parse(t)?;
                profile.provides_numeric_rating &= reviewer_rates;
                Ok(profile)
            })
            .collect::<ArenaResult<Vec<_>>>()?;
        if reviewers.is_empty() {
            return Err(ArenaError::config("experiment setting needs at least one reviewer"));
        }

        Ok(Self {
            name: name.to_string(),
            ac,
            reviewers,
            global_settings: spec.global_settings.clone(),
        })
    }

    /// Built-in preset by experiment name.
    pub fn preset(name: &str) -> ArenaResult<Self> {
        let spec = preset_spec(name).ok_or_else(|| {
            ArenaError::config(format!(
                "unknown experiment '{}' (known: {})",
                name,
                PRESET_NAMES.join(", ")
            ))
        })?;
        Self::from_spec(name, &spec)
    }

    /// The conversation's area chair variant.
    pub fn area_chair(&self) -> ArenaResult<AcVariant> {
        self.ac
            .first()
            .copied()
            .ok_or_else(|| ArenaError::config("experiment setting has no area chair"))
    }

    pub fn num_reviewers(&self) -> usize {
        self.reviewers.len()
    }

    /// Which participant is under test, derived from the experiment name.
    pub fn player_to_test(&self) -> Option<Role> {
        if self.name.contains("Rx") {
            Some(Role::Reviewer)
        } else if self.name.contains("ACx") {
            Some(Role::AreaChair)
        } else {
            None
        }
    }
}

fn preset_spec(name: &str) -> Option<SettingSpec> {
    let numeric = vec!["reviewer".to_string(), "ac".to_string()];
    let spec = |ac: &str, reviewer: &[&str], numeric_rating: Vec<String>| SettingSpec {
        ac: vec![ac.to_string()],
        reviewer: reviewer.iter().map(|s| s.to_string()).collect(),
        author: default_author(),
        global_settings: GlobalSettings {
            provides_numeric_rating: numeric_rating,
            persons_aware_of_authors_identities: Vec::new(),
        },
    };
    let b = "BASELINE";

    let spec = match name {
        "BASELINE" => spec(b, &[b, b, b], numeric),
        "benign_Rx1" => spec(b, &["benign", b, b], numeric),
        "malicious_Rx1" => spec(b, &["malicious", b, b], numeric),
        "malicious_Rx2" => spec(b, &["malicious", "malicious", b], numeric),
        "malicious_Rx3" => spec(b, &["malicious", "malicious", "malicious"], numeric),
        "knowledgeable_Rx1" => spec(b, &["knowledgeable", b, b], numeric),
        "unknowledgeable_Rx1" => spec(b, &["unknowledgeable", b, b], numeric),
        "responsible_Rx1" => spec(b, &["responsible", b, b], numeric),
        "irresponsible_Rx1" => spec(b, &["irresponsible", b, b], numeric),
        "irresponsible_Rx2" => spec(b, &["irresponsible", "irresponsible", b], numeric),
        "irresponsible_Rx3" => spec(
            b,
            &["irresponsible", "irresponsible", "irresponsible"],
            numeric,
        ),
        "conformist_ACx1" => spec("conformist", &[b, b, b], numeric),
        "authoritarian_ACx1" => spec("authoritarian", &[b, b, b], numeric),
        "inclusive_ACx1" => spec("inclusive", &[b, b, b], numeric),
        "no_numeric_ratings" => spec(b, &[b], Vec::new()),
        "malicious_and_irresponsible_Rx1" => {
            spec(b, &["malicious irresponsible", b, b], numeric)
        }
        "authors_are_famous_Rx1" => spec(b, &["authors_are_famous", b, b], numeric),
        "authors_are_famous_Rx2" => spec(
            b,
            &["authors_are_famous", "authors_are_famous", b],
            numeric,
        ),
        "authors_are_famous_Rx3" => spec(
            b,
            &[
                "authors_are_famous",
                "authors_are_famous",
                "authors_are_famous",
            ],
            numeric,
        ),
        _ => return None,
    };
    Some(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_preset_resolves() {
        for name in PRESET_NAMES {
            let setting = ExperimentSetting::preset(name).unwrap();
            assert_eq!(setting.name, *name);
            assert!(!setting.reviewers.is_empty());
        }
    }

    #[test]
    fn test_unknown_preset_is_config_error() {
        let err = ExperimentSetting::preset("chaotic_Rx9").unwrap_err();
        assert!(matches!(err, ArenaError::Config(_)));
    }

    #[test]
    fn test_unknown_ac_variant_is_config_error() {
        let err = "tyrannical".parse::<AcVariant>().unwrap_err();
        assert!(err.to_string().contains("tyrannical"));
    }

    #[test]
    fn test_reviewer_type_parsing() {
        let p = ReviewerProfile::parse("malicious irresponsible").unwrap();
        assert_eq!(p.benign, Some(false));
        assert_eq!(p.responsible, Some(false));
        assert_eq!(p.knowledgeable, None);

        let p = ReviewerProfile::parse("unknowledgeable").unwrap();
        assert_eq!(p.knowledgeable, Some(false));
        assert_eq!(p.label(), "unknowledgeable");

        assert!(ReviewerProfile::parse("grumpy").is_err());
    }

    #[test]
    fn test_reviewer_labels() {
        assert_eq!(ReviewerProfile::parse("benign").unwrap().label(), "benign");
        assert_eq!(ReviewerProfile::parse("BASELINE").unwrap().label(), "BASELINE");
        assert_eq!(
            ReviewerProfile::parse("authors_are_famous").unwrap().label(),
            "authors_are_famous"
        );
        assert_eq!(
            ReviewerProfile::parse("NoOverallScore").unwrap().label(),
            "NoOverallScore"
        );
    }

    #[test]
    fn test_numeric_rating_flag_follows_global_settings() {
        let setting = ExperimentSetting::preset("no_numeric_ratings").unwrap();
        assert!(!setting.reviewers[0].provides_numeric_rating);
        assert!(!setting.global_settings.numeric_rating_for(Role::AreaChair));

        let setting = ExperimentSetting::preset("BASELINE").unwrap();
        assert!(setting.reviewers.iter().all(|r| r.provides_numeric_rating));
        assert!(setting.global_settings.numeric_rating_for(Role::AreaChair));
    }

    #[test]
    fn test_player_to_test() {
        let r = ExperimentSetting::preset("malicious_Rx2").unwrap();
        assert_eq!(r.player_to_test(), Some(Role::Reviewer));
        let ac = ExperimentSetting::preset("conformist_ACx1").unwrap();
        assert_eq!(ac.player_to_test(), Some(Role::AreaChair));
        assert_eq!(ac.area_chair().unwrap(), AcVariant::Conformist);
        let base = ExperimentSetting::preset("BASELINE").unwrap();
        assert_eq!(base.player_to_test(), None);
    }

    #[test]
    fn test_setting_serializes_variant_names() {
        let setting = ExperimentSetting::preset("authoritarian_ACx1").unwrap();
        let json = serde_json::to_value(&setting).unwrap();
        assert_eq!(json["ac"][0], "authoritarian");
        let back: ExperimentSetting = serde_json::from_value(json).unwrap();
        assert_eq!(back, setting);
    }
}
