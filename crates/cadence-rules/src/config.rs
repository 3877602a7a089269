use std::collections::{HashMap, HashSet};
use std::path::Path;

use cadence_core::types::{ContactId, Jurisdiction};
use serde::{Deserialize, Serialize};

use crate::error::RuleConfigError;

/// A bare `(month, day)` pair used for AEP slots and date overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthDay {
    pub month: u32,
    pub day: u32,
}

impl MonthDay {
    #[must_use]
    pub fn new(month: u32, day: u32) -> Self {
        Self { month, day }
    }
}

/// Global timing constants (§3), with the defaults named in the spec.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConstants {
    pub birthday_lead_days: i64,
    pub effective_lead_days: i64,
    pub pre_window_exclusion_days: i64,
}

impl Default for TimingConstants {
    fn default() -> Self {
        Self {
            birthday_lead_days: 14,
            effective_lead_days: 30,
            pre_window_exclusion_days: 60,
        }
    }
}

/// Annual Enrollment Period configuration: the ordered slot table and the
/// set of years AEP applies to.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AepConfig {
    pub default_dates: Vec<MonthDay>,
    pub years: HashSet<i32>,
}

impl Default for AepConfig {
    fn default() -> Self {
        Self {
            default_dates: vec![
                MonthDay::new(8, 18),
                MonthDay::new(8, 25),
                MonthDay::new(9, 1),
                MonthDay::new(9, 7),
            ],
            years: HashSet::new(),
        }
    }
}

impl AepConfig {
    #[must_use]
    pub fn applies_to(&self, year: i32) -> bool {
        self.years.contains(&year)
    }
}

/// Per-jurisdiction enrollment rule variant (§3, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateRuleKind {
    Birthday {
        window_before: i64,
        window_after: i64,
        #[serde(default)]
        age_limit: Option<i32>,
        #[serde(default)]
        use_month_start: bool,
    },
    EffectiveDate {
        window_before: i64,
        window_after: i64,
        #[serde(default)]
        age_limit: Option<i32>,
        #[serde(default)]
        use_month_start: bool,
    },
    YearRound,
    /// The neutral fallback for a jurisdiction with no configured
    /// `state_rules` entry: no exclusion window at all, every candidate
    /// schedules freely. Distinct from `YearRound`, which is an explicit
    /// full-year exclusion — an unconfigured jurisdiction is not assumed to
    /// be under an enrollment restriction.
    #[serde(skip)]
    Unrestricted,
}

/// A single jurisdiction's enrollment rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateRule {
    #[serde(flatten)]
    pub kind: StateRuleKind,
}

/// Condition under which a [`PostWindowRule`] override applies: a
/// conjunction over birth-month and jurisdiction membership. An absent
/// clause matches unconditionally.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PostWindowCondition {
    #[serde(default)]
    pub birth_month: Option<u32>,
    #[serde(default)]
    pub states: Option<HashSet<String>>,
}

impl PostWindowCondition {
    #[must_use]
    pub fn matches(&self, birth_month: Option<u32>, jurisdiction: &Jurisdiction) -> bool {
        let birth_ok = match self.birth_month {
            Some(expected) => birth_month == Some(expected),
            None => true,
        };
        let state_ok = match &self.states {
            Some(states) => states.contains(jurisdiction.as_str()),
            None => true,
        };
        birth_ok && state_ok
    }
}

/// One entry of a contact's ordered `post_window_rules` list (§3). The
/// first matching condition wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWindowRule {
    pub condition: PostWindowCondition,
    pub override_date: MonthDay,
}

/// Per-contact overrides (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactOverride {
    pub force_aep: bool,
    pub aep_date_override: Option<MonthDay>,
    pub post_window_rules: Vec<PostWindowRule>,
}

/// Per-state special overrides folded into `global_rules` (§3): an
/// alternate post-window offset and/or a leap-year pivot date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSpecialOverride {
    /// When set, the post-window date is `anchor + post_window_period_days`
    /// instead of `anchor + window_after + 1` (Open Question resolution,
    /// see SPEC_FULL.md §9).
    pub post_window_period_days: Option<i64>,
    /// When the underlying anchor is Feb 29 in a leap year, the post-window
    /// date pivots onto this `(month, day)` for that year only.
    pub leap_year_override: Option<MonthDay>,
}

/// Global rules: the October-birthday AEP override and per-state special
/// overrides (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalRules {
    pub october_birthday_aep: Option<MonthDay>,
    pub state_overrides: HashMap<String, StateSpecialOverride>,
}

/// The complete, read-only-after-load rule document (§3, §6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub timing_constants: TimingConstants,
    pub aep_config: AepConfig,
    pub state_rules: HashMap<String, StateRule>,
    pub contact_rules: HashMap<String, ContactOverride>,
    pub global_rules: GlobalRules,
}

impl RuleConfig {
    /// Loads a [`RuleConfig`] from a JSON or YAML file, dispatching on
    /// extension (`.yml`/`.yaml` vs. everything else).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, RuleConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RuleConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yml" | "yaml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    pub fn from_json(content: &str) -> Result<Self, RuleConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_yaml(content: &str) -> Result<Self, RuleConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    #[must_use]
    pub fn state_rule(&self, jurisdiction: &Jurisdiction) -> Option<&StateRule> {
        self.state_rules.get(jurisdiction.as_str())
    }

    #[must_use]
    pub fn contact_override(&self, contact_id: &ContactId) -> Option<&ContactOverride> {
        self.contact_rules.get(contact_id.as_str())
    }

    #[must_use]
    pub fn state_special_override(&self, jurisdiction: &Jurisdiction) -> Option<&StateSpecialOverride> {
        self.global_rules.state_overrides.get(jurisdiction.as_str())
    }
}
