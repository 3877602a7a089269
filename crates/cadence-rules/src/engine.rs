use cadence_core::{Contact, Jurisdiction};
use tracing::warn;

use crate::config::{
    ContactOverride, MonthDay, PostWindowRule, RuleConfig, StateRuleKind, TimingConstants,
};
use crate::hash::slot_for;

/// The fully-resolved rule set for a single contact: every layer of
/// `RuleConfig` (global defaults, state rule, per-state special override,
/// per-contact override) folded into one flat view that the scheduling
/// engine can consume without re-touching the document.
#[derive(Debug, Clone)]
pub struct EffectiveRules {
    pub jurisdiction: Option<Jurisdiction>,
    /// The contact's enrollment window kind. Falls back to `Unrestricted`
    /// when the jurisdiction has no configured state rule (or the contact
    /// has none at all), so a missing configuration never silently excludes
    /// a contact the way an explicit `YearRound` rule does.
    pub kind: StateRuleKind,
    pub timing: TimingConstants,
    /// The single AEP slot resolved for this contact (§4.2): a
    /// `ContactOverride::aep_date_override` wins outright; otherwise a birth
    /// month of October substitutes `global_rules.october_birthday_aep`;
    /// otherwise a stable hash of the contact id picks one slot from
    /// `aep_config.default_dates`. `None` when the slot table is empty.
    pub aep_slot: Option<MonthDay>,
    pub aep_years: std::collections::HashSet<i32>,
    pub force_aep: bool,
    /// Ordered contact-specific post-window overrides; first matching
    /// condition wins (§3).
    pub post_window_rules: Vec<PostWindowRule>,
    /// State-level post-window offset override, when configured (Open
    /// Question resolution: `anchor + post_window_period_days` replaces
    /// `anchor + window_after + 1` when present).
    pub post_window_period_days: Option<i64>,
    pub leap_year_override: Option<MonthDay>,
}

impl EffectiveRules {
    #[must_use]
    pub fn is_year_round(&self) -> bool {
        matches!(self.kind, StateRuleKind::YearRound)
    }
}

/// Resolves the layered [`RuleConfig`] document into an [`EffectiveRules`]
/// view for one contact at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContactRuleEngine;

impl ContactRuleEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Resolves every rule layer for `contact` against `config`.
    #[must_use]
    pub fn resolve(&self, contact: &Contact, config: &RuleConfig) -> EffectiveRules {
        let jurisdiction = contact.resolved_jurisdiction();

        let state_rule = jurisdiction.as_ref().and_then(|j| config.state_rule(j));
        if state_rule.is_none() {
            warn!(
                contact_id = %contact.id,
                jurisdiction = jurisdiction.as_ref().map(Jurisdiction::as_str).unwrap_or("<none>"),
                "no state rule configured for jurisdiction, falling back to unrestricted scheduling"
            );
        }
        let kind = state_rule.map(|rule| rule.kind.clone()).unwrap_or(StateRuleKind::Unrestricted);

        let special_override = jurisdiction
            .as_ref()
            .and_then(|j| config.state_special_override(j));

        let contact_override: Option<&ContactOverride> =
            config.contact_override(&contact.id);

        let birth_month = contact.birth_date.map(|d| chrono::Datelike::month(&d));

        let aep_slot = contact_override
            .and_then(|o| o.aep_date_override)
            .or_else(|| {
                if birth_month == Some(10) {
                    config.global_rules.october_birthday_aep
                } else {
                    None
                }
            })
            .or_else(|| {
                let table = &config.aep_config.default_dates;
                if table.is_empty() {
                    None
                } else {
                    Some(table[slot_for(contact.id.as_str(), table.len())])
                }
            });

        let force_aep = contact_override.map(|o| o.force_aep).unwrap_or(false);

        let post_window_rules = contact_override
            .map(|o| o.post_window_rules.clone())
            .unwrap_or_default();

        EffectiveRules {
            jurisdiction,
            kind,
            timing: config.timing_constants,
            aep_slot,
            aep_years: config.aep_config.years.clone(),
            force_aep,
            post_window_rules,
            post_window_period_days: special_override.and_then(|o| o.post_window_period_days),
            leap_year_override: special_override.and_then(|o| o.leap_year_override),
        }
    }
}
