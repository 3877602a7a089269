use cadence_core::calendar::{add_days, age_on, anniversary_in, is_leap_year, month_start, years_touched};
use cadence_core::{Contact, Intent, IntentKind};
use cadence_rules::{EffectiveRules, StateRuleKind};
use chrono::{Datelike, NaiveDate};

use crate::error::SchedulerError;

/// One calendar year's resolved exclusion window for a contact (§4.3 Step
/// 2), or the absence of one.
#[derive(Debug, Clone, Copy)]
enum YearWindow {
    /// A birthday- or effective-date-anchored window is active this year.
    Active {
        anchor: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// The jurisdiction is `YearRound`: the entire calendar year is an
    /// exclusion window and every candidate in it is skipped.
    YearRound { start: NaiveDate, end: NaiveDate },
    /// No window applies this year: the anchor date is absent on the
    /// contact, or `age_limit` suppresses the window.
    None,
}

impl YearWindow {
    fn contains(self, date: NaiveDate) -> bool {
        match self {
            Self::Active { start, end, .. } | Self::YearRound { start, end } => {
                date >= start && date <= end
            }
            Self::None => false,
        }
    }
}

/// Produces the set of candidate [`Intent`]s for one contact over a
/// scheduling window (§4.3).
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulingEngine;

impl SchedulingEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Schedules every intent kind for `contact` between `window_start` and
    /// `window_end` (inclusive), returning `(scheduled, skipped)`, each
    /// sorted by [`Intent::sort_key`].
    pub fn schedule(
        &self,
        contact: &Contact,
        rules: &EffectiveRules,
        window_start: NaiveDate,
        window_end: NaiveDate,
    ) -> Result<(Vec<Intent>, Vec<Intent>), SchedulerError> {
        if window_start > window_end {
            return Err(SchedulerError::InvertedWindow {
                start: window_start,
                end: window_end,
            });
        }

        let mut scheduled = Vec::new();
        let mut skipped = Vec::new();

        if contact.validate_anchors().is_err() {
            skipped.push(Intent::skipped(
                contact.id.clone(),
                IntentKind::Birthday,
                window_start,
                None,
                "missing anchor dates",
            ));
            return Ok((scheduled, skipped));
        }

        for year in years_touched(window_start, window_end) {
            let window = self.year_window(contact, rules, year);

            self.candidate_anchor_intents(
                contact,
                rules,
                year,
                window,
                window_start,
                window_end,
                &mut scheduled,
                &mut skipped,
            );
            self.candidate_aep_intent(
                contact,
                rules,
                year,
                window,
                window_start,
                window_end,
                &mut scheduled,
                &mut skipped,
            );
            self.candidate_post_window_intent(
                contact,
                rules,
                year,
                window,
                window_start,
                window_end,
                &mut scheduled,
                &mut skipped,
            );
        }

        scheduled.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        skipped.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));

        Ok((scheduled, skipped))
    }

    /// Resolves this contact's exclusion window for `year` (§4.3 Step 2):
    /// `YearRound` jurisdictions exclude the whole calendar year outright;
    /// `Birthday` and `EffectiveDate` jurisdictions build
    /// `[anchor - window_before, anchor + window_after]` around their
    /// respective anniversary, snapped to month-start when configured, and
    /// suppressed entirely once the contact's age at window start reaches
    /// `age_limit`.
    fn year_window(&self, contact: &Contact, rules: &EffectiveRules, year: i32) -> YearWindow {
        match &rules.kind {
            StateRuleKind::YearRound => YearWindow::YearRound {
                start: NaiveDate::from_ymd_opt(year, 1, 1).expect("valid year start"),
                end: NaiveDate::from_ymd_opt(year, 12, 31).expect("valid year end"),
            },
            StateRuleKind::Birthday {
                window_before,
                window_after,
                age_limit,
                use_month_start,
            } => build_window(
                contact,
                rules,
                contact.birth_date,
                year,
                *window_before,
                *window_after,
                *age_limit,
                *use_month_start,
            ),
            StateRuleKind::EffectiveDate {
                window_before,
                window_after,
                age_limit,
                use_month_start,
            } => build_window(
                contact,
                rules,
                contact.effective_date,
                year,
                *window_before,
                *window_after,
                *age_limit,
                *use_month_start,
            ),
            StateRuleKind::Unrestricted => YearWindow::None,
        }
    }

    /// Step 1/2/4 of §4.3 for the two lead-time intent kinds: proposes a
    /// Birthday and/or EffectiveDate candidate and classifies each against
    /// this year's exclusion window, including the pre-window exclusion
    /// prefix that applies only to these lead messages.
    #[allow(clippy::too_many_arguments)]
    fn candidate_anchor_intents(
        &self,
        contact: &Contact,
        rules: &EffectiveRules,
        year: i32,
        window: YearWindow,
        window_start: NaiveDate,
        window_end: NaiveDate,
        scheduled: &mut Vec<Intent>,
        skipped: &mut Vec<Intent>,
    ) {
        let anchors: [(IntentKind, Option<NaiveDate>, i64); 2] = [
            (IntentKind::Birthday, contact.birth_date, rules.timing.birthday_lead_days),
            (
                IntentKind::EffectiveDate,
                contact.effective_date,
                rules.timing.effective_lead_days,
            ),
        ];

        for (kind, anchor, lead_days) in anchors {
            let Some(anchor) = anchor else { continue };

            let anniversary = anniversary_in(year, anchor);
            let target_date = add_days(anniversary, -lead_days);
            if target_date < window_start || target_date > window_end {
                continue;
            }

            self.classify(
                contact,
                rules,
                kind,
                target_date,
                Some(anniversary),
                true,
                window,
                scheduled,
                skipped,
            );
        }
    }

    /// Step 1/4 of §4.3: one AEP candidate at the contact's resolved slot, in
    /// any configured AEP year. `YearRound` jurisdictions exclude it like
    /// every other candidate, via `classify`'s year-round arm.
    #[allow(clippy::too_many_arguments)]
    fn candidate_aep_intent(
        &self,
        contact: &Contact,
        rules: &EffectiveRules,
        year: i32,
        window: YearWindow,
        window_start: NaiveDate,
        window_end: NaiveDate,
        scheduled: &mut Vec<Intent>,
        skipped: &mut Vec<Intent>,
    ) {
        let Some(slot) = rules.aep_slot else { return };
        if !rules.aep_years.contains(&year) {
            return;
        }
        let Some(target_date) = NaiveDate::from_ymd_opt(year, slot.month, slot.day) else {
            return;
        };
        if target_date < window_start || target_date > window_end {
            return;
        }

        self.classify(
            contact,
            rules,
            IntentKind::Aep,
            target_date,
            None,
            false,
            window,
            scheduled,
            skipped,
        );
    }

    /// Step 3/4 of §4.3: the follow-up message generated once a non-suppressed
    /// exclusion window closes, subject to `post_window_period_days`,
    /// `leap_year_override`, and the contact's own `post_window_rules`.
    #[allow(clippy::too_many_arguments)]
    fn candidate_post_window_intent(
        &self,
        contact: &Contact,
        rules: &EffectiveRules,
        year: i32,
        window: YearWindow,
        window_start: NaiveDate,
        window_end: NaiveDate,
        scheduled: &mut Vec<Intent>,
        skipped: &mut Vec<Intent>,
    ) {
        let YearWindow::Active { anchor, end, .. } = window else {
            return;
        };
        let Some(original_anchor) = relevant_anchor(contact, &rules.kind) else {
            return;
        };

        let window_after = cadence_core::calendar::days_between(anchor, end);
        let mut post_window_date = if let Some(offset) = rules.post_window_period_days {
            add_days(anchor, offset)
        } else {
            add_days(anchor, window_after + 1)
        };

        if original_anchor.month() == 2 && original_anchor.day() == 29 && is_leap_year(year) {
            if let Some(pivot) = rules.leap_year_override {
                if let Some(date) = NaiveDate::from_ymd_opt(year, pivot.month, pivot.day) {
                    post_window_date = date;
                }
            }
        }

        post_window_date = apply_contact_post_window_rule(contact, rules, post_window_date, year);

        if post_window_date < window_start || post_window_date > window_end {
            return;
        }

        self.classify(
            contact,
            rules,
            IntentKind::PostWindow,
            post_window_date,
            Some(anchor),
            false,
            window,
            scheduled,
            skipped,
        );
    }

    /// Step 4 of §4.3, shared by every candidate kind: applies the
    /// exclusion-window overlap check (with `force_aep` bypassing it for AEP
    /// candidates only) and the pre-window exclusion prefix that applies
    /// only to lead messages. `YearRound` jurisdictions skip every candidate
    /// unconditionally, with no `force_aep` bypass. A `YearWindow::None`
    /// always schedules.
    #[allow(clippy::too_many_arguments)]
    fn classify(
        &self,
        contact: &Contact,
        rules: &EffectiveRules,
        kind: IntentKind,
        target_date: NaiveDate,
        default_date: Option<NaiveDate>,
        is_lead_message: bool,
        window: YearWindow,
        scheduled: &mut Vec<Intent>,
        skipped: &mut Vec<Intent>,
    ) {
        match window {
            YearWindow::YearRound { .. } => {
                skipped.push(Intent::skipped(
                    contact.id.clone(),
                    kind,
                    target_date,
                    default_date,
                    "year-round enrollment state",
                ));
            }
            YearWindow::Active { anchor, start, .. } if window.contains(target_date) => {
                if kind == IntentKind::Aep && rules.force_aep {
                    scheduled.push(Intent::scheduled(contact.id.clone(), kind, target_date, default_date));
                    return;
                }
                let reason = if kind == IntentKind::Aep {
                    "AEP suppressed by exclusion window".to_owned()
                } else {
                    format!(
                        "inside exclusion window of kind {} (anchor={anchor})",
                        state_rule_label(&rules.kind)
                    )
                };
                let _ = start;
                skipped.push(Intent::skipped(contact.id.clone(), kind, target_date, default_date, reason));
            }
            YearWindow::Active { start, .. } if is_lead_message && target_date < start => {
                let prefix_start = add_days(start, -rules.timing.pre_window_exclusion_days);
                if target_date >= prefix_start {
                    skipped.push(Intent::skipped(
                        contact.id.clone(),
                        kind,
                        target_date,
                        default_date,
                        "within pre-window exclusion",
                    ));
                    return;
                }
                scheduled.push(Intent::scheduled(contact.id.clone(), kind, target_date, default_date));
            }
            _ => {
                scheduled.push(Intent::scheduled(contact.id.clone(), kind, target_date, default_date));
            }
        }
    }
}

/// Builds this year's exclusion window for a `Birthday`/`EffectiveDate`
/// jurisdiction, or `YearWindow::None` if the contact lacks the relevant
/// anchor or the window is suppressed by `age_limit` (age measured from the
/// contact's birth date, evaluated at window start).
#[allow(clippy::too_many_arguments)]
fn build_window(
    contact: &Contact,
    _rules: &EffectiveRules,
    anchor: Option<NaiveDate>,
    year: i32,
    window_before: i64,
    window_after: i64,
    age_limit: Option<i32>,
    use_month_start: bool,
) -> YearWindow {
    let Some(anchor) = anchor else { return YearWindow::None };

    let anniversary = anniversary_in(year, anchor);
    let anchor_this_year = if use_month_start { month_start(anniversary) } else { anniversary };
    let start = add_days(anchor_this_year, -window_before);

    if let Some(limit) = age_limit {
        if let Some(birth) = contact.birth_date {
            if age_on(birth, start) >= limit {
                return YearWindow::None;
            }
        }
    }

    let end = add_days(anchor_this_year, window_after);
    YearWindow::Active {
        anchor: anchor_this_year,
        start,
        end,
    }
}

/// Picks the anchor date relevant to a state rule kind: the contact's
/// birth date for `Birthday` rules, effective date for `EffectiveDate`
/// rules, `None` for `YearRound`/`Unrestricted` (neither has a window to
/// close, so no post-window candidate is ever proposed for them).
fn relevant_anchor(contact: &Contact, kind: &StateRuleKind) -> Option<NaiveDate> {
    match kind {
        StateRuleKind::Birthday { .. } => contact.birth_date,
        StateRuleKind::EffectiveDate { .. } => contact.effective_date,
        StateRuleKind::YearRound | StateRuleKind::Unrestricted => None,
    }
}

fn state_rule_label(kind: &StateRuleKind) -> &'static str {
    match kind {
        StateRuleKind::Birthday { .. } => "Birthday",
        StateRuleKind::EffectiveDate { .. } => "EffectiveDate",
        StateRuleKind::YearRound => "YearRound",
        StateRuleKind::Unrestricted => "Unrestricted",
    }
}

/// Applies the first matching contact-level `post_window_rules` entry,
/// replacing the computed date's month/day for `year` (§3). Takes
/// precedence over `leap_year_override` and the state's default formula,
/// as the most specific layer of override (§9 Open Questions).
fn apply_contact_post_window_rule(
    contact: &Contact,
    rules: &EffectiveRules,
    computed: NaiveDate,
    year: i32,
) -> NaiveDate {
    let Some(jurisdiction) = &rules.jurisdiction else {
        return computed;
    };
    let birth_month = contact.birth_date.map(|d| d.month());

    for rule in &rules.post_window_rules {
        if rule.condition.matches(birth_month, jurisdiction) {
            if let Some(date) = NaiveDate::from_ymd_opt(year, rule.override_date.month, rule.override_date.day) {
                return date;
            }
        }
    }
    computed
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{ContactId, Jurisdiction, OrgId};
    use cadence_rules::{ContactRuleEngine, MonthDay, RuleConfig, StateRule, StateSpecialOverride};

    fn d(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contact(jurisdiction: &str, birth: Option<NaiveDate>, effective: Option<NaiveDate>) -> Contact {
        Contact {
            id: ContactId::from("c-1"),
            org_id: OrgId::new(1),
            first_name: None,
            last_name: None,
            email: "a@example.com".into(),
            jurisdiction: Some(Jurisdiction::new(jurisdiction)),
            zip_code: None,
            birth_date: birth,
            effective_date: effective,
        }
    }

    #[test]
    fn birthday_intent_lands_lead_days_before_anniversary() {
        let cfg = RuleConfig::default();
        let contact = contact("ZZ", Some(d(1960, 6, 15)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, _) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        let birthday = scheduled.iter().find(|i| i.kind == IntentKind::Birthday).unwrap();
        assert_eq!(birthday.target_date, d(2024, 6, 1));
    }

    #[test]
    fn aep_inside_birthday_window_is_skipped_unless_forced() {
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert(
            "CA".into(),
            StateRule {
                kind: cadence_rules::StateRuleKind::Birthday {
                    window_before: 30,
                    window_after: 30,
                    age_limit: None,
                    use_month_start: false,
                },
            },
        );
        cfg.aep_config.years.insert(2024);
        cfg.aep_config.default_dates = vec![MonthDay::new(8, 18)];

        let contact = contact("CA", Some(d(1960, 8, 20)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, skipped) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        assert!(!scheduled.iter().any(|i| i.kind == IntentKind::Aep));
        let aep_skip = skipped.iter().find(|i| i.kind == IntentKind::Aep).unwrap();
        assert!(matches!(&aep_skip.status, cadence_core::IntentStatus::Skipped { reason } if reason == "AEP suppressed by exclusion window"));
    }

    #[test]
    fn force_aep_bypasses_exclusion_window() {
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert(
            "CA".into(),
            StateRule {
                kind: StateRuleKind::Birthday {
                    window_before: 30,
                    window_after: 30,
                    age_limit: None,
                    use_month_start: false,
                },
            },
        );
        cfg.aep_config.years.insert(2024);
        cfg.aep_config.default_dates = vec![MonthDay::new(8, 18)];
        cfg.contact_rules.insert(
            "c-1".into(),
            cadence_rules::ContactOverride {
                force_aep: true,
                ..Default::default()
            },
        );

        let contact = contact("CA", Some(d(1960, 8, 20)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, _) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        assert!(scheduled.iter().any(|i| i.kind == IntentKind::Aep));
    }

    #[test]
    fn year_round_state_skips_every_kind_with_named_reason() {
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert("CT".into(), StateRule { kind: StateRuleKind::YearRound });
        cfg.aep_config.years.insert(2024);
        cfg.aep_config.default_dates = vec![MonthDay::new(8, 18)];

        let contact = contact("CT", Some(d(1960, 8, 20)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, skipped) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        assert!(scheduled.is_empty());
        assert!(skipped.iter().any(|i| i.kind == IntentKind::Aep));
        assert!(skipped.iter().any(|i| i.kind == IntentKind::Birthday));
        assert!(skipped.iter().all(|i| matches!(
            &i.status,
            cadence_core::IntentStatus::Skipped { reason } if reason == "year-round enrollment state"
        )));
    }

    #[test]
    fn year_round_state_ignores_force_aep() {
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert("CT".into(), StateRule { kind: StateRuleKind::YearRound });
        cfg.aep_config.years.insert(2024);
        cfg.aep_config.default_dates = vec![MonthDay::new(8, 18)];
        cfg.contact_rules.insert(
            "c-1".into(),
            cadence_rules::ContactOverride {
                force_aep: true,
                ..Default::default()
            },
        );

        let contact = contact("CT", Some(d(1960, 8, 20)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, skipped) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        assert!(!scheduled.iter().any(|i| i.kind == IntentKind::Aep));
        assert!(skipped.iter().any(|i| i.kind == IntentKind::Aep));
    }

    #[test]
    fn birthday_lead_email_inside_pre_window_exclusion_is_skipped() {
        // CA: window_before=30 window_after=30, window=[2024-11-15, 2025-01-14].
        // With an unusually long 60-day lead, the Birthday target
        // (2024-10-16) lands inside the pre-window exclusion prefix
        // [2024-09-16, 2024-11-15).
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert(
            "CA".into(),
            StateRule {
                kind: StateRuleKind::Birthday {
                    window_before: 30,
                    window_after: 30,
                    age_limit: None,
                    use_month_start: false,
                },
            },
        );
        cfg.timing_constants.birthday_lead_days = 60;
        cfg.timing_constants.pre_window_exclusion_days = 60;

        let contact = contact("CA", Some(d(1960, 12, 15)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, skipped) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        assert!(!scheduled.iter().any(|i| i.kind == IntentKind::Birthday && i.target_date == d(2024, 10, 16)));
        let skip = skipped
            .iter()
            .find(|i| i.kind == IntentKind::Birthday && i.target_date == d(2024, 10, 16))
            .unwrap();
        assert!(matches!(&skip.status, cadence_core::IntentStatus::Skipped { reason } if reason == "within pre-window exclusion"));
    }

    #[test]
    fn age_limit_suppresses_window_at_cutoff() {
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert(
            "IL".into(),
            StateRule {
                kind: StateRuleKind::Birthday {
                    window_before: 30,
                    window_after: 30,
                    age_limit: Some(76),
                    use_month_start: false,
                },
            },
        );

        let aged_out = contact("IL", Some(d(1947, 6, 15)), None);
        let rules = ContactRuleEngine::new().resolve(&aged_out, &cfg);
        let (scheduled, _) = SchedulingEngine::new()
            .schedule(&aged_out, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        // Window suppressed at age 76, so the lead birthday intent is not
        // excluded and schedules normally.
        assert!(scheduled.iter().any(|i| i.kind == IntentKind::Birthday && i.target_date == d(2024, 6, 1)));
        assert!(!scheduled.iter().any(|i| i.kind == IntentKind::PostWindow));
    }

    #[test]
    fn under_age_limit_window_still_generates_post_window() {
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert(
            "IL".into(),
            StateRule {
                kind: StateRuleKind::Birthday {
                    window_before: 30,
                    window_after: 30,
                    age_limit: Some(76),
                    use_month_start: false,
                },
            },
        );

        let under_limit = contact("IL", Some(d(1948, 6, 15)), None);
        let rules = ContactRuleEngine::new().resolve(&under_limit, &cfg);
        let (scheduled, _) = SchedulingEngine::new()
            .schedule(&under_limit, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        assert!(scheduled.iter().any(|i| i.kind == IntentKind::PostWindow && i.target_date == d(2024, 7, 16)));
    }

    #[test]
    fn nv_month_start_anchors_window_to_first_of_month() {
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert(
            "NV".into(),
            StateRule {
                kind: StateRuleKind::Birthday {
                    window_before: 29,
                    window_after: 29,
                    age_limit: None,
                    use_month_start: true,
                },
            },
        );

        let contact = contact("NV", Some(d(1960, 3, 15)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, _) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        let post_window = scheduled.iter().find(|i| i.kind == IntentKind::PostWindow).unwrap();
        assert_eq!(post_window.target_date, d(2024, 3, 31));
    }

    #[test]
    fn leap_year_anchor_pivots_post_window_in_the_leap_year_itself() {
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert(
            "CA".into(),
            StateRule {
                kind: StateRuleKind::Birthday {
                    window_before: 30,
                    window_after: 30,
                    age_limit: None,
                    use_month_start: false,
                },
            },
        );
        cfg.global_rules.state_overrides.insert(
            "CA".into(),
            StateSpecialOverride {
                post_window_period_days: None,
                leap_year_override: Some(MonthDay::new(3, 30)),
            },
        );

        let contact = contact("CA", Some(d(1960, 2, 29)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, _) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        let post_window = scheduled.iter().find(|i| i.kind == IntentKind::PostWindow).unwrap();
        assert_eq!(post_window.target_date, d(2024, 3, 30));
    }

    #[test]
    fn non_leap_year_falls_back_to_feb_28_without_override() {
        let mut cfg = RuleConfig::default();
        cfg.state_rules.insert(
            "CA".into(),
            StateRule {
                kind: StateRuleKind::Birthday {
                    window_before: 30,
                    window_after: 30,
                    age_limit: None,
                    use_month_start: false,
                },
            },
        );
        cfg.global_rules.state_overrides.insert(
            "CA".into(),
            StateSpecialOverride {
                post_window_period_days: None,
                leap_year_override: Some(MonthDay::new(3, 30)),
            },
        );

        let contact = contact("CA", Some(d(1960, 2, 29)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, _) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2025, 1, 1), d(2025, 12, 31))
            .unwrap();
        let post_window = scheduled.iter().find(|i| i.kind == IntentKind::PostWindow).unwrap();
        assert_eq!(post_window.target_date, d(2025, 3, 31));
    }

    #[test]
    fn missing_anchor_dates_produces_single_skip() {
        let cfg = RuleConfig::default();
        let contact = Contact {
            id: ContactId::from("c-404"),
            org_id: OrgId::new(1),
            first_name: None,
            last_name: None,
            email: "a@example.com".into(),
            jurisdiction: Some(Jurisdiction::new("ZZ")),
            zip_code: None,
            birth_date: None,
            effective_date: None,
        };
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, skipped) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 12, 31))
            .unwrap();
        assert!(scheduled.is_empty());
        assert_eq!(skipped.len(), 1);
        assert!(matches!(&skipped[0].status, cadence_core::IntentStatus::Skipped { reason } if reason == "missing anchor dates"));
    }

    #[test]
    fn inverted_window_is_rejected() {
        let cfg = RuleConfig::default();
        let contact = contact("ZZ", Some(d(1960, 6, 15)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let result = SchedulingEngine::new().schedule(&contact, &rules, d(2024, 12, 31), d(2024, 1, 1));
        assert!(matches!(result, Err(SchedulerError::InvertedWindow { .. })));
    }

    #[test]
    fn dropped_candidates_outside_window_are_not_emitted_either_way() {
        let cfg = RuleConfig::default();
        let contact = contact("ZZ", Some(d(1960, 6, 15)), None);
        let rules = ContactRuleEngine::new().resolve(&contact, &cfg);
        let (scheduled, skipped) = SchedulingEngine::new()
            .schedule(&contact, &rules, d(2024, 1, 1), d(2024, 3, 31))
            .unwrap();
        assert!(!scheduled.iter().any(|i| i.kind == IntentKind::Birthday));
        assert!(!skipped.iter().any(|i| i.kind == IntentKind::Birthday));
    }
}
