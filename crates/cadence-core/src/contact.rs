use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{ContactId, Jurisdiction, OrgId};

/// A contact as seen by the scheduling engine.
///
/// Immutable for the duration of a scheduling run: the engine only ever
/// reads a `Contact`, never mutates one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub org_id: OrgId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    /// Recipient address. An empty string is valid input but triggers a
    /// skip/finalize-as-skipped downstream (§3, §4.6).
    #[serde(default)]
    pub email: String,
    /// Two-letter jurisdiction code. If absent at construction time, callers
    /// should populate it via [`Contact::with_inferred_jurisdiction`].
    pub jurisdiction: Option<Jurisdiction>,
    #[serde(default)]
    pub zip_code: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub effective_date: Option<NaiveDate>,
}

impl Contact {
    /// Validates the invariant of §3: at least one anchor date must be
    /// present. Returns the single mandated skip reason otherwise.
    pub fn validate_anchors(&self) -> Result<(), CoreError> {
        if self.birth_date.is_none() && self.effective_date.is_none() {
            return Err(CoreError::MissingAnchorDates(self.id.to_string()));
        }
        Ok(())
    }

    /// Returns the contact's jurisdiction, inferring it from `zip_code` via
    /// the static prefix table when the field itself is absent.
    #[must_use]
    pub fn resolved_jurisdiction(&self) -> Option<Jurisdiction> {
        self.jurisdiction.clone().or_else(|| {
            self.zip_code
                .as_deref()
                .and_then(infer_jurisdiction_from_zip)
        })
    }
}

/// Static, ordered table of 3-digit ZIP-code prefixes to state codes.
///
/// Not exhaustive — it covers the prefix ranges needed to resolve a
/// jurisdiction when a contact record omits `state` but carries `zip_code`,
/// per §6. Ranges are inclusive of both bounds and checked in order; the
/// first match wins.
const ZIP_PREFIX_RANGES: &[(u32, u32, &str)] = &[
    (5, 5, "NY"),
    (6, 9, "NJ"),
    (10, 14, "NY"),
    (15, 19, "PA"),
    (20, 20, "DC"),
    (21, 21, "MD"),
    (22, 24, "VA"),
    (25, 26, "WV"),
    (27, 28, "NC"),
    (29, 29, "SC"),
    (30, 31, "GA"),
    (32, 34, "FL"),
    (35, 36, "AL"),
    (37, 38, "TN"),
    (39, 39, "MS"),
    (40, 42, "KY"),
    (43, 45, "OH"),
    (46, 47, "IN"),
    (48, 49, "MI"),
    (50, 52, "IA"),
    (53, 54, "WI"),
    (55, 56, "MN"),
    (57, 57, "SD"),
    (58, 58, "ND"),
    (59, 59, "MT"),
    (60, 62, "IL"),
    (63, 65, "MO"),
    (66, 67, "KS"),
    (68, 69, "NE"),
    (70, 71, "LA"),
    (72, 72, "AR"),
    (73, 74, "OK"),
    (75, 79, "TX"),
    (80, 81, "CO"),
    (82, 83, "WY"),
    (84, 84, "UT"),
    (85, 86, "AZ"),
    (87, 88, "NM"),
    (89, 89, "NV"),
    (90, 96, "CA"),
    (97, 97, "OR"),
    (98, 99, "WA"),
    (0, 0, "PR"),
    (1, 2, "MA"),
    (3, 3, "NH"),
    (4, 4, "ME"),
];

/// Infers a two-letter jurisdiction code from a postal code's leading three
/// digits. Returns `None` if `zip` is not a recognizable numeric prefix.
#[must_use]
pub fn infer_jurisdiction_from_zip(zip: &str) -> Option<Jurisdiction> {
    let digits: String = zip.chars().take(3).filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }
    let prefix: u32 = digits.parse().ok()?;
    ZIP_PREFIX_RANGES
        .iter()
        .find(|(lo, hi, _)| prefix >= *lo && prefix <= *hi)
        .map(|(_, _, code)| Jurisdiction::new(*code))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(birth: Option<NaiveDate>, effective: Option<NaiveDate>) -> Contact {
        Contact {
            id: ContactId::from("c1"),
            org_id: OrgId::new(1),
            first_name: None,
            last_name: None,
            email: "a@example.com".into(),
            jurisdiction: None,
            zip_code: None,
            birth_date: birth,
            effective_date: effective,
        }
    }

    #[test]
    fn missing_both_anchors_is_rejected() {
        let c = contact(None, None);
        assert!(matches!(
            c.validate_anchors(),
            Err(CoreError::MissingAnchorDates(_))
        ));
    }

    #[test]
    fn one_anchor_present_is_valid() {
        let c = contact(
            NaiveDate::from_ymd_opt(1960, 1, 1),
            None,
        );
        assert!(c.validate_anchors().is_ok());
    }

    #[test]
    fn zip_prefix_resolves_jurisdiction() {
        assert_eq!(
            infer_jurisdiction_from_zip("90210").unwrap().as_str(),
            "CA"
        );
        assert_eq!(infer_jurisdiction_from_zip("10001").unwrap().as_str(), "NY");
        assert_eq!(infer_jurisdiction_from_zip("60601").unwrap().as_str(), "IL");
    }

    #[test]
    fn resolved_jurisdiction_prefers_explicit_over_zip() {
        let mut c = contact(NaiveDate::from_ymd_opt(1960, 1, 1), None);
        c.zip_code = Some("90210".into());
        c.jurisdiction = Some(Jurisdiction::new("NV"));
        assert_eq!(c.resolved_jurisdiction().unwrap().as_str(), "NV");
    }

    #[test]
    fn resolved_jurisdiction_falls_back_to_zip() {
        let mut c = contact(NaiveDate::from_ymd_opt(1960, 1, 1), None);
        c.zip_code = Some("90210".into());
        assert_eq!(c.resolved_jurisdiction().unwrap().as_str(), "CA");
    }
}
