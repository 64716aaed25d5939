//! Eligibility Evaluator: pure date and age rules.
//!
//! Nothing here reads a clock or a store; callers pass `today`/`now`.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Months, NaiveDate, Utc};

use crate::catalog::{ExamTypeId, LicenseTypeEntry};
use crate::values::LicenseKind;

/// Days a rejected applicant must wait before applying for the same type again.
pub const COOLDOWN_DAYS: i64 = 7;

/// How many required exam types must be passed before issuance.
pub const REQUIRED_EXAM_COUNT: usize = 3;

/// Whole years between `birth_date` and `today`.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

/// Minimum-age rule for a license degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeRequirement {
    AtLeast(i32),
    /// The third degree is only open to applicants of one exact age.
    Exactly(i32),
}

impl AgeRequirement {
    pub fn is_met(&self, age: i32) -> bool {
        match *self {
            AgeRequirement::AtLeast(min) => age >= min,
            AgeRequirement::Exactly(exact) => age == exact,
        }
    }
}

impl std::fmt::Display for AgeRequirement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgeRequirement::AtLeast(min) => write!(f, "at least {min}"),
            AgeRequirement::Exactly(exact) => write!(f, "exactly {exact}"),
        }
    }
}

/// Age rule for a catalog degree. No degree means the first-degree rule.
pub fn age_requirement(degree: Option<u8>) -> AgeRequirement {
    match degree {
        Some(2) => AgeRequirement::AtLeast(21),
        Some(3) => AgeRequirement::Exactly(28),
        Some(4) => AgeRequirement::AtLeast(28),
        _ => AgeRequirement::AtLeast(18),
    }
}

/// Validity per legacy kind, used when the catalog has no answer.
pub fn legacy_validity_years(kind: LicenseKind) -> u32 {
    match kind {
        LicenseKind::Public | LicenseKind::Truck => 6,
        LicenseKind::Disabled => 3,
        LicenseKind::Bus | LicenseKind::Private | LicenseKind::Motorcycle => 10,
    }
}

/// Validity years for a license: the catalog entry wins when it exists and
/// defines a value, otherwise the legacy table.
pub fn validity_years(catalog_entry: Option<&LicenseTypeEntry>, kind: LicenseKind) -> u32 {
    catalog_entry
        .and_then(|entry| entry.validity_years)
        .unwrap_or_else(|| legacy_validity_years(kind))
}

/// Adds whole years; Feb 29 lands on Feb 28 when the target year is not leap.
pub fn add_years(date: NaiveDate, years: u32) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(years.checked_mul(12)?))
}

pub fn expiry_date(issued_date: NaiveDate, years: u32) -> Option<NaiveDate> {
    add_years(issued_date, years)
}

/// Days left in the reapplication cooldown, or `None` once it has elapsed.
pub fn cooldown_days_remaining(rejected_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<i64> {
    let elapsed = (now - rejected_at).num_days();
    (elapsed < COOLDOWN_DAYS).then(|| COOLDOWN_DAYS - elapsed)
}

/// Whether the passed exams complete the requirement for issuance.
///
/// `required` lists the active exam types in catalog order; the first
/// [`REQUIRED_EXAM_COUNT`] of them must all be among `passed_types`, and at
/// least that many passing exams must exist.
pub fn exams_complete(
    required: &[ExamTypeId],
    passed_types: &BTreeSet<ExamTypeId>,
    passed_count: usize,
) -> bool {
    required.len() >= REQUIRED_EXAM_COUNT
        && required[..REQUIRED_EXAM_COUNT]
            .iter()
            .all(|t| passed_types.contains(t))
        && passed_count >= REQUIRED_EXAM_COUNT
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_age_counts_birthday_not_yet_reached() {
        assert_eq!(age_on(date(2000, 6, 15), date(2028, 6, 14)), 27);
        assert_eq!(age_on(date(2000, 6, 15), date(2028, 6, 15)), 28);
        assert_eq!(age_on(date(2000, 2, 29), date(2021, 2, 28)), 20);
        assert_eq!(age_on(date(2000, 2, 29), date(2021, 3, 1)), 21);
    }

    #[test]
    fn test_third_degree_requires_exactly_twenty_eight() {
        let rule = age_requirement(Some(3));
        assert!(!rule.is_met(27));
        assert!(rule.is_met(28));
        assert!(!rule.is_met(29));
    }

    #[test]
    fn test_degree_thresholds() {
        assert_eq!(age_requirement(None), AgeRequirement::AtLeast(18));
        assert_eq!(age_requirement(Some(1)), AgeRequirement::AtLeast(18));
        assert_eq!(age_requirement(Some(2)), AgeRequirement::AtLeast(21));
        assert_eq!(age_requirement(Some(4)), AgeRequirement::AtLeast(28));
        assert_eq!(age_requirement(Some(7)), AgeRequirement::AtLeast(18));
    }

    #[test]
    fn test_leap_day_expiry_falls_back_to_feb_28() {
        assert_eq!(add_years(date(2024, 2, 29), 1), Some(date(2025, 2, 28)));
        assert_eq!(add_years(date(2024, 2, 29), 6), Some(date(2030, 2, 28)));
        assert_eq!(add_years(date(2024, 2, 29), 4), Some(date(2028, 2, 29)));
        assert_eq!(expiry_date(date(2023, 7, 1), 10), Some(date(2033, 7, 1)));
    }

    #[test]
    fn test_legacy_table() {
        assert_eq!(legacy_validity_years(LicenseKind::Private), 10);
        assert_eq!(legacy_validity_years(LicenseKind::Public), 6);
        assert_eq!(legacy_validity_years(LicenseKind::Truck), 6);
        assert_eq!(legacy_validity_years(LicenseKind::Bus), 10);
        assert_eq!(legacy_validity_years(LicenseKind::Disabled), 3);
        assert_eq!(legacy_validity_years(LicenseKind::Motorcycle), 10);
    }

    #[test]
    fn test_catalog_validity_overrides_legacy() {
        let entry = LicenseTypeEntry {
            id: crate::catalog::LicenseTypeId(9),
            name: "Custom".into(),
            degree_order: Some(2),
            validity_years: Some(4),
            top_color: None,
            has_categories: false,
            allowed_vehicles: None,
            categories: vec![],
            active: true,
        };
        assert_eq!(validity_years(Some(&entry), LicenseKind::Public), 4);
        assert_eq!(validity_years(None, LicenseKind::Public), 6);
    }

    #[test]
    fn test_cooldown_reports_days_left() {
        let rejected = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(
            cooldown_days_remaining(rejected, rejected + Duration::days(3)),
            Some(4)
        );
        assert_eq!(
            cooldown_days_remaining(rejected, rejected + Duration::hours(1)),
            Some(7)
        );
        assert_eq!(
            cooldown_days_remaining(rejected, rejected + Duration::days(7)),
            None
        );
        assert_eq!(
            cooldown_days_remaining(rejected, rejected + Duration::days(8)),
            None
        );
    }

    #[test]
    fn test_exams_complete_needs_first_three_types_and_three_passes() {
        let required = [ExamTypeId(1), ExamTypeId(2), ExamTypeId(3), ExamTypeId(4)];
        let passed: BTreeSet<_> = [ExamTypeId(3), ExamTypeId(1), ExamTypeId(2)].into();
        assert!(exams_complete(&required, &passed, 3));

        let partial: BTreeSet<_> = [ExamTypeId(1), ExamTypeId(4), ExamTypeId(2)].into();
        assert!(!exams_complete(&required, &partial, 3));

        assert!(!exams_complete(&required[..2], &passed, 3));
    }
}
