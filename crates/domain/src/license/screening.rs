//! Checks a new application against the applicant's existing licenses and
//! the license-type rules before anything is recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{LicenseTypeEntry, LicenseTypeId};
use crate::eligibility::{age_on, age_requirement, cooldown_days_remaining};
use crate::values::{ApplicantDocuments, ApplicantProfile, LicenseKind};

use super::{License, LicenseError, LicenseStatus};

/// What the citizen submits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationForm {
    pub profile: ApplicantProfile,
    #[serde(default)]
    pub documents: ApplicantDocuments,
    pub license_type_id: Option<LicenseTypeId>,
    /// Legacy kind; inferred from the catalog degree when omitted.
    pub kind: Option<LicenseKind>,
    pub category: Option<String>,
}

/// An application that passed every check, normalised and ready to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenedApplication {
    pub profile: ApplicantProfile,
    pub documents: ApplicantDocuments,
    pub age: i32,
    pub license_type_id: Option<LicenseTypeId>,
    pub kind: LicenseKind,
    pub category: Option<String>,
}

/// Runs the application checks in order: required fields, license type,
/// active license, open application, cooldown, category, age.
///
/// `license_type` is the catalog entry for `form.license_type_id`, if the
/// lookup found one. `existing` holds every license previously filed by
/// the applicant.
pub fn screen_application<'a>(
    form: ApplicationForm,
    license_type: Option<&LicenseTypeEntry>,
    existing: impl IntoIterator<Item = &'a License>,
    now: DateTime<Utc>,
) -> Result<ScreenedApplication, LicenseError> {
    let profile = normalize_profile(form.profile)?;
    let today = now.date_naive();

    let license_type = match form.license_type_id {
        Some(id) => match license_type {
            Some(entry) if entry.id == id && entry.active => Some(entry),
            _ => return Err(LicenseError::LicenseTypeUnavailable { id }),
        },
        None if form.kind.is_none() => return Err(LicenseError::TypeRequired),
        None => None,
    };

    // A catalog reference wins; a bare legacy kind only matches licenses of that kind.
    let same_type = |license: &License| match (form.license_type_id, form.kind) {
        (Some(id), _) => license.license_type_id() == Some(id),
        (None, Some(kind)) => license.kind() == kind,
        (None, None) => true,
    };

    let mut cooldown: Option<i64> = None;
    for license in existing.into_iter().filter(|l| same_type(l)) {
        let status = license.effective_status(today);
        if status == LicenseStatus::Issued {
            return Err(LicenseError::ActiveLicenseExists);
        }
        if status.is_open_request() {
            return Err(LicenseError::PendingRequestExists);
        }
        if status == LicenseStatus::Rejected {
            let remaining = license
                .review_date()
                .and_then(|rejected_at| cooldown_days_remaining(rejected_at, now));
            cooldown = cooldown.max(remaining);
        }
    }
    if let Some(days_remaining) = cooldown {
        return Err(LicenseError::CooldownActive { days_remaining });
    }

    let category = match license_type {
        Some(entry) if entry.has_categories => {
            let code = form
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or(LicenseError::CategoryRequired)?;
            let configured = entry
                .category(code)
                .ok_or_else(|| LicenseError::InvalidCategory {
                    code: code.to_ascii_uppercase(),
                })?;
            Some(configured.code.trim().to_ascii_uppercase())
        }
        _ => None,
    };

    let degree = license_type.and_then(|entry| entry.degree_order);
    let age = age_on(profile.birth_date, today);
    let required = age_requirement(degree);
    if !required.is_met(age) {
        return Err(LicenseError::UnderAge { age, required });
    }

    let kind = form
        .kind
        .or_else(|| degree.map(LicenseKind::from_degree))
        .unwrap_or_default();

    Ok(ScreenedApplication {
        profile,
        documents: form.documents,
        age,
        license_type_id: form.license_type_id,
        kind,
        category,
    })
}

fn normalize_profile(profile: ApplicantProfile) -> Result<ApplicantProfile, LicenseError> {
    fn optional(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    let full_name = profile.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(LicenseError::MissingField("full_name"));
    }
    let passport_number = profile.passport_number.trim().to_string();
    if passport_number.is_empty() {
        return Err(LicenseError::MissingField("passport_number"));
    }

    Ok(ApplicantProfile {
        full_name,
        passport_number,
        nationality: optional(profile.nationality),
        email: optional(profile.email),
        place_of_birth: optional(profile.place_of_birth),
        residence_address: optional(profile.residence_address),
        ..profile
    })
}
