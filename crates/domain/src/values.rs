//! Value objects shared by the licensing aggregates.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Money amount held in minor units (1/100 of the currency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    pub const fn zero() -> Self {
        Self { cents: 0 }
    }

    pub fn cents(&self) -> i64 {
        self.cents
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.cents < 0 { "-" } else { "" };
        let abs = self.cents.abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

/// Fee recorded against an exam the first time it is graded.
pub const EXAM_FEE: Money = Money::from_cents(1050);

/// Default fee attached to a renewal request.
pub const RENEWAL_FEE: Money = Money::from_cents(850);

/// Fixed license kinds that predate the license-type catalog.
///
/// Still stored on every license for queries and as the fallback when the
/// catalog cannot supply validity years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LicenseKind {
    #[default]
    Private,
    Public,
    Motorcycle,
    Truck,
    Bus,
    Disabled,
}

impl LicenseKind {
    /// Maps a catalog degree to the kind it corresponds to.
    pub fn from_degree(degree: u8) -> Self {
        match degree {
            2 => LicenseKind::Public,
            3 => LicenseKind::Truck,
            4 => LicenseKind::Bus,
            _ => LicenseKind::Private,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseKind::Private => "PRIVATE",
            LicenseKind::Public => "PUBLIC",
            LicenseKind::Motorcycle => "MOTORCYCLE",
            LicenseKind::Truck => "TRUCK",
            LicenseKind::Bus => "BUS",
            LicenseKind::Disabled => "DISABLED",
        }
    }
}

impl std::fmt::Display for LicenseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LicenseKind {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRIVATE" => Ok(LicenseKind::Private),
            "PUBLIC" => Ok(LicenseKind::Public),
            "MOTORCYCLE" => Ok(LicenseKind::Motorcycle),
            "TRUCK" => Ok(LicenseKind::Truck),
            "BUS" => Ok(LicenseKind::Bus),
            "DISABLED" => Ok(LicenseKind::Disabled),
            _ => Err(UnknownValue(s.to_string())),
        }
    }
}

/// A string did not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognised value: {0}")]
pub struct UnknownValue(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BloodType {
    #[serde(rename = "A+")]
    APositive,
    #[serde(rename = "A-")]
    ANegative,
    #[serde(rename = "B+")]
    BPositive,
    #[serde(rename = "B-")]
    BNegative,
    #[serde(rename = "AB+")]
    AbPositive,
    #[serde(rename = "AB-")]
    AbNegative,
    #[serde(rename = "O+")]
    OPositive,
    #[serde(rename = "O-")]
    ONegative,
}

/// Personal details captured with an application.
///
/// Copied onto the license so later profile edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub full_name: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub passport_number: String,
    pub nationality: Option<String>,
    pub blood_type: Option<BloodType>,
    pub email: Option<String>,
    pub place_of_birth: Option<String>,
    pub residence_address: Option<String>,
}

/// Blob handles for the documents attached to an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantDocuments {
    pub photo: Option<String>,
    pub residence_certificate: Option<String>,
    pub birth_certificate: Option<String>,
    pub passport_image: Option<String>,
}

/// Emergency details printed on the back of the card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportantInfo {
    pub chronic_disease: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

/// Partial edit of [`ImportantInfo`].
///
/// `None` leaves a field alone; an empty (or blank) string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportantInfoUpdate {
    pub chronic_disease: Option<String>,
    pub emergency_contact_name: Option<String>,
    pub emergency_contact_phone: Option<String>,
}

impl ImportantInfoUpdate {
    pub fn is_empty(&self) -> bool {
        self.chronic_disease.is_none()
            && self.emergency_contact_name.is_none()
            && self.emergency_contact_phone.is_none()
    }

    /// Returns `current` with this update merged in.
    pub fn merge_into(&self, current: &ImportantInfo) -> ImportantInfo {
        fn pick(update: &Option<String>, current: &Option<String>) -> Option<String> {
            match update {
                None => current.clone(),
                Some(v) => {
                    let v = v.trim();
                    (!v.is_empty()).then(|| v.to_string())
                }
            }
        }

        ImportantInfo {
            chronic_disease: pick(&self.chronic_disease, &current.chronic_disease),
            emergency_contact_name: pick(
                &self.emergency_contact_name,
                &current.emergency_contact_name,
            ),
            emergency_contact_phone: pick(
                &self.emergency_contact_phone,
                &current.emergency_contact_phone,
            ),
        }
    }
}

/// Outcome of a graded exam (driving exam or renewal vision exam).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExamResult {
    Passed,
    Failed,
}

impl ExamResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExamResult::Passed => "passed",
            ExamResult::Failed => "failed",
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, ExamResult::Passed)
    }
}

impl std::fmt::Display for ExamResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExamResult {
    type Err = UnknownValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(ExamResult::Passed),
            "failed" => Ok(ExamResult::Failed),
            _ => Err(UnknownValue(s.to_string())),
        }
    }
}
