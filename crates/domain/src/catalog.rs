//! Read-only lookups into the reference catalogs (license types, exam types).
//!
//! The catalogs are maintained elsewhere; the workflow only reads them.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::values::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LicenseTypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExamTypeId(pub u32);

impl std::fmt::Display for LicenseTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::Display for ExamTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sub-category of a license type (e.g. A for motorcycles, B for cars).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseCategory {
    pub code: String,
    pub label: String,
    pub allowed_vehicles: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseTypeEntry {
    pub id: LicenseTypeId,
    pub name: String,
    /// Drives the minimum-age rule and the legacy kind mapping.
    pub degree_order: Option<u8>,
    pub validity_years: Option<u32>,
    pub top_color: Option<String>,
    pub has_categories: bool,
    pub allowed_vehicles: Option<String>,
    pub categories: Vec<LicenseCategory>,
    pub active: bool,
}

impl LicenseTypeEntry {
    /// Finds a configured category by code, ignoring case and surrounding space.
    pub fn category(&self, code: &str) -> Option<&LicenseCategory> {
        let code = code.trim();
        self.categories
            .iter()
            .find(|c| c.code.trim().eq_ignore_ascii_case(code))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamTypeEntry {
    pub id: ExamTypeId,
    pub name: String,
    pub passing_score: Option<u32>,
    pub duration_minutes: Option<u32>,
    pub price: Option<Money>,
    pub active: bool,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog backend could not be reached.
    #[error("reference catalog unavailable: {0}")]
    Unavailable(String),
}

/// Lookup interface over the reference catalogs.
#[async_trait]
pub trait ReferenceCatalog: Send + Sync {
    async fn license_type(&self, id: LicenseTypeId)
    -> Result<Option<LicenseTypeEntry>, CatalogError>;

    async fn exam_type(&self, id: ExamTypeId) -> Result<Option<ExamTypeEntry>, CatalogError>;

    /// Active exam types in catalog (creation) order.
    async fn active_exam_types(&self) -> Result<Vec<ExamTypeEntry>, CatalogError>;
}

/// Catalog held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    license_types: Arc<BTreeMap<LicenseTypeId, LicenseTypeEntry>>,
    exam_types: Arc<BTreeMap<ExamTypeId, ExamTypeEntry>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_license_type(mut self, entry: LicenseTypeEntry) -> Self {
        Arc::make_mut(&mut self.license_types).insert(entry.id, entry);
        self
    }

    pub fn with_exam_type(mut self, entry: ExamTypeEntry) -> Self {
        Arc::make_mut(&mut self.exam_types).insert(entry.id, entry);
        self
    }

    /// The four license degrees and three required exams used by default.
    pub fn seeded() -> Self {
        let license_type = |id: u32, name: &str, degree: u8, years: u32, color: &str| {
            LicenseTypeEntry {
                id: LicenseTypeId(id),
                name: name.to_string(),
                degree_order: Some(degree),
                validity_years: Some(years),
                top_color: Some(color.to_string()),
                has_categories: false,
                allowed_vehicles: None,
                categories: Vec::new(),
                active: true,
            }
        };
        let exam_type = |id: u32, name: &str, passing: u32, minutes: u32| ExamTypeEntry {
            id: ExamTypeId(id),
            name: name.to_string(),
            passing_score: Some(passing),
            duration_minutes: Some(minutes),
            price: None,
            active: true,
        };

        let mut first = license_type(1, "First degree", 1, 10, "green");
        first.has_categories = true;
        first.categories = vec![
            LicenseCategory {
                code: "A".into(),
                label: "Motorcycle".into(),
                allowed_vehicles: Some("motorcycles".into()),
            },
            LicenseCategory {
                code: "B".into(),
                label: "Private car".into(),
                allowed_vehicles: Some("private cars".into()),
            },
        ];

        Self::new()
            .with_license_type(first)
            .with_license_type(license_type(2, "Second degree", 2, 6, "blue"))
            .with_license_type(license_type(3, "Third degree", 3, 6, "yellow"))
            .with_license_type(license_type(4, "Fourth degree", 4, 10, "red"))
            .with_exam_type(exam_type(1, "Theory exam", 70, 30))
            .with_exam_type(exam_type(2, "Practical exam", 80, 45))
            .with_exam_type(exam_type(3, "Road exam", 80, 30))
    }
}

#[async_trait]
impl ReferenceCatalog for InMemoryCatalog {
    async fn license_type(
        &self,
        id: LicenseTypeId,
    ) -> Result<Option<LicenseTypeEntry>, CatalogError> {
        Ok(self.license_types.get(&id).cloned())
    }

    async fn exam_type(&self, id: ExamTypeId) -> Result<Option<ExamTypeEntry>, CatalogError> {
        Ok(self.exam_types.get(&id).cloned())
    }

    async fn active_exam_types(&self) -> Result<Vec<ExamTypeEntry>, CatalogError> {
        Ok(self
            .exam_types
            .values()
            .filter(|e| e.active)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_active_exam_types_come_back_in_id_order() {
        let catalog = InMemoryCatalog::seeded().with_exam_type(ExamTypeEntry {
            id: ExamTypeId(0),
            name: "Retired".into(),
            passing_score: None,
            duration_minutes: None,
            price: None,
            active: false,
        });

        let ids: Vec<_> = catalog
            .active_exam_types()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id.0)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_category_lookup_ignores_case() {
        let catalog = InMemoryCatalog::seeded();
        let first = catalog
            .license_type(LicenseTypeId(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.category(" b ").map(|c| c.label.as_str()), Some("Private car"));
        assert!(first.category("C").is_none());
    }
}
