//! Species registry
//!
//! Static mapping from classifier label to species record. Queryable by label
//! and enumerable in registration order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::error;
use wildwatch_common::HazardLevel;

/// Immutable species record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesRecord {
    /// Classifier vocabulary label (unique key)
    pub label: String,
    pub title: String,
    pub description: String,
    pub hazard_level: HazardLevel,
    /// Fully formed warning text, sent as-is
    pub warning_template: String,
    /// Artwork shown by the carousel
    pub image_url: String,
}

impl SpeciesRecord {
    pub fn new(
        label: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
        hazard_level: HazardLevel,
        warning_template: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            title: title.into(),
            description: description.into(),
            hazard_level,
            warning_template: warning_template.into(),
            image_url: String::new(),
        }
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = image_url.into();
        self
    }

    pub fn is_dangerous(&self) -> bool {
        self.hazard_level.is_dangerous()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Species label must not be blank")]
    BlankLabel,

    #[error("Species label already registered: {0}")]
    DuplicateLabel(String),
}

impl From<RegistryError> for wildwatch_common::Error {
    fn from(e: RegistryError) -> Self {
        wildwatch_common::Error::InvalidInput(e.to_string())
    }
}

/// Species registry
///
/// Built once at startup, then shared read-only (`Arc<SpeciesRegistry>`).
#[derive(Debug, Clone, Default)]
pub struct SpeciesRegistry {
    records: Vec<SpeciesRecord>,
    index: HashMap<String, usize>,
}

impl SpeciesRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from records, preserving their order
    pub fn from_records(
        records: impl IntoIterator<Item = SpeciesRecord>,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for record in records {
            registry.register(record)?;
        }
        Ok(registry)
    }

    /// Append a record; labels must be unique and non-blank
    pub fn register(&mut self, record: SpeciesRecord) -> Result<(), RegistryError> {
        if record.label.trim().is_empty() {
            return Err(RegistryError::BlankLabel);
        }
        if self.index.contains_key(&record.label) {
            return Err(RegistryError::DuplicateLabel(record.label));
        }

        self.index.insert(record.label.clone(), self.records.len());
        self.records.push(record);
        Ok(())
    }

    /// Exact-match lookup; unknown labels are None, never a fallback record
    pub fn lookup(&self, label: &str) -> Option<&SpeciesRecord> {
        self.index.get(label).map(|&i| &self.records[i])
    }

    /// Registration index of a label
    pub fn position(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    pub fn get(&self, index: usize) -> Option<&SpeciesRecord> {
        self.records.get(index)
    }

    /// Records in registration order
    pub fn iter(&self) -> impl Iterator<Item = &SpeciesRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[SpeciesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Built-in registry matching the classifier's five-label vocabulary
    pub fn builtin() -> Self {
        Self::from_records(Self::builtin_records()).unwrap_or_else(|e| {
            error!("Built-in species table rejected: {}", e);
            Self::new()
        })
    }

    /// Records backing [`SpeciesRegistry::builtin`], in carousel order
    pub fn builtin_records() -> Vec<SpeciesRecord> {
        vec![
            SpeciesRecord::new(
                "tiger",
                "Tiger",
                "Extremely Dangerous Predator",
                HazardLevel::Dangerous,
                "EXTREME DANGER! Tiger detected in your area. Seek immediate shelter and contact authorities!",
            )
            .with_image_url("https://images.pexels.com/photos/145939/pexels-photo-145939.jpeg"),
            SpeciesRecord::new(
                "elephant",
                "Elephant",
                "Powerful Wild Animal",
                HazardLevel::Dangerous,
                "DANGER! Elephant detected nearby. Keep your distance and seek safe shelter!",
            )
            .with_image_url("https://images.pexels.com/photos/133394/pexels-photo-133394.jpeg"),
            SpeciesRecord::new(
                "leopard",
                "Leopard",
                "Stealthy Predator",
                HazardLevel::Dangerous,
                "EXTREME DANGER! Leopard detected in vicinity. Find secure shelter immediately!",
            )
            .with_image_url(
                "https://images.pexels.com/photos/39857/leopard-leopard-spots-animal-wild-39857.jpeg",
            ),
            SpeciesRecord::new(
                "dog",
                "Dog",
                "Loyal Guardian",
                HazardLevel::Safe,
                "Safe: Domestic dog detected in the area.",
            )
            .with_image_url("https://images.pexels.com/photos/236622/pexels-photo-236622.jpeg"),
            SpeciesRecord::new(
                "birds",
                "Bird",
                "Common Bird",
                HazardLevel::Safe,
                "Safe: Bird detected in the area.",
            )
            .with_image_url("https://images.pexels.com/photos/326900/pexels-photo-326900.jpeg"),
        ]
    }
}
