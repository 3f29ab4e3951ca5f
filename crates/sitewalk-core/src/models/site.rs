//! Site configuration model

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::SyncRecord;
use crate::error::{Error, Result};

/// One checklist item within an area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionPoint {
    pub id: String,
    /// Item being checked, e.g. "Extintor"
    pub name: String,
    /// Yes/no control question
    pub question: String,
    #[serde(default)]
    pub requires_photo: bool,
    /// Only meaningful when `requires_photo` is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_instruction: Option<String>,
}

/// An ordered sub-section of a site's walk route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub points: Vec<InspectionPoint>,
}

/// A physical installation with its configured checklist.
///
/// Area and point order is the walk order and is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub areas: Vec<Area>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced: Option<bool>,
}

impl Site {
    /// Total number of inspection points across all areas.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.areas.iter().map(|area| area.points.len()).sum()
    }

    /// Reject trees the configuration editor should never hand over.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("site id must not be empty".into()));
        }
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "site {} has an empty name",
                self.id
            )));
        }

        let mut area_ids = HashSet::new();
        let mut point_ids = HashSet::new();
        for area in &self.areas {
            if area.id.trim().is_empty() {
                return Err(Error::InvalidInput(format!(
                    "site {} has an area without id",
                    self.id
                )));
            }
            if !area_ids.insert(area.id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate area id {} in site {}",
                    area.id, self.id
                )));
            }
            for point in &area.points {
                if point.id.trim().is_empty() {
                    return Err(Error::InvalidInput(format!(
                        "area {} has a point without id",
                        area.id
                    )));
                }
                if !point_ids.insert(point.id.as_str()) {
                    return Err(Error::InvalidInput(format!(
                        "duplicate point id {} in site {}",
                        point.id, self.id
                    )));
                }
            }
        }

        Ok(())
    }
}

impl SyncRecord for Site {
    fn record_id(&self) -> &str {
        &self.id
    }

    fn synced_flag(&self) -> Option<bool> {
        self.synced
    }

    fn set_synced(&mut self, synced: bool) {
        self.synced = Some(synced);
    }
}

/// Demo configuration written on first access to an empty store.
#[must_use]
pub fn seed_sites() -> Vec<Site> {
    vec![Site {
        id: "site-1".to_string(),
        name: "Cantera Los Álamos (Demo)".to_string(),
        areas: vec![Area {
            id: "area-1".to_string(),
            name: "Caseta de Control".to_string(),
            points: vec![InspectionPoint {
                id: "pt-1".to_string(),
                name: "Extintor Principal".to_string(),
                question: "¿El extintor está cargado?".to_string(),
                requires_photo: true,
                photo_instruction: Some("Foto manómetro".to_string()),
            }],
        }],
        synced: None,
    }]
}
