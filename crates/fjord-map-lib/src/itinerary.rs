//! Itinerary entries supplied by the host application

use crate::Coordinate;
use serde::{Deserialize, Serialize};

/// One stop or leg of the fixed itinerary
///
/// Read-only to the map. Activities with an `end_coords` are legs and get a
/// second marker plus a connecting line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub title: String,
    pub location_name: String,
    pub coords: Coordinate,
    #[serde(default)]
    pub end_coords: Option<Coordinate>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

impl Activity {
    #[inline]
    pub fn is_leg(&self) -> bool {
        self.end_coords.is_some()
    }

    /// `HH:MM` or `HH:MM - HH:MM`, when times are known
    pub fn time_label(&self) -> Option<String> {
        match (&self.start_time, &self.end_time) {
            (Some(start), Some(end)) if start != end => Some(format!("{start} - {end}")),
            (Some(start), _) => Some(start.clone()),
            _ => None,
        }
    }
}

/// Parse an itinerary JSON array
pub fn parse_itinerary(json: &str) -> crate::Result<Vec<Activity>> {
    serde_json::from_str(json).map_err(|e| crate::MapError::Validation(format!("itinerary: {e}")))
}
