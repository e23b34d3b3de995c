//! Resource records returned by the backend.
//!
//! Only the fields the client reads are typed. Everything else is kept in
//! `extra` so nothing the backend sends is lost.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One leaderboard row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Player level.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    /// Experience points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Unrecognized fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LeaderboardEntry {
    /// Name, or `Anon` when missing.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Anon")
    }

    /// Level, defaulting to 1.
    pub fn level_or_default(&self) -> u32 {
        self.level.unwrap_or(1)
    }

    /// Points, defaulting to 0.
    pub fn points(&self) -> i64 {
        self.exp.unwrap_or(0)
    }
}

/// A named waste category.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WasteType {
    /// Identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Category name.
    #[serde(default)]
    pub name: String,
}

/// Opening hours for one weekday.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OpeningHours {
    /// Day name, lowercase as sent by the backend.
    #[serde(default)]
    pub day: String,
    /// `HH:MM[:SS]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_time: Option<String>,
    /// `HH:MM[:SS]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_time: Option<String>,
}

impl fmt::Display for OpeningHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chars = self.day.chars();
        let day: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        write!(
            f,
            "{day}: {} - {}",
            hh_mm(self.open_time.as_deref()),
            hh_mm(self.close_time.as_deref())
        )
    }
}

fn hh_mm(time: Option<&str>) -> &str {
    match time {
        Some(t) => t.get(..5).unwrap_or(t),
        None => "N/A",
    }
}

/// A waste bank.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WasteBank {
    /// Identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Name.
    #[serde(default)]
    pub name: String,
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Latitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Accepted waste categories.
    #[serde(default)]
    pub waste_processed: Vec<WasteType>,
    /// Weekly schedule.
    #[serde(default)]
    pub opening_hours: Vec<OpeningHours>,
    /// Unrecognized fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WasteBank {
    /// Coordinates, when both are present.
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Body for creating a waste bank.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NewWasteBank {
    /// Name.
    pub name: String,
    /// Street address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Additional fields passed through to the backend.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A public trash can.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrashCan {
    /// Identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Latitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Longitude.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Accepted waste categories.
    #[serde(default)]
    pub accepted_waste_types: Vec<WasteType>,
    /// Unrecognized fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TrashCan {
    /// Coordinates, when both are present.
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Classification result for an uploaded image.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Predicted waste category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<String>,
    /// Confidence in `[0, 1]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Disposal advice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Points awarded for the upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i64>,
    /// Unrecognized fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Prediction {
    /// Confidence as a percentage with one decimal, e.g. `87.5%`.
    pub fn confidence_percent(&self) -> Option<String> {
        self.confidence.map(|c| format!("{:.1}%", c * 100.0))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaderboard_defaults() {
        let entry: LeaderboardEntry = serde_json::from_value(json!({"rank": 3})).unwrap();
        assert_eq!(entry.display_name(), "Anon");
        assert_eq!(entry.level_or_default(), 1);
        assert_eq!(entry.points(), 0);
        assert_eq!(entry.extra["rank"], 3);
    }

    #[test]
    fn waste_bank_keeps_unknown_fields() {
        let bank: WasteBank = serde_json::from_value(json!({
            "id": 1,
            "name": "Bank Sampah Melati",
            "latitude": -6.2,
            "longitude": 106.8,
            "waste_processed": [{"id": 2, "name": "Plastik"}],
            "opening_hours": [{"day": "monday", "open_time": "08:00:00", "close_time": "16:00:00"}],
            "phone": "021-555"
        }))
        .unwrap();
        assert_eq!(bank.position(), Some((-6.2, 106.8)));
        assert_eq!(bank.waste_processed[0].name, "Plastik");
        assert_eq!(bank.opening_hours[0].to_string(), "Monday: 08:00 - 16:00");
        assert_eq!(bank.extra["phone"], "021-555");
    }

    #[test]
    fn opening_hours_missing_times() {
        let hours = OpeningHours {
            day: "sunday".into(),
            open_time: None,
            close_time: Some("9".into()),
        };
        assert_eq!(hours.to_string(), "Sunday: N/A - 9");
    }

    #[test]
    fn trash_can_without_coordinates() {
        let can: TrashCan = serde_json::from_value(json!({"id": 4, "latitude": 1.0})).unwrap();
        assert!(can.position().is_none());
        assert!(can.accepted_waste_types.is_empty());
    }

    #[test]
    fn new_waste_bank_body() {
        let body = NewWasteBank {
            name: "Hijau".into(),
            address: None,
            latitude: -6.0,
            longitude: 106.0,
            extra: Map::new(),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"name": "Hijau", "latitude": -6.0, "longitude": 106.0})
        );
    }

    #[test]
    fn prediction_percent() {
        let p: Prediction =
            serde_json::from_value(json!({"prediction": "plastic", "confidence": 0.875})).unwrap();
        assert_eq!(p.confidence_percent().as_deref(), Some("87.5%"));
        assert!(p.points.is_none());
    }
}
