use serde::{Deserialize, Serialize};

use super::period::Period;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectObservation {
    pub aspect: String,
    pub count: u32,
    pub avg_sentiment: f64,
}

/// Aggregated mention statistics for one entity in one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityObservation {
    pub object_id: String,
    pub period: Period,
    pub mention_count: u32,
    #[serde(default)]
    pub positive_count: u32,
    #[serde(default)]
    pub negative_count: u32,
    #[serde(default)]
    pub neutral_count: u32,
    #[serde(default)]
    pub mixed_count: u32,
    pub avg_sentiment: f64,
    #[serde(default)]
    pub aspect_data: Vec<AspectObservation>,
}

impl EntityObservation {
    /// Zero-valued observation used for entities with no mentions in the period.
    pub fn silent(object_id: impl Into<String>, period: Period) -> Self {
        Self {
            object_id: object_id.into(),
            period,
            mention_count: 0,
            positive_count: 0,
            negative_count: 0,
            neutral_count: 0,
            mixed_count: 0,
            avg_sentiment: 0.0,
            aspect_data: Vec::new(),
        }
    }

    #[must_use]
    pub fn aspect(&self, name: &str) -> Option<&AspectObservation> {
        self.aspect_data.iter().find(|entry| entry.aspect == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectDelta {
    pub aspect: String,
    pub current_count: u32,
    pub previous_count: u32,
    pub current_sentiment: f64,
    pub previous_sentiment: f64,
    pub sentiment_delta: f64,
    pub is_flipped: bool,
}

/// Difference between an entity's current and previous observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationDelta {
    pub object_id: String,
    pub object_name: String,
    pub class_slug: String,
    pub current: EntityObservation,
    pub previous: Option<EntityObservation>,
    pub sentiment_delta: f64,
    pub sentiment_delta_pct: f64,
    pub mention_delta: i64,
    pub mention_delta_pct: f64,
    pub new_aspects: Vec<String>,
    pub removed_aspects: Vec<String>,
    pub aspect_deltas: Vec<AspectDelta>,
}

impl ObservationDelta {
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.previous.is_some()
    }
}
