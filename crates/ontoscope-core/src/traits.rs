use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{
    DerivedFact, EntityObservation, Mention, ObjectRecord, Period, RelationEdge, SavedFact,
    TraverseDirection,
};
use crate::ontology::{Class, RelationTypeDef, Rule};

/// Aggregated per-period observations.
pub trait ObservationSource: Send + Sync {
    /// Aggregates raw mentions and aspects of `period` into observation rows.
    fn materialize_observations(&self, period: Period) -> Result<usize>;

    fn list_observations_for_period(&self, period: Period) -> Result<Vec<EntityObservation>>;

    /// Latest observation of the same period type strictly before `period.start`.
    fn find_previous_observation(
        &self,
        object_id: &str,
        period: Period,
    ) -> Result<Option<EntityObservation>>;
}

pub trait EntityDirectory: Send + Sync {
    fn list_active_objects(&self) -> Result<Vec<ObjectRecord>>;

    fn find_object_by_id(&self, object_id: &str) -> Result<Option<ObjectRecord>>;

    /// Newest first.
    fn find_mentions_by_object(&self, object_id: &str, limit: usize) -> Result<Vec<Mention>>;

    /// Merges `patch` into the object's properties; keys in the patch win.
    fn update_properties(&self, object_id: &str, patch: &Map<String, Value>) -> Result<()>;
}

pub trait RelationGraph: Send + Sync {
    fn traverse_relation(
        &self,
        object_id: &str,
        relation_slug: &str,
        direction: TraverseDirection,
    ) -> Result<Vec<RelationEdge>>;
}

pub trait SchemaSource: Send + Sync {
    fn list_classes(&self) -> Result<Vec<Class>>;

    fn list_relation_types(&self) -> Result<Vec<RelationTypeDef>>;

    /// Active rules, highest priority first.
    fn list_active_rules(&self) -> Result<Vec<Rule>>;
}

pub trait FactStore: Send + Sync {
    /// Upsert on `(object_id, fact_key)`. Always clears the read and dismissed flags.
    fn save_fact(&self, fact: &DerivedFact) -> Result<SavedFact>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NarrativeRequest {
    pub entity_name: String,
    pub entity_class: String,
    pub period_label: String,
    pub facts: Vec<DerivedFact>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeDraft {
    pub title: String,
    pub body: String,
}

pub trait NarrativeGenerator: Send + Sync {
    fn generate_narrative(&self, request: &NarrativeRequest) -> Result<NarrativeDraft>;
}
