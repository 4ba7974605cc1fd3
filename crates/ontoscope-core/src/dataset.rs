//! Bulk graph and mention data for local runs and demos.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OntoscopeError, Result};
use crate::models::{AspectMention, EntityObservation, Mention, ObjectRecord, ObjectRelation};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatasetDocument {
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
    #[serde(default)]
    pub relations: Vec<ObjectRelation>,
    #[serde(default)]
    pub mentions: Vec<Mention>,
    #[serde(default)]
    pub aspects: Vec<AspectMention>,
    #[serde(default)]
    pub observations: Vec<EntityObservation>,
}

impl DatasetDocument {
    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| OntoscopeError::Validation(format!("dataset parse failed: {err}")))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
            && self.relations.is_empty()
            && self.mentions.is_empty()
            && self.aspects.is_empty()
            && self.observations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObjectType, PeriodType, Sentiment};

    #[test]
    fn parses_sparse_documents_with_defaults() {
        let doc = DatasetDocument::parse(
            r#"{
                "objects": [{"id": "p1", "object_type": "product", "canonical_name": "Phone X"}],
                "relations": [{"source_id": "p1", "target_id": "b1", "relation_slug": "belongs_to"}],
                "mentions": [{
                    "post_id": "post-1", "object_id": "p1", "sentiment": "negative",
                    "sentiment_score": 0.2, "created_at": "2026-02-10T08:00:00Z"
                }],
                "observations": [{
                    "object_id": "p1",
                    "period": {"start": "2026-02-02", "period_type": "week"},
                    "mention_count": 4,
                    "avg_sentiment": 0.7
                }]
            }"#,
        )
        .expect("parse");
        assert_eq!(doc.objects[0].object_type, ObjectType::Product);
        assert!(doc.objects[0].properties.is_empty());
        assert!((doc.relations[0].confidence - 1.0).abs() < f64::EPSILON);
        assert_eq!(doc.relations[0].origin, "manual");
        assert_eq!(doc.mentions[0].sentiment, Sentiment::Negative);
        assert_eq!(doc.observations[0].period.period_type, PeriodType::Week);
        assert!(doc.aspects.is_empty());
        assert!(!doc.is_empty());
    }

    #[test]
    fn unknown_sections_are_rejected() {
        let err = DatasetDocument::parse(r#"{"posts": []}"#).expect_err("unknown field");
        assert_eq!(err.code(), "VALIDATION_FAILED");
    }
}
