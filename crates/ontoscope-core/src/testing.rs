//! In-memory collaborators for engine tests.

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::error::{OntoscopeError, Result};
use crate::models::{
    AspectObservation, DerivedFact, EntityObservation, FactSeverity, Mention, ObjectRecord,
    ObjectType, Period, PeriodType, RelationEdge, SaveOutcome, SavedFact, Sentiment,
    TraverseDirection,
};
use crate::ontology::{
    ActionType, Class, Metric, Operator, RelationTypeDef, Rule, RuleActionConfig, RuleCondition,
    TraverseConfig,
};
use crate::traits::{
    EntityDirectory, FactStore, NarrativeDraft, NarrativeGenerator, NarrativeRequest,
    ObservationSource, RelationGraph, SchemaSource,
};

pub(crate) fn week(raw: &str) -> Period {
    Period::new(
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date"),
        PeriodType::Week,
    )
}

pub(crate) fn observation(
    object_id: &str,
    period: Period,
    mentions: u32,
    sentiment: f64,
    aspects: &[(&str, u32, f64)],
) -> EntityObservation {
    EntityObservation {
        mention_count: mentions,
        avg_sentiment: sentiment,
        aspect_data: aspects
            .iter()
            .map(|(aspect, count, avg)| AspectObservation {
                aspect: (*aspect).to_string(),
                count: *count,
                avg_sentiment: *avg,
            })
            .collect(),
        ..EntityObservation::silent(object_id, period)
    }
}

pub(crate) fn class(id: i64, slug: &str, parent_id: Option<i64>) -> Class {
    Class {
        id,
        slug: slug.to_string(),
        name: slug.to_string(),
        parent_id,
        description: String::new(),
        sort_order: 0,
    }
}

pub(crate) fn rule(
    id: i64,
    name: &str,
    entity_class: &str,
    metric: Metric,
    operator: Operator,
    threshold: f64,
) -> Rule {
    Rule {
        id,
        name: name.to_string(),
        description: String::new(),
        priority: 0,
        is_active: true,
        trigger_type: "observation_change".to_string(),
        condition: RuleCondition {
            entity_class: entity_class.to_string(),
            metric,
            compare: None,
            operator,
            threshold,
            min_mentions: 0,
            min_aspect_mentions: 0,
            consecutive_periods: 0,
        },
        action_type: ActionType::CreateAlert,
        action_config: RuleActionConfig {
            severity: FactSeverity::Warning,
            fact_type: None,
            traverse: None,
            title_template: "{{entity.name}} changed {{delta_pct}}%".to_string(),
            body_template: "aspects: {{top_changed_aspects}}".to_string(),
        },
    }
}

pub(crate) fn propagating(mut rule: Rule, relation: &str, direction: TraverseDirection) -> Rule {
    rule.action_type = ActionType::Propagate;
    rule.action_config.traverse = Some(TraverseConfig {
        relation: relation.to_string(),
        direction,
    });
    rule.action_config.title_template = "{{target.name}} at risk via {{source.name}}".to_string();
    rule
}

pub(crate) fn mention(object_id: &str, post_id: &str, minutes: i64) -> Mention {
    Mention {
        id: minutes,
        post_id: post_id.to_string(),
        object_id: object_id.to_string(),
        sentiment: Sentiment::Neutral,
        sentiment_score: 0.5,
        mention_text: String::new(),
        created_at: base_time() + chrono::Duration::minutes(minutes),
    }
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 9, 0, 0, 0)
        .single()
        .expect("time")
}

/// Every collaborator contract backed by plain vectors.
#[derive(Default)]
pub(crate) struct InMemoryWorld {
    pub objects: Mutex<Vec<ObjectRecord>>,
    pub mentions: Mutex<Vec<Mention>>,
    pub edges: Mutex<Vec<RelationEdge>>,
    pub observations: Mutex<Vec<EntityObservation>>,
    pub classes: Mutex<Vec<Class>>,
    pub relation_types: Mutex<Vec<RelationTypeDef>>,
    pub rules: Mutex<Vec<Rule>>,
    pub facts: Mutex<Vec<DerivedFact>>,
    pub fail_previous_for: Mutex<HashSet<String>>,
    pub fail_save_for_objects: Mutex<HashSet<String>>,
    pub fail_traverse: Mutex<bool>,
    pub fail_schema: Mutex<bool>,
    pub materialize_calls: Mutex<Vec<Period>>,
}

impl InMemoryWorld {
    pub(crate) fn add_object(&self, id: &str, object_type: ObjectType, name: &str) {
        self.objects
            .lock()
            .expect("objects")
            .push(ObjectRecord::new(id, object_type, name));
    }

    pub(crate) fn add_edge(&self, source: &str, target: &str, relation: &str) {
        self.edges.lock().expect("edges").push(RelationEdge {
            source_id: source.to_string(),
            target_id: target.to_string(),
            relation_type: relation.to_string(),
        });
    }

    pub(crate) fn add_observation(&self, observation: EntityObservation) {
        self.observations
            .lock()
            .expect("observations")
            .push(observation);
    }

    pub(crate) fn stored_facts(&self) -> Vec<DerivedFact> {
        self.facts.lock().expect("facts").clone()
    }

    pub(crate) fn dismiss_all(&self) {
        for fact in self.facts.lock().expect("facts").iter_mut() {
            fact.is_dismissed = true;
            fact.is_read = true;
        }
    }
}

impl ObservationSource for InMemoryWorld {
    fn materialize_observations(&self, period: Period) -> Result<usize> {
        self.materialize_calls
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("materialize calls"))?
            .push(period);
        Ok(0)
    }

    fn list_observations_for_period(&self, period: Period) -> Result<Vec<EntityObservation>> {
        Ok(self
            .observations
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("observations"))?
            .iter()
            .filter(|observation| observation.period == period)
            .cloned()
            .collect())
    }

    fn find_previous_observation(
        &self,
        object_id: &str,
        period: Period,
    ) -> Result<Option<EntityObservation>> {
        if self
            .fail_previous_for
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("fail previous"))?
            .contains(object_id)
        {
            return Err(OntoscopeError::collaborator(
                "find_previous_observation",
                "injected failure",
            ));
        }
        Ok(self
            .observations
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("observations"))?
            .iter()
            .filter(|observation| {
                observation.object_id == object_id
                    && observation.period.period_type == period.period_type
                    && observation.period.start < period.start
            })
            .max_by_key(|observation| observation.period.start)
            .cloned())
    }
}

impl EntityDirectory for InMemoryWorld {
    fn list_active_objects(&self) -> Result<Vec<ObjectRecord>> {
        Ok(self
            .objects
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("objects"))?
            .clone())
    }

    fn find_object_by_id(&self, object_id: &str) -> Result<Option<ObjectRecord>> {
        Ok(self
            .objects
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("objects"))?
            .iter()
            .find(|object| object.id == object_id)
            .cloned())
    }

    fn find_mentions_by_object(&self, object_id: &str, limit: usize) -> Result<Vec<Mention>> {
        let mut mentions = self
            .mentions
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("mentions"))?
            .iter()
            .filter(|mention| mention.object_id == object_id)
            .cloned()
            .collect::<Vec<_>>();
        mentions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        mentions.truncate(limit);
        Ok(mentions)
    }

    fn update_properties(&self, object_id: &str, patch: &Map<String, Value>) -> Result<()> {
        let mut objects = self
            .objects
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("objects"))?;
        let object = objects
            .iter_mut()
            .find(|object| object.id == object_id)
            .ok_or_else(|| OntoscopeError::NotFound(object_id.to_string()))?;
        for (key, value) in patch {
            object.properties.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

impl RelationGraph for InMemoryWorld {
    fn traverse_relation(
        &self,
        object_id: &str,
        relation_slug: &str,
        direction: TraverseDirection,
    ) -> Result<Vec<RelationEdge>> {
        if *self
            .fail_traverse
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("fail traverse"))?
        {
            return Err(OntoscopeError::collaborator("traverse_relation", "injected failure"));
        }
        Ok(self
            .edges
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("edges"))?
            .iter()
            .filter(|edge| edge.relation_type == relation_slug)
            .filter(|edge| match direction {
                TraverseDirection::Outgoing => edge.source_id == object_id,
                TraverseDirection::Incoming => edge.target_id == object_id,
                TraverseDirection::Both => {
                    edge.source_id == object_id || edge.target_id == object_id
                }
            })
            .cloned()
            .collect())
    }
}

impl SchemaSource for InMemoryWorld {
    fn list_classes(&self) -> Result<Vec<Class>> {
        if *self
            .fail_schema
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("fail schema"))?
        {
            return Err(OntoscopeError::collaborator("list_classes", "injected failure"));
        }
        Ok(self
            .classes
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("classes"))?
            .clone())
    }

    fn list_relation_types(&self) -> Result<Vec<RelationTypeDef>> {
        Ok(self
            .relation_types
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("relation types"))?
            .clone())
    }

    fn list_active_rules(&self) -> Result<Vec<Rule>> {
        Ok(self
            .rules
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("rules"))?
            .iter()
            .filter(|rule| rule.is_active)
            .cloned()
            .collect())
    }
}

impl FactStore for InMemoryWorld {
    fn save_fact(&self, fact: &DerivedFact) -> Result<SavedFact> {
        if self
            .fail_save_for_objects
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("fail save"))?
            .contains(&fact.object_id)
        {
            return Err(OntoscopeError::collaborator("save_fact", "injected failure"));
        }
        let mut facts = self
            .facts
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("facts"))?;
        if let Some((index, existing)) = facts
            .iter_mut()
            .enumerate()
            .find(|(_, existing)| {
                existing.object_id == fact.object_id && existing.fact_key == fact.fact_key
            })
        {
            let unchanged = existing.content_fingerprint()? == fact.content_fingerprint()?;
            let id = existing.id.unwrap_or(i64::try_from(index).unwrap_or(i64::MAX) + 1);
            let created_at = existing.created_at.unwrap_or_else(base_time);
            *existing = DerivedFact {
                id: Some(id),
                created_at: Some(created_at),
                is_read: false,
                is_dismissed: false,
                ..fact.clone()
            };
            return Ok(SavedFact {
                id,
                outcome: if unchanged {
                    SaveOutcome::Unchanged
                } else {
                    SaveOutcome::Updated
                },
                created_at,
            });
        }
        let id = i64::try_from(facts.len()).unwrap_or(i64::MAX) + 1;
        let created_at = base_time();
        facts.push(DerivedFact {
            id: Some(id),
            created_at: Some(created_at),
            is_read: false,
            is_dismissed: false,
            ..fact.clone()
        });
        Ok(SavedFact {
            id,
            outcome: SaveOutcome::Created,
            created_at,
        })
    }
}

/// Returns a fixed draft and records every request.
#[derive(Default)]
pub(crate) struct RecordingNarrator {
    pub requests: Mutex<Vec<NarrativeRequest>>,
    pub fail: bool,
}

impl NarrativeGenerator for RecordingNarrator {
    fn generate_narrative(&self, request: &NarrativeRequest) -> Result<NarrativeDraft> {
        self.requests
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("narrator"))?
            .push(request.clone());
        if self.fail {
            return Err(OntoscopeError::collaborator("generate_narrative", "injected failure"));
        }
        Ok(NarrativeDraft {
            title: format!("{} this period", request.entity_name),
            body: format!("{} signals", request.facts.len()),
        })
    }
}
