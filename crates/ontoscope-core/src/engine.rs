use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::EngineConfig;
use crate::error::{OntoscopeError, Result};
use crate::inference::{
    FactMaterializer, RuleOutcome, compute_delta, evaluate_rule, group_facts_by_object,
    narrative_fact, promote_topics,
};
use crate::models::{DerivedFact, EntityObservation, ObservationDelta, Period, SaveOutcome};
use crate::ontology::{SchemaCache, SchemaSnapshot};
use crate::traits::{
    EntityDirectory, FactStore, NarrativeGenerator, NarrativeRequest, ObservationSource,
    RelationGraph, SchemaSource,
};

mod report;

pub use report::{EvaluationReport, RulesSkipped};


/// Every collaborator the engine reads from or writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub observations: Arc<dyn ObservationSource>,
    pub directory: Arc<dyn EntityDirectory>,
    pub relations: Arc<dyn RelationGraph>,
    pub schema: Arc<dyn SchemaSource>,
    pub facts: Arc<dyn FactStore>,
}

impl Collaborators {
    /// One backend serving every contract.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: ObservationSource + EntityDirectory + RelationGraph + SchemaSource + FactStore + 'static,
    {
        Self {
            observations: backend.clone(),
            directory: backend.clone(),
            relations: backend.clone(),
            schema: backend.clone(),
            facts: backend,
        }
    }
}

/// Shared stop signal, checked between entities and between rule evaluations.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(OntoscopeError::Cancelled(stage.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct ObjectInfo {
    name: String,
    class_slug: String,
}

pub struct OntologyEngine {
    collaborators: Collaborators,
    narrative: Option<Arc<dyn NarrativeGenerator>>,
    config: EngineConfig,
    schema: SchemaCache,
    cancel: CancelFlag,
}

impl OntologyEngine {
    pub fn new(collaborators: Collaborators, config: EngineConfig) -> Self {
        Self {
            collaborators,
            narrative: None,
            config,
            schema: SchemaCache::new(),
            cancel: CancelFlag::new(),
        }
    }

    #[must_use]
    pub fn with_narrative_generator(mut self, generator: Arc<dyn NarrativeGenerator>) -> Self {
        self.narrative = Some(generator);
        self
    }

    pub fn set_narrative_generator(&mut self, generator: Option<Arc<dyn NarrativeGenerator>>) {
        self.narrative = generator;
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Reloads the schema snapshot from the schema source.
    pub fn load_schema(&self) -> Result<Arc<SchemaSnapshot>> {
        self.schema.reload(self.collaborators.schema.as_ref())
    }

    /// Cached snapshot, loading it on first use.
    pub fn schema(&self) -> Result<Arc<SchemaSnapshot>> {
        self.schema.get_or_load(self.collaborators.schema.as_ref())
    }

    pub fn invalidate_schema(&self) -> Result<()> {
        self.schema.invalidate()
    }

    /// Aggregates raw data for `period`, then evaluates it.
    pub fn materialize_and_evaluate(&self, period: Period) -> Result<EvaluationReport> {
        let materialized = self
            .collaborators
            .observations
            .materialize_observations(period)
            .map_err(|err| OntoscopeError::collaborator("materialize_observations", err))?;
        tracing::info!(period = %period, rows = materialized, "observations materialized");
        let mut report = self.evaluate_period(period)?;
        report.materialized = Some(materialized);
        Ok(report)
    }

    pub fn evaluate_period(&self, period: Period) -> Result<EvaluationReport> {
        let schema = self.schema()?;
        self.evaluate_period_with_schema(&schema, period)
    }

    /// Evaluates `period` against an explicit schema snapshot.
    pub fn evaluate_period_with_schema(
        &self,
        schema: &SchemaSnapshot,
        period: Period,
    ) -> Result<EvaluationReport> {
        self.cancel.check("before evaluation")?;
        let mut report = EvaluationReport::new(period, schema.loaded_at());

        let objects = self.load_object_map(schema)?;
        let current = self
            .collaborators
            .observations
            .list_observations_for_period(period)
            .map_err(|err| OntoscopeError::collaborator("list_observations_for_period", err))?;
        report.observations = current.len();

        let deltas = self.compute_deltas(current, &objects, period, &mut report)?;
        report.deltas = deltas.len();

        self.evaluate_rules(schema, &deltas, period, &mut report)?;

        match promote_topics(self.collaborators.directory.as_ref(), &self.config.topics) {
            Ok(topics) => report.topics_promoted = topics.promoted,
            Err(err) => tracing::warn!(error = %err, "topic promotion sweep failed"),
        }

        if let Some(generator) = self.narrative.as_deref()
            && !report.facts.is_empty()
        {
            report.narrative_facts =
                self.narratives_for(generator, &report.facts, &objects, period)?;
        }

        tracing::info!(
            period = %period,
            observations = report.observations,
            deltas = report.deltas,
            silent = report.silent_entities,
            rules_checked = report.rules_checked,
            rules_skipped = report.rules_skipped.total(),
            facts = report.facts_created,
            narratives = report.narrative_facts.len(),
            entity_failures = report.entity_failures,
            fact_failures = report.fact_failures,
            "evaluation finished"
        );
        Ok(report)
    }

    /// Groups `facts` per entity and stores one narrative insight per large enough group.
    pub fn generate_narratives(
        &self,
        facts: &[DerivedFact],
        period: Period,
    ) -> Result<Vec<DerivedFact>> {
        let Some(generator) = self.narrative.as_deref() else {
            return Ok(Vec::new());
        };
        let schema = self.schema()?;
        let objects = self.load_object_map(&schema)?;
        self.narratives_for(generator, facts, &objects, period)
    }

    fn load_object_map(&self, schema: &SchemaSnapshot) -> Result<HashMap<String, ObjectInfo>> {
        let objects = self
            .collaborators
            .directory
            .list_active_objects()
            .map_err(|err| OntoscopeError::collaborator("list_active_objects", err))?;
        Ok(objects
            .into_iter()
            .map(|object| {
                let info = ObjectInfo {
                    class_slug: schema.resolve_class_slug(&object),
                    name: object.canonical_name,
                };
                (object.id, info)
            })
            .collect())
    }

    fn compute_deltas(
        &self,
        current: Vec<EntityObservation>,
        objects: &HashMap<String, ObjectInfo>,
        period: Period,
        report: &mut EvaluationReport,
    ) -> Result<Vec<ObservationDelta>> {
        let mut seen = HashSet::with_capacity(current.len());
        let mut deltas = Vec::with_capacity(current.len());

        for observation in current {
            self.cancel.check("delta computation")?;
            seen.insert(observation.object_id.clone());
            let Some(info) = objects.get(&observation.object_id) else {
                tracing::debug!(object_id = %observation.object_id, "observation for inactive or unknown object");
                continue;
            };
            let previous = match self
                .collaborators
                .observations
                .find_previous_observation(&observation.object_id, period)
            {
                Ok(previous) => previous,
                Err(err) => {
                    tracing::warn!(
                        object_id = %observation.object_id,
                        error = %err,
                        "previous observation lookup failed"
                    );
                    report.entity_failures += 1;
                    continue;
                }
            };
            deltas.push(compute_delta(observation, previous, &info.name, &info.class_slug));
        }

        let previous_period = period.previous();
        match self
            .collaborators
            .observations
            .list_observations_for_period(previous_period)
        {
            Ok(previous) => {
                for observation in previous {
                    self.cancel.check("silent entity detection")?;
                    if seen.contains(&observation.object_id) {
                        continue;
                    }
                    let Some(info) = objects.get(&observation.object_id) else {
                        continue;
                    };
                    let silent = EntityObservation::silent(observation.object_id.clone(), period);
                    deltas.push(compute_delta(silent, Some(observation), &info.name, &info.class_slug));
                    report.silent_entities += 1;
                }
            }
            Err(err) => {
                tracing::warn!(
                    period = %previous_period,
                    error = %err,
                    "previous period listing failed; silent entities skipped"
                );
                report.entity_failures += 1;
            }
        }
        Ok(deltas)
    }

    fn evaluate_rules(
        &self,
        schema: &SchemaSnapshot,
        deltas: &[ObservationDelta],
        period: Period,
        report: &mut EvaluationReport,
    ) -> Result<()> {
        let materializer = FactMaterializer::new(
            self.collaborators.relations.as_ref(),
            self.collaborators.directory.as_ref(),
            self.config.changed_aspect_min_delta,
        );

        for rule in schema.rules() {
            for delta in deltas {
                self.cancel.check("rule evaluation")?;
                report.rules_checked += 1;

                let found = match evaluate_rule(schema, rule, delta) {
                    RuleOutcome::Matched(found) => found,
                    RuleOutcome::NoMatch => continue,
                    RuleOutcome::Skipped(reason) => {
                        report.rules_skipped.record(reason);
                        continue;
                    }
                };

                let materialized = match materializer.materialize(rule, delta, &found, period) {
                    Ok(materialized) => materialized,
                    Err(err) => {
                        tracing::warn!(
                            rule = %rule.name,
                            object_id = %delta.object_id,
                            error = %err,
                            "fact materialization failed"
                        );
                        report.entity_failures += 1;
                        continue;
                    }
                };
                report.entity_failures += materialized.unresolved_targets;

                for fact in materialized.facts {
                    if let Some(saved) = self.persist(fact) {
                        report.facts_created += 1;
                        report.facts.push(saved);
                    } else {
                        report.fact_failures += 1;
                    }
                }
            }
        }
        Ok(())
    }

    fn persist(&self, mut fact: DerivedFact) -> Option<DerivedFact> {
        match self.collaborators.facts.save_fact(&fact) {
            Ok(saved) => {
                fact.id = Some(saved.id);
                fact.created_at = Some(saved.created_at);
                if saved.outcome != SaveOutcome::Unchanged {
                    tracing::debug!(
                        object_id = %fact.object_id,
                        fact_key = %fact.fact_key,
                        outcome = ?saved.outcome,
                        "fact saved"
                    );
                }
                Some(fact)
            }
            Err(err) => {
                tracing::warn!(
                    object_id = %fact.object_id,
                    fact_key = %fact.fact_key,
                    error = %err,
                    "fact save failed"
                );
                None
            }
        }
    }

    fn narratives_for(
        &self,
        generator: &dyn NarrativeGenerator,
        facts: &[DerivedFact],
        objects: &HashMap<String, ObjectInfo>,
        period: Period,
    ) -> Result<Vec<DerivedFact>> {
        let mut narratives = Vec::new();
        for (object_id, group) in group_facts_by_object(facts, self.config.narrative.min_facts) {
            self.cancel.check("narrative generation")?;
            let Some(info) = objects.get(&object_id) else {
                continue;
            };
            let source_facts = group.len();
            let request = NarrativeRequest {
                entity_name: info.name.clone(),
                entity_class: info.class_slug.clone(),
                period_label: period.label(),
                facts: group,
            };
            let draft = match generator.generate_narrative(&request) {
                Ok(draft) => draft,
                Err(err) => {
                    tracing::warn!(object_id = %object_id, error = %err, "narrative generation failed");
                    continue;
                }
            };
            let fact = narrative_fact(
                &object_id,
                &info.name,
                &info.class_slug,
                period,
                source_facts,
                draft,
                self.config.narrative.expiry_days,
            );
            if let Some(saved) = self.persist(fact) {
                tracing::info!(object_id = %object_id, title = %saved.title, "narrative stored");
                narratives.push(saved);
            }
        }
        Ok(narratives)
    }
}
