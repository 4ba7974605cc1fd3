use crate::error::{OntoscopeError, Result};
use crate::models::{
    AspectDelta, DerivedFact, EntityObservation, FactEvidence, ObservationDelta, Period,
};
use crate::ontology::{Metric, Rule, TraverseConfig};
use crate::traits::{EntityDirectory, RelationGraph};

use super::delta::sentiment_label;
use super::rules::RuleMatch;
use super::template::{Placeholders, render};

/// Facts produced for one (rule, delta) match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Materialized {
    pub facts: Vec<DerivedFact>,
    /// Propagation targets that could not be resolved.
    pub unresolved_targets: usize,
}

/// Turns rule matches into facts, following relations for propagating rules.
pub struct FactMaterializer<'a> {
    relations: &'a dyn RelationGraph,
    directory: &'a dyn EntityDirectory,
    changed_aspect_min_delta: f64,
}

impl<'a> FactMaterializer<'a> {
    pub fn new(
        relations: &'a dyn RelationGraph,
        directory: &'a dyn EntityDirectory,
        changed_aspect_min_delta: f64,
    ) -> Self {
        Self {
            relations,
            directory,
            changed_aspect_min_delta,
        }
    }

    pub fn materialize(
        &self,
        rule: &Rule,
        delta: &ObservationDelta,
        found: &RuleMatch,
        period: Period,
    ) -> Result<Materialized> {
        match found {
            RuleMatch::Metric => match &rule.action_config.traverse {
                Some(traverse) => self.propagated_facts(rule, delta, traverse, period),
                None => Ok(Materialized {
                    facts: vec![self.direct_fact(rule, delta, period)],
                    unresolved_targets: 0,
                }),
            },
            RuleMatch::NewAspects(aspects) => Ok(Materialized {
                facts: vec![new_aspects_fact(rule, delta, aspects, period)],
                unresolved_targets: 0,
            }),
            RuleMatch::AspectFlips(flips) => Ok(Materialized {
                facts: flips
                    .iter()
                    .map(|flip| aspect_flip_fact(rule, delta, flip, period))
                    .collect(),
                unresolved_targets: 0,
            }),
        }
    }

    fn direct_fact(&self, rule: &Rule, delta: &ObservationDelta, period: Period) -> DerivedFact {
        let abs_delta = abs_delta_pct(rule, delta);
        let previous_count = delta
            .previous
            .as_ref()
            .map_or_else(|| "0".to_string(), |previous| previous.mention_count.to_string());
        let last_mention_date = delta
            .previous
            .as_ref()
            .map(|previous| previous.period.start_key())
            .unwrap_or_default();

        let values = Placeholders::new()
            .with("entity.name", delta.object_name.as_str())
            .with("source.name", delta.object_name.as_str())
            .with("delta_pct", format!("{abs_delta:.1}"))
            .with("current_value", delta.current.mention_count.to_string())
            .with("prev_value", previous_count)
            .with("top_changed_aspects", self.changed_aspects(delta))
            .with("last_mention_date", last_mention_date);

        build_fact(
            rule,
            delta.object_id.clone(),
            format!("{}:{}", rule.name, period.start_key()),
            &values,
            FactEvidence::Direct {
                rule_id: rule.id,
                rule_name: rule.name.clone(),
                delta_pct: abs_delta,
                current_value: metric_value(&rule.condition.metric, Some(&delta.current)),
                prev_value: metric_value(&rule.condition.metric, delta.previous.as_ref()),
            },
            period,
        )
    }

    fn propagated_facts(
        &self,
        rule: &Rule,
        delta: &ObservationDelta,
        traverse: &TraverseConfig,
        period: Period,
    ) -> Result<Materialized> {
        let edges = self
            .relations
            .traverse_relation(&delta.object_id, &traverse.relation, traverse.direction)
            .map_err(|err| {
                OntoscopeError::collaborator(
                    format!(
                        "traverse {}/{}",
                        traverse.relation,
                        traverse.direction.as_str()
                    ),
                    err,
                )
            })?;

        let abs_delta = abs_delta_pct(rule, delta);
        let current_value = metric_value(&rule.condition.metric, Some(&delta.current));
        let prev_value = metric_value(&rule.condition.metric, delta.previous.as_ref());
        let changed_aspects = self.changed_aspects(delta);

        let mut out = Materialized::default();
        for edge in &edges {
            let target_id = edge.other_end(&delta.object_id);
            let target = match self.directory.find_object_by_id(target_id) {
                Ok(Some(target)) => target,
                Ok(None) => {
                    tracing::warn!(
                        rule = %rule.name,
                        object_id = %delta.object_id,
                        target_id,
                        "propagation target not found"
                    );
                    out.unresolved_targets += 1;
                    continue;
                }
                Err(err) => {
                    tracing::warn!(
                        rule = %rule.name,
                        object_id = %delta.object_id,
                        target_id,
                        error = %err,
                        "propagation target lookup failed"
                    );
                    out.unresolved_targets += 1;
                    continue;
                }
            };

            let values = Placeholders::new()
                .with("source.name", delta.object_name.as_str())
                .with("target.name", target.canonical_name.as_str())
                .with("entity.name", delta.object_name.as_str())
                .with("delta_pct", format!("{abs_delta:.1}"))
                .with("current_value", format!("{current_value:.0}"))
                .with("prev_value", format!("{prev_value:.0}"))
                .with("top_changed_aspects", changed_aspects.as_str());

            out.facts.push(build_fact(
                rule,
                target.id.clone(),
                format!(
                    "{}:{}:{}:{}",
                    rule.name,
                    delta.object_id,
                    target.id,
                    period.start_key()
                ),
                &values,
                FactEvidence::Propagated {
                    rule_id: rule.id,
                    rule_name: rule.name.clone(),
                    source_object_id: delta.object_id.clone(),
                    source_object_name: delta.object_name.clone(),
                    target_object_id: target.id.clone(),
                    target_object_name: target.canonical_name.clone(),
                    relation_slug: traverse.relation.clone(),
                    delta_pct: abs_delta,
                    current_value,
                    prev_value,
                },
                period,
            ));
        }
        Ok(out)
    }

    fn changed_aspects(&self, delta: &ObservationDelta) -> String {
        let changed = delta
            .aspect_deltas
            .iter()
            .filter(|aspect| aspect.sentiment_delta.abs() > self.changed_aspect_min_delta)
            .map(|aspect| aspect.aspect.as_str())
            .collect::<Vec<_>>();
        if changed.is_empty() {
            "none".to_string()
        } else {
            changed.join(", ")
        }
    }
}

fn new_aspects_fact(
    rule: &Rule,
    delta: &ObservationDelta,
    aspects: &[String],
    period: Period,
) -> DerivedFact {
    let values = Placeholders::new()
        .with("entity.name", delta.object_name.as_str())
        .with("new_aspects", aspects.join(", "))
        .with("new_aspect_count", aspects.len().to_string());
    build_fact(
        rule,
        delta.object_id.clone(),
        format!("{}:{}", rule.name, period.start_key()),
        &values,
        FactEvidence::NewAspects {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            new_aspects: aspects.to_vec(),
        },
        period,
    )
}

fn aspect_flip_fact(
    rule: &Rule,
    delta: &ObservationDelta,
    flip: &AspectDelta,
    period: Period,
) -> DerivedFact {
    let values = Placeholders::new()
        .with("entity.name", delta.object_name.as_str())
        .with("aspect", flip.aspect.as_str())
        .with("prev_sentiment_label", sentiment_label(flip.previous_sentiment))
        .with("current_sentiment_label", sentiment_label(flip.current_sentiment))
        .with("prev_value", format!("{:.2}", flip.previous_sentiment))
        .with("current_value", format!("{:.2}", flip.current_sentiment));
    build_fact(
        rule,
        delta.object_id.clone(),
        format!("{}:{}:{}", rule.name, flip.aspect, period.start_key()),
        &values,
        FactEvidence::AspectFlip {
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            aspect: flip.aspect.clone(),
            prev_sentiment: flip.previous_sentiment,
            current_sentiment: flip.current_sentiment,
        },
        period,
    )
}

fn build_fact(
    rule: &Rule,
    object_id: String,
    fact_key: String,
    values: &Placeholders,
    evidence: FactEvidence,
    period: Period,
) -> DerivedFact {
    DerivedFact {
        id: None,
        object_id,
        fact_type: rule.resolved_fact_type(),
        fact_key,
        severity: rule.action_config.severity,
        title: render(&rule.action_config.title_template, values),
        description: render(&rule.action_config.body_template, values),
        evidence,
        derived_from_rule: Some(rule.id),
        period,
        is_read: false,
        is_dismissed: false,
        created_at: None,
        expires_at: None,
    }
}

fn abs_delta_pct(rule: &Rule, delta: &ObservationDelta) -> f64 {
    if rule.condition.metric == Metric::MentionCount {
        delta.mention_delta_pct.abs()
    } else {
        delta.sentiment_delta_pct.abs()
    }
}

fn metric_value(metric: &Metric, observation: Option<&EntityObservation>) -> f64 {
    let Some(observation) = observation else {
        return 0.0;
    };
    match metric {
        Metric::AvgSentiment => observation.avg_sentiment,
        Metric::MentionCount => f64::from(observation.mention_count),
        _ => 0.0,
    }
}
