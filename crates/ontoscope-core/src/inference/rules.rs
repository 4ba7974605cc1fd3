use serde::Serialize;

use crate::models::{AspectDelta, ObservationDelta};
use crate::ontology::{Metric, Operator, Rule, SchemaSnapshot, is_supported_condition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ClassMismatch,
    BelowMinMentions,
    MissingPrevious,
    UnsupportedCondition,
}

/// What a rule found in a delta.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleMatch {
    /// A sentiment or mention threshold was crossed.
    Metric,
    NewAspects(Vec<String>),
    AspectFlips(Vec<AspectDelta>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleOutcome {
    Skipped(SkipReason),
    NoMatch,
    Matched(RuleMatch),
}

/// Checks class and volume gates, then dispatches on the rule metric.
pub fn evaluate_rule(schema: &SchemaSnapshot, rule: &Rule, delta: &ObservationDelta) -> RuleOutcome {
    let condition = &rule.condition;

    if !schema.is_a(&delta.class_slug, &condition.entity_class) {
        return RuleOutcome::Skipped(SkipReason::ClassMismatch);
    }
    if condition.min_mentions > 0 && delta.current.mention_count < condition.min_mentions {
        return RuleOutcome::Skipped(SkipReason::BelowMinMentions);
    }
    if !is_supported_condition(&condition.metric, &condition.operator) {
        return RuleOutcome::Skipped(SkipReason::UnsupportedCondition);
    }

    match &condition.metric {
        Metric::AvgSentiment => {
            if delta.previous.is_none() {
                return RuleOutcome::Skipped(SkipReason::MissingPrevious);
            }
            threshold_outcome(&condition.operator, delta.sentiment_delta_pct, condition.threshold)
        }
        Metric::MentionCount => evaluate_mention_count(rule, delta),
        Metric::NewAspects => {
            let floor = condition.aspect_mention_floor();
            let qualified = delta
                .new_aspects
                .iter()
                .filter(|name| {
                    delta
                        .current
                        .aspect(name)
                        .is_some_and(|aspect| aspect.count >= floor)
                })
                .cloned()
                .collect::<Vec<_>>();
            if qualified.is_empty() {
                RuleOutcome::NoMatch
            } else {
                RuleOutcome::Matched(RuleMatch::NewAspects(qualified))
            }
        }
        Metric::AspectSentiment => {
            if delta.previous.is_none() {
                return RuleOutcome::Skipped(SkipReason::MissingPrevious);
            }
            let floor = condition.aspect_mention_floor();
            let flips = delta
                .aspect_deltas
                .iter()
                .filter(|aspect| aspect.is_flipped && aspect.current_count >= floor)
                .cloned()
                .collect::<Vec<_>>();
            if flips.is_empty() {
                RuleOutcome::NoMatch
            } else {
                RuleOutcome::Matched(RuleMatch::AspectFlips(flips))
            }
        }
        Metric::Unsupported(_) => RuleOutcome::Skipped(SkipReason::UnsupportedCondition),
    }
}

fn evaluate_mention_count(rule: &Rule, delta: &ObservationDelta) -> RuleOutcome {
    let condition = &rule.condition;
    if condition.operator != Operator::Equals {
        if delta.previous.is_none() {
            return RuleOutcome::Skipped(SkipReason::MissingPrevious);
        }
        return threshold_outcome(&condition.operator, delta.mention_delta_pct, condition.threshold);
    }

    if !count_equals(delta.current.mention_count, condition.threshold) {
        return RuleOutcome::NoMatch;
    }
    // Persistence only looks one period back, whatever the configured count.
    if condition.consecutive_periods > 1 {
        let Some(previous) = delta.previous.as_ref() else {
            return RuleOutcome::Skipped(SkipReason::MissingPrevious);
        };
        if !count_equals(previous.mention_count, condition.threshold) {
            return RuleOutcome::NoMatch;
        }
    }
    RuleOutcome::Matched(RuleMatch::Metric)
}

fn threshold_outcome(operator: &Operator, delta_pct: f64, threshold: f64) -> RuleOutcome {
    let matched = match operator {
        Operator::DecreasePct => delta_pct <= -threshold,
        Operator::IncreasePct => delta_pct >= threshold,
        _ => false,
    };
    if matched {
        RuleOutcome::Matched(RuleMatch::Metric)
    } else {
        RuleOutcome::NoMatch
    }
}

fn count_equals(count: u32, threshold: f64) -> bool {
    (f64::from(count) - threshold).abs() < f64::EPSILON
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::inference::delta::compute_delta;
    use crate::models::{
        AspectObservation, EntityObservation, FactSeverity, Period, PeriodType,
    };
    use crate::ontology::{ActionType, Class, RuleActionConfig, RuleCondition};

    fn period() -> Period {
        Period::new(
            NaiveDate::from_ymd_opt(2026, 2, 9).expect("date"),
            PeriodType::Week,
        )
    }

    fn schema() -> SchemaSnapshot {
        let class = |id, slug: &str, parent_id| Class {
            id,
            slug: slug.to_string(),
            name: slug.to_string(),
            parent_id,
            description: String::new(),
            sort_order: 0,
        };
        SchemaSnapshot::compile(
            vec![
                class(1, "organization", None),
                class(2, "brand", Some(1)),
                class(3, "product", None),
            ],
            Vec::new(),
            Vec::new(),
        )
        .expect("schema")
    }

    fn rule(entity_class: &str, metric: Metric, operator: Operator, threshold: f64) -> Rule {
        Rule {
            id: 1,
            name: "r".to_string(),
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
                title_template: String::new(),
                body_template: String::new(),
            },
        }
    }

    fn obs(mentions: u32, sentiment: f64, aspects: &[(&str, u32, f64)]) -> EntityObservation {
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
            ..EntityObservation::silent("x", period())
        }
    }

    #[test]
    fn sentiment_drop_threshold() {
        let schema = schema();
        let delta = compute_delta(obs(10, 0.4, &[]), Some(obs(10, 0.8, &[])), "Acme", "brand");
        let hit = rule("brand", Metric::AvgSentiment, Operator::DecreasePct, 40.0);
        assert_eq!(
            evaluate_rule(&schema, &hit, &delta),
            RuleOutcome::Matched(RuleMatch::Metric)
        );
        let miss = rule("brand", Metric::AvgSentiment, Operator::DecreasePct, 60.0);
        assert_eq!(evaluate_rule(&schema, &miss, &delta), RuleOutcome::NoMatch);
    }

    #[test]
    fn class_gate_uses_is_a() {
        let schema = schema();
        let delta = compute_delta(obs(10, 0.4, &[]), Some(obs(10, 0.8, &[])), "Acme", "brand");
        let org_rule = rule("organization", Metric::AvgSentiment, Operator::DecreasePct, 10.0);
        assert!(matches!(
            evaluate_rule(&schema, &org_rule, &delta),
            RuleOutcome::Matched(_)
        ));
        let product_rule = rule("product", Metric::AvgSentiment, Operator::DecreasePct, 10.0);
        assert_eq!(
            evaluate_rule(&schema, &product_rule, &delta),
            RuleOutcome::Skipped(SkipReason::ClassMismatch)
        );
    }

    #[test]
    fn volume_gate_and_missing_previous() {
        let schema = schema();
        let mut gated = rule("entity", Metric::AvgSentiment, Operator::DecreasePct, 10.0);
        gated.condition.min_mentions = 20;
        let delta = compute_delta(obs(10, 0.4, &[]), Some(obs(10, 0.8, &[])), "Acme", "brand");
        assert_eq!(
            evaluate_rule(&schema, &gated, &delta),
            RuleOutcome::Skipped(SkipReason::BelowMinMentions)
        );

        let first_period = compute_delta(obs(10, 0.4, &[]), None, "Acme", "brand");
        let sentiment = rule("entity", Metric::AvgSentiment, Operator::DecreasePct, 10.0);
        assert_eq!(
            evaluate_rule(&schema, &sentiment, &first_period),
            RuleOutcome::Skipped(SkipReason::MissingPrevious)
        );
    }

    #[test]
    fn silent_entity_matches_full_decrease() {
        let schema = schema();
        let delta = compute_delta(obs(0, 0.0, &[]), Some(obs(20, 0.6, &[])), "Phone", "product");
        let gone = rule("entity", Metric::MentionCount, Operator::DecreasePct, 100.0);
        assert_eq!(
            evaluate_rule(&schema, &gone, &delta),
            RuleOutcome::Matched(RuleMatch::Metric)
        );
    }

    #[test]
    fn mention_equals_checks_one_previous_period() {
        let schema = schema();
        let mut zero = rule("entity", Metric::MentionCount, Operator::Equals, 0.0);
        let first = compute_delta(obs(0, 0.0, &[]), None, "Phone", "product");
        assert_eq!(
            evaluate_rule(&schema, &zero, &first),
            RuleOutcome::Matched(RuleMatch::Metric)
        );

        zero.condition.consecutive_periods = 3;
        assert_eq!(
            evaluate_rule(&schema, &zero, &first),
            RuleOutcome::Skipped(SkipReason::MissingPrevious)
        );
        let still_quiet = compute_delta(obs(0, 0.0, &[]), Some(obs(0, 0.0, &[])), "Phone", "product");
        assert_eq!(
            evaluate_rule(&schema, &zero, &still_quiet),
            RuleOutcome::Matched(RuleMatch::Metric)
        );
        let just_quiet = compute_delta(obs(0, 0.0, &[]), Some(obs(4, 0.5, &[])), "Phone", "product");
        assert_eq!(evaluate_rule(&schema, &zero, &just_quiet), RuleOutcome::NoMatch);
    }

    #[test]
    fn new_aspects_respect_mention_floor() {
        let schema = schema();
        let mut new_aspects = rule("entity", Metric::NewAspects, Operator::Exists, 0.0);
        new_aspects.condition.min_aspect_mentions = 2;
        let delta = compute_delta(
            obs(6, 0.5, &[("battery", 3, 0.4), ("price", 1, 0.6)]),
            Some(obs(6, 0.5, &[])),
            "Phone",
            "product",
        );
        assert_eq!(
            evaluate_rule(&schema, &new_aspects, &delta),
            RuleOutcome::Matched(RuleMatch::NewAspects(vec!["battery".to_string()]))
        );
    }

    #[test]
    fn aspect_flips_yield_one_match_per_aspect() {
        let schema = schema();
        let flips = rule("entity", Metric::AspectSentiment, Operator::SignFlip, 0.0);
        let delta = compute_delta(
            obs(6, 0.5, &[("battery", 3, 0.3), ("screen", 2, 0.8), ("camera", 2, 0.7)]),
            Some(obs(6, 0.5, &[("battery", 3, 0.6), ("screen", 2, 0.2), ("camera", 2, 0.6)])),
            "Phone",
            "product",
        );
        let RuleOutcome::Matched(RuleMatch::AspectFlips(matched)) =
            evaluate_rule(&schema, &flips, &delta)
        else {
            panic!("expected aspect flips");
        };
        let names = matched.iter().map(|a| a.aspect.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["battery", "screen"]);
    }

    #[test]
    fn unsupported_combinations_are_counted_not_errors() {
        let schema = schema();
        let delta = compute_delta(obs(6, 0.5, &[]), Some(obs(6, 0.5, &[])), "Phone", "product");
        let unknown_metric = rule(
            "entity",
            Metric::Unsupported("follower_count".to_string()),
            Operator::IncreasePct,
            1.0,
        );
        assert_eq!(
            evaluate_rule(&schema, &unknown_metric, &delta),
            RuleOutcome::Skipped(SkipReason::UnsupportedCondition)
        );
        let wrong_operator = rule("entity", Metric::NewAspects, Operator::IncreasePct, 1.0);
        assert_eq!(
            evaluate_rule(&schema, &wrong_operator, &delta),
            RuleOutcome::Skipped(SkipReason::UnsupportedCondition)
        );
    }
}
