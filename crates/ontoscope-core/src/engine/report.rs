use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::inference::SkipReason;
use crate::models::{DerivedFact, Period, PeriodType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RulesSkipped {
    pub class_mismatch: usize,
    pub below_min_mentions: usize,
    pub missing_previous: usize,
    pub unsupported_condition: usize,
}

impl RulesSkipped {
    pub fn record(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::ClassMismatch => self.class_mismatch += 1,
            SkipReason::BelowMinMentions => self.below_min_mentions += 1,
            SkipReason::MissingPrevious => self.missing_previous += 1,
            SkipReason::UnsupportedCondition => self.unsupported_condition += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.class_mismatch + self.below_min_mentions + self.missing_previous + self.unsupported_condition
    }
}

/// Aggregate outcome of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub period_start: NaiveDate,
    pub period_type: PeriodType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub materialized: Option<usize>,
    pub schema_loaded_at: DateTime<Utc>,
    pub observations: usize,
    pub deltas: usize,
    pub silent_entities: usize,
    pub rules_checked: usize,
    pub rules_skipped: RulesSkipped,
    pub facts_created: usize,
    pub facts: Vec<DerivedFact>,
    pub narrative_facts: Vec<DerivedFact>,
    pub topics_promoted: usize,
    pub entity_failures: usize,
    pub fact_failures: usize,
}

impl EvaluationReport {
    pub(crate) fn new(period: Period, schema_loaded_at: DateTime<Utc>) -> Self {
        Self {
            period_start: period.start,
            period_type: period.period_type,
            materialized: None,
            schema_loaded_at,
            observations: 0,
            deltas: 0,
            silent_entities: 0,
            rules_checked: 0,
            rules_skipped: RulesSkipped::default(),
            facts_created: 0,
            facts: Vec::new(),
            narrative_facts: Vec::new(),
            topics_promoted: 0,
            entity_failures: 0,
            fact_failures: 0,
        }
    }

    pub fn period(&self) -> Period {
        Period::new(self.period_start, self.period_type)
    }
}
