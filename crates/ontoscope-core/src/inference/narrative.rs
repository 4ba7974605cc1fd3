use chrono::{Days, NaiveTime};

use crate::models::{DerivedFact, FactEvidence, FactSeverity, FactType, Period};
use crate::traits::NarrativeDraft;

/// Facts grouped per object, in order of first appearance, keeping groups of at least `min_facts`.
pub fn group_facts_by_object(facts: &[DerivedFact], min_facts: usize) -> Vec<(String, Vec<DerivedFact>)> {
    let mut groups: Vec<(String, Vec<DerivedFact>)> = Vec::new();
    for fact in facts {
        match groups.iter_mut().find(|(object_id, _)| *object_id == fact.object_id) {
            Some((_, group)) => group.push(fact.clone()),
            None => groups.push((fact.object_id.clone(), vec![fact.clone()])),
        }
    }
    groups.retain(|(_, group)| group.len() >= min_facts);
    groups
}

#[must_use]
pub fn narrative_fact_key(object_id: &str, period: Period) -> String {
    format!("narrative:{object_id}:{}", period.start_key())
}

/// Insight fact owned by no rule, expiring `expiry_days` after the period start.
pub fn narrative_fact(
    object_id: &str,
    entity_name: &str,
    entity_class: &str,
    period: Period,
    source_facts: usize,
    draft: NarrativeDraft,
    expiry_days: u64,
) -> DerivedFact {
    let expires_at = period
        .start
        .checked_add_days(Days::new(expiry_days))
        .map(|date| date.and_time(NaiveTime::MIN).and_utc());
    DerivedFact {
        id: None,
        object_id: object_id.to_string(),
        fact_type: FactType::Insight,
        fact_key: narrative_fact_key(object_id, period),
        severity: FactSeverity::Info,
        title: draft.title,
        description: draft.body,
        evidence: FactEvidence::Narrative {
            source_facts,
            entity_name: entity_name.to_string(),
            entity_class: entity_class.to_string(),
        },
        derived_from_rule: None,
        period,
        is_read: false,
        is_dismissed: false,
        created_at: None,
        expires_at,
    }
}
