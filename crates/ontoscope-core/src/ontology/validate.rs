use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::error::{OntoscopeError, Result};

use super::model::{
    ClassSeed, Metric, Operator, ROOT_CLASS_WILDCARD, RuleSeed, SchemaDocument,
};

const SCHEMA_DOCUMENT_VERSION: u32 = 1;

/// Whether the evaluator has a semantics for this metric/operator pair.
pub fn is_supported_condition(metric: &Metric, operator: &Operator) -> bool {
    matches!(
        (metric, operator),
        (
            Metric::AvgSentiment,
            Operator::DecreasePct | Operator::IncreasePct
        ) | (
            Metric::MentionCount,
            Operator::DecreasePct | Operator::IncreasePct | Operator::Equals
        ) | (Metric::NewAspects, Operator::Exists)
            | (Metric::AspectSentiment, Operator::SignFlip)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleWarning {
    pub rule: String,
    pub message: String,
}

impl RuleWarning {
    fn new(rule: &RuleSeed, message: impl Into<String>) -> Self {
        Self {
            rule: rule.name.clone(),
            message: message.into(),
        }
    }
}

/// Slugs already present in the store, consulted for cross-references.
#[derive(Debug, Clone, Default)]
pub struct KnownSlugs {
    pub classes: HashSet<String>,
    pub relation_types: HashSet<String>,
}

/// Structural checks fail the import; rule authoring problems come back as warnings.
pub fn validate_schema_document(
    doc: &SchemaDocument,
    known: &KnownSlugs,
) -> Result<Vec<RuleWarning>> {
    if doc.version != SCHEMA_DOCUMENT_VERSION {
        return Err(OntoscopeError::Validation(format!(
            "schema document version mismatch: expected {SCHEMA_DOCUMENT_VERSION}, got {}",
            doc.version
        )));
    }

    let class_slugs = validate_classes(&doc.classes, &known.classes)?;

    let mut relation_slugs = known.relation_types.clone();
    let mut seen_relations = HashSet::new();
    for relation in &doc.relation_types {
        require_non_empty("relation type slug", &relation.slug)?;
        if !seen_relations.insert(relation.slug.as_str()) {
            return Err(OntoscopeError::Validation(format!(
                "duplicate relation type slug: {}",
                relation.slug
            )));
        }
        for (label, slug) in [
            ("source_class", &relation.source_class),
            ("target_class", &relation.target_class),
        ] {
            if !class_slugs.contains(slug.as_str()) {
                return Err(OntoscopeError::Validation(format!(
                    "relation type '{}' {label} is not a known class: {slug}",
                    relation.slug
                )));
            }
        }
        relation_slugs.insert(relation.slug.clone());
    }
    for relation in &doc.relation_types {
        if let Some(inverse) = relation.inverse.as_deref()
            && !relation_slugs.contains(inverse)
        {
            return Err(OntoscopeError::Validation(format!(
                "relation type '{}' inverse is not a known relation type: {inverse}",
                relation.slug
            )));
        }
    }

    let mut seen_rules = HashSet::new();
    let mut warnings = Vec::new();
    for rule in &doc.rules {
        require_non_empty("rule name", &rule.name)?;
        if !seen_rules.insert(rule.name.as_str()) {
            return Err(OntoscopeError::Validation(format!(
                "duplicate rule name: {}",
                rule.name
            )));
        }
        warnings.extend(rule_warnings(rule, &class_slugs, &relation_slugs));
    }
    Ok(warnings)
}

fn validate_classes<'a>(
    classes: &'a [ClassSeed],
    known: &'a HashSet<String>,
) -> Result<HashSet<&'a str>> {
    let mut parents = HashMap::<&str, Option<&str>>::new();
    for class in classes {
        require_non_empty("class slug", &class.slug)?;
        if parents
            .insert(class.slug.as_str(), class.parent.as_deref())
            .is_some()
        {
            return Err(OntoscopeError::Validation(format!(
                "duplicate class slug: {}",
                class.slug
            )));
        }
    }

    let mut all = known.iter().map(String::as_str).collect::<HashSet<_>>();
    all.extend(parents.keys().copied());

    for class in classes {
        if let Some(parent) = class.parent.as_deref() {
            if !all.contains(parent) {
                return Err(OntoscopeError::Validation(format!(
                    "class '{}' parent is not a known class: {parent}",
                    class.slug
                )));
            }
            let mut seen = HashSet::from([class.slug.as_str()]);
            let mut cursor = Some(parent);
            while let Some(slug) = cursor {
                if !seen.insert(slug) {
                    return Err(OntoscopeError::Validation(format!(
                        "class hierarchy cycle through '{}'",
                        class.slug
                    )));
                }
                cursor = parents.get(slug).copied().flatten();
            }
        }
    }
    Ok(all)
}

fn rule_warnings(
    rule: &RuleSeed,
    class_slugs: &HashSet<&str>,
    relation_slugs: &HashSet<String>,
) -> Vec<RuleWarning> {
    let condition = &rule.condition;
    let mut warnings = Vec::new();

    if let Metric::Unsupported(metric) = &condition.metric {
        warnings.push(RuleWarning::new(
            rule,
            format!("metric '{metric}' is not evaluated; the rule never fires"),
        ));
    } else if !is_supported_condition(&condition.metric, &condition.operator) {
        warnings.push(RuleWarning::new(
            rule,
            format!(
                "operator '{}' is not supported for metric '{}'; the rule never fires",
                condition.operator, condition.metric
            ),
        ));
    }

    let entity_class = condition.entity_class.as_str();
    if !entity_class.is_empty()
        && entity_class != ROOT_CLASS_WILDCARD
        && !class_slugs.contains(entity_class)
    {
        warnings.push(RuleWarning::new(
            rule,
            format!("entity_class '{entity_class}' is not a known class"),
        ));
    }

    if condition.threshold < 0.0 {
        warnings.push(RuleWarning::new(
            rule,
            "threshold is negative; percentage operators compare against its sign",
        ));
    }

    if condition.consecutive_periods > 2 {
        warnings.push(RuleWarning::new(
            rule,
            "consecutive_periods above 2 only compares the immediately previous period",
        ));
    }
    if condition.consecutive_periods > 1
        && !(condition.metric == Metric::MentionCount && condition.operator == Operator::Equals)
    {
        warnings.push(RuleWarning::new(
            rule,
            "consecutive_periods only applies to mention_count equals",
        ));
    }

    if let Some(traverse) = &rule.action_config.traverse
        && !relation_slugs.contains(&traverse.relation)
    {
        warnings.push(RuleWarning::new(
            rule,
            format!(
                "traverse relation '{}' is not a known relation type",
                traverse.relation
            ),
        ));
    }

    if rule.action_config.title_template.trim().is_empty() {
        warnings.push(RuleWarning::new(rule, "title_template is empty"));
    }

    warnings
}

fn require_non_empty(label: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(OntoscopeError::Validation(format!("{label} must not be empty")));
    }
    Ok(())
}
