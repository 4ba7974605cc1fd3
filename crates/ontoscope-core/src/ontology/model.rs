use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{FactSeverity, FactType, TraverseDirection};

/// Class slug that every class is considered to be.
pub const ROOT_CLASS_WILDCARD: &str = "entity";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: i64,
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    #[default]
    ManyToMany,
}

impl Cardinality {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "one_to_one" => Some(Self::OneToOne),
            "one_to_many" => Some(Self::OneToMany),
            "many_to_one" => Some(Self::ManyToOne),
            "many_to_many" => Some(Self::ManyToMany),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationTypeDef {
    pub id: i64,
    pub slug: String,
    pub name: String,
    pub source_class_id: i64,
    pub target_class_id: i64,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub inverse_id: Option<i64>,
    #[serde(default)]
    pub description: String,
}

/// Metric a rule inspects. Unknown names are kept verbatim and never match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Metric {
    AvgSentiment,
    MentionCount,
    NewAspects,
    AspectSentiment,
    Unsupported(String),
}

impl Metric {
    pub fn as_str(&self) -> &str {
        match self {
            Self::AvgSentiment => "avg_sentiment",
            Self::MentionCount => "mention_count",
            Self::NewAspects => "new_aspects",
            Self::AspectSentiment => "aspect_sentiment",
            Self::Unsupported(raw) => raw,
        }
    }
}

impl From<String> for Metric {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "avg_sentiment" => Self::AvgSentiment,
            "mention_count" => Self::MentionCount,
            "new_aspects" => Self::NewAspects,
            "aspect_sentiment" => Self::AspectSentiment,
            _ => Self::Unsupported(raw),
        }
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        metric.as_str().to_string()
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    DecreasePct,
    IncreasePct,
    Equals,
    Exists,
    SignFlip,
    Unsupported(String),
}

impl Operator {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DecreasePct => "decrease_pct",
            Self::IncreasePct => "increase_pct",
            Self::Equals => "equals",
            Self::Exists => "exists",
            Self::SignFlip => "sign_flip",
            Self::Unsupported(raw) => raw,
        }
    }
}

impl From<String> for Operator {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "decrease_pct" => Self::DecreasePct,
            "increase_pct" => Self::IncreasePct,
            "equals" => Self::Equals,
            "exists" => Self::Exists,
            "sign_flip" => Self::SignFlip,
            _ => Self::Unsupported(raw),
        }
    }
}

impl From<Operator> for String {
    fn from(operator: Operator) -> Self {
        operator.as_str().to_string()
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionType {
    CreateAlert,
    DeriveFact,
    Propagate,
    Other(String),
}

impl ActionType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::CreateAlert => "create_alert",
            Self::DeriveFact => "derive_fact",
            Self::Propagate => "propagate",
            Self::Other(raw) => raw,
        }
    }
}

impl From<String> for ActionType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "create_alert" => Self::CreateAlert,
            "derive_fact" => Self::DeriveFact,
            "propagate" => Self::Propagate,
            _ => Self::Other(raw),
        }
    }
}

impl From<ActionType> for String {
    fn from(action: ActionType) -> Self {
        action.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleCondition {
    #[serde(default)]
    pub entity_class: String,
    pub metric: Metric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare: Option<String>,
    pub operator: Operator,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub min_mentions: u32,
    #[serde(default)]
    pub min_aspect_mentions: u32,
    #[serde(default)]
    pub consecutive_periods: u32,
}

impl RuleCondition {
    /// Aspect volume floor; zero means one.
    pub fn aspect_mention_floor(&self) -> u32 {
        self.min_aspect_mentions.max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraverseConfig {
    pub relation: String,
    #[serde(default)]
    pub direction: TraverseDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleActionConfig {
    #[serde(default)]
    pub severity: FactSeverity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_type: Option<FactType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traverse: Option<TraverseConfig>,
    #[serde(default)]
    pub title_template: String,
    #[serde(default)]
    pub body_template: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_trigger_type")]
    pub trigger_type: String,
    pub condition: RuleCondition,
    pub action_type: ActionType,
    pub action_config: RuleActionConfig,
}

impl Rule {
    /// Fact type of the action config, or the default implied by the action type.
    pub fn resolved_fact_type(&self) -> FactType {
        if let Some(fact_type) = self.action_config.fact_type {
            return fact_type;
        }
        match self.action_type {
            ActionType::CreateAlert => FactType::Alert,
            ActionType::Propagate => FactType::RiskSignal,
            ActionType::DeriveFact | ActionType::Other(_) => FactType::Trend,
        }
    }
}

/// Seed document imported into the schema store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default = "default_document_version")]
    pub version: u32,
    #[serde(default)]
    pub classes: Vec<ClassSeed>,
    #[serde(default)]
    pub relation_types: Vec<RelationTypeSeed>,
    #[serde(default)]
    pub rules: Vec<RuleSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassSeed {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelationTypeSeed {
    pub slug: String,
    pub name: String,
    pub source_class: String,
    pub target_class: String,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub inverse: Option<String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_trigger_type")]
    pub trigger_type: String,
    pub condition: RuleCondition,
    pub action_type: ActionType,
    pub action_config: RuleActionConfig,
}

fn default_true() -> bool {
    true
}

fn default_trigger_type() -> String {
    "observation_change".to_string()
}

fn default_document_version() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_metric_survives_parsing() {
        let condition: RuleCondition = serde_json::from_str(
            r#"{"entity_class":"product","metric":"follower_count","operator":"above","threshold":5}"#,
        )
        .expect("condition");
        assert_eq!(
            condition.metric,
            Metric::Unsupported("follower_count".to_string())
        );
        assert_eq!(
            condition.operator,
            Operator::Unsupported("above".to_string())
        );
        let encoded = serde_json::to_value(&condition).expect("encode");
        assert_eq!(encoded["metric"], "follower_count");
    }

    #[test]
    fn fact_type_defaults_follow_action_type() {
        let mut rule = Rule {
            id: 1,
            name: "r".to_string(),
            description: String::new(),
            priority: 0,
            is_active: true,
            trigger_type: default_trigger_type(),
            condition: RuleCondition {
                entity_class: String::new(),
                metric: Metric::AvgSentiment,
                compare: None,
                operator: Operator::DecreasePct,
                threshold: 10.0,
                min_mentions: 0,
                min_aspect_mentions: 0,
                consecutive_periods: 0,
            },
            action_type: ActionType::Propagate,
            action_config: RuleActionConfig {
                severity: FactSeverity::Warning,
                fact_type: None,
                traverse: None,
                title_template: String::new(),
                body_template: String::new(),
            },
        };
        assert_eq!(rule.resolved_fact_type(), FactType::RiskSignal);
        rule.action_type = ActionType::CreateAlert;
        assert_eq!(rule.resolved_fact_type(), FactType::Alert);
        rule.action_type = ActionType::DeriveFact;
        assert_eq!(rule.resolved_fact_type(), FactType::Trend);
        rule.action_config.fact_type = Some(FactType::Insight);
        assert_eq!(rule.resolved_fact_type(), FactType::Insight);
    }
}
