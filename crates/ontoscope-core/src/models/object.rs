use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{OntoscopeError, Result};

pub const TOPIC_STATUS_PROPERTY: &str = "topic_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Brand,
    Product,
    Place,
    Person,
    Work,
    Event,
    Organization,
    ContentTopic,
}

impl ObjectType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Brand => "brand",
            Self::Product => "product",
            Self::Place => "place",
            Self::Person => "person",
            Self::Work => "work",
            Self::Event => "event",
            Self::Organization => "organization",
            Self::ContentTopic => "content_topic",
        }
    }

    /// Ontology class slug used when an object carries no explicit class id.
    pub const fn default_class_slug(self) -> &'static str {
        match self {
            Self::Work => "creative_work",
            Self::ContentTopic => "topic",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = OntoscopeError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "brand" => Ok(Self::Brand),
            "product" => Ok(Self::Product),
            "place" => Ok(Self::Place),
            "person" => Ok(Self::Person),
            "work" => Ok(Self::Work),
            "event" => Ok(Self::Event),
            "organization" => Ok(Self::Organization),
            "content_topic" => Ok(Self::ContentTopic),
            other => Err(OntoscopeError::Validation(format!(
                "unsupported object type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectStatus {
    #[default]
    Active,
    Merged,
    Archived,
}

impl ObjectStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Merged => "merged",
            Self::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "merged" => Some(Self::Merged),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicStatus {
    Emerging,
    Active,
    Archived,
}

impl TopicStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Emerging => "emerging",
            Self::Active => "active",
            Self::Archived => "archived",
        }
    }
}

/// A tracked entity as seen by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: String,
    pub object_type: ObjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<i64>,
    pub canonical_name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub status: ObjectStatus,
}

impl ObjectRecord {
    pub fn new(id: impl Into<String>, object_type: ObjectType, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            object_type,
            class_id: None,
            canonical_name: name.into(),
            properties: Map::new(),
            status: ObjectStatus::Active,
        }
    }

    #[must_use]
    pub fn topic_status(&self) -> Option<&str> {
        self.properties
            .get(TOPIC_STATUS_PROPERTY)
            .and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    Mixed,
}

impl Sentiment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
            Self::Neutral => "neutral",
            Self::Mixed => "mixed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "positive" => Some(Self::Positive),
            "negative" => Some(Self::Negative),
            "neutral" => Some(Self::Neutral),
            "mixed" => Some(Self::Mixed),
            _ => None,
        }
    }
}

/// One post mentioning one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    #[serde(default)]
    pub id: i64,
    pub post_id: String,
    pub object_id: String,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    #[serde(default)]
    pub mention_text: String,
    pub created_at: DateTime<Utc>,
}

/// One opinion about an aspect of an entity inside a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectMention {
    pub post_id: String,
    pub object_id: String,
    pub aspect: String,
    pub sentiment: Sentiment,
    pub sentiment_score: f64,
    #[serde(default)]
    pub mention_text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraverseDirection {
    #[default]
    Outgoing,
    Incoming,
    Both,
}

impl TraverseDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outgoing => "outgoing",
            Self::Incoming => "incoming",
            Self::Both => "both",
        }
    }
}

impl FromStr for TraverseDirection {
    type Err = OntoscopeError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "outgoing" => Ok(Self::Outgoing),
            "incoming" => Ok(Self::Incoming),
            "both" => Ok(Self::Both),
            other => Err(OntoscopeError::Validation(format!(
                "unsupported traverse direction: {other}"
            ))),
        }
    }
}

/// A typed edge returned by relation traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationEdge {
    pub source_id: String,
    pub target_id: String,
    pub relation_type: String,
}

impl RelationEdge {
    /// The endpoint that is not `origin`. Self-loops resolve to the origin itself.
    #[must_use]
    pub fn other_end(&self, origin: &str) -> &str {
        if self.source_id == origin {
            &self.target_id
        } else {
            &self.source_id
        }
    }
}

/// A typed relation as stored, used when importing graph data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRelation {
    pub source_id: String,
    pub target_id: String,
    pub relation_slug: String,
    #[serde(default = "default_relation_confidence")]
    pub confidence: f64,
    #[serde(default = "default_relation_origin")]
    pub origin: String,
}

fn default_relation_confidence() -> f64 {
    1.0
}

fn default_relation_origin() -> String {
    "manual".to_string()
}
