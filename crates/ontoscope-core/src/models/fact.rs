use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{OntoscopeError, Result};

use super::period::Period;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactType {
    Alert,
    RiskSignal,
    Trend,
    Insight,
}

impl FactType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alert => "alert",
            Self::RiskSignal => "risk_signal",
            Self::Trend => "trend",
            Self::Insight => "insight",
        }
    }
}

impl fmt::Display for FactType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactType {
    type Err = OntoscopeError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "alert" => Ok(Self::Alert),
            "risk_signal" => Ok(Self::RiskSignal),
            "trend" => Ok(Self::Trend),
            "insight" => Ok(Self::Insight),
            other => Err(OntoscopeError::Validation(format!(
                "unsupported fact type: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactSeverity {
    #[default]
    Info,
    Warning,
    Critical,
}

impl FactSeverity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for FactSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactSeverity {
    type Err = OntoscopeError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim() {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critical" => Ok(Self::Critical),
            other => Err(OntoscopeError::Validation(format!(
                "unsupported severity: {other}"
            ))),
        }
    }
}

/// Structured record of why a fact exists. Stored as a JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactEvidence {
    Direct {
        rule_id: i64,
        rule_name: String,
        delta_pct: f64,
        current_value: f64,
        prev_value: f64,
    },
    NewAspects {
        rule_id: i64,
        rule_name: String,
        new_aspects: Vec<String>,
    },
    AspectFlip {
        rule_id: i64,
        rule_name: String,
        aspect: String,
        prev_sentiment: f64,
        current_sentiment: f64,
    },
    Propagated {
        rule_id: i64,
        rule_name: String,
        source_object_id: String,
        source_object_name: String,
        target_object_id: String,
        target_object_name: String,
        relation_slug: String,
        delta_pct: f64,
        current_value: f64,
        prev_value: f64,
    },
    Narrative {
        source_facts: usize,
        entity_name: String,
        entity_class: String,
    },
}

impl FactEvidence {
    pub fn rule_id(&self) -> Option<i64> {
        match self {
            Self::Direct { rule_id, .. }
            | Self::NewAspects { rule_id, .. }
            | Self::AspectFlip { rule_id, .. }
            | Self::Propagated { rule_id, .. } => Some(*rule_id),
            Self::Narrative { .. } => None,
        }
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

/// A conclusion produced by the engine, keyed per entity by `fact_key`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub object_id: String,
    pub fact_type: FactType,
    pub fact_key: String,
    pub severity: FactSeverity,
    pub title: String,
    pub description: String,
    pub evidence: FactEvidence,
    #[serde(default)]
    pub derived_from_rule: Option<i64>,
    pub period: Period,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub is_dismissed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl DerivedFact {
    /// Stable digest of the user-visible content of the fact.
    pub fn content_fingerprint(&self) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        for part in [
            self.fact_type.as_str(),
            self.severity.as_str(),
            self.title.as_str(),
            self.description.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update(&[0]);
        }
        hasher.update(self.evidence.to_json_string()?.as_bytes());
        hasher.update(&[0]);
        if let Some(expires_at) = self.expires_at {
            hasher.update(expires_at.to_rfc3339().as_bytes());
        }
        Ok(hasher.finalize().to_hex().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Result of an idempotent fact upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedFact {
    pub id: i64,
    pub outcome: SaveOutcome,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FactQuery {
    pub severity: Option<FactSeverity>,
    pub limit: usize,
    pub offset: usize,
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::models::PeriodType;

    fn sample_fact() -> DerivedFact {
        DerivedFact {
            id: None,
            object_id: "b1".to_string(),
            fact_type: FactType::Alert,
            fact_key: "sentiment_drop:2026-02-02".to_string(),
            severity: FactSeverity::Warning,
            title: "Acme sentiment down".to_string(),
            description: "dropped 40%".to_string(),
            evidence: FactEvidence::Direct {
                rule_id: 1,
                rule_name: "sentiment_drop".to_string(),
                delta_pct: -40.0,
                current_value: 0.3,
                prev_value: 0.5,
            },
            derived_from_rule: Some(1),
            period: Period::new(
                NaiveDate::from_ymd_opt(2026, 2, 2).expect("date"),
                PeriodType::Week,
            ),
            is_read: false,
            is_dismissed: false,
            created_at: None,
            expires_at: None,
        }
    }

    #[test]
    fn evidence_serializes_as_tagged_object() {
        let fact = sample_fact();
        let json: serde_json::Value =
            serde_json::from_str(&fact.evidence.to_json_string().expect("json")).expect("parse");
        assert_eq!(json["kind"], "direct");
        assert_eq!(json["rule_name"], "sentiment_drop");
        assert_eq!(json["prev_value"], 0.5);
    }

    #[test]
    fn fingerprint_ignores_read_flags_but_tracks_content() {
        let fact = sample_fact();
        let mut read = fact.clone();
        read.is_read = true;
        assert_eq!(
            fact.content_fingerprint().expect("fp"),
            read.content_fingerprint().expect("fp")
        );

        let mut changed = fact.clone();
        changed.description = "dropped 50%".to_string();
        assert_ne!(
            fact.content_fingerprint().expect("fp"),
            changed.content_fingerprint().expect("fp")
        );
    }
}
