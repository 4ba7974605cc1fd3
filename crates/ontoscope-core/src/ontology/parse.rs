use std::path::Path;

use crate::error::{OntoscopeError, Result};

use super::model::SchemaDocument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Toml,
    Json,
}

impl DocumentFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("toml") => Ok(Self::Toml),
            Some("json") => Ok(Self::Json),
            _ => Err(OntoscopeError::Validation(format!(
                "unsupported document extension: {}",
                path.display()
            ))),
        }
    }
}

pub fn parse_schema_document(raw: &str, format: DocumentFormat) -> Result<SchemaDocument> {
    match format {
        DocumentFormat::Toml => toml::from_str::<SchemaDocument>(raw).map_err(|err| {
            OntoscopeError::Validation(format!("schema document parse failed: {err}"))
        }),
        DocumentFormat::Json => serde_json::from_str::<SchemaDocument>(raw).map_err(|err| {
            OntoscopeError::Validation(format!("schema document parse failed: {err}"))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::model::{Metric, Operator};

    #[test]
    fn toml_document_parses_nested_rule_tables() {
        let raw = r#"
            [[classes]]
            slug = "organization"
            name = "Organization"

            [[classes]]
            slug = "brand"
            name = "Brand"
            parent = "organization"

            [[rules]]
            name = "sentiment_drop"
            priority = 10
            action_type = "create_alert"

            [rules.condition]
            entity_class = "brand"
            metric = "avg_sentiment"
            operator = "decrease_pct"
            threshold = 15.0

            [rules.action_config]
            severity = "warning"
            title_template = "{{entity.name}} sentiment down {{delta_pct}}%"
        "#;
        let doc = parse_schema_document(raw, DocumentFormat::Toml).expect("parse");
        assert_eq!(doc.version, 1);
        assert_eq!(doc.classes[1].parent.as_deref(), Some("organization"));
        assert_eq!(doc.rules[0].condition.metric, Metric::AvgSentiment);
        assert_eq!(doc.rules[0].condition.operator, Operator::DecreasePct);
        assert!(doc.rules[0].is_active);
    }

    #[test]
    fn unknown_top_level_fields_are_rejected() {
        let err = parse_schema_document(r#"{"version":1,"objects":[]}"#, DocumentFormat::Json)
            .expect_err("unknown field");
        assert!(matches!(err, OntoscopeError::Validation(_)));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("seed/schema.TOML")).expect("toml"),
            DocumentFormat::Toml
        );
        assert!(DocumentFormat::from_path(Path::new("schema.yaml")).is_err());
    }
}
