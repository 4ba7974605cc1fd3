use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;

use crate::error::{OntoscopeError, Result};
use crate::ontology::{
    ActionType, Cardinality, Class, KnownSlugs, RelationTypeDef, Rule, RuleWarning,
    SchemaDocument, validate_schema_document,
};
use crate::traits::SchemaSource;

use super::{SqliteStateStore, conversion_error, format_timestamp};

/// Outcome of importing one schema seed document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaImportReport {
    pub classes: usize,
    pub relation_types: usize,
    pub rules: usize,
    pub warnings: Vec<RuleWarning>,
}

impl SqliteStateStore {
    pub fn list_classes(&self) -> Result<Vec<Class>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT id, slug, name, parent_id, description, sort_order
                FROM ontology_classes
                ORDER BY sort_order ASC, id ASC
                ",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(Class {
                    id: row.get(0)?,
                    slug: row.get(1)?,
                    name: row.get(2)?,
                    parent_id: row.get(3)?,
                    description: row.get(4)?,
                    sort_order: row.get(5)?,
                })
            })?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn list_relation_types(&self) -> Result<Vec<RelationTypeDef>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT id, slug, name, source_class_id, target_class_id, cardinality, inverse_id, description
                FROM ontology_relation_types
                ORDER BY id ASC
                ",
            )?;
            let rows = stmt.query_map([], |row| {
                let cardinality = row.get::<_, String>(5)?;
                Ok(RelationTypeDef {
                    id: row.get(0)?,
                    slug: row.get(1)?,
                    name: row.get(2)?,
                    source_class_id: row.get(3)?,
                    target_class_id: row.get(4)?,
                    cardinality: Cardinality::parse(&cardinality).unwrap_or_default(),
                    inverse_id: row.get(6)?,
                    description: row.get(7)?,
                })
            })?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Active rules, highest priority first, ties broken by id.
    pub fn list_active_rules(&self) -> Result<Vec<Rule>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT id, name, description, priority, is_active, trigger_type,
                       condition_json, action_type, action_config_json
                FROM ontology_rules
                WHERE is_active = 1
                ORDER BY priority DESC, id ASC
                ",
            )?;
            let rows = stmt.query_map([], rule_from_row)?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Upserts classes by slug, relation types by slug and rules by name.
    /// Re-importing the same document changes nothing.
    pub fn import_schema_document(&self, doc: &SchemaDocument) -> Result<SchemaImportReport> {
        let report = self.with_tx(|tx| {
            let known = known_slugs(tx)?;
            let warnings = validate_schema_document(doc, &known)?;
            let now = format_timestamp(Utc::now());

            for class in &doc.classes {
                tx.execute(
                    r"
                    INSERT INTO ontology_classes(slug, name, description, sort_order, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(slug) DO UPDATE SET
                      name = excluded.name,
                      description = excluded.description,
                      sort_order = excluded.sort_order
                    ",
                    params![class.slug, class.name, class.description, class.sort_order, now],
                )?;
            }
            for class in &doc.classes {
                let parent_id = class
                    .parent
                    .as_deref()
                    .map(|parent| class_id_by_slug(tx, parent))
                    .transpose()?;
                tx.execute(
                    "UPDATE ontology_classes SET parent_id = ?2 WHERE slug = ?1",
                    params![class.slug, parent_id],
                )?;
            }

            for relation in &doc.relation_types {
                let source_class_id = class_id_by_slug(tx, &relation.source_class)?;
                let target_class_id = class_id_by_slug(tx, &relation.target_class)?;
                tx.execute(
                    r"
                    INSERT INTO ontology_relation_types(
                        slug, name, source_class_id, target_class_id, cardinality, description, created_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    ON CONFLICT(slug) DO UPDATE SET
                      name = excluded.name,
                      source_class_id = excluded.source_class_id,
                      target_class_id = excluded.target_class_id,
                      cardinality = excluded.cardinality,
                      description = excluded.description
                    ",
                    params![
                        relation.slug,
                        relation.name,
                        source_class_id,
                        target_class_id,
                        relation.cardinality.as_str(),
                        relation.description,
                        now,
                    ],
                )?;
            }
            for relation in &doc.relation_types {
                let inverse_id = relation
                    .inverse
                    .as_deref()
                    .map(|inverse| relation_type_id_by_slug(tx, inverse))
                    .transpose()?;
                tx.execute(
                    "UPDATE ontology_relation_types SET inverse_id = ?2 WHERE slug = ?1",
                    params![relation.slug, inverse_id],
                )?;
            }

            for rule in &doc.rules {
                tx.execute(
                    r"
                    INSERT INTO ontology_rules(
                        name, description, priority, is_active, trigger_type,
                        condition_json, action_type, action_config_json, created_at, updated_at
                    )
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                    ON CONFLICT(name) DO UPDATE SET
                      description = excluded.description,
                      priority = excluded.priority,
                      is_active = excluded.is_active,
                      trigger_type = excluded.trigger_type,
                      condition_json = excluded.condition_json,
                      action_type = excluded.action_type,
                      action_config_json = excluded.action_config_json,
                      updated_at = excluded.updated_at
                    ",
                    params![
                        rule.name,
                        rule.description,
                        rule.priority,
                        rule.is_active,
                        rule.trigger_type,
                        serde_json::to_string(&rule.condition)?,
                        rule.action_type.as_str(),
                        serde_json::to_string(&rule.action_config)?,
                        now,
                    ],
                )?;
            }

            Ok(SchemaImportReport {
                classes: doc.classes.len(),
                relation_types: doc.relation_types.len(),
                rules: doc.rules.len(),
                warnings,
            })
        })?;

        for warning in &report.warnings {
            tracing::warn!(rule = %warning.rule, "{}", warning.message);
        }
        tracing::info!(
            classes = report.classes,
            relation_types = report.relation_types,
            rules = report.rules,
            warnings = report.warnings.len(),
            "schema document imported"
        );
        Ok(report)
    }
}

fn known_slugs(conn: &Connection) -> Result<KnownSlugs> {
    Ok(KnownSlugs {
        classes: collect_strings(conn, "SELECT slug FROM ontology_classes")?,
        relation_types: collect_strings(conn, "SELECT slug FROM ontology_relation_types")?,
    })
}

fn collect_strings(conn: &Connection, sql: &str) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut out = HashSet::new();
    for row in rows {
        out.insert(row?);
    }
    Ok(out)
}

fn class_id_by_slug(conn: &Connection, slug: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM ontology_classes WHERE slug = ?1",
        params![slug],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .ok_or_else(|| OntoscopeError::NotFound(format!("ontology class {slug}")))
}

fn relation_type_id_by_slug(conn: &Connection, slug: &str) -> Result<i64> {
    conn.query_row(
        "SELECT id FROM ontology_relation_types WHERE slug = ?1",
        params![slug],
        |row| row.get::<_, i64>(0),
    )
    .optional()?
    .ok_or_else(|| OntoscopeError::NotFound(format!("relation type {slug}")))
}

fn rule_from_row(row: &Row<'_>) -> rusqlite::Result<Rule> {
    let condition = row.get::<_, String>(6)?;
    let action_type = row.get::<_, String>(7)?;
    let action_config = row.get::<_, String>(8)?;
    Ok(Rule {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        priority: row.get(3)?,
        is_active: row.get(4)?,
        trigger_type: row.get(5)?,
        condition: serde_json::from_str(&condition).map_err(|err| conversion_error(6, err))?,
        action_type: ActionType::from(action_type),
        action_config: serde_json::from_str(&action_config)
            .map_err(|err| conversion_error(8, err))?,
    })
}

impl SchemaSource for SqliteStateStore {
    fn list_classes(&self) -> Result<Vec<Class>> {
        SqliteStateStore::list_classes(self)
    }

    fn list_relation_types(&self) -> Result<Vec<RelationTypeDef>> {
        SqliteStateStore::list_relation_types(self)
    }

    fn list_active_rules(&self) -> Result<Vec<Rule>> {
        SqliteStateStore::list_active_rules(self)
    }
}
