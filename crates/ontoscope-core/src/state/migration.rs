use rusqlite::Connection;

use crate::error::{OntoscopeError, Result};

use super::SqliteStateStore;

const MIGRATION_SCHEMA_SQL: &str = r"
    PRAGMA journal_mode = WAL;
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS ontology_classes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        slug TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        parent_id INTEGER REFERENCES ontology_classes(id),
        description TEXT NOT NULL DEFAULT '',
        sort_order INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS ontology_relation_types (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        slug TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL,
        source_class_id INTEGER NOT NULL REFERENCES ontology_classes(id),
        target_class_id INTEGER NOT NULL REFERENCES ontology_classes(id),
        cardinality TEXT NOT NULL DEFAULT 'many_to_many',
        inverse_id INTEGER REFERENCES ontology_relation_types(id),
        description TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS ontology_rules (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT '',
        priority INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        trigger_type TEXT NOT NULL,
        condition_json TEXT NOT NULL,
        action_type TEXT NOT NULL,
        action_config_json TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_ontology_rules_active
    ON ontology_rules(is_active, priority DESC, id);

    CREATE TABLE IF NOT EXISTS objects (
        id TEXT PRIMARY KEY,
        object_type TEXT NOT NULL,
        class_id INTEGER,
        canonical_name TEXT NOT NULL,
        properties_json TEXT NOT NULL DEFAULT '{}',
        status TEXT NOT NULL DEFAULT 'active' CHECK(status IN ('active', 'merged', 'archived')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_objects_status_name
    ON objects(status, canonical_name);

    CREATE TABLE IF NOT EXISTS mentions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id TEXT NOT NULL,
        object_id TEXT NOT NULL,
        sentiment TEXT NOT NULL CHECK(sentiment IN ('positive', 'negative', 'neutral', 'mixed')),
        sentiment_score REAL NOT NULL,
        mention_text TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_mentions_object_created
    ON mentions(object_id, created_at DESC);

    CREATE INDEX IF NOT EXISTS idx_mentions_created
    ON mentions(created_at);

    CREATE TABLE IF NOT EXISTS aspect_mentions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id TEXT NOT NULL,
        object_id TEXT NOT NULL,
        aspect TEXT NOT NULL,
        sentiment TEXT NOT NULL CHECK(sentiment IN ('positive', 'negative', 'neutral', 'mixed')),
        sentiment_score REAL NOT NULL,
        mention_text TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_aspect_mentions_created
    ON aspect_mentions(created_at);

    CREATE TABLE IF NOT EXISTS object_relations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id TEXT NOT NULL,
        target_id TEXT NOT NULL,
        relation_type_id INTEGER NOT NULL REFERENCES ontology_relation_types(id),
        confidence REAL NOT NULL DEFAULT 1.0,
        origin TEXT NOT NULL DEFAULT 'manual',
        created_at TEXT NOT NULL,
        UNIQUE(source_id, target_id, relation_type_id)
    );

    CREATE INDEX IF NOT EXISTS idx_object_relations_target
    ON object_relations(target_id, relation_type_id);

    CREATE TABLE IF NOT EXISTS entity_observations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        object_id TEXT NOT NULL,
        period_start TEXT NOT NULL,
        period_type TEXT NOT NULL CHECK(period_type IN ('day', 'week')),
        mention_count INTEGER NOT NULL DEFAULT 0,
        positive_count INTEGER NOT NULL DEFAULT 0,
        negative_count INTEGER NOT NULL DEFAULT 0,
        neutral_count INTEGER NOT NULL DEFAULT 0,
        mixed_count INTEGER NOT NULL DEFAULT 0,
        avg_sentiment REAL NOT NULL DEFAULT 0,
        aspect_data_json TEXT NOT NULL DEFAULT '[]',
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE(object_id, period_start, period_type)
    );

    CREATE INDEX IF NOT EXISTS idx_entity_observations_period
    ON entity_observations(period_type, period_start);

    CREATE TABLE IF NOT EXISTS derived_facts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        object_id TEXT NOT NULL,
        fact_type TEXT NOT NULL,
        fact_key TEXT NOT NULL,
        severity TEXT NOT NULL CHECK(severity IN ('info', 'warning', 'critical')),
        title TEXT NOT NULL,
        description TEXT NOT NULL,
        evidence_json TEXT NOT NULL,
        derived_from_rule INTEGER REFERENCES ontology_rules(id) ON DELETE SET NULL,
        period_start TEXT NOT NULL,
        period_type TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        is_dismissed INTEGER NOT NULL DEFAULT 0,
        fingerprint TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        expires_at TEXT,
        UNIQUE(object_id, fact_key)
    );

    CREATE INDEX IF NOT EXISTS idx_derived_facts_inbox
    ON derived_facts(is_read, is_dismissed, created_at DESC);

    CREATE TABLE IF NOT EXISTS evaluation_leases (
        name TEXT PRIMARY KEY,
        owner TEXT NOT NULL,
        acquired_at TEXT NOT NULL,
        expires_at TEXT NOT NULL
    );
";

impl SqliteStateStore {
    pub fn migrate(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| OntoscopeError::mutex_poisoned("sqlite"))?;
        conn.execute_batch(MIGRATION_SCHEMA_SQL)?;
        ensure_required_column(
            &conn,
            "derived_facts",
            "fingerprint",
            "unsupported derived_facts schema: fingerprint is missing; reset the state database",
        )?;
        ensure_required_column(
            &conn,
            "entity_observations",
            "aspect_data_json",
            "unsupported entity_observations schema: aspect_data_json is missing; reset the state database",
        )?;
        drop(conn);
        Ok(())
    }
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for row in rows {
        if row? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn ensure_required_column(
    conn: &Connection,
    table: &str,
    column: &str,
    error_message: &'static str,
) -> Result<()> {
    if has_column(conn, table, column)? {
        Ok(())
    } else {
        Err(OntoscopeError::Validation(error_message.to_string()))
    }
}
