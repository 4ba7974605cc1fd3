use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::{Map, Value};

use crate::error::{OntoscopeError, Result};
use crate::models::{
    AspectMention, Mention, ObjectRecord, ObjectRelation, ObjectStatus, ObjectType, RelationEdge,
    Sentiment, TraverseDirection,
};
use crate::traits::{EntityDirectory, RelationGraph};

use super::{
    SqliteStateStore, conversion_error, format_timestamp, parse_timestamp,
    usize_to_i64_saturating,
};

const OBJECT_COLUMNS: &str =
    "id, object_type, class_id, canonical_name, properties_json, status";

impl SqliteStateStore {
    /// Upsert on the object id.
    pub fn save_object(&self, object: &ObjectRecord) -> Result<()> {
        self.with_conn(|conn| upsert_object(conn, object))
    }

    pub fn list_active_objects(&self) -> Result<Vec<ObjectRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OBJECT_COLUMNS} FROM objects WHERE status = 'active' ORDER BY canonical_name ASC, id ASC"
            ))?;
            let rows = stmt.query_map([], object_from_row)?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn find_object_by_id(&self, object_id: &str) -> Result<Option<ObjectRecord>> {
        self.with_conn(|conn| {
            let object = conn
                .query_row(
                    &format!("SELECT {OBJECT_COLUMNS} FROM objects WHERE id = ?1"),
                    params![object_id],
                    object_from_row,
                )
                .optional()?;
            Ok(object)
        })
    }

    /// Merges `patch` into the stored properties; keys in the patch overwrite.
    pub fn update_properties(&self, object_id: &str, patch: &Map<String, Value>) -> Result<()> {
        self.with_tx(|tx| {
            let raw = tx
                .query_row(
                    "SELECT properties_json FROM objects WHERE id = ?1",
                    params![object_id],
                    |row| row.get::<_, String>(0),
                )
                .optional()?
                .ok_or_else(|| OntoscopeError::NotFound(format!("object {object_id}")))?;
            let mut properties = serde_json::from_str::<Map<String, Value>>(&raw)?;
            for (key, value) in patch {
                properties.insert(key.clone(), value.clone());
            }
            tx.execute(
                "UPDATE objects SET properties_json = ?2, updated_at = ?3 WHERE id = ?1",
                params![
                    object_id,
                    serde_json::to_string(&properties)?,
                    format_timestamp(Utc::now())
                ],
            )?;
            Ok(())
        })
    }

    pub fn save_mention(&self, mention: &Mention) -> Result<i64> {
        self.with_conn(|conn| insert_mention(conn, mention))
    }

    /// Newest first.
    pub fn find_mentions_by_object(&self, object_id: &str, limit: usize) -> Result<Vec<Mention>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r"
                SELECT id, post_id, object_id, sentiment, sentiment_score, mention_text, created_at
                FROM mentions
                WHERE object_id = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT ?2
                ",
            )?;
            let rows = stmt.query_map(
                params![object_id, usize_to_i64_saturating(limit)],
                mention_from_row,
            )?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn save_aspect(&self, aspect: &AspectMention) -> Result<i64> {
        self.with_conn(|conn| insert_aspect(conn, aspect))
    }

    /// Upsert on (source, target, relation type). Unknown relation slugs are `NotFound`.
    pub fn save_relation(&self, relation: &ObjectRelation) -> Result<()> {
        self.with_conn(|conn| upsert_relation(conn, relation))
    }

    /// Edges of `relation_slug` touching `object_id`, in creation order.
    pub fn traverse_relation(
        &self,
        object_id: &str,
        relation_slug: &str,
        direction: TraverseDirection,
    ) -> Result<Vec<RelationEdge>> {
        let endpoint_filter = match direction {
            TraverseDirection::Outgoing => "r.source_id = ?1",
            TraverseDirection::Incoming => "r.target_id = ?1",
            TraverseDirection::Both => "(r.source_id = ?1 OR r.target_id = ?1)",
        };
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                r"
                SELECT r.source_id, r.target_id, rt.slug
                FROM object_relations r
                JOIN ontology_relation_types rt ON rt.id = r.relation_type_id
                WHERE rt.slug = ?2 AND {endpoint_filter}
                ORDER BY r.created_at ASC, r.id ASC
                "
            ))?;
            let rows = stmt.query_map(params![object_id, relation_slug], |row| {
                Ok(RelationEdge {
                    source_id: row.get(0)?,
                    target_id: row.get(1)?,
                    relation_type: row.get(2)?,
                })
            })?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }
}

pub(super) fn upsert_object(conn: &Connection, object: &ObjectRecord) -> Result<()> {
    let now = format_timestamp(Utc::now());
    conn.execute(
        r"
        INSERT INTO objects(id, object_type, class_id, canonical_name, properties_json, status, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT(id) DO UPDATE SET
          object_type = excluded.object_type,
          class_id = excluded.class_id,
          canonical_name = excluded.canonical_name,
          properties_json = excluded.properties_json,
          status = excluded.status,
          updated_at = excluded.updated_at
        ",
        params![
            object.id,
            object.object_type.as_str(),
            object.class_id,
            object.canonical_name,
            serde_json::to_string(&object.properties)?,
            object.status.as_str(),
            now,
        ],
    )?;
    Ok(())
}

pub(super) fn insert_mention(conn: &Connection, mention: &Mention) -> Result<i64> {
    conn.execute(
        r"
        INSERT INTO mentions(post_id, object_id, sentiment, sentiment_score, mention_text, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ",
        params![
            mention.post_id,
            mention.object_id,
            mention.sentiment.as_str(),
            mention.sentiment_score,
            mention.mention_text,
            format_timestamp(mention.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn insert_aspect(conn: &Connection, aspect: &AspectMention) -> Result<i64> {
    conn.execute(
        r"
        INSERT INTO aspect_mentions(post_id, object_id, aspect, sentiment, sentiment_score, mention_text, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ",
        params![
            aspect.post_id,
            aspect.object_id,
            aspect.aspect,
            aspect.sentiment.as_str(),
            aspect.sentiment_score,
            aspect.mention_text,
            format_timestamp(aspect.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub(super) fn upsert_relation(conn: &Connection, relation: &ObjectRelation) -> Result<()> {
    let relation_type_id = conn
        .query_row(
            "SELECT id FROM ontology_relation_types WHERE slug = ?1",
            params![relation.relation_slug],
            |row| row.get::<_, i64>(0),
        )
        .optional()?
        .ok_or_else(|| {
            OntoscopeError::NotFound(format!("relation type {}", relation.relation_slug))
        })?;
    conn.execute(
        r"
        INSERT INTO object_relations(source_id, target_id, relation_type_id, confidence, origin, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(source_id, target_id, relation_type_id) DO UPDATE SET
          confidence = excluded.confidence,
          origin = excluded.origin
        ",
        params![
            relation.source_id,
            relation.target_id,
            relation_type_id,
            relation.confidence,
            relation.origin,
            format_timestamp(Utc::now()),
        ],
    )?;
    Ok(())
}

fn object_from_row(row: &Row<'_>) -> rusqlite::Result<ObjectRecord> {
    let object_type = row.get::<_, String>(1)?;
    let properties = row.get::<_, String>(4)?;
    let status = row.get::<_, String>(5)?;
    Ok(ObjectRecord {
        id: row.get(0)?,
        object_type: object_type
            .parse::<ObjectType>()
            .map_err(|err| conversion_error(1, err))?,
        class_id: row.get(2)?,
        canonical_name: row.get(3)?,
        properties: serde_json::from_str(&properties).map_err(|err| conversion_error(4, err))?,
        status: ObjectStatus::parse(&status).ok_or_else(|| {
            conversion_error(
                5,
                OntoscopeError::Validation(format!("unknown object status: {status}")),
            )
        })?,
    })
}

fn mention_from_row(row: &Row<'_>) -> rusqlite::Result<Mention> {
    let sentiment = row.get::<_, String>(3)?;
    let created_at = row.get::<_, String>(6)?;
    Ok(Mention {
        id: row.get(0)?,
        post_id: row.get(1)?,
        object_id: row.get(2)?,
        sentiment: Sentiment::parse(&sentiment).ok_or_else(|| {
            conversion_error(
                3,
                OntoscopeError::Validation(format!("unknown sentiment: {sentiment}")),
            )
        })?,
        sentiment_score: row.get(4)?,
        mention_text: row.get(5)?,
        created_at: parse_timestamp(&created_at).map_err(|err| conversion_error(6, err))?,
    })
}

impl EntityDirectory for SqliteStateStore {
    fn list_active_objects(&self) -> Result<Vec<ObjectRecord>> {
        SqliteStateStore::list_active_objects(self)
    }

    fn find_object_by_id(&self, object_id: &str) -> Result<Option<ObjectRecord>> {
        SqliteStateStore::find_object_by_id(self, object_id)
    }

    fn find_mentions_by_object(&self, object_id: &str, limit: usize) -> Result<Vec<Mention>> {
        SqliteStateStore::find_mentions_by_object(self, object_id, limit)
    }

    fn update_properties(&self, object_id: &str, patch: &Map<String, Value>) -> Result<()> {
        SqliteStateStore::update_properties(self, object_id, patch)
    }
}

impl RelationGraph for SqliteStateStore {
    fn traverse_relation(
        &self,
        object_id: &str,
        relation_slug: &str,
        direction: TraverseDirection,
    ) -> Result<Vec<RelationEdge>> {
        SqliteStateStore::traverse_relation(self, object_id, relation_slug, direction)
    }
}
