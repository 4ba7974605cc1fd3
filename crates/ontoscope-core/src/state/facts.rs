use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{OptionalExtension, Row, params, params_from_iter, types::Value};

use crate::error::{OntoscopeError, Result};
use crate::models::{
    DerivedFact, FactEvidence, FactQuery, FactSeverity, FactType, Period, SaveOutcome, SavedFact,
};
use crate::traits::FactStore;

use super::{
    SqliteStateStore, conversion_error, format_timestamp, parse_timestamp,
    usize_to_i64_saturating,
};

const DEFAULT_FACT_LIST_LIMIT: usize = 50;

const FACT_COLUMNS: &str = r"
    id, object_id, fact_type, fact_key, severity, title, description, evidence_json,
    derived_from_rule, period_start, period_type, is_read, is_dismissed, created_at, expires_at
";

impl SqliteStateStore {
    /// Upsert on `(object_id, fact_key)`. Every write clears the read and dismissed
    /// flags so a recurring condition resurfaces in the inbox.
    pub fn save_fact(&self, fact: &DerivedFact) -> Result<SavedFact> {
        let fingerprint = fact.content_fingerprint()?;
        let evidence = fact.evidence.to_json_string()?;
        // Stored text keeps microseconds; the returned value must match it.
        let now = Utc::now().trunc_subsecs(6);
        let now_text = format_timestamp(now);
        let expires_at = fact.expires_at.map(format_timestamp);

        self.with_tx(|tx| {
            let existing = tx
                .query_row(
                    "SELECT id, fingerprint, created_at FROM derived_facts WHERE object_id = ?1 AND fact_key = ?2",
                    params![fact.object_id, fact.fact_key],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            match existing {
                None => {
                    tx.execute(
                        r"
                        INSERT INTO derived_facts(
                            object_id, fact_type, fact_key, severity, title, description,
                            evidence_json, derived_from_rule, period_start, period_type,
                            is_read, is_dismissed, fingerprint, created_at, updated_at, expires_at
                        )
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, 0, ?11, ?12, ?12, ?13)
                        ",
                        params![
                            fact.object_id,
                            fact.fact_type.as_str(),
                            fact.fact_key,
                            fact.severity.as_str(),
                            fact.title,
                            fact.description,
                            evidence,
                            fact.derived_from_rule,
                            fact.period.start_key(),
                            fact.period.period_type.as_str(),
                            fingerprint,
                            now_text,
                            expires_at,
                        ],
                    )?;
                    Ok(SavedFact {
                        id: tx.last_insert_rowid(),
                        outcome: SaveOutcome::Created,
                        created_at: now,
                    })
                }
                Some((id, previous_fingerprint, created_at)) => {
                    tx.execute(
                        r"
                        UPDATE derived_facts SET
                          fact_type = ?2,
                          severity = ?3,
                          title = ?4,
                          description = ?5,
                          evidence_json = ?6,
                          derived_from_rule = ?7,
                          period_start = ?8,
                          period_type = ?9,
                          expires_at = ?10,
                          fingerprint = ?11,
                          updated_at = ?12,
                          is_read = 0,
                          is_dismissed = 0
                        WHERE id = ?1
                        ",
                        params![
                            id,
                            fact.fact_type.as_str(),
                            fact.severity.as_str(),
                            fact.title,
                            fact.description,
                            evidence,
                            fact.derived_from_rule,
                            fact.period.start_key(),
                            fact.period.period_type.as_str(),
                            expires_at,
                            fingerprint,
                            now_text,
                        ],
                    )?;
                    let outcome = if previous_fingerprint == fingerprint {
                        SaveOutcome::Unchanged
                    } else {
                        SaveOutcome::Updated
                    };
                    Ok(SavedFact {
                        id,
                        outcome,
                        created_at: parse_timestamp(&created_at)?,
                    })
                }
            }
        })
    }

    pub fn find_fact_by_key(&self, object_id: &str, fact_key: &str) -> Result<Option<DerivedFact>> {
        self.with_conn(|conn| {
            let fact = conn
                .query_row(
                    &format!(
                        "SELECT {FACT_COLUMNS} FROM derived_facts WHERE object_id = ?1 AND fact_key = ?2"
                    ),
                    params![object_id, fact_key],
                    fact_from_row,
                )
                .optional()?;
            Ok(fact)
        })
    }

    pub fn find_fact(&self, id: i64) -> Result<Option<DerivedFact>> {
        self.with_conn(|conn| {
            let fact = conn
                .query_row(
                    &format!("SELECT {FACT_COLUMNS} FROM derived_facts WHERE id = ?1"),
                    params![id],
                    fact_from_row,
                )
                .optional()?;
            Ok(fact)
        })
    }

    /// Inbox view: not read, not dismissed, not expired; newest first.
    pub fn list_unread_facts(&self, query: &FactQuery) -> Result<Vec<DerivedFact>> {
        let mut sql = format!(
            "SELECT {FACT_COLUMNS} FROM derived_facts
             WHERE is_read = 0 AND is_dismissed = 0
               AND (expires_at IS NULL OR expires_at > ?1)"
        );
        let mut args = vec![Value::Text(format_timestamp(Utc::now()))];
        if let Some(severity) = query.severity {
            sql.push_str(" AND severity = ?2");
            args.push(Value::Text(severity.as_str().to_string()));
        }
        let next = args.len() + 1;
        sql.push_str(&format!(
            " ORDER BY created_at DESC, id DESC LIMIT ?{next} OFFSET ?{}",
            next + 1
        ));
        args.push(Value::Integer(usize_to_i64_saturating(list_limit(query.limit))));
        args.push(Value::Integer(usize_to_i64_saturating(query.offset)));

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(args.iter()), fact_from_row)?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Facts attached to one entity, excluding dismissed and expired ones.
    pub fn list_facts_by_object(
        &self,
        object_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<DerivedFact>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FACT_COLUMNS} FROM derived_facts
                 WHERE object_id = ?1 AND is_dismissed = 0
                   AND (expires_at IS NULL OR expires_at > ?2)
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?3 OFFSET ?4"
            ))?;
            let rows = stmt.query_map(
                params![
                    object_id,
                    format_timestamp(Utc::now()),
                    usize_to_i64_saturating(list_limit(limit)),
                    usize_to_i64_saturating(offset)
                ],
                fact_from_row,
            )?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    pub fn count_unread_facts(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                r"
                SELECT COUNT(*) FROM derived_facts
                WHERE is_read = 0 AND is_dismissed = 0
                  AND (expires_at IS NULL OR expires_at > ?1)
                ",
                params![format_timestamp(Utc::now())],
                |row| row.get::<_, i64>(0),
            )?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    pub fn mark_as_read(&self, id: i64) -> Result<()> {
        self.set_fact_flag(id, "is_read")
    }

    pub fn mark_as_dismissed(&self, id: i64) -> Result<()> {
        self.set_fact_flag(id, "is_dismissed")
    }

    fn set_fact_flag(&self, id: i64, column: &'static str) -> Result<()> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                &format!("UPDATE derived_facts SET {column} = 1 WHERE id = ?1"),
                params![id],
            )?;
            if changed == 0 {
                return Err(OntoscopeError::NotFound(format!("fact {id}")));
            }
            Ok(())
        })
    }

    /// Removes facts whose expiry lies strictly before `now`.
    pub fn delete_expired_facts(&self, now: DateTime<Utc>) -> Result<usize> {
        let removed = self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM derived_facts WHERE expires_at IS NOT NULL AND expires_at < ?1",
                params![format_timestamp(now)],
            )?;
            Ok(removed)
        })?;
        if removed > 0 {
            tracing::info!(removed, "expired facts deleted");
        }
        Ok(removed)
    }
}

fn list_limit(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_FACT_LIST_LIMIT
    } else {
        limit
    }
}

fn fact_from_row(row: &Row<'_>) -> rusqlite::Result<DerivedFact> {
    let fact_type = row.get::<_, String>(2)?;
    let severity = row.get::<_, String>(4)?;
    let evidence = row.get::<_, String>(7)?;
    let period_start = row.get::<_, String>(9)?;
    let period_type = row.get::<_, String>(10)?;
    let created_at = row.get::<_, String>(13)?;
    let expires_at = row.get::<_, Option<String>>(14)?;

    Ok(DerivedFact {
        id: Some(row.get(0)?),
        object_id: row.get(1)?,
        fact_type: fact_type
            .parse::<FactType>()
            .map_err(|err| conversion_error(2, err))?,
        fact_key: row.get(3)?,
        severity: severity
            .parse::<FactSeverity>()
            .map_err(|err| conversion_error(4, err))?,
        title: row.get(5)?,
        description: row.get(6)?,
        evidence: FactEvidence::from_json_str(&evidence).map_err(|err| conversion_error(7, err))?,
        derived_from_rule: row.get(8)?,
        period: Period::parse(&period_start, &period_type)
            .map_err(|err| conversion_error(9, err))?,
        is_read: row.get(11)?,
        is_dismissed: row.get(12)?,
        created_at: Some(parse_timestamp(&created_at).map_err(|err| conversion_error(13, err))?),
        expires_at: expires_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()
            .map_err(|err| conversion_error(14, err))?,
    })
}

impl FactStore for SqliteStateStore {
    fn save_fact(&self, fact: &DerivedFact) -> Result<SavedFact> {
        SqliteStateStore::save_fact(self, fact)
    }
}
