use std::collections::BTreeMap;

use chrono::{NaiveTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::Result;
use crate::models::{
    AspectObservation, EntityObservation, Period, PeriodType, parse_period_date,
};
use crate::traits::ObservationSource;

use super::{
    SqliteStateStore, conversion_error, format_timestamp, i64_to_u32_saturating,
    usize_to_i64_saturating,
};

const OBSERVATION_COLUMNS: &str = r"
    object_id, period_start, period_type, mention_count, positive_count,
    negative_count, neutral_count, mixed_count, avg_sentiment, aspect_data_json
";

impl SqliteStateStore {
    /// Upsert on (object, period start, period type).
    pub fn save_observation(&self, observation: &EntityObservation) -> Result<()> {
        self.with_conn(|conn| upsert_observation(conn, observation))
    }

    pub fn find_observation(
        &self,
        object_id: &str,
        period: Period,
    ) -> Result<Option<EntityObservation>> {
        self.with_conn(|conn| {
            let observation = conn
                .query_row(
                    &format!(
                        "SELECT {OBSERVATION_COLUMNS} FROM entity_observations
                         WHERE object_id = ?1 AND period_start = ?2 AND period_type = ?3"
                    ),
                    params![object_id, period.start_key(), period.period_type.as_str()],
                    observation_from_row,
                )
                .optional()?;
            Ok(observation)
        })
    }

    /// Latest observation of the same period type strictly before `period.start`.
    pub fn find_previous_observation(
        &self,
        object_id: &str,
        period: Period,
    ) -> Result<Option<EntityObservation>> {
        self.with_conn(|conn| {
            let observation = conn
                .query_row(
                    &format!(
                        "SELECT {OBSERVATION_COLUMNS} FROM entity_observations
                         WHERE object_id = ?1 AND period_type = ?2 AND period_start < ?3
                         ORDER BY period_start DESC
                         LIMIT 1"
                    ),
                    params![object_id, period.period_type.as_str(), period.start_key()],
                    observation_from_row,
                )
                .optional()?;
            Ok(observation)
        })
    }

    /// Newest first.
    pub fn list_recent_observations(
        &self,
        object_id: &str,
        period_type: PeriodType,
        limit: usize,
    ) -> Result<Vec<EntityObservation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OBSERVATION_COLUMNS} FROM entity_observations
                 WHERE object_id = ?1 AND period_type = ?2
                 ORDER BY period_start DESC
                 LIMIT ?3"
            ))?;
            let rows = stmt.query_map(
                params![object_id, period_type.as_str(), usize_to_i64_saturating(limit)],
                observation_from_row,
            )?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Busiest entities first.
    pub fn list_observations_for_period(&self, period: Period) -> Result<Vec<EntityObservation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {OBSERVATION_COLUMNS} FROM entity_observations
                 WHERE period_start = ?1 AND period_type = ?2
                 ORDER BY mention_count DESC, object_id ASC"
            ))?;
            let rows = stmt.query_map(
                params![period.start_key(), period.period_type.as_str()],
                observation_from_row,
            )?;

            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Aggregates raw mentions and aspect mentions created inside `period` into one
    /// observation row per mentioned entity. Returns the number of rows written.
    pub fn materialize_observations(&self, period: Period) -> Result<usize> {
        let window_start = format_timestamp(period.start.and_time(NaiveTime::MIN).and_utc());
        let window_end = format_timestamp(period.end().and_time(NaiveTime::MIN).and_utc());
        let now = format_timestamp(Utc::now());

        let written = self.with_tx(|tx| {
            let written = tx.execute(
                r"
                INSERT INTO entity_observations(
                    object_id, period_start, period_type, mention_count, positive_count,
                    negative_count, neutral_count, mixed_count, avg_sentiment,
                    aspect_data_json, created_at, updated_at
                )
                SELECT
                    m.object_id,
                    ?1,
                    ?2,
                    COUNT(*),
                    SUM(CASE WHEN m.sentiment = 'positive' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN m.sentiment = 'negative' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN m.sentiment = 'neutral' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN m.sentiment = 'mixed' THEN 1 ELSE 0 END),
                    COALESCE(AVG(m.sentiment_score), 0),
                    '[]',
                    ?5,
                    ?5
                FROM mentions m
                WHERE m.created_at >= ?3 AND m.created_at < ?4
                GROUP BY m.object_id
                ON CONFLICT(object_id, period_start, period_type) DO UPDATE SET
                  mention_count = excluded.mention_count,
                  positive_count = excluded.positive_count,
                  negative_count = excluded.negative_count,
                  neutral_count = excluded.neutral_count,
                  mixed_count = excluded.mixed_count,
                  avg_sentiment = excluded.avg_sentiment,
                  aspect_data_json = excluded.aspect_data_json,
                  updated_at = excluded.updated_at
                ",
                params![
                    period.start_key(),
                    period.period_type.as_str(),
                    window_start,
                    window_end,
                    now
                ],
            )?;

            let aspects = aggregate_aspects(tx, &window_start, &window_end)?;
            for (object_id, aspect_data) in aspects {
                tx.execute(
                    r"
                    UPDATE entity_observations
                    SET aspect_data_json = ?4
                    WHERE object_id = ?1 AND period_start = ?2 AND period_type = ?3
                    ",
                    params![
                        object_id,
                        period.start_key(),
                        period.period_type.as_str(),
                        serde_json::to_string(&aspect_data)?
                    ],
                )?;
            }
            Ok(written)
        })?;

        tracing::debug!(period = %period, rows = written, "observations aggregated");
        Ok(written)
    }
}

/// Per entity: aspects ordered by mention count, average score rounded to 3 decimals.
fn aggregate_aspects(
    conn: &Connection,
    window_start: &str,
    window_end: &str,
) -> Result<BTreeMap<String, Vec<AspectObservation>>> {
    let mut stmt = conn.prepare(
        r"
        SELECT object_id, aspect, COUNT(*) AS cnt, AVG(sentiment_score)
        FROM aspect_mentions
        WHERE created_at >= ?1 AND created_at < ?2
        GROUP BY object_id, aspect
        ORDER BY object_id ASC, cnt DESC, aspect ASC
        ",
    )?;
    let rows = stmt.query_map(params![window_start, window_end], |row| {
        Ok((
            row.get::<_, String>(0)?,
            AspectObservation {
                aspect: row.get(1)?,
                count: i64_to_u32_saturating(row.get(2)?),
                avg_sentiment: round_to_millis(row.get::<_, Option<f64>>(3)?.unwrap_or(0.0)),
            },
        ))
    })?;

    let mut out = BTreeMap::<String, Vec<AspectObservation>>::new();
    for row in rows {
        let (object_id, aspect) = row?;
        out.entry(object_id).or_default().push(aspect);
    }
    Ok(out)
}

fn round_to_millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub(super) fn upsert_observation(conn: &Connection, observation: &EntityObservation) -> Result<()> {
    let now = format_timestamp(Utc::now());
    conn.execute(
        r"
        INSERT INTO entity_observations(
            object_id, period_start, period_type, mention_count, positive_count,
            negative_count, neutral_count, mixed_count, avg_sentiment,
            aspect_data_json, created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
        ON CONFLICT(object_id, period_start, period_type) DO UPDATE SET
          mention_count = excluded.mention_count,
          positive_count = excluded.positive_count,
          negative_count = excluded.negative_count,
          neutral_count = excluded.neutral_count,
          mixed_count = excluded.mixed_count,
          avg_sentiment = excluded.avg_sentiment,
          aspect_data_json = excluded.aspect_data_json,
          updated_at = excluded.updated_at
        ",
        params![
            observation.object_id,
            observation.period.start_key(),
            observation.period.period_type.as_str(),
            observation.mention_count,
            observation.positive_count,
            observation.negative_count,
            observation.neutral_count,
            observation.mixed_count,
            observation.avg_sentiment,
            serde_json::to_string(&observation.aspect_data)?,
            now,
        ],
    )?;
    Ok(())
}

fn observation_from_row(row: &Row<'_>) -> rusqlite::Result<EntityObservation> {
    let period_start = row.get::<_, String>(1)?;
    let period_type = row.get::<_, String>(2)?;
    let aspect_data = row.get::<_, String>(9)?;
    let start = parse_period_date(&period_start).map_err(|err| conversion_error(1, err))?;
    let period_type = period_type
        .parse::<PeriodType>()
        .map_err(|err| conversion_error(2, err))?;
    Ok(EntityObservation {
        object_id: row.get(0)?,
        period: Period::new(start, period_type),
        mention_count: i64_to_u32_saturating(row.get(3)?),
        positive_count: i64_to_u32_saturating(row.get(4)?),
        negative_count: i64_to_u32_saturating(row.get(5)?),
        neutral_count: i64_to_u32_saturating(row.get(6)?),
        mixed_count: i64_to_u32_saturating(row.get(7)?),
        avg_sentiment: row.get(8)?,
        aspect_data: serde_json::from_str(&aspect_data).map_err(|err| conversion_error(9, err))?,
    })
}

impl ObservationSource for SqliteStateStore {
    fn materialize_observations(&self, period: Period) -> Result<usize> {
        SqliteStateStore::materialize_observations(self, period)
    }

    fn list_observations_for_period(&self, period: Period) -> Result<Vec<EntityObservation>> {
        SqliteStateStore::list_observations_for_period(self, period)
    }

    fn find_previous_observation(
        &self,
        object_id: &str,
        period: Period,
    ) -> Result<Option<EntityObservation>> {
        SqliteStateStore::find_previous_observation(self, object_id, period)
    }
}

