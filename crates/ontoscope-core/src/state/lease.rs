use chrono::{DateTime, Duration, Utc};
use rusqlite::{OptionalExtension, params};

use crate::error::{OntoscopeError, Result};

use super::{SqliteStateStore, format_timestamp};

impl SqliteStateStore {
    /// Takes `name` for `owner` until `now + ttl`. An unexpired lease held by someone
    /// else is `LeaseHeld`; the same owner re-acquiring extends its lease.
    pub fn acquire_lease(
        &self,
        name: &str,
        owner: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let now_text = format_timestamp(now);
        let expires_at = now.checked_add_signed(ttl).ok_or_else(|| {
            OntoscopeError::Validation(format!("lease ttl out of range: {ttl}"))
        })?;
        let expires_at = format_timestamp(expires_at);
        self.with_tx(|tx| {
            let holder = tx
                .query_row(
                    "SELECT owner FROM evaluation_leases WHERE name = ?1 AND expires_at > ?2",
                    params![name, now_text],
                    |row| row.get::<_, String>(0),
                )
                .optional()?;
            if let Some(holder) = holder
                && holder != owner
            {
                return Err(OntoscopeError::LeaseHeld {
                    name: name.to_string(),
                    owner: holder,
                });
            }
            tx.execute(
                r"
                INSERT INTO evaluation_leases(name, owner, acquired_at, expires_at)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(name) DO UPDATE SET
                  owner = excluded.owner,
                  acquired_at = excluded.acquired_at,
                  expires_at = excluded.expires_at
                ",
                params![name, owner, now_text, expires_at],
            )?;
            Ok(())
        })
    }

    /// Returns whether a lease owned by `owner` was removed.
    pub fn release_lease(&self, name: &str, owner: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM evaluation_leases WHERE name = ?1 AND owner = ?2",
                params![name, owner],
            )?;
            Ok(removed > 0)
        })
    }

    /// Acquires `name` and releases it when the guard drops.
    pub fn lease(&self, name: &str, owner: &str, ttl: Duration) -> Result<LeaseGuard> {
        self.acquire_lease(name, owner, ttl, Utc::now())?;
        tracing::debug!(lease = name, owner, "lease acquired");
        Ok(LeaseGuard {
            store: self.clone(),
            name: name.to_string(),
            owner: owner.to_string(),
        })
    }
}

#[derive(Debug)]
pub struct LeaseGuard {
    store: SqliteStateStore,
    name: String,
    owner: String,
}

impl LeaseGuard {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Err(err) = self.store.release_lease(&self.name, &self.owner) {
            tracing::warn!(lease = %self.name, owner = %self.owner, error = %err, "lease release failed");
        }
    }
}
