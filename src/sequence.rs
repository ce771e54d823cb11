//! # Sequence Allocator
//!
//! Issues the per-tenant, per-calendar-day order number and its display code.
//!
//! Two layers keep the sequence gapless and unique:
//! - an in-process async lock per `(tenant, day)` serializes the
//!   read-increment-insert section for writers in this process;
//! - the unique `(tenant_id, sequence_date, daily_sequence)` index catches
//!   writers in other processes, whose losers roll back and retry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use sea_orm::ConnectionTrait;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::repositories::OrderRepository;

/// Result of one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedSequence {
    pub sequence: i32,
    pub sequence_date: NaiveDate,
    pub display_code: String,
}

type DayKey = (Uuid, NaiveDate);

/// Hands out per-day order numbers.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    locks: Mutex<HashMap<DayKey, Arc<AsyncMutex<()>>>>,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the allocation lock for `tenant_id` on `day`.
    ///
    /// Hold the guard until the order insert has committed or rolled back.
    pub async fn lock(&self, tenant_id: Uuid, day: NaiveDate) -> OwnedMutexGuard<()> {
        let key_lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poison| poison.into_inner());
            // Locks for past days are dead weight once nobody holds them.
            locks.retain(|(_, lock_day), lock| *lock_day >= day || Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry((tenant_id, day)).or_default())
        };
        key_lock.lock_owned().await
    }

    /// Reads the last issued number for the day and returns the next one.
    ///
    /// Run this on the same transaction that inserts the order.
    pub async fn next<C: ConnectionTrait>(
        &self,
        conn: &C,
        tenant_id: Uuid,
        day: NaiveDate,
        tenant_code: &str,
        table_identifier: &str,
    ) -> Result<AllocatedSequence, ServiceError> {
        let last = OrderRepository::new(conn)
            .last_sequence(tenant_id, day)
            .await
            .map_err(|err| ServiceError::from_db("read last daily sequence", err))?;

        let sequence = last.unwrap_or(0) + 1;
        Ok(AllocatedSequence {
            sequence,
            sequence_date: day,
            display_code: display_code(tenant_code, table_identifier, sequence),
        })
    }

    #[cfg(test)]
    fn tracked_keys(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or_default()
    }
}

/// `{tenantCode}-{tableIdentifier}-{sequence:04}`; sequences past 9999 simply widen.
pub fn display_code(tenant_code: &str, table_identifier: &str, sequence: i32) -> String {
    format!("{tenant_code}-{table_identifier}-{sequence:04}")
}

/// Calendar day an order placed at `now` belongs to (server local time).
pub fn business_day(now: DateTime<Local>) -> NaiveDate {
    now.date_naive()
}

/// Today's business day.
pub fn today() -> NaiveDate {
    business_day(Local::now())
}

/// UTC instants bounding the local calendar day `[start, end)`.
pub fn day_bounds_utc(day: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = local_midnight(day);
    let end = day
        .succ_opt()
        .map(local_midnight)
        .unwrap_or_else(|| start + chrono::Duration::days(1));
    (start, end)
}

fn local_midnight(day: NaiveDate) -> DateTime<Utc> {
    let naive = day.and_time(chrono::NaiveTime::MIN);
    // Midnight can be skipped by a DST jump; fall back to interpreting it as UTC.
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
