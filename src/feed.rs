//! # Live Order Feed
//!
//! Each subscriber gets its own polling loop: the current snapshot is sent on
//! connect, then the active set is re-queried every poll interval and pushed
//! only when its fingerprint changed. While the board cannot be loaded the
//! subscriber is told once, and the next successful poll resends the board.
//! The loop ends when the subscriber drops the stream or the server shuts down.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::Stream;
use metrics::counter;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::config::AppConfig;
use crate::db::with_deadline;
use crate::error::ServiceError;
use crate::lifecycle::OrderStatus;
use crate::orders::{OrderView, load_order_views};
use crate::repositories::{OrderListFilter, OrderRepository};
use crate::sequence;

/// Which board the subscriber is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    /// Active orders only.
    Owner,
    /// Active orders plus today's most recently completed ones.
    Staff,
}

impl FeedScope {
    /// Resolves the caller's tenant and board.
    pub fn for_principal(principal: &Principal) -> Result<(Uuid, Self), ServiceError> {
        let tenant_id = principal.tenant_scope(&[Role::Owner, Role::Staff])?;
        let scope = match principal.role {
            Role::Staff => FeedScope::Staff,
            _ => FeedScope::Owner,
        };
        Ok((tenant_id, scope))
    }
}

/// Payload of one feed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedSnapshot {
    /// NEW, PREPARING and READY orders, newest first
    pub active: Vec<OrderView>,
    /// Staff board only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_completed: Option<Vec<OrderView>>,
    pub generated_at: DateTime<Utc>,
}

/// One item of a subscriber's stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedUpdate {
    Snapshot(FeedSnapshot),
    /// The board could not be loaded; what the client shows is no longer live.
    Unavailable { message: String },
}

/// Identity of a snapshot's content; timestamps and totals do not affect it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    active: Vec<(Uuid, OrderStatus)>,
    recent_completed: Vec<Uuid>,
}

impl FeedSnapshot {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint {
            active: self.active.iter().map(|order| (order.id, order.status)).collect(),
            recent_completed: self
                .recent_completed
                .iter()
                .flatten()
                .map(|order| order.id)
                .collect(),
        }
    }
}

#[derive(Clone)]
pub struct LiveOrderFeed {
    db: DatabaseConnection,
    poll_interval: Duration,
    recent_limit: u64,
    request_timeout: Duration,
}

impl LiveOrderFeed {
    pub fn new(db: DatabaseConnection, config: &AppConfig) -> Self {
        Self {
            db,
            poll_interval: config.feed_poll_interval(),
            recent_limit: config.feed_recent_completed_limit,
            request_timeout: config.request_timeout(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Queries the board once.
    pub async fn snapshot(
        &self,
        tenant_id: Uuid,
        scope: FeedScope,
    ) -> Result<FeedSnapshot, ServiceError> {
        with_deadline(self.request_timeout, "feed snapshot", async {
            let repo = OrderRepository::new(&self.db);
            let active_filter = OrderListFilter {
                statuses: Some(
                    OrderStatus::ACTIVE
                        .iter()
                        .map(|status| status.as_str().to_string())
                        .collect(),
                ),
                ..Default::default()
            };
            let active = repo
                .list(tenant_id, &active_filter)
                .await
                .map_err(|err| ServiceError::from_db("load active orders", err))?;
            let active = load_order_views(&self.db, active).await?;

            let recent_completed = match scope {
                FeedScope::Owner => None,
                FeedScope::Staff => {
                    let (start_of_day, _) = sequence::day_bounds_utc(sequence::today());
                    let completed = repo
                        .recent_completed(
                            tenant_id,
                            OrderStatus::Completed.as_str(),
                            start_of_day,
                            self.recent_limit,
                        )
                        .await
                        .map_err(|err| ServiceError::from_db("load completed orders", err))?;
                    Some(load_order_views(&self.db, completed).await?)
                }
            };

            Ok(FeedSnapshot {
                active,
                recent_completed,
                generated_at: Utc::now(),
            })
        })
        .await
    }

    /// Streams board updates for one subscriber until `shutdown` fires or the stream is dropped.
    ///
    /// The first poll runs immediately; later snapshots are yielded only when the content
    /// changed. A failed poll yields `Unavailable` once per outage and is retried on the
    /// next tick.
    pub fn subscribe(
        &self,
        tenant_id: Uuid,
        scope: FeedScope,
        shutdown: CancellationToken,
    ) -> impl Stream<Item = FeedUpdate> + Send + 'static + use<> {
        let feed = self.clone();

        async_stream::stream! {
            let mut ticker = tokio::time::interval(feed.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_sent: Option<Fingerprint> = None;
            let mut outage = false;

            tracing::debug!(tenant_id = %tenant_id, ?scope, "Feed subscriber connected");

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let snapshot = match feed.snapshot(tenant_id, scope).await {
                    Ok(snapshot) => snapshot,
                    Err(err) => {
                        tracing::warn!(tenant_id = %tenant_id, error = %err, "Feed poll failed");
                        if !outage {
                            outage = true;
                            last_sent = None;
                            counter!("feed_outages_total").increment(1);
                            yield FeedUpdate::Unavailable {
                                message: "Order board is temporarily unavailable".to_string(),
                            };
                        }
                        continue;
                    }
                };
                outage = false;

                let fingerprint = snapshot.fingerprint();
                if last_sent.as_ref() == Some(&fingerprint) {
                    continue;
                }
                last_sent = Some(fingerprint);

                counter!("feed_snapshots_pushed_total").increment(1);
                yield FeedUpdate::Snapshot(snapshot);
            }

            tracing::debug!(tenant_id = %tenant_id, ?scope, "Feed subscriber closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn order(status: OrderStatus) -> OrderView {
        let now = Utc::now();
        OrderView {
            id: Uuid::new_v4(),
            display_code: "1234-A1-0001".into(),
            daily_sequence: 1,
            sequence_date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            table_id: Uuid::new_v4(),
            table_identifier: "A1".into(),
            status,
            total: Decimal::new(1000, 2),
            note: None,
            created_at: now,
            updated_at: now,
            done_at: None,
            lines: Vec::new(),
        }
    }

    #[test]
    fn fingerprint_ignores_generation_time() {
        let active = vec![order(OrderStatus::New)];
        let first = FeedSnapshot {
            active: active.clone(),
            recent_completed: None,
            generated_at: Utc::now(),
        };
        let second = FeedSnapshot {
            generated_at: first.generated_at + chrono::Duration::seconds(3),
            ..first.clone()
        };
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn fingerprint_detects_in_place_status_change() {
        let mut snapshot = FeedSnapshot {
            active: vec![order(OrderStatus::New)],
            recent_completed: None,
            generated_at: Utc::now(),
        };
        let before = snapshot.fingerprint();
        snapshot.active[0].status = OrderStatus::Preparing;
        assert_ne!(before, snapshot.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_recent_completed_membership() {
        let base = FeedSnapshot {
            active: Vec::new(),
            recent_completed: Some(Vec::new()),
            generated_at: Utc::now(),
        };
        let with_completed = FeedSnapshot {
            recent_completed: Some(vec![order(OrderStatus::Completed)]),
            ..base.clone()
        };
        assert_ne!(base.fingerprint(), with_completed.fingerprint());
    }

    #[test]
    fn scope_follows_role() {
        let tenant = Uuid::new_v4();
        let staff = Principal {
            subject: "s".into(),
            role: Role::Staff,
            tenant_id: Some(tenant),
        };
        assert_eq!(
            FeedScope::for_principal(&staff).unwrap(),
            (tenant, FeedScope::Staff)
        );

        let owner = Principal {
            role: Role::Owner,
            ..staff.clone()
        };
        assert_eq!(
            FeedScope::for_principal(&owner).unwrap(),
            (tenant, FeedScope::Owner)
        );

        let admin = Principal {
            role: Role::Admin,
            tenant_id: None,
            ..staff
        };
        assert!(FeedScope::for_principal(&admin).is_err());
    }
}
