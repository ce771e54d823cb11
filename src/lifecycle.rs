//! # Order Lifecycle State Machine
//!
//! ```text
//! NEW -> PREPARING -> READY -> COMPLETED
//!  \________\__________\-----> CANCELLED
//! ```
//!
//! COMPLETED and CANCELLED are terminal. Transitions are applied with a
//! compare-and-set on the current status, so two staff members racing on the
//! same order cannot both succeed, and a rejected transition leaves the row
//! untouched. `done_at` is stamped only when an order reaches COMPLETED.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use metrics::counter;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditTrail};
use crate::auth::{Principal, Role};
use crate::db::with_deadline;
use crate::error::ServiceError;
use crate::orders::{OrderView, load_order_view};
use crate::repositories::OrderRepository;

/// Roles allowed to move orders through the pipeline.
pub const TRANSITION_ROLES: &[Role] = &[Role::Owner, Role::Staff];

/// Fulfilment status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    Preparing,
    Ready,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::New,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Statuses shown on the live board.
    pub const ACTIVE: [OrderStatus; 3] =
        [OrderStatus::New, OrderStatus::Preparing, OrderStatus::Ready];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::New => "NEW",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Statuses reachable in one step from `self`.
    pub fn next_statuses(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::New => &[OrderStatus::Preparing, OrderStatus::Cancelled],
            OrderStatus::Preparing => &[OrderStatus::Ready, OrderStatus::Cancelled],
            OrderStatus::Ready => &[OrderStatus::Completed, OrderStatus::Cancelled],
            OrderStatus::Completed | OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.next_statuses().contains(&target)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised for any string outside the five defined statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid order status '{0}'")]
pub struct InvalidStatus(pub String);

impl FromStr for OrderStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

impl From<InvalidStatus> for ServiceError {
    fn from(err: InvalidStatus) -> Self {
        ServiceError::validation_with(
            err.to_string(),
            json!({
                "status": err.0,
                "allowed": OrderStatus::ALL.map(|s| s.as_str()),
            }),
        )
    }
}

/// Checks the adjacency table.
pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> Result<(), ServiceError> {
    if from.can_transition_to(to) {
        return Ok(());
    }

    let message = if from.is_terminal() {
        format!("Order is already {from} and can no longer change")
    } else {
        format!("Cannot move order from {from} to {to}")
    };

    Err(ServiceError::validation_with(
        message,
        json!({
            "from": from,
            "to": to,
            "allowed": from.next_statuses(),
        }),
    ))
}

/// Applies status transitions on behalf of owner and staff principals.
#[derive(Clone)]
pub struct OrderLifecycle {
    db: DatabaseConnection,
    audit: AuditTrail,
    request_timeout: Duration,
}

impl OrderLifecycle {
    pub fn new(db: DatabaseConnection, audit: AuditTrail, request_timeout: Duration) -> Self {
        Self {
            db,
            audit,
            request_timeout,
        }
    }

    /// Moves `order_id` to `target` if the caller's tenant owns it and the step is allowed.
    pub async fn transition(
        &self,
        principal: &Principal,
        order_id: Uuid,
        target: &str,
    ) -> Result<OrderView, ServiceError> {
        let tenant_id = principal.tenant_scope(TRANSITION_ROLES)?;
        let target: OrderStatus = target.trim().parse()?;

        let outcome = with_deadline(self.request_timeout, "order status transition", async {
            let repo = OrderRepository::new(&self.db);
            let order = repo
                .find_for_tenant(tenant_id, order_id)
                .await
                .map_err(|err| ServiceError::from_db("load order", err))?
                .ok_or_else(|| ServiceError::not_found("Order not found"))?;

            let current: OrderStatus = order.status.parse().map_err(|err: InvalidStatus| {
                tracing::error!(order_id = %order.id, error = %err, "Stored order has unknown status");
                ServiceError::Internal("stored order has an unknown status".to_string())
            })?;

            ensure_transition(current, target)?;

            let done_at = (target == OrderStatus::Completed).then(Utc::now);
            let applied = repo
                .update_status(tenant_id, order_id, current.as_str(), target.as_str(), done_at)
                .await
                .map_err(|err| ServiceError::from_db("update order status", err))?;

            if !applied {
                return Err(ServiceError::Conflict {
                    message: "Order status changed concurrently; reload and retry".to_string(),
                    details: Some(json!({ "expected": current })),
                });
            }

            let view = load_order_view(&self.db, tenant_id, order_id).await?;
            Ok((current, view))
        })
        .await;

        let (from, view) = match outcome {
            Ok(done) => done,
            Err(err) => {
                counter!("order_transitions_rejected_total", "to" => target.as_str()).increment(1);
                return Err(err);
            }
        };

        counter!(
            "order_transitions_applied_total",
            "from" => from.as_str(),
            "to" => target.as_str()
        )
        .increment(1);
        tracing::info!(
            tenant_id = %tenant_id,
            order_id = %order_id,
            display_code = %view.display_code,
            from = from.as_str(),
            to = target.as_str(),
            actor_role = principal.role.as_str(),
            "Order status changed"
        );

        self.audit
            .record(
                principal,
                AuditAction::OrderStatusChanged,
                Some(order_id),
                json!({ "from": from, "to": target, "displayCode": view.display_code }),
            )
            .await;

        Ok(view)
    }
}
