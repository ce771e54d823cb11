//! # Order Repository
//!
//! Orders and their lines. Rows are never deleted; the only mutation after
//! creation is the guarded status update in [`OrderRepository::update_status`].

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, prelude::DateTimeWithTimeZone, sea_query::Expr,
};
use uuid::Uuid;

use crate::models::order::{self, Column, Entity as Order};
use crate::models::order_line::{self, Entity as OrderLine};

/// Optional filters for listing a tenant's orders.
#[derive(Debug, Clone, Default)]
pub struct OrderListFilter {
    pub statuses: Option<Vec<String>>,
    /// Half-open `[start, end)` window on `created_at`.
    pub created_between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub limit: Option<u64>,
}

pub struct OrderRepository<'a, C: ConnectionTrait> {
    db: &'a C,
}

impl<'a, C: ConnectionTrait> OrderRepository<'a, C> {
    pub fn new(db: &'a C) -> Self {
        Self { db }
    }

    /// Highest sequence already issued to `tenant_id` on `sequence_date`.
    pub async fn last_sequence(
        &self,
        tenant_id: Uuid,
        sequence_date: NaiveDate,
    ) -> Result<Option<i32>, DbErr> {
        let latest = Order::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::SequenceDate.eq(sequence_date))
            .order_by_desc(Column::DailySequence)
            .one(self.db)
            .await?;
        Ok(latest.map(|order| order.daily_sequence))
    }

    /// Inserts an order and all of its lines. Callers run this inside a transaction.
    pub async fn insert_with_lines(
        &self,
        order: order::ActiveModel,
        lines: Vec<order_line::ActiveModel>,
    ) -> Result<order::Model, DbErr> {
        let order = order.insert(self.db).await?;
        if !lines.is_empty() {
            OrderLine::insert_many(lines)
                .exec_without_returning(self.db)
                .await?;
        }
        Ok(order)
    }

    pub async fn find_for_tenant(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<order::Model>, DbErr> {
        Order::find_by_id(order_id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(self.db)
            .await
    }

    /// Lines of the given orders in cart order.
    pub async fn lines_for(&self, order_ids: &[Uuid]) -> Result<Vec<order_line::Model>, DbErr> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        OrderLine::find()
            .filter(order_line::Column::OrderId.is_in(order_ids.iter().copied()))
            .order_by_asc(order_line::Column::OrderId)
            .order_by_asc(order_line::Column::Position)
            .all(self.db)
            .await
    }

    /// Newest-first listing.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: &OrderListFilter,
    ) -> Result<Vec<order::Model>, DbErr> {
        let mut query = Order::find().filter(Column::TenantId.eq(tenant_id));
        if let Some(statuses) = &filter.statuses {
            query = query.filter(Column::Status.is_in(statuses.iter().cloned()));
        }
        if let Some((start, end)) = filter.created_between {
            query = query
                .filter(Column::CreatedAt.gte(to_db_time(start)))
                .filter(Column::CreatedAt.lt(to_db_time(end)));
        }
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        query.order_by_desc(Column::CreatedAt).all(self.db).await
    }

    /// Completed orders finished (or placed) since `since`, most recently finished first.
    pub async fn recent_completed(
        &self,
        tenant_id: Uuid,
        completed_status: &str,
        since: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<order::Model>, DbErr> {
        let since = to_db_time(since);
        Order::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Status.eq(completed_status))
            .filter(
                Condition::any()
                    .add(Column::DoneAt.gte(since))
                    .add(Column::CreatedAt.gte(since)),
            )
            .order_by_desc(Column::DoneAt)
            .order_by_desc(Column::CreatedAt)
            .limit(limit)
            .all(self.db)
            .await
    }

    /// Moves an order from `from` to `to` only if it is still in `from`.
    ///
    /// `done_at` is written only when provided and only if it is still unset.
    /// Returns whether a row changed, letting callers detect a concurrent transition.
    pub async fn update_status(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: &str,
        to: &str,
        done_at: Option<DateTime<Utc>>,
    ) -> Result<bool, DbErr> {
        let now = to_db_time(Utc::now());
        let mut update = Order::update_many()
            .col_expr(Column::Status, Expr::value(to))
            .col_expr(Column::UpdatedAt, Expr::value(now))
            .filter(Column::Id.eq(order_id))
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Status.eq(from));

        if let Some(done_at) = done_at {
            update = update
                .col_expr(Column::DoneAt, Expr::value(Some(to_db_time(done_at))))
                .filter(Column::DoneAt.is_null());
        }

        let result = update.exec(self.db).await?;
        Ok(result.rows_affected == 1)
    }
}

/// Normalizes timestamps to a UTC offset so stored values compare consistently.
pub fn to_db_time(dt: DateTime<Utc>) -> DateTimeWithTimeZone {
    dt.fixed_offset()
}
