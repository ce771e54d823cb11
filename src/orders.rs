//! # Order placement and reads
//!
//! Placement is all-or-nothing: the cart is priced against the stored menu
//! first, then the sequence number is allocated and the order plus its lines
//! are inserted in one transaction. A unique-index collision on the daily
//! sequence rolls the transaction back and retries with a fresh number.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, DbErr, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::config::AppConfig;
use crate::db::with_deadline;
use crate::error::{ServiceError, is_unique_violation};
use crate::lifecycle::OrderStatus;
use crate::models::{order, order_line};
use crate::pricing::{
    CustomizationSnapshot, LineRequest, MenuSnapshot, PricedOrder, price_order, to_money,
};
use crate::registry::normalize_identifier;
use crate::repositories::{
    MenuItemRepository, OrderListFilter, OrderRepository, TableIdentityRepository,
    TenantRepository, order::to_db_time,
};
use crate::sequence::{self, SequenceAllocator};

/// Roles allowed to read a tenant's orders.
pub const ORDER_READ_ROLES: &[Role] = &[Role::Owner, Role::Staff];

/// Longest accepted customer note, in characters.
pub const MAX_NOTE_CHARS: usize = 500;

const DEFAULT_LIST_LIMIT: u64 = 200;
const MAX_LIST_LIMIT: u64 = 1_000;

/// Customer order submission.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    /// Public code printed on the tenant's QR codes
    pub tenant_code: String,
    pub table_identifier: String,
    pub items: Vec<LineRequest>,
    #[serde(default)]
    pub note: Option<String>,
}

/// One order line as stored, never re-read from the live menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineView {
    pub id: Uuid,
    pub item_id: Uuid,
    pub position: i32,
    pub item_name: String,
    #[schema(value_type = String, example = "10.00")]
    pub unit_price: Decimal,
    pub quantity: i32,
    pub customizations: Vec<CustomizationSnapshot>,
    #[schema(value_type = String, example = "21.00")]
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    pub id: Uuid,
    pub display_code: String,
    pub daily_sequence: i32,
    pub sequence_date: NaiveDate,
    pub table_id: Uuid,
    pub table_identifier: String,
    pub status: OrderStatus,
    #[schema(value_type = String, example = "21.00")]
    pub total: Decimal,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub done_at: Option<DateTime<Utc>>,
    pub lines: Vec<OrderLineView>,
}

impl OrderView {
    fn from_models(
        order: order::Model,
        lines: Vec<order_line::Model>,
    ) -> Result<Self, ServiceError> {
        let status = order.status.parse::<OrderStatus>().map_err(|err| {
            tracing::error!(order_id = %order.id, error = %err, "Stored order has unknown status");
            ServiceError::Internal("stored order has an unknown status".to_string())
        })?;

        let lines = lines
            .into_iter()
            .map(OrderLineView::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: order.id,
            display_code: order.display_code,
            daily_sequence: order.daily_sequence,
            sequence_date: order.sequence_date,
            table_id: order.table_id,
            table_identifier: order.table_identifier,
            status,
            total: to_money(order.total),
            note: order.customer_note,
            created_at: order.created_at.with_timezone(&Utc),
            updated_at: order.updated_at.with_timezone(&Utc),
            done_at: order.done_at.map(|at| at.with_timezone(&Utc)),
            lines,
        })
    }
}

impl TryFrom<order_line::Model> for OrderLineView {
    type Error = ServiceError;

    fn try_from(line: order_line::Model) -> Result<Self, Self::Error> {
        let customizations: Vec<CustomizationSnapshot> =
            serde_json::from_value(line.customizations).map_err(|err| {
                tracing::error!(line_id = %line.id, error = %err, "Corrupt customization snapshot");
                ServiceError::Internal("stored order line is corrupt".to_string())
            })?;

        Ok(Self {
            id: line.id,
            item_id: line.item_id,
            position: line.position,
            item_name: line.item_name_snapshot,
            unit_price: to_money(line.item_price_snapshot),
            quantity: line.quantity,
            customizations,
            subtotal: to_money(line.subtotal),
        })
    }
}

/// Loads one tenant-scoped order with its lines.
pub async fn load_order_view<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    order_id: Uuid,
) -> Result<OrderView, ServiceError> {
    let order = OrderRepository::new(conn)
        .find_for_tenant(tenant_id, order_id)
        .await
        .map_err(|err| ServiceError::from_db("load order", err))?
        .ok_or_else(|| ServiceError::not_found("Order not found"))?;

    let mut views = load_order_views(conn, vec![order]).await?;
    views
        .pop()
        .ok_or_else(|| ServiceError::Internal("order vanished while loading".to_string()))
}

/// Attaches lines to already-loaded orders, preserving their order.
pub async fn load_order_views<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderView>, ServiceError> {
    let ids: Vec<Uuid> = orders.iter().map(|order| order.id).collect();
    let lines = OrderRepository::new(conn)
        .lines_for(&ids)
        .await
        .map_err(|err| ServiceError::from_db("load order lines", err))?;

    let mut by_order: HashMap<Uuid, Vec<order_line::Model>> = HashMap::new();
    for line in lines {
        by_order.entry(line.order_id).or_default().push(line);
    }

    orders
        .into_iter()
        .map(|order| {
            let lines = by_order.remove(&order.id).unwrap_or_default();
            OrderView::from_models(order, lines)
        })
        .collect()
}

/// Query string for `GET /api/v1/orders`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    /// `all` (default), a single status, or a comma-separated list
    pub status: Option<String>,
    /// Calendar day (YYYY-MM-DD) the orders were placed on
    pub date: Option<NaiveDate>,
    /// Maximum number of orders returned (default 200, max 1000)
    pub limit: Option<u64>,
}

impl OrderListQuery {
    fn into_filter(self) -> Result<OrderListFilter, ServiceError> {
        let statuses = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) if raw.eq_ignore_ascii_case("all") => None,
            Some(raw) => {
                let parsed = raw
                    .split(',')
                    .map(|part| part.trim().to_ascii_uppercase().parse::<OrderStatus>())
                    .collect::<Result<Vec<_>, _>>()?;
                Some(parsed.iter().map(|s| s.as_str().to_string()).collect())
            }
        };

        let limit = match self.limit {
            Some(0) => return Err(ServiceError::validation("limit must be at least 1")),
            Some(limit) => limit.min(MAX_LIST_LIMIT),
            None => DEFAULT_LIST_LIMIT,
        };

        Ok(OrderListFilter {
            statuses,
            created_between: self.date.map(sequence::day_bounds_utc),
            limit: Some(limit),
        })
    }
}

/// Places and reads orders.
#[derive(Clone)]
pub struct OrderService {
    db: DatabaseConnection,
    allocator: Arc<SequenceAllocator>,
    request_timeout: Duration,
    retry_limit: u32,
}

impl OrderService {
    pub fn new(db: DatabaseConnection, allocator: Arc<SequenceAllocator>, config: &AppConfig) -> Self {
        Self {
            db,
            allocator,
            request_timeout: config.request_timeout(),
            retry_limit: config.sequence_retry_limit.max(1),
        }
    }

    /// Places a customer order. Nothing is written unless every line is valid.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<OrderView, ServiceError> {
        let tenant_code = request.tenant_code.trim().to_string();
        if tenant_code.is_empty() {
            return Err(ServiceError::validation("tenantCode is required"));
        }
        let table_identifier = normalize_identifier(&request.table_identifier)?;
        let note = normalize_note(request.note)?;

        with_deadline(self.request_timeout, "create order", async {
            let tenant = TenantRepository::new(&self.db)
                .find_by_public_code(&tenant_code, false)
                .await
                .map_err(|err| ServiceError::from_db("load tenant", err))?
                .ok_or_else(|| ServiceError::not_found("Tenant not found"))?;

            let table = TableIdentityRepository::new(&self.db)
                .find_by_identifier(tenant.id, &table_identifier, false)
                .await
                .map_err(|err| ServiceError::from_db("load table", err))?
                .ok_or_else(|| {
                    ServiceError::not_found(format!(
                        "Table '{table_identifier}' is not recognized for this restaurant"
                    ))
                })?;

            let menu = self.menu_snapshot(tenant.id, &request.items).await?;
            let priced = price_order(&menu, &request.items)?;

            let placement = Placement {
                tenant_id: tenant.id,
                tenant_code: &tenant.public_code,
                table_id: table.id,
                table_identifier: &table.table_identifier,
                note: note.as_deref(),
                priced: &priced,
            };
            self.insert_with_sequence(&placement).await
        })
        .await
    }

    pub async fn get_order(
        &self,
        principal: &Principal,
        order_id: Uuid,
    ) -> Result<OrderView, ServiceError> {
        let tenant_id = principal.tenant_scope(ORDER_READ_ROLES)?;
        with_deadline(self.request_timeout, "load order", async {
            load_order_view(&self.db, tenant_id, order_id).await
        })
        .await
    }

    /// Newest-first listing of the caller's orders.
    pub async fn list_orders(
        &self,
        principal: &Principal,
        query: OrderListQuery,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let tenant_id = principal.tenant_scope(ORDER_READ_ROLES)?;
        let filter = query.into_filter()?;

        with_deadline(self.request_timeout, "list orders", async {
            let orders = OrderRepository::new(&self.db)
                .list(tenant_id, &filter)
                .await
                .map_err(|err| ServiceError::from_db("list orders", err))?;
            load_order_views(&self.db, orders).await
        })
        .await
    }

    async fn menu_snapshot(
        &self,
        tenant_id: Uuid,
        lines: &[LineRequest],
    ) -> Result<MenuSnapshot, ServiceError> {
        let mut item_ids: Vec<Uuid> = lines.iter().map(|line| line.item_id).collect();
        item_ids.sort_unstable();
        item_ids.dedup();

        let repo = MenuItemRepository::new(&self.db);
        let items = repo
            .find_many(tenant_id, &item_ids, false)
            .await
            .map_err(|err| ServiceError::from_db("load menu items", err))?;
        let found: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let customizations = repo
            .customizations_for(&found)
            .await
            .map_err(|err| ServiceError::from_db("load customizations", err))?;

        Ok(MenuSnapshot::new(items, customizations))
    }

    async fn insert_with_sequence(
        &self,
        placement: &Placement<'_>,
    ) -> Result<OrderView, ServiceError> {
        let day = sequence::today();
        let tenant_id = placement.tenant_id;
        let (view, attempts) = retry_on_collision(self.retry_limit, tenant_id, day, move |_| async move {
            let _guard = self.allocator.lock(tenant_id, day).await;
            self.try_insert(placement, day).await
        })
        .await?;

        counter!("orders_created_total").increment(1);
        tracing::info!(
            tenant_id = %placement.tenant_id,
            order_id = %view.id,
            display_code = %view.display_code,
            total = %view.total,
            attempts,
            "Order created"
        );
        Ok(view)
    }

    /// One allocate-and-insert attempt inside its own transaction.
    async fn try_insert(&self, placement: &Placement<'_>, day: NaiveDate) -> Result<OrderView, Attempt> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|err| Attempt::storage("begin order transaction", err))?;

        let allocated = match self
            .allocator
            .next(&txn, placement.tenant_id, day, placement.tenant_code, placement.table_identifier)
            .await
        {
            Ok(allocated) => allocated,
            Err(err) => {
                rollback(txn).await;
                return Err(Attempt::Failed(err));
            }
        };

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order = order::ActiveModel {
            id: Set(order_id),
            tenant_id: Set(placement.tenant_id),
            table_id: Set(placement.table_id),
            table_identifier: Set(placement.table_identifier.to_string()),
            daily_sequence: Set(allocated.sequence),
            sequence_date: Set(allocated.sequence_date),
            display_code: Set(allocated.display_code.clone()),
            status: Set(OrderStatus::New.as_str().to_string()),
            total: Set(placement.priced.total),
            customer_note: Set(placement.note.map(str::to_string)),
            created_at: Set(to_db_time(now)),
            updated_at: Set(to_db_time(now)),
            done_at: Set(None),
        };

        let (line_models, line_views) = match build_lines(order_id, placement.priced) {
            Ok(lines) => lines,
            Err(err) => {
                rollback(txn).await;
                return Err(Attempt::Failed(err));
            }
        };

        let inserted = match OrderRepository::new(&txn).insert_with_lines(order, line_models).await {
            Ok(inserted) => inserted,
            Err(err) => {
                rollback(txn).await;
                return Err(Attempt::storage("insert order", err));
            }
        };
        txn.commit()
            .await
            .map_err(|err| Attempt::storage("commit order", err))?;

        Ok(OrderView {
            id: inserted.id,
            display_code: inserted.display_code,
            daily_sequence: inserted.daily_sequence,
            sequence_date: inserted.sequence_date,
            table_id: inserted.table_id,
            table_identifier: inserted.table_identifier,
            status: OrderStatus::New,
            total: to_money(placement.priced.total),
            note: inserted.customer_note,
            created_at: now,
            updated_at: now,
            done_at: None,
            lines: line_views,
        })
    }
}

/// Runs `attempt` until it stops colliding on the daily sequence, at most
/// `limit` times, and returns its value with the number of attempts used.
async fn retry_on_collision<T, F, Fut>(
    limit: u32,
    tenant_id: Uuid,
    day: NaiveDate,
    mut attempt: F,
) -> Result<(T, u32), ServiceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Attempt>>,
{
    let mut backoff = Duration::from_millis(10);

    for n in 1..=limit {
        match attempt(n).await {
            Ok(value) => return Ok((value, n)),
            Err(Attempt::Collision) => {
                counter!("order_sequence_conflicts_total").increment(1);
                tracing::warn!(
                    tenant_id = %tenant_id,
                    sequence_date = %day,
                    attempt = n,
                    "Daily sequence collided with a concurrent writer; retrying"
                );
            }
            Err(Attempt::Failed(err)) => return Err(err),
        }

        if n < limit {
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(Duration::from_millis(200));
        }
    }

    counter!("order_sequence_exhausted_total").increment(1);
    tracing::error!(
        tenant_id = %tenant_id,
        attempts = limit,
        "Could not allocate a daily sequence"
    );
    Err(ServiceError::transient(
        "Could not allocate an order number; please retry",
    ))
}

/// Outcome of a failed placement attempt.
enum Attempt {
    /// Another writer took the sequence number first.
    Collision,
    Failed(ServiceError),
}

impl Attempt {
    fn storage(context: &'static str, err: DbErr) -> Self {
        if is_unique_violation(&err) {
            Attempt::Collision
        } else {
            Attempt::Failed(ServiceError::from_db(context, err))
        }
    }
}

async fn rollback(txn: DatabaseTransaction) {
    if let Err(err) = txn.rollback().await {
        tracing::warn!(error = %err, "Failed to roll back order transaction");
    }
}

fn build_lines(
    order_id: Uuid,
    priced: &PricedOrder,
) -> Result<(Vec<order_line::ActiveModel>, Vec<OrderLineView>), ServiceError> {
    let mut models = Vec::with_capacity(priced.lines.len());
    let mut views = Vec::with_capacity(priced.lines.len());

    for line in &priced.lines {
        let id = Uuid::new_v4();
        let position = i32::try_from(line.position)
            .map_err(|_| ServiceError::validation("order has too many lines"))?;
        let snapshot = serde_json::to_value(&line.customizations)
            .map_err(|err| ServiceError::Internal(format!("encode customizations: {err}")))?;

        models.push(order_line::ActiveModel {
            id: Set(id),
            order_id: Set(order_id),
            item_id: Set(line.item_id),
            position: Set(position),
            quantity: Set(line.quantity),
            customizations: Set(snapshot),
            subtotal: Set(line.subtotal),
            item_name_snapshot: Set(line.item_name.clone()),
            item_price_snapshot: Set(line.unit_price),
        });
        views.push(OrderLineView {
            id,
            item_id: line.item_id,
            position,
            item_name: line.item_name.clone(),
            unit_price: to_money(line.unit_price),
            quantity: line.quantity,
            customizations: line.customizations.clone(),
            subtotal: to_money(line.subtotal),
        });
    }

    Ok((models, views))
}

/// Everything resolved before the sequence is allocated.
struct Placement<'a> {
    tenant_id: Uuid,
    tenant_code: &'a str,
    table_id: Uuid,
    table_identifier: &'a str,
    note: Option<&'a str>,
    priced: &'a PricedOrder,
}

fn normalize_note(note: Option<String>) -> Result<Option<String>, ServiceError> {
    let Some(note) = note else {
        return Ok(None);
    };
    let trimmed = note.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > MAX_NOTE_CHARS {
        return Err(ServiceError::validation_with(
            format!("note must be at most {MAX_NOTE_CHARS} characters"),
            json!({ "maxLength": MAX_NOTE_CHARS }),
        ));
    }
    Ok(Some(trimmed.to_string()))
}
