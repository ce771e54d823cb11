//! # Table Identity Registry
//!
//! Table identities are durable: the id is baked into printed QR codes, so
//! re-creating a soft-deleted identifier restores the original row instead of
//! inserting a new one. A batch is validated up front and applied in a single
//! transaction; any active collision rejects the whole batch.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::audit::{AuditAction, AuditTrail};
use crate::auth::{Principal, Role};
use crate::config::AppConfig;
use crate::db::with_deadline;
use crate::error::ServiceError;
use crate::models::{table_identity, tenant};
use crate::repositories::{TableIdentityRepository, TenantRepository};

/// Only owners manage their table list.
pub const TABLE_ROLES: &[Role] = &[Role::Owner];

pub const MAX_IDENTIFIER_LEN: usize = 10;

/// Trims and uppercases an identifier, then checks it is 1-10 ASCII alphanumerics.
pub fn normalize_identifier(raw: &str) -> Result<String, ServiceError> {
    let normalized = raw.trim().to_ascii_uppercase();
    let valid = !normalized.is_empty()
        && normalized.len() <= MAX_IDENTIFIER_LEN
        && normalized.chars().all(|c| c.is_ascii_alphanumeric());

    if valid {
        Ok(normalized)
    } else {
        Err(ServiceError::validation_with(
            format!("Invalid table identifier '{}'", raw.trim()),
            json!({
                "identifier": raw,
                "rule": format!("1-{MAX_IDENTIFIER_LEN} letters or digits"),
            }),
        ))
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTablesRequest {
    pub identifiers: Vec<String>,
}

/// What happened to one identifier in a create batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TableOutcome {
    Created,
    Restored,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TableView {
    pub id: Uuid,
    pub table_identifier: String,
    /// Target URL encoded in the table's QR code
    pub qr_url: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<TableOutcome>,
}

#[derive(Clone)]
pub struct TableRegistry {
    db: DatabaseConnection,
    audit: AuditTrail,
    public_base_url: String,
    batch_limit: usize,
    request_timeout: Duration,
}

impl TableRegistry {
    pub fn new(db: DatabaseConnection, audit: AuditTrail, config: &AppConfig) -> Self {
        Self {
            db,
            audit,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
            batch_limit: config.table_batch_limit,
            request_timeout: config.request_timeout(),
        }
    }

    /// Creates new identities and restores soft-deleted ones, in request order.
    pub async fn create_or_restore(
        &self,
        principal: &Principal,
        identifiers: &[String],
    ) -> Result<Vec<TableView>, ServiceError> {
        let tenant_id = principal.tenant_scope(TABLE_ROLES)?;
        let normalized = self.validate_batch(identifiers)?;

        let (tenant, applied) = with_deadline(self.request_timeout, "create tables", async {
            let tenant = self.load_tenant(tenant_id).await?;

            let txn = self
                .db
                .begin()
                .await
                .map_err(|err| ServiceError::from_db("begin table transaction", err))?;

            match apply_batch(&txn, tenant_id, &normalized).await {
                Ok(applied) => {
                    txn.commit()
                        .await
                        .map_err(|err| ServiceError::from_db("commit tables", err))?;
                    Ok((tenant, applied))
                }
                Err(err) => {
                    if let Err(rollback_err) = txn.rollback().await {
                        tracing::warn!(error = %rollback_err, "Failed to roll back table batch");
                    }
                    Err(err)
                }
            }
        })
        .await?;

        let restored = applied
            .iter()
            .filter(|(_, outcome)| *outcome == TableOutcome::Restored)
            .count();
        tracing::info!(
            tenant_id = %tenant_id,
            created = applied.len() - restored,
            restored,
            "Table batch applied"
        );

        let mut views = Vec::with_capacity(applied.len());
        for (row, outcome) in applied {
            let action = match outcome {
                TableOutcome::Created => AuditAction::TableCreated,
                TableOutcome::Restored => AuditAction::TableRestored,
            };
            self.audit
                .record(
                    principal,
                    action,
                    Some(row.id),
                    json!({ "tableIdentifier": row.table_identifier }),
                )
                .await;
            views.push(self.view(&tenant, row, Some(outcome)));
        }
        Ok(views)
    }

    /// Live tables ordered by identifier.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<TableView>, ServiceError> {
        let tenant_id = principal.tenant_scope(TABLE_ROLES)?;

        with_deadline(self.request_timeout, "list tables", async {
            let tenant = self.load_tenant(tenant_id).await?;
            let rows = TableIdentityRepository::new(&self.db)
                .list(tenant_id, false)
                .await
                .map_err(|err| ServiceError::from_db("list tables", err))?;
            Ok(rows
                .into_iter()
                .map(|row| self.view(&tenant, row, None))
                .collect())
        })
        .await
    }

    /// Soft-deletes a live table. Orders placed from it keep their own copy of the identifier.
    pub async fn delete(&self, principal: &Principal, table_id: Uuid) -> Result<(), ServiceError> {
        let tenant_id = principal.tenant_scope(TABLE_ROLES)?;

        let deleted = with_deadline(self.request_timeout, "delete table", async {
            TableIdentityRepository::new(&self.db)
                .soft_delete(tenant_id, table_id)
                .await
                .map_err(|err| ServiceError::from_db("delete table", err))
        })
        .await?;

        if !deleted {
            return Err(ServiceError::not_found("Table not found"));
        }

        tracing::info!(tenant_id = %tenant_id, table_id = %table_id, "Table soft-deleted");
        self.audit
            .record(principal, AuditAction::TableDeleted, Some(table_id), json!(null))
            .await;
        Ok(())
    }

    fn validate_batch(&self, identifiers: &[String]) -> Result<Vec<String>, ServiceError> {
        if identifiers.is_empty() {
            return Err(ServiceError::validation("At least one table identifier is required"));
        }
        if identifiers.len() > self.batch_limit {
            return Err(ServiceError::validation_with(
                format!("At most {} tables can be created at once", self.batch_limit),
                json!({ "limit": self.batch_limit, "received": identifiers.len() }),
            ));
        }

        let normalized = identifiers
            .iter()
            .map(|raw| normalize_identifier(raw))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::with_capacity(normalized.len());
        let duplicates: BTreeSet<&str> = normalized
            .iter()
            .filter(|identifier| !seen.insert(identifier.as_str()))
            .map(String::as_str)
            .collect();
        if !duplicates.is_empty() {
            return Err(ServiceError::validation_with(
                "Batch contains duplicate table identifiers",
                json!({ "duplicates": duplicates }),
            ));
        }

        Ok(normalized)
    }

    async fn load_tenant(&self, tenant_id: Uuid) -> Result<tenant::Model, ServiceError> {
        TenantRepository::new(&self.db)
            .find_by_id(tenant_id, false)
            .await
            .map_err(|err| ServiceError::from_db("load tenant", err))?
            .ok_or_else(|| ServiceError::not_found("Tenant not found"))
    }

    fn view(
        &self,
        tenant: &tenant::Model,
        row: table_identity::Model,
        outcome: Option<TableOutcome>,
    ) -> TableView {
        TableView {
            qr_url: format!(
                "{}/{}/{}",
                self.public_base_url, tenant.public_code, row.table_identifier
            ),
            id: row.id,
            table_identifier: row.table_identifier,
            created_at: row.created_at.with_timezone(&Utc),
            outcome,
        }
    }
}

/// Partitions the batch against existing rows and writes it. Runs inside `txn`.
async fn apply_batch(
    txn: &DatabaseTransaction,
    tenant_id: Uuid,
    identifiers: &[String],
) -> Result<Vec<(table_identity::Model, TableOutcome)>, ServiceError> {
    let repo = TableIdentityRepository::new(txn);
    let existing = repo
        .find_by_identifiers(tenant_id, identifiers, true)
        .await
        .map_err(|err| ServiceError::from_db("load tables", err))?;

    let conflicts: BTreeSet<&str> = existing
        .iter()
        .filter(|row| row.deleted_at.is_none())
        .map(|row| row.table_identifier.as_str())
        .collect();
    if !conflicts.is_empty() {
        return Err(ServiceError::conflict(
            "Some table identifiers are already in use",
            json!({ "identifiers": conflicts }),
        ));
    }

    // Rows come oldest first; keep the original id when an identifier was recreated before.
    let mut restorable: HashMap<&str, table_identity::Model> = HashMap::new();
    for row in &existing {
        restorable
            .entry(row.table_identifier.as_str())
            .or_insert_with(|| row.clone());
    }

    let mut applied = Vec::with_capacity(identifiers.len());
    for identifier in identifiers {
        let outcome = match restorable.remove(identifier.as_str()) {
            Some(row) => {
                let restored = repo
                    .restore(row)
                    .await
                    .map_err(|err| ServiceError::from_db("restore table", err))?;
                (restored, TableOutcome::Restored)
            }
            None => {
                let created = repo
                    .insert(tenant_id, identifier)
                    .await
                    .map_err(|err| ServiceError::from_db("create table", err))?;
                (created, TableOutcome::Created)
            }
        };
        applied.push(outcome);
    }
    Ok(applied)
}
