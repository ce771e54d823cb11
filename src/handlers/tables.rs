//! # Table Handlers
//!
//! Owner-only management of table identities and their QR targets.

use axum::{
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::registry::{CreateTablesRequest, TableView};
use crate::server::AppState;

/// List live tables
#[utoipa::path(
    get,
    path = "/api/v1/tables",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Tables ordered by identifier", body = [TableView]),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Owner role required", body = ApiError)
    ),
    tag = "tables"
)]
pub async fn list_tables(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<TableView>>, ApiError> {
    Ok(Json(state.tables.list(&principal).await?))
}

/// Create tables, restoring previously deleted identifiers
#[utoipa::path(
    post,
    path = "/api/v1/tables",
    security(("bearer_auth" = [])),
    request_body = CreateTablesRequest,
    responses(
        (status = 201, description = "Created or restored tables, in request order", body = [TableView]),
        (status = 400, description = "Invalid identifier, duplicate, or batch too large", body = ApiError),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Owner role required", body = ApiError),
        (status = 409, description = "Identifiers already in use", body = ApiError)
    ),
    tag = "tables"
)]
pub async fn create_tables(
    State(state): State<AppState>,
    principal: Principal,
    payload: Result<Json<CreateTablesRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<TableView>>), ApiError> {
    let Json(request) = payload?;
    let tables = state
        .tables
        .create_or_restore(&principal, &request.identifiers)
        .await?;
    Ok((StatusCode::CREATED, Json(tables)))
}

/// Soft-delete a table
#[utoipa::path(
    delete,
    path = "/api/v1/tables/{id}",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Table id")),
    responses(
        (status = 204, description = "Table deleted"),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Owner role required", body = ApiError),
        (status = 404, description = "No such live table", body = ApiError)
    ),
    tag = "tables"
)]
pub async fn delete_table(
    State(state): State<AppState>,
    principal: Principal,
    Path(table_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.tables.delete(&principal, table_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
