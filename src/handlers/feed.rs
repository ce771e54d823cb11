//! # Live Feed Handler
//!
//! Server-sent events carrying the kitchen/floor board. Owners see active
//! orders; staff additionally see today's recently completed ones. An
//! `unavailable` event tells the client the board stopped being live.

use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::{Stream, StreamExt};
use serde_json::json;

use crate::auth::Principal;
use crate::error::ApiError;
use crate::feed::{FeedScope, FeedSnapshot, FeedUpdate};
use crate::server::AppState;

pub const SNAPSHOT_EVENT: &str = "snapshot";
pub const UNAVAILABLE_EVENT: &str = "unavailable";

/// Subscribe to the live order board
#[utoipa::path(
    get,
    path = "/api/v1/orders/stream",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "text/event-stream of `snapshot` and `unavailable` events", body = FeedSnapshot, content_type = "text/event-stream"),
        (status = 401, description = "Missing or invalid bearer token", body = ApiError),
        (status = 403, description = "Role may not watch the board", body = ApiError)
    ),
    tag = "orders"
)]
pub async fn order_stream(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let (tenant_id, scope) = FeedScope::for_principal(&principal)?;

    tracing::info!(
        tenant_id = %tenant_id,
        subject = %principal.subject,
        ?scope,
        "Live feed opened"
    );

    let events = state
        .feed
        .subscribe(tenant_id, scope, state.shutdown.child_token())
        .filter_map(|update| async move { update_event(&update) })
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn update_event(update: &FeedUpdate) -> Option<Event> {
    let encoded = match update {
        FeedUpdate::Snapshot(snapshot) => Event::default().event(SNAPSHOT_EVENT).json_data(snapshot),
        FeedUpdate::Unavailable { message } => Event::default()
            .event(UNAVAILABLE_EVENT)
            .json_data(json!({ "message": message })),
    };
    match encoded {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::error!(error = %err, "Failed to encode feed event");
            None
        }
    }
}
