//! End-to-end behaviour of the HTTP surface through the assembled router.

mod test_utils;

use axum::http::{StatusCode, header};
use serde_json::json;
use tableside::auth::Role;
use tableside::models::item_customization::CustomizationAction;
use tableside::repositories::AuditLogRepository;
use test_utils::*;

#[tokio::test]
async fn customer_places_order_without_token() {
    let fx = seeded().await.unwrap();
    let (app, _) = build_app(fx.db.clone());

    let body = json!({
        "tenantCode": "1234",
        "tableIdentifier": "A1",
        "items": [{ "itemId": fx.burger.id, "quantity": 1 }],
        "note": "  no rush  "
    });
    let response = send(&app, json_request("POST", "/api/v1/orders", None, &body)).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response
        .headers()
        .get(header::LOCATION)
        .expect("location header")
        .to_str()
        .unwrap()
        .to_string();
    let order = body_json(response).await;
    assert_eq!(location, format!("/api/v1/orders/{}", order["id"].as_str().unwrap()));
    assert_eq!(order["status"], "NEW");
    assert_eq!(order["total"], "10.00");
    assert_eq!(order["dailySequence"], 1);
    assert_eq!(order["displayCode"], "1234-A1-0001");
    assert_eq!(order["note"], "no rush");
    assert_eq!(order["lines"][0]["itemName"], "Burger");
}

#[tokio::test]
async fn invalid_cart_maps_to_bad_request() {
    let fx = seeded().await.unwrap();
    add_customization(&fx.db, fx.burger.id, "Brioche bun", rust_decimal::Decimal::ZERO, CustomizationAction::Change)
        .await
        .unwrap();
    let (app, _) = build_app(fx.db.clone());

    let body = json!({
        "tenantCode": "1234",
        "tableIdentifier": "A1",
        "items": [{ "itemId": fx.burger.id, "quantity": 1 }]
    });
    let response = send(&app, json_request("POST", "/api/v1/orders", None, &body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = body_json(response).await;
    assert_eq!(error["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let fx = seeded().await.unwrap();
    let (app, _) = build_app(fx.db.clone());

    let body = json!({ "tenantCode": "1234" });
    let response = send(&app, json_request("POST", "/api/v1/orders", None, &body)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_table_maps_to_not_found() {
    let fx = seeded().await.unwrap();
    let (app, _) = build_app(fx.db.clone());

    let body = json!({
        "tenantCode": "1234",
        "tableIdentifier": "Q7",
        "items": [{ "itemId": fx.burger.id, "quantity": 1 }]
    });
    let response = send(&app, json_request("POST", "/api/v1/orders", None, &body)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    let fx = seeded().await.unwrap();
    let (app, _) = build_app(fx.db.clone());

    for uri in ["/api/v1/orders", "/api/v1/tables", "/api/v1/orders/stream"] {
        let response = send(&app, get_request(uri, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = send(&app, get_request("/api/v1/orders", Some("not-a-jwt"))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn staff_cannot_manage_tables() {
    let fx = seeded().await.unwrap();
    let (app, _) = build_app(fx.db.clone());
    let staff = token(Role::Staff, Some(fx.tenant.id));

    let response = send(&app, get_request("/api/v1/tables", Some(&staff))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json!({ "identifiers": ["B1"] });
    let response = send(&app, json_request("POST", "/api/v1/tables", Some(&staff), &body)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn owner_creates_conflicts_and_deletes_tables() {
    let fx = seeded().await.unwrap();
    let (app, _) = build_app(fx.db.clone());
    let owner = token(Role::Owner, Some(fx.tenant.id));

    let body = json!({ "identifiers": ["b1"] });
    let response = send(&app, json_request("POST", "/api/v1/tables", Some(&owner), &body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created[0]["tableIdentifier"], "B1");
    assert_eq!(created[0]["outcome"], "created");
    assert_eq!(created[0]["qrUrl"], "https://order.example.com/1234/B1");

    let body = json!({ "identifiers": ["A1"] });
    let response = send(&app, json_request("POST", "/api/v1/tables", Some(&owner), &body)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let uri = format!("/api/v1/tables/{}", fx.table.id);
    let response = send(&app, json_request("DELETE", &uri, Some(&owner), &json!(null))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = send(&app, get_request("/api/v1/tables", Some(&owner))).await;
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(listed[0]["tableIdentifier"], "B1");
}

#[tokio::test]
async fn status_updates_flow_through_the_api() {
    let fx = seeded().await.unwrap();
    let (app, state) = build_app(fx.db.clone());
    let staff = token(Role::Staff, Some(fx.tenant.id));
    let order = state
        .orders
        .create_order(order_request("1234", "A1", vec![line(fx.burger.id, 1)]))
        .await
        .unwrap();
    let uri = format!("/api/v1/orders/{}/status", order.id);

    let response = send(
        &app,
        json_request("PATCH", &uri, Some(&staff), &json!({ "status": "COMPLETED" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        json_request("PATCH", &uri, Some(&staff), &json!({ "status": "PREPARING" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "PREPARING");

    let response = send(
        &app,
        get_request("/api/v1/orders?status=PREPARING", Some(&staff)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let listed = body_json(response).await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let response = send(&app, get_request("/api/v1/orders?limit=0", Some(&staff))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn other_tenants_orders_are_not_found() {
    let fx = seeded().await.unwrap();
    let other = create_tenant(&fx.db, "5678", "Harbour Grill").await.unwrap();
    let (app, state) = build_app(fx.db.clone());
    let order = state
        .orders
        .create_order(order_request("1234", "A1", vec![line(fx.burger.id, 1)]))
        .await
        .unwrap();
    let intruder = token(Role::Owner, Some(other.id));

    let uri = format!("/api/v1/orders/{}", order.id);
    let response = send(&app, get_request(&uri, Some(&intruder))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn public_menu_lists_visible_items() {
    let fx = seeded().await.unwrap();
    let hidden = create_item(&fx.db, fx.tenant.id, "H01", "Staff meal", rust_decimal::Decimal::ONE, "Mains")
        .await
        .unwrap();
    add_customization(&fx.db, fx.burger.id, "Extra cheese", rust_decimal::Decimal::new(150, 2), CustomizationAction::Add)
        .await
        .unwrap();
    let (app, _) = build_app(fx.db.clone());
    let owner = token(Role::Owner, Some(fx.tenant.id));

    let uri = format!("/api/v1/items/{}/availability", hidden.id);
    let response = send(&app, json_request("PATCH", &uri, Some(&owner), &json!({ "hidden": true }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["hidden"], true);

    let response = send(&app, get_request("/api/v1/menu/1234", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let menu = body_json(response).await;
    assert_eq!(menu["tenantName"], "Corner Bistro");
    assert_eq!(menu["categories"], json!(["Mains"]));
    let items = menu["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["name"], "Burger");
    assert_eq!(items[0]["price"], "10.00");
    assert_eq!(items[0]["customizations"][0]["action"], "ADD");

    let response = send(&app, get_request("/api/v1/menu/0000", None)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let audited = AuditLogRepository::new(&fx.db).for_entity(hidden.id).await.unwrap();
    assert_eq!(audited.len(), 1);
    assert_eq!(audited[0].action, "menu_item.availability_changed");
}

#[tokio::test]
async fn availability_update_needs_a_flag() {
    let fx = seeded().await.unwrap();
    let (app, _) = build_app(fx.db.clone());
    let staff = token(Role::Staff, Some(fx.tenant.id));

    let uri = format!("/api/v1/items/{}/availability", fx.burger.id);
    let response = send(&app, json_request("PATCH", &uri, Some(&staff), &json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(&app, json_request("PATCH", &uri, Some(&staff), &json!({ "active": false }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["active"], false);
}

#[tokio::test]
async fn health_and_root_are_public() {
    let fx = seeded().await.unwrap();
    let (app, _) = build_app(fx.db.clone());

    let response = send(&app, get_request("/health", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["database"], "up");

    let response = send(&app, get_request("/", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["service"], "tableside");
}

#[tokio::test]
async fn hidden_items_stay_listed_for_staff() {
    let fx = seeded().await.unwrap();
    let soup = create_item(&fx.db, fx.tenant.id, "S01", "Soup", rust_decimal::Decimal::new(650, 2), "Starters")
        .await
        .unwrap();
    let other = create_tenant(&fx.db, "5678", "Harbour Grill").await.unwrap();
    create_item(&fx.db, other.id, "X01", "Oysters", rust_decimal::Decimal::TEN, "Raw bar")
        .await
        .unwrap();
    let (app, _) = build_app(fx.db.clone());
    let staff = token(Role::Staff, Some(fx.tenant.id));

    let uri = format!("/api/v1/items/{}/availability", soup.id);
    let response = send(&app, json_request("PATCH", &uri, Some(&staff), &json!({ "hidden": true }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let uri = format!("/api/v1/items/{}/availability", fx.burger.id);
    let response = send(&app, json_request("PATCH", &uri, Some(&staff), &json!({ "active": false }))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let menu = body_json(send(&app, get_request("/api/v1/menu/1234", None)).await).await;
    assert_eq!(menu["items"].as_array().unwrap().len(), 1);

    let response = send(&app, get_request("/api/v1/items", Some(&staff))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let catalog = body_json(response).await;
    let items = catalog["items"].as_array().unwrap();
    assert_eq!(items.len(), 2, "other tenants' items are not listed");
    assert_eq!(items[0]["name"], "Burger");
    assert_eq!(items[0]["active"], false);
    assert_eq!(items[1]["id"], soup.id.to_string());
    assert_eq!(items[1]["hidden"], true);
    assert_eq!(items[1]["price"], "6.50");
    assert_eq!(catalog["categories"], json!(["Mains", "Starters"]));
    assert_eq!(catalog["inactiveCount"], 1);
    assert_eq!(catalog["hiddenCount"], 1);

    let uri = format!("/api/v1/items/{}/availability", soup.id);
    let response = send(&app, json_request("PATCH", &uri, Some(&staff), &json!({ "hidden": false }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let menu = body_json(send(&app, get_request("/api/v1/menu/1234", None)).await).await;
    assert_eq!(menu["items"].as_array().unwrap().len(), 2);

    let response = send(&app, get_request("/api/v1/items", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
