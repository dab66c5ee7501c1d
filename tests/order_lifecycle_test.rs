mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, response_json, ProductSeed, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

async fn order_for(app: &TestApp, user_id: i32, heading: &str, price: rust_decimal::Decimal) -> i32 {
    let mut seed = ProductSeed::new(heading, price, 10);
    seed.images = vec![format!("https://cdn.test/{}.jpg", heading.to_lowercase().replace(' ', "-"))];
    let product = app.seed_product(seed).await;
    app.add_to_cart(user_id, product, 1).await;
    app.place_order(user_id).await
}

#[tokio::test]
async fn order_projection_embeds_live_product_and_snapshot() {
    let app = TestApp::new().await;
    let order_id = order_for(&app, 1, "Camp Mug", dec!(12)).await;

    let (status, body) =
        response_json(app.request(Method::GET, &format!("/api/orders/{order_id}"), None).await)
            .await;

    assert_eq!(status, StatusCode::OK);
    let order = &body["data"];
    assert_eq!(order["id"], order_id);
    assert_eq!(order["user_id"], 1);
    assert_eq!(decimal(&order["total_amount"]), dec!(12));
    let item = &order["items"][0];
    assert_eq!(item["quantity"], 1);
    assert_eq!(item["product_details"]["heading"], "Camp Mug");
    assert_eq!(item["product"]["heading"], "Camp Mug");
    assert_eq!(item["product"]["images"], json!(["https://cdn.test/camp-mug.jpg"]));
}

#[tokio::test]
async fn deleted_product_leaves_snapshot_but_no_live_product() {
    let app = TestApp::new().await;
    let order_id = order_for(&app, 1, "Camp Mug", dec!(12)).await;
    app.execute("DELETE FROM products").await;

    let (status, body) =
        response_json(app.request(Method::GET, &format!("/api/orders/{order_id}"), None).await)
            .await;

    assert_eq!(status, StatusCode::OK);
    let item = &body["data"]["items"][0];
    assert!(item["product"].is_null());
    assert_eq!(item["product_details"]["brand"], "Basics Co");
}

#[tokio::test]
async fn listings_are_newest_first_and_scoped_by_user() {
    let app = TestApp::new().await;
    let first = order_for(&app, 1, "Camp Mug", dec!(12)).await;
    let second = order_for(&app, 2, "Crew Tee", dec!(20)).await;
    let third = order_for(&app, 1, "Zip Hoodie", dec!(60)).await;

    let (_, body) = response_json(app.request(Method::GET, "/api/orders", None).await).await;
    let ids: Vec<i64> = body["data"]["orders"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![third as i64, second as i64, first as i64]);
    assert!(body["data"].get("pagination").is_none());

    let (_, body) = response_json(app.request(Method::GET, "/api/orders/user/1", None).await).await;
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![third as i64, first as i64]);

    let (_, body) =
        response_json(app.request(Method::GET, "/api/orders?userId=2", None).await).await;
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn listing_paginates_when_asked() {
    let app = TestApp::new().await;
    for (index, price) in [dec!(5), dec!(6), dec!(7)].into_iter().enumerate() {
        order_for(&app, 1, &format!("Sticker {index}"), price).await;
    }

    let (_, body) =
        response_json(app.request(Method::GET, "/api/orders?page=2&limit=2", None).await).await;
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["pagination"]["total"], 3);
    assert_eq!(body["data"]["pagination"]["total_pages"], 2);

    let (_, body) = response_json(app.request(Method::GET, "/api/admin/orders?limit=2", None).await).await;
    assert_eq!(body["data"]["orders"].as_array().unwrap().len(), 2);
    assert_eq!(body["data"]["pagination"]["current_page"], 1);
}

#[tokio::test]
async fn huge_page_numbers_return_an_empty_page() {
    let app = TestApp::new().await;
    order_for(&app, 1, "Camp Mug", dec!(12)).await;

    for uri in [
        "/api/orders?page=18446744073709551615",
        "/api/admin/orders?page=18446744073709551615&limit=100",
    ] {
        let (status, body) = response_json(app.request(Method::GET, uri, None).await).await;
        assert_eq!(status, StatusCode::OK, "{uri} failed: {body}");
        assert_eq!(body["data"]["orders"], json!([]));
        assert_eq!(body["data"]["pagination"]["total"], 1);
    }
}

#[tokio::test]
async fn unknown_order_is_not_found() {
    let app = TestApp::new().await;

    let (status, body) = response_json(app.request(Method::GET, "/api/orders/55", None).await).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found: Order 55 not found");
}

#[tokio::test]
async fn status_can_be_overwritten_in_any_direction() {
    let app = TestApp::new().await;
    let order_id = order_for(&app, 1, "Camp Mug", dec!(12)).await;

    for status in ["Shipped", "pending", " delivered "] {
        let (code, body) = response_json(
            app.request(
                Method::PUT,
                &format!("/api/orders/{order_id}/status"),
                Some(json!({ "status": status })),
            )
            .await,
        )
        .await;
        assert_eq!(code, StatusCode::OK);
        assert_eq!(body["message"], "Order status updated");
        assert_eq!(body["data"]["status"], status.trim().to_lowercase());
    }

    let (code, _) = response_json(
        app.request(
            Method::PUT,
            &format!("/api/admin/orders/update/{order_id}"),
            Some(json!({ "status": "processing" })),
        )
        .await,
    )
    .await;
    assert_eq!(code, StatusCode::OK);
}

#[tokio::test]
async fn invalid_status_updates_are_rejected() {
    let app = TestApp::new().await;
    let order_id = order_for(&app, 1, "Camp Mug", dec!(12)).await;
    let uri = format!("/api/orders/{order_id}/status");

    let (code, body) =
        response_json(app.request(Method::PUT, &uri, Some(json!({ "status": "lost" }))).await).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("invalid order status: lost"));

    let (code, body) =
        response_json(app.request(Method::PUT, &uri, Some(json!({ "status": "  " }))).await).await;
    assert_eq!(code, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("status is required"));

    let (code, _) = response_json(
        app.request(Method::PUT, "/api/orders/999/status", Some(json!({ "status": "shipped" })))
            .await,
    )
    .await;
    assert_eq!(code, StatusCode::NOT_FOUND);

    let (_, order) = response_json(app.request(Method::GET, &format!("/api/orders/{order_id}"), None).await).await;
    assert_eq!(order["data"]["status"], "pending");
}
