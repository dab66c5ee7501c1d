mod common;

use axum::http::{Method, StatusCode};
use common::{decimal, response_json, ProductSeed, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;

#[tokio::test]
async fn adding_the_same_product_twice_merges_quantities() {
    let app = TestApp::new().await;
    let mut seed = ProductSeed::new("Crew Tee", dec!(25), 10);
    seed.mrp = dec!(30);
    seed.images = vec!["https://cdn.test/tee-front.jpg".into()];
    let shirt = app.seed_product(seed).await;

    for quantity in [2, 3] {
        let (status, body) = response_json(
            app.request(
                Method::POST,
                "/api/cart/add",
                Some(json!({ "userId": 4, "productId": shirt, "quantity": quantity })),
            )
            .await,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Item added to cart");
    }

    let (status, body) = response_json(app.request(Method::GET, "/api/cart/4", None).await).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 5);
    assert_eq!(decimal(&items[0]["cart_price"]), dec!(25));
    assert_eq!(decimal(&items[0]["total_price"]), dec!(125));
    assert_eq!(items[0]["product_name"], "Crew Tee");
    assert_eq!(decimal(&items[0]["product_mrp"]), dec!(30));
    assert_eq!(items[0]["images"][0], "https://cdn.test/tee-front.jpg");
    assert_eq!(app.count_rows("cart_items").await, 1);
}

#[tokio::test]
async fn quantity_defaults_to_one() {
    let app = TestApp::new().await;
    let shirt = app.seed_product(ProductSeed::new("Crew Tee", dec!(25), 10)).await;

    let (status, body) = response_json(
        app.request(
            Method::POST,
            "/api/cart/add",
            Some(json!({ "userId": 4, "productId": shirt })),
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], 1);
}

#[tokio::test]
async fn add_requires_user_and_product() {
    let app = TestApp::new().await;

    let (status, body) = response_json(
        app.request(Method::POST, "/api/cart/add", Some(json!({ "userId": 4 })))
            .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("userId and productId are required"));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let app = TestApp::new().await;

    let response = app
        .request_with_headers(Method::POST, "/api/cart/add", None, &[("content-type", "application/json")])
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_or_inactive_products_cannot_be_added() {
    let app = TestApp::new().await;
    let retired = app.seed_product(ProductSeed::new("Old Tee", dec!(5), 10)).await;
    app.state
        .services
        .catalog
        .deactivate_product(retired)
        .await
        .unwrap();

    for product_id in [retired, 999] {
        let (status, body) = response_json(
            app.request(
                Method::POST,
                "/api/cart/add",
                Some(json!({ "userId": 4, "productId": product_id })),
            )
            .await,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body["message"],
            format!("Not found: Product {product_id} not found")
        );
    }
    assert_eq!(app.count_rows("cart_items").await, 0);
}

#[tokio::test]
async fn update_sets_quantity_and_recomputes_total() {
    let app = TestApp::new().await;
    let shirt = app.seed_product(ProductSeed::new("Crew Tee", dec!(12.5), 10)).await;
    app.add_to_cart(4, shirt, 1).await;

    let (status, body) = response_json(
        app.request(
            Method::PUT,
            "/api/cart/update",
            Some(json!({ "userId": 4, "productId": shirt, "quantity": 4 })),
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cart item updated");
    assert_eq!(body["data"]["quantity"], 4);
    assert_eq!(decimal(&body["data"]["total_price"]), dec!(50));
}

#[tokio::test]
async fn update_rejects_zero_quantity_and_missing_items() {
    let app = TestApp::new().await;
    let shirt = app.seed_product(ProductSeed::new("Crew Tee", dec!(10), 10)).await;
    app.add_to_cart(4, shirt, 1).await;

    let (status, body) = response_json(
        app.request(
            Method::PUT,
            "/api/cart/update",
            Some(json!({ "userId": 4, "productId": shirt, "quantity": 0 })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("quantity must be at least 1"));

    let (status, body) = response_json(
        app.request(
            Method::PUT,
            "/api/cart/update",
            Some(json!({ "userId": 5, "productId": shirt, "quantity": 2 })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Not found: Cart item not found");
}

#[tokio::test]
async fn remove_deletes_only_the_matching_line() {
    let app = TestApp::new().await;
    let shirt = app.seed_product(ProductSeed::new("Crew Tee", dec!(10), 10)).await;
    let mug = app.seed_product(ProductSeed::new("Camp Mug", dec!(8), 10)).await;
    app.add_to_cart(4, shirt, 1).await;
    app.add_to_cart(4, mug, 1).await;

    let (status, body) = response_json(
        app.request(
            Method::DELETE,
            "/api/cart/remove",
            Some(json!({ "userId": 4, "productId": shirt })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cart item removed");

    let (_, cart) = response_json(app.request(Method::GET, "/api/cart/4", None).await).await;
    let items = cart["data"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], mug);

    let (status, _) = response_json(
        app.request(
            Method::DELETE,
            "/api/cart/remove",
            Some(json!({ "userId": 4, "productId": shirt })),
        )
        .await,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clear_is_idempotent() {
    let app = TestApp::new().await;
    let shirt = app.seed_product(ProductSeed::new("Crew Tee", dec!(10), 10)).await;
    app.add_to_cart(4, shirt, 2).await;

    let (status, body) =
        response_json(app.request(Method::DELETE, "/api/cart/clear/4", None).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Cart cleared");
    assert_eq!(body["data"]["removed"], 1);

    let (status, body) =
        response_json(app.request(Method::DELETE, "/api/cart/clear/4", None).await).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], 0);
}

#[tokio::test]
async fn cart_of_unknown_user_is_empty() {
    let app = TestApp::new().await;

    let (status, body) = response_json(app.request(Method::GET, "/api/cart/77", None).await).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn add_rejects_quantities_past_the_line_limit() {
    let app = TestApp::new().await;
    let shirt = app.seed_product(ProductSeed::new("Crew Tee", dec!(25), 10)).await;
    let add = |quantity: i64| {
        app.request(
            Method::POST,
            "/api/cart/add",
            Some(json!({ "userId": 4, "productId": shirt, "quantity": quantity })),
        )
    };

    let (status, body) = response_json(add(i32::MAX as i64).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("quantity must be at most 10000"));

    let (status, _) = response_json(add(10_000).await).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = response_json(add(1).await).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("cart line cannot hold more than 10000"));

    let (_, body) = response_json(app.request(Method::GET, "/api/cart/4", None).await).await;
    assert_eq!(body["data"][0]["quantity"], 10_000);
    assert_eq!(decimal(&body["data"][0]["total_price"]), dec!(250000));
}

#[tokio::test]
async fn line_totals_must_fit_the_money_column() {
    let app = TestApp::new().await;
    let watch = app
        .seed_product(ProductSeed::new("Gold Watch", dec!(99999.99), 10))
        .await;
    app.add_to_cart(4, watch, 1).await;

    let (status, body) = response_json(
        app.request(
            Method::PUT,
            "/api/cart/update",
            Some(json!({ "userId": 4, "productId": watch, "quantity": 2000 })),
        )
        .await,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("exceeds the maximum"));
    let (_, body) = response_json(app.request(Method::GET, "/api/cart/4", None).await).await;
    assert_eq!(body["data"][0]["quantity"], 1);
}

#[tokio::test]
async fn only_one_active_line_per_product_is_stored() {
    let app = TestApp::new().await;
    let shirt = app.seed_product(ProductSeed::new("Crew Tee", dec!(25), 10)).await;
    app.add_to_cart(4, shirt, 1).await;

    let duplicate = format!(
        "INSERT INTO cart_items \
         (user_id, product_id, quantity, price, total_price, status, created_at, updated_at) \
         VALUES (4, {shirt}, 1, 25, 25, 'active', '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')"
    );
    assert!(app.try_execute(&duplicate).await.is_err());

    // Ordered lines are history; a fresh active line may follow them.
    app.place_order(4).await;
    app.add_to_cart(4, shirt, 2).await;
    assert_eq!(app.count_rows("cart_items").await, 2);

    let (_, body) = response_json(app.request(Method::GET, "/api/cart/4", None).await).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["quantity"], 2);
}
