mod common;

use common::{ProductSeed, TestApp};
use rust_decimal_macros::dec;
use storefront_api::{errors::ServiceError, services::checkout::CheckoutInput};

// Eight shoppers each hold 3 units of a product with 10 in stock; at most three orders fit.
#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let app = TestApp::new().await;
    let product = app.seed_product(ProductSeed::new("Limited Print", dec!(30), 10)).await;
    for user_id in 1..=8 {
        app.add_to_cart(user_id, product, 3).await;
    }

    let mut tasks = Vec::new();
    for user_id in 1..=8 {
        let checkout = app.state.services.checkout.clone();
        tasks.push(tokio::spawn(async move {
            checkout
                .checkout(CheckoutInput {
                    user_id,
                    shipping_address: None,
                    billing_address: None,
                })
                .await
        }));
    }

    let mut placed = 0;
    for task in tasks {
        match task.await.expect("checkout task panicked") {
            Ok(_) => placed += 1,
            Err(ServiceError::InsufficientStock(_)) => {}
            Err(other) => panic!("unexpected checkout failure: {other}"),
        }
    }

    assert_eq!(placed, 3);
    assert_eq!(app.stock_of(product).await, 1);
    assert_eq!(app.count_rows("orders").await, 3);
    assert_eq!(app.count_rows("order_items").await, 3);
}
