//! Cart-to-order conversion.
//!
//! Placing an order runs as one database transaction: the order header, its
//! lines, the stock decrements and the cart status flip either all land or
//! none do. Stock is decremented with a guarded `UPDATE ... WHERE
//! stock_quantity >= n`, so two checkouts racing for the last units cannot
//! both succeed.

use crate::{
    entities::cart_item::{self, line_total, CartItemStatus, Entity as CartItem, MAX_AMOUNT},
    entities::order::{self, Entity as Order, OrderStatus, PaymentStatus},
    entities::order_item::{self, ProductDetails},
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
    tracing::with_metrics,
};
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

const ORDER_NUMBER_ATTEMPTS: usize = 5;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CheckoutInput {
    #[serde(default, alias = "userId")]
    #[validate(range(min = 1, message = "userId is required"))]
    pub user_id: i32,
    #[serde(default, alias = "shippingAddress")]
    pub shipping_address: Option<serde_json::Value>,
    #[serde(default, alias = "billingAddress")]
    pub billing_address: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    pub order_id: i32,
    pub order_number: String,
    pub total_amount: Decimal,
    pub item_count: usize,
    pub created_at: DateTime<Utc>,
}

/// `ORD-<epoch millis>-<0..999>`
pub fn generate_order_number() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1000);
    format!("ORD-{}-{}", Utc::now().timestamp_millis(), suffix)
}

/// Sum of snapshot line totals, rounded to cents.
pub fn order_total(items: &[cart_item::Model]) -> Decimal {
    items
        .iter()
        .map(|item| line_total(item.price, item.quantity))
        .sum::<Decimal>()
        .round_dp(2)
}

#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Converts the user's active cart into a pending order.
    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    pub async fn checkout(&self, input: CheckoutInput) -> Result<CheckoutOutcome, ServiceError> {
        input.validate()?;

        let outcome = with_metrics("checkout", || self.place_order(&input)).await?;

        self.event_sender
            .send_or_log(Event::OrderCreated {
                order_id: outcome.order_id,
                order_number: outcome.order_number.clone(),
                user_id: input.user_id,
                total_amount: outcome.total_amount,
                created_at: outcome.created_at,
            });

        info!(
            order_id = outcome.order_id,
            order_number = %outcome.order_number,
            total_amount = %outcome.total_amount,
            "Order placed successfully"
        );
        Ok(outcome)
    }

    async fn place_order(&self, input: &CheckoutInput) -> Result<CheckoutOutcome, ServiceError> {
        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| ServiceError::from(e).in_transaction())?;
        match place_order_in(&txn, input).await {
            Ok(outcome) => {
                txn.commit()
                    .await
                    .map_err(|e| ServiceError::TransactionFailure(e.to_string()))?;
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rollback_err) = txn.rollback().await {
                    warn!(error = %rollback_err, "Checkout rollback failed");
                }
                Err(err.in_transaction())
            }
        }
    }
}

async fn place_order_in(
    txn: &DatabaseTransaction,
    input: &CheckoutInput,
) -> Result<CheckoutOutcome, ServiceError> {
    let cart = load_cart(txn, input.user_id).await?;
    write_order(txn, input, &cart).await
}

/// Active cart lines with the products they point at, stock pre-checked.
struct CartSnapshot {
    items: Vec<cart_item::Model>,
    products: HashMap<i32, product::Model>,
}

impl CartSnapshot {
    fn product(&self, item: &cart_item::Model) -> Result<&product::Model, ServiceError> {
        self.products
            .get(&item.product_id)
            .ok_or(ServiceError::ProductMissing(item.product_id))
    }
}

async fn load_cart(txn: &DatabaseTransaction, user_id: i32) -> Result<CartSnapshot, ServiceError> {
    let items = CartItem::find()
        .filter(cart_item::Column::UserId.eq(user_id))
        .filter(cart_item::Column::Status.eq(CartItemStatus::Active))
        .order_by_asc(cart_item::Column::Id)
        .all(txn)
        .await?;

    if items.is_empty() {
        return Err(ServiceError::EmptyCart);
    }

    let product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
    let products: HashMap<i32, product::Model> = Product::find()
        .filter(product::Column::Id.is_in(product_ids))
        .all(txn)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let cart = CartSnapshot { items, products };
    for item in &cart.items {
        let product = cart.product(item)?;
        if item.quantity > product.stock_quantity {
            return Err(insufficient_stock(product, item.quantity));
        }
    }
    Ok(cart)
}

async fn write_order(
    txn: &DatabaseTransaction,
    input: &CheckoutInput,
    cart: &CartSnapshot,
) -> Result<CheckoutOutcome, ServiceError> {
    let items = &cart.items;
    let total_amount = order_total(items);
    if total_amount > MAX_AMOUNT {
        return Err(ServiceError::ValidationError(format!(
            "order total {} exceeds the maximum of {}",
            total_amount, MAX_AMOUNT
        )));
    }
    let order_number = unique_order_number(txn).await?;
    let now = Utc::now();

    let order = order::ActiveModel {
        order_number: Set(order_number),
        user_id: Set(input.user_id),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending),
        payment_status: Set(PaymentStatus::Pending),
        shipping_address: Set(input.shipping_address.clone()),
        billing_address: Set(input.billing_address.clone()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    for item in items {
        let product = cart.product(item)?;

        let details = serde_json::to_value(ProductDetails::from(product))
            .map_err(|e| ServiceError::InternalError(e.to_string()))?;

        order_item::ActiveModel {
            order_id: Set(order.id),
            product_id: Set(item.product_id),
            quantity: Set(item.quantity),
            price: Set(item.price),
            total: Set(line_total(item.price, item.quantity)),
            product_details: Set(Some(details)),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        reserve_stock(txn, product, item.quantity, now).await?;
    }

    let item_ids: Vec<i32> = items.iter().map(|i| i.id).collect();
    let flipped = CartItem::update_many()
        .col_expr(
            cart_item::Column::Status,
            Expr::value(CartItemStatus::Ordered),
        )
        .col_expr(cart_item::Column::UpdatedAt, Expr::value(now))
        .filter(cart_item::Column::Id.is_in(item_ids))
        .filter(cart_item::Column::Status.eq(CartItemStatus::Active))
        .exec(txn)
        .await?;

    if flipped.rows_affected != items.len() as u64 {
        return Err(ServiceError::Conflict(
            "Cart changed while the order was being placed".to_string(),
        ));
    }

    Ok(CheckoutOutcome {
        order_id: order.id,
        order_number: order.order_number,
        total_amount,
        item_count: items.len(),
        created_at: order.created_at,
    })
}

/// Takes `quantity` units off the product only if that many are still in stock.
/// Stock sold by a concurrent checkout after the pre-check shows up here as
/// zero affected rows.
async fn reserve_stock(
    txn: &DatabaseTransaction,
    product: &product::Model,
    quantity: i32,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let updated = Product::update_many()
        .col_expr(
            product::Column::StockQuantity,
            Expr::col(product::Column::StockQuantity).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(now))
        .filter(product::Column::Id.eq(product.id))
        .filter(product::Column::StockQuantity.gte(quantity))
        .exec(txn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(insufficient_stock(product, quantity));
    }
    Ok(())
}

fn insufficient_stock(product: &product::Model, requested: i32) -> ServiceError {
    ServiceError::InsufficientStock(format!(
        "{} (requested {}, available {})",
        product.heading, requested, product.stock_quantity
    ))
}

async fn unique_order_number(txn: &DatabaseTransaction) -> Result<String, ServiceError> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = generate_order_number();
        let taken = Order::find()
            .filter(order::Column::OrderNumber.eq(candidate.as_str()))
            .count(txn)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    Err(ServiceError::TransactionFailure(
        "could not allocate a unique order number".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{insert_product, migrated_pool};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn cart_line(price: Decimal, quantity: i32) -> cart_item::Model {
        let now = Utc::now();
        cart_item::Model {
            id: 1,
            user_id: 1,
            product_id: 1,
            quantity,
            price,
            total_price: line_total(price, quantity),
            status: CartItemStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn order_number_has_expected_shape() {
        let number = generate_order_number();
        let parts: Vec<&str> = number.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert!(parts[1].parse::<i64>().is_ok());
        let suffix: u32 = parts[2].parse().unwrap();
        assert!(suffix < 1000);
    }

    #[test]
    fn total_sums_snapshot_lines() {
        let items = vec![cart_line(dec!(100), 2), cart_line(dec!(50), 1)];
        assert_eq!(order_total(&items), dec!(250));
    }

    #[test]
    fn total_rounds_to_cents() {
        let items = vec![cart_line(dec!(0.105), 3)];
        assert_eq!(order_total(&items), dec!(0.32));
    }

    #[tokio::test]
    async fn stock_sold_after_the_precheck_fails_and_rolls_back() {
        let db = migrated_pool().await;
        let product = insert_product(&db, "Limited Print", 5).await;
        let now = Utc::now();
        cart_item::ActiveModel {
            user_id: Set(1),
            product_id: Set(product.id),
            quantity: Set(3),
            price: Set(product.price),
            total_price: Set(line_total(product.price, 3)),
            status: Set(CartItemStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();
        let input = CheckoutInput {
            user_id: 1,
            shipping_address: None,
            billing_address: None,
        };

        let txn = db.begin().await.unwrap();
        let cart = load_cart(&txn, input.user_id).await.unwrap();
        // Another checkout sells 3 of the 5 units between pre-check and write.
        Product::update_many()
            .col_expr(product::Column::StockQuantity, Expr::value(2))
            .filter(product::Column::Id.eq(product.id))
            .exec(&txn)
            .await
            .unwrap();
        let err = write_order(&txn, &input, &cart).await.unwrap_err();
        txn.rollback().await.unwrap();

        match err {
            ServiceError::InsufficientStock(message) => {
                assert!(message.starts_with("Limited Print"), "{message}")
            }
            other => panic!("expected insufficient stock, got {other}"),
        }
        assert_eq!(Order::find().count(&db).await.unwrap(), 0);
        assert_eq!(order_item::Entity::find().count(&db).await.unwrap(), 0);
        let line = CartItem::find().one(&db).await.unwrap().unwrap();
        assert_eq!(line.status, CartItemStatus::Active);
    }

    #[tokio::test]
    async fn failing_to_open_the_transaction_is_a_transaction_failure() {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        let service = CheckoutService::new(
            Arc::new(DatabaseConnection::Disconnected),
            Arc::new(EventSender::new(tx)),
        );

        let err = service
            .checkout(CheckoutInput {
                user_id: 1,
                shipping_address: None,
                billing_address: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::TransactionFailure(_)), "{err}");
        assert_eq!(err.response_message(), "Order could not be placed");
    }

    #[tokio::test]
    async fn reserve_stock_refuses_to_go_negative() {
        let db = migrated_pool().await;
        let product = insert_product(&db, "Limited Print", 2).await;

        let txn = db.begin().await.unwrap();
        reserve_stock(&txn, &product, 2, Utc::now()).await.unwrap();
        let err = reserve_stock(&txn, &product, 1, Utc::now()).await.unwrap_err();
        txn.commit().await.unwrap();

        assert!(matches!(err, ServiceError::InsufficientStock(_)));
        let stored = Product::find_by_id(product.id).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 0);
    }

    proptest! {
        #[test]
        fn total_equals_sum_of_line_totals(
            lines in prop::collection::vec((1u32..100_000u32, 1i32..20i32), 1..8)
        ) {
            let items: Vec<cart_item::Model> = lines
                .iter()
                .map(|(cents, qty)| cart_line(Decimal::new(*cents as i64, 2), *qty))
                .collect();
            let expected: Decimal = items.iter().map(|i| i.price * Decimal::from(i.quantity)).sum();
            prop_assert_eq!(order_total(&items), expected);
        }
    }
}
