use crate::{
    entities::cart_item::{
        self, line_total, validate_line_quantity, CartItemStatus, Entity as CartItem, MAX_AMOUNT,
        MAX_LINE_QUANTITY,
    },
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::catalog::load_image_urls,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddToCartInput {
    #[serde(default, alias = "userId")]
    #[validate(range(min = 1, message = "userId and productId are required"))]
    pub user_id: i32,
    #[serde(default, alias = "productId")]
    #[validate(range(min = 1, message = "userId and productId are required"))]
    pub product_id: i32,
    #[serde(default = "default_quantity")]
    #[validate(custom = "validate_line_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCartItemInput {
    #[serde(default, alias = "userId")]
    #[validate(range(min = 1, message = "userId and productId are required"))]
    pub user_id: i32,
    #[serde(default, alias = "productId")]
    #[validate(range(min = 1, message = "userId and productId are required"))]
    pub product_id: i32,
    #[serde(default)]
    #[validate(custom = "validate_line_quantity")]
    pub quantity: i32,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RemoveCartItemInput {
    #[serde(default, alias = "userId")]
    #[validate(range(min = 1, message = "userId and productId are required"))]
    pub user_id: i32,
    #[serde(default, alias = "productId")]
    #[validate(range(min = 1, message = "userId and productId are required"))]
    pub product_id: i32,
}

/// Cart line joined with the live product it points at
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartItemView {
    pub cart_item_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    /// Price captured when the item was added
    pub cart_price: Decimal,
    pub total_price: Decimal,
    pub product_name: String,
    /// Current catalog price, for display only
    pub product_price: Decimal,
    pub product_mrp: Decimal,
    pub product_brand: String,
    pub product_item: String,
    pub product_type: String,
    pub images: Vec<String>,
}

#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Adds a product to the user's cart, or bumps the quantity of the existing line.
    ///
    /// The line keeps the price captured on first add; repeat adds recompute
    /// the total from that stored price. A first add that loses a race against
    /// another first add for the same product hits the active-line unique index
    /// and is retried as a merge.
    #[instrument(skip(self, input), fields(user_id = input.user_id, product_id = input.product_id))]
    pub async fn add_item(&self, input: AddToCartInput) -> Result<cart_item::Model, ServiceError> {
        input.validate()?;

        let item = match self.upsert_line(&input).await {
            Err(ServiceError::DatabaseError(err)) if is_unique_violation(&err) => {
                warn!(error = %err, "Concurrent first add; merging into the existing line");
                self.upsert_line(&input).await?
            }
            result => result?,
        };

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                user_id: input.user_id,
                product_id: input.product_id,
                quantity: input.quantity,
            });

        info!(cart_item_id = item.id, quantity = item.quantity, "Item added to cart");
        Ok(item)
    }

    async fn upsert_line(&self, input: &AddToCartInput) -> Result<cart_item::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let product = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .filter(product::Model::is_active)
            .ok_or_else(|| ServiceError::not_found("Product", input.product_id))?;

        let existing = CartItem::find()
            .filter(cart_item::Column::UserId.eq(input.user_id))
            .filter(cart_item::Column::ProductId.eq(input.product_id))
            .filter(cart_item::Column::Status.eq(CartItemStatus::Active))
            .one(&txn)
            .await?;

        let now = Utc::now();
        let item = match existing {
            Some(item) => {
                let quantity = item
                    .quantity
                    .checked_add(input.quantity)
                    .filter(|q| *q <= MAX_LINE_QUANTITY)
                    .ok_or_else(|| {
                        ServiceError::ValidationError(format!(
                            "quantity: cart line cannot hold more than {}",
                            MAX_LINE_QUANTITY
                        ))
                    })?;
                let price = item.price;
                let total_price = bounded_line_total(price, quantity)?;
                let mut active: cart_item::ActiveModel = item.into();
                active.quantity = Set(quantity);
                active.total_price = Set(total_price);
                active.updated_at = Set(now);
                active.update(&txn).await?
            }
            None => {
                cart_item::ActiveModel {
                    user_id: Set(input.user_id),
                    product_id: Set(product.id),
                    quantity: Set(input.quantity),
                    price: Set(product.price),
                    total_price: Set(bounded_line_total(product.price, input.quantity)?),
                    status: Set(CartItemStatus::Active),
                    created_at: Set(now),
                    updated_at: Set(now),
                    ..Default::default()
                }
                .insert(&txn)
                .await?
            }
        };

        txn.commit().await?;
        Ok(item)
    }

    /// Active cart lines for a user, newest first. Lines whose product row is
    /// gone are omitted.
    #[instrument(skip(self))]
    pub async fn list_items(&self, user_id: i32) -> Result<Vec<CartItemView>, ServiceError> {
        let db = &*self.db;
        let rows = CartItem::find()
            .find_also_related(Product)
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::Status.eq(CartItemStatus::Active))
            .order_by_desc(cart_item::Column::CreatedAt)
            .order_by_desc(cart_item::Column::Id)
            .all(db)
            .await?;

        let joined: Vec<(cart_item::Model, product::Model)> = rows
            .into_iter()
            .filter_map(|(item, product)| product.map(|p| (item, p)))
            .collect();

        let product_ids: Vec<i32> = joined.iter().map(|(_, p)| p.id).collect();
        let images = load_image_urls(db, &product_ids).await?;

        Ok(joined
            .into_iter()
            .map(|(item, product)| CartItemView {
                cart_item_id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                cart_price: item.price,
                total_price: item.total_price,
                images: images.get(&product.id).cloned().unwrap_or_default(),
                product_name: product.heading,
                product_price: product.price,
                product_mrp: product.mrp,
                product_brand: product.brand,
                product_item: product.item,
                product_type: product.product_type,
            })
            .collect())
    }

    #[instrument(skip(self, input), fields(user_id = input.user_id, product_id = input.product_id))]
    pub async fn update_item(
        &self,
        input: UpdateCartItemInput,
    ) -> Result<cart_item::Model, ServiceError> {
        input.validate()?;

        let db = &*self.db;
        let item = self.find_active_item(input.user_id, input.product_id).await?;

        let total_price = bounded_line_total(item.price, input.quantity)?;
        let mut active: cart_item::ActiveModel = item.into();
        active.quantity = Set(input.quantity);
        active.total_price = Set(total_price);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        info!(quantity = updated.quantity, "Cart item updated");
        Ok(updated)
    }

    #[instrument(skip(self, input), fields(user_id = input.user_id, product_id = input.product_id))]
    pub async fn remove_item(&self, input: RemoveCartItemInput) -> Result<(), ServiceError> {
        input.validate()?;

        let item = self.find_active_item(input.user_id, input.product_id).await?;
        CartItem::delete_by_id(item.id).exec(&*self.db).await?;

        info!(cart_item_id = item.id, "Cart item removed");
        Ok(())
    }

    /// Removes every active line for the user; returns how many were removed.
    #[instrument(skip(self))]
    pub async fn clear(&self, user_id: i32) -> Result<u64, ServiceError> {
        let result = CartItem::delete_many()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::Status.eq(CartItemStatus::Active))
            .exec(&*self.db)
            .await?;

        self.event_sender
            .send_or_log(Event::CartCleared {
                user_id,
                removed: result.rows_affected,
            });

        info!(user_id, removed = result.rows_affected, "Cart cleared");
        Ok(result.rows_affected)
    }

    async fn find_active_item(
        &self,
        user_id: i32,
        product_id: i32,
    ) -> Result<cart_item::Model, ServiceError> {
        CartItem::find()
            .filter(cart_item::Column::UserId.eq(user_id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .filter(cart_item::Column::Status.eq(CartItemStatus::Active))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart item not found".to_string()))
    }
}

fn bounded_line_total(price: Decimal, quantity: i32) -> Result<Decimal, ServiceError> {
    let total = line_total(price, quantity);
    if total > MAX_AMOUNT {
        return Err(ServiceError::ValidationError(format!(
            "quantity: line total {} exceeds the maximum of {}",
            total, MAX_AMOUNT
        )));
    }
    Ok(total)
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{insert_product, migrated_pool};
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[test]
    fn add_input_accepts_camel_case_and_defaults_quantity() {
        let input: AddToCartInput =
            serde_json::from_value(serde_json::json!({"userId": 4, "productId": 9})).unwrap();
        assert_eq!(input.user_id, 4);
        assert_eq!(input.product_id, 9);
        assert_eq!(input.quantity, 1);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn add_input_requires_ids() {
        let input: AddToCartInput =
            serde_json::from_value(serde_json::json!({"user_id": 0, "product_id": 3})).unwrap();
        assert!(input.validate().is_err());
    }

    #[test]
    fn update_input_rejects_zero_quantity() {
        let input = UpdateCartItemInput {
            user_id: 1,
            product_id: 2,
            quantity: 0,
        };
        assert!(input.validate().is_err());
    }

    #[tokio::test]
    async fn cart_writes_finish_while_the_event_consumer_is_stalled() {
        let db = migrated_pool().await;
        let product = insert_product(&db, "Crew Tee", 10).await;
        // Receiver kept alive but never drained.
        let (tx, _rx) = mpsc::channel(1);
        let service = CartService::new(Arc::new(db), Arc::new(EventSender::new(tx)));

        let writes = async {
            for _ in 0..3 {
                service
                    .add_item(AddToCartInput {
                        user_id: 1,
                        product_id: product.id,
                        quantity: 1,
                    })
                    .await
                    .unwrap();
            }
            service.clear(1).await.unwrap()
        };
        let removed = tokio::time::timeout(Duration::from_secs(5), writes)
            .await
            .expect("cart writes blocked on the event channel");

        assert_eq!(removed, 1);
    }
}
