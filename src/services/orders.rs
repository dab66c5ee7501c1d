use crate::{
    entities::order::{self, Entity as Order, OrderStatus, PaymentStatus},
    entities::order_item::{self, Entity as OrderItem, ProductDetails},
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{catalog::load_image_urls, page_in_range},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

/// Live product fields attached to an order line, when the product still exists
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderProductView {
    pub id: i32,
    pub heading: String,
    pub brand: String,
    pub product_type: String,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemView {
    pub id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub price: Decimal,
    pub total: Decimal,
    /// Snapshot taken at checkout
    pub product_details: Option<ProductDetails>,
    pub product: Option<OrderProductView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderView {
    pub id: i32,
    pub order_number: String,
    pub user_id: i32,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub shipping_address: Option<serde_json::Value>,
    pub billing_address: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderPage {
    pub orders: Vec<OrderView>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Expands order headers into full projections with a fixed number of queries.
pub async fn build_order_views<C: ConnectionTrait>(
    conn: &C,
    orders: Vec<order::Model>,
) -> Result<Vec<OrderView>, ServiceError> {
    if orders.is_empty() {
        return Ok(Vec::new());
    }

    let order_ids: Vec<i32> = orders.iter().map(|o| o.id).collect();
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.is_in(order_ids))
        .order_by_asc(order_item::Column::Id)
        .all(conn)
        .await?;

    let mut product_ids: Vec<i32> = items.iter().map(|i| i.product_id).collect();
    product_ids.sort_unstable();
    product_ids.dedup();

    let products: HashMap<i32, product::Model> = if product_ids.is_empty() {
        HashMap::new()
    } else {
        Product::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .all(conn)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect()
    };
    let images = load_image_urls(conn, &product_ids).await?;

    let mut items_by_order: HashMap<i32, Vec<OrderItemView>> = HashMap::new();
    for item in items {
        let product = products.get(&item.product_id).map(|p| OrderProductView {
            id: p.id,
            heading: p.heading.clone(),
            brand: p.brand.clone(),
            product_type: p.product_type.clone(),
            images: images.get(&p.id).cloned().unwrap_or_default(),
        });
        items_by_order
            .entry(item.order_id)
            .or_default()
            .push(OrderItemView {
                product_details: item.details(),
                id: item.id,
                product_id: item.product_id,
                quantity: item.quantity,
                price: item.price,
                total: item.total,
                product,
            });
    }

    Ok(orders
        .into_iter()
        .map(|o| OrderView {
            items: items_by_order.remove(&o.id).unwrap_or_default(),
            id: o.id,
            order_number: o.order_number,
            user_id: o.user_id,
            total_amount: o.total_amount,
            status: o.status,
            payment_status: o.payment_status,
            shipping_address: o.shipping_address,
            billing_address: o.billing_address,
            created_at: o.created_at,
            updated_at: o.updated_at,
        })
        .collect())
}

/// Parses an admin-supplied status; blank and unknown values are validation errors.
pub fn parse_order_status(raw: &str) -> Result<OrderStatus, ServiceError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::ValidationError(
            "status is required".to_string(),
        ));
    }
    OrderStatus::from_str(trimmed).map_err(|_| {
        ServiceError::ValidationError(format!("invalid order status: {}", trimmed))
    })
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    fn newest_first(user_id: Option<i32>) -> Select<Order> {
        let mut query = Order::find();
        if let Some(user_id) = user_id {
            query = query.filter(order::Column::UserId.eq(user_id));
        }
        query
            .order_by_desc(order::Column::CreatedAt)
            .order_by_desc(order::Column::Id)
    }

    /// All orders, optionally for one user, newest first.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, user_id: Option<i32>) -> Result<Vec<OrderView>, ServiceError> {
        let db = &*self.db;
        let orders = Self::newest_first(user_id).all(db).await?;
        build_order_views(db, orders).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders_paginated(
        &self,
        user_id: Option<i32>,
        page: u64,
        per_page: u64,
    ) -> Result<OrderPage, ServiceError> {
        let db = &*self.db;
        let page = page.max(1);
        let per_page = per_page.max(1);

        let paginator = Self::newest_first(user_id).paginate(db, per_page);
        let total = paginator.num_items().await?;
        let orders = if page_in_range(page, per_page, total) {
            paginator.fetch_page(page - 1).await?
        } else {
            Vec::new()
        };

        Ok(OrderPage {
            orders: build_order_views(db, orders).await?,
            total,
            page,
            per_page,
        })
    }

    pub async fn orders_by_user(&self, user_id: i32) -> Result<Vec<OrderView>, ServiceError> {
        self.list_orders(Some(user_id)).await
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: i32) -> Result<OrderView, ServiceError> {
        let db = &*self.db;
        let order = Order::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;

        build_order_views(db, vec![order])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("Order", order_id))
    }

    /// Overwrites the order status. Any known status may follow any other.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: i32,
        raw_status: &str,
    ) -> Result<order::Model, ServiceError> {
        let new_status = parse_order_status(raw_status)?;
        let db = &*self.db;

        let existing = Order::find_by_id(order_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", order_id))?;
        let old_status = existing.status;

        let mut active: order::ActiveModel = existing.into();
        active.status = Set(new_status);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;

        self.event_sender
            .send_or_log(Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            });

        info!(order_id, from = %old_status, to = %new_status, "Order status updated");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_with_whitespace_and_case() {
        assert_eq!(parse_order_status(" Shipped ").unwrap(), OrderStatus::Shipped);
    }

    #[test]
    fn blank_status_is_rejected() {
        assert!(matches!(
            parse_order_status("   "),
            Err(ServiceError::ValidationError(_))
        ));
    }

    #[test]
    fn unknown_status_is_rejected() {
        let err = parse_order_status("lost").unwrap_err();
        assert!(err.to_string().contains("invalid order status"));
    }
}
