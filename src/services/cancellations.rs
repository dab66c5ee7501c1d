use crate::{
    entities::cancel_order::{self, CancelStatus, Entity as CancelOrder},
    entities::order::{self, Entity as Order, OrderStatus},
    entities::order_item::{self, Entity as OrderItem},
    entities::product::{self, Entity as Product},
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::{build_order_views, OrderView},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CancelOrderInput {
    #[serde(default, alias = "orderId")]
    #[validate(range(min = 1, message = "orderId is required"))]
    pub order_id: i32,
    #[serde(default, alias = "userId")]
    #[validate(range(min = 1, message = "userId is required"))]
    pub user_id: i32,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UpdateCancelOrderInput {
    pub status: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CancelOrderFilter {
    pub user_id: Option<i32>,
    pub order_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CancelOrderView {
    pub id: i32,
    pub order_id: i32,
    pub user_id: i32,
    pub reason: Option<String>,
    pub status: CancelStatus,
    pub cancelled_at: DateTime<Utc>,
    pub order: Option<OrderView>,
}

impl CancelOrderView {
    fn new(model: cancel_order::Model, order: Option<OrderView>) -> Self {
        Self {
            id: model.id,
            order_id: model.order_id,
            user_id: model.user_id,
            reason: model.reason,
            status: model.status,
            cancelled_at: model.cancelled_at,
            order,
        }
    }
}

/// Order cancellation records and the cancel-order workflow
#[derive(Clone)]
pub struct CancellationService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    restock_on_cancel: bool,
}

impl CancellationService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        restock_on_cancel: bool,
    ) -> Self {
        Self {
            db,
            event_sender,
            restock_on_cancel,
        }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, filter: CancelOrderFilter) -> Result<Vec<CancelOrderView>, ServiceError> {
        let db = &*self.db;
        let mut query = CancelOrder::find();
        if let Some(user_id) = filter.user_id {
            query = query.filter(cancel_order::Column::UserId.eq(user_id));
        }
        if let Some(order_id) = filter.order_id {
            query = query.filter(cancel_order::Column::OrderId.eq(order_id));
        }
        let rows = query
            .order_by_desc(cancel_order::Column::CancelledAt)
            .order_by_desc(cancel_order::Column::Id)
            .all(db)
            .await?;

        let mut order_ids: Vec<i32> = rows.iter().map(|r| r.order_id).collect();
        order_ids.sort_unstable();
        order_ids.dedup();

        let orders = if order_ids.is_empty() {
            Vec::new()
        } else {
            Order::find()
                .filter(order::Column::Id.is_in(order_ids))
                .all(db)
                .await?
        };
        let views: HashMap<i32, OrderView> = build_order_views(db, orders)
            .await?
            .into_iter()
            .map(|v| (v.id, v))
            .collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let order = views.get(&row.order_id).cloned();
                CancelOrderView::new(row, order)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<CancelOrderView, ServiceError> {
        let db = &*self.db;
        let record = CancelOrder::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Cancel order", id))?;

        let order = match Order::find_by_id(record.order_id).one(db).await? {
            Some(order) => build_order_views(db, vec![order]).await?.pop(),
            None => None,
        };
        Ok(CancelOrderView::new(record, order))
    }

    /// Records a cancellation and marks the order cancelled in one transaction.
    #[instrument(skip(self, input), fields(order_id = input.order_id, user_id = input.user_id))]
    pub async fn request_cancellation(
        &self,
        input: CancelOrderInput,
    ) -> Result<cancel_order::Model, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let order = Order::find_by_id(input.order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Order", input.order_id))?;

        let now = Utc::now();
        mark_cancelled(&txn, order.id, now).await?;

        let record = cancel_order::ActiveModel {
            order_id: Set(order.id),
            user_id: Set(input.user_id),
            reason: Set(input.reason),
            status: Set(CancelStatus::Cancelled),
            cancelled_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        if self.restock_on_cancel {
            restock(&txn, order.id).await?;
        }

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled {
                order_id: order.id,
                cancel_order_id: record.id,
                restocked: self.restock_on_cancel,
            });

        info!(cancel_order_id = record.id, restocked = self.restock_on_cancel, "Order cancelled");
        Ok(record)
    }

    /// Amends the status or reason of a cancellation record.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i32,
        input: UpdateCancelOrderInput,
    ) -> Result<cancel_order::Model, ServiceError> {
        let status = match input.status.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(CancelStatus::from_str(raw).map_err(|_| {
                ServiceError::ValidationError(format!("invalid cancellation status: {}", raw))
            })?),
            _ => None,
        };

        let db = &*self.db;
        let existing = CancelOrder::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Cancel order", id))?;

        let mut active: cancel_order::ActiveModel = existing.into();
        if let Some(status) = status {
            active.status = Set(status);
        }
        if let Some(reason) = input.reason {
            active.reason = Set(Some(reason));
        }
        let updated = active.update(db).await?;

        info!(cancel_order_id = id, status = %updated.status, "Cancel order updated");
        Ok(updated)
    }

    /// Deletes a cancellation record. The order keeps its current status.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let result = CancelOrder::delete_by_id(id).exec(&*self.db).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Cancel order", id));
        }
        info!(cancel_order_id = id, "Cancel order deleted");
        Ok(())
    }
}

/// Flips the order to cancelled unless it already is. The status guard sits in
/// the `UPDATE` itself, so of two racing cancellations only one claims the order.
async fn mark_cancelled(
    txn: &DatabaseTransaction,
    order_id: i32,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let claimed = Order::update_many()
        .col_expr(order::Column::Status, Expr::value(OrderStatus::Cancelled))
        .col_expr(order::Column::UpdatedAt, Expr::value(now))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Status.ne(OrderStatus::Cancelled))
        .exec(txn)
        .await?;

    if claimed.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Order {} is already cancelled",
            order_id
        )));
    }
    Ok(())
}

// Products deleted since checkout are skipped.
async fn restock(txn: &DatabaseTransaction, order_id: i32) -> Result<(), ServiceError> {
    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .all(txn)
        .await?;

    let now = Utc::now();
    for item in items {
        Product::update_many()
            .col_expr(
                product::Column::StockQuantity,
                Expr::col(product::Column::StockQuantity).add(item.quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(now))
            .filter(product::Column::Id.eq(item.product_id))
            .exec(txn)
            .await?;
    }
    Ok(())
}
