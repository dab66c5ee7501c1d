pub mod admin;
pub mod cancel_orders;
pub mod cart;
pub mod common;
pub mod orders;
pub mod products;

use crate::{
    config::AppConfig,
    db::DbPool,
    events::EventSender,
    services::{CancellationService, CartService, CatalogService, CheckoutService, OrderService},
};
use std::sync::Arc;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub cancellations: Arc<CancellationService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self {
            catalog: Arc::new(CatalogService::new(db_pool.clone(), event_sender.clone())),
            cart: Arc::new(CartService::new(db_pool.clone(), event_sender.clone())),
            checkout: Arc::new(CheckoutService::new(db_pool.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(db_pool.clone(), event_sender.clone())),
            cancellations: Arc::new(CancellationService::new(
                db_pool,
                event_sender,
                config.restock_on_cancel,
            )),
        }
    }
}
