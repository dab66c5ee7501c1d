use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::ValidationError;

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 10_000;

/// Largest amount a `DECIMAL(10, 2)` money column can store.
pub const MAX_AMOUNT: Decimal = dec!(99_999_999.99);

/// `active` rows form the cart; `ordered` rows were consumed by a checkout.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum CartItemStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "ordered")]
    Ordered,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    /// Product price captured when the item was first added
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub total_price: Decimal,
    pub status: CartItemStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Line total for a snapshot price; the single place cart and order totals are derived.
pub fn line_total(price: Decimal, quantity: i32) -> Decimal {
    price * Decimal::from(quantity)
}

pub fn validate_line_quantity(quantity: i32) -> Result<(), ValidationError> {
    let message = if quantity < 1 {
        "quantity must be at least 1"
    } else if quantity > MAX_LINE_QUANTITY {
        "quantity must be at most 10000"
    } else {
        return Ok(());
    };
    let mut err = ValidationError::new("quantity");
    err.message = Some(message.into());
    Err(err)
}
