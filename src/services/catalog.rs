use crate::{
    entities::product::{self, Entity as Product, ProductStatus},
    entities::product_image::{self, Entity as ProductImage, ImageStatus},
    errors::ServiceError,
    events::{Event, EventSender},
    services::page_in_range,
};
use chrono::{DateTime, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::{Alias, Expr, Func, LikeExpr, SimpleExpr},
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

/// Sort key for product listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    Price,
    #[default]
    CreatedAt,
}

impl ProductSort {
    /// Unknown or missing keys fall back to `created_at`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("price") => ProductSort::Price,
            _ => ProductSort::CreatedAt,
        }
    }
}

/// Sort direction for product listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_uppercase()).as_deref() {
            Some("ASC") => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }
}

/// Criteria for listing products
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub product_type: Option<String>,
    /// Case-insensitive prefix of the item name
    pub item: Option<String>,
    pub brand: Option<String>,
    pub max_price: Option<Decimal>,
    pub user_id: Option<i32>,
    pub include_inactive: bool,
    pub sort: ProductSort,
    pub direction: SortDirection,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductView {
    pub id: i32,
    pub user_id: i32,
    /// Product heading
    pub name: String,
    pub sub_heading: Option<String>,
    /// Product details
    pub description: Option<String>,
    pub price: Decimal,
    pub mrp: Decimal,
    /// Whole percent off the list price
    pub discount: u32,
    pub product_type: String,
    pub brand: String,
    pub item: String,
    pub stock_quantity: i32,
    pub status: ProductStatus,
    pub specification: Option<serde_json::Value>,
    pub images: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl ProductView {
    fn from_model(model: product::Model, images: Vec<String>) -> Self {
        Self {
            discount: discount_percent(model.price, model.mrp),
            id: model.id,
            user_id: model.user_id,
            name: model.heading,
            sub_heading: model.sub_heading,
            description: model.details,
            price: model.price,
            mrp: model.mrp,
            product_type: model.product_type,
            brand: model.brand,
            item: model.item,
            stock_quantity: model.stock_quantity,
            status: model.status,
            specification: model.specification,
            images,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProductPage {
    pub products: Vec<ProductView>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Input for creating a product with its images
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProductInput {
    #[serde(alias = "userId")]
    #[validate(range(min = 1, message = "userId is required"))]
    pub user_id: i32,
    #[validate(length(min = 1, message = "heading is required"))]
    pub heading: String,
    pub sub_heading: Option<String>,
    pub details: Option<String>,
    #[validate(custom = "validate_money")]
    pub price: Decimal,
    #[validate(custom = "validate_money")]
    pub mrp: Decimal,
    pub specification: Option<serde_json::Value>,
    #[validate(length(min = 1, message = "product_type is required"))]
    pub product_type: String,
    #[validate(length(min = 1, message = "brand is required"))]
    pub brand: String,
    #[validate(length(min = 1, message = "item is required"))]
    pub item: String,
    #[validate(range(min = 0, message = "stock_quantity must not be negative"))]
    pub stock_quantity: Option<i32>,
    /// Image URLs; the first one becomes the primary image
    #[serde(default)]
    pub images: Vec<String>,
}

/// Partial product update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductInput {
    #[serde(alias = "productId")]
    #[validate(range(min = 1, message = "productId is required"))]
    pub product_id: i32,
    #[validate(length(min = 1))]
    pub heading: Option<String>,
    pub sub_heading: Option<String>,
    pub details: Option<String>,
    #[validate(custom = "validate_money")]
    pub price: Option<Decimal>,
    #[validate(custom = "validate_money")]
    pub mrp: Option<Decimal>,
    pub specification: Option<serde_json::Value>,
    pub product_type: Option<String>,
    pub brand: Option<String>,
    pub item: Option<String>,
    #[validate(range(min = 0, message = "stock_quantity must not be negative"))]
    pub stock_quantity: Option<i32>,
    pub status: Option<ProductStatus>,
    /// When non-empty, replaces every existing image
    pub images: Option<Vec<String>>,
}

fn validate_money(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("money");
        err.message = Some("amount must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// Percentage off `mrp`, rounded half away from zero; zero when there is no markdown.
pub fn discount_percent(price: Decimal, mrp: Decimal) -> u32 {
    if mrp <= Decimal::ZERO || mrp <= price {
        return 0;
    }
    ((mrp - price) / mrp * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u32()
        .unwrap_or(0)
}

/// Strips surrounding whitespace and quote characters from a filter value.
fn clean_filter_value(raw: &str) -> Option<String> {
    let cleaned = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

const LIKE_ESCAPE: char = '\\';

/// Escapes `LIKE` wildcards so user input only matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_') || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

fn trimmed(column: product::Column) -> SimpleExpr {
    Func::cust(Alias::new("TRIM")).arg(Expr::col(column)).into()
}

fn lower_trimmed(column: product::Column) -> SimpleExpr {
    Func::lower(trimmed(column)).into()
}

fn apply_filter(mut query: Select<Product>, filter: &ProductFilter) -> Select<Product> {
    if !filter.include_inactive {
        query = query.filter(product::Column::Status.eq(ProductStatus::Active));
    }
    if let Some(product_type) = filter.product_type.as_deref().and_then(clean_filter_value) {
        query = query.filter(Expr::expr(trimmed(product::Column::ProductType)).eq(product_type));
    }
    if let Some(item) = filter.item.as_deref().and_then(clean_filter_value) {
        query = query.filter(
            Expr::expr(lower_trimmed(product::Column::Item)).like(
                LikeExpr::new(format!("{}%", escape_like(&item.to_lowercase())))
                    .escape(LIKE_ESCAPE),
            ),
        );
    }
    if let Some(brand) = filter.brand.as_deref().and_then(clean_filter_value) {
        query = query
            .filter(Expr::expr(lower_trimmed(product::Column::Brand)).eq(brand.to_lowercase()));
    }
    if let Some(user_id) = filter.user_id {
        query = query.filter(product::Column::UserId.eq(user_id));
    }
    query = query.filter(product::Column::Price.gte(Decimal::ZERO));
    if let Some(max_price) = filter.max_price {
        query = query.filter(product::Column::Price.lte(max_price));
    }

    let column = match filter.sort {
        ProductSort::Price => product::Column::Price,
        ProductSort::CreatedAt => product::Column::CreatedAt,
    };
    match filter.direction {
        SortDirection::Asc => query
            .order_by_asc(column)
            .order_by_asc(product::Column::Id),
        SortDirection::Desc => query
            .order_by_desc(column)
            .order_by_desc(product::Column::Id),
    }
}

/// Active image URLs per product: primary first, then display order, then id.
pub async fn load_image_urls<C: ConnectionTrait>(
    conn: &C,
    product_ids: &[i32],
) -> Result<HashMap<i32, Vec<String>>, ServiceError> {
    let mut by_product: HashMap<i32, Vec<String>> = HashMap::new();
    if product_ids.is_empty() {
        return Ok(by_product);
    }

    let images = ProductImage::find()
        .filter(product_image::Column::ProductId.is_in(product_ids.to_vec()))
        .filter(product_image::Column::Status.eq(ImageStatus::Active))
        .order_by_desc(product_image::Column::IsPrimary)
        .order_by_asc(product_image::Column::DisplayOrder)
        .order_by_asc(product_image::Column::Id)
        .all(conn)
        .await?;

    for image in images {
        by_product
            .entry(image.product_id)
            .or_default()
            .push(image.image_url);
    }
    Ok(by_product)
}

async fn insert_images<C: ConnectionTrait>(
    conn: &C,
    product_id: i32,
    urls: &[String],
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let models: Vec<product_image::ActiveModel> = urls
        .iter()
        .enumerate()
        .map(|(index, url)| product_image::ActiveModel {
            product_id: Set(product_id),
            image_url: Set(url.clone()),
            is_primary: Set(index == 0),
            display_order: Set(index as i32),
            status: Set(ImageStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        })
        .collect();

    if !models.is_empty() {
        ProductImage::insert_many(models).exec(conn).await?;
    }
    Ok(())
}

/// Product catalog reads plus the admin write paths
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: ProductFilter) -> Result<ProductPage, ServiceError> {
        let db = &*self.db;
        let page = filter.page.max(1);
        let per_page = filter.per_page.max(1);

        let paginator = apply_filter(Product::find(), &filter).paginate(db, per_page);
        let total = paginator.num_items().await?;
        let models = if page_in_range(page, per_page, total) {
            paginator.fetch_page(page - 1).await?
        } else {
            Vec::new()
        };

        let ids: Vec<i32> = models.iter().map(|p| p.id).collect();
        let mut images = load_image_urls(db, &ids).await?;

        let products = models
            .into_iter()
            .map(|model| {
                let urls = images.remove(&model.id).unwrap_or_default();
                ProductView::from_model(model, urls)
            })
            .collect();

        Ok(ProductPage {
            products,
            total,
            page,
            per_page,
        })
    }

    /// Storefront lookup; inactive products are reported as missing.
    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: i32) -> Result<ProductView, ServiceError> {
        self.find_product(product_id, false).await
    }

    /// Admin lookup, including inactive products.
    #[instrument(skip(self))]
    pub async fn get_product_admin(&self, product_id: i32) -> Result<ProductView, ServiceError> {
        self.find_product(product_id, true).await
    }

    async fn find_product(
        &self,
        product_id: i32,
        include_inactive: bool,
    ) -> Result<ProductView, ServiceError> {
        let db = &*self.db;
        let model = Product::find_by_id(product_id)
            .one(db)
            .await?
            .filter(|p| include_inactive || p.is_active())
            .ok_or_else(|| ServiceError::not_found("Product", product_id))?;

        let mut images = load_image_urls(db, &[model.id]).await?;
        let urls = images.remove(&model.id).unwrap_or_default();
        Ok(ProductView::from_model(model, urls))
    }

    #[instrument(skip(self, input), fields(user_id = input.user_id))]
    pub async fn create_product(&self, input: CreateProductInput) -> Result<i32, ServiceError> {
        input.validate()?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let created = product::ActiveModel {
            user_id: Set(input.user_id),
            heading: Set(input.heading.trim().to_string()),
            sub_heading: Set(input.sub_heading),
            details: Set(input.details),
            price: Set(input.price),
            mrp: Set(input.mrp),
            specification: Set(input.specification),
            product_type: Set(input.product_type.trim().to_string()),
            brand: Set(input.brand.trim().to_string()),
            item: Set(input.item.trim().to_string()),
            stock_quantity: Set(input.stock_quantity.unwrap_or(0)),
            status: Set(ProductStatus::Active),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        insert_images(&txn, created.id, &input.images).await?;

        txn.commit().await?;

        self.event_sender.send_or_log(Event::ProductCreated(created.id));

        info!(product_id = created.id, images = input.images.len(), "Created product");
        Ok(created.id)
    }

    #[instrument(skip(self, input), fields(product_id = input.product_id))]
    pub async fn update_product(
        &self,
        input: UpdateProductInput,
    ) -> Result<ProductView, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;

        let existing = Product::find_by_id(input.product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", input.product_id))?;

        let mut active: product::ActiveModel = existing.into();
        if let Some(heading) = input.heading {
            active.heading = Set(heading.trim().to_string());
        }
        if let Some(sub_heading) = input.sub_heading {
            active.sub_heading = Set(Some(sub_heading));
        }
        if let Some(details) = input.details {
            active.details = Set(Some(details));
        }
        if let Some(price) = input.price {
            active.price = Set(price);
        }
        if let Some(mrp) = input.mrp {
            active.mrp = Set(mrp);
        }
        if let Some(specification) = input.specification {
            active.specification = Set(Some(specification));
        }
        if let Some(product_type) = input.product_type {
            active.product_type = Set(product_type.trim().to_string());
        }
        if let Some(brand) = input.brand {
            active.brand = Set(brand.trim().to_string());
        }
        if let Some(item) = input.item {
            active.item = Set(item.trim().to_string());
        }
        if let Some(stock_quantity) = input.stock_quantity {
            active.stock_quantity = Set(stock_quantity);
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        active.updated_at = Set(Utc::now());
        let updated = active.update(&txn).await?;

        if let Some(images) = input.images.filter(|urls| !urls.is_empty()) {
            ProductImage::delete_many()
                .filter(product_image::Column::ProductId.eq(updated.id))
                .exec(&txn)
                .await?;
            insert_images(&txn, updated.id, &images).await?;
        }

        let mut images = load_image_urls(&txn, &[updated.id]).await?;
        txn.commit().await?;

        self.event_sender.send_or_log(Event::ProductUpdated(updated.id));

        info!(product_id = updated.id, "Updated product");
        let urls = images.remove(&updated.id).unwrap_or_default();
        Ok(ProductView::from_model(updated, urls))
    }

    /// Soft delete: flips the product to inactive.
    #[instrument(skip(self))]
    pub async fn deactivate_product(&self, product_id: i32) -> Result<(), ServiceError> {
        let db = &*self.db;
        let existing = Product::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::not_found("Product", product_id))?;

        let mut active: product::ActiveModel = existing.into();
        active.status = Set(ProductStatus::Inactive);
        active.updated_at = Set(Utc::now());
        active.update(db).await?;

        self.event_sender.send_or_log(Event::ProductDeactivated(product_id));

        info!(product_id, "Deactivated product");
        Ok(())
    }
}
