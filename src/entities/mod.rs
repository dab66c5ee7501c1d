pub mod cancel_order;
pub mod cart_item;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_image;
