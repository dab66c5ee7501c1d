//! Business logic for the storefront. Handlers stay thin and delegate here.

pub mod cancellations;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod orders;

pub use cancellations::CancellationService;
pub use cart::CartService;
pub use catalog::CatalogService;
pub use checkout::CheckoutService;
pub use orders::OrderService;

/// Whether a 1-based page starts inside a result set of `total` rows.
/// Pages past the end, including ones whose offset does not fit in `u64`,
/// are served as empty without querying.
pub(crate) fn page_in_range(page: u64, per_page: u64, total: u64) -> bool {
    matches!(page.saturating_sub(1).checked_mul(per_page), Some(offset) if offset < total)
}
