//! Inventory ledger: the only code allowed to change on-hand stock.
//!
//! Both operations run inside the caller's unit of work so that a failure
//! anywhere in the surrounding order operation undoes every stock change.

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::store::UnitOfWork;

/// Takes `quantity` units of a product out of stock and returns the unit
/// price to snapshot into the order line.
///
/// The product row stays locked until the unit of work ends, so concurrent
/// reservations of the same product serialize on the check-and-decrement.
pub async fn reserve(uow: &mut dyn UnitOfWork, product_id: i64, quantity: i32) -> AppResult<Decimal> {
    let product = uow
        .lock_product(product_id)
        .await?
        .ok_or_else(|| AppError::not_found("product", product_id))?;

    if !product.active {
        return Err(AppError::ProductInactive {
            product_id,
            product: product.name,
        });
    }

    if quantity > product.quantity {
        return Err(AppError::InsufficientStock {
            product_id,
            product: product.name,
            requested: quantity,
            available: product.quantity,
        });
    }

    let remaining = product.quantity - quantity;
    uow.set_product_quantity(product_id, remaining).await?;
    debug!(product_id, quantity, remaining, "Stock reserved");

    Ok(product.price)
}

/// Puts `quantity` units back into stock. No upper bound is enforced.
pub async fn release(uow: &mut dyn UnitOfWork, product_id: i64, quantity: i32) -> AppResult<()> {
    let product = uow
        .lock_product(product_id)
        .await?
        .ok_or_else(|| AppError::not_found("product", product_id))?;

    let restored = product
        .quantity
        .checked_add(quantity)
        .ok_or_else(|| AppError::Internal(format!("stock overflow for product {product_id}")))?;
    uow.set_product_quantity(product_id, restored).await?;
    debug!(product_id, quantity, restored, "Stock released");

    Ok(())
}
