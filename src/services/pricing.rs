//! Cart arithmetic. Everything here is pure so the sale orchestrator can
//! price a cart before any write happens.

use crate::entities::PaymentStatus;
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;
use validator::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub paid_amount: Decimal,
    pub change: Decimal,
    pub payment_status: PaymentStatus,
}

/// Field validator for prices and costs.
pub fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("must_not_be_negative"));
    }
    Ok(())
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// `paid` when the payment covers the total, `partial` when something was
/// paid, `unpaid` otherwise.
pub fn payment_status(paid_amount: Decimal, total: Decimal) -> PaymentStatus {
    if paid_amount >= total {
        PaymentStatus::Paid
    } else if paid_amount > Decimal::ZERO {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

pub fn change_due(paid_amount: Decimal, total: Decimal) -> Decimal {
    (paid_amount - total).max(Decimal::ZERO)
}

/// `total = subtotal - discount + tax`.
pub fn compute_totals<I>(
    line_totals: I,
    discount: Decimal,
    tax: Decimal,
    paid_amount: Decimal,
) -> Totals
where
    I: IntoIterator<Item = Decimal>,
{
    let subtotal: Decimal = line_totals.into_iter().sum();
    let total = subtotal - discount + tax;
    Totals {
        subtotal,
        discount,
        tax,
        total,
        paid_amount,
        change: change_due(paid_amount, total),
        payment_status: payment_status(paid_amount, total),
    }
}
