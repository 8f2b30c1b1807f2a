//! Amounts are Jordanian dinars, which split into 1000 fils. The database
//! stores money as `NUMERIC(14, 3)`; anything finer or larger would be
//! rounded or refused by Postgres after the ledger had already used it.

use rust_decimal::Decimal;

/// Fils per dinar, as decimal places.
pub const SCALE: u32 = 3;

/// Whole-dinar digits a `NUMERIC(14, 3)` column holds.
const INTEGER_DIGITS: u32 = 11;

fn limit() -> Decimal {
    Decimal::from(10_i64.pow(INTEGER_DIGITS))
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
    #[error("{field} has more than 3 decimal places: {value}")]
    TooPrecise { field: &'static str, value: Decimal },
    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: Decimal },
}

/// Accepts an amount the store can keep exactly.
pub fn check_amount(field: &'static str, value: Decimal) -> Result<(), AmountError> {
    if value.normalize().scale() > SCALE {
        return Err(AmountError::TooPrecise { field, value });
    }
    if value.abs() >= limit() {
        return Err(AmountError::OutOfRange { field, value });
    }

    Ok(())
}
