use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize, sqlx::FromRow)]
pub struct Driver {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub balance: Decimal,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub balance: Decimal,
    pub photo_url: Option<String>,
}

/// Admin edit of a driver. Absent fields are left untouched.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DriverUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub balance: Option<Decimal>,
    pub photo_url: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceFilter {
    #[default]
    All,
    Positive,
    Zero,
    Negative,
}

impl BalanceFilter {
    pub fn matches(&self, balance: Decimal) -> bool {
        match self {
            BalanceFilter::All => true,
            BalanceFilter::Positive => balance > Decimal::ZERO,
            BalanceFilter::Zero => balance.is_zero(),
            BalanceFilter::Negative => balance < Decimal::ZERO,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DriverFilter {
    pub search: Option<String>,
    #[serde(default)]
    pub balance: BalanceFilter,
}

impl DriverFilter {
    pub fn matches(&self, driver: &Driver) -> bool {
        let matches_search = match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => {
                let term = term.to_lowercase();
                driver.name.to_lowercase().contains(&term)
                    || driver.phone.to_lowercase().contains(&term)
            }
        };

        matches_search && self.balance.matches(driver.balance)
    }
}

/// Outcome of removing a driver, which only happens when no trip refers to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverDeletion {
    Deleted,
    NotFound,
    HasTrips,
}

/// What a driver sees after identifying themselves by phone.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DriverSummary {
    pub id: String,
    pub name: String,
    pub balance: Decimal,
    pub trip_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn driver(name: &str, phone: &str, balance: Decimal) -> Driver {
        Driver {
            id: name.to_lowercase(),
            name: name.to_string(),
            phone: phone.to_string(),
            balance,
            photo_url: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn search_matches_name_or_phone_ignoring_case() {
        let filter = DriverFilter {
            search: Some("AHMAD".to_string()),
            balance: BalanceFilter::All,
        };
        assert!(filter.matches(&driver("Ahmad", "+962791234567", dec!(10))));
        assert!(!filter.matches(&driver("Omar", "+962791234568", dec!(10))));

        let filter = DriverFilter {
            search: Some("4568".to_string()),
            balance: BalanceFilter::All,
        };
        assert!(filter.matches(&driver("Omar", "+962791234568", dec!(10))));
    }

    #[test]
    fn balance_filter_splits_on_sign() {
        assert!(BalanceFilter::Positive.matches(dec!(0.01)));
        assert!(!BalanceFilter::Positive.matches(dec!(0)));
        assert!(BalanceFilter::Zero.matches(dec!(0.00)));
        assert!(BalanceFilter::Negative.matches(dec!(-3)));
        assert!(!BalanceFilter::Negative.matches(dec!(0)));
        assert!(BalanceFilter::All.matches(dec!(-3)));
    }

    #[test]
    fn blank_search_matches_everything() {
        let filter = DriverFilter {
            search: Some("   ".to_string()),
            balance: BalanceFilter::Negative,
        };
        assert!(filter.matches(&driver("Omar", "+962791234568", dec!(-1))));
        assert!(!filter.matches(&driver("Omar", "+962791234568", dec!(1))));
    }
}
