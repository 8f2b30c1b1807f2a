//! Driver balance bookkeeping for trip mutations.
//!
//! A driver's stored balance must equal their starting balance minus the
//! deductions of every trip currently attributed to them. Trips and drivers
//! live in separate rows and the store offers no transaction spanning both,
//! so every mutation here is a primary trip write followed by one or two
//! atomic balance increments. If an increment fails after the trip write
//! went through, the trip write stays and the caller gets
//! [`LedgerError::BalanceNotApplied`] listing the deltas still owed.

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::trips::{Trip, TripInput, TripRecord, TripRevision};
use crate::repositories::{DriverStore, TripStore};
use crate::utils::money::check_amount;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceDelta {
    pub driver_id: String,
    pub delta: Decimal,
}

impl BalanceDelta {
    fn new(driver_id: &str, delta: Decimal) -> Self {
        BalanceDelta {
            driver_id: driver_id.to_string(),
            delta,
        }
    }
}

impl fmt::Display for BalanceDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.delta.is_sign_negative() {
            write!(f, "{}:{}", self.driver_id, self.delta)
        } else {
            write!(f, "{}:+{}", self.driver_id, self.delta)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Driver not found: {0}")]
    DriverNotFound(String),
    #[error("Trip not found: {0}")]
    TripNotFound(String),
    #[error("Store error: {0}")]
    Store(String),
    #[error("Trip {trip_id} was written but balances were not adjusted ({}): {reason}", join(.pending))]
    BalanceNotApplied {
        trip_id: String,
        pending: Vec<BalanceDelta>,
        reason: String,
    },
}

fn join(deltas: &[BalanceDelta]) -> String {
    deltas
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Clone)]
pub struct Ledger {
    drivers: Arc<dyn DriverStore>,
    trips: Arc<dyn TripStore>,
}

impl Ledger {
    pub fn new(drivers: Arc<dyn DriverStore>, trips: Arc<dyn TripStore>) -> Self {
        Ledger { drivers, trips }
    }

    /// Inserts the trip, then charges its deduction to the driver.
    pub async fn record_trip(&self, input: TripInput) -> Result<Trip, LedgerError> {
        validate(&input)?;
        let record = self.trip_record(input).await?;

        log::info!(
            target: "ledger",
            "intent create driver={} deduction={}",
            record.driver_id,
            record.deduction
        );

        let trip = self
            .trips
            .insert_trip(&record)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?;
        let deltas = non_zero(vec![BalanceDelta::new(&trip.driver_id, -trip.deduction)]);

        self.settle("create", &trip.id, deltas).await?;

        Ok(trip)
    }

    /// Rewrites the trip, then moves the balance difference. When the trip
    /// changes hands the old driver gets the old deduction back and the new
    /// driver is charged the new one. The old values are the ones the store
    /// replaced, so concurrent revisions of one trip settle in write order.
    pub async fn revise_trip(&self, id: &str, input: TripInput) -> Result<Trip, LedgerError> {
        validate(&input)?;
        let record = self.trip_record(input).await?;

        log::info!(
            target: "ledger",
            "intent update trip={} driver={} deduction={}",
            id,
            record.driver_id,
            record.deduction
        );

        let TripRevision { before, after } = self
            .trips
            .update_trip(id, &record)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?
            .ok_or_else(|| LedgerError::TripNotFound(id.to_string()))?;

        let deltas = if before.driver_id == after.driver_id {
            vec![BalanceDelta::new(
                &after.driver_id,
                before.deduction - after.deduction,
            )]
        } else {
            vec![
                BalanceDelta::new(&before.driver_id, before.deduction),
                BalanceDelta::new(&after.driver_id, -after.deduction),
            ]
        };

        self.settle("update", &after.id, non_zero(deltas)).await?;

        Ok(after)
    }

    /// Deletes the trip, then returns its deduction to the owning driver.
    pub async fn remove_trip(&self, id: &str) -> Result<Trip, LedgerError> {
        log::info!(target: "ledger", "intent delete trip={}", id);

        let trip = self
            .trips
            .delete_trip(id)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?
            .ok_or_else(|| LedgerError::TripNotFound(id.to_string()))?;
        let deltas = non_zero(vec![BalanceDelta::new(&trip.driver_id, trip.deduction)]);

        self.settle("delete", &trip.id, deltas).await?;

        Ok(trip)
    }

    async fn trip_record(&self, input: TripInput) -> Result<TripRecord, LedgerError> {
        let driver = self
            .drivers
            .get_driver(&input.driver_id)
            .await
            .map_err(|e| LedgerError::Store(e.to_string()))?
            .ok_or_else(|| LedgerError::DriverNotFound(input.driver_id.clone()))?;

        Ok(TripRecord::new(input, driver.name))
    }

    /// Applies the deltas owed by a trip write that already went through.
    async fn settle(
        &self,
        operation: &str,
        trip_id: &str,
        deltas: Vec<BalanceDelta>,
    ) -> Result<(), LedgerError> {
        log::info!(
            target: "ledger",
            "written {} trip={} deltas=[{}]",
            operation,
            trip_id,
            join(&deltas)
        );

        for (applied, delta) in deltas.iter().enumerate() {
            if let Err(e) = self
                .drivers
                .increment_driver_balance(&delta.driver_id, delta.delta)
                .await
            {
                let pending = deltas[applied..].to_vec();
                log::error!(
                    target: "ledger",
                    "balance not applied trip={} pending=[{}]: {}",
                    trip_id,
                    join(&pending),
                    e
                );

                return Err(LedgerError::BalanceNotApplied {
                    trip_id: trip_id.to_string(),
                    pending,
                    reason: e.to_string(),
                });
            }
        }

        log::info!(target: "ledger", "applied {} trip={}", operation, trip_id);

        Ok(())
    }
}

fn validate(input: &TripInput) -> Result<(), LedgerError> {
    if input.driver_id.trim().is_empty() {
        return Err(LedgerError::Validation("driver_id is required".to_string()));
    }
    if input.trip_type.is_empty() {
        return Err(LedgerError::Validation("trip_type is required".to_string()));
    }
    for (field, amount) in [
        ("fare", input.fare),
        ("commission", input.commission),
        ("deduction", input.deduction),
    ] {
        check_amount(field, amount).map_err(|e| LedgerError::Validation(e.to_string()))?;
    }

    Ok(())
}

fn non_zero(deltas: Vec<BalanceDelta>) -> Vec<BalanceDelta> {
    deltas
        .into_iter()
        .filter(|delta| !delta.delta.is_zero())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::drivers::{Driver, DriverDeletion, DriverUpdate, NewDriver};
    use crate::models::trips::TripType;
    use crate::repositories::memory::MemoryStore;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Barrier;

    use anyhow::bail;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    /// Lets the first `allowed` balance increments through, then fails.
    struct FlakyBalances {
        inner: MemoryStore,
        allowed: AtomicUsize,
    }

    #[async_trait]
    impl DriverStore for FlakyBalances {
        async fn insert_driver(&self, driver: &NewDriver) -> Result<Driver, anyhow::Error> {
            self.inner.insert_driver(driver).await
        }

        async fn get_driver(&self, id: &str) -> Result<Option<Driver>, anyhow::Error> {
            self.inner.get_driver(id).await
        }

        async fn list_drivers(&self) -> Result<Vec<Driver>, anyhow::Error> {
            self.inner.list_drivers().await
        }

        async fn update_driver(
            &self,
            id: &str,
            update: &DriverUpdate,
        ) -> Result<Option<Driver>, anyhow::Error> {
            self.inner.update_driver(id, update).await
        }

        async fn delete_driver(&self, id: &str) -> Result<DriverDeletion, anyhow::Error> {
            self.inner.delete_driver(id).await
        }

        async fn increment_driver_balance(
            &self,
            id: &str,
            delta: Decimal,
        ) -> Result<(), anyhow::Error> {
            let remaining = self.allowed.load(Ordering::SeqCst);
            if remaining == 0 {
                bail!("connection reset")
            }
            self.allowed.store(remaining - 1, Ordering::SeqCst);
            self.inner.increment_driver_balance(id, delta).await
        }

        async fn lookup_driver_by_phone(
            &self,
            candidates: &[String],
        ) -> Result<Option<Driver>, anyhow::Error> {
            self.inner.lookup_driver_by_phone(candidates).await
        }
    }

    /// Trip store whose writes always fail.
    struct BrokenTrips;

    #[async_trait]
    impl TripStore for BrokenTrips {
        async fn insert_trip(&self, _record: &TripRecord) -> Result<Trip, anyhow::Error> {
            bail!("insert refused")
        }

        async fn get_trip(&self, _id: &str) -> Result<Option<Trip>, anyhow::Error> {
            Ok(None)
        }

        async fn list_trips(&self) -> Result<Vec<Trip>, anyhow::Error> {
            Ok(Vec::new())
        }

        async fn update_trip(
            &self,
            _id: &str,
            _record: &TripRecord,
        ) -> Result<Option<TripRevision>, anyhow::Error> {
            bail!("update refused")
        }

        async fn delete_trip(&self, _id: &str) -> Result<Option<Trip>, anyhow::Error> {
            bail!("delete refused")
        }

        async fn trip_exists_for_driver(&self, _driver_id: &str) -> Result<bool, anyhow::Error> {
            Ok(false)
        }

        async fn count_trips_for_driver(&self, _driver_id: &str) -> Result<i64, anyhow::Error> {
            Ok(0)
        }
    }

    /// Holds each trip write until `gate` has seen every writer arrive.
    struct GatedTrips {
        inner: MemoryStore,
        gate: Barrier,
    }

    #[async_trait]
    impl TripStore for GatedTrips {
        async fn insert_trip(&self, record: &TripRecord) -> Result<Trip, anyhow::Error> {
            self.inner.insert_trip(record).await
        }

        async fn get_trip(&self, id: &str) -> Result<Option<Trip>, anyhow::Error> {
            self.inner.get_trip(id).await
        }

        async fn list_trips(&self) -> Result<Vec<Trip>, anyhow::Error> {
            self.inner.list_trips().await
        }

        async fn update_trip(
            &self,
            id: &str,
            record: &TripRecord,
        ) -> Result<Option<TripRevision>, anyhow::Error> {
            self.gate.wait().await;
            self.inner.update_trip(id, record).await
        }

        async fn delete_trip(&self, id: &str) -> Result<Option<Trip>, anyhow::Error> {
            self.gate.wait().await;
            self.inner.delete_trip(id).await
        }

        async fn trip_exists_for_driver(&self, driver_id: &str) -> Result<bool, anyhow::Error> {
            self.inner.trip_exists_for_driver(driver_id).await
        }

        async fn count_trips_for_driver(&self, driver_id: &str) -> Result<i64, anyhow::Error> {
            self.inner.count_trips_for_driver(driver_id).await
        }
    }

    async fn add_driver(store: &MemoryStore, name: &str, balance: Decimal) -> Driver {
        store
            .insert_driver(&NewDriver {
                name: name.to_string(),
                phone: format!("+96279{:07}", name.len()),
                balance,
                photo_url: None,
            })
            .await
            .unwrap()
    }

    fn input(driver_id: &str, deduction: Decimal) -> TripInput {
        TripInput {
            driver_id: driver_id.to_string(),
            trip_type: TripType::Airport,
            fare: dec!(25.00),
            commission: deduction,
            deduction,
        }
    }

    async fn balance(store: &MemoryStore, id: &str) -> Decimal {
        store.get_driver(id).await.unwrap().unwrap().balance
    }

    fn ledger(store: &MemoryStore) -> Ledger {
        Ledger::new(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn walks_the_documented_sequence() {
        let store = MemoryStore::new();
        let ledger = ledger(&store);
        let a = add_driver(&store, "Ahmad", dec!(100.00)).await;
        let b = add_driver(&store, "Bilal", dec!(50.00)).await;

        let trip = ledger.record_trip(input(&a.id, dec!(15.00))).await.unwrap();
        assert_eq!(trip.deduction, dec!(15.00));
        assert_eq!(trip.driver_name, "Ahmad");
        assert_eq!(balance(&store, &a.id).await, dec!(85.00));

        ledger
            .revise_trip(&trip.id, input(&a.id, dec!(20.00)))
            .await
            .unwrap();
        assert_eq!(balance(&store, &a.id).await, dec!(80.00));

        let moved = ledger
            .revise_trip(&trip.id, input(&b.id, dec!(20.00)))
            .await
            .unwrap();
        assert_eq!(moved.driver_name, "Bilal");
        assert_eq!(balance(&store, &a.id).await, dec!(100.00));
        assert_eq!(balance(&store, &b.id).await, dec!(30.00));

        ledger.remove_trip(&trip.id).await.unwrap();
        assert_eq!(balance(&store, &b.id).await, dec!(50.00));
        assert!(store.get_trip(&trip.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn balance_tracks_remaining_trips() {
        let store = MemoryStore::new();
        let ledger = ledger(&store);
        let a = add_driver(&store, "Ahmad", dec!(40.00)).await;
        let b = add_driver(&store, "Bilal", dec!(-5.00)).await;

        let t1 = ledger.record_trip(input(&a.id, dec!(3.25))).await.unwrap();
        let t2 = ledger.record_trip(input(&a.id, dec!(7.10))).await.unwrap();
        let t3 = ledger.record_trip(input(&b.id, dec!(1.00))).await.unwrap();
        ledger
            .revise_trip(&t2.id, input(&b.id, dec!(2.40)))
            .await
            .unwrap();
        ledger
            .revise_trip(&t1.id, input(&a.id, dec!(0)))
            .await
            .unwrap();
        ledger.remove_trip(&t3.id).await.unwrap();
        ledger.record_trip(input(&a.id, dec!(12.00))).await.unwrap();

        let trips = store.list_trips().await.unwrap();
        for (driver, start) in [(&a, dec!(40.00)), (&b, dec!(-5.00))] {
            let owed: Decimal = trips
                .iter()
                .filter(|trip| trip.driver_id == driver.id)
                .map(|trip| trip.deduction)
                .sum();
            assert_eq!(balance(&store, &driver.id).await, start - owed);
        }
    }

    #[tokio::test]
    async fn rejects_invalid_input_without_writes() {
        let store = MemoryStore::new();
        let ledger = ledger(&store);
        let a = add_driver(&store, "Ahmad", dec!(10.00)).await;

        let mut blank_type = input(&a.id, dec!(1));
        blank_type.trip_type = TripType::Other(String::new());
        assert!(matches!(
            ledger.record_trip(blank_type).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.record_trip(input(" ", dec!(1))).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.record_trip(input("ghost", dec!(1))).await,
            Err(LedgerError::DriverNotFound(_))
        ));

        assert!(store.list_trips().await.unwrap().is_empty());
        assert_eq!(balance(&store, &a.id).await, dec!(10.00));
    }

    #[tokio::test]
    async fn unknown_trip_is_reported() {
        let store = MemoryStore::new();
        let ledger = ledger(&store);
        let a = add_driver(&store, "Ahmad", dec!(10.00)).await;

        assert!(matches!(
            ledger.revise_trip("missing", input(&a.id, dec!(1))).await,
            Err(LedgerError::TripNotFound(_))
        ));
        assert!(matches!(
            ledger.remove_trip("missing").await,
            Err(LedgerError::TripNotFound(_))
        ));
        assert_eq!(balance(&store, &a.id).await, dec!(10.00));
    }

    #[tokio::test]
    async fn failed_increment_keeps_trip_and_reports_pending() {
        let store = MemoryStore::new();
        let a = add_driver(&store, "Ahmad", dec!(100.00)).await;
        let drivers = Arc::new(FlakyBalances {
            inner: store.clone(),
            allowed: AtomicUsize::new(0),
        });
        let ledger = Ledger::new(drivers, Arc::new(store.clone()));

        let err = ledger
            .record_trip(input(&a.id, dec!(15.00)))
            .await
            .unwrap_err();

        match err {
            LedgerError::BalanceNotApplied {
                trip_id, pending, ..
            } => {
                assert!(store.get_trip(&trip_id).await.unwrap().is_some());
                assert_eq!(pending, vec![BalanceDelta::new(&a.id, dec!(-15.00))]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(balance(&store, &a.id).await, dec!(100.00));
    }

    #[tokio::test]
    async fn reassignment_reports_only_the_missing_half() {
        let store = MemoryStore::new();
        let a = add_driver(&store, "Ahmad", dec!(80.00)).await;
        let b = add_driver(&store, "Bilal", dec!(50.00)).await;
        let trip = ledger(&store)
            .record_trip(input(&a.id, dec!(20.00)))
            .await
            .unwrap();

        let drivers = Arc::new(FlakyBalances {
            inner: store.clone(),
            allowed: AtomicUsize::new(1),
        });
        let ledger = Ledger::new(drivers, Arc::new(store.clone()));

        let err = ledger
            .revise_trip(&trip.id, input(&b.id, dec!(20.00)))
            .await
            .unwrap_err();

        match err {
            LedgerError::BalanceNotApplied { pending, .. } => {
                assert_eq!(pending, vec![BalanceDelta::new(&b.id, dec!(-20.00))]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(balance(&store, &a.id).await, dec!(80.00));
        assert_eq!(balance(&store, &b.id).await, dec!(50.00));
        assert_eq!(
            store.get_trip(&trip.id).await.unwrap().unwrap().driver_id,
            b.id
        );
    }

    #[tokio::test]
    async fn failed_trip_write_leaves_balance_alone() {
        let store = MemoryStore::new();
        let a = add_driver(&store, "Ahmad", dec!(100.00)).await;
        let ledger = Ledger::new(Arc::new(store.clone()), Arc::new(BrokenTrips));

        assert!(matches!(
            ledger.record_trip(input(&a.id, dec!(15.00))).await,
            Err(LedgerError::Store(_))
        ));
        assert_eq!(balance(&store, &a.id).await, dec!(100.00));
    }

    #[tokio::test]
    async fn concurrent_revisions_settle_against_the_row_they_replaced() {
        let store = MemoryStore::new();
        let a = add_driver(&store, "Ahmad", dec!(100.00)).await;
        let trip = ledger(&store)
            .record_trip(input(&a.id, dec!(15.00)))
            .await
            .unwrap();

        let trips = Arc::new(GatedTrips {
            inner: store.clone(),
            gate: Barrier::new(2),
        });
        let ledger = Ledger::new(Arc::new(store.clone()), trips);

        let (first, second) = tokio::join!(
            ledger.revise_trip(&trip.id, input(&a.id, dec!(20.00))),
            ledger.revise_trip(&trip.id, input(&a.id, dec!(30.00))),
        );
        first.unwrap();
        second.unwrap();

        let stored = store.get_trip(&trip.id).await.unwrap().unwrap();
        assert_eq!(
            balance(&store, &a.id).await,
            dec!(100.00) - stored.deduction
        );
    }

    #[tokio::test]
    async fn concurrent_delete_returns_the_deduction_once() {
        let store = MemoryStore::new();
        let a = add_driver(&store, "Ahmad", dec!(100.00)).await;
        let trip = ledger(&store)
            .record_trip(input(&a.id, dec!(15.00)))
            .await
            .unwrap();

        let trips = Arc::new(GatedTrips {
            inner: store.clone(),
            gate: Barrier::new(2),
        });
        let ledger = Ledger::new(Arc::new(store.clone()), trips);

        let (first, second) =
            tokio::join!(ledger.remove_trip(&trip.id), ledger.remove_trip(&trip.id));

        assert_eq!(
            [first.is_ok(), second.is_ok()]
                .iter()
                .filter(|ok| **ok)
                .count(),
            1
        );
        assert_eq!(balance(&store, &a.id).await, dec!(100.00));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn many_sessions_keep_the_balance_consistent() {
        let store = MemoryStore::new();
        let a = add_driver(&store, "Ahmad", dec!(500.00)).await;
        let b = add_driver(&store, "Bilal", dec!(500.00)).await;
        let ledger = ledger(&store);
        let trip = ledger.record_trip(input(&a.id, dec!(5.00))).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..40u32 {
            let ledger = ledger.clone();
            let trip_id = trip.id.clone();
            let driver_id = if i % 3 == 0 { b.id.clone() } else { a.id.clone() };
            handles.push(tokio::spawn(async move {
                ledger
                    .revise_trip(&trip_id, input(&driver_id, Decimal::from(i)))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = store.get_trip(&trip.id).await.unwrap().unwrap();
        for driver in [&a, &b] {
            let owed = if stored.driver_id == driver.id {
                stored.deduction
            } else {
                Decimal::ZERO
            };
            assert_eq!(balance(&store, &driver.id).await, dec!(500.00) - owed);
        }
    }

    #[tokio::test]
    async fn amounts_finer_than_a_fil_are_rejected() {
        let store = MemoryStore::new();
        let ledger = ledger(&store);
        let a = add_driver(&store, "Ahmad", dec!(1.00)).await;

        let trip = ledger.record_trip(input(&a.id, dec!(0.005))).await.unwrap();
        assert_eq!(balance(&store, &a.id).await, dec!(0.995));

        assert!(matches!(
            ledger.record_trip(input(&a.id, dec!(0.0005))).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            ledger.revise_trip(&trip.id, input(&a.id, dec!(1.2345))).await,
            Err(LedgerError::Validation(_))
        ));

        ledger.remove_trip(&trip.id).await.unwrap();
        assert_eq!(balance(&store, &a.id).await, dec!(1.00));
        assert!(store.list_trips().await.unwrap().is_empty());
    }

    #[test]
    fn deltas_display_with_sign() {
        assert_eq!(BalanceDelta::new("d-1", dec!(15.00)).to_string(), "d-1:+15.00");
        assert_eq!(BalanceDelta::new("d-1", dec!(-15.00)).to_string(), "d-1:-15.00");
        assert!(non_zero(vec![BalanceDelta::new("d-1", dec!(0.00))]).is_empty());
    }
}
