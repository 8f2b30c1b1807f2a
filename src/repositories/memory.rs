//! Process-local store backed by `DashMap`, used when no database is
//! configured and as the store in tests.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{DriverStore, TripStore};
use crate::models::{
    drivers::{Driver, DriverDeletion, DriverUpdate, NewDriver},
    trips::{Trip, TripRecord, TripRevision},
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    drivers: Arc<DashMap<String, Driver>>,
    trips: Arc<DashMap<String, Trip>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriverStore for MemoryStore {
    async fn insert_driver(&self, driver: &NewDriver) -> Result<Driver, anyhow::Error> {
        let now = Utc::now();
        let driver = Driver {
            id: Uuid::new_v4().hyphenated().to_string(),
            name: driver.name.clone(),
            phone: driver.phone.clone(),
            balance: driver.balance,
            photo_url: driver.photo_url.clone(),
            created_at: now,
            updated_at: now,
        };

        self.drivers.insert(driver.id.clone(), driver.clone());
        Ok(driver)
    }

    async fn get_driver(&self, id: &str) -> Result<Option<Driver>, anyhow::Error> {
        Ok(self.drivers.get(id).map(|driver| driver.value().clone()))
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, anyhow::Error> {
        let mut drivers: Vec<Driver> = self
            .drivers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        drivers.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(drivers)
    }

    async fn update_driver(
        &self,
        id: &str,
        update: &DriverUpdate,
    ) -> Result<Option<Driver>, anyhow::Error> {
        let Some(mut driver) = self.drivers.get_mut(id) else {
            return Ok(None);
        };

        if let Some(name) = &update.name {
            driver.name = name.clone();
        }
        if let Some(phone) = &update.phone {
            driver.phone = phone.clone();
        }
        if let Some(balance) = update.balance {
            driver.balance = balance;
        }
        if let Some(photo_url) = &update.photo_url {
            driver.photo_url = Some(photo_url.clone());
        }
        driver.updated_at = Utc::now();

        Ok(Some(driver.clone()))
    }

    async fn delete_driver(&self, id: &str) -> Result<DriverDeletion, anyhow::Error> {
        // The trip scan runs while the driver's shard is write-locked.
        let removed = self.drivers.remove_if(id, |driver_id, _| {
            !self
                .trips
                .iter()
                .any(|entry| &entry.value().driver_id == driver_id)
        });

        if removed.is_some() {
            Ok(DriverDeletion::Deleted)
        } else if self.drivers.contains_key(id) {
            Ok(DriverDeletion::HasTrips)
        } else {
            Ok(DriverDeletion::NotFound)
        }
    }

    async fn increment_driver_balance(
        &self,
        id: &str,
        delta: Decimal,
    ) -> Result<(), anyhow::Error> {
        // The shard write lock is held for the whole read-add-write.
        match self.drivers.get_mut(id) {
            Some(mut driver) => {
                driver.balance += delta;
                driver.updated_at = Utc::now();
                Ok(())
            }
            None => bail!("Driver not found: {}", id),
        }
    }

    async fn lookup_driver_by_phone(
        &self,
        candidates: &[String],
    ) -> Result<Option<Driver>, anyhow::Error> {
        for candidate in candidates {
            let driver = self
                .drivers
                .iter()
                .find(|entry| &entry.value().phone == candidate)
                .map(|entry| entry.value().clone());

            if driver.is_some() {
                return Ok(driver);
            }
        }

        Ok(None)
    }
}

#[async_trait]
impl TripStore for MemoryStore {
    async fn insert_trip(&self, record: &TripRecord) -> Result<Trip, anyhow::Error> {
        let now = Utc::now();
        let trip = Trip {
            id: Uuid::new_v4().hyphenated().to_string(),
            driver_id: record.driver_id.clone(),
            driver_name: record.driver_name.clone(),
            trip_type: record.trip_type.clone(),
            fare: record.fare,
            commission: record.commission,
            deduction: record.deduction,
            date: now,
            created_at: now,
            updated_at: now,
        };

        self.trips.insert(trip.id.clone(), trip.clone());
        Ok(trip)
    }

    async fn get_trip(&self, id: &str) -> Result<Option<Trip>, anyhow::Error> {
        Ok(self.trips.get(id).map(|trip| trip.value().clone()))
    }

    async fn list_trips(&self) -> Result<Vec<Trip>, anyhow::Error> {
        let mut trips: Vec<Trip> = self.trips.iter().map(|entry| entry.value().clone()).collect();
        trips.sort_by(|a, b| b.date.cmp(&a.date));

        Ok(trips)
    }

    async fn update_trip(
        &self,
        id: &str,
        record: &TripRecord,
    ) -> Result<Option<TripRevision>, anyhow::Error> {
        let Some(mut trip) = self.trips.get_mut(id) else {
            return Ok(None);
        };

        let before = trip.value().clone();
        trip.driver_id = record.driver_id.clone();
        trip.driver_name = record.driver_name.clone();
        trip.trip_type = record.trip_type.clone();
        trip.fare = record.fare;
        trip.commission = record.commission;
        trip.deduction = record.deduction;
        trip.updated_at = Utc::now();

        Ok(Some(TripRevision {
            before,
            after: trip.value().clone(),
        }))
    }

    async fn delete_trip(&self, id: &str) -> Result<Option<Trip>, anyhow::Error> {
        Ok(self.trips.remove(id).map(|(_, trip)| trip))
    }

    async fn trip_exists_for_driver(&self, driver_id: &str) -> Result<bool, anyhow::Error> {
        Ok(self
            .trips
            .iter()
            .any(|entry| entry.value().driver_id == driver_id))
    }

    async fn count_trips_for_driver(&self, driver_id: &str) -> Result<i64, anyhow::Error> {
        let count = self
            .trips
            .iter()
            .filter(|entry| entry.value().driver_id == driver_id)
            .count();

        Ok(i64::try_from(count)?)
    }
}
