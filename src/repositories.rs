use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::models::{
    drivers::{Driver, DriverDeletion, DriverUpdate, NewDriver},
    trips::{Trip, TripRecord, TripRevision},
};

pub mod drivers;
pub mod memory;
pub mod trips;

#[async_trait]
pub trait DriverStore: Send + Sync + 'static {
    async fn insert_driver(&self, driver: &NewDriver) -> Result<Driver, anyhow::Error>;

    async fn get_driver(&self, id: &str) -> Result<Option<Driver>, anyhow::Error>;

    /// All drivers ordered by name.
    async fn list_drivers(&self) -> Result<Vec<Driver>, anyhow::Error>;

    async fn update_driver(
        &self,
        id: &str,
        update: &DriverUpdate,
    ) -> Result<Option<Driver>, anyhow::Error>;

    /// Removes the driver unless a trip still refers to it, checked in the
    /// same store operation as the delete.
    async fn delete_driver(&self, id: &str) -> Result<DriverDeletion, anyhow::Error>;

    /// Adds `delta` to the stored balance in a single store-side operation.
    /// Fails if the driver does not exist.
    async fn increment_driver_balance(&self, id: &str, delta: Decimal)
        -> Result<(), anyhow::Error>;

    /// Tries each candidate in order and returns the first driver whose
    /// stored phone matches exactly.
    async fn lookup_driver_by_phone(
        &self,
        candidates: &[String],
    ) -> Result<Option<Driver>, anyhow::Error>;
}

#[async_trait]
pub trait TripStore: Send + Sync + 'static {
    async fn insert_trip(&self, record: &TripRecord) -> Result<Trip, anyhow::Error>;

    async fn get_trip(&self, id: &str) -> Result<Option<Trip>, anyhow::Error>;

    /// All trips, most recent first.
    async fn list_trips(&self) -> Result<Vec<Trip>, anyhow::Error>;

    /// Replaces the trip and returns both images. Concurrent writers to the
    /// same trip each see the row the previous one left.
    async fn update_trip(
        &self,
        id: &str,
        record: &TripRecord,
    ) -> Result<Option<TripRevision>, anyhow::Error>;

    /// Removes the trip and returns the row that was removed.
    async fn delete_trip(&self, id: &str) -> Result<Option<Trip>, anyhow::Error>;

    async fn trip_exists_for_driver(&self, driver_id: &str) -> Result<bool, anyhow::Error>;

    async fn count_trips_for_driver(&self, driver_id: &str) -> Result<i64, anyhow::Error>;
}

/// Pool for the Postgres repository tests, or `None` when `DATABASE_URL` is
/// not set and those tests should skip.
#[cfg(test)]
pub(crate) async fn test_pool() -> Option<sqlx::PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres test");
        return None;
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");

    Some(pool)
}

/// A Jordanian mobile number no other test run is likely to use.
#[cfg(test)]
pub(crate) fn unique_phone() -> String {
    format!("+9627{:08}", uuid::Uuid::new_v4().as_u128() % 100_000_000)
}
