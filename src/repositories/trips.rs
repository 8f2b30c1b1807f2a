use crate::models::trips::{Trip, TripRecord, TripRevision};

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::TripStore;

#[derive(Clone)]
pub struct TripRepository {
    conn: PgPool,
}

impl TripRepository {
    pub fn new(conn: PgPool) -> Self {
        TripRepository { conn }
    }
}

#[async_trait]
impl TripStore for TripRepository {
    async fn insert_trip(&self, record: &TripRecord) -> Result<Trip, anyhow::Error> {
        let trip_id = Uuid::new_v4().hyphenated().to_string();

        let trip = sqlx::query_as::<_, Trip>(
            r#"INSERT INTO trips
            (id, driver_id, driver_name, trip_type, fare, commission, deduction)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(&trip_id)
        .bind(&record.driver_id)
        .bind(&record.driver_name)
        .bind(record.trip_type.as_str())
        .bind(record.fare)
        .bind(record.commission)
        .bind(record.deduction)
        .fetch_one(&self.conn)
        .await?;

        Ok(trip)
    }

    async fn get_trip(&self, id: &str) -> Result<Option<Trip>, anyhow::Error> {
        let trip = sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(trip)
    }

    async fn list_trips(&self) -> Result<Vec<Trip>, anyhow::Error> {
        let trips = sqlx::query_as::<_, Trip>("SELECT * FROM trips ORDER BY date DESC")
            .fetch_all(&self.conn)
            .await?;

        Ok(trips)
    }

    async fn update_trip(
        &self,
        id: &str,
        record: &TripRecord,
    ) -> Result<Option<TripRevision>, anyhow::Error> {
        let mut tx = self.conn.begin().await?;

        let Some(before) =
            sqlx::query_as::<_, Trip>("SELECT * FROM trips WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
        else {
            return Ok(None);
        };

        let after = sqlx::query_as::<_, Trip>(
            r#"UPDATE trips SET
                driver_id = $2,
                driver_name = $3,
                trip_type = $4,
                fare = $5,
                commission = $6,
                deduction = $7,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *"#,
        )
        .bind(id)
        .bind(&record.driver_id)
        .bind(&record.driver_name)
        .bind(record.trip_type.as_str())
        .bind(record.fare)
        .bind(record.commission)
        .bind(record.deduction)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(TripRevision { before, after }))
    }

    async fn delete_trip(&self, id: &str) -> Result<Option<Trip>, anyhow::Error> {
        let trip = sqlx::query_as::<_, Trip>("DELETE FROM trips WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(trip)
    }

    async fn trip_exists_for_driver(&self, driver_id: &str) -> Result<bool, anyhow::Error> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM trips WHERE driver_id = $1)")
                .bind(driver_id)
                .fetch_one(&self.conn)
                .await?;

        Ok(exists)
    }

    async fn count_trips_for_driver(&self, driver_id: &str) -> Result<i64, anyhow::Error> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM trips WHERE driver_id = $1")
            .bind(driver_id)
            .fetch_one(&self.conn)
            .await?;

        Ok(count)
    }
}
