use crate::models::drivers::{Driver, DriverDeletion, DriverUpdate, NewDriver};

use anyhow::bail;
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::DriverStore;

#[derive(Clone)]
pub struct DriverRepository {
    conn: PgPool,
}

impl DriverRepository {
    pub fn new(conn: PgPool) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl DriverStore for DriverRepository {
    async fn insert_driver(&self, driver: &NewDriver) -> Result<Driver, anyhow::Error> {
        let driver_id = Uuid::new_v4().hyphenated().to_string();

        let driver = sqlx::query_as::<_, Driver>(
            r#"
                INSERT INTO drivers (id, name, phone, balance, photo_url)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING *
            "#,
        )
        .bind(&driver_id)
        .bind(&driver.name)
        .bind(&driver.phone)
        .bind(driver.balance)
        .bind(&driver.photo_url)
        .fetch_one(&self.conn)
        .await?;

        Ok(driver)
    }

    async fn get_driver(&self, id: &str) -> Result<Option<Driver>, anyhow::Error> {
        let driver = sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(driver)
    }

    async fn list_drivers(&self) -> Result<Vec<Driver>, anyhow::Error> {
        let drivers = sqlx::query_as::<_, Driver>("SELECT * FROM drivers ORDER BY name")
            .fetch_all(&self.conn)
            .await?;

        Ok(drivers)
    }

    async fn update_driver(
        &self,
        id: &str,
        update: &DriverUpdate,
    ) -> Result<Option<Driver>, anyhow::Error> {
        let driver = sqlx::query_as::<_, Driver>(
            r#"
                UPDATE drivers SET
                    name = COALESCE($2, name),
                    phone = COALESCE($3, phone),
                    balance = COALESCE($4, balance),
                    photo_url = COALESCE($5, photo_url),
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $1
                RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.phone)
        .bind(update.balance)
        .bind(&update.photo_url)
        .fetch_optional(&self.conn)
        .await?;

        Ok(driver)
    }

    async fn delete_driver(&self, id: &str) -> Result<DriverDeletion, anyhow::Error> {
        let result = sqlx::query(
            r#"
                DELETE FROM drivers
                WHERE id = $1
                AND NOT EXISTS (SELECT 1 FROM trips WHERE driver_id = $1)
            "#,
        )
        .bind(id)
        .execute(&self.conn)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(DriverDeletion::Deleted);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM drivers WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.conn)
            .await?;

        if exists {
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
        let result = sqlx::query(
            "UPDATE drivers SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
        )
        .bind(delta)
        .bind(id)
        .execute(&self.conn)
        .await?;

        if result.rows_affected() == 0 {
            bail!("Driver not found: {}", id)
        }

        Ok(())
    }

    async fn lookup_driver_by_phone(
        &self,
        candidates: &[String],
    ) -> Result<Option<Driver>, anyhow::Error> {
        for candidate in candidates {
            let driver =
                sqlx::query_as::<_, Driver>("SELECT * FROM drivers WHERE phone = $1 LIMIT 1")
                    .bind(candidate)
                    .fetch_optional(&self.conn)
                    .await?;

            if driver.is_some() {
                return Ok(driver);
            }
        }

        Ok(None)
    }
}
