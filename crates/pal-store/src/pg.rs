//! # PostgreSQL Store Backend
//!
//! Implements [`MetadataStore`] and [`PendingRegistrationStore`] over SQLx.
//! The capabilities are blocking, so the store owns a small Tokio runtime
//! and drives each query to completion with `block_on`. It must therefore
//! not be called from inside another Tokio runtime.
//!
//! Timestamps are stored as their ISO-8601 text rendering, the exact bytes
//! the fingerprint hashes, so no driver-side conversion can alter them.
//!
//! Error mapping: unique-key violations become [`StoreError::Conflict`];
//! every other driver or connection error becomes
//! [`StoreError::Unavailable`]; rows that fail to decode become
//! [`StoreError::Corrupt`].

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use pal_core::{BatchNumber, Fingerprint, ProductId, Timestamp};

use crate::error::StoreError;
use crate::record::{PendingRegistration, ProductRecord};
use crate::store::{MetadataStore, PendingRegistrationStore};

const PRODUCTS: &str = "products";
const PENDING: &str = "pending_registrations";

/// Postgres-backed product and marker store.
pub struct PgMetadataStore {
    runtime: tokio::runtime::Runtime,
    pool: PgPool,
}

impl std::fmt::Debug for PgMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgMetadataStore")
            .field("pool_size", &self.pool.size())
            .finish()
    }
}

impl PgMetadataStore {
    /// Connect to `url` and apply the embedded migrations.
    pub fn connect(url: &str) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| StoreError::Unavailable {
                operation: "connect",
                reason: format!("failed to start runtime: {e}"),
            })?;

        let pool = runtime
            .block_on(async {
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(url)
                    .await?;
                sqlx::migrate!("./migrations").run(&pool).await?;
                Ok::<_, sqlx::Error>(pool)
            })
            .map_err(|e| StoreError::Unavailable {
                operation: "connect",
                reason: e.to_string(),
            })?;

        tracing::info!("connected to PostgreSQL metadata store");
        Ok(Self { runtime, pool })
    }
}

fn map_sqlx(
    operation: &'static str,
    table: &'static str,
    product_id: &ProductId,
    err: sqlx::Error,
) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict {
            table,
            product_id: product_id.clone(),
        },
        _ => StoreError::Unavailable {
            operation,
            reason: err.to_string(),
        },
    }
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ProductRow {
    product_id: String,
    product_type: String,
    batch_number: String,
    manufacturing_timestamp: String,
    expiry_timestamp: String,
    fingerprint: String,
}

impl ProductRow {
    fn into_record(self) -> Result<ProductRecord, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt {
            product_id: self.product_id.clone(),
            reason,
        };
        Ok(ProductRecord {
            product_id: ProductId::new(self.product_id.clone())
                .map_err(|e| corrupt(e.to_string()))?,
            product_type: self.product_type.clone(),
            batch_number: BatchNumber::new(self.batch_number.clone())
                .map_err(|e| corrupt(e.to_string()))?,
            manufactured_at: Timestamp::parse(&self.manufacturing_timestamp)
                .map_err(|e| corrupt(e.to_string()))?,
            expires_at: Timestamp::parse(&self.expiry_timestamp)
                .map_err(|e| corrupt(e.to_string()))?,
            fingerprint: Fingerprint::parse(self.fingerprint.trim_end())
                .map_err(|e| corrupt(e.to_string()))?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PendingRow {
    #[sqlx(flatten)]
    product: ProductRow,
    created_at: String,
}

impl PendingRow {
    fn into_marker(self) -> Result<PendingRegistration, StoreError> {
        let created_at =
            Timestamp::parse(&self.created_at).map_err(|e| StoreError::Corrupt {
                product_id: self.product.product_id.clone(),
                reason: e.to_string(),
            })?;
        Ok(PendingRegistration::new(self.product.into_record()?, created_at))
    }
}

impl MetadataStore for PgMetadataStore {
    fn insert(&self, record: &ProductRecord) -> Result<(), StoreError> {
        self.runtime
            .block_on(
                sqlx::query(
                    "INSERT INTO products (product_id, product_type, batch_number,
                     manufacturing_timestamp, expiry_timestamp, fingerprint)
                     VALUES ($1, $2, $3, $4, $5, $6)",
                )
                .bind(record.product_id.as_str())
                .bind(&record.product_type)
                .bind(record.batch_number.as_str())
                .bind(record.manufactured_at.to_iso8601())
                .bind(record.expires_at.to_iso8601())
                .bind(record.fingerprint.as_str())
                .execute(&self.pool),
            )
            .map_err(|e| map_sqlx("insert", PRODUCTS, &record.product_id, e))?;
        Ok(())
    }

    fn get(&self, product_id: &ProductId) -> Result<ProductRecord, StoreError> {
        let row = self
            .runtime
            .block_on(
                sqlx::query_as::<_, ProductRow>(
                    "SELECT product_id, product_type, batch_number,
                     manufacturing_timestamp, expiry_timestamp, fingerprint
                     FROM products WHERE product_id = $1",
                )
                .bind(product_id.as_str())
                .fetch_optional(&self.pool),
            )
            .map_err(|e| map_sqlx("get", PRODUCTS, product_id, e))?;

        row.ok_or_else(|| StoreError::NotFound {
            table: PRODUCTS,
            product_id: product_id.clone(),
        })?
        .into_record()
    }

    fn store_name(&self) -> &str {
        "PgMetadataStore"
    }
}

impl PendingRegistrationStore for PgMetadataStore {
    fn put_pending(&self, marker: &PendingRegistration) -> Result<(), StoreError> {
        let record = &marker.record;
        self.runtime
            .block_on(
                sqlx::query(
                    "INSERT INTO pending_registrations (product_id, product_type, batch_number,
                     manufacturing_timestamp, expiry_timestamp, fingerprint, created_at)
                     VALUES ($1, $2, $3, $4, $5, $6, $7)",
                )
                .bind(marker.product_id.as_str())
                .bind(&record.product_type)
                .bind(record.batch_number.as_str())
                .bind(record.manufactured_at.to_iso8601())
                .bind(record.expires_at.to_iso8601())
                .bind(marker.fingerprint.as_str())
                .bind(marker.created_at.to_iso8601())
                .execute(&self.pool),
            )
            .map_err(|e| map_sqlx("put_pending", PENDING, &marker.product_id, e))?;
        Ok(())
    }

    fn clear_pending(&self, product_id: &ProductId) -> Result<bool, StoreError> {
        let result = self
            .runtime
            .block_on(
                sqlx::query("DELETE FROM pending_registrations WHERE product_id = $1")
                    .bind(product_id.as_str())
                    .execute(&self.pool),
            )
            .map_err(|e| map_sqlx("clear_pending", PENDING, product_id, e))?;
        Ok(result.rows_affected() > 0)
    }

    fn list_pending(&self) -> Result<Vec<PendingRegistration>, StoreError> {
        let rows = self
            .runtime
            .block_on(
                sqlx::query_as::<_, PendingRow>(
                    "SELECT product_id, product_type, batch_number, manufacturing_timestamp,
                     expiry_timestamp, fingerprint, created_at
                     FROM pending_registrations ORDER BY product_id",
                )
                .fetch_all(&self.pool),
            )
            .map_err(|e| StoreError::Unavailable {
                operation: "list_pending",
                reason: e.to_string(),
            })?;

        rows.into_iter().map(PendingRow::into_marker).collect()
    }
}
