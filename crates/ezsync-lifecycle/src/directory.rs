// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Customer directory.
//!
//! Maps a radio serial number to the customer it is assigned to, through
//! the inventory record of the device. Only deployment needs it.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the customer directory.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DirectoryError {
    /// No database settings in the environment.
    #[error(
        "customer database is not configured (set EZSYNC_DATABASE_URL or DB_HOST, DB_NAME, DB_USER)"
    )]
    NotConfigured,

    /// An environment variable holds an invalid value.
    #[error("invalid value for {name}: {value}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Offending value.
        value: String,
    },

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Pool size.
    pub max_connections: u32,
}

impl DirectoryConfig {
    /// Load settings from the environment.
    ///
    /// `EZSYNC_DATABASE_URL` wins. Otherwise the URL is assembled from
    /// `DB_HOST`, `DB_PORT` (default 5432), `DB_NAME`, `DB_USER` and
    /// `DB_PASSWORD`.
    pub fn from_env() -> Result<Self, DirectoryError> {
        let database_url = match std::env::var("EZSYNC_DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url.trim().to_string(),
            _ => {
                let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
                let (Some(host), Some(name), Some(user)) =
                    (var("DB_HOST"), var("DB_NAME"), var("DB_USER"))
                else {
                    return Err(DirectoryError::NotConfigured);
                };
                let port = match var("DB_PORT") {
                    Some(port) => port
                        .parse::<u16>()
                        .map_err(|_| DirectoryError::InvalidValue {
                            name: "DB_PORT",
                            value: port,
                        })?,
                    None => 5432,
                };
                let password = var("DB_PASSWORD").unwrap_or_default();
                format!("postgres://{user}:{password}@{host}:{port}/{name}")
            }
        };

        Ok(Self {
            database_url,
            max_connections: 2,
        })
    }
}

/// Customer assigned to a device.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    /// Customer identifier.
    pub id: i64,
    /// Customer name.
    pub name: Option<String>,
    /// Contact email.
    pub email: Option<String>,
    /// Contact phone.
    pub phone: Option<String>,
    /// Street address, first line.
    pub addr1: Option<String>,
    /// City.
    pub city: Option<String>,
    /// State.
    pub state: Option<String>,
    /// Postal code.
    pub zip: Option<String>,
    /// Installation latitude.
    pub latitude: Option<f64>,
    /// Installation longitude.
    pub longitude: Option<f64>,
}

impl CustomerRecord {
    /// Installation coordinates, when both are known and non-zero.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Lookup of customers by device.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Customer assigned to the device with this serial number.
    async fn lookup_customer_by_device(
        &self,
        serial: &str,
    ) -> Result<Option<CustomerRecord>, DirectoryError>;
}

type CustomerRow = (
    i64,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<f64>,
    Option<f64>,
);

/// PostgreSQL-backed customer directory.
#[derive(Clone)]
pub struct PgCustomerDirectory {
    pool: PgPool,
}

impl PgCustomerDirectory {
    /// Wrap an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a pool for the configured database.
    pub async fn connect(config: &DirectoryConfig) -> Result<Self, DirectoryError> {
        info!("Connecting to customer database...");
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CustomerDirectory for PgCustomerDirectory {
    async fn lookup_customer_by_device(
        &self,
        serial: &str,
    ) -> Result<Option<CustomerRecord>, DirectoryError> {
        // Service address (type 6) overrides the customer's own address.
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT c.id,
                   c.name,
                   c.email,
                   c.phone,
                   COALESCE(a.addr1, c.addr1) AS addr1,
                   COALESCE(a.city, c.city) AS city,
                   COALESCE(a.state, c.state) AS state,
                   COALESCE(a.zip, c.zip) AS zip,
                   a.latitude::float8 AS latitude,
                   a.longitude::float8 AS longitude
            FROM customer c
            LEFT JOIN address a ON c.id = a.idnum AND a.type = 6
            WHERE c.id = (
                SELECT status_detail::bigint
                FROM inventory_record
                WHERE serial_number = $1
            )
            "#,
        )
        .bind(serial)
        .fetch_optional(&self.pool)
        .await?;

        debug!(serial, found = row.is_some(), "Customer lookup");

        Ok(row.map(
            |(id, name, email, phone, addr1, city, state, zip, latitude, longitude)| {
                CustomerRecord {
                    id,
                    name,
                    email,
                    phone,
                    addr1,
                    city,
                    state,
                    zip,
                    latitude,
                    longitude,
                }
            },
        ))
    }
}
