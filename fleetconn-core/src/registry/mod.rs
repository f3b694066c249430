//! MySQL-backed host inventory
//!
//! The registry owns the `servers` table: fleet CRUD for the HTTP layer
//! and the single status column the monitoring workers write back.
//! Metric snapshots are never persisted.

use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::time::Duration;
use thiserror::Error;

use crate::models::{ConnectionKind, Server, ServerStatus, ServerSys};

/// Errors produced by registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No live row with the given id
    #[error("Server not found: {0}")]
    NotFound(u32),

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Column values for registering a new host; the password is ciphertext
#[derive(Debug, Clone)]
pub struct NewServer {
    /// Network address
    pub ip_address: String,
    /// Encrypted credential
    pub password: String,
    /// SSH port as text
    pub port: String,
    /// Operating system class
    pub sys: ServerSys,
    /// Transport class
    pub connection: ConnectionKind,
    /// Login user
    pub username: String,
    /// Display name
    pub name: String,
}

/// Handle to the fleet inventory table
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HostRegistry {
    pool: MySqlPool,
}

impl HostRegistry {
    /// Connects to MySQL using the given connection string
    ///
    /// # Errors
    ///
    /// Returns an error if the pool cannot be established.
    pub async fn connect(database_url: &str) -> RegistryResult<Self> {
        let pool = MySqlPoolOptions::new()
            .min_connections(10)
            .max_connections(100)
            .max_lifetime(Duration::from_secs(3600))
            .connect(database_url)
            .await?;

        tracing::info!("Connected to MySQL database");
        Ok(Self { pool })
    }

    /// Wraps an existing pool (used by tests)
    #[must_use]
    pub const fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates the `servers` table when it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns an error if the DDL statement fails.
    pub async fn migrate(&self) -> RegistryResult<()> {
        sqlx::query(
            r"CREATE TABLE IF NOT EXISTS servers (
                id INT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
                ip_address VARCHAR(64) NOT NULL,
                password VARCHAR(255) NOT NULL,
                port VARCHAR(10) NOT NULL DEFAULT '22',
                sys VARCHAR(1) NOT NULL DEFAULT 'L',
                connection VARCHAR(10) NOT NULL DEFAULT 'SSH',
                username VARCHAR(50) NOT NULL,
                name VARCHAR(100) NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'offline',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                    ON UPDATE CURRENT_TIMESTAMP,
                deleted_at TIMESTAMP NULL DEFAULT NULL,
                INDEX idx_servers_deleted_at (deleted_at)
            )",
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// Lists all non-deleted hosts
    ///
    /// # Errors
    ///
    /// Returns an error on query failure.
    pub async fn list(&self) -> RegistryResult<Vec<Server>> {
        let servers = sqlx::query_as::<_, Server>(
            "SELECT * FROM servers WHERE deleted_at IS NULL ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(servers)
    }

    /// Fetches one host by id
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when no live row matches.
    pub async fn get(&self, id: u32) -> RegistryResult<Server> {
        sqlx::query_as::<_, Server>("SELECT * FROM servers WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(RegistryError::NotFound(id))
    }

    /// Inserts a new host row and returns it with its assigned id
    ///
    /// # Errors
    ///
    /// Returns an error on insert failure.
    pub async fn insert(&self, server: NewServer) -> RegistryResult<Server> {
        let result = sqlx::query(
            "INSERT INTO servers \
             (ip_address, password, port, sys, connection, username, name, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&server.ip_address)
        .bind(&server.password)
        .bind(&server.port)
        .bind(server.sys)
        .bind(server.connection)
        .bind(&server.username)
        .bind(&server.name)
        .bind(ServerStatus::Offline)
        .execute(&self.pool)
        .await?;

        let id = u32::try_from(result.last_insert_id()).unwrap_or(0);
        self.get(id).await
    }

    /// Writes all mutable columns of an existing host row
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the row does not exist.
    pub async fn update(&self, server: &Server) -> RegistryResult<()> {
        let result = sqlx::query(
            "UPDATE servers SET ip_address = ?, password = ?, port = ?, sys = ?, \
             connection = ?, username = ?, name = ?, status = ? \
             WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(&server.ip_address)
        .bind(&server.password)
        .bind(&server.port)
        .bind(server.sys)
        .bind(server.connection)
        .bind(&server.username)
        .bind(&server.name)
        .bind(server.status)
        .bind(server.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound(server.id));
        }
        Ok(())
    }

    /// Soft-deletes a host row
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the row does not exist.
    pub async fn soft_delete(&self, id: u32) -> RegistryResult<()> {
        let result =
            sqlx::query("UPDATE servers SET deleted_at = NOW() WHERE id = ? AND deleted_at IS NULL")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound(id));
        }
        Ok(())
    }

    /// Updates only the status column; the one write the monitor performs
    ///
    /// # Errors
    ///
    /// Returns an error on query failure. A missing row is not an error
    /// here: the worker may race a concurrent delete.
    pub async fn set_status(&self, id: u32, status: ServerStatus) -> RegistryResult<()> {
        sqlx::query("UPDATE servers SET status = ? WHERE id = ? AND deleted_at IS NULL")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Probes database connectivity for health endpoints
    ///
    /// # Errors
    ///
    /// Returns an error when the database is unreachable.
    pub async fn ping(&self) -> RegistryResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
