//! Database configuration module for RAB Maker.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so foreign keys and `ON DELETE` actions come
//! straight from the `belongs_to` relations declared on the entities.
//!
//! All writes go through [`Store::begin_write`]. The store keeps a write pool capped
//! at a single connection plus a process-wide async mutex, so at most one write
//! transaction is open at any time. Reads use a separate pool and never take the lock.

use crate::entities::{
    ItemCost, LaborType, Material, Project, Template, TemplateLaborComponent,
    TemplateMaterialComponent, WorkCategory, WorkItem,
};
use crate::errors::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction,
    EntityTrait, Schema, TransactionTrait,
};
use std::{ops::Deref, sync::Arc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

/// Database used when `DATABASE_URL` is not set
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/rab_maker.sqlite?mode=rwc";

const READ_POOL_SIZE: u32 = 16;

/// Gets the database URL from environment variable or returns default `SQLite` path.
///
/// This function looks for `DATABASE_URL` in the environment and falls back to
/// a default local `SQLite` file if not found.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Read pool plus serialized write access to one `SQLite` database.
#[derive(Debug, Clone)]
pub struct Store {
    read: Arc<DatabaseConnection>,
    write: Arc<DatabaseConnection>,
    write_lock: Arc<Mutex<()>>,
}

impl Store {
    /// Wraps a single connection for both reads and writes.
    ///
    /// Used for in-memory databases, where every pool connection would otherwise see
    /// its own empty database, and for tests.
    #[must_use]
    pub fn from_connection(db: DatabaseConnection) -> Self {
        let db = Arc::new(db);
        Self {
            read: Arc::clone(&db),
            write: db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Opens the write pool (one connection) and, for file databases, a separate read pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        debug!("Opening write connection to {database_url}");
        let mut write_options = ConnectOptions::new(database_url.to_owned());
        write_options.max_connections(1).sqlx_logging(false);
        let write = Database::connect(write_options).await?;

        if database_url.contains(":memory:") {
            return Ok(Self::from_connection(write));
        }

        let mut read_options = ConnectOptions::new(database_url.to_owned());
        read_options
            .max_connections(READ_POOL_SIZE)
            .sqlx_logging(false);
        let read = Database::connect(read_options).await?;

        info!("Database connection established at {database_url}");
        Ok(Self {
            read: Arc::new(read),
            write: Arc::new(write),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Connection for read-only queries.
    #[must_use]
    pub fn reader(&self) -> &DatabaseConnection {
        &self.read
    }

    /// Begins the one write transaction allowed at a time.
    ///
    /// Waits until any other writer has committed or rolled back. Dropping the
    /// returned [`WriteTxn`] without calling [`WriteTxn::commit`] rolls it back.
    pub async fn begin_write(&self) -> Result<WriteTxn> {
        let guard = Arc::clone(&self.write_lock).lock_owned().await;
        let txn = self.write.begin().await?;
        Ok(WriteTxn { txn, _guard: guard })
    }
}

/// An exclusive write transaction.
///
/// Derefs to [`DatabaseTransaction`], so it can be passed anywhere a
/// `ConnectionTrait` is expected.
pub struct WriteTxn {
    // Dropped before the guard: roll back first, then let the next writer in.
    txn: DatabaseTransaction,
    _guard: OwnedMutexGuard<()>,
}

impl WriteTxn {
    /// Commits the transaction and releases the write lock.
    pub async fn commit(self) -> Result<()> {
        self.txn.commit().await?;
        Ok(())
    }
}

impl Deref for WriteTxn {
    type Target = DatabaseTransaction;

    fn deref(&self) -> &Self::Target {
        &self.txn
    }
}

async fn create_table<C, E>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all necessary database tables using `SeaORM`'s schema generation from entity definitions.
///
/// Parents are created before children. Existing tables are left untouched.
pub async fn create_tables<C>(db: &C) -> Result<()>
where
    C: ConnectionTrait,
{
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, Material).await?;
    create_table(db, &schema, LaborType).await?;
    create_table(db, &schema, Template).await?;
    create_table(db, &schema, TemplateMaterialComponent).await?;
    create_table(db, &schema, TemplateLaborComponent).await?;
    create_table(db, &schema, WorkCategory).await?;
    create_table(db, &schema, Project).await?;
    create_table(db, &schema, WorkItem).await?;
    create_table(db, &schema, ItemCost).await?;

    debug!("Schema ready");
    Ok(())
}
