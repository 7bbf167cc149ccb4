//! libSQL backend: async `OrderIndex` implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;

use async_trait::async_trait;
use libsql::{Connection, Database as LibSqlDatabase, params};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::order::{HostRecord, OrderRecord, OrderStatus};
use crate::store::migrations;
use crate::store::traits::OrderIndex;

/// libSQL index backend.
///
/// One connection serves every operation. It sits behind an async mutex so
/// that a transaction started by one task never interleaves with statements
/// from another.
pub struct LibSqlBackend {
    // Owns the database the connection was opened on.
    _db: LibSqlDatabase,
    conn: Mutex<Connection>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        info!(path = %path.display(), "Order index opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.init_schema().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            _db: db,
            conn: Mutex::new(conn),
        })
    }
}

async fn hosts_for(conn: &Connection, order_id: &str) -> Result<Vec<HostRecord>, DatabaseError> {
    let mut rows = conn
        .query(
            "SELECT order_id, address, name FROM hosts WHERE order_id = ?1 ORDER BY rowid",
            params![order_id],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("hosts_for: {e}")))?;

    let mut hosts = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("hosts_for: {e}")))?
    {
        hosts.push(HostRecord {
            order_id: row_text(&row, 0)?,
            address: row_text(&row, 1)?,
            name: row_text(&row, 2)?,
        });
    }
    Ok(hosts)
}

async fn query_orders(
    conn: &Connection,
    op: &str,
    sql: &str,
    value: String,
) -> Result<Vec<OrderRecord>, DatabaseError> {
    let mut rows = conn
        .query(sql, params![value])
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

    let mut orders = Vec::new();
    while let Some(row) = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?
    {
        orders.push(row_to_order(&row)?);
    }
    for order in &mut orders {
        order.hosts = hosts_for(conn, &order.id).await?;
    }
    Ok(orders)
}

// ── Helper functions ────────────────────────────────────────────────

fn row_text(row: &libsql::Row, idx: i32) -> Result<String, DatabaseError> {
    row.get::<String>(idx)
        .map_err(|e| DatabaseError::Query(format!("column {idx}: {e}")))
}

/// Map a row to an OrderRecord without hosts.
///
/// Column order matches ORDER_COLUMNS: 0:id, 1:service, 2:status, 3:xmldoc
fn row_to_order(row: &libsql::Row) -> Result<OrderRecord, DatabaseError> {
    let status_str = row_text(row, 2)?;
    let status: OrderStatus = status_str
        .parse()
        .map_err(|e| DatabaseError::Serialization(format!("{e}")))?;
    Ok(OrderRecord {
        id: row_text(row, 0)?,
        service: row_text(row, 1)?,
        status,
        xmldoc: row_text(row, 3)?,
        hosts: Vec::new(),
    })
}

// ── Trait implementation ────────────────────────────────────────────

const ORDER_COLUMNS: &str = "id, service, status, xmldoc";

#[async_trait]
impl OrderIndex for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().await;
        migrations::run_migrations(&conn).await
    }

    async fn upsert_order(&self, record: &OrderRecord) -> Result<(), DatabaseError> {
        let conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_order begin: {e}")))?;

        tx.execute(
            "INSERT INTO orders (id, service, status, xmldoc) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                service = excluded.service,
                status = excluded.status,
                xmldoc = excluded.xmldoc",
            params![
                record.id.as_str(),
                record.service.as_str(),
                record.status.as_str(),
                record.xmldoc.as_str(),
            ],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_order: {e}")))?;

        tx.execute(
            "DELETE FROM hosts WHERE order_id = ?1",
            params![record.id.as_str()],
        )
        .await
        .map_err(|e| DatabaseError::Query(format!("upsert_order hosts: {e}")))?;

        // Duplicate hosts collapse onto the composite key.
        for host in &record.hosts {
            tx.execute(
                "INSERT OR IGNORE INTO hosts (order_id, address, name) VALUES (?1, ?2, ?3)",
                params![record.id.as_str(), host.address.as_str(), host.name.as_str()],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_order hosts: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("upsert_order commit: {e}")))?;

        debug!(order_id = %record.id, status = %record.status, hosts = record.hosts.len(), "Order indexed");
        Ok(())
    }

    async fn get_order(&self, id: &str) -> Result<Option<OrderRecord>, DatabaseError> {
        let conn = self.conn.lock().await;
        let mut rows = conn
            .query(
                &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                params![id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_order: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_order: {e}")))?;
        match row {
            Some(row) => {
                let mut order = row_to_order(&row)?;
                order.hosts = hosts_for(&conn, &order.id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }

    async fn orders_by_service(&self, service: &str) -> Result<Vec<OrderRecord>, DatabaseError> {
        let conn = self.conn.lock().await;
        query_orders(
            &conn,
            "orders_by_service",
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE service = ?1 ORDER BY id"),
            service.to_string(),
        )
        .await
    }

    async fn orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<OrderRecord>, DatabaseError> {
        let conn = self.conn.lock().await;
        query_orders(
            &conn,
            "orders_by_status",
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE status = ?1 ORDER BY id"),
            status.as_str().to_string(),
        )
        .await
    }

    async fn delete_order(&self, id: &str) -> Result<bool, DatabaseError> {
        let conn = self.conn.lock().await;
        let tx = conn
            .transaction()
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_order begin: {e}")))?;
        tx.execute("DELETE FROM hosts WHERE order_id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_order hosts: {e}")))?;
        let deleted = tx
            .execute("DELETE FROM orders WHERE id = ?1", params![id])
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_order: {e}")))?;
        tx.commit()
            .await
            .map_err(|e| DatabaseError::Query(format!("delete_order commit: {e}")))?;

        debug!(order_id = %id, deleted, "Order removed from index");
        Ok(deleted > 0)
    }
}
