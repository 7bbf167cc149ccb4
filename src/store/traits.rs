//! `OrderIndex` trait: the secondary index over order documents.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::order::{OrderRecord, OrderStatus};

/// Backend-agnostic, query-oriented projection of orders.
///
/// The index is never authoritative. Callers persist the document first and
/// then reflect it here.
#[async_trait]
pub trait OrderIndex: Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    /// Insert or replace an order row and its host rows.
    async fn upsert_order(&self, record: &OrderRecord) -> Result<(), DatabaseError>;

    /// Get an order by id.
    async fn get_order(&self, id: &str) -> Result<Option<OrderRecord>, DatabaseError>;

    /// All orders for a service, ordered by id.
    async fn orders_by_service(&self, service: &str) -> Result<Vec<OrderRecord>, DatabaseError>;

    /// All orders in a status, ordered by id.
    async fn orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<OrderRecord>, DatabaseError>;

    /// Remove an order and its hosts. Returns whether a row existed.
    async fn delete_order(&self, id: &str) -> Result<bool, DatabaseError>;
}
