//! workorder: order documents with atomic persistence, and a job
//! completion primitive.

pub mod config;
pub mod error;
pub mod order;
pub mod spool;
pub mod store;
pub mod worker;
