//! Orders: the documents tracked through the status lifecycle.
//!
//! - `status`: the advisory lifecycle enum
//! - `document`: the order itself plus its atomic on-disk form
//! - `record`: the secondary-index projection
//! - `id`: order id derivation

pub mod document;
pub mod id;
pub mod record;
pub mod status;

pub use document::{ORDER_FILE_EXTENSION, OrderDocument};
pub use id::new_order_id;
pub use record::{HostRecord, OrderRecord};
pub use status::OrderStatus;
