//! Index projection of an order document.

use serde::{Deserialize, Serialize};

use crate::order::document::OrderDocument;
use crate::order::status::OrderStatus;

/// A host row in the secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HostRecord {
    pub order_id: String,
    pub address: String,
    pub name: String,
}

/// An order row in the secondary index, together with its hosts.
///
/// Never authoritative: the spooled document is the source of truth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub service: String,
    pub status: OrderStatus,
    /// The full serialized document.
    pub xmldoc: String,
    pub hosts: Vec<HostRecord>,
}

impl OrderRecord {
    /// Rebuild the document from the stored blob.
    pub fn document(&self) -> Result<OrderDocument, crate::error::OrderError> {
        OrderDocument::from_xml(self.xmldoc.as_bytes())
    }
}

impl From<&OrderDocument> for OrderRecord {
    fn from(doc: &OrderDocument) -> Self {
        // Documents carry only addresses, so the address doubles as the name.
        let hosts = doc
            .hosts()
            .into_iter()
            .map(|address| HostRecord {
                order_id: doc.id().to_string(),
                address: address.to_string(),
                name: address.to_string(),
            })
            .collect();
        Self {
            id: doc.id().to_string(),
            service: doc.service().to_string(),
            status: doc.status(),
            xmldoc: doc.to_xml_string(),
            hosts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_copies_fields() {
        let mut doc = OrderDocument::new(" backup ");
        doc.add_host("10.1.1.1");
        doc.add_host("10.1.1.2");
        doc.set_status(OrderStatus::Placed);

        let record = OrderRecord::from(&doc);
        assert_eq!(record.id, doc.id());
        assert_eq!(record.service, "backup");
        assert_eq!(record.status, OrderStatus::Placed);
        assert_eq!(record.hosts.len(), 2);
        assert_eq!(record.hosts[1].address, "10.1.1.2");
        assert_eq!(record.hosts[1].order_id, doc.id());
        assert_eq!(record.xmldoc, doc.to_xml_string());
        assert_eq!(record.document().unwrap(), doc);
    }
}
