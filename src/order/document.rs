//! Order documents and their durable XML form.
//!
//! On disk an order looks like:
//!
//! ```xml
//! <xml><order id="dns-update-…" service="dns-update" status="queued"><host address="10.0.0.1"/></order></xml>
//! ```
//!
//! The `id` attribute is an addition to the bare `service`/`status`/`host`
//! layout so that reloading restores the same id. Documents without it still
//! load: [`OrderDocument::load`] takes the id from the file stem and
//! [`OrderDocument::from_xml`] derives a fresh one.
//!
//! Writes go through a dot-prefixed temporary file in the target's directory
//! followed by a rename, so a reader of the target path sees either the old
//! document or the new one in full.

use std::io::Write;
use std::path::Path;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use serde::Serialize;
use tracing::debug;

use crate::error::OrderError;
use crate::order::id::new_order_id;
use crate::order::status::OrderStatus;

/// File extension of persisted order documents.
pub const ORDER_FILE_EXTENSION: &str = "xml";

/// One order: its service, status and assigned hosts.
///
/// Not internally synchronized. Callers that share a document between
/// threads must serialize access themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDocument {
    id: String,
    service: String,
    status: OrderStatus,
    hosts: Vec<String>,
}

impl OrderDocument {
    /// Create a new order for `service` with a freshly derived id.
    pub fn new(service: impl Into<String>) -> Self {
        let service = service.into();
        Self {
            id: new_order_id(&service),
            service,
            status: OrderStatus::New,
            hosts: Vec::new(),
        }
    }

    /// Parse an order from its serialized form.
    ///
    /// A missing `id` attribute yields a freshly derived id.
    pub fn from_xml(xml: &[u8]) -> Result<Self, OrderError> {
        Self::parse(xml, None)
    }

    /// Load an order document from a file.
    ///
    /// A missing `id` attribute falls back to the file stem.
    pub fn load(path: &Path) -> Result<Self, OrderError> {
        let bytes = std::fs::read(path)?;
        let stem = path.file_stem().and_then(|s| s.to_str());
        Self::parse(&bytes, stem)
    }

    fn parse(xml: &[u8], fallback_id: Option<&str>) -> Result<Self, OrderError> {
        let text = std::str::from_utf8(xml)
            .map_err(|e| OrderError::Malformed(format!("document is not UTF-8: {e}")))?;
        let mut reader = Reader::from_str(text);

        let mut order: Option<(Option<String>, Option<String>, Option<String>)> = None;
        let mut hosts = Vec::new();
        // Number of currently open elements; the root sits at depth 0.
        let mut depth = 0usize;
        let mut in_order = false;

        loop {
            let (element, empty) = match reader.read_event() {
                Ok(Event::Start(e)) => (e, false),
                Ok(Event::Empty(e)) => (e, true),
                Ok(Event::End(_)) => {
                    depth = depth.saturating_sub(1);
                    if depth == 1 {
                        in_order = false;
                    }
                    continue;
                }
                Ok(Event::Eof) => break,
                Ok(_) => continue,
                Err(e) => {
                    return Err(OrderError::Malformed(format!(
                        "at byte {}: {e}",
                        reader.buffer_position()
                    )));
                }
            };

            match (depth, element.name().as_ref()) {
                (1, b"order") if order.is_none() => {
                    order = Some((
                        attribute(&element, b"id")?,
                        attribute(&element, b"service")?,
                        attribute(&element, b"status")?,
                    ));
                    in_order = !empty;
                }
                (2, b"host") if in_order => {
                    let address = attribute(&element, b"address")?.ok_or_else(|| {
                        OrderError::Malformed("host element has no address attribute".into())
                    })?;
                    hosts.push(address);
                }
                _ => {}
            }

            if !empty {
                depth += 1;
            }
        }

        if depth != 0 {
            return Err(OrderError::Malformed("unexpected end of document".into()));
        }

        let (id, service, status) =
            order.ok_or_else(|| OrderError::Malformed("no order element".into()))?;
        let service = service.ok_or_else(|| {
            OrderError::Malformed("order element has no service attribute".into())
        })?;
        let status = match status.as_deref() {
            None | Some("") => OrderStatus::New,
            Some(s) => s
                .parse()
                .map_err(|_| OrderError::Malformed(format!("unknown status {s:?}")))?,
        };
        let id = match id.filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => fallback_id
                .map(str::to_string)
                .unwrap_or_else(|| new_order_id(&service)),
        };

        Ok(Self {
            id,
            service,
            status,
            hosts,
        })
    }

    /// Serialize the order. [`OrderDocument::from_xml`] is its exact inverse.
    pub fn to_xml(&self) -> Vec<u8> {
        self.to_xml_string().into_bytes()
    }

    /// [`OrderDocument::to_xml`] as text.
    pub fn to_xml_string(&self) -> String {
        let mut xml = format!(
            r#"<xml><order id="{}" service="{}" status="{}">"#,
            escape(self.id.as_str()),
            escape(self.service.as_str()),
            self.status,
        );
        for host in &self.hosts {
            xml.push_str(&format!(r#"<host address="{}"/>"#, escape(host.as_str())));
        }
        xml.push_str("</order></xml>");
        xml
    }

    /// Durably write the order to `path`, replacing any previous content
    /// in a single rename.
    pub fn persist(&self, path: &Path) -> Result<(), OrderError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let failed = |source: std::io::Error| OrderError::Persist {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".tmp")
            .tempfile_in(dir)
            .map_err(failed)?;
        tmp.write_all(self.to_xml_string().as_bytes()).map_err(failed)?;
        tmp.as_file().sync_all().map_err(failed)?;
        // On failure the temporary file is removed when the error is dropped.
        tmp.persist(path).map_err(|e| failed(e.error))?;

        // Make the rename itself durable. Best-effort.
        #[cfg(unix)]
        if let Ok(dir) = std::fs::File::open(dir) {
            let _ = dir.sync_all();
        }

        debug!(order_id = %self.id, path = %path.display(), status = %self.status, "Order persisted");
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// File name of the persisted document: `<id>.xml`.
    pub fn filename(&self) -> String {
        format!("{}.{ORDER_FILE_EXTENSION}", self.id)
    }

    /// The service name, trimmed.
    pub fn service(&self) -> &str {
        self.service.trim()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Set the status. Any status may follow any other.
    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
    }

    /// Set the status from its literal. Unknown literals leave the status
    /// unchanged.
    pub fn set_status_str(&mut self, status: &str) -> Result<(), OrderError> {
        self.status = status.parse()?;
        Ok(())
    }

    /// Append a host. Duplicates are kept.
    pub fn add_host(&mut self, address: impl Into<String>) {
        self.hosts.push(address.into());
    }

    /// Host addresses, trimmed, in insertion order.
    pub fn hosts(&self) -> Vec<&str> {
        self.hosts.iter().map(|h| h.trim()).collect()
    }

    /// Whether the order names a service.
    pub fn is_valid(&self) -> bool {
        !self.service().is_empty()
    }
}

impl std::fmt::Display for OrderDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Order({}, {}, {})", self.id, self.service(), self.status)
    }
}

/// Read and unescape a single attribute of an element.
fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, OrderError> {
    for attr in element.attributes() {
        let attr = attr.map_err(|e| OrderError::Malformed(format!("bad attribute: {e}")))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|e| OrderError::Malformed(format!("bad attribute value: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}
