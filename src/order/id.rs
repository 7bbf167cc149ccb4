//! Order identifier generation.

use chrono::Utc;
use uuid::Uuid;

/// Derive a fresh, unique order id from a service name.
///
/// The id is `<service>-<utc timestamp>-<random>`, with characters that are
/// unsafe in file names replaced by `_`. The service part is empty-safe.
pub fn new_order_id(service: &str) -> String {
    let slug: String = service
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stamp = Utc::now().format("%Y%m%d%H%M%S");
    let random = Uuid::new_v4().simple().to_string();
    format!("{slug}-{stamp}-{}", &random[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_starts_with_service() {
        let id = new_order_id("dns-update");
        assert!(id.starts_with("dns-update-"));
    }

    #[test]
    fn ids_are_unique() {
        let a = new_order_id("svc");
        let b = new_order_id("svc");
        assert_ne!(a, b);
    }

    #[test]
    fn unsafe_characters_replaced() {
        let id = new_order_id(" a/b c.d ");
        assert!(id.starts_with("a_b_c_d-"));
        assert!(!id.contains('/'));
    }
}
