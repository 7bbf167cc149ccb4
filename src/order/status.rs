//! Order status lifecycle.
//!
//! The lifecycle is advisory: any status may follow any other. Only
//! membership in the enum is enforced.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::OrderError;

/// Status of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    /// Freshly created, not yet seen by a daemon.
    #[default]
    New,
    /// Accepted for processing.
    Accepted,
    /// Placed into the spool.
    Placed,
    /// Waiting for a job slot.
    Queued,
    /// A job is working on it.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Error,
}

impl OrderStatus {
    /// Every legal status, in lifecycle order.
    pub const ALL: [OrderStatus; 7] = [
        Self::New,
        Self::Accepted,
        Self::Placed,
        Self::Queued,
        Self::InProgress,
        Self::Completed,
        Self::Error,
    ];

    /// The literal used in order documents and the index.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Accepted => "accepted",
            Self::Placed => "placed",
            Self::Queued => "queued",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| OrderError::InvalidStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_all_literals() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "done".parse::<OrderStatus>().unwrap_err();
        assert!(matches!(err, OrderError::InvalidStatus(ref s) if s == "done"));
        assert!("In-Progress".parse::<OrderStatus>().is_err());
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn default_is_new() {
        assert_eq!(OrderStatus::default(), OrderStatus::New);
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Error.is_terminal());
        assert!(!OrderStatus::InProgress.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
    }

    #[test]
    fn status_display() {
        assert_eq!(OrderStatus::InProgress.to_string(), "in-progress");
        assert_eq!(OrderStatus::Queued.to_string(), "queued");
    }

    #[test]
    fn status_serde_roundtrip() {
        let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        let parsed: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, OrderStatus::InProgress);
    }
}
