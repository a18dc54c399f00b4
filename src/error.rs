//! Error kinds produced by the NEF core.
//!
//! Every lifecycle operation returns `Result<_, NefError>`. Validation and
//! not-found errors are raised before any southbound call, so they never leave
//! partial state behind.

use crate::model::ProblemDetails;
use crate::registry::PfdReports;
use std::fmt;
use thiserror::Error;

/// Resource that a lookup failed to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Af,
    Subscription,
    Transaction,
    Application,
}

impl Resource {
    pub fn not_found_title(&self) -> &'static str {
        match self {
            Resource::Af => "AF entry not present",
            Resource::Subscription => "Subscription Not Found",
            Resource::Transaction => "PFD transaction Not Found",
            Resource::Application => "Application in PFD transaction Not Found",
        }
    }
}

/// Configured cap that a creation would exceed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capacity {
    AfCount,
    SubscriptionsPerAf,
    TransactionsPerAf,
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Capacity::AfCount => "MAX AF exceeded",
            Capacity::SubscriptionsPerAf => "MAX subscriptions per AF exceeded",
            Capacity::TransactionsPerAf => "MAX PFD transactions per AF exceeded",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Error)]
pub enum NefError {
    /// Malformed or missing mandatory fields
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{}", .0.not_found_title())]
    NotFound(Resource),

    #[error("{0}")]
    CapacityExceeded(Capacity),

    /// Every application of a PFD operation failed southbound
    #[error("ALL PFD Apps Failed")]
    AllApplicationsFailed(PfdReports),

    /// Transport error or non-2xx answer from the UDR/PCF
    #[error("southbound failure: {message}")]
    Southbound {
        status: Option<u16>,
        problem: Option<ProblemDetails>,
        message: String,
    },
}

impl NefError {
    pub fn validation(msg: impl Into<String>) -> Self {
        NefError::Validation(msg.into())
    }

    /// Wrap a transport level error from a southbound client
    pub fn transport(err: anyhow::Error) -> Self {
        NefError::Southbound {
            status: None,
            problem: None,
            message: format!("{:#}", err),
        }
    }

    /// HTTP status the northbound response should carry
    pub fn status_code(&self) -> u16 {
        match self {
            NefError::Validation(_) => 400,
            NefError::NotFound(_) => 404,
            NefError::CapacityExceeded(_) => 400,
            NefError::AllApplicationsFailed(_) => 500,
            NefError::Southbound { status, .. } => match status {
                Some(code) if (400..600).contains(code) => *code,
                _ => 500,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(NefError::validation("x").status_code(), 400);
        assert_eq!(NefError::NotFound(Resource::Af).status_code(), 404);
        assert_eq!(
            NefError::CapacityExceeded(Capacity::AfCount).status_code(),
            400
        );
        assert_eq!(
            NefError::AllApplicationsFailed(PfdReports::default()).status_code(),
            500
        );
    }

    #[test]
    fn test_southbound_status_passthrough() {
        let err = NefError::Southbound {
            status: Some(503),
            problem: None,
            message: "UDR unavailable".to_string(),
        };
        assert_eq!(err.status_code(), 503);

        // A 2xx or missing status is not a usable error code
        let err = NefError::Southbound {
            status: Some(204),
            problem: None,
            message: String::new(),
        };
        assert_eq!(err.status_code(), 500);
        assert_eq!(NefError::transport(anyhow::anyhow!("refused")).status_code(), 500);
    }

    #[test]
    fn test_not_found_messages_are_distinguishable() {
        assert_ne!(
            NefError::NotFound(Resource::Transaction).to_string(),
            NefError::NotFound(Resource::Application).to_string()
        );
    }
}
