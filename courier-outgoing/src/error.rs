//! Error types for courier-outgoing.

use std::sync::Arc;

use thiserror::Error;

use courier_core::{Message, RejectReason};

/// Why a registered send did not resolve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct PromiseRejection {
    pub temp_guid: Option<String>,
    pub reason: RejectReason,
    /// The store row that caused the rejection, if any.
    pub message: Option<Arc<Message>>,
}

impl PromiseRejection {
    pub fn is_timeout(&self) -> bool {
        self.reason.is_timeout()
    }
}
