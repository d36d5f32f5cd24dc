//! Structured audit events.
//!
//! Public entry points report what they did as one [`AuditEvent`] each,
//! serialized to JSON and logged under the `pdf_forge::audit` target:
//! `info` on success, `warn` on failure. Routing and retention are left to
//! whatever logger the application installs.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Log target of audit events.
pub const AUDIT_TARGET: &str = "pdf_forge::audit";

/// One completed (or failed) operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Operation name, e.g. `"rotate"`
    pub operation: String,
    /// File the operation read or wrote, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<PathBuf>,
    /// Whether the operation succeeded
    pub success: bool,
    /// Error message of a failed operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Page count after the operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
}

impl AuditEvent {
    /// Event for `operation` from its result.
    pub fn from_result<T>(operation: &str, result: &Result<T>) -> Self {
        Self {
            operation: operation.to_string(),
            target: None,
            success: result.is_ok(),
            error: result.as_ref().err().map(ToString::to_string),
            pages: None,
        }
    }

    /// Attach the file the operation worked on.
    pub fn with_target(mut self, target: impl AsRef<Path>) -> Self {
        self.target = Some(target.as_ref().to_path_buf());
        self
    }

    /// Attach the resulting page count.
    pub fn with_pages(mut self, pages: usize) -> Self {
        self.pages = Some(pages);
        self
    }

    /// JSON form of the event.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"operation\":{:?},\"serialization_error\":{:?}}}", self.operation, e.to_string())
        })
    }

    /// Log the event.
    pub fn emit(&self) {
        if self.success {
            log::info!(target: AUDIT_TARGET, "{}", self.to_json());
        } else {
            log::warn!(target: AUDIT_TARGET, "{}", self.to_json());
        }
    }
}

/// Emit an event for `result` and hand the result back.
pub(crate) fn record<T>(operation: &str, result: Result<T>, pages: Option<usize>) -> Result<T> {
    let mut event = AuditEvent::from_result(operation, &result);
    event.pages = pages;
    event.emit();
    result
}

/// Like [`record`], with the file the operation worked on.
pub(crate) fn record_file<T>(
    operation: &str,
    target: &Path,
    result: Result<T>,
    pages: Option<usize>,
) -> Result<T> {
    let mut event = AuditEvent::from_result(operation, &result).with_target(target);
    event.pages = pages;
    event.emit();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_success_event_json() {
        let event = AuditEvent::from_result("rotate", &Ok::<_, Error>(()))
            .with_target("in.pdf")
            .with_pages(3);
        assert_eq!(
            event.to_json(),
            r#"{"operation":"rotate","target":"in.pdf","success":true,"pages":3}"#
        );
    }

    #[test]
    fn test_failure_event_carries_error() {
        let result: Result<()> = Err(Error::invalid_argument("remove", "no valid pages"));
        let event = AuditEvent::from_result("remove", &result);
        assert!(!event.success);
        assert_eq!(
            event.error.as_deref(),
            Some("Invalid argument to remove: no valid pages")
        );
        let back: AuditEvent = serde_json::from_str(&event.to_json()).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_record_passes_result_through() {
        assert_eq!(record("noop", Ok::<_, Error>(5), None).unwrap(), 5);
        assert!(record::<()>("noop", Err(Error::InvalidXref), Some(0)).is_err());
    }
}
