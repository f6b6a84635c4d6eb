//! auxbot-common/src/traits/reporter.rs
//!
//! The error-reporting sink. Every caught failure is handed here with a tag
//! set naming where it happened; reporting is fire-and-forget and must never
//! sit on the success path.

use crate::Error;
use tracing::error;

/// Structured tags attached to a reported failure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorTags {
    pub component: &'static str,
    pub operation: &'static str,
    pub tenant: Option<String>,
    pub extra: Vec<(&'static str, String)>,
}

impl ErrorTags {
    pub fn new(component: &'static str, operation: &'static str) -> Self {
        Self {
            component,
            operation,
            tenant: None,
            extra: Vec::new(),
        }
    }

    pub fn tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = Some(tenant.into());
        self
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.extra.push((key, value.into()));
        self
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &Error, tags: &ErrorTags);
}

/// Default sink: one `error!` event per failure.
#[derive(Debug, Clone, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, err: &Error, tags: &ErrorTags) {
        let extra = tags
            .extra
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        error!(
            component = tags.component,
            operation = tags.operation,
            tenant = tags.tenant.as_deref().unwrap_or("-"),
            extra = %extra,
            "Error captured: {}",
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_builder_collects_extras() {
        let tags = ErrorTags::new("player", "fetch")
            .tenant("guild-1")
            .with("url", "https://example.com/a");
        assert_eq!(tags.component, "player");
        assert_eq!(tags.tenant.as_deref(), Some("guild-1"));
        assert_eq!(tags.extra, vec![("url", "https://example.com/a".to_string())]);
    }

    #[test]
    fn mock_reporter_sees_every_report() {
        let mut reporter = MockErrorReporter::new();
        reporter
            .expect_report()
            .withf(|e, t| matches!(e, Error::Fetch(_)) && t.operation == "fetch")
            .times(1)
            .return_const(());
        reporter.report(&Error::Fetch("boom".into()), &ErrorTags::new("player", "fetch"));
    }
}
