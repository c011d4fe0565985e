//! SGE error normalization.

use thiserror::Error;

/// Vendor code for "the requested service is already active over the
/// requested period". The subscribe handler absorbs it.
pub const ALREADY_ACTIVE: &str = "SGT570";

/// A failure surfaced by the distributor bus, normalized from SOAP
/// faults and raw HTTP errors alike.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{}", self.render())]
pub struct SgeError {
    pub message: String,
    pub code: Option<String>,
}

impl SgeError {
    pub fn new(message: impl Into<String>, code: Option<String>) -> Self {
        SgeError {
            message: message.into(),
            code,
        }
    }

    /// Transport-level failure with no vendor code.
    pub fn transport(message: impl Into<String>) -> Self {
        SgeError::new(message, None)
    }

    /// Raw HTTP failure, e.g. `503 Service Unavailable`.
    pub fn http(status: u16, reason: &str) -> Self {
        SgeError::new(reason.to_string(), Some(status.to_string()))
    }

    pub fn is_already_active(&self) -> bool {
        self.code.as_deref() == Some(ALREADY_ACTIVE)
    }

    fn render(&self) -> String {
        match &self.code {
            Some(code) => format!("{code}: {}", self.message),
            None => self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_with_and_without_code() {
        let with_code = SgeError::new("Service Unavailable", Some("503".to_string()));
        assert_eq!(with_code.to_string(), "503: Service Unavailable");

        let without = SgeError::transport("connection reset");
        assert_eq!(without.to_string(), "connection reset");
    }

    #[test]
    fn already_active_detection() {
        let err = SgeError::new(
            "Le service demandé est déjà actif sur la période demandée.",
            Some("SGT570".to_string()),
        );
        assert!(err.is_already_active());
        assert!(!SgeError::transport("boom").is_already_active());
    }
}
