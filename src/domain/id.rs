use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::error::ReconError;

/// Gateway-assigned transaction identifier (PayApp `mul_no`). The
/// idempotency key for the whole flow; a notification without one cannot
/// be deduplicated and is rejected as malformed at the edge.
#[derive(Debug, Clone, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

impl TransactionId {
    pub fn new(id: impl Into<String>) -> Result<Self, ReconError> {
        let id = id.into().trim().to_string();
        if id.is_empty() {
            return Err(ReconError::MalformedNotification(
                "missing transaction id (mul_no)".into(),
            ));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(TransactionId::new("  T1 ").unwrap().as_str(), "T1");
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert!(TransactionId::new("").is_err());
        assert!(TransactionId::new("   ").is_err());
    }
}
