use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity issued by the rendezvous service.
///
/// Opaque to this crate: it is only compared, displayed, and handed back
/// to the broker when dialing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random identity, as a rendezvous service would issue.
    pub fn generate() -> Self {
        Self(chronoconnect_common::new_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(PeerId::generate(), PeerId::generate());
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = PeerId::from("abc-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc-123\"");
        assert_eq!(id.to_string(), "abc-123");
    }
}
