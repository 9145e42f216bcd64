//! Stable identifiers for resources and purchases.
//!
//! Identifiers are interned strings assigned at construction time. The
//! persistence surface keys every saved value by one of these.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::sync::Arc;

/// Interned string identifier for a resource (an in-game currency).
///
/// Uses `Arc<str>` for cheap cloning and fast comparison. Multiple
/// `ResourceId` instances with the same content share the allocation.
///
/// # Examples
///
/// ```rust
/// use tickmill::ResourceId;
///
/// let gold = ResourceId::new("gold");
/// let gold2: ResourceId = "gold".into();
/// assert_eq!(gold, gold2);
/// ```
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceId(Arc<str>);

impl ResourceId {
    /// Create a new `ResourceId` from a string slice.
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for ResourceId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ResourceId::from(s))
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Interned string identifier for a purchasable entity (repeatable purchase
/// or single-buy upgrade). Same interning scheme as [`ResourceId`].
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct PurchaseId(Arc<str>);

impl PurchaseId {
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Serialize for PurchaseId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.as_ref().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PurchaseId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(PurchaseId::from(s))
    }
}

impl From<&str> for PurchaseId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PurchaseId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl std::fmt::Display for PurchaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_id_interning() {
        let a = ResourceId::new("gold");
        let b = ResourceId::new("gold");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "gold");
    }

    #[test]
    fn test_id_serde_as_string() {
        let id = ResourceId::new("mana");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"mana\"");
        let back: ResourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn test_purchase_id_from_string() {
        let id: PurchaseId = String::from("miner").into();
        assert_eq!(id.as_str(), "miner");
        assert_eq!(id.to_string(), "miner");
    }
}
