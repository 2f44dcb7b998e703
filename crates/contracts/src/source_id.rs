//! SourceId - cheap-to-clone source name
//!
//! Every Record carries the name of the source that produced it, so the
//! name is cloned once per record. `Arc<str>` keeps that O(1).

use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Name of the source a record came from
///
/// Serializes as a plain string and hashes like `str`, so maps keyed by
/// `SourceId` can be queried with `&str`.
///
/// ```
/// use contracts::SourceId;
///
/// let id: SourceId = "orders_api".into();
/// assert_eq!(id.clone(), id);
/// assert_eq!(id, "orders_api");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(Arc<str>);

impl SourceId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for SourceId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for SourceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(name: &str) -> Self {
        Self(Arc::from(name))
    }
}

impl From<String> for SourceId {
    fn from(name: String) -> Self {
        Self(Arc::from(name))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({:?})", &*self.0)
    }
}

impl PartialEq<str> for SourceId {
    fn eq(&self, other: &str) -> bool {
        &*self.0 == other
    }
}

impl PartialEq<&str> for SourceId {
    fn eq(&self, other: &&str) -> bool {
        &*self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_clone_shares_storage() {
        let a: SourceId = "iot_feed".into();
        let b = a.clone();
        assert_eq!(a.as_str().as_ptr(), b.as_str().as_ptr());
    }

    #[test]
    fn test_per_source_counts_by_str() {
        let mut counts: HashMap<SourceId, u32> = HashMap::new();
        for name in ["api", "db", "api"] {
            *counts.entry(name.into()).or_default() += 1;
        }
        assert_eq!(counts.get("api"), Some(&2));
        assert_eq!(counts.get("file"), None);
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id = SourceId::from(String::from("db"));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"db\"");
        let parsed: SourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }
}
