//! Shared value types.

use secrecy::{ExposeSecret, SecretString};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Read-only mapping from credential name (e.g. `OPENAI_API_KEY`) to secret.
///
/// Clones share the same underlying map.
#[derive(Clone, Default)]
pub struct CredentialMapping {
    inner: Arc<HashMap<String, SecretString>>,
}

impl CredentialMapping {
    /// Create an empty mapping
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a mapping from key/value pairs.
    ///
    /// Presence is what counts: a key set to the empty string is still present.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let inner = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), SecretString::new(v.into())))
            .collect();
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Return a new mapping with `other` layered on top of `self`
    #[must_use]
    pub fn merged(&self, other: &Self) -> Self {
        let mut inner: HashMap<String, SecretString> = (*self.inner).clone();
        for (k, v) in other.inner.iter() {
            inner.insert(k.clone(), v.clone());
        }
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Whether `key` is present
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    /// Whether every key in `keys` is present
    #[must_use]
    pub fn contains_all(&self, keys: &[&str]) -> bool {
        keys.iter().all(|k| self.contains(k))
    }

    /// Get the secret for `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&SecretString> {
        self.inner.get(key)
    }

    /// Get the exposed value for `key`
    #[must_use]
    pub fn expose(&self, key: &str) -> Option<&str> {
        self.inner.get(key).map(|s| s.expose_secret().as_str())
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the mapping is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl fmt::Debug for CredentialMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.inner.keys().collect();
        keys.sort();
        f.debug_struct("CredentialMapping")
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_counts_as_present() {
        let creds = CredentialMapping::from_pairs([("A", "1"), ("B", "")]);
        assert!(creds.contains("A"));
        assert!(creds.contains("B"));
        assert!(creds.contains_all(&["A", "B"]));
        assert_eq!(creds.expose("B"), Some(""));
        assert_eq!(creds.len(), 2);
    }

    #[test]
    fn test_contains_all() {
        let creds = CredentialMapping::from_pairs([("A", "1"), ("B", "2")]);
        assert!(creds.contains_all(&["A", "B"]));
        assert!(!creds.contains_all(&["A", "C"]));
        assert!(creds.contains_all(&[]));
    }

    #[test]
    fn test_merged_overrides() {
        let base = CredentialMapping::from_pairs([("A", "1"), ("B", "2")]);
        let top = CredentialMapping::from_pairs([("B", "3")]);
        let merged = base.merged(&top);
        assert_eq!(merged.expose("A"), Some("1"));
        assert_eq!(merged.expose("B"), Some("3"));
    }

    #[test]
    fn test_debug_hides_values() {
        let creds = CredentialMapping::from_pairs([("OPENAI_API_KEY", "sk-secret")]);
        let debug = format!("{creds:?}");
        assert!(debug.contains("OPENAI_API_KEY"));
        assert!(!debug.contains("sk-secret"));
    }
}
