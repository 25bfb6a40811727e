use serde::{Deserialize, Serialize};

use super::LockError;

/// Configuration for a [`LockManager`](super::LockManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockManagerConfig {
    /// Name of the root context returned by `LockManager::database_context`.
    pub database_name: String,
    /// Root contexts whose children are created readonly (index and
    /// temporary-table namespaces, where finer-grained locks are disallowed).
    pub read_only_roots: Vec<String>,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            database_name: "database".to_string(),
            read_only_roots: Vec::new(),
        }
    }
}

impl LockManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name of the database root context.
    pub fn with_database_name(mut self, name: impl Into<String>) -> Self {
        self.database_name = name.into();
        self
    }

    /// Disable child locking beneath the root context `name`.
    pub fn with_read_only_root(mut self, name: impl Into<String>) -> Self {
        self.read_only_roots.push(name.into());
        self
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, LockError> {
        serde_json::from_str(json)
            .map_err(|e| LockError::InvalidConfig(e.to_string()))
    }

    pub(crate) fn disables_children_of(&self, root: &str) -> bool {
        self.read_only_roots.iter().any(|name| name == root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LockManagerConfig::default();
        assert_eq!(config.database_name, "database");
        assert!(config.read_only_roots.is_empty());
    }

    #[test]
    fn builder_methods() {
        let config = LockManagerConfig::new()
            .with_database_name("db")
            .with_read_only_root("indices");
        assert_eq!(config.database_name, "db");
        assert!(config.disables_children_of("indices"));
        assert!(!config.disables_children_of("db"));
    }

    #[test]
    fn from_json_fills_missing_fields() {
        let config = LockManagerConfig::from_json(r#"{"read_only_roots":["tmp"]}"#).unwrap();
        assert_eq!(config.database_name, "database");
        assert_eq!(config.read_only_roots, vec!["tmp".to_string()]);
        assert!(LockManagerConfig::from_json("not json").is_err());
    }
}
