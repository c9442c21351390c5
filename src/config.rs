use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::SqlPluginDbError;
use crate::types::Value;

/// Pragmas applied right after a connection opens unless overridden.
pub const DEFAULT_PRAGMAS: &[&str] = &[
    // Don't wait for the OS to flush writes to disk.
    "PRAGMA synchronous = OFF",
    "PRAGMA journal_mode = WAL",
    "PRAGMA temp_store = MEMORY",
    "PRAGMA foreign_keys = ON",
];

pub const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 32;

/// Options for opening a data source through a backend plugin.
///
/// Deserializable so the same options can come from a JSON document or from
/// the keyed-options argument of the generic `Database` constructor; fields
/// left out keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OpenOptions {
    pub path: String,
    pub create_if_missing: bool,
    pub read_only: bool,
    pub statement_cache_capacity: usize,
    pub translate_placeholders: bool,
    pub pragmas: Vec<String>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            create_if_missing: true,
            read_only: false,
            statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
            translate_placeholders: false,
            pragmas: DEFAULT_PRAGMAS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl OpenOptions {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn builder(path: impl Into<String>) -> OpenOptionsBuilder {
        OpenOptionsBuilder::new(path)
    }

    /// Parse options from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the document is malformed, names an unknown
    /// field, or fails [`OpenOptions::validate`].
    pub fn from_json(json: &str) -> Result<Self, SqlPluginDbError> {
        let opts: OpenOptions = serde_json::from_str(json)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Overlay keyed values onto `path`'s defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a key is unknown or a value has the wrong
    /// shape for its field.
    pub fn from_values(
        path: impl Into<String>,
        overrides: &BTreeMap<String, Value>,
    ) -> Result<Self, SqlPluginDbError> {
        let mut doc = serde_json::to_value(OpenOptions::new(path))?;
        if let serde_json::Value::Object(fields) = &mut doc {
            for (key, value) in overrides {
                let json = match (key.as_str(), value) {
                    // Flags arrive as 0/1 integers.
                    ("create_if_missing" | "read_only" | "translate_placeholders", Value::Int(i)) => {
                        serde_json::Value::Bool(*i != 0)
                    }
                    // A single text value is a semicolon separated pragma list.
                    ("pragmas", Value::Text(text)) => serde_json::Value::Array(
                        text.split(';')
                            .map(str::trim)
                            .filter(|p| !p.is_empty())
                            .map(|p| serde_json::Value::String(p.to_string()))
                            .collect(),
                    ),
                    _ => serde_json::to_value(value)?,
                };
                fields.insert(key.clone(), json);
            }
        }
        let opts: OpenOptions = serde_json::from_value(doc)?;
        opts.validate()?;
        Ok(opts)
    }

    /// Check invariants that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` for an empty path or a zero cache capacity.
    pub fn validate(&self) -> Result<(), SqlPluginDbError> {
        if self.path.trim().is_empty() {
            return Err(SqlPluginDbError::ConfigError(
                "data source path must not be empty".into(),
            ));
        }
        if self.statement_cache_capacity == 0 {
            return Err(SqlPluginDbError::ConfigError(
                "statement_cache_capacity must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`OpenOptions`].
#[derive(Debug, Clone)]
pub struct OpenOptionsBuilder {
    opts: OpenOptions,
}

impl OpenOptionsBuilder {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            opts: OpenOptions::new(path),
        }
    }

    #[must_use]
    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.opts.create_if_missing = create;
        self
    }

    #[must_use]
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.opts.read_only = read_only;
        self
    }

    #[must_use]
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.opts.statement_cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn translation(mut self, translate_placeholders: bool) -> Self {
        self.opts.translate_placeholders = translate_placeholders;
        self
    }

    /// Replace the pragma list.
    #[must_use]
    pub fn pragmas<I, S>(mut self, pragmas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.opts.pragmas = pragmas.into_iter().map(Into::into).collect();
        self
    }

    /// Append one pragma to the current list.
    #[must_use]
    pub fn pragma(mut self, pragma: impl Into<String>) -> Self {
        self.opts.pragmas.push(pragma.into());
        self
    }

    #[must_use]
    pub fn finish(self) -> OpenOptions {
        self.opts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_fills_defaults() {
        let opts = OpenOptions::from_json(r#"{"path": "a.db", "read_only": true}"#).unwrap();
        assert_eq!(opts.path, "a.db");
        assert!(opts.read_only);
        assert_eq!(opts.statement_cache_capacity, DEFAULT_STATEMENT_CACHE_CAPACITY);
        assert_eq!(opts.pragmas.len(), DEFAULT_PRAGMAS.len());
    }

    #[test]
    fn unknown_fields_and_zero_capacity_are_rejected() {
        assert!(matches!(
            OpenOptions::from_json(r#"{"path": "a.db", "bogus": 1}"#),
            Err(SqlPluginDbError::ConfigError(_))
        ));
        assert!(matches!(
            OpenOptions::from_json(r#"{"path": "a.db", "statement_cache_capacity": 0}"#),
            Err(SqlPluginDbError::ConfigError(_))
        ));
    }

    #[test]
    fn keyed_values_overlay_defaults() {
        let mut overrides = BTreeMap::new();
        overrides.insert("read_only".to_string(), Value::Int(1));
        overrides.insert(
            "pragmas".to_string(),
            Value::Text("PRAGMA foreign_keys = ON; ".into()),
        );
        overrides.insert("statement_cache_capacity".to_string(), Value::Int(4));
        let opts = OpenOptions::from_values("x.db", &overrides).unwrap();
        assert!(opts.read_only);
        assert_eq!(opts.pragmas, vec!["PRAGMA foreign_keys = ON".to_string()]);
        assert_eq!(opts.statement_cache_capacity, 4);
    }

    #[test]
    fn builder_sets_fields() {
        let opts = OpenOptions::builder("b.db")
            .translation(true)
            .pragmas(Vec::<String>::new())
            .pragma("PRAGMA busy_timeout = 5000")
            .statement_cache_capacity(8)
            .finish();
        assert!(opts.translate_placeholders);
        assert_eq!(opts.pragmas, vec!["PRAGMA busy_timeout = 5000".to_string()]);
        assert_eq!(opts.statement_cache_capacity, 8);
    }
}
