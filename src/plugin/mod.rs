//! Backend plugin contract.
//!
//! A plugin is a [`BackendModule`] installed in a
//! [`PluginRegistry`](registry::PluginRegistry) under a symbolic name. The rest
//! of the crate talks to engines only through [`BackendModule`] and
//! [`NativeConnection`]; no concrete backend type leaks past this module.

mod registry;

pub use registry::{Plugin, PluginFactory, PluginRegistry};

use std::collections::BTreeSet;

use crate::config::OpenOptions;
use crate::error::SqlPluginDbError;
use crate::results::RowBatch;
use crate::translation::PlaceholderStyle;
use crate::types::Value;

/// Interface version a module must report to be loadable.
pub const PLUGIN_ABI_VERSION: u32 = 1;

/// Operations a backend can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Open,
    Compile,
    Execute,
    Fetch,
    Close,
    /// Multi-statement scripts; optional.
    Script,
}

/// Capabilities every module must export.
pub const REQUIRED_CAPABILITIES: &[Capability] = &[
    Capability::Open,
    Capability::Compile,
    Capability::Execute,
    Capability::Fetch,
    Capability::Close,
];

/// Name of the connection type every module constructs.
pub const DATABASE_TYPE: &str = "Database";

/// What a module declares about itself when loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginManifest {
    pub name: String,
    pub abi_version: u32,
    pub capabilities: BTreeSet<Capability>,
    /// Type names accepted by [`BackendModule::open`].
    pub constructors: Vec<String>,
    pub placeholder_style: PlaceholderStyle,
}

impl PluginManifest {
    /// Manifest at the current ABI with the required capabilities and a
    /// single `Database` constructor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            abi_version: PLUGIN_ABI_VERSION,
            capabilities: REQUIRED_CAPABILITIES.iter().copied().collect(),
            constructors: vec![DATABASE_TYPE.to_string()],
            placeholder_style: PlaceholderStyle::default(),
        }
    }

    #[must_use]
    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    #[must_use]
    pub fn with_placeholder_style(mut self, style: PlaceholderStyle) -> Self {
        self.placeholder_style = style;
        self
    }

    #[must_use]
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    #[must_use]
    pub fn constructs(&self, type_name: &str) -> bool {
        self.constructors.iter().any(|c| c == type_name)
    }

    /// Check this manifest against what the host requires of a module
    /// registered as `requested`.
    ///
    /// # Errors
    ///
    /// Returns `PluginLoadError` on an ABI, name, or capability mismatch.
    pub fn check(&self, requested: &str) -> Result<(), SqlPluginDbError> {
        if self.abi_version != PLUGIN_ABI_VERSION {
            return Err(SqlPluginDbError::load_error(
                requested,
                format!(
                    "ABI version {} (host expects {PLUGIN_ABI_VERSION})",
                    self.abi_version
                ),
            ));
        }
        if self.name != requested {
            return Err(SqlPluginDbError::load_error(
                requested,
                format!("module identifies itself as `{}`", self.name),
            ));
        }
        let missing: Vec<String> = REQUIRED_CAPABILITIES
            .iter()
            .filter(|cap| !self.capabilities.contains(cap))
            .map(|cap| format!("{cap:?}"))
            .collect();
        if !missing.is_empty() {
            return Err(SqlPluginDbError::load_error(
                requested,
                format!("missing capabilities: {}", missing.join(", ")),
            ));
        }
        if !self.constructs(DATABASE_TYPE) {
            return Err(SqlPluginDbError::load_error(
                requested,
                format!("no `{DATABASE_TYPE}` constructor exported"),
            ));
        }
        Ok(())
    }
}

/// Shape of a compiled statement as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatementShape {
    /// One entry per declared parameter, in index order: `Some(name)` for
    /// named or numbered markers, `None` for anonymous `?`.
    pub parameters: Vec<Option<String>>,
    /// Declared output columns (empty for statements returning no rows).
    pub columns: Vec<String>,
}

impl StatementShape {
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// A loaded backend module.
pub trait BackendModule: Send + Sync {
    fn manifest(&self) -> PluginManifest;

    /// Construct a connection of `type_name` (one of the manifest's
    /// constructors) for the data source in `options`.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError` if the source cannot be opened.
    fn open(
        &self,
        type_name: &str,
        options: &OpenOptions,
    ) -> Result<Box<dyn NativeConnection>, SqlPluginDbError>;

    /// Release module-wide resources; called once when the last
    /// [`Plugin`] reference goes away.
    fn unload(&self) {}
}

/// A native connection owned by exactly one database handle.
///
/// Calls are serialized by the handle, so implementations need not be
/// thread-safe beyond `Send`.
pub trait NativeConnection: Send {
    /// Compile `sql` (or reuse the backend's compiled form) and report its
    /// shape.
    ///
    /// # Errors
    ///
    /// Returns `CompileError` for malformed text.
    fn compile(&mut self, sql: &str) -> Result<StatementShape, SqlPluginDbError>;

    /// Run a compiled statement with `params` already in marker order and
    /// materialize its result.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` or `ParameterTypeError` as reported by the engine.
    fn run(&mut self, sql: &str, params: &[Value]) -> Result<RowBatch, SqlPluginDbError>;

    /// Drop any compiled form kept for `sql`.
    fn evict(&mut self, _sql: &str) {}

    /// `true` if the schema changed since the previous call. The backend
    /// drops its own compiled forms before answering; the handle then clears
    /// its shape cache.
    fn schema_changed(&mut self) -> bool {
        false
    }

    /// Run a multi-statement script; only called when the manifest declares
    /// [`Capability::Script`].
    ///
    /// # Errors
    ///
    /// Returns the first failing statement's error.
    fn execute_script(&mut self, _sql: &str) -> Result<(), SqlPluginDbError> {
        Err(SqlPluginDbError::unbound(DATABASE_TYPE, "executescript"))
    }

    /// Release the native connection. Called at most once.
    ///
    /// # Errors
    ///
    /// Returns `BackendError` if the engine refuses to close.
    fn close(&mut self) -> Result<(), SqlPluginDbError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_manifest_passes_its_own_check() {
        assert!(PluginManifest::new("x").check("x").is_ok());
    }

    #[test]
    fn abi_name_and_capability_mismatches_fail_to_load() {
        let mut stale = PluginManifest::new("x");
        stale.abi_version = PLUGIN_ABI_VERSION + 1;
        assert!(matches!(
            stale.check("x"),
            Err(SqlPluginDbError::PluginLoadError { .. })
        ));

        assert!(matches!(
            PluginManifest::new("y").check("x"),
            Err(SqlPluginDbError::PluginLoadError { .. })
        ));

        let mut partial = PluginManifest::new("x");
        partial.capabilities.remove(&Capability::Fetch);
        let err = partial.check("x").unwrap_err();
        assert!(err.to_string().contains("Fetch"));
    }
}
