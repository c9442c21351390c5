use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tracing::{debug, info};

use super::{BackendModule, PluginManifest};
use crate::error::SqlPluginDbError;

/// Creates a module instance; invoked once per live load.
pub type PluginFactory =
    Arc<dyn Fn() -> Result<Box<dyn BackendModule>, SqlPluginDbError> + Send + Sync>;

/// Resolves symbolic names to loaded backend modules.
///
/// Modules are installed with [`PluginRegistry::register`] and loaded on
/// demand by [`PluginRegistry::load`]. A name has at most one live load:
/// repeated loads share it and bump its reference count. The module is
/// unloaded when the last [`Plugin`] for it is dropped; a later `load` loads
/// it afresh.
///
/// The registry is an ordinary value with no process-wide state. Cloning it
/// shares the same tables, and every [`Plugin`] keeps those tables alive.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    installed: RwLock<HashMap<String, PluginFactory>>,
    loaded: Mutex<HashMap<String, LoadedEntry>>,
}

struct LoadedEntry {
    module: Arc<LoadedModule>,
    refs: usize,
}

pub(crate) struct LoadedModule {
    manifest: PluginManifest,
    backend: Box<dyn BackendModule>,
}

impl RegistryInner {
    // A panic inside a factory must not wedge the registry for everyone else.
    fn loaded(&self) -> MutexGuard<'_, HashMap<String, LoadedEntry>> {
        self.loaded
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn retain(&self, name: &str) {
        if let Some(entry) = self.loaded().get_mut(name) {
            entry.refs += 1;
        }
    }

    fn release(&self, name: &str) {
        let unloaded = {
            let mut loaded = self.loaded();
            match loaded.get_mut(name) {
                Some(entry) if entry.refs > 1 => {
                    entry.refs -= 1;
                    debug!(plugin = %name, refs = entry.refs, "plugin released");
                    None
                }
                Some(_) => loaded.remove(name),
                None => None,
            }
        };
        if let Some(entry) = unloaded {
            entry.module.backend.unload();
            info!(plugin = %name, "plugin unloaded");
        }
    }
}

impl PluginRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in modules installed.
    #[must_use]
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        #[cfg(feature = "sqlite")]
        registry.register(crate::sqlite::PLUGIN_NAME, crate::sqlite::factory());
        registry
    }

    /// Install a module factory under `name`, replacing any previous one.
    /// A module already loaded under `name` stays loaded until released.
    pub fn register(&self, name: impl Into<String>, factory: PluginFactory) {
        let name = name.into();
        debug!(plugin = %name, "plugin installed");
        self.inner
            .installed
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(name, factory);
    }

    /// Install a module from a plain constructor function.
    pub fn register_fn<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Result<Box<dyn BackendModule>, SqlPluginDbError> + Send + Sync + 'static,
    {
        self.register(name, Arc::new(factory));
    }

    /// Names of every installed module, sorted.
    #[must_use]
    pub fn installed(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .installed
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Load the module registered as `name`, or share its live load.
    ///
    /// Concurrent calls for the same name are serialized; only the first
    /// runs the factory.
    ///
    /// # Errors
    ///
    /// Returns `PluginNotFound` if nothing is installed under `name`, and
    /// `PluginLoadError` if the factory fails or the module's manifest does
    /// not satisfy the host's ABI and capability requirements.
    pub fn load(&self, name: &str) -> Result<Plugin, SqlPluginDbError> {
        let mut loaded = self.inner.loaded();
        if let Some(entry) = loaded.get_mut(name) {
            entry.refs += 1;
            debug!(plugin = %name, refs = entry.refs, "plugin reused");
            return Ok(Plugin {
                module: Arc::clone(&entry.module),
                registry: Arc::clone(&self.inner),
            });
        }

        let factory = self
            .inner
            .installed
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| SqlPluginDbError::PluginNotFound(name.to_string()))?;

        let backend = factory().map_err(|err| match err {
            SqlPluginDbError::PluginLoadError { .. } => err,
            other => SqlPluginDbError::load_error(name, other.to_string()),
        })?;
        let manifest = backend.manifest();
        if let Err(err) = manifest.check(name) {
            backend.unload();
            return Err(err);
        }

        let module = Arc::new(LoadedModule { manifest, backend });
        loaded.insert(
            name.to_string(),
            LoadedEntry {
                module: Arc::clone(&module),
                refs: 1,
            },
        );
        info!(plugin = %name, "plugin loaded");
        Ok(Plugin {
            module,
            registry: Arc::clone(&self.inner),
        })
    }

    /// Live references to `name`; 0 when not loaded.
    #[must_use]
    pub fn ref_count(&self, name: &str) -> usize {
        self.inner.loaded().get(name).map_or(0, |entry| entry.refs)
    }

    #[must_use]
    pub fn is_loaded(&self, name: &str) -> bool {
        self.inner.loaded().contains_key(name)
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("installed", &self.installed())
            .field("loaded", &self.inner.loaded().len())
            .finish()
    }
}

/// A reference to a loaded backend module.
///
/// Cloning takes another reference; dropping releases one.
pub struct Plugin {
    module: Arc<LoadedModule>,
    registry: Arc<RegistryInner>,
}

impl Plugin {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.module.manifest.name
    }

    #[must_use]
    pub fn manifest(&self) -> &PluginManifest {
        &self.module.manifest
    }

    /// `true` when both references point at the same native load.
    #[must_use]
    pub fn same_instance(a: &Plugin, b: &Plugin) -> bool {
        Arc::ptr_eq(&a.module, &b.module)
    }

    pub(crate) fn backend(&self) -> &dyn BackendModule {
        self.module.backend.as_ref()
    }
}

impl Clone for Plugin {
    fn clone(&self) -> Self {
        self.registry.retain(self.name());
        Self {
            module: Arc::clone(&self.module),
            registry: Arc::clone(&self.registry),
        }
    }
}

impl Drop for Plugin {
    fn drop(&mut self) {
        let name = self.module.manifest.name.clone();
        self.registry.release(&name);
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name())
            .field("abi_version", &self.module.manifest.abi_version)
            .finish_non_exhaustive()
    }
}
