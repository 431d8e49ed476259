//! Pass type registry.
//!
//! Maps a pass type name to a factory that validates a [`ConfigRecord`] and
//! constructs the pass. Pass types are linked statically; registering a type
//! is the equivalent of loading a plugin.

use std::collections::BTreeMap;
use std::fmt;

use passgraph_core::config::{ConfigError, ConfigRecord};

use crate::error::BuildError;
use crate::graph::RenderPass;

/// Factory building a pass from its configuration record.
pub type PassFactory =
    Box<dyn Fn(&ConfigRecord) -> Result<Box<dyn RenderPass>, ConfigError> + Send + Sync>;

/// Named pass factories.
///
/// # Example
///
/// ```
/// use passgraph_core::config::ConfigRecord;
/// use passgraph_graphics::{BuildError, PassRegistry};
///
/// let registry = PassRegistry::with_builtin_passes();
/// assert!(registry.contains("ToneMapper"));
///
/// let pass = registry.create("ToneMapper", &ConfigRecord::new())?;
/// assert_eq!(pass.type_name(), "ToneMapper");
///
/// assert!(matches!(
///     registry.create("GBufferRaster", &ConfigRecord::new()),
///     Err(BuildError::UnknownPassType(_))
/// ));
/// # Ok::<(), BuildError>(())
/// ```
#[derive(Default)]
pub struct PassRegistry {
    factories: BTreeMap<String, PassFactory>,
}

impl PassRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in pass type.
    pub fn with_builtin_passes() -> Self {
        let mut registry = Self::new();
        crate::passes::register_builtin_passes(&mut registry);
        registry
    }

    /// Register a factory under `type_name`, replacing any previous one.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn(&ConfigRecord) -> Result<Box<dyn RenderPass>, ConfigError> + Send + Sync + 'static,
    {
        let type_name = type_name.into();
        if self
            .factories
            .insert(type_name.clone(), Box::new(factory))
            .is_some()
        {
            log::warn!("PassRegistry: replacing factory for '{}'", type_name);
        }
    }

    /// Construct a pass of a registered type.
    pub fn create(
        &self,
        type_name: &str,
        config: &ConfigRecord,
    ) -> Result<Box<dyn RenderPass>, BuildError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| BuildError::UnknownPassType(type_name.to_string()))?;
        Ok(factory(config)?)
    }

    /// Check whether a type is registered.
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for PassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassRegistry")
            .field("types", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

static_assertions::assert_impl_all!(PassRegistry: Send, Sync);
