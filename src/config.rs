//! Object mapper configuration.

use std::sync::Arc;

use jsbridge_registry::TypeRegistry;

/// Global the loader function is installed under.
pub const DEFAULT_LOADER_NAME: &str = "loadCppType";

/// Global holding the mapper's marker and script helpers.
pub const DEFAULT_HIDDEN_KEY: &str = "__jsbridge";

/// Where a mapper looks up type descriptors.
#[derive(Debug, Clone, Default)]
pub enum RegistrySource {
    /// [`TypeRegistry::global`]
    #[default]
    Global,
    /// A registry owned by the embedder
    Private(Arc<TypeRegistry>),
}

impl RegistrySource {
    /// The registry this source points at.
    pub fn get(&self) -> &TypeRegistry {
        match self {
            RegistrySource::Global => TypeRegistry::global(),
            RegistrySource::Private(registry) => registry,
        }
    }
}

/// Settings fixed when an [`ObjectMapper`](crate::ObjectMapper) is created.
///
/// ```
/// use jsbridge::MapperConfig;
///
/// let config = MapperConfig::default()
///     .with_loader_name("requireNative")
///     .with_catch_panics(false);
/// assert_eq!(config.loader_name(), "requireNative");
/// assert!(!config.catch_panics());
/// ```
#[derive(Debug, Clone)]
pub struct MapperConfig {
    /// Global the loader is installed under
    loader_name: String,
    /// Global marking a bound context
    hidden_key: String,
    /// Convert native panics into script errors
    catch_panics: bool,
    /// Where descriptors come from
    registry: RegistrySource,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            loader_name: DEFAULT_LOADER_NAME.to_owned(),
            hidden_key: DEFAULT_HIDDEN_KEY.to_owned(),
            catch_panics: true,
            registry: RegistrySource::Global,
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the script global that loads native types.
    pub fn with_loader_name(mut self, name: impl Into<String>) -> Self {
        self.loader_name = name.into();
        self
    }

    /// Name of the hidden global marking a bound context.
    pub fn with_hidden_key(mut self, key: impl Into<String>) -> Self {
        self.hidden_key = key.into();
        self
    }

    /// Turn native panics into `NativeError` script exceptions (the default)
    /// instead of letting them unwind through the engine.
    pub fn with_catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }

    /// Resolve types from `registry` instead of the process-wide one.
    pub fn with_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = RegistrySource::Private(registry);
        self
    }

    pub fn loader_name(&self) -> &str {
        &self.loader_name
    }

    pub fn hidden_key(&self) -> &str {
        &self.hidden_key
    }

    pub fn catch_panics(&self) -> bool {
        self.catch_panics
    }

    pub fn registry(&self) -> &RegistrySource {
        &self.registry
    }
}
