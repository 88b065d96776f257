//! Registry of host file-handle adapters.
//!
//! Hosts hand over lazily loaded file objects whose concrete type this crate
//! cannot know. Each recognised type is registered once with a function that
//! extracts the backing file path; the normalizer then decodes that path.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

type PathExtractor = Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<PathBuf> + Send + Sync>;

/// Maps concrete handle types to path-extraction functions.
#[derive(Clone)]
pub struct HandleAdapterRegistry {
    adapters: HashMap<TypeId, (&'static str, PathExtractor)>,
}

impl HandleAdapterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    /// Register an adapter for handles of type `T`, replacing any previous one.
    pub fn register<T, F>(&mut self, extract: F) -> &mut Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Option<PathBuf> + Send + Sync + 'static,
    {
        let extractor: PathExtractor =
            Arc::new(move |handle: &(dyn Any + Send + Sync)| {
                handle.downcast_ref::<T>().and_then(&extract)
            });
        self.adapters
            .insert(TypeId::of::<T>(), (std::any::type_name::<T>(), extractor));
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_adapter<T, F>(mut self, extract: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> Option<PathBuf> + Send + Sync + 'static,
    {
        self.register::<T, F>(extract);
        self
    }

    /// Extract the file path behind `handle`, if its type is registered.
    pub fn resolve(&self, handle: &(dyn Any + Send + Sync)) -> Option<PathBuf> {
        let (_, extract) = self.adapters.get(&(*handle).type_id())?;
        extract(handle)
    }

    pub fn is_registered<T: Any>(&self) -> bool {
        self.adapters.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl Default for HandleAdapterRegistry {
    /// Recognises plain `PathBuf` and `String` handles.
    fn default() -> Self {
        Self::new()
            .with_adapter::<PathBuf, _>(|path| Some(path.clone()))
            .with_adapter::<String, _>(|path| (!path.is_empty()).then(|| PathBuf::from(path)))
    }
}

impl fmt::Debug for HandleAdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.adapters.values().map(|(name, _)| *name).collect();
        f.debug_struct("HandleAdapterRegistry")
            .field("adapters", &names)
            .finish()
    }
}
