//! Process-lifetime resource cache with two independent namespaces.
//!
//! Geometry and materials each live in their own [`ResourceStore`], keyed by
//! `(library, id)`. A key is unique within its namespace: `add` fails on an
//! occupied key, `get` and `remove` fail on a missing one. Scene nodes hold
//! keys, never the resources themselves.
//!
//! The registry does not track which nodes still reference a resource;
//! removing one that is in use is the caller's responsibility.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{AssetError, AssetResult};
use crate::material::Material;
use crate::mesh::Mesh;

/// The two resource namespaces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Namespace {
    Geometry,
    Material,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Geometry => f.write_str("geometry"),
            Namespace::Material => f.write_str("material"),
        }
    }
}

/// Renderer-side object (buffers, texture or program ids) owned by a resource.
///
/// `release` is called synchronously from `remove`, so a renderer whose
/// context is bound to one thread must drive removal from that thread.
pub trait GpuHandle: fmt::Debug + Send + Sync {
    fn release(&mut self);
}

/// A value that can live in a [`ResourceStore`].
pub trait Resource {
    const NAMESPACE: Namespace;

    /// Free everything the resource owns outside of Rust memory.
    fn teardown(&mut self);
}

/// `library.id` key of a registered resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    pub library: String,
    pub id: String,
}

impl ResourceKey {
    pub fn new(library: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.library, self.id)
    }
}

/// Error for a reference string without a `.` separator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a library.id reference")]
pub struct ParseKeyError(pub String);

impl FromStr for ResourceKey {
    type Err = ParseKeyError;

    /// Split at the first `.`; the id may itself contain dots.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (library, id) = s.split_once('.').ok_or_else(|| ParseKeyError(s.to_string()))?;
        if library.is_empty() {
            return Err(ParseKeyError(s.to_string()));
        }
        Ok(Self::new(library, id))
    }
}

/// One namespace of the registry.
pub struct ResourceStore<R: Resource> {
    entries: BTreeMap<ResourceKey, R>,
}

impl<R: Resource> ResourceStore<R> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    fn duplicate(key: &ResourceKey) -> AssetError {
        AssetError::DuplicateResourceId {
            namespace: R::NAMESPACE,
            library: key.library.clone(),
            id: key.id.clone(),
        }
    }

    fn unresolved(key: &ResourceKey) -> AssetError {
        AssetError::UnresolvedReference {
            namespace: R::NAMESPACE,
            library: key.library.clone(),
            id: key.id.clone(),
        }
    }

    /// Store a resource under `library.id` and return a reference to it.
    pub fn add(&mut self, library: &str, id: &str, resource: R) -> AssetResult<&mut R> {
        self.add_key(ResourceKey::new(library, id), resource)
    }

    pub fn add_key(&mut self, key: ResourceKey, resource: R) -> AssetResult<&mut R> {
        use std::collections::btree_map::Entry;

        match self.entries.entry(key) {
            Entry::Occupied(entry) => Err(Self::duplicate(entry.key())),
            Entry::Vacant(entry) => {
                log::debug!("Registered {} '{}'", R::NAMESPACE, entry.key());
                Ok(entry.insert(resource))
            }
        }
    }

    /// Insert every entry or none of them.
    ///
    /// All keys are checked against the store and against each other before
    /// anything is inserted, so a failed batch leaves the store untouched.
    pub fn add_batch(&mut self, batch: Vec<(ResourceKey, R)>) -> AssetResult<()> {
        self.check_batch(&batch)?;
        for (key, resource) in batch {
            log::debug!("Registered {} '{}'", R::NAMESPACE, key);
            self.entries.insert(key, resource);
        }
        Ok(())
    }

    /// Fail with `DuplicateResourceId` if `add_batch` would reject `batch`.
    pub fn check_batch(&self, batch: &[(ResourceKey, R)]) -> AssetResult<()> {
        let mut seen = BTreeSet::new();
        for (key, _) in batch {
            if self.entries.contains_key(key) || !seen.insert(key) {
                return Err(Self::duplicate(key));
            }
        }
        Ok(())
    }

    pub fn get(&self, library: &str, id: &str) -> AssetResult<&R> {
        self.get_key(&ResourceKey::new(library, id))
    }

    pub fn get_key(&self, key: &ResourceKey) -> AssetResult<&R> {
        self.entries.get(key).ok_or_else(|| Self::unresolved(key))
    }

    pub fn get_mut(&mut self, library: &str, id: &str) -> AssetResult<&mut R> {
        let key = ResourceKey::new(library, id);
        match self.entries.get_mut(&key) {
            Some(resource) => Ok(resource),
            None => Err(Self::unresolved(&key)),
        }
    }

    pub fn has(&self, library: &str, id: &str) -> bool {
        self.has_key(&ResourceKey::new(library, id))
    }

    pub fn has_key(&self, key: &ResourceKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Tear the resource down, then evict it.
    pub fn remove(&mut self, library: &str, id: &str) -> AssetResult<()> {
        let key = ResourceKey::new(library, id);
        let mut resource = self.entries.remove(&key).ok_or_else(|| Self::unresolved(&key))?;
        resource.teardown();
        log::debug!("Removed {} '{}'", R::NAMESPACE, key);
        Ok(())
    }

    /// Tear down and evict every resource in this namespace.
    pub fn remove_all(&mut self) {
        let count = self.entries.len();
        for resource in self.entries.values_mut() {
            resource.teardown();
        }
        self.entries.clear();
        log::debug!("Removed all {} {} resources", count, R::NAMESPACE);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &R)> {
        self.entries.iter()
    }
}

impl<R: Resource> Default for ResourceStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Geometry and material caches for one loading session.
///
/// Construct one per application session and pass it by reference to the
/// scene assembler; tests build a fresh one each.
#[derive(Default)]
pub struct Registry {
    geometry: ResourceStore<Mesh>,
    materials: ResourceStore<Material>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geometry(&self) -> &ResourceStore<Mesh> {
        &self.geometry
    }

    pub fn geometry_mut(&mut self) -> &mut ResourceStore<Mesh> {
        &mut self.geometry
    }

    pub fn materials(&self) -> &ResourceStore<Material> {
        &self.materials
    }

    pub fn materials_mut(&mut self) -> &mut ResourceStore<Material> {
        &mut self.materials
    }

    /// Tear down everything in both namespaces.
    pub fn clear(&mut self) {
        self.geometry.remove_all();
        self.materials.remove_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Dummy {
        value: u32,
        torn_down: Arc<AtomicUsize>,
    }

    impl Dummy {
        fn new(value: u32) -> Self {
            Self {
                value,
                torn_down: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Resource for Dummy {
        const NAMESPACE: Namespace = Namespace::Geometry;

        fn teardown(&mut self) {
            self.torn_down.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_add_then_duplicate_fails() {
        let mut store = ResourceStore::new();
        store.add("lib", "X", Dummy::new(1)).unwrap();

        let err = store.add("lib", "X", Dummy::new(2)).unwrap_err();
        assert!(matches!(err, AssetError::DuplicateResourceId { .. }));
        assert_eq!(store.get("lib", "X").unwrap().value, 1);

        // Same id in another library is a different key
        store.add("other", "X", Dummy::new(3)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_remove_tears_down_and_evicts() {
        let mut store = ResourceStore::new();
        let dummy = Dummy::new(1);
        let counter = dummy.torn_down.clone();
        store.add("lib", "X", dummy).unwrap();

        store.remove("lib", "X").unwrap();
        assert!(!store.has("lib", "X"));
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let err = store.remove("lib", "X").unwrap_err();
        assert!(matches!(err, AssetError::UnresolvedReference { .. }));
    }

    #[test]
    fn test_get_missing_is_unresolved() {
        let mut store: ResourceStore<Dummy> = ResourceStore::new();
        assert!(matches!(
            store.get("lib", "nope"),
            Err(AssetError::UnresolvedReference { .. })
        ));
        assert!(store.get_mut("lib", "nope").is_err());
    }

    #[test]
    fn test_remove_all() {
        let mut store = ResourceStore::new();
        let a = Dummy::new(1);
        let b = Dummy::new(2);
        let (ca, cb) = (a.torn_down.clone(), b.torn_down.clone());
        store.add("lib", "a", a).unwrap();
        store.add("lib", "b", b).unwrap();

        store.remove_all();
        assert!(store.is_empty());
        assert_eq!(ca.load(Ordering::SeqCst), 1);
        assert_eq!(cb.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_add_batch_is_all_or_nothing() {
        let mut store = ResourceStore::new();
        store.add("lib", "taken", Dummy::new(0)).unwrap();

        let batch = vec![
            (ResourceKey::new("lib", "a"), Dummy::new(1)),
            (ResourceKey::new("lib", "taken"), Dummy::new(2)),
        ];
        assert!(store.add_batch(batch).is_err());
        assert!(!store.has("lib", "a"));
        assert_eq!(store.len(), 1);

        let batch = vec![
            (ResourceKey::new("lib", "a"), Dummy::new(1)),
            (ResourceKey::new("lib", "a"), Dummy::new(2)),
        ];
        assert!(store.add_batch(batch).is_err());
        assert_eq!(store.len(), 1);

        let batch = vec![
            (ResourceKey::new("lib", "a"), Dummy::new(1)),
            (ResourceKey::new("lib", "b"), Dummy::new(2)),
        ];
        store.add_batch(batch).unwrap();
        let keys: Vec<String> = store.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["lib.a", "lib.b", "lib.taken"]);
    }

    #[test]
    fn test_key_parsing() {
        let key: ResourceKey = "level.Box01".parse().unwrap();
        assert_eq!(key, ResourceKey::new("level", "Box01"));

        let key: ResourceKey = "mats.wood.dark".parse().unwrap();
        assert_eq!(key.library, "mats");
        assert_eq!(key.id, "wood.dark");

        let key: ResourceKey = "mats.".parse().unwrap();
        assert!(key.id.is_empty());

        assert!("nodot".parse::<ResourceKey>().is_err());
        assert!(".x".parse::<ResourceKey>().is_err());
    }

    #[test]
    fn test_namespaces_are_independent() {
        let registry = Registry::new();
        assert!(registry.geometry().is_empty());
        assert!(registry.materials().is_empty());
        assert!(!registry.materials().has("lib", "X"));
    }
}
