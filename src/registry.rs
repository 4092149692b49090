//! Process-wide directory of named providers.
//!
//! The registry is an ordered list whose first entry is the default
//! provider. Each backend appears at most once; identity is the backend
//! object itself, not its name. All operations take one internal lock, so
//! concurrent register, unregister and find calls are serialised.
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = Registry::new();
//! registry.register(Arc::new(UnixVfs::new()), true);
//! registry.register(Arc::new(MemVfs::new()), false);
//!
//! let provider = registry.provider(Some("memdb"))?;
//! assert_eq!(registry.find(None).unwrap().name(), "unix");
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{Provider, Vfs, VfsError};

struct Entry {
    name: String,
    vfs: Arc<dyn Vfs>,
}

impl Entry {
    fn is(&self, vfs: &Arc<dyn Vfs>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.vfs), Arc::as_ptr(vfs))
    }
}

/// Ordered, thread-safe set of registered backends.
#[derive(Default)]
pub struct Registry {
    entries: Mutex<Vec<Entry>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // The list stays consistent across a panicking holder: every mutation
    // is a single Vec call.
    fn entries(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find a backend by name, or the default when `name` is `None`.
    ///
    /// Names compare exactly. Returns the first match in list order.
    pub fn find(&self, name: Option<&str>) -> Option<Arc<dyn Vfs>> {
        let entries = self.entries();
        let found = match name {
            None => entries.first(),
            Some(name) => entries.iter().find(|e| e.name == name),
        };
        found.map(|e| Arc::clone(&e.vfs))
    }

    /// Like [`find`](Registry::find), wrapped in a [`Provider`].
    ///
    /// # Errors
    ///
    /// [`VfsError::NotFound`] if nothing matches; the name is empty when the
    /// default was requested from an empty registry.
    pub fn provider(&self, name: Option<&str>) -> Result<Provider, VfsError> {
        self.find(name)
            .map(Provider::new)
            .ok_or_else(|| VfsError::NotFound {
                name: name.unwrap_or_default().to_owned(),
            })
    }

    /// Register `vfs`, moving it to the front when `make_default` is set.
    ///
    /// A backend already present is first removed, so it never appears
    /// twice. Without `make_default` it goes second, or first if the
    /// registry is empty.
    pub fn register(&self, vfs: Arc<dyn Vfs>, make_default: bool) {
        let name = vfs.name().to_owned();
        let mut entries = self.entries();
        entries.retain(|e| !e.is(&vfs));
        let at = if make_default || entries.is_empty() {
            0
        } else {
            1
        };
        tracing::debug!(vfs = %name, position = at, "registered");
        entries.insert(at, Entry { name, vfs });
    }

    /// Remove `vfs`. Returns `false` if it was not registered.
    ///
    /// Removing the default promotes the next entry.
    pub fn unregister(&self, vfs: &Arc<dyn Vfs>) -> bool {
        let mut entries = self.entries();
        match entries.iter().position(|e| e.is(vfs)) {
            Some(at) => {
                let entry = entries.remove(at);
                tracing::debug!(vfs = %entry.name, "unregistered");
                true
            }
            None => false,
        }
    }

    /// Registered names in list order, default first.
    pub fn names(&self) -> Vec<String> {
        self.entries().iter().map(|e| e.name.clone()).collect()
    }

    /// Number of registered backends.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccessCheck, OpenFlags, VfsFile};
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    struct Named(&'static str);

    impl Vfs for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn file_state_size(&self) -> usize {
            0
        }
        fn max_pathname(&self) -> usize {
            256
        }
        fn open(
            &self,
            path: Option<&Path>,
            _: OpenFlags,
        ) -> Result<(Box<dyn VfsFile>, OpenFlags), VfsError> {
            Err(VfsError::CantOpen {
                path: path.map(Path::to_path_buf).unwrap_or_default(),
            })
        }
        fn delete(&self, _: &Path, _: bool) -> Result<(), VfsError> {
            Ok(())
        }
        fn access(&self, _: &Path, _: AccessCheck) -> Result<bool, VfsError> {
            Ok(false)
        }
        fn full_pathname(&self, path: &Path, out: &mut PathBuf) -> Result<(), VfsError> {
            out.push(path);
            Ok(())
        }
        fn randomness(&self, buf: &mut [u8]) -> usize {
            buf.fill(0);
            buf.len()
        }
        fn sleep(&self, duration: Duration) -> Duration {
            duration
        }
        fn current_time(&self) -> Result<f64, VfsError> {
            Ok(2451545.0)
        }
    }

    fn vfs(name: &'static str) -> Arc<dyn Vfs> {
        Arc::new(Named(name))
    }

    fn same(a: &Arc<dyn Vfs>, b: &Arc<dyn Vfs>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
    }

    #[test]
    fn empty_registry() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert!(registry.find(None).is_none());
        assert!(registry.find(Some("x")).is_none());
        assert!(matches!(
            registry.provider(None),
            Err(VfsError::NotFound { name }) if name.is_empty()
        ));
    }

    #[test]
    fn register_order_and_default_promotion() {
        let registry = Registry::new();
        let a = vfs("A");
        let b = vfs("B");
        let c = vfs("C");

        registry.register(a.clone(), false);
        registry.register(b.clone(), false);
        registry.register(c.clone(), true);
        assert_eq!(registry.names(), ["C", "A", "B"]);
        assert!(same(&registry.find(None).unwrap(), &c));

        assert!(registry.unregister(&c));
        assert_eq!(registry.names(), ["A", "B"]);
        assert!(same(&registry.find(None).unwrap(), &a));
    }

    #[test]
    fn default_then_two_more_then_remove_default() {
        let registry = Registry::new();
        let a = vfs("A");
        registry.register(a.clone(), true);
        registry.register(vfs("B"), false);
        registry.register(vfs("C"), false);

        // Each non-default registration slots in right behind the default.
        assert_eq!(registry.names(), ["A", "C", "B"]);
        assert!(same(&registry.find(None).unwrap(), &a));

        assert!(registry.unregister(&a));
        assert_eq!(registry.find(None).unwrap().name(), "C");
        assert_eq!(registry.find(Some("C")).unwrap().name(), "C");
        assert!(registry.find(Some("A")).is_none());
        assert!(registry.find(Some("Z")).is_none());
    }

    #[test]
    fn non_default_goes_second() {
        let registry = Registry::new();
        registry.register(vfs("A"), false);
        registry.register(vfs("B"), false);
        registry.register(vfs("C"), false);
        assert_eq!(registry.names(), ["A", "C", "B"]);
    }

    #[test]
    fn reregistering_never_duplicates() {
        let registry = Registry::new();
        let a = vfs("A");
        let b = vfs("B");
        registry.register(a.clone(), false);
        registry.register(b.clone(), false);

        registry.register(a.clone(), false);
        assert_eq!(registry.names(), ["B", "A"]);
        registry.register(a.clone(), true);
        assert_eq!(registry.names(), ["A", "B"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn identity_not_name() {
        let registry = Registry::new();
        let first = vfs("twin");
        let second = vfs("twin");
        registry.register(first.clone(), true);
        registry.register(second.clone(), false);
        assert_eq!(registry.len(), 2);

        // The first in list order wins a name lookup.
        assert!(same(&registry.find(Some("twin")).unwrap(), &first));
        assert!(registry.unregister(&first));
        assert!(same(&registry.find(Some("twin")).unwrap(), &second));
    }

    #[test]
    fn unregister_unknown_is_harmless() {
        let registry = Registry::new();
        registry.register(vfs("A"), true);
        assert!(!registry.unregister(&vfs("A")));
        assert_eq!(registry.names(), ["A"]);
    }

    #[test]
    fn provider_wraps_found_backend() {
        let registry = Registry::new();
        registry.register(vfs("memdb"), true);
        let provider = registry.provider(Some("memdb")).unwrap();
        assert_eq!(provider.name(), "memdb");
        assert!(matches!(
            registry.provider(Some("nope")),
            Err(VfsError::NotFound { name }) if name == "nope"
        ));
    }

    #[test]
    fn name_lookup_is_exact() {
        let registry = Registry::new();
        registry.register(vfs("unix"), true);
        assert!(registry.find(Some("UNIX")).is_none());
        assert!(registry.find(Some("uni")).is_none());
        assert!(registry.find(Some("unix")).is_some());
    }

    #[test]
    fn concurrent_register_and_unregister() {
        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let v = vfs("churn");
                        registry.register(v.clone(), false);
                        assert!(registry.find(Some("churn")).is_some());
                        assert!(registry.unregister(&v));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
