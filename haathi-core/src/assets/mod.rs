//! Path-keyed resource caches.
//!
//! The guest names images and sounds by path. The first time a path is seen the cache creates an
//! [`Asset`] in the `Loading` state, hands the decode to a background thread and returns at once.
//! Every later lookup of the same path returns the same `Arc`, whatever state it ended up in; a
//! failed asset is never retried.
//!
//! Draw and audio calls look at [`Asset::ready`] and quietly do nothing until it yields a value.

mod image;
mod sound;

pub use image::{ImageLoader, pixmap_from_rgba};
pub use sound::{SoundClip, SoundLoader};

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;

/// Errors recorded on a failed asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },
    #[error("unsupported asset type: {0}")]
    Unsupported(PathBuf),
    #[error("path {0:?} leaves the asset root")]
    OutsideRoot(String),
    #[error("loader panicked on {0}")]
    Panicked(String),
}

impl AssetError {
    pub(crate) fn decode(path: &Path, reason: impl ToString) -> Self {
        AssetError::Decode {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

/// Lifecycle of a cached resource.
#[derive(Debug)]
pub enum AssetState<T> {
    Loading,
    Ready(Arc<T>),
    Failed(String),
}

impl<T> Clone for AssetState<T> {
    fn clone(&self) -> Self {
        match self {
            AssetState::Loading => AssetState::Loading,
            AssetState::Ready(value) => AssetState::Ready(Arc::clone(value)),
            AssetState::Failed(reason) => AssetState::Failed(reason.clone()),
        }
    }
}

/// A single cached resource, shared between the cache and its background loader.
#[derive(Debug)]
pub struct Asset<T> {
    path: String,
    state: Mutex<AssetState<T>>,
    settled: Condvar,
}

impl<T> Asset<T> {
    fn new(path: &str) -> Self {
        Self {
            path: path.to_owned(),
            state: Mutex::new(AssetState::Loading),
            settled: Condvar::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> AssetState<T> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The decoded resource, if loading has finished successfully.
    pub fn ready(&self) -> Option<Arc<T>> {
        match &*self.state.lock().unwrap_or_else(PoisonError::into_inner) {
            AssetState::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }

    /// Block the calling host thread until the asset leaves `Loading` or `timeout` passes.
    ///
    /// Returns whether the asset settled. Only host tooling calls this; guest imports never wait.
    pub fn wait(&self, timeout: Duration) -> bool {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .settled
            .wait_timeout_while(guard, timeout, |state| {
                matches!(state, AssetState::Loading)
            })
            .unwrap_or_else(PoisonError::into_inner);
        !matches!(*guard, AssetState::Loading)
    }

    fn settle(&self, result: Result<T, AssetError>) {
        let next = match result {
            Ok(value) => {
                tracing::debug!(path = %self.path, "asset ready");
                AssetState::Ready(Arc::new(value))
            }
            Err(e) => {
                tracing::warn!(path = %self.path, error = %e, "asset failed to load");
                AssetState::Failed(e.to_string())
            }
        };
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = next;
        self.settled.notify_all();
    }
}

/// Decodes one kind of resource from a path.
pub trait AssetLoader: Send + Sync + 'static {
    type Output: Send + Sync + 'static;

    fn load(&self, path: &str) -> Result<Self::Output, AssetError>;
}

/// Process-lifetime cache: one [`Asset`] per unique path.
pub struct ResourceCache<L: AssetLoader> {
    loader: Arc<L>,
    entries: HashMap<String, Arc<Asset<L::Output>>>,
}

impl<L: AssetLoader> ResourceCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader: Arc::new(loader),
            entries: HashMap::new(),
        }
    }

    /// Return the asset for `path`, creating it and starting its load on first use.
    pub fn resolve(&mut self, path: &str) -> Arc<Asset<L::Output>> {
        if let Some(asset) = self.entries.get(path) {
            return Arc::clone(asset);
        }

        let asset = Arc::new(Asset::new(path));
        self.entries.insert(path.to_owned(), Arc::clone(&asset));
        tracing::debug!(path, "asset load started");

        let loader = Arc::clone(&self.loader);
        let task = Arc::clone(&asset);
        let spawned = std::thread::Builder::new()
            .name(format!("haathi-asset:{path}"))
            .spawn(move || {
                let result = panic::catch_unwind(AssertUnwindSafe(|| loader.load(task.path())))
                    .unwrap_or_else(|_| Err(AssetError::Panicked(task.path().to_owned())));
                task.settle(result);
            });

        if let Err(e) = spawned {
            asset.settle(Err(AssetError::Io {
                path: PathBuf::from(path),
                source: e,
            }));
        }

        asset
    }

    /// Look up an asset without creating it.
    pub fn get(&self, path: &str) -> Option<Arc<Asset<L::Output>>> {
        self.entries.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Join a guest-supplied path onto the asset root. A leading `/` means the root itself.
///
/// `..` and drive prefixes are rejected, so the result never names a file outside `root`.
pub(crate) fn resolve_under(root: &Path, path: &str) -> Result<PathBuf, AssetError> {
    let mut full = root.to_path_buf();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => full.push(part),
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(AssetError::OutsideRoot(path.to_owned()));
            }
        }
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl AssetLoader for CountingLoader {
        type Output = String;

        fn load(&self, path: &str) -> Result<String, AssetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if path.starts_with("panic") {
                panic!("decoder blew up");
            }
            if path.starts_with("missing") {
                return Err(AssetError::Unsupported(PathBuf::from(path)));
            }
            Ok(path.to_uppercase())
        }
    }

    fn counting_cache() -> (ResourceCache<CountingLoader>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ResourceCache::new(CountingLoader {
            calls: Arc::clone(&calls),
        });
        (cache, calls)
    }

    #[test]
    fn same_path_resolves_to_same_instance() {
        let (mut cache, calls) = counting_cache();

        let a = cache.resolve("img/ship.png");
        let b = cache.resolve("img/ship.png");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);

        assert!(a.wait(Duration::from_secs(5)));
        let c = cache.resolve("img/ship.png");
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(a.ready().as_deref().map(String::as_str), Some("IMG/SHIP.PNG"));
    }

    #[test]
    fn distinct_paths_get_distinct_assets() {
        let (mut cache, _) = counting_cache();
        let a = cache.resolve("a.png");
        let b = cache.resolve("b.png");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failure_is_recorded_and_never_retried() {
        let (mut cache, calls) = counting_cache();

        let asset = cache.resolve("missing.png");
        assert!(asset.wait(Duration::from_secs(5)));
        assert!(matches!(asset.state(), AssetState::Failed(_)));
        assert!(asset.ready().is_none());

        let again = cache.resolve("missing.png");
        assert!(Arc::ptr_eq(&asset, &again));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn get_does_not_create() {
        let (mut cache, calls) = counting_cache();
        assert!(cache.get("a.png").is_none());
        assert!(cache.is_empty());
        cache.resolve("a.png");
        assert!(cache.get("a.png").is_some());
        assert!(cache.get("a.png").unwrap().wait(Duration::from_secs(5)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn loader_panic_settles_as_failed() {
        let (mut cache, calls) = counting_cache();
        let asset = cache.resolve("panic.png");
        assert!(asset.wait(Duration::from_secs(5)));
        let AssetState::Failed(reason) = asset.state() else {
            panic!("panicking loader did not fail the asset");
        };
        assert!(reason.contains("panic.png"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn paths_stay_under_root() {
        let root = Path::new("/srv/game");
        assert_eq!(resolve_under(root, "/img/a.png").unwrap(), root.join("img/a.png"));
        assert_eq!(resolve_under(root, "snd/b.wav").unwrap(), root.join("snd/b.wav"));
        assert_eq!(resolve_under(root, "./snd//b.wav").unwrap(), root.join("snd/b.wav"));
    }

    #[test]
    fn parent_components_are_rejected() {
        let root = Path::new("/srv/game");
        for path in ["../secret.wav", "img/../../etc/passwd", "/../x.png", "a/.."] {
            assert!(
                matches!(resolve_under(root, path), Err(AssetError::OutsideRoot(p)) if p == path),
                "{path} was accepted"
            );
        }
    }

    #[test]
    fn escaping_image_is_failed_not_read() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("assets");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(dir.path().join("secret.png"), b"not for guests").unwrap();

        let mut cache = ResourceCache::new(ImageLoader::new(&root));
        let asset = cache.resolve("../secret.png");
        assert!(asset.wait(Duration::from_secs(5)));
        let AssetState::Failed(reason) = asset.state() else {
            panic!("escaping path did not fail the asset");
        };
        assert!(reason.contains("leaves the asset root"));
    }
}
