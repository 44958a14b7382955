//! # Variant Cache Manager
//!
//! [`VariantCache::get_or_create`] is the only entry point:
//!
//! 1. Derive the variant path. If a regular file is there, return it as a
//!    hit without touching the original.
//! 2. Otherwise take the per-path generation lock and check again; a
//!    generation that finished while we waited is also a hit.
//! 3. Still missing: create the parent directory and run the backend on the
//!    blocking pool.
//!
//! Steps 2 and 3 run in a spawned task that owns the lock guard, so the
//! caller going away never leaves the guard or its map entry behind.
//!
//! ## In-Flight Map
//!
//! `in_flight` holds one `tokio::sync::Mutex<()>` per derived path that is
//! currently being generated or waited on. Whoever holds the guard removes
//! the entry when nobody else holds a clone, so the map stays bounded by the
//! number of keys with pending work. If generation fails while others wait,
//! the entry survives and the next waiter retries under the same lock.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use shelf_core::{VariantKey, VariantPathDeriver};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::backend::{ImageBackend, ImageCrateBackend};
use crate::error::VariantError;

/// How a variant request was satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantOutcome {
    /// The variant was already on disk.
    Hit(PathBuf),
    /// The variant was generated by this call.
    Generated(PathBuf),
}

impl VariantOutcome {
    /// Path of the variant file.
    pub fn path(&self) -> &Path {
        match self {
            Self::Hit(p) | Self::Generated(p) => p,
        }
    }

    /// Consume the outcome, returning the variant path.
    pub fn into_path(self) -> PathBuf {
        match self {
            Self::Hit(p) | Self::Generated(p) => p,
        }
    }

    /// Whether the file already existed.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

struct Inner<B> {
    deriver: VariantPathDeriver,
    backend: B,
    in_flight: DashMap<PathBuf, Arc<Mutex<()>>>,
    generations: AtomicU64,
}

/// Lazily generated, persistent cache of resized images.
///
/// Cheaply cloneable; clones share the in-flight map and counters.
pub struct VariantCache<B = ImageCrateBackend> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for VariantCache<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B> fmt::Debug for VariantCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantCache")
            .field("deriver", &self.inner.deriver)
            .field("in_flight", &self.inner.in_flight.len())
            .field("generations", &self.generations())
            .finish()
    }
}

impl VariantCache<ImageCrateBackend> {
    /// Create a cache that resizes with the `image` crate.
    pub fn new(deriver: VariantPathDeriver) -> Self {
        Self::with_backend(deriver, ImageCrateBackend)
    }
}

impl<B> VariantCache<B> {
    /// Number of variants this instance has generated.
    pub fn generations(&self) -> u64 {
        self.inner.generations.load(Ordering::Relaxed)
    }

    /// The path deriver, and through it the cache root.
    pub fn deriver(&self) -> &VariantPathDeriver {
        &self.inner.deriver
    }

    /// Number of keys with a generation in progress or waiters queued.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }
}

impl<B: ImageBackend> VariantCache<B> {
    /// Create a cache with a custom backend.
    pub fn with_backend(deriver: VariantPathDeriver, backend: B) -> Self {
        Self {
            inner: Arc::new(Inner {
                deriver,
                backend,
                in_flight: DashMap::new(),
                generations: AtomicU64::new(0),
            }),
        }
    }

    /// Return the variant of `original` at `width`, generating it if absent.
    ///
    /// `original` must name a readable image; this is only checked on a miss.
    pub async fn get_or_create(
        &self,
        original: &Path,
        width: u32,
    ) -> Result<VariantOutcome, VariantError> {
        if width == 0 {
            return Err(VariantError::InvalidWidth(width));
        }
        let key = VariantKey::new(original, width);
        let dest = self.inner.deriver.derive_key(&key);

        if is_file(&dest).await {
            tracing::debug!(variant = %dest.display(), "variant cache hit");
            return Ok(VariantOutcome::Hit(dest));
        }

        // Everything that holds the per-key guard runs in its own task, so a
        // dropped caller can neither abort generation nor skip `release`.
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let lock = Arc::clone(inner.in_flight.entry(dest.clone()).or_default().value());
            let guard = lock.lock_owned().await;

            if is_file(&dest).await {
                inner.release(&dest, guard);
                tracing::debug!(variant = %dest.display(), "variant generated by concurrent request");
                return Ok(VariantOutcome::Hit(dest));
            }

            let result = generate(&inner, key, dest.clone()).await;
            inner.release(&dest, guard);
            result.map(VariantOutcome::Generated)
        });

        task.await.map_err(|e| VariantError::Task(e.to_string()))?
    }
}

async fn generate<B: ImageBackend>(
    inner: &Arc<Inner<B>>,
    key: VariantKey,
    dest: PathBuf,
) -> Result<PathBuf, VariantError> {
    if let Some(dir) = dest.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| VariantError::write(dir, e))?;
    }

    let started = Instant::now();
    let worker = Arc::clone(inner);
    let (source, out, width) = (key.original.clone(), dest.clone(), key.width);
    tokio::task::spawn_blocking(move || worker.backend.resize(&source, width, &out))
        .await
        .map_err(|e| VariantError::Task(e.to_string()))??;

    inner.generations.fetch_add(1, Ordering::Relaxed);
    tracing::info!(
        key = %key,
        variant = %dest.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "variant generated"
    );
    Ok(dest)
}

impl<B> Inner<B> {
    /// Drop `guard`, first removing the map entry if no one else holds it.
    ///
    /// The entry's `Arc` is held once by the map and once by `guard`; any
    /// higher count is a queued waiter that still needs the same mutex.
    fn release(&self, dest: &Path, guard: OwnedMutexGuard<()>) {
        self.in_flight
            .remove_if(dest, |_, lock| Arc::strong_count(lock) <= 2);
        drop(guard);
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Writes a marker file after a delay, counting invocations.
    #[derive(Default)]
    struct CountingBackend {
        calls: AtomicUsize,
    }

    impl ImageBackend for CountingBackend {
        fn resize(&self, source: &Path, width: u32, dest: &Path) -> Result<(), VariantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            let body = format!("{}:{width}", source.display());
            std::fs::write(dest, body).map_err(|e| VariantError::write(dest, e))
        }
    }

    /// Always fails as if the original were corrupt.
    #[derive(Default)]
    struct FailingBackend {
        calls: AtomicUsize,
    }

    impl ImageBackend for FailingBackend {
        fn resize(&self, source: &Path, _width: u32, _dest: &Path) -> Result<(), VariantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(VariantError::Decode {
                path: source.to_path_buf(),
                source: image::ImageError::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "corrupt",
                )),
            })
        }
    }

    fn roots() -> (tempfile::TempDir, VariantPathDeriver) {
        let dir = tempfile::tempdir().unwrap();
        let deriver = VariantPathDeriver::new(dir.path().join("images"), dir.path().join("cache"));
        (dir, deriver)
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let (dir, deriver) = roots();
        let cache = VariantCache::with_backend(deriver, CountingBackend::default());
        let original = dir.path().join("images/2024/a.jpg");

        let first = cache.get_or_create(&original, 150).await.unwrap();
        assert_eq!(
            first,
            VariantOutcome::Generated(dir.path().join("cache/2024/a_150w.jpg"))
        );

        let second = cache.get_or_create(&original, 150).await.unwrap();
        assert!(second.is_hit());
        assert_eq!(second.path(), first.path());
        assert_eq!(cache.inner.backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.generations(), 1);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test]
    async fn hit_does_not_read_original() {
        let (dir, deriver) = roots();
        let variant = deriver.derive(&dir.path().join("images/gone.jpg"), 480);
        std::fs::create_dir_all(variant.parent().unwrap()).unwrap();
        std::fs::write(&variant, b"cached").unwrap();

        let cache = VariantCache::with_backend(deriver, FailingBackend::default());
        let outcome = cache
            .get_or_create(&dir.path().join("images/gone.jpg"), 480)
            .await
            .unwrap();

        assert_eq!(outcome, VariantOutcome::Hit(variant));
        assert_eq!(cache.inner.backend.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_width_rejected_without_io() {
        let (dir, deriver) = roots();
        let cache = VariantCache::with_backend(deriver, CountingBackend::default());
        let err = cache
            .get_or_create(&dir.path().join("images/a.jpg"), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, VariantError::InvalidWidth(0)));
        assert!(!dir.path().join("cache").exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_misses_generate_once() {
        let (dir, deriver) = roots();
        let cache = VariantCache::with_backend(deriver, CountingBackend::default());
        let original = dir.path().join("images/a.jpg");

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let cache = cache.clone();
                let original = original.clone();
                tokio::spawn(async move { cache.get_or_create(&original, 150).await })
            })
            .collect();

        let mut generated = 0;
        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            if !outcome.is_hit() {
                generated += 1;
            }
            let body = std::fs::read_to_string(outcome.path()).unwrap();
            assert!(body.ends_with(":150"), "partial or foreign content: {body}");
        }

        assert_eq!(generated, 1);
        assert_eq!(cache.inner.backend.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn distinct_keys_generate_in_parallel() {
        let (dir, deriver) = roots();
        let cache = VariantCache::with_backend(deriver, CountingBackend::default());

        let started = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                let original = dir.path().join(format!("images/{i}.jpg"));
                tokio::spawn(async move { cache.get_or_create(&original, 150).await })
            })
            .collect();
        for handle in handles {
            assert!(!handle.await.unwrap().unwrap().is_hit());
        }

        assert_eq!(cache.generations(), 8);
        // Eight serialized 50 ms generations would take at least 400 ms.
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn failure_is_returned_and_leaves_no_variant() {
        let (dir, deriver) = roots();
        let cache = VariantCache::with_backend(deriver, FailingBackend::default());
        let original = dir.path().join("images/2024/broken.jpg");

        let err = cache.get_or_create(&original, 150).await.unwrap_err();
        assert!(err.is_decode());
        assert!(!cache.deriver().derive(&original, 150).exists());
        assert_eq!(cache.generations(), 0);
        assert_eq!(cache.in_flight(), 0);

        // Failures are not remembered; the next request tries again.
        assert!(cache.get_or_create(&original, 150).await.is_err());
        assert_eq!(cache.inner.backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_request_still_populates_cache() {
        let (dir, deriver) = roots();
        let cache = VariantCache::with_backend(deriver, CountingBackend::default());
        let original = dir.path().join("images/a.jpg");

        let abandoned = {
            let cache = cache.clone();
            let original = original.clone();
            tokio::spawn(async move { cache.get_or_create(&original, 150).await })
        };
        while cache.inner.backend.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        abandoned.abort();

        let outcome = cache.get_or_create(&original, 150).await.unwrap();
        assert!(outcome.is_hit());
        assert_eq!(cache.inner.backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn abandoned_waiter_leaves_no_in_flight_entry() {
        let (dir, deriver) = roots();
        let cache = VariantCache::with_backend(deriver, CountingBackend::default());
        let original = dir.path().join("images/a.jpg");

        let spawn_request = || {
            let cache = cache.clone();
            let original = original.clone();
            tokio::spawn(async move { cache.get_or_create(&original, 150).await })
        };
        let leader = spawn_request();
        while cache.inner.backend.calls.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        let waiter = spawn_request();
        tokio::time::sleep(Duration::from_millis(5)).await;
        waiter.abort();

        assert!(!leader.await.unwrap().unwrap().is_hit());
        let deadline = Instant::now() + Duration::from_secs(2);
        while cache.in_flight() > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(cache.in_flight(), 0);
        assert_eq!(cache.inner.backend.calls.load(Ordering::SeqCst), 1);
    }
}
