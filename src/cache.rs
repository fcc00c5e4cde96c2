//! Memo caches shared by every render pass of a [`BlazyManager`].
//!
//! Style dimension predictions are cheap individually but a page renders the
//! same files through the same styles many times (the main image, its
//! responsive variants, the lightbox box). [`RenderCache`] remembers them for
//! the lifetime of the manager; it is never invalidated because a key fully
//! determines its value.
//!
//! ## Cache keys
//!
//! - **Transforms**: SHA-256 of `(style id, URI, initial)`. `initial` marks
//!   whether the original (`_width`/`_height`) or the already-styled size was
//!   the input, so both predictions can coexist for one file.
//! - **Data URIs**: the derivative path on disk. The file is read and
//!   base64-encoded once.
//!
//! Both maps sit behind a `Mutex` so a rayon batch can share one cache.
//!
//! [`BlazyManager`]: crate::render::BlazyManager

use crate::types::Size;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Hit/miss counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl CacheStats {
    pub fn hit(&mut self) {
        self.hits += 1;
    }

    pub fn miss(&mut self) {
        self.misses += 1;
    }

    pub fn total(&self) -> u32 {
        self.hits + self.misses
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.hits > 0 {
            write!(f, "{} cached, {} computed", self.hits, self.misses)
        } else {
            write!(f, "{} computed", self.misses)
        }
    }
}

/// SHA-256 key of a transform prediction.
pub fn transform_key(style_id: &str, uri: &str, initial: bool) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"transform\0");
    hasher.update(style_id.as_bytes());
    hasher.update(b"\0");
    hasher.update(uri.as_bytes());
    hasher.update([initial as u8]);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
struct Inner {
    transforms: HashMap<String, Size>,
    data_uris: HashMap<PathBuf, String>,
    stats: CacheStats,
}

/// Process-lifetime memo for transform sizes and blur data URIs.
#[derive(Debug, Default)]
pub struct RenderCache {
    inner: Mutex<Inner>,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached size for `(style_id, uri, initial)`, computing it on a miss.
    ///
    /// `compute` runs outside the lock, so two threads racing on one key may
    /// both compute it; the first stored value wins and both get it.
    pub fn transform(
        &self,
        style_id: &str,
        uri: &str,
        initial: bool,
        compute: impl FnOnce() -> Size,
    ) -> Size {
        let key = transform_key(style_id, uri, initial);
        if let Some(size) = self.with_inner(|inner| {
            let found = inner.transforms.get(&key).copied();
            if found.is_some() {
                inner.stats.hit();
            }
            found
        }) {
            return size;
        }

        let computed = compute();
        self.with_inner(|inner| {
            inner.stats.miss();
            *inner.transforms.entry(key).or_insert(computed)
        })
    }

    /// Cached data URI for `path`, reading it with `load` on a miss.
    ///
    /// Failed loads are not cached, so a derivative created later is picked up.
    pub fn data_uri<E>(
        &self,
        path: &Path,
        load: impl FnOnce() -> Result<String, E>,
    ) -> Result<String, E> {
        if let Some(uri) = self.with_inner(|inner| {
            let found = inner.data_uris.get(path).cloned();
            if found.is_some() {
                inner.stats.hit();
            }
            found
        }) {
            return Ok(uri);
        }

        let loaded = load()?;
        Ok(self.with_inner(|inner| {
            inner.stats.miss();
            inner
                .data_uris
                .entry(path.to_path_buf())
                .or_insert(loaded)
                .clone()
        }))
    }

    pub fn stats(&self) -> CacheStats {
        self.with_inner(|inner| inner.stats)
    }

    pub fn len(&self) -> usize {
        self.with_inner(|inner| inner.transforms.len() + inner.data_uris.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_inner<T>(&self, f: impl FnOnce(&mut Inner) -> T) -> T {
        // A panic while holding the lock leaves the maps consistent, since
        // every critical section is a single insert or lookup.
        let mut guard = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    // =========================================================================
    // Key tests
    // =========================================================================

    #[test]
    fn transform_key_deterministic() {
        assert_eq!(
            transform_key("large", "public://a.jpg", false),
            transform_key("large", "public://a.jpg", false)
        );
    }

    #[test]
    fn transform_key_varies_with_each_part() {
        let base = transform_key("large", "public://a.jpg", false);
        assert_ne!(base, transform_key("medium", "public://a.jpg", false));
        assert_ne!(base, transform_key("large", "public://b.jpg", false));
        assert_ne!(base, transform_key("large", "public://a.jpg", true));
    }

    #[test]
    fn transform_key_separates_fields() {
        assert_ne!(transform_key("ab", "c", false), transform_key("a", "bc", false));
    }

    // =========================================================================
    // Transform memo tests
    // =========================================================================

    #[test]
    fn transform_computes_once() {
        let cache = RenderCache::new();
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Size::new(480, 240)
        };

        let first = cache.transform("large", "public://a.jpg", false, compute);
        let second = cache.transform("large", "public://a.jpg", false, || {
            calls.set(calls.get() + 1);
            Size::new(1, 1)
        });

        assert_eq!(first, Size::new(480, 240));
        assert_eq!(second, first);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn transform_initial_flag_is_separate_entry() {
        let cache = RenderCache::new();
        let a = cache.transform("large", "public://a.jpg", true, || Size::new(10, 10));
        let b = cache.transform("large", "public://a.jpg", false, || Size::new(20, 20));
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn transform_shared_across_threads() {
        let cache = RenderCache::new();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    let size = cache.transform("s", "public://x.jpg", false, || Size::new(5, 5));
                    assert_eq!(size, Size::new(5, 5));
                });
            }
        });
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().total(), 4);
    }

    // =========================================================================
    // Data URI memo tests
    // =========================================================================

    #[test]
    fn data_uri_loads_once() {
        let cache = RenderCache::new();
        let path = Path::new("/files/styles/thumb/a.png");
        let first: Result<String, ()> = cache.data_uri(path, || Ok("data:image/png;base64,AA".into()));
        let second: Result<String, ()> = cache.data_uri(path, || Err(()));
        assert_eq!(first.unwrap(), "data:image/png;base64,AA");
        assert_eq!(second.unwrap(), "data:image/png;base64,AA");
    }

    #[test]
    fn data_uri_errors_are_not_cached() {
        let cache = RenderCache::new();
        let path = Path::new("/missing.png");
        let failed: Result<String, &str> = cache.data_uri(path, || Err("missing"));
        assert!(failed.is_err());
        let loaded: Result<String, &str> = cache.data_uri(path, || Ok("data:x".into()));
        assert_eq!(loaded.unwrap(), "data:x");
    }

    // =========================================================================
    // CacheStats display tests
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let stats = CacheStats { hits: 3, misses: 2 };
        assert_eq!(format!("{}", stats), "3 cached, 2 computed");
    }

    #[test]
    fn cache_stats_display_no_hits() {
        let stats = CacheStats { hits: 0, misses: 4 };
        assert_eq!(format!("{}", stats), "4 computed");
    }
}
