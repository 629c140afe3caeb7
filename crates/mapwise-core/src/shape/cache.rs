//! Thread-safe memoization of type shapes

use super::{FlattenOptions, TypeShape};
use crate::reflect::type_id;
use facet_core::Shape;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
}

/// Per-type shape store keyed by type identity
///
/// Reads take the shared lock. A miss takes the exclusive lock and checks
/// again before building, so concurrent callers never build the same shape
/// twice and never observe a half-built one.
#[derive(Debug)]
pub struct ShapeCache {
    shapes: RwLock<HashMap<TypeId, Arc<TypeShape>>>,
    counters: RwLock<Counters>,
    options: FlattenOptions,
}

impl ShapeCache {
    pub fn new(options: FlattenOptions) -> Self {
        Self {
            shapes: RwLock::new(HashMap::new()),
            counters: RwLock::new(Counters::default()),
            options,
        }
    }

    pub fn options(&self) -> &FlattenOptions {
        &self.options
    }

    /// Get the cached shape of `shape`, building it on first use
    pub fn get_or_build(&self, shape: &'static Shape) -> Arc<TypeShape> {
        let id = type_id(shape);
        {
            let shapes = self.shapes.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cached) = shapes.get(&id) {
                self.record(true);
                return Arc::clone(cached);
            }
        }

        let mut shapes = self.shapes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = shapes.get(&id) {
            self.record(true);
            return Arc::clone(cached);
        }

        tracing::trace!(type_name = %shape, "building type shape");
        let built = Arc::new(TypeShape::build(shape, &self.options));
        shapes.insert(id, Arc::clone(&built));
        self.record(false);
        built
    }

    /// Whether a shape for `shape` is already cached
    pub fn contains(&self, shape: &'static Shape) -> bool {
        self.shapes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&type_id(shape))
    }

    pub fn len(&self) -> usize {
        self.shapes.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached shape and reset the counters
    pub fn clear(&self) {
        self.shapes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        *self.counters.write().unwrap_or_else(PoisonError::into_inner) = Counters::default();
    }

    pub fn stats(&self) -> CacheStats {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            entries: self.len(),
            hits: counters.hits,
            misses: counters.misses,
        }
    }

    fn record(&self, hit: bool) {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        if hit {
            counters.hits += 1;
        } else {
            counters.misses += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facet::Facet;
    use std::thread;

    #[derive(Debug, Default, Facet)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn test_build_once_then_hit() {
        let cache = ShapeCache::new(FlattenOptions::default());
        let first = cache.get_or_build(Point::SHAPE);
        let second = cache.get_or_build(Point::SHAPE);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );
    }

    #[test]
    fn test_concurrent_builds_share_one_shape() {
        let cache = Arc::new(ShapeCache::new(FlattenOptions::default()));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_or_build(Point::SHAPE))
            })
            .collect();
        let shapes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(shapes.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_clear() {
        let cache = ShapeCache::new(FlattenOptions::default());
        cache.get_or_build(Point::SHAPE);
        assert!(cache.contains(Point::SHAPE));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats::default());
    }
}
