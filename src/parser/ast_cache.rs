// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Shared AST cache for FHIRPath expressions
//!
//! Parsing is pure, so the tree for a given expression text never changes. The
//! cache hands out `Arc`s that any number of threads can evaluate concurrently.

use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ast::ExpressionNode;
use crate::core::Result;

/// Shared AST that can be safely cloned across threads
pub type SharedAst = Arc<ExpressionNode>;

/// Statistics about the AST cache performance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AstCacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of entries currently cached
    pub entries: usize,
    /// Number of entries evicted to stay under the size limit
    pub evictions: u64,
}

impl AstCacheStats {
    /// Calculate cache hit rate as a percentage
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            (self.hits as f64) / ((self.hits + self.misses) as f64) * 100.0
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    ast: SharedAst,
    last_accessed: u64,
}

/// Thread-safe AST cache with least-recently-used eviction
#[derive(Debug)]
pub struct AstCache {
    cache: DashMap<String, CacheEntry>,
    max_entries: usize,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl AstCache {
    /// Create a cache holding at most `max_entries` trees. Zero disables caching.
    pub fn new(max_entries: usize) -> Self {
        Self {
            cache: DashMap::new(),
            max_entries,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Get a cached AST or None if not found
    pub fn get(&self, expression: &str) -> Option<SharedAst> {
        let now = self.tick();
        match self.cache.get_mut(expression) {
            Some(mut entry) => {
                entry.last_accessed = now;
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&entry.ast))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Cache an AST for future use
    pub fn put(&self, expression: &str, ast: SharedAst) {
        if self.max_entries == 0 {
            return;
        }
        if self.cache.len() >= self.max_entries && !self.cache.contains_key(expression) {
            self.evict_oldest();
        }
        let entry = CacheEntry {
            ast,
            last_accessed: self.tick(),
        };
        self.cache.insert(expression.to_string(), entry);
    }

    /// Return the cached tree for `expression`, parsing it on a miss
    pub fn get_or_parse(
        &self,
        expression: &str,
        parse: impl FnOnce(&str) -> Result<ExpressionNode>,
    ) -> Result<SharedAst> {
        if let Some(ast) = self.get(expression) {
            return Ok(ast);
        }
        log::debug!("AST cache miss for '{expression}'");
        let ast = Arc::new(parse(expression)?);
        self.put(expression, Arc::clone(&ast));
        Ok(ast)
    }

    /// Drop the least recently used tenth of the entries (at least one)
    fn evict_oldest(&self) {
        let mut ages: Vec<(u64, String)> = self
            .cache
            .iter()
            .map(|entry| (entry.value().last_accessed, entry.key().clone()))
            .collect();
        ages.sort_unstable_by_key(|(age, _)| *age);

        let count = (self.max_entries / 10).max(1);
        for (_, key) in ages.into_iter().take(count) {
            if self.cache.remove(&key).is_some() {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> AstCacheStats {
        AstCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.len(),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// Clear all cached entries
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Default for AstCache {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    #[test]
    fn test_cache_hit_returns_same_tree() {
        let cache = AstCache::new(10);
        let first = cache.get_or_parse("Patient.name", parse_expression).unwrap();
        let second = cache.get_or_parse("Patient.name", parse_expression).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[test]
    fn test_eviction_keeps_recent_entries() {
        let cache = AstCache::new(2);
        cache.get_or_parse("a", parse_expression).unwrap();
        cache.get_or_parse("b", parse_expression).unwrap();
        cache.get("a");
        cache.get_or_parse("c", parse_expression).unwrap();

        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_parse_errors_are_not_cached() {
        let cache = AstCache::new(10);
        assert!(cache.get_or_parse("a +", parse_expression).is_err());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let cache = AstCache::new(0);
        cache.get_or_parse("a", parse_expression).unwrap();
        assert_eq!(cache.stats().entries, 0);
    }
}
