//! Memoization of pipeline results, kept outside the pipeline itself.
//!
//! Entries are keyed by a SHA-256 digest of the upload name, the input bytes and the
//! serialized configuration. The name labels sheets and diagnostics, so the same bytes
//! uploaded under another name, or processed with other settings, never share an entry. Eviction is least-recently-used with a fixed entry count; the caller can drop a
//! single entry or everything at any time.

use crate::config::PipelineConfig;
use crate::error::RustySurveyError;
use crate::pipeline::Pipeline;
use crate::pipeline::PipelineOutput;
use log::debug;
use lru::LruCache;
use sha2::Digest;
use sha2::Sha256;
use std::fmt::Display;
use std::num::NonZeroUsize;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn new(name: &str, bytes: &[u8], config: &PipelineConfig) -> Result<Self, RustySurveyError> {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(bytes);
        hasher.update([0u8]);
        hasher.update(config.to_json()?.as_bytes());
        Ok(CacheKey(hasher.finalize().into()))
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct TableCache {
    entries: LruCache<CacheKey, Arc<PipelineOutput>>,
    stats: CacheStats,
}

impl TableCache {
    /// A cache holding at most `capacity` results; a zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        TableCache {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Returns the cached result for `bytes` under the pipeline's configuration, running
    /// the pipeline on a miss. Failed runs are not cached.
    pub fn get_or_load(
        &mut self,
        pipeline: &Pipeline,
        name: &str,
        bytes: Vec<u8>,
        cancel: Option<&AtomicBool>,
    ) -> Result<Arc<PipelineOutput>, RustySurveyError> {
        let key = CacheKey::new(name, &bytes, pipeline.config())?;
        if let Some(output) = self.entries.get(&key) {
            self.stats.hits += 1;
            debug!("Cache hit for '{name}' ({key})");
            return Ok(Arc::clone(output));
        }
        self.stats.misses += 1;
        debug!("Cache miss for '{name}' ({key})");
        let output = Arc::new(pipeline.load_bytes(name, bytes, cancel)?);
        self.insert(key, Arc::clone(&output));
        Ok(output)
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<PipelineOutput>> {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: CacheKey, output: Arc<PipelineOutput>) {
        if let Some((evicted, _)) = self.entries.push(key, output) {
            if evicted != key {
                self.stats.evictions += 1;
                debug!("Cache evicted {evicted}");
            }
        }
    }

    /// Drops one entry, returning whether it was present.
    pub fn invalidate(&mut self, key: &CacheKey) -> bool {
        let removed = self.entries.pop(key).is_some();
        if removed {
            debug!("Cache invalidated {key}");
        }
        removed
    }

    pub fn clear(&mut self) {
        debug!("Cache cleared ({} entries)", self.entries.len());
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
