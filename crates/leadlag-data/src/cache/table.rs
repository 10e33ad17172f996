//! Memoizing table cache.
//!
//! [`TableCache`] maps a logical output path to a materialized table. Within a
//! process every path is computed at most once: the first successful call
//! remembers its result, later calls return the remembered table. Across
//! processes the table is persisted at the path and loaded on the next run.
//!
//! Persisted artifacts are trusted as-is. A file written by an older version
//! with a different schema is returned without validation.

use super::format::TableFormat;
use crate::error::DataError;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// How a cached computation interacts with memory and disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Always recompute and never touch disk. The result is still remembered
    /// in memory for other callers of the same path.
    Bypass,
    /// Load a persisted artifact if present, otherwise compute without persisting.
    ReadThrough,
    /// Load a persisted artifact if present, otherwise compute and persist it.
    #[default]
    WriteThrough,
}

impl CachePolicy {
    /// Policy for a test flag: `Bypass` when set, `WriteThrough` otherwise.
    pub const fn from_test_flag(test: bool) -> Self {
        if test { Self::Bypass } else { Self::WriteThrough }
    }
}

type Slot = Arc<Mutex<Option<DataFrame>>>;

/// Process-wide path to table memory backed by durable storage.
#[derive(Debug)]
pub struct TableCache {
    root: PathBuf,
    slots: Mutex<HashMap<PathBuf, Slot>>,
}

impl TableCache {
    /// Create a cache resolving relative keys against `root`.
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Directory relative keys are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a key. Absolute keys are kept unchanged.
    pub fn resolve<P: AsRef<Path>>(&self, key: P) -> PathBuf {
        self.root.join(key)
    }

    /// Whether a table for this key has been served during this process.
    pub fn is_remembered<P: AsRef<Path>>(&self, key: P) -> bool {
        let path = self.resolve(key);
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.get(&path).is_some_and(|slot| {
            slot.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some()
        })
    }

    /// Number of remembered tables.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .values()
            .filter(|slot| {
                slot.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .is_some()
            })
            .count()
    }

    /// Whether no table has been remembered yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, path: &Path) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slots.entry(path.to_path_buf()).or_default())
    }

    /// Return the table for `key`, computing it only when neither memory nor
    /// disk holds it.
    ///
    /// The per-path slot stays locked from the memory check until the result is
    /// stored, so concurrent callers of one path never compute twice or
    /// interleave writes to the same file.
    pub fn get_or_compute<P, F, E>(&self, key: P, policy: CachePolicy, compute: F) -> Result<DataFrame, E>
    where
        P: AsRef<Path>,
        F: FnOnce() -> Result<DataFrame, E>,
        E: From<DataError>,
    {
        let path = self.resolve(key);
        let slot = self.slot(&path);
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if policy == CachePolicy::Bypass {
            debug!(path = %path.display(), "cache bypassed, computing");
            let df = compute()?;
            *entry = Some(df.clone());
            return Ok(df);
        }

        if let Some(df) = entry.as_ref() {
            debug!(path = %path.display(), "cache hit (memory)");
            return Ok(df.clone());
        }

        let format = TableFormat::from_path(&path)?;

        let df = if path.exists() {
            info!(path = %path.display(), "cache hit (disk), loading");
            format.read(&path)?
        } else {
            info!(path = %path.display(), "cache miss, computing");
            let df = compute()?;
            if policy == CachePolicy::WriteThrough {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(DataError::from)?;
                }
                format.write(&df, &path)?;
                info!(path = %path.display(), rows = df.height(), "cache saved");
            }
            df
        };

        *entry = Some(df.clone());
        Ok(df)
    }
}

/// A table computation bound to its cache key and policy.
pub struct CachedCompute<F> {
    key: PathBuf,
    policy: CachePolicy,
    compute: F,
}

impl<F> CachedCompute<F> {
    /// Bind a computation to a logical output path.
    pub fn new<P: Into<PathBuf>>(key: P, policy: CachePolicy, compute: F) -> Self {
        Self {
            key: key.into(),
            policy,
            compute,
        }
    }

    /// Logical output path.
    pub fn key(&self) -> &Path {
        &self.key
    }

    /// Cache policy.
    pub const fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Produce the table through `cache`.
    pub fn call<E>(&self, cache: &TableCache) -> Result<DataFrame, E>
    where
        F: Fn() -> Result<DataFrame, E>,
        E: From<DataError>,
    {
        cache.get_or_compute(&self.key, self.policy, &self.compute)
    }
}

impl<F> fmt::Debug for CachedCompute<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCompute")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
