//! Versioned offline asset cache

use std::{
    collections::HashMap,
    sync::Mutex,
};
use tracing::{debug, info};

use super::source::{Asset, AssetSource};

pub const CACHE_PREFIX: &str = "routine-timer";

/// Assets fetched on install so the app loads offline
pub const PRECACHE_MANIFEST: [&str; 10] = [
    "./",
    "./index.html",
    "./style.css",
    "./app.js",
    "./manifest.webmanifest",
    "./img/favicon/android-chrome-192x192.png",
    "./img/favicon/android-chrome-512x512.png",
    "./img/favicon/apple-touch-icon.png",
    "./img/favicon/favicon-32x32.png",
    "./img/favicon/favicon-16x16.png",
];

/// Normalize a manifest entry or request path to `/...` without a query
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let path = path.strip_prefix("./").unwrap_or(path);
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Named caches, one per version tag
#[derive(Debug)]
pub struct AssetCache {
    current: String,
    caches: Mutex<HashMap<String, HashMap<String, Asset>>>,
}

impl AssetCache {
    pub fn new(version: &str) -> Self {
        Self {
            current: format!("{CACHE_PREFIX}-{version}"),
            caches: Mutex::new(HashMap::new()),
        }
    }

    /// Name of the cache this build writes to
    pub fn name(&self) -> &str {
        &self.current
    }

    /// Fetch every manifest entry and store them under the current name.
    /// Nothing is stored unless every fetch succeeds.
    pub async fn install(&self, source: &dyn AssetSource, manifest: &[&str]) -> Result<usize, String> {
        let mut fetched = HashMap::with_capacity(manifest.len());
        for entry in manifest {
            let path = normalize_path(entry);
            let asset = source.fetch(&path).await
                .map_err(|e| format!("Precache of {} failed: {}", path, e))?;
            fetched.insert(path, asset);
        }

        let count = fetched.len();
        let mut caches = self.caches.lock()
            .map_err(|e| format!("Failed to lock asset cache: {}", e))?;
        caches.entry(self.current.clone()).or_default().extend(fetched);

        info!("Cached {} assets in {}", count, self.current);
        Ok(count)
    }

    /// Drop caches left behind by other versions; returns their names
    pub fn purge_stale(&self) -> Vec<String> {
        let Ok(mut caches) = self.caches.lock() else {
            return Vec::new();
        };
        let stale: Vec<String> = caches.keys()
            .filter(|name| **name != self.current)
            .cloned()
            .collect();
        for name in &stale {
            caches.remove(name);
            info!("Deleted stale cache {}", name);
        }
        stale
    }

    /// Look up `path` in any cache
    pub fn lookup(&self, path: &str) -> Option<Asset> {
        let path = normalize_path(path);
        let caches = self.caches.lock().ok()?;
        if let Some(asset) = caches.get(&self.current).and_then(|c| c.get(&path)) {
            return Some(asset.clone());
        }
        caches.values().find_map(|c| c.get(&path).cloned())
    }

    /// Cache-first fetch: cached copy if present, otherwise the source.
    /// Source responses are not written back.
    pub async fn fetch(&self, source: &dyn AssetSource, path: &str) -> Result<Asset, String> {
        if let Some(asset) = self.lookup(path) {
            debug!("Cache hit: {}", path);
            return Ok(asset);
        }
        debug!("Cache miss, going to source: {}", path);
        source.fetch(&normalize_path(path)).await
    }

    #[cfg(test)]
    fn insert(&self, cache: &str, path: &str, asset: Asset) {
        let mut caches = self.caches.lock().unwrap();
        caches.entry(cache.to_string()).or_default().insert(normalize_path(path), asset);
    }
}
