use std::{collections::HashMap, sync::Mutex};
use tracing::debug;

use crate::desktop::DesktopDescriptor;

/// Maps window classes to icon identifiers from application descriptors.
///
/// Lookups are cached by lowercased class, misses included, so each class
/// costs at most one pass over the descriptor list per process.
pub struct IconResolver {
    descriptors: Vec<DesktopDescriptor>,
    cache: Mutex<IconCache>,
}

#[derive(Default)]
struct IconCache {
    icons: HashMap<String, Option<String>>,
    scans: usize,
}

impl IconResolver {
    pub fn new(descriptors: Vec<DesktopDescriptor>) -> Self {
        Self {
            descriptors,
            cache: Mutex::new(IconCache::default()),
        }
    }

    pub fn resolve(&self, class: &str) -> Option<String> {
        if class.is_empty() {
            return None;
        }
        let key = class.to_lowercase();
        if let Some(icon) = self.lock().icons.get(&key) {
            return icon.clone();
        }

        let found = self.search(&key);
        debug!(class = %key, icon = ?found, "icon cache miss");

        let mut cache = self.lock();
        cache.scans += 1;
        cache.icons.entry(key).or_insert(found).clone()
    }

    /// Number of descriptor scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.lock().scans
    }

    fn search(&self, key: &str) -> Option<String> {
        let found = self.find_descriptor(key)?;
        debug!(class = %key, entry = %found.name, path = %found.path.display(), "matched descriptor");
        Some(found.icon.clone())
    }

    fn find_descriptor(&self, key: &str) -> Option<&DesktopDescriptor> {
        let by_stem = self
            .descriptors
            .iter()
            .filter(|d| d.stem().to_lowercase() == key)
            .find(|d| !d.icon.is_empty());
        let by_wm_class = || {
            self.descriptors
                .iter()
                .filter(|d| !d.startup_wm_class.is_empty())
                .filter(|d| d.startup_wm_class.to_lowercase() == key)
                .find(|d| !d.icon.is_empty())
        };
        by_stem.or_else(by_wm_class)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IconCache> {
        // The cache holds plain data, so a poisoned lock is still usable.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
