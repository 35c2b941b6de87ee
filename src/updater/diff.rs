//! Computes which bundles need downloading.

use std::collections::HashMap;

use regex::Regex;

use super::models::{BundleManifest, CategoryFilter, DownloadState, DownloadTask, KeyLayout};

/// Bundles selected for download, plus the key -> bundle name mapping used to
/// record results under the bare bundle name.
#[derive(Debug, Default, Clone)]
pub struct DiffSet {
    pub tasks: Vec<DownloadTask>,
    pub bundle_by_key: HashMap<String, String>,
}

impl DiffSet {
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn bundle_name(&self, key: &str) -> Option<&str> {
        self.bundle_by_key.get(key).map(|s| s.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct DiffEngine {
    filter: CategoryFilter,
    layout: KeyLayout,
    skip_patterns: Vec<Regex>,
    priority_patterns: Vec<Regex>,
}

impl DiffEngine {
    pub fn new(filter: CategoryFilter, layout: KeyLayout) -> Self {
        Self {
            filter,
            layout,
            skip_patterns: Vec::new(),
            priority_patterns: Vec::new(),
        }
    }

    /// Bundles whose name matches any of these are never selected.
    pub fn with_skip_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.skip_patterns = patterns;
        self
    }

    /// Earlier patterns are downloaded first; unmatched bundles go last.
    pub fn with_priority_patterns(mut self, patterns: Vec<Regex>) -> Self {
        self.priority_patterns = patterns;
        self
    }

    fn task_key(&self, name: &str, download_path: Option<&str>) -> String {
        match (self.layout, download_path) {
            (KeyLayout::DownloadPath, Some(path)) => format!("{}/{}", path, name),
            _ => name.to_string(),
        }
    }

    fn priority(&self, name: &str) -> usize {
        self.priority_patterns
            .iter()
            .position(|p| p.is_match(name))
            .unwrap_or(self.priority_patterns.len())
    }

    pub fn compute(&self, manifest: &BundleManifest, state: &DownloadState) -> DiffSet {
        let mut diff = DiffSet::default();

        for (name, entry) in &manifest.bundles {
            if self.skip_patterns.iter().any(|p| p.is_match(name)) {
                continue;
            }
            if !self.filter.allows(&entry.category, name) {
                continue;
            }
            if state.get(name) == Some(&entry.hash) {
                continue;
            }

            let key = self.task_key(name, entry.download_path.as_deref());
            diff.bundle_by_key.insert(key.clone(), name.clone());
            diff.tasks.push(DownloadTask {
                key,
                bundle_name: name.clone(),
                expected_hash: entry.hash.clone(),
                category: entry.category.clone(),
            });
        }

        diff.tasks.sort_by(|a, b| {
            self.priority(&a.bundle_name)
                .cmp(&self.priority(&b.bundle_name))
                .then_with(|| a.bundle_name.cmp(&b.bundle_name))
        });
        diff
    }
}
