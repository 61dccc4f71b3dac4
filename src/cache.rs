//! Per-file incremental compile cache (spec §9 "AMBIENT STACK" — cache
//! ported wholesale from the teacher).
//!
//! Grounded directly in the teacher's `cache.rs`: same
//! hash-then-compare-then-store shape, generalized from a `ZenIR` payload
//! to [`GeneratedOutput`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

use crate::codegen::GeneratedOutput;

#[derive(Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    pub output: GeneratedOutput,
}

pub struct IncrementalCache {
    cache_dir: PathBuf,
}

impl IncrementalCache {
    pub fn new(cache_dir: PathBuf) -> Self {
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).ok();
        }
        IncrementalCache { cache_dir }
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn cache_path(&self, file_path: &str) -> PathBuf {
        let safe_name = file_path.replace(['/', '\\', ':'], "_");
        self.cache_dir.join(format!("{safe_name}.json"))
    }

    pub fn get(&self, file_path: &str, source: &str) -> Option<GeneratedOutput> {
        let path = self.cache_path(file_path);
        let data = fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&data) {
            Ok(e) => e,
            Err(e) => {
                log::warn!("cache entry for {file_path} is corrupt, discarding: {e}");
                fs::remove_file(&path).ok();
                return None;
            }
        };
        if entry.hash == Self::compute_hash(source) {
            Some(entry.output)
        } else {
            None
        }
    }

    pub fn set(&self, file_path: &str, source: &str, output: GeneratedOutput) {
        let path = self.cache_path(file_path);
        let entry = CacheEntry { hash: Self::compute_hash(source), output };
        if let Ok(data) = serde_json::to_string(&entry) {
            fs::write(path, data).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_changes_with_source() {
        let a = IncrementalCache::compute_hash("div {}");
        let b = IncrementalCache::compute_hash("div { text { \"x\" } }");
        assert_ne!(a, b);
    }

    #[test]
    fn set_then_get_round_trips_when_source_unchanged() {
        let dir = std::env::temp_dir().join(format!("chtl-cache-test-{}", std::process::id()));
        let cache = IncrementalCache::new(dir.clone());
        let output = GeneratedOutput { html: "<div></div>".into(), css: String::new(), js: String::new() };
        cache.set("a.chtl", "div {}", output.clone());
        let fetched = cache.get("a.chtl", "div {}");
        assert!(fetched.is_some());
        assert_eq!(fetched.unwrap().html, output.html);
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn stale_source_misses_cache() {
        let dir = std::env::temp_dir().join(format!("chtl-cache-test-stale-{}", std::process::id()));
        let cache = IncrementalCache::new(dir.clone());
        cache.set("a.chtl", "div {}", GeneratedOutput::default());
        assert!(cache.get("a.chtl", "div { text { \"x\" } }").is_none());
        let _ = fs::remove_dir_all(dir);
    }
}
