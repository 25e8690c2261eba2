use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;

pub mod performance_monitor;
pub use performance_monitor::{CachePerformanceMonitor, CachePerformanceReport};

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

/// 进程内的TTL缓存
///
/// 过期条目在读取时惰性删除。锁只在同步代码中持有。
pub struct TtlCache<T> {
    category: String,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<T>>>,
    performance_monitor: CachePerformanceMonitor,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(category: impl Into<String>, ttl: Duration) -> Self {
        Self {
            category: category.into(),
            ttl,
            entries: RwLock::new(HashMap::new()),
            performance_monitor: CachePerformanceMonitor::new(),
        }
    }

    /// 获取缓存
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Instant::now();
        let lookup = match self.entries.read() {
            Ok(entries) => entries
                .get(key)
                .map(|entry| (entry.expires_at > now, entry.data.clone())),
            Err(_) => None,
        };

        match lookup {
            Some((true, data)) => {
                self.performance_monitor.record_cache_hit(&self.category, key);
                Some(data)
            }
            Some((false, _)) => {
                self.remove(key);
                self.performance_monitor
                    .record_cache_expiration(&self.category, key);
                self.performance_monitor.record_cache_miss(&self.category, key);
                None
            }
            None => {
                self.performance_monitor.record_cache_miss(&self.category, key);
                None
            }
        }
    }

    /// 设置缓存
    pub fn set(&self, key: impl Into<String>, data: T) {
        let key = key.into();
        if let Ok(mut entries) = self.entries.write() {
            self.performance_monitor.record_cache_write(&self.category, &key);
            entries.insert(
                key,
                CacheEntry {
                    data,
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
    }

    pub fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(key);
        }
    }

    /// 生成性能报告
    pub fn generate_performance_report(&self) -> CachePerformanceReport {
        self.performance_monitor.generate_report(&self.category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let cache = TtlCache::new("subjects", Duration::from_secs(60));
        cache.set("en:ada lovelace", "Ada Lovelace".to_string());

        assert_eq!(cache.get("en:ada lovelace").as_deref(), Some("Ada Lovelace"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.get("en:ada lovelace"), None);

        let report = cache.generate_performance_report();
        assert_eq!(report.category, "subjects");
        assert_eq!(report.cache_hits, 1);
        assert_eq!(report.cache_misses, 1);
        assert_eq!(report.cache_writes, 1);
        assert_eq!(report.cache_expirations, 1);
        assert!((report.hit_rate - 0.5).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_refreshes_expiry() {
        let cache = TtlCache::new("images", Duration::from_secs(10));
        cache.set("k", 1);
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set("k", 2);
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get("k"), Some(2));
    }

    #[test]
    fn test_remove_and_empty_report() {
        let cache: TtlCache<Vec<u8>> = TtlCache::new("images", Duration::from_secs(10));
        assert_eq!(cache.generate_performance_report().hit_rate, 0.0);
        cache.set("k", vec![1]);
        cache.remove("k");
        assert_eq!(cache.get("k"), None);
    }
}
