use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

/// 缓存性能监控器
#[derive(Clone, Default)]
pub struct CachePerformanceMonitor {
    metrics: Arc<CacheMetrics>,
}

/// 缓存指标
#[derive(Default)]
pub struct CacheMetrics {
    /// 缓存命中次数
    pub cache_hits: AtomicUsize,
    /// 缓存未命中次数（包含已过期）
    pub cache_misses: AtomicUsize,
    /// 缓存写入次数
    pub cache_writes: AtomicUsize,
    /// 过期淘汰次数
    pub cache_expirations: AtomicUsize,
}

/// 缓存性能报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePerformanceReport {
    pub category: String,
    /// 缓存命中率
    pub hit_rate: f64,
    pub total_operations: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub cache_writes: usize,
    pub cache_expirations: usize,
}

impl CachePerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self, category: &str, key: &str) {
        self.metrics.cache_hits.fetch_add(1, Ordering::Relaxed);
        debug!(category, key, "💰 缓存命中");
    }

    pub fn record_cache_miss(&self, category: &str, key: &str) {
        self.metrics.cache_misses.fetch_add(1, Ordering::Relaxed);
        debug!(category, key, "⌛ 缓存未命中");
    }

    pub fn record_cache_expiration(&self, category: &str, key: &str) {
        self.metrics.cache_expirations.fetch_add(1, Ordering::Relaxed);
        debug!(category, key, "缓存已过期");
    }

    pub fn record_cache_write(&self, category: &str, key: &str) {
        self.metrics.cache_writes.fetch_add(1, Ordering::Relaxed);
        debug!(category, key, "💾 缓存写入");
    }

    /// 生成性能报告
    pub fn generate_report(&self, category: &str) -> CachePerformanceReport {
        let hits = self.metrics.cache_hits.load(Ordering::Relaxed);
        let misses = self.metrics.cache_misses.load(Ordering::Relaxed);
        let total_operations = hits + misses;

        let hit_rate = if total_operations > 0 {
            hits as f64 / total_operations as f64
        } else {
            0.0
        };

        CachePerformanceReport {
            category: category.to_string(),
            hit_rate,
            total_operations,
            cache_hits: hits,
            cache_misses: misses,
            cache_writes: self.metrics.cache_writes.load(Ordering::Relaxed),
            cache_expirations: self.metrics.cache_expirations.load(Ordering::Relaxed),
        }
    }
}
