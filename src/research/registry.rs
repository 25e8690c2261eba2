//! 引用来源登记表
//!
//! 一次调研内所有步骤共享同一张表：按归一化URL去重，按首次登记顺序分配从1开始的id。

use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::Mutex;

use super::types::{SourceCandidate, SourceReference};

/// 各步骤并发登记时共享的登记表
pub type SharedRegistry = Arc<Mutex<SourceRegistry>>;

/// 计算URL的去重键：scheme + host + path 小写，去掉端口、查询串、片段以及非根路径末尾的 `/`
///
/// 只用于比较，登记表中保存和展示的仍是原始URL。
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.to_lowercase();
    };

    let path = parsed.path();
    let path = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };

    format!(
        "{}://{}{}",
        parsed.scheme(),
        parsed.host_str().unwrap_or_default(),
        path
    )
    .to_lowercase()
}

/// 从URL推断域名
pub fn infer_domain(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
}

#[derive(Debug, Default)]
pub struct SourceRegistry {
    by_key: HashMap<String, usize>,
    ordered: Vec<SourceReference>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// 登记一个引用候选，已知URL直接返回已有引用
    pub fn register(&mut self, candidate: &SourceCandidate) -> SourceReference {
        let key = normalize_url(&candidate.url);
        if let Some(&position) = self.by_key.get(&key) {
            return self.ordered[position].clone();
        }

        let url = candidate.url.trim().to_string();
        let title = candidate
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| url.clone());
        let domain = candidate
            .domain
            .as_deref()
            .map(str::trim)
            .filter(|domain| !domain.is_empty())
            .map(str::to_string)
            .or_else(|| infer_domain(&url));

        let reference = SourceReference {
            id: (self.ordered.len() + 1).to_string(),
            url,
            title,
            domain,
        };
        self.by_key.insert(key, self.ordered.len());
        self.ordered.push(reference.clone());
        reference
    }

    /// 按首次登记顺序排列的全部引用
    pub fn sources(&self) -> &[SourceReference] {
        &self.ordered
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str) -> SourceCandidate {
        SourceCandidate {
            index: 0,
            url: url.to_string(),
            title: Some("Title".to_string()),
            domain: None,
        }
    }

    #[test]
    fn test_normalize_strips_query_fragment_and_trailing_slash() {
        assert_eq!(
            normalize_url("https://Example.COM/Wiki/Ada/?ref=1#intro"),
            "https://example.com/wiki/ada"
        );
        assert_eq!(normalize_url("https://example.com/"), "https://example.com/");
        assert_eq!(normalize_url("https://example.com:8443/a"), "https://example.com/a");
    }

    #[test]
    fn test_normalize_unparseable_url_is_lowercased() {
        assert_eq!(normalize_url("Not A URL"), "not a url");
    }

    #[test]
    fn test_equivalent_urls_share_one_id() {
        let mut registry = SourceRegistry::new();
        let first = registry.register(&candidate("https://example.com/ada"));
        let variants = [
            "https://example.com/ada/",
            "https://example.com/ada?utm_source=x",
            "https://EXAMPLE.com/ada",
        ];
        for url in variants {
            assert_eq!(registry.register(&candidate(url)).id, first.id);
        }
        assert_eq!(registry.len(), 1);
        // 保存的是第一次登记的原始URL
        assert_eq!(registry.sources()[0].url, "https://example.com/ada");
    }

    #[test]
    fn test_ids_are_dense_and_ordered_by_first_registration() {
        let mut registry = SourceRegistry::new();
        let a = registry.register(&candidate("https://a.example/1"));
        let b = registry.register(&candidate("https://b.example/2"));
        let again = registry.register(&candidate("https://a.example/1/"));
        let c = registry.register(&candidate("https://c.example/3"));

        assert_eq!(
            (a.id.as_str(), b.id.as_str(), again.id.as_str(), c.id.as_str()),
            ("1", "2", "1", "3")
        );
        let ids: Vec<&str> = registry.sources().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_title_and_domain_fallbacks() {
        let mut registry = SourceRegistry::new();
        let reference = registry.register(&SourceCandidate {
            index: 3,
            url: "https://en.wikipedia.org/wiki/Ada_Lovelace".to_string(),
            title: Some("   ".to_string()),
            domain: None,
        });

        assert_eq!(reference.title, "https://en.wikipedia.org/wiki/Ada_Lovelace");
        assert_eq!(reference.domain.as_deref(), Some("en.wikipedia.org"));

        let explicit = registry.register(&SourceCandidate {
            index: 4,
            url: "https://vertexaisearch.cloud.google.com/redirect/abc".to_string(),
            title: Some("britannica.com".to_string()),
            domain: Some("britannica.com".to_string()),
        });
        assert_eq!(explicit.domain.as_deref(), Some("britannica.com"));
    }

    #[tokio::test]
    async fn test_shared_registry_is_usable_across_tasks() {
        let registry = SourceRegistry::shared();
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    let mut guard = registry.lock().await;
                    guard.register(&candidate(&format!("https://site{}.example/", i % 2)))
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.lock().await.len(), 2);
    }
}
