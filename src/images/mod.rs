//! 调研主体的配图检索
//!
//! 先用模型把查询解析为主体名称，然后优先走 Google Custom Search，
//! 未配置或失败时回退到 Wikimedia Commons。除取消外的失败都降级为空列表。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::TtlCache;
use crate::config::ImageSearchConfig;
use crate::error::{ImageError, ModelError};
use crate::i18n::Locale;
use crate::llm::client::ModelClient;
use crate::research::registry::infer_domain;
use crate::research::types::DeepResearchImage;

pub mod google;
pub mod subject;
pub mod wikimedia;

pub use google::GoogleImageSearch;
pub use subject::{normalize_query, resolve_primary_subject};
pub use wikimedia::{PersonImage, WikimediaClient};

/// 配图检索能力
#[async_trait]
pub trait ImageLookup: Send + Sync {
    async fn lookup(
        &self,
        query: &str,
        locale: Locale,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeepResearchImage>, ImageError>;
}

/// 不检索任何图片
#[derive(Debug, Default, Clone, Copy)]
pub struct NoImages;

#[async_trait]
impl ImageLookup for NoImages {
    async fn lookup(
        &self,
        _query: &str,
        _locale: Locale,
        _cancel: &CancellationToken,
    ) -> Result<Vec<DeepResearchImage>, ImageError> {
        Ok(Vec::new())
    }
}

fn cache_key(locale: Locale, value: &str) -> String {
    format!("{}:{}", locale, value.to_lowercase())
}

impl From<PersonImage> for DeepResearchImage {
    fn from(image: PersonImage) -> Self {
        Self {
            source_title: infer_domain(&image.source_page),
            url: image.full_size_url,
            title: Some(image.title),
            source_url: Some(image.source_page),
            thumbnail_url: Some(image.thumbnail_url),
            width: None,
            height: None,
        }
    }
}

/// 基于主体解析的配图检索
pub struct SubjectImageFinder {
    model_client: Arc<dyn ModelClient>,
    google: Option<GoogleImageSearch>,
    wikimedia: WikimediaClient,
    image_cache: TtlCache<Vec<DeepResearchImage>>,
    subject_cache: TtlCache<String>,
    warned_missing_config: AtomicBool,
}

impl SubjectImageFinder {
    pub fn new(
        config: &ImageSearchConfig,
        model_client: Arc<dyn ModelClient>,
    ) -> Result<Self, ImageError> {
        let google = match config.custom_search_credentials() {
            Some((api_key, cx)) => Some(GoogleImageSearch::new(
                api_key,
                cx,
                config.max_images,
                Duration::from_secs(config.request_timeout_secs),
            )?),
            None => None,
        };

        Ok(Self {
            model_client,
            google,
            wikimedia: WikimediaClient::new(config)?,
            image_cache: TtlCache::new(
                "subject_images",
                Duration::from_secs(config.image_cache_ttl_secs),
            ),
            subject_cache: TtlCache::new(
                "image_subjects",
                Duration::from_secs(config.subject_cache_ttl_secs),
            ),
            warned_missing_config: AtomicBool::new(false),
        })
    }

    /// 替换 Wikimedia 客户端
    pub fn with_wikimedia(mut self, wikimedia: WikimediaClient) -> Self {
        self.wikimedia = wikimedia;
        self
    }

    pub fn image_cache(&self) -> &TtlCache<Vec<DeepResearchImage>> {
        &self.image_cache
    }

    pub fn subject_cache(&self) -> &TtlCache<String> {
        &self.subject_cache
    }

    /// 解析主体名称，结果按 `locale:查询` 缓存
    pub async fn resolve_subject(
        &self,
        query: &str,
        locale: Locale,
        cancel: &CancellationToken,
    ) -> Result<String, ImageError> {
        let key = cache_key(locale, query);
        if let Some(subject) = self.subject_cache.get(&key) {
            return Ok(subject);
        }

        let subject =
            match resolve_primary_subject(self.model_client.as_ref(), query, locale, cancel).await
            {
                Ok(subject) => subject,
                Err(ModelError::Cancelled) => return Err(ImageError::Cancelled),
                Err(_) => normalize_query(query),
            };
        self.subject_cache.set(key, subject.clone());
        Ok(subject)
    }

    async fn wikimedia_images(
        &self,
        query: &str,
        locale: Locale,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeepResearchImage>, ImageError> {
        match self
            .wikimedia
            .fetch_person_images(query, locale, Some(cancel))
            .await
        {
            Ok(images) => Ok(images.into_iter().map(DeepResearchImage::from).collect()),
            Err(ImageError::Cancelled) => Err(ImageError::Cancelled),
            Err(err) => {
                warn!(query, error = %err, "Wikimedia image lookup failed");
                Ok(Vec::new())
            }
        }
    }

    /// 依次用主体名称和原始查询检索 Wikimedia
    async fn attempt_fallback(
        &self,
        subject: &str,
        original_query: &str,
        locale: Locale,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeepResearchImage>, ImageError> {
        let key = cache_key(locale, subject);

        let first = self.wikimedia_images(subject, locale, cancel).await?;
        if !first.is_empty() {
            self.image_cache.set(key, first.clone());
            return Ok(first);
        }

        if subject != original_query {
            let second = self
                .wikimedia_images(original_query, locale, cancel)
                .await?;
            if !second.is_empty() {
                self.image_cache.set(key, second.clone());
                return Ok(second);
            }
        }

        warn!(subject, original_query, "no images found");
        self.image_cache.remove(&key);
        Ok(Vec::new())
    }
}

#[async_trait]
impl ImageLookup for SubjectImageFinder {
    async fn lookup(
        &self,
        query: &str,
        locale: Locale,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeepResearchImage>, ImageError> {
        let normalized = normalize_query(query);
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        if cancel.is_cancelled() {
            return Err(ImageError::Cancelled);
        }

        let subject = self.resolve_subject(&normalized, locale, cancel).await?;
        if let Some(images) = self.image_cache.get(&cache_key(locale, &subject)) {
            let report = self.image_cache.generate_performance_report();
            debug!(
                category = %report.category,
                hit_rate = report.hit_rate,
                hits = report.cache_hits,
                misses = report.cache_misses,
                "subject images served from cache"
            );
            return Ok(images);
        }

        let Some(google) = &self.google else {
            if !self.warned_missing_config.swap(true, Ordering::Relaxed) {
                warn!("GOOGLE_API_KEY or GOOGLE_CSE_CX is not configured, using Wikimedia Commons only");
            }
            return self
                .attempt_fallback(&subject, &normalized, locale, cancel)
                .await;
        };

        match google.search(&subject, cancel).await {
            Ok(images) if !images.is_empty() => {
                info!(subject = %subject, count = images.len(), "🖼️ 配图检索完成");
                self.image_cache
                    .set(cache_key(locale, &subject), images.clone());
                Ok(images)
            }
            Ok(_) => {
                warn!(subject = %subject, "no images from Custom Search, trying Wikimedia");
                self.attempt_fallback(&subject, &normalized, locale, cancel)
                    .await
            }
            Err(ImageError::Cancelled) => Err(ImageError::Cancelled),
            Err(err) => {
                warn!(subject = %subject, error = %err, "Custom Search failed, trying Wikimedia");
                self.attempt_fallback(&subject, &normalized, locale, cancel)
                    .await
            }
        }
    }
}
