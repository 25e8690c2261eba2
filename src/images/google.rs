//! Google Custom Search 图片检索

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::ImageError;
use crate::research::registry::infer_domain;
use crate::research::types::DeepResearchImage;

pub const CUSTOM_SEARCH_ENDPOINT: &str = "https://www.googleapis.com/customsearch/v1";

#[derive(Debug, Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SearchItem {
    link: Option<String>,
    title: Option<String>,
    image: Option<ItemImage>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ItemImage {
    context_link: Option<String>,
    thumbnail_link: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct GoogleImageSearch {
    http: reqwest::Client,
    api_key: String,
    cx: String,
    max_images: usize,
}

impl GoogleImageSearch {
    pub fn new(
        api_key: &str,
        cx: &str,
        max_images: usize,
        timeout: Duration,
    ) -> Result<Self, ImageError> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            api_key: api_key.to_string(),
            cx: cx.to_string(),
            max_images,
        })
    }

    async fn request(&self, subject: &str) -> Result<SearchResponse, ImageError> {
        let response = self
            .http
            .get(CUSTOM_SEARCH_ENDPOINT)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.cx.as_str()),
                ("q", subject),
                ("searchType", "image"),
                ("num", "10"),
                ("safe", "active"),
                ("imgType", "face"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(500).collect();
            warn!(subject, status = status.as_u16(), body = %body, "Custom Search API returned an error");
            return Err(ImageError::Status {
                service: "Custom Search",
                status: status.as_u16(),
            });
        }

        Ok(response.json::<SearchResponse>().await?)
    }

    pub async fn search(
        &self,
        subject: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<DeepResearchImage>, ImageError> {
        let data = tokio::select! {
            _ = cancel.cancelled() => return Err(ImageError::Cancelled),
            result = self.request(subject) => result?,
        };
        Ok(collect_images(data, self.max_images))
    }
}

fn collect_images(data: SearchResponse, max_images: usize) -> Vec<DeepResearchImage> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for item in data.items {
        let Some(url) = non_blank(item.link.as_ref()) else {
            continue;
        };
        if !seen.insert(url.to_lowercase()) {
            continue;
        }

        let image = item.image.unwrap_or_default();
        let source_url = non_blank(image.context_link.as_ref());
        images.push(DeepResearchImage {
            url,
            title: non_blank(item.title.as_ref()),
            source_title: source_url.as_deref().and_then(infer_domain),
            source_url,
            thumbnail_url: non_blank(image.thumbnail_link.as_ref()),
            width: image.width,
            height: image.height,
        });

        if images.len() >= max_images {
            break;
        }
    }

    images
}
