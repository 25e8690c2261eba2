//! Wikimedia Commons 人物图片检索

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ImageSearchConfig;
use crate::error::ImageError;
use crate::i18n::Locale;
use crate::utils::html::strip_html;

pub const WIKIMEDIA_ENDPOINT: &str = "https://commons.wikimedia.org/w/api.php";

const ACCEPTED_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/webp"];

/// Commons上的一张人物图片
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonImage {
    pub id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub full_size_url: String,
    pub source_page: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WikimediaResponse {
    query: Option<WikimediaQuery>,
    error: Option<WikimediaApiError>,
}

#[derive(Debug, Deserialize, Default)]
struct WikimediaQuery {
    #[serde(default)]
    pages: HashMap<String, WikimediaPage>,
}

#[derive(Debug, Deserialize)]
struct WikimediaApiError {
    code: Option<String>,
    info: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct WikimediaPage {
    pageid: u64,
    #[serde(default)]
    title: String,
    /// 搜索结果中的排序位置
    index: Option<u32>,
    #[serde(default)]
    imageinfo: Vec<ImageInfo>,
}

#[derive(Debug, Deserialize, Default)]
struct ImageInfo {
    thumburl: Option<String>,
    url: Option<String>,
    descriptionurl: Option<String>,
    mime: Option<String>,
    extmetadata: Option<HashMap<String, MetadataField>>,
}

#[derive(Debug, Deserialize, Default)]
struct MetadataField {
    value: Option<Value>,
}

impl ImageInfo {
    fn metadata(&self, key: &str) -> Option<&str> {
        self.extmetadata
            .as_ref()?
            .get(key)?
            .value
            .as_ref()?
            .as_str()
            .filter(|value| !value.trim().is_empty())
    }
}

/// 按字母与数字以外的字符切分并转小写
pub fn tokenize(query: &str) -> Vec<String> {
    query
        .split(|c: char| !c.is_alphanumeric())
        .map(|token| token.trim().to_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// 查询中含拉丁字母时，要求结果文本至少命中一个词
fn requires_token_match(tokens: &[String]) -> bool {
    tokens
        .iter()
        .any(|token| token.chars().any(|c| c.is_ascii_lowercase()))
}

fn normalize_title(page: &WikimediaPage) -> String {
    let title = page.title.trim();
    let cleaned = match title.get(..5) {
        Some(prefix) if prefix.eq_ignore_ascii_case("file:") => title[5..].trim(),
        _ => title,
    };
    if cleaned.is_empty() {
        "Untitled".to_string()
    } else {
        cleaned.to_string()
    }
}

fn normalize_attribution(info: &ImageInfo) -> Option<String> {
    let raw = info
        .metadata("Artist")
        .or_else(|| info.metadata("Credit"))
        .or_else(|| info.metadata("Source"))?;
    let text = strip_html(raw);
    (!text.is_empty()).then_some(text)
}

fn matching_text(page: &WikimediaPage, info: &ImageInfo) -> String {
    let pieces: Vec<&str> = [
        Some(page.title.as_str()),
        info.metadata("ObjectName"),
        info.metadata("ImageDescription"),
        info.metadata("Credit"),
    ]
    .into_iter()
    .flatten()
    .filter(|piece| !piece.is_empty())
    .collect();
    strip_html(&pieces.join(" \n "))
}

fn normalize_image(
    page: &WikimediaPage,
    tokens: &[String],
    require_token_match: bool,
) -> Option<PersonImage> {
    let info = page.imageinfo.first()?;
    let mime = info.mime.as_deref()?.to_lowercase();
    if !ACCEPTED_MIME_TYPES.contains(&mime.as_str()) {
        return None;
    }

    let full_size_url = info.url.as_ref().or(info.thumburl.as_ref())?.clone();
    let thumbnail_url = info.thumburl.as_ref().or(info.url.as_ref())?.clone();
    let source_page = info.descriptionurl.clone()?;

    if require_token_match {
        let haystack = matching_text(page, info).to_lowercase();
        if !tokens.iter().any(|token| haystack.contains(token.as_str())) {
            return None;
        }
    }

    Some(PersonImage {
        id: format!("commons-{}", page.pageid),
        title: normalize_title(page),
        thumbnail_url,
        full_size_url,
        source_page,
        attribution: normalize_attribution(info),
    })
}

/// Wikimedia Commons 客户端
#[derive(Clone)]
pub struct WikimediaClient {
    http: reqwest::Client,
    endpoint: String,
    user_agent: String,
    search_limit: u32,
    thumbnail_width: u32,
    max_images: usize,
}

impl WikimediaClient {
    pub fn new(config: &ImageSearchConfig) -> Result<Self, ImageError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: WIKIMEDIA_ENDPOINT.to_string(),
            user_agent: format!("WhoisP/1.0 (+mailto:{})", config.contact_email),
            search_limit: config.wikimedia_search_limit,
            thumbnail_width: config.thumbnail_width,
            max_images: config.max_images,
        })
    }

    /// 替换API地址
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn search_params(&self, query: &str, locale: Locale) -> Vec<(&'static str, String)> {
        vec![
            ("action", "query".to_string()),
            ("format", "json".to_string()),
            ("generator", "search".to_string()),
            ("gsrlimit", self.search_limit.to_string()),
            ("gsrnamespace", "6".to_string()),
            ("gsrprop", "size|wordcount".to_string()),
            (
                "gsrsearch",
                format!("{} {}", query, locale.portrait_search_suffix())
                    .trim()
                    .to_string(),
            ),
            ("prop", "imageinfo".to_string()),
            ("iiprop", "url|mime|extmetadata".to_string()),
            ("iiurlwidth", self.thumbnail_width.to_string()),
            ("origin", "*".to_string()),
        ]
    }

    async fn request(
        &self,
        query: &str,
        locale: Locale,
    ) -> Result<WikimediaResponse, ImageError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&self.search_params(query, locale))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status {
                service: "Wikimedia",
                status: status.as_u16(),
            });
        }

        Ok(response.json::<WikimediaResponse>().await?)
    }

    /// 检索人物图片
    pub async fn fetch_person_images(
        &self,
        query: &str,
        locale: Locale,
        cancel: Option<&CancellationToken>,
    ) -> Result<Vec<PersonImage>, ImageError> {
        let trimmed = query.trim();
        let tokens = tokenize(trimmed);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let data = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(ImageError::Cancelled),
                result = self.request(trimmed, locale) => result?,
            },
            None => self.request(trimmed, locale).await?,
        };

        let images = self.collect_images(data, &tokens)?;
        debug!(query = trimmed, count = images.len(), "Wikimedia images collected");
        Ok(images)
    }

    fn collect_images(
        &self,
        data: WikimediaResponse,
        tokens: &[String],
    ) -> Result<Vec<PersonImage>, ImageError> {
        if let Some(error) = data.error {
            return Err(ImageError::Api(
                error
                    .info
                    .or(error.code)
                    .unwrap_or_else(|| "Wikimedia API error".to_string()),
            ));
        }

        let mut pages: Vec<WikimediaPage> = data
            .query
            .map(|query| query.pages.into_values().collect())
            .unwrap_or_default();
        pages.sort_by_key(|page| (page.index.unwrap_or(u32::MAX), page.pageid));

        let require_token_match = requires_token_match(tokens);
        let mut seen = HashSet::new();
        let mut images = Vec::new();

        for page in &pages {
            let Some(image) = normalize_image(page, tokens, require_token_match) else {
                continue;
            };
            if !seen.insert(image.full_size_url.to_lowercase()) {
                continue;
            }
            images.push(image);
            if images.len() >= self.max_images {
                break;
            }
        }

        Ok(images)
    }
}
