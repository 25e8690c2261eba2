//! 人物公开资料检索
//!
//! 根据姓名、公司、职位拼出若干站点限定的查询并发执行。配置了 SerpAPI 时返回
//! 自然搜索结果，否则只返回各查询对应的搜索引擎链接。结果按链接去重。

use std::collections::HashSet;
use std::time::Duration;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::PersonSearchConfig;
use crate::error::SearchError;

/// 每次检索最多发出的查询数
pub const MAX_QUERIES: usize = 8;

const SITE_FILTERS: [&str; 10] = [
    "site:linkedin.com",
    "site:x.com OR site:twitter.com",
    "site:facebook.com",
    "site:instagram.com",
    "site:github.com",
    "site:qiita.com",
    "site:note.com",
    "site:wantedly.com",
    "site:researchmap.jp",
    "site:medium.com",
];

/// 检索条件，company 与 position 为空时视为未提供
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonQuery {
    pub full_name: String,
    pub company: Option<String>,
    pub position: Option<String>,
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl PersonQuery {
    pub fn new(full_name: &str, company: Option<&str>, position: Option<&str>) -> Self {
        Self {
            full_name: full_name.trim().to_string(),
            company: non_blank(company),
            position: non_blank(position),
        }
    }
}

/// 检索结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchProvider {
    #[serde(rename = "serpapi")]
    SerpApi,
    #[serde(rename = "links")]
    Links,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonResult {
    pub title: String,
    pub link: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub thumbnail: Option<String>,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonSearchResponse {
    pub results: Vec<PersonResult>,
    pub provider: SearchProvider,
}

/// 拼出去重后的查询列表，最多 [`MAX_QUERIES`] 条
pub fn build_queries(query: &PersonQuery) -> Vec<String> {
    let base = std::iter::once(query.full_name.as_str())
        .chain(query.company.as_deref())
        .chain(query.position.as_deref())
        .map(|part| format!("\"{}\"", part))
        .collect::<Vec<_>>()
        .join(" ");

    let mut seen = HashSet::new();
    std::iter::once(base.clone())
        .chain(SITE_FILTERS.iter().map(|site| format!("{} {}", base, site)))
        .filter(|q| seen.insert(q.clone()))
        .take(MAX_QUERIES)
        .collect()
}

/// 未配置 SerpAPI 时的兜底：只给出搜索引擎链接
pub fn fallback_links(query: &str) -> Vec<PersonResult> {
    [
        ("Google 検索", "https://www.google.com/search"),
        ("Bing 検索", "https://www.bing.com/search"),
    ]
    .into_iter()
    .filter_map(|(title, base)| {
        let link = Url::parse_with_params(base, &[("q", query)]).ok()?;
        Some(PersonResult {
            title: title.to_string(),
            link: link.to_string(),
            snippet: None,
            source: None,
            thumbnail: None,
            query: query.to_string(),
        })
    })
    .collect()
}

/// 按链接去重，保留查询顺序中的首次出现
pub fn merge_results(batches: Vec<Vec<PersonResult>>) -> Vec<PersonResult> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|result| seen.insert(result.link.clone()))
        .collect()
}

#[derive(Debug, Deserialize, Default)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<SerpItem>,
}

#[derive(Debug, Deserialize, Default)]
struct SerpItem {
    title: Option<String>,
    name: Option<String>,
    link: Option<String>,
    url: Option<String>,
    snippet: Option<String>,
    description: Option<String>,
    content: Option<String>,
    thumbnail: Option<String>,
    favicon: Option<String>,
}

impl SerpItem {
    fn into_result(self, query: &str) -> Option<PersonResult> {
        let link = non_blank(self.link.as_deref()).or_else(|| non_blank(self.url.as_deref()))?;
        let source = Url::parse(&link)
            .ok()
            .and_then(|url| url.host_str().map(|host| host.trim_start_matches("www.").to_string()));

        Some(PersonResult {
            title: non_blank(self.title.as_deref())
                .or_else(|| non_blank(self.name.as_deref()))
                .unwrap_or_else(|| link.clone()),
            snippet: self.snippet.or(self.description).or(self.content),
            source,
            thumbnail: self.thumbnail.or(self.favicon),
            query: query.to_string(),
            link,
        })
    }
}

#[derive(Clone)]
pub struct SerpApiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl SerpApiClient {
    pub fn new(api_key: &str, endpoint: &str, timeout: Duration) -> Result<Self, SearchError> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            api_key: api_key.to_string(),
            endpoint: endpoint.to_string(),
        })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<PersonResult>, SearchError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("hl", "ja"),
                ("num", "10"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let data: SerpResponse = response.json().await?;
        Ok(data
            .organic_results
            .into_iter()
            .filter_map(|item| item.into_result(query))
            .collect())
    }
}

/// 人物检索服务
#[derive(Clone)]
pub struct PersonSearch {
    serpapi: Option<SerpApiClient>,
}

impl PersonSearch {
    pub fn new(config: &PersonSearchConfig) -> Result<Self, SearchError> {
        let serpapi = match non_blank(config.serpapi_api_key.as_deref()) {
            Some(api_key) => Some(SerpApiClient::new(
                &api_key,
                &config.serpapi_endpoint,
                Duration::from_secs(config.request_timeout_secs),
            )?),
            None => None,
        };
        Ok(Self { serpapi })
    }

    pub fn provider(&self) -> SearchProvider {
        match self.serpapi {
            Some(_) => SearchProvider::SerpApi,
            None => SearchProvider::Links,
        }
    }

    async fn search_one(&self, query: &str) -> Result<Vec<PersonResult>, SearchError> {
        match &self.serpapi {
            Some(client) => client.search(query).await,
            None => Ok(fallback_links(query)),
        }
    }

    /// 并发执行所有查询；失败的查询只记录日志，不影响其他结果
    pub async fn search(&self, query: &PersonQuery) -> PersonSearchResponse {
        let queries = build_queries(query);

        let mut pending: FuturesUnordered<_> = queries
            .iter()
            .enumerate()
            .map(|(position, q)| async move { (position, q, self.search_one(q).await) })
            .collect();

        let mut batches = Vec::with_capacity(queries.len());
        while let Some((position, q, outcome)) = pending.next().await {
            match outcome {
                Ok(results) => batches.push((position, results)),
                Err(err) => warn!(query = %q, error = %err, "person search query failed"),
            }
        }
        batches.sort_by_key(|(position, _)| *position);

        let results = merge_results(batches.into_iter().map(|(_, results)| results).collect());
        info!(
            queries = queries.len(),
            results = results.len(),
            provider = ?self.provider(),
            "🔍 人物检索完成"
        );

        PersonSearchResponse {
            results,
            provider: self.provider(),
        }
    }
}
