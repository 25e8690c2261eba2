use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use crate::i18n::Locale;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "deepresearch.toml";

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    /// LLM模型配置
    pub llm: LLMConfig,

    /// 调研流程配置
    pub research: ResearchConfig,

    /// 配图检索配置
    pub images: ImageSearchConfig,

    /// 人物公开资料检索配置
    pub search: PersonSearchConfig,

    /// HTTP服务配置
    pub server: ServerConfig,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// Gemini API KEY
    pub api_key: String,

    /// Gemini API基地址
    pub api_base_url: String,

    /// 模型名称
    pub model: String,

    /// 失败后的重试次数（不含首次调用）
    pub max_retries: u32,

    /// 重试基础间隔（毫秒），第n次重试等待 n * retry_delay_ms
    pub retry_delay_ms: u64,

    /// HTTP请求的整体超时时间（秒）
    pub request_timeout_secs: u64,
}

/// 调研流程各阶段的超时配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ResearchConfig {
    /// 计划生成单次调用超时（毫秒）
    pub plan_timeout_ms: u64,

    /// 证据收集单次调用超时（毫秒），包含联网搜索
    pub evidence_timeout_ms: u64,

    /// 报告合成单次调用超时（毫秒）
    pub report_timeout_ms: u64,

    /// 取消后生成部分报告的硬超时（毫秒）
    pub partial_report_timeout_ms: u64,

    /// 默认输出语言
    pub default_locale: Locale,
}

/// 配图检索配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ImageSearchConfig {
    /// 是否启用配图检索
    pub enabled: bool,

    /// Google Custom Search API KEY
    pub google_api_key: Option<String>,

    /// Google Custom Search 引擎ID
    pub google_cse_cx: Option<String>,

    /// 请求Wikimedia时在User-Agent中声明的联系邮箱
    pub contact_email: String,

    /// 返回的最大图片数量
    pub max_images: usize,

    /// 缩略图宽度
    pub thumbnail_width: u32,

    /// Wikimedia 单次检索条目上限
    pub wikimedia_search_limit: u32,

    /// 图片结果缓存时间（秒）
    pub image_cache_ttl_secs: u64,

    /// 主体名称缓存时间（秒）
    pub subject_cache_ttl_secs: u64,

    /// 外部图片服务请求超时（秒）
    pub request_timeout_secs: u64,
}

/// 人物公开资料检索配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PersonSearchConfig {
    /// SerpAPI KEY，未配置时只返回搜索引擎链接
    pub serpapi_api_key: Option<String>,

    /// SerpAPI 接口地址
    pub serpapi_endpoint: String,

    /// 请求超时（秒）
    pub request_timeout_secs: u64,
}

/// HTTP服务配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub bind_addr: String,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &PathBuf) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 检查运行调研所必需的配置
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            anyhow::bail!(
                "Missing API key. Provide GEMINI_API_KEY or GOOGLE_API_KEY, or set llm.api_key in {}",
                DEFAULT_CONFIG_FILE
            );
        }
        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model cannot be empty");
        }
        Ok(())
    }
}

impl LLMConfig {
    /// 重试基础间隔
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl ResearchConfig {
    pub fn plan_timeout(&self) -> Duration {
        Duration::from_millis(self.plan_timeout_ms)
    }

    pub fn evidence_timeout(&self) -> Duration {
        Duration::from_millis(self.evidence_timeout_ms)
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }

    pub fn partial_report_timeout(&self) -> Duration {
        Duration::from_millis(self.partial_report_timeout_ms)
    }
}

impl ImageSearchConfig {
    /// Google Custom Search 是否可用（API KEY 与引擎ID均已配置）
    pub fn custom_search_credentials(&self) -> Option<(&str, &str)> {
        match (self.google_api_key.as_deref(), self.google_cse_cx.as_deref()) {
            (Some(key), Some(cx)) if !key.trim().is_empty() && !cx.trim().is_empty() => {
                Some((key.trim(), cx.trim()))
            }
            _ => None,
        }
    }
}

/// 读取环境变量，空白值视为未设置
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            api_key: env_var("GEMINI_API_KEY")
                .or_else(|| env_var("GOOGLE_API_KEY"))
                .unwrap_or_default(),
            api_base_url: String::from("https://generativelanguage.googleapis.com/v1beta"),
            model: env_var("GEMINI_MODEL").unwrap_or_else(|| String::from("gemini-flash-latest")),
            max_retries: 2,
            retry_delay_ms: 1000,
            request_timeout_secs: 120,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            plan_timeout_ms: 30_000,
            evidence_timeout_ms: 60_000,
            report_timeout_ms: 45_000,
            partial_report_timeout_ms: 5_000,
            default_locale: Locale::default(),
        }
    }
}

impl Default for ImageSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            google_api_key: env_var("GOOGLE_API_KEY"),
            google_cse_cx: env_var("GOOGLE_CSE_CX"),
            contact_email: env_var("WHOISP_CONTACT_EMAIL")
                .unwrap_or_else(|| String::from("contact@deepresearch.local")),
            max_images: 10,
            thumbnail_width: 512,
            wikimedia_search_limit: 20,
            image_cache_ttl_secs: 5 * 60,
            subject_cache_ttl_secs: 30 * 60,
            request_timeout_secs: 15,
        }
    }
}

impl Default for PersonSearchConfig {
    fn default() -> Self {
        Self {
            serpapi_api_key: env_var("SERPAPI_API_KEY"),
            serpapi_endpoint: String::from("https://serpapi.com/search.json"),
            request_timeout_secs: 15,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: String::from("127.0.0.1:3000"),
        }
    }
}
