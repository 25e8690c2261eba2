//! 错误类型定义

use std::time::Duration;

use thiserror::Error;

/// 模型服务调用错误
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Prompt was blocked by the provider: {0}")]
    Blocked(String),

    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    #[error("Model call was cancelled")]
    Cancelled,
}

/// 调研流程阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Evidence,
    Report,
    PartialReport,
    Images,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Plan => write!(f, "Plan generation"),
            Stage::Evidence => write!(f, "Evidence gathering"),
            Stage::Report => write!(f, "Report synthesis"),
            Stage::PartialReport => write!(f, "Partial report synthesis"),
            Stage::Images => write!(f, "Image lookup"),
        }
    }
}

/// 调研流程错误
#[derive(Debug, Error)]
pub enum ResearchError {
    #[error("Model provider error: {0}")]
    Provider(String),

    #[error("{stage} timed out after {}ms", after.as_millis())]
    Timeout { stage: Stage, after: Duration },

    #[error("Research was cancelled")]
    Cancelled,

    #[error("Plan generation failed: {0}")]
    Planning(String),

    #[error("Evidence parsing failed: {0}")]
    EvidenceParse(String),

    #[error("Report synthesis failed: {0}")]
    Synthesis(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl ResearchError {
    /// 是否由取消信号引起
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ResearchError::Cancelled)
    }

    /// 是否允许在重试预算内再次尝试
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ResearchError::Cancelled | ResearchError::InvalidQuery(_)
        )
    }
}

impl From<ModelError> for ResearchError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Cancelled => ResearchError::Cancelled,
            other => ResearchError::Provider(other.to_string()),
        }
    }
}

/// 图片检索错误
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} request failed with {status}")]
    Status { service: &'static str, status: u16 },

    #[error("Wikimedia API error: {0}")]
    Api(String),

    #[error("Image lookup was cancelled")]
    Cancelled,
}

/// 人物检索错误
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("SerpAPI error: {0}")]
    Status(u16),
}

impl ImageError {
    /// 转换为对外接口的HTTP状态码
    pub fn http_status(&self) -> u16 {
        match self {
            ImageError::Status { status: 429, .. } => 429,
            ImageError::Status { status, .. } if (400..500).contains(status) => 422,
            ImageError::Cancelled => 499,
            _ => 502,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_cancellation_maps_to_research_cancellation() {
        let err: ResearchError = ModelError::Cancelled.into();
        assert!(err.is_cancelled());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_provider_failures_are_retryable() {
        let err: ResearchError = ModelError::Api {
            status: 503,
            message: "overloaded".to_string(),
        }
        .into();
        assert!(matches!(err, ResearchError::Provider(_)));
        assert!(err.is_retryable());

        let timeout = ResearchError::Timeout {
            stage: Stage::Evidence,
            after: Duration::from_millis(60_000),
        };
        assert!(timeout.is_retryable());
        assert_eq!(
            timeout.to_string(),
            "Evidence gathering timed out after 60000ms"
        );
    }

    #[test]
    fn test_image_error_status_mapping() {
        let limited = ImageError::Status {
            service: "Wikimedia",
            status: 429,
        };
        assert_eq!(limited.http_status(), 429);
        assert_eq!(limited.to_string(), "Wikimedia request failed with 429");
        assert_eq!(
            ImageError::Status {
                service: "Wikimedia",
                status: 403
            }
            .http_status(),
            422
        );
        assert_eq!(ImageError::Api("badvalue".to_string()).http_status(), 502);
    }

    #[test]
    fn test_invalid_query_is_not_retryable() {
        let err = ResearchError::InvalidQuery("Query cannot be empty.".to_string());
        assert!(!err.is_retryable());
        assert!(!err.is_cancelled());
    }
}
