//! 阶段调用的重试策略
//!
//! 每次尝试开始前检查取消信号；尝试本身同时受取消信号和独立的超时约束。
//! 超时按可重试失败处理，取消信号立即返回 `ResearchError::Cancelled` 且不再重试。

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::LLMConfig;
use crate::error::{ResearchError, Stage};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub stage: Stage,
    /// 首次调用之外的重试次数
    pub max_retries: u32,
    pub base_delay: Duration,
    /// 单次尝试的超时
    pub timeout: Duration,
}

impl RetryPolicy {
    pub fn new(stage: Stage, llm: &LLMConfig, timeout: Duration) -> Self {
        Self {
            stage,
            max_retries: llm.max_retries,
            base_delay: llm.retry_delay(),
            timeout,
        }
    }

    /// 总尝试次数
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// 第 attempt 次失败后的等待时间，线性增长
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}

/// 执行单次尝试：超时与取消信号任一先触发即结束
async fn run_attempt<T, Fut>(
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
    attempt: Fut,
) -> Result<T, ResearchError>
where
    Fut: Future<Output = Result<T, ResearchError>>,
{
    let timed = async {
        match tokio::time::timeout(policy.timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(ResearchError::Timeout {
                stage: policy.stage,
                after: policy.timeout,
            }),
        }
    };

    match cancel {
        Some(token) => tokio::select! {
            biased;
            _ = token.cancelled() => Err(ResearchError::Cancelled),
            result = timed => result,
        },
        None => timed.await,
    }
}

/// 通用重试逻辑，`operation` 接收从1开始的尝试序号
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: Option<&CancellationToken>,
    mut operation: F,
) -> Result<T, ResearchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ResearchError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;
        if is_cancelled(cancel) {
            return Err(ResearchError::Cancelled);
        }

        let err = match run_attempt(policy, cancel, operation(attempt)).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            return Err(err);
        }

        warn!(
            stage = %policy.stage,
            attempt,
            max_attempts = policy.attempts(),
            error = %err,
            "❌ 阶段调用失败"
        );

        if attempt >= policy.attempts() {
            return Err(err);
        }

        let delay = policy.backoff(attempt);
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(ResearchError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }
}
