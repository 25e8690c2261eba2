#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use deepresearch_rs::config::Config;
use deepresearch_rs::error::ModelError;
use deepresearch_rs::images::NoImages;
use deepresearch_rs::llm::client::{
    GenerateResponse, GenerationConfig, GroundingChunk, GroundingMetadata, ModelClient,
};
use deepresearch_rs::research::ResearchContext;
use tokio::sync::Notify;

pub const STEP_QUERIES: [&str; 4] = [
    "ada early life",
    "ada analytical engine",
    "ada note g",
    "ada legacy",
];

/// 根据提示词内容返回预设响应的模型
#[derive(Default)]
pub struct ScriptedModel {
    /// 计划阶段返回的原文；为空时使用四步的默认计划
    pub plan: Option<String>,
    /// 证据收集总是失败的步骤查询
    pub failing_steps: Vec<&'static str>,
    /// 直到被取消都不会返回的步骤查询
    pub slow_steps: Vec<&'static str>,
    pub report_fails: bool,
    /// 计划阶段挂起，直到调用被放弃
    pub hang_plan: bool,
    /// 带取消信号的完整报告合成挂起
    pub hang_full_report: bool,
    /// 不带取消信号的补救合成挂起
    pub hang_partial_report: bool,
    /// 每次开始挂起时通知一次
    pub started: Notify,
    /// 被放弃的挂起调用数
    pub abandoned: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    async fn hang(&self) -> Result<GenerateResponse, ModelError> {
        let _mark = MarkOnDrop(&self.abandoned);
        self.started.notify_one();
        std::future::pending().await
    }
}

/// 挂起的调用被丢弃时计数
struct MarkOnDrop<'a>(&'a AtomicUsize);

impl Drop for MarkOnDrop<'_> {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn default_plan() -> String {
    let steps = STEP_QUERIES
        .iter()
        .enumerate()
        .map(|(i, query)| {
            format!(
                r#"{{"id":"S{n}","title":"Step {n} title","query":"{query}","angle":"angle {n}","deliverable":"deliverable {n}"}}"#,
                n = i + 1
            )
        })
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"{{"primaryGoal":"Profile Ada Lovelace","rationale":"Cover life and work","steps":[{steps}],"expectedInsights":["contributions"]}}"#
    )
}

fn evidence_response(step_number: usize) -> GenerateResponse {
    let text = format!(
        r#"```json
{{"summary":"summary {n}","findings":[{{"heading":"heading {n}","insight":"insight {n}","evidence":"evidence {n}","confidence":"high","sourceIds":[1,2,9]}}]}}
```"#,
        n = step_number
    );

    GenerateResponse::text(text).with_grounding(GroundingMetadata {
        chunks: vec![
            GroundingChunk {
                index: 0,
                url: "https://example.org/shared".to_string(),
                title: Some("Shared source".to_string()),
                domain: None,
            },
            GroundingChunk {
                index: 1,
                url: format!("https://site{}.example.com/page", step_number),
                title: None,
                domain: None,
            },
        ],
        web_search_queries: vec![format!("search {}", step_number)],
    })
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerateResponse, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if prompt.contains("Synthesize the DeepResearch investigation") {
            let full = config.cancellation.is_some();
            if (full && self.hang_full_report) || (!full && self.hang_partial_report) {
                return self.hang().await;
            }
            if self.report_fails {
                return Err(ModelError::Api {
                    status: 500,
                    message: "report backend down".to_string(),
                });
            }
            let covered = (1..=STEP_QUERIES.len())
                .map(|n| format!("S{}", n))
                .filter(|id| prompt.contains(&format!("Step {} –", id)))
                .collect::<Vec<_>>()
                .join(",");
            return Ok(GenerateResponse::text(format!("report covering: {}", covered)));
        }

        if prompt.contains("You are executing step") {
            let (index, query) = STEP_QUERIES
                .iter()
                .enumerate()
                .find(|(_, query)| prompt.contains(&format!("sub-query: \"{}\"", query)))
                .ok_or_else(|| ModelError::Decode("unknown step".to_string()))?;

            if self.slow_steps.contains(query) {
                return std::future::pending().await;
            }
            if self.failing_steps.contains(query) {
                return Err(ModelError::Api {
                    status: 503,
                    message: "search unavailable".to_string(),
                });
            }
            return Ok(evidence_response(index + 1));
        }

        if self.hang_plan {
            return self.hang().await;
        }
        Ok(GenerateResponse::text(
            self.plan.clone().unwrap_or_else(default_plan),
        ))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.llm.api_key = "test-key".to_string();
    config.llm.max_retries = 2;
    config.llm.retry_delay_ms = 1;
    config.research.plan_timeout_ms = 5_000;
    config.research.evidence_timeout_ms = 60_000;
    config.research.report_timeout_ms = 5_000;
    config.research.partial_report_timeout_ms = 5_000;
    config.images.enabled = false;
    config.search.serpapi_api_key = None;
    config
}

pub fn context_with(model: Arc<ScriptedModel>) -> ResearchContext {
    ResearchContext::with_clients(test_config(), model, Arc::new(NoImages))
}
