use std::collections::{HashMap, HashSet};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ResearchError, Stage};
use crate::i18n::Locale;
use crate::llm::client::{GenerateResponse, GenerationConfig, GroundingChunk, ModelTool};
use crate::research::context::ResearchContext;
use crate::research::registry::SharedRegistry;
use crate::research::retry::{RetryPolicy, retry_with_backoff};
use crate::research::types::{
    EvidencePayload, PlanStep, SourceCandidate, SourceReference, StepFinding, StepResult,
};
use crate::utils::json_extract::extract_json;

const EVIDENCE_SYSTEM_PROMPT: &str = "You are a meticulous research analyst. For each assigned sub-query, run targeted web searches, extract only the most relevant facts, and return structured findings with explicit evidence. Do not invent citations; rely solely on the retrieved material. Prioritize newer, more recent information over older data when evaluating sources and findings.";

const EVIDENCE_FORMAT_INSTRUCTION: &str = r#"Format your entire reply as valid JSON with the exact shape: {"summary": string, "findings": [{"heading": string, "insight": string, "evidence": string, "confidence"?: string, "sourceIds"?: number[]}]}.
Do not include Markdown fences or any text before/after the JSON.
Use sourceIds to reference 1-indexed citations emitted by the tool calls in the order they are returned."#;

/// 单步骤证据收集器
///
/// 每个计划步骤发起一次联网检索调用。重试耗尽时不向上传播错误，
/// 而是返回一个 findings 为空的降级结果；只有取消信号会以错误形式返回。
#[derive(Default)]
pub struct EvidenceGatherer;

impl EvidenceGatherer {
    pub fn build_prompt(query: &str, step: &PlanStep, locale: Locale) -> String {
        let instruction = format!(
            "You are executing step {} of a research mission that targets the question: \"{}\". Focus strictly on this sub-query: \"{}\". Use real-time web research to pull verifiable facts. Prioritize the most recent and up-to-date information available, giving more weight to newer sources. Return findings that advance the deliverable: {}.",
            step.id, query, step.query, step.deliverable
        );
        locale.directive(&instruction)
    }

    fn generation_config(cancel: &CancellationToken) -> GenerationConfig {
        GenerationConfig {
            temperature: Some(0.35),
            top_p: Some(0.9),
            max_output_tokens: Some(2048),
            tools: vec![ModelTool::GoogleSearch],
            system_instruction: Some(format!(
                "{}\n{}",
                EVIDENCE_SYSTEM_PROMPT, EVIDENCE_FORMAT_INSTRUCTION
            )),
            cancellation: Some(cancel.clone()),
            ..Default::default()
        }
    }

    pub async fn gather(
        &self,
        context: &ResearchContext,
        query: &str,
        step: &PlanStep,
        locale: Locale,
        registry: &SharedRegistry,
        cancel: &CancellationToken,
    ) -> Result<StepResult, ResearchError> {
        let prompt = Self::build_prompt(query, step, locale);
        let config = Self::generation_config(cancel);
        let policy = RetryPolicy::new(
            Stage::Evidence,
            &context.config.llm,
            context.config.research.evidence_timeout(),
        );

        let client = context.model_client.as_ref();
        let prompt = prompt.as_str();
        let config = &config;

        let outcome = retry_with_backoff(&policy, Some(cancel), |attempt| async move {
            debug!(step_id = %step.id, attempt, "gathering evidence");
            let response = client.generate(prompt, config).await?;
            build_step_result(step, &response, registry).await
        })
        .await;

        match outcome {
            Ok(result) => {
                info!(
                    step_id = %step.id,
                    findings = result.findings.len(),
                    sources = result.sources.len(),
                    "🔎 步骤证据收集完成"
                );
                Ok(result)
            }
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => {
                warn!(step_id = %step.id, error = %err, "所有重试均失败，返回降级结果");
                Ok(StepResult::degraded(
                    step,
                    format!(
                        "Evidence collection failed after {} attempts: {}",
                        policy.attempts(),
                        err
                    ),
                ))
            }
        }
    }
}

/// 同一响应内按URL（忽略大小写）去重，保留首次出现的位置
pub fn citation_candidates(chunks: &[GroundingChunk]) -> Vec<SourceCandidate> {
    let mut seen = HashSet::new();
    chunks
        .iter()
        .filter(|chunk| seen.insert(chunk.url.trim().to_lowercase()))
        .map(|chunk| SourceCandidate {
            index: chunk.index,
            url: chunk.url.clone(),
            title: chunk.title.clone(),
            domain: chunk.domain.clone(),
        })
        .collect()
}

fn dedup_by_id(references: impl IntoIterator<Item = SourceReference>) -> Vec<SourceReference> {
    let mut seen = HashSet::new();
    references
        .into_iter()
        .filter(|reference| seen.insert(reference.id.clone()))
        .collect()
}

/// 解析模型输出并解析引用
///
/// 引用只在JSON解析成功后才登记，失败的尝试不会在登记表中留下记录。
pub async fn build_step_result(
    step: &PlanStep,
    response: &GenerateResponse,
    registry: &SharedRegistry,
) -> Result<StepResult, ResearchError> {
    let context = format!("evidence for step {}", step.id);
    let payload: EvidencePayload =
        extract_json(&response.text, &context).map_err(|e| ResearchError::EvidenceParse(e.to_string()))?;

    let (chunks, queries) = match &response.grounding {
        Some(grounding) => (
            grounding.chunks.as_slice(),
            grounding.web_search_queries.clone(),
        ),
        None => (&[][..], Vec::new()),
    };

    let mut by_index: HashMap<usize, SourceReference> = HashMap::new();
    {
        let mut registry = registry.lock().await;
        for candidate in citation_candidates(chunks) {
            let reference = registry.register(&candidate);
            by_index.insert(candidate.index, reference);
        }
    }

    let findings: Vec<StepFinding> = payload
        .findings
        .into_iter()
        .map(|finding| {
            let references = finding
                .citation_ids()
                .into_iter()
                .filter_map(|id| by_index.get(&(id - 1)).cloned());

            StepFinding {
                heading: finding.heading.trim().to_string(),
                insight: finding.insight.trim().to_string(),
                evidence: finding.evidence.trim().to_string(),
                confidence: finding
                    .confidence
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty()),
                sources: dedup_by_id(references),
            }
        })
        .collect();

    let sources = dedup_by_id(
        findings
            .iter()
            .flat_map(|finding| finding.sources.iter().cloned()),
    );

    Ok(StepResult {
        step_id: step.id.clone(),
        title: step.title.clone(),
        summary: payload
            .summary
            .map(|summary| summary.trim().to_string())
            .unwrap_or_default(),
        queries,
        findings,
        sources,
    })
}
