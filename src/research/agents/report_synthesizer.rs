use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ResearchError, Stage};
use crate::i18n::Locale;
use crate::llm::client::GenerationConfig;
use crate::research::context::ResearchContext;
use crate::research::retry::{RetryPolicy, retry_with_backoff};
use crate::research::types::{ResearchPlan, SourceReference, StepResult};

const FINAL_SYSTEM_PROMPT: &str = "You are the lead analyst preparing the final deliverable for an exhaustive research sprint. Integrate the vetted findings, highlight tensions in the evidence, and surface the most important next questions. Prioritize and give more weight to newer, more recent information over older data when synthesizing the report.";

/// 报告合成模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisMode {
    /// 正常流程，受调研取消信号控制
    Full,
    /// 取消后的补救合成：不受取消信号影响，但有独立的总超时
    Partial,
}

/// 报告合成所需的调研材料
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub query: &'a str,
    pub plan: &'a ResearchPlan,
    pub steps: &'a [StepResult],
    pub sources: &'a [SourceReference],
    pub locale: Locale,
}

#[derive(Default)]
pub struct ReportSynthesizer;

impl ReportSynthesizer {
    pub fn build_prompt(input: &ReportInput<'_>) -> String {
        let plan_outline = input
            .plan
            .steps
            .iter()
            .map(|step| format!("- {}: {} — focus: {}", step.id, step.title, step.angle))
            .collect::<Vec<_>>()
            .join("\n");

        let findings_outline = input
            .steps
            .iter()
            .map(|step| {
                let mut lines = vec![format!("Step {} – {}:", step.step_id, step.title)];
                lines.extend(step.findings.iter().map(|finding| {
                    let citations = finding
                        .sources
                        .iter()
                        .map(|source| format!("[{}]", source.id))
                        .collect::<Vec<_>>()
                        .join(" ");
                    format!("  • {}: {} {}", finding.heading, finding.insight, citations)
                        .trim_end()
                        .to_string()
                }));
                lines.join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let catalog = input
            .sources
            .iter()
            .map(|source| match &source.domain {
                Some(domain) => format!(
                    "[{}] {} — {} ({})",
                    source.id, source.title, domain, source.url
                ),
                None => format!("[{}] {} ({})", source.id, source.title, source.url),
            })
            .collect::<Vec<_>>()
            .join("\n");

        let instruction = input.locale.directive(
            "Synthesize the DeepResearch investigation into a concise but thorough report. Cite sources with bracket numbers (e.g., [1]) that correspond to the provided catalog. Give priority and more weight to newer, more recent information when synthesizing findings.",
        );

        format!(
            "{instruction}\n\nResearch question: {query}\n\nPrimary goal: {goal}\nRationale: {rationale}\nExpected insights: {insights}\n\nPlan outline:\n{plan_outline}\n\nFindings summary:\n{findings_outline}\n\nSources catalog:\n{catalog}\n\nStructure the response with the following sections in order: Overview, Key Findings (bulleted), Contradictions, Open Questions, References. Ensure every factual claim is cited.",
            query = input.query,
            goal = input.plan.primary_goal,
            rationale = input.plan.rationale,
            insights = input.plan.expected_insights.join("; "),
        )
    }

    fn generation_config(cancel: Option<&CancellationToken>) -> GenerationConfig {
        GenerationConfig {
            temperature: Some(0.4),
            top_p: Some(0.9),
            max_output_tokens: Some(2048),
            system_instruction: Some(FINAL_SYSTEM_PROMPT.to_string()),
            cancellation: cancel.cloned(),
            ..Default::default()
        }
    }

    /// 合成最终报告，返回模型输出的原文
    ///
    /// `Partial` 模式忽略 `cancel`，整个重试过程受 `partial_report_timeout` 约束。
    pub async fn synthesize(
        &self,
        context: &ResearchContext,
        input: &ReportInput<'_>,
        mode: SynthesisMode,
        cancel: &CancellationToken,
    ) -> Result<String, ResearchError> {
        let prompt = Self::build_prompt(input);
        let research = &context.config.research;

        let (stage, cancel) = match mode {
            SynthesisMode::Full => (Stage::Report, Some(cancel)),
            SynthesisMode::Partial => (Stage::PartialReport, None),
        };
        let config = Self::generation_config(cancel);
        let policy = RetryPolicy::new(stage, &context.config.llm, research.report_timeout());

        let client = context.model_client.as_ref();
        let prompt = prompt.as_str();
        let config = &config;

        let attempts = retry_with_backoff(&policy, cancel, |attempt| async move {
            debug!(attempt, ?mode, "synthesizing report");
            let response = client.generate(prompt, config).await?;
            Ok(response.text)
        });

        let outcome = match mode {
            SynthesisMode::Full => attempts.await,
            SynthesisMode::Partial => {
                let limit = research.partial_report_timeout();
                match tokio::time::timeout(limit, attempts).await {
                    Ok(result) => result,
                    Err(_) => Err(ResearchError::Timeout {
                        stage: Stage::PartialReport,
                        after: limit,
                    }),
                }
            }
        };

        match outcome {
            Ok(report) => {
                info!(?mode, chars = report.chars().count(), "📝 报告合成完成");
                Ok(report)
            }
            Err(err) if err.is_cancelled() => Err(err),
            Err(err) => Err(ResearchError::Synthesis(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::types::{PlanStep, StepFinding};

    fn source(id: &str, domain: Option<&str>) -> SourceReference {
        SourceReference {
            id: id.to_string(),
            url: format!("https://site{}.example/page", id),
            title: format!("Source {}", id),
            domain: domain.map(str::to_string),
        }
    }

    fn plan() -> ResearchPlan {
        ResearchPlan {
            primary_goal: "Profile Ada Lovelace".to_string(),
            rationale: "Cover biography and legacy".to_string(),
            steps: vec![PlanStep {
                id: "S1".to_string(),
                title: "Biography".to_string(),
                query: "Ada Lovelace biography".to_string(),
                angle: "encyclopedic".to_string(),
                deliverable: "timeline".to_string(),
            }],
            expected_insights: vec!["early life".to_string(), "legacy".to_string()],
        }
    }

    #[test]
    fn test_prompt_embeds_outline_findings_and_catalog() {
        let plan = plan();
        let steps = vec![StepResult {
            step_id: "S1".to_string(),
            title: "Biography".to_string(),
            summary: "summary".to_string(),
            queries: vec![],
            findings: vec![
                StepFinding {
                    heading: "Birth".to_string(),
                    insight: "Born in 1815".to_string(),
                    evidence: "e".to_string(),
                    confidence: None,
                    sources: vec![source("1", Some("site1.example")), source("2", None)],
                },
                StepFinding {
                    heading: "Uncited".to_string(),
                    insight: "No source".to_string(),
                    evidence: "e".to_string(),
                    confidence: None,
                    sources: vec![],
                },
            ],
            sources: vec![],
        }];
        let sources = vec![source("1", Some("site1.example")), source("2", None)];

        let prompt = ReportSynthesizer::build_prompt(&ReportInput {
            query: "Ada Lovelace",
            plan: &plan,
            steps: &steps,
            sources: &sources,
            locale: Locale::English,
        });

        assert!(prompt.contains("- S1: Biography — focus: encyclopedic"));
        assert!(prompt.contains("Step S1 – Biography:\n  • Birth: Born in 1815 [1] [2]\n  • Uncited: No source\n"));
        assert!(prompt.contains("[1] Source 1 — site1.example (https://site1.example/page)"));
        assert!(prompt.contains("[2] Source 2 (https://site2.example/page)"));
        assert!(prompt.contains("Expected insights: early life; legacy"));
        assert!(prompt.contains("Overview, Key Findings (bulleted), Contradictions, Open Questions, References"));
    }

    #[test]
    fn test_partial_config_carries_no_cancellation() {
        let config = ReportSynthesizer::generation_config(None);
        assert!(config.cancellation.is_none());
        assert!(config.tools.is_empty());
        assert_eq!(config.max_output_tokens, Some(2048));
    }
}
