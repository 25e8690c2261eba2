use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ResearchError, Stage};
use crate::i18n::Locale;
use crate::llm::client::schema::response_schema;
use crate::llm::client::GenerationConfig;
use crate::research::context::ResearchContext;
use crate::research::retry::{RetryPolicy, retry_with_backoff};
use crate::research::types::{PlanPayload, PlanStep, ResearchPlan};
use crate::utils::json_extract::extract_json;

const PLAN_SYSTEM_PROMPT: &str = "You are a senior research strategist. Design concise, sequential investigation plans that break complex questions into focused web research actions. Each step should have a unique id, specific search intent, and a deliverable that advances the overall objective.";

/// 计划步骤数上限，超出部分丢弃
pub const MAX_PLAN_STEPS: usize = 6;

/// 调研计划生成器
#[derive(Default)]
pub struct PlanGenerator;

impl PlanGenerator {
    pub fn build_prompt(query: &str, locale: Locale, today: &str) -> String {
        let instruction = format!(
            "Today is {}. Break the research question into 3-6 decisive web investigation steps. Each step should target a different angle or source type and build toward a synthesis. When planning, prioritize finding the most recent and up-to-date information available.",
            today
        );
        format!(
            "{}\n\nResearch question: {}",
            locale.directive(&instruction),
            query
        )
    }

    fn generation_config(cancel: &CancellationToken) -> GenerationConfig {
        GenerationConfig {
            temperature: Some(0.3),
            max_output_tokens: Some(1024),
            response_schema: Some(response_schema::<PlanPayload>()),
            json_output: true,
            system_instruction: Some(PLAN_SYSTEM_PROMPT.to_string()),
            cancellation: Some(cancel.clone()),
            ..Default::default()
        }
    }

    /// 生成调研计划，失败时按重试策略重试，最终错误原样返回
    pub async fn generate(
        &self,
        context: &ResearchContext,
        query: &str,
        locale: Locale,
        cancel: &CancellationToken,
    ) -> Result<ResearchPlan, ResearchError> {
        let prompt = Self::build_prompt(query, locale, &super::today());
        let config = Self::generation_config(cancel);
        let policy = RetryPolicy::new(
            Stage::Plan,
            &context.config.llm,
            context.config.research.plan_timeout(),
        );

        let client = context.model_client.as_ref();
        let prompt = prompt.as_str();
        let config = &config;

        let plan = retry_with_backoff(&policy, Some(cancel), |attempt| async move {
            debug!(attempt, model = client.model_name(), "requesting research plan");
            let response = client.generate(prompt, config).await?;
            parse_plan(&response.text, query)
        })
        .await?;

        info!(steps = plan.steps.len(), "📋 调研计划已生成");
        Ok(plan)
    }
}

/// 将模型输出解析为调研计划：裁剪空白、补全缺失的id并保证id唯一
pub fn parse_plan(text: &str, query: &str) -> Result<ResearchPlan, ResearchError> {
    if text.trim().is_empty() {
        return Err(ResearchError::Planning(
            "Plan generation returned an empty response.".to_string(),
        ));
    }

    let payload: PlanPayload =
        extract_json(text, "plan").map_err(|e| ResearchError::Planning(e.to_string()))?;

    if payload.steps.len() > MAX_PLAN_STEPS {
        warn!(
            returned = payload.steps.len(),
            kept = MAX_PLAN_STEPS,
            "plan contained more steps than allowed, extra steps dropped"
        );
    }

    let mut seen = HashSet::new();
    let steps: Vec<PlanStep> = payload
        .steps
        .into_iter()
        .take(MAX_PLAN_STEPS)
        .enumerate()
        .map(|(index, step)| {
            let fallback = format!("S{}", index + 1);
            let mut id = step
                .id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .unwrap_or(fallback.as_str())
                .to_string();
            if seen.contains(&id) {
                id = fallback.clone();
            }
            let mut suffix = 2;
            while seen.contains(&id) {
                id = format!("{}-{}", fallback, suffix);
                suffix += 1;
            }
            seen.insert(id.clone());

            PlanStep {
                id,
                title: step.title.trim().to_string(),
                query: step.query.trim().to_string(),
                angle: step.angle.trim().to_string(),
                deliverable: step.deliverable.trim().to_string(),
            }
        })
        .collect();

    if steps.is_empty() {
        return Err(ResearchError::Planning(
            "Plan generation did not return any steps.".to_string(),
        ));
    }

    let primary_goal = payload
        .primary_goal
        .map(|goal| goal.trim().to_string())
        .unwrap_or_else(|| query.to_string());

    Ok(ResearchPlan {
        primary_goal,
        rationale: payload
            .rationale
            .map(|rationale| rationale.trim().to_string())
            .unwrap_or_default(),
        steps,
        expected_insights: payload
            .expected_insights
            .unwrap_or_default()
            .into_iter()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn step(id: Option<&str>, title: &str) -> serde_json::Value {
        let mut value = json!({
            "title": format!("  {}  ", title),
            "query": "query",
            "angle": "angle",
            "deliverable": "deliverable"
        });
        if let Some(id) = id {
            value["id"] = json!(id);
        }
        value
    }

    #[test]
    fn test_prompt_contains_date_query_and_language() {
        let prompt = PlanGenerator::build_prompt("Ada Lovelace", Locale::English, "2024-05-01");
        assert!(prompt.starts_with("Today is 2024-05-01."));
        assert!(prompt.contains("3-6 decisive web investigation steps"));
        assert!(prompt.contains("Respond in natural English."));
        assert!(prompt.ends_with("Research question: Ada Lovelace"));
    }

    #[test]
    fn test_missing_ids_fall_back_to_sequence() {
        let text = json!({
            "primaryGoal": " Understand Ada ",
            "rationale": "why",
            "steps": [step(None, "One"), step(None, "Two"), step(None, "Three")],
            "expectedInsights": [" a ", "", "b"]
        })
        .to_string();

        let plan = parse_plan(&text, "Ada Lovelace").unwrap();
        let ids: Vec<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);
        assert_eq!(plan.steps[0].title, "One");
        assert_eq!(plan.primary_goal, "Understand Ada");
        assert_eq!(plan.expected_insights, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_ids_are_made_unique() {
        let text = json!({
            "steps": [step(Some("S1"), "One"), step(Some("S1"), "Two"), step(Some("S2"), "Three")]
        })
        .to_string();

        let plan = parse_plan(&text, "q").unwrap();
        let ids: Vec<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);
        assert_eq!(plan.primary_goal, "q");
        assert_eq!(plan.rationale, "");

        let text = json!({
            "steps": [step(Some("S2"), "One"), step(Some("S2"), "Two"), step(Some("S2"), "Three")]
        })
        .to_string();
        let plan = parse_plan(&text, "q").unwrap();
        let ids: Vec<&str> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["S2", "S2-2", "S3"]);
    }

    #[test]
    fn test_zero_steps_is_planning_error() {
        let err = parse_plan(r#"{"primaryGoal": "g", "steps": []}"#, "q").unwrap_err();
        assert!(matches!(err, ResearchError::Planning(_)));
        assert!(err.to_string().contains("did not return any steps"));
    }

    #[test]
    fn test_empty_and_malformed_responses() {
        assert!(matches!(
            parse_plan("  ", "q"),
            Err(ResearchError::Planning(_))
        ));
        assert!(matches!(
            parse_plan("I could not plan this.", "q"),
            Err(ResearchError::Planning(_))
        ));
    }

    #[test]
    fn test_extra_steps_are_truncated() {
        let steps: Vec<_> = (0..8).map(|i| step(None, &format!("T{}", i))).collect();
        let text = json!({ "steps": steps }).to_string();
        let plan = parse_plan(&text, "q").unwrap();
        assert_eq!(plan.steps.len(), MAX_PLAN_STEPS);
    }
}
