use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 调研计划中的单个步骤
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStep {
    /// 计划内唯一，例如 "S1"，后续阶段以此关联结果
    pub id: String,
    pub title: String,
    pub query: String,
    pub angle: String,
    pub deliverable: String,
}

/// 调研计划，每次调研只生成一次
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchPlan {
    pub primary_goal: String,
    pub rationale: String,
    pub steps: Vec<PlanStep>,
    pub expected_insights: Vec<String>,
}

/// 引用来源，id 在一次调研内从1开始按首次登记顺序递增
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    pub id: String,
    pub url: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// provider返回的原始引用候选
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceCandidate {
    /// provider返回列表中的位置
    pub index: usize,
    pub url: String,
    pub title: Option<String>,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepFinding {
    pub heading: String,
    pub insight: String,
    pub evidence: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<String>,
    pub sources: Vec<SourceReference>,
}

/// 单个计划步骤的证据收集结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResult {
    pub step_id: String,
    pub title: String,
    pub summary: String,
    pub queries: Vec<String>,
    pub findings: Vec<StepFinding>,
    /// 所有 finding 引用来源按 id 去重后的并集
    pub sources: Vec<SourceReference>,
}

impl StepResult {
    /// 重试耗尽后的降级结果
    pub fn degraded(step: &PlanStep, summary: String) -> Self {
        Self {
            step_id: step.id.clone(),
            title: step.title.clone(),
            summary,
            queries: Vec::new(),
            findings: Vec::new(),
            sources: Vec::new(),
        }
    }
}

/// 调研主体配图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepResearchImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
}

/// 计划阶段模型返回的结构
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanPayload {
    pub primary_goal: Option<String>,
    pub rationale: Option<String>,
    #[schemars(length(min = 3, max = 6))]
    pub steps: Vec<PlanStepPayload>,
    pub expected_insights: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanStepPayload {
    #[serde(default)]
    pub id: Option<String>,
    pub title: String,
    pub query: String,
    pub angle: String,
    pub deliverable: String,
}

/// 证据阶段模型返回的结构
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvidencePayload {
    #[serde(default)]
    pub summary: Option<String>,
    pub findings: Vec<FindingPayload>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FindingPayload {
    pub heading: String,
    pub insight: String,
    pub evidence: String,
    #[serde(default)]
    pub confidence: Option<String>,
    /// 模型可能返回整数、浮点数或数字字符串，无法识别的值在解析时丢弃
    #[serde(default)]
    pub source_ids: Option<Vec<Value>>,
}

impl FindingPayload {
    /// 可用的引用编号（从1开始）
    pub fn citation_ids(&self) -> Vec<usize> {
        self.source_ids
            .iter()
            .flatten()
            .filter_map(citation_id)
            .collect()
    }
}

fn citation_id(value: &Value) -> Option<usize> {
    let number = match value {
        Value::Number(number) => number.as_u64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64)
        }),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    }?;
    usize::try_from(number).ok().filter(|id| *id >= 1)
}
