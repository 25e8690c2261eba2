//! 模型调用的请求/响应类型

use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// 模型可使用的内置工具
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTool {
    /// 联网搜索（grounding）
    GoogleSearch,
}

/// 单次生成调用的配置
#[derive(Debug, Clone, Default)]
pub struct GenerationConfig {
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
    pub top_p: Option<f32>,
    /// 结构化输出约束；设置后要求模型返回符合该schema的JSON
    pub response_schema: Option<Value>,
    /// 只要求JSON输出，不附带schema
    pub json_output: bool,
    pub tools: Vec<ModelTool>,
    pub system_instruction: Option<String>,
    /// 调用过程中触发即中止，返回 `ModelError::Cancelled`
    pub cancellation: Option<CancellationToken>,
}

impl GenerationConfig {
    /// 是否要求JSON格式输出
    pub fn wants_json(&self) -> bool {
        self.json_output || self.response_schema.is_some()
    }

    /// 取消信号是否已经触发
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

/// 联网检索得到的一个引用片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundingChunk {
    /// provider返回列表中的原始位置
    pub index: usize,
    pub url: String,
    pub title: Option<String>,
    pub domain: Option<String>,
}

/// 联网检索的元数据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingMetadata {
    pub chunks: Vec<GroundingChunk>,
    pub web_search_queries: Vec<String>,
}

/// 归一化后的模型响应
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateResponse {
    pub text: String,
    pub grounding: Option<GroundingMetadata>,
}

impl GenerateResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            grounding: None,
        }
    }

    pub fn with_grounding(mut self, grounding: GroundingMetadata) -> Self {
        self.grounding = Some(grounding);
        self
    }
}
