//! LLM客户端 - 提供统一的模型调用接口

use async_trait::async_trait;

use crate::error::ModelError;

mod gemini;
pub mod schema;
pub mod types;

pub use gemini::GeminiClient;
pub use types::{GenerateResponse, GenerationConfig, GroundingChunk, GroundingMetadata, ModelTool};

/// 模型客户端
///
/// 调研流程只依赖这一个接口，provider的响应在实现内部归一化为 [`GenerateResponse`]，
/// 测试中可以替换为脚本化的假实现。
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// 生成内容
    async fn generate(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerateResponse, ModelError>;

    /// 模型名称，用于日志
    fn model_name(&self) -> &str;
}
