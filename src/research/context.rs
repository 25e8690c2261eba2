use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::images::{ImageLookup, NoImages, SubjectImageFinder};
use crate::llm::client::{GeminiClient, ModelClient};

/// 调研运行上下文，模型客户端与配图能力都由外部注入
#[derive(Clone)]
pub struct ResearchContext {
    /// 模型客户端
    pub model_client: Arc<dyn ModelClient>,
    /// 配图检索
    pub images: Arc<dyn ImageLookup>,
    /// 配置
    pub config: Config,
}

impl ResearchContext {
    /// 按配置创建 Gemini 客户端与配图检索
    pub fn new(config: Config) -> Result<Self> {
        let model_client: Arc<dyn ModelClient> = Arc::new(GeminiClient::new(&config.llm)?);
        let images: Arc<dyn ImageLookup> = if config.images.enabled {
            Arc::new(SubjectImageFinder::new(&config.images, model_client.clone())?)
        } else {
            Arc::new(NoImages)
        };

        Ok(Self {
            model_client,
            images,
            config,
        })
    }

    pub fn with_clients(
        config: Config,
        model_client: Arc<dyn ModelClient>,
        images: Arc<dyn ImageLookup>,
    ) -> Self {
        Self {
            model_client,
            images,
            config,
        }
    }
}
