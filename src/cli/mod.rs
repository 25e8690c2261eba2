use crate::config::{Config, DEFAULT_CONFIG_FILE};
use crate::i18n::Locale;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DeepResearch-RS - 由Rust与大模型驱动的流式深度调研引擎
#[derive(Parser, Debug)]
#[command(name = "deepresearch-rs")]
#[command(
    about = "Streaming deep-research engine: plans a question into web investigation steps, gathers grounded evidence in parallel and synthesizes a cited report."
)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// LLM API KEY
    #[arg(long, global = true)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long, global = true)]
    pub llm_api_base_url: Option<String>,

    /// 模型名称
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// 每个阶段的最大重试次数
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// 禁用配图检索
    #[arg(long, global = true)]
    pub no_images: bool,

    /// 是否启用详细日志
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 启动HTTP服务
    Serve {
        /// 监听地址，例如 127.0.0.1:3000
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// 在终端执行一次调研，按行输出NDJSON事件
    Run {
        /// 调研问题
        query: String,

        /// 输出语言 (en, ja)
        #[arg(short, long)]
        locale: Option<String>,
    },
}

impl Args {
    /// 将CLI参数转换为配置
    pub fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            // 显式指定的配置文件必须能读取
            Some(config_path) => Config::from_file(config_path)
                .with_context(|| format!("无法读取配置文件 {:?}", config_path))?,
            None => {
                let default_config_path = std::env::current_dir()
                    .unwrap_or_else(|_| PathBuf::from("."))
                    .join(DEFAULT_CONFIG_FILE);

                if default_config_path.exists() {
                    Config::from_file(&default_config_path).with_context(|| {
                        format!("无法读取默认配置文件 {:?}", default_config_path)
                    })?
                } else {
                    Config::default()
                }
            }
        };

        // 覆盖LLM配置
        if let Some(llm_api_key) = self.llm_api_key {
            config.llm.api_key = llm_api_key;
        }
        if let Some(llm_api_base_url) = self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url;
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(max_retries) = self.max_retries {
            config.llm.max_retries = max_retries;
        }

        if self.no_images {
            config.images.enabled = false;
        }

        match self.command {
            Command::Serve { bind: Some(bind) } => config.server.bind_addr = bind,
            Command::Run {
                locale: Some(locale),
                ..
            } => {
                config.research.default_locale = locale
                    .parse::<Locale>()
                    .map_err(|err| anyhow::anyhow!(err))?;
            }
            _ => {}
        }

        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }
}

// Include tests
#[cfg(test)]
mod tests;
