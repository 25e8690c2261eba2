use anyhow::Result;
use clap::Parser;
use deepresearch_rs::cli::{Args, Command};
use deepresearch_rs::server::{self, AppState};
use deepresearch_rs::stream::encode_line;
use deepresearch_rs::{Config, ResearchContext, ResearchEvent, spawn_research};
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "deepresearch_rs={default_level},tower_http={default_level}"
        ))
    });

    // 日志写到stderr，stdout留给NDJSON事件
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// 终端执行一次调研，Ctrl-C 触发取消并输出部分报告
async fn run_once(config: Config, query: String) -> Result<()> {
    let locale = config.research.default_locale;
    let context = ResearchContext::new(config)?;
    let cancel = CancellationToken::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("⏹️ 收到中断信号，正在生成部分报告");
            interrupt.cancel();
        }
    });

    let mut events = spawn_research(context, query, locale, cancel);
    let mut failed = false;
    let mut stdout = std::io::stdout();

    while let Some(event) = events.recv().await {
        if let ResearchEvent::Error { .. } = event {
            failed = true;
        }
        stdout.write_all(encode_line(&event)?.as_bytes())?;
        stdout.flush()?;
        if event.is_terminal() {
            break;
        }
    }

    if failed {
        anyhow::bail!("research run ended with an error event");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let command = args.command.clone();
    let config = args.into_config()?;

    init_tracing(config.verbose);
    config.validate()?;
    info!(model = %config.llm.model, "🚀 DeepResearch-RS 启动");

    match command {
        Command::Serve { .. } => {
            let bind_addr = config.server.bind_addr.clone();
            let context = ResearchContext::new(config)?;
            server::serve(AppState::new(context)?, &bind_addr).await
        }
        Command::Run { query, .. } => run_once(config, query).await,
    }
}
