// DeepResearch 调研流程
// 图片（可选）→ 计划（PlanGenerator）→ 并行证据收集（EvidenceGatherer，共享来源登记表）
// → 报告合成（ReportSynthesizer）；取消后走部分报告或模板报告。

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::i18n::Locale;

pub mod agents;
pub mod context;
pub mod events;
pub mod fallback;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod types;

pub use context::ResearchContext;
pub use events::ResearchEvent;
pub use orchestrator::ResearchOrchestrator;

/// 事件通道容量
const EVENT_BUFFER: usize = 32;

/// 在后台任务中执行调研，返回事件接收端
///
/// 事件流以 `status: started` 开头，以 `done` 或 `error` 结尾。
/// 接收端被丢弃不会中止后台任务；中止调研需要触发 `cancel`。
pub fn spawn_research(
    context: ResearchContext,
    query: String,
    locale: Locale,
    cancel: CancellationToken,
) -> mpsc::Receiver<ResearchEvent> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);

    tokio::spawn(async move {
        events::emit(&tx, ResearchEvent::started()).await;

        let outcome = ResearchOrchestrator
            .run(&context, &query, locale, &cancel, &tx)
            .await;

        let last = match outcome {
            Ok(()) => ResearchEvent::Done,
            Err(err) => {
                error!(error = %err, "❌ 调研失败");
                ResearchEvent::error(err.to_string())
            }
        };
        events::emit(&tx, last).await;
    });

    rx
}
