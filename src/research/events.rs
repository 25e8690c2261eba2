use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

use super::types::{DeepResearchImage, ResearchPlan, SourceReference, StepResult};

/// 流式协议中的一个事件，序列化后每个事件占一行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ResearchEvent {
    Status { status: String },
    Images { images: Vec<DeepResearchImage> },
    Plan { plan: ResearchPlan },
    Search { step: StepResult },
    Final {
        report: String,
        sources: Vec<SourceReference>,
    },
    Done,
    Error { message: String },
}

impl ResearchEvent {
    pub fn started() -> Self {
        ResearchEvent::Status {
            status: "started".to_string(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ResearchEvent::Error {
            message: message.into(),
        }
    }

    /// 事件类型名称，与线上 `type` 字段一致
    pub fn kind(&self) -> &'static str {
        match self {
            ResearchEvent::Status { .. } => "status",
            ResearchEvent::Images { .. } => "images",
            ResearchEvent::Plan { .. } => "plan",
            ResearchEvent::Search { .. } => "search",
            ResearchEvent::Final { .. } => "final",
            ResearchEvent::Done => "done",
            ResearchEvent::Error { .. } => "error",
        }
    }

    /// 流是否在该事件后结束
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResearchEvent::Done | ResearchEvent::Error { .. })
    }
}

pub type EventSender = mpsc::Sender<ResearchEvent>;

/// 发送事件；接收端已关闭时只记录日志，调研流程继续执行
pub async fn emit(events: &EventSender, event: ResearchEvent) {
    let kind = event.kind();
    if events.send(event).await.is_err() {
        debug!(kind, "event receiver dropped");
    }
}
