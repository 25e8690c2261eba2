pub mod evidence_gatherer;
pub mod planner;
pub mod report_synthesizer;

pub use evidence_gatherer::EvidenceGatherer;
pub use planner::PlanGenerator;
pub use report_synthesizer::{ReportSynthesizer, SynthesisMode};

/// 提示词中使用的当天日期（UTC）
pub(crate) fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}
