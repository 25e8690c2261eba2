use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::error::{ImageError, ResearchError};
use crate::i18n::Locale;
use crate::research::agents::report_synthesizer::ReportInput;
use crate::research::agents::{EvidenceGatherer, PlanGenerator, ReportSynthesizer, SynthesisMode};
use crate::research::context::ResearchContext;
use crate::research::events::{EventSender, ResearchEvent, emit};
use crate::research::fallback;
use crate::research::registry::{SharedRegistry, SourceRegistry};
use crate::research::types::{DeepResearchImage, ResearchPlan, StepResult};

/// 调研编排器
///
/// 事件顺序固定为 images → plan → search（每个完成的步骤一个，顺序不定）→ final。
/// 取消发生在计划生成阶段时返回 `ResearchError::Cancelled`；发生在计划之后时
/// 用已有结果生成部分报告，仍然发出 final。
#[derive(Default)]
pub struct ResearchOrchestrator;

impl ResearchOrchestrator {
    /// 执行一次完整调研
    pub async fn run(
        &self,
        context: &ResearchContext,
        query: &str,
        locale: Locale,
        cancel: &CancellationToken,
        events: &EventSender,
    ) -> Result<(), ResearchError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResearchError::InvalidQuery(
                "Query cannot be empty.".to_string(),
            ));
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("research", %run_id, %locale);
        self.execute_pipeline(context, query, locale, cancel, events)
            .instrument(span)
            .await
    }

    async fn execute_pipeline(
        &self,
        context: &ResearchContext,
        query: &str,
        locale: Locale,
        cancel: &CancellationToken,
        events: &EventSender,
    ) -> Result<(), ResearchError> {
        info!(query, model = context.model_client.model_name(), "🚀 开始执行调研流程");

        let images = self.lookup_images(context, query, locale, cancel).await;
        emit(events, ResearchEvent::Images { images }).await;

        let plan = PlanGenerator.generate(context, query, locale, cancel).await?;
        emit(events, ResearchEvent::Plan { plan: plan.clone() }).await;

        let registry = SourceRegistry::shared();
        let step_results = self
            .gather_evidence(context, query, &plan, locale, &registry, cancel, events)
            .await;
        let sources = registry.lock().await.sources().to_vec();

        let input = ReportInput {
            query,
            plan: &plan,
            steps: &step_results,
            sources: &sources,
            locale,
        };

        let report = if cancel.is_cancelled() {
            info!(completed = step_results.len(), "⚠️ 调研已取消，生成部分报告");
            self.recover_report(context, &input).await
        } else {
            match ReportSynthesizer
                .synthesize(context, &input, SynthesisMode::Full, cancel)
                .await
            {
                Ok(report) => report,
                Err(ResearchError::Cancelled) => {
                    info!("⚠️ 报告合成阶段被取消，生成部分报告");
                    self.recover_report(context, &input).await
                }
                Err(err) => return Err(err),
            }
        };

        emit(events, ResearchEvent::Final { report, sources }).await;
        info!("✓ 调研流程执行完毕");
        Ok(())
    }

    /// 配图检索，任何失败都以空列表代替
    async fn lookup_images(
        &self,
        context: &ResearchContext,
        query: &str,
        locale: Locale,
        cancel: &CancellationToken,
    ) -> Vec<DeepResearchImage> {
        match context.images.lookup(query, locale, cancel).await {
            Ok(images) => images,
            Err(ImageError::Cancelled) => {
                debug!("image lookup cancelled");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "subject image lookup failed");
                Vec::new()
            }
        }
    }

    /// 并发执行所有步骤，每完成一个发出一个 search 事件
    ///
    /// 被取消的步骤不产生结果；重试耗尽的步骤以降级结果计入。
    #[allow(clippy::too_many_arguments)]
    async fn gather_evidence(
        &self,
        context: &ResearchContext,
        query: &str,
        plan: &ResearchPlan,
        locale: Locale,
        registry: &SharedRegistry,
        cancel: &CancellationToken,
        events: &EventSender,
    ) -> Vec<StepResult> {
        let mut pending: FuturesUnordered<_> = plan
            .steps
            .iter()
            .map(|step| async move {
                let outcome = EvidenceGatherer
                    .gather(context, query, step, locale, registry, cancel)
                    .await;
                (step, outcome)
            })
            .collect();

        let mut results = Vec::with_capacity(plan.steps.len());
        while let Some((step, outcome)) = pending.next().await {
            match outcome {
                Ok(result) => {
                    emit(events, ResearchEvent::Search { step: result.clone() }).await;
                    results.push(result);
                }
                Err(err) => debug!(step_id = %step.id, error = %err, "step produced no result"),
            }
        }
        results
    }

    /// 取消后的补救：有步骤结果时做限时合成，失败则用模板；否则只输出计划
    async fn recover_report(&self, context: &ResearchContext, input: &ReportInput<'_>) -> String {
        if input.steps.is_empty() {
            return fallback::plan_only_report(input.query, input.plan, input.locale);
        }

        // 补救合成不受原取消信号影响
        let detached = CancellationToken::new();
        match ReportSynthesizer
            .synthesize(context, input, SynthesisMode::Partial, &detached)
            .await
        {
            Ok(report) => report,
            Err(err) => {
                warn!(error = %err, "partial report synthesis failed, using template");
                fallback::partial_report(input.query, input.steps, input.locale)
            }
        }
    }
}
