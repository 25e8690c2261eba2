//! 不调用模型的兜底报告模板，输出只取决于输入

use crate::i18n::Locale;
use crate::research::types::{ResearchPlan, StepResult};

/// 根据已完成的步骤结果拼出部分报告
pub fn partial_report(query: &str, steps: &[StepResult], locale: Locale) -> String {
    let sections = steps
        .iter()
        .map(|step| {
            let findings = step
                .findings
                .iter()
                .map(|finding| format!("- **{}**: {}", finding.heading, finding.insight))
                .collect::<Vec<_>>()
                .join("\n");
            format!("### {}\n\n{}\n\n{}", step.title, step.summary, findings)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "# {}\n\n## {}\n\n{}\n\n{}",
        query,
        locale.msg("partial_heading"),
        locale.msg("partial_lead"),
        sections
    )
}

/// 尚无任何步骤结果时，只根据计划生成报告
pub fn plan_only_report(query: &str, plan: &ResearchPlan, locale: Locale) -> String {
    let steps = plan
        .steps
        .iter()
        .map(|step| format!("- **{}**: {}", step.title, step.query))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "# {}\n\n## {}\n\n{}\n\n{}\n\n### {}\n\n{}\n\n{}",
        query,
        locale.msg("plan_heading"),
        plan.primary_goal,
        plan.rationale,
        locale.msg("planned_steps"),
        steps,
        locale.msg("plan_stopped")
    )
}
