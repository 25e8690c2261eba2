use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ModelError;
use crate::i18n::Locale;
use crate::llm::client::{GenerationConfig, ModelClient};
use crate::utils::json_extract::extract_json;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SubjectPayload {
    primary_subject: Option<String>,
}

/// 合并连续空白
pub fn normalize_query(query: &str) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn build_subject_prompt(query: &str, locale: Locale) -> String {
    [
        "You assist an investigative analyst.".to_string(),
        "Given a free-form research query, identify the single best subject name to use for an image search.".to_string(),
        "Respond with JSON matching {\"primarySubject\": string} and no additional text.".to_string(),
        "If the query already contains a precise name, reuse it.".to_string(),
        locale.subject_naming_instruction().to_string(),
        format!("Query: \"{}\"", query),
    ]
    .join("\n")
}

/// 从自由文本查询中解析出用于图片检索的主体名称
///
/// 只有取消会返回错误，其余失败都退回原始查询。
pub async fn resolve_primary_subject(
    client: &dyn ModelClient,
    query: &str,
    locale: Locale,
    cancel: &CancellationToken,
) -> Result<String, ModelError> {
    let trimmed = normalize_query(query);
    if trimmed.is_empty() {
        return Ok(trimmed);
    }
    if cancel.is_cancelled() {
        return Err(ModelError::Cancelled);
    }

    let config = GenerationConfig {
        temperature: Some(0.0),
        json_output: true,
        cancellation: Some(cancel.clone()),
        ..Default::default()
    };

    let response = match client
        .generate(&build_subject_prompt(&trimmed, locale), &config)
        .await
    {
        Ok(response) => response,
        Err(ModelError::Cancelled) => return Err(ModelError::Cancelled),
        Err(err) => {
            warn!(query = %trimmed, error = %err, "falling back to raw query for image subject");
            return Ok(trimmed);
        }
    };

    let subject = extract_json::<SubjectPayload>(&response.text, "subject")
        .ok()
        .and_then(|payload| payload.primary_subject)
        .map(|subject| normalize_query(&subject))
        .filter(|subject| !subject.is_empty())
        .unwrap_or(trimmed);

    debug!(query, subject = %subject, "resolved image subject");
    Ok(subject)
}
