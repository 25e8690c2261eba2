//! 从模型文本中提取JSON对象
//!
//! 模型在开启联网搜索时无法使用schema约束，返回的JSON可能被说明文字或代码块包裹，
//! 也可能带有尾逗号或智能引号等不严格的写法。

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use thiserror::Error;

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").unwrap());

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("{0} response was empty")]
    Empty(String),

    #[error("{0} response did not contain a JSON object")]
    NoObject(String),

    #[error("{context} response contained invalid JSON: {message}")]
    Invalid { context: String, message: String },
}

/// 依次返回文本中每个顶层配平的 `{...}` 片段（跳过字符串字面量中的括号）
fn balanced_objects(text: &str) -> impl Iterator<Item = &str> {
    let bytes = text.as_bytes();
    let mut cursor = 0;

    std::iter::from_fn(move || {
        while cursor < bytes.len() {
            let start = cursor + text[cursor..].find('{')?;
            let mut depth = 0usize;
            let mut in_string: Option<u8> = None;
            let mut escaped = false;
            let mut end = None;

            for (offset, &byte) in bytes[start..].iter().enumerate() {
                if let Some(quote) = in_string {
                    if escaped {
                        escaped = false;
                    } else if byte == b'\\' {
                        escaped = true;
                    } else if byte == quote {
                        in_string = None;
                    }
                    continue;
                }
                match byte {
                    b'"' => in_string = Some(byte),
                    b'{' => depth += 1,
                    b'}' => {
                        depth -= 1;
                        if depth == 0 {
                            end = Some(start + offset);
                            break;
                        }
                    }
                    _ => {}
                }
            }

            // 只返回顶层对象，内部的嵌套对象不作为候选
            if let Some(end) = end {
                cursor = end + 1;
                return Some(&text[start..=end]);
            }
            cursor = start + 1;
        }
        None
    })
}

/// 修复常见的不严格写法：智能引号、对象或数组末尾的逗号
fn repair(raw: &str) -> String {
    let quoted = raw.replace(['\u{201c}', '\u{201d}'], "\"");
    TRAILING_COMMA.replace_all(&quoted, "$1").into_owned()
}

/// 先按严格JSON解析，失败后修复再解析一次
pub fn parse_lenient<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    match serde_json::from_str::<T>(raw) {
        Ok(value) => Ok(value),
        Err(strict) => serde_json::from_str::<T>(&repair(raw)).map_err(|_| strict.to_string()),
    }
}

/// 提取第一个能够解析为 T 的JSON对象
///
/// `context` 只用于错误信息，例如 `"evidence for step S1"`。
pub fn extract_json<T: DeserializeOwned>(raw: &str, context: &str) -> Result<T, ExtractError> {
    if raw.trim().is_empty() {
        return Err(ExtractError::Empty(context.to_string()));
    }

    let cleaned = raw.replace("```json", "").replace("```", "");
    let mut last_error = None;

    for candidate in balanced_objects(&cleaned) {
        match parse_lenient::<T>(candidate) {
            Ok(value) => return Ok(value),
            Err(message) => {
                if last_error.is_none() {
                    last_error = Some(message);
                }
            }
        }
    }

    match last_error {
        Some(message) => Err(ExtractError::Invalid {
            context: context.to_string(),
            message,
        }),
        None => Err(ExtractError::NoObject(context.to_string())),
    }
}
