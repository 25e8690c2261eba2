use regex::Regex;
use std::sync::LazyLock;

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());
static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ENTITY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&amp;|&lt;|&gt;|&quot;|&#39;").unwrap());

/// 去除HTML标签、合并空白并解码常见实体
pub fn strip_html(input: &str) -> String {
    let without_tags = TAG_REGEX.replace_all(input, " ");
    let collapsed = WHITESPACE_REGEX.replace_all(&without_tags, " ");
    ENTITY_REGEX
        .replace_all(collapsed.trim(), |caps: &regex::Captures| {
            match &caps[0] {
                "&amp;" => "&",
                "&lt;" => "<",
                "&gt;" => ">",
                "&quot;" => "\"",
                "&#39;" => "'",
                other => other,
            }
            .to_string()
        })
        .into_owned()
}
