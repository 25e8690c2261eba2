use serde::{Deserialize, Serialize};

/// 调研输出语言
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Locale {
    #[serde(rename = "en")]
    #[default]
    English,
    #[serde(rename = "ja")]
    Japanese,
}

impl std::fmt::Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locale::English => write!(f, "en"),
            Locale::Japanese => write!(f, "ja"),
        }
    }
}

impl std::str::FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" | "英文" => Ok(Locale::English),
            "ja" | "japanese" | "日本語" | "日文" => Ok(Locale::Japanese),
            _ => Err(format!("Unknown locale: {}", s)),
        }
    }
}

impl Locale {
    /// 宽松解析请求中的locale字段：只有 "ja" 会被识别为日语，其余一律按英语处理
    pub fn from_request(value: Option<&str>) -> Self {
        match value {
            Some("ja") => Locale::Japanese,
            _ => Locale::English,
        }
    }

    /// 获取追加在提示词末尾的回复语言指令
    pub fn prompt_instruction(&self) -> &'static str {
        match self {
            Locale::English => "Respond in natural English.",
            Locale::Japanese => "応答は自然な日本語で書いてください。",
        }
    }

    /// 在基础指令后追加语言指令
    pub fn directive(&self, base: &str) -> String {
        format!("{}\n{}", base, self.prompt_instruction())
    }

    /// Wikimedia 图片检索时附加的关键词
    pub fn portrait_search_suffix(&self) -> &'static str {
        match self {
            Locale::English => "profile portrait",
            Locale::Japanese => "人物 ポートレート",
        }
    }

    /// 主体名称解析时的命名要求
    pub fn subject_naming_instruction(&self) -> &'static str {
        match self {
            Locale::English => {
                "Return the value using the entity's canonical English name when possible."
            }
            Locale::Japanese => "回答の値は可能であれば日本語の正式名称を使ってください。",
        }
    }

    /// 获取兜底报告使用的固定文案
    pub fn msg(&self, key: &str) -> &'static str {
        match self {
            Locale::English => match key {
                "partial_heading" => "Research Results (Partial)",
                "partial_lead" => {
                    "The research was stopped, but the following information was collected."
                }
                "plan_heading" => "Research Plan",
                "planned_steps" => "Planned Steps",
                "plan_stopped" => "*Research was stopped before gathering evidence.*",
                _ => "",
            },
            Locale::Japanese => match key {
                "partial_heading" => "調査結果（部分的）",
                "partial_lead" => "調査は途中で中止されましたが、以下の情報を収集しました。",
                "plan_heading" => "調査計画",
                "planned_steps" => "計画されたステップ",
                "plan_stopped" => "*調査は開始前に中止されました。*",
                _ => "",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Locale;

    #[test]
    fn test_locale_from_str() {
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::English);
        assert_eq!("JA".parse::<Locale>().unwrap(), Locale::Japanese);
        assert_eq!("日本語".parse::<Locale>().unwrap(), Locale::Japanese);
        assert!("zh".parse::<Locale>().is_err());
    }

    #[test]
    fn test_locale_from_request_is_lenient() {
        assert_eq!(Locale::from_request(Some("ja")), Locale::Japanese);
        assert_eq!(Locale::from_request(Some("en")), Locale::English);
        assert_eq!(Locale::from_request(Some("fr")), Locale::English);
        assert_eq!(Locale::from_request(None), Locale::English);
    }

    #[test]
    fn test_locale_serde_uses_short_tags() {
        assert_eq!(serde_json::to_string(&Locale::Japanese).unwrap(), "\"ja\"");
        let parsed: Locale = serde_json::from_str("\"en\"").unwrap();
        assert_eq!(parsed, Locale::English);
    }

    #[test]
    fn test_directive_appends_language_instruction() {
        let text = Locale::Japanese.directive("Plan the research.");
        assert!(text.starts_with("Plan the research.\n"));
        assert!(text.ends_with("応答は自然な日本語で書いてください。"));
    }
}
