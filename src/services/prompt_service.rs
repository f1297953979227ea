//! Prompt 构建服务
//!
//! 负责把主题和风格组装成发给上游模型的指令

use serde::{Deserialize, Serialize};

/// 搜索建议行的标记前缀
pub const SEARCH_QUERY_MARKER: &str = "SEARCH_QUERY:";

/// 格式要求：除列表符号外不使用星号
const FORMATTING_RULES: &str = "Formatting rules: do not use asterisks (*) for bold or italic emphasis anywhere in the text. \
The only allowed use of an asterisk is as a bullet point at the very start of a line.";

/// 文章风格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Style {
    #[default]
    Professional,
    Casual,
    Simple,
    Humorous,
    Inspirational,
    Academic,
}

impl Style {
    pub const ALL: [Style; 6] = [
        Style::Professional,
        Style::Casual,
        Style::Simple,
        Style::Humorous,
        Style::Inspirational,
        Style::Academic,
    ];

    /// 从标签解析风格，无法识别时回退到默认风格
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|s| s.label().eq_ignore_ascii_case(label))
            .unwrap_or_default()
    }

    pub fn label(self) -> &'static str {
        match self {
            Style::Professional => "Professional",
            Style::Casual => "Casual",
            Style::Simple => "Simple",
            Style::Humorous => "Humorous",
            Style::Inspirational => "Inspirational",
            Style::Academic => "Academic",
        }
    }

    /// 该风格对应的人设描述
    fn persona(self) -> &'static str {
        match self {
            Style::Professional => {
                "You are a seasoned industry writer. Write in a clear, confident and professional tone suitable for a business audience."
            }
            Style::Casual => {
                "You are a friendly blogger chatting with readers. Write in a relaxed, conversational tone."
            }
            Style::Simple => {
                "You are a patient teacher explaining things to a complete beginner. Use short sentences, plain words and everyday examples."
            }
            Style::Humorous => {
                "You are a witty columnist. Keep the facts accurate but make the writing light-hearted and funny."
            }
            Style::Inspirational => {
                "You are a motivational speaker. Write in an uplifting, encouraging tone that leaves the reader inspired."
            }
            Style::Academic => {
                "You are a university lecturer. Write in a precise, well-structured academic register."
            }
        }
    }
}

/// Prompt 服务
#[derive(Debug, Clone, Copy)]
pub struct PromptService;

impl PromptService {
    pub fn new() -> Self {
        Self
    }

    /// 构建文章生成指令
    pub fn build_post_prompt(&self, topic: &str, style: Style) -> String {
        format!(
            "{persona}\n\n\
             Write an informative post about the following topic: \"{topic}\"\n\n\
             {rules}\n\n\
             After the post, append exactly 3 related search queries a reader could use to learn more. \
             Put each query on its own line, starting with \"{marker}\" followed by the query text.",
            persona = style.persona(),
            topic = topic,
            rules = FORMATTING_RULES,
            marker = SEARCH_QUERY_MARKER,
        )
    }

    /// 构建搜索建议指令
    pub fn build_suggestion_prompt(&self, partial_query: &str) -> String {
        format!(
            "A user is typing a topic they want to read about. Their partial input is: \"{}\"\n\n\
             Provide exactly 4 diverse suggestions that complete or expand on this input. \
             Return one suggestion per line with no numbering, no bullets and no extra text.",
            partial_query
        )
    }
}

impl Default for PromptService {
    fn default() -> Self {
        Self::new()
    }
}
