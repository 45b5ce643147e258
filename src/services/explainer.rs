use std::future::Future;

use serde::Deserialize;

use crate::config::LLMConfig;
use crate::practice::OptionLetter;
use crate::store::operations::questions::Question;

use super::llm_provider::{LlmError, LlmProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedExplanation {
    pub explanation: String,
    pub key_points: Vec<String>,
    /// 模型是否按约定返回了 JSON；否则 `explanation` 是原始文本。
    pub structured: bool,
}

/// 为单道题生成解析的能力，批处理对它泛型。
pub trait ExplanationBackend: Send + Sync {
    fn explain(
        &self,
        question: &Question,
    ) -> impl Future<Output = Result<GeneratedExplanation, LlmError>> + Send;
}

#[derive(Debug, Clone)]
pub struct Explainer {
    provider: LlmProvider,
}

impl Explainer {
    pub fn new(config: &LLMConfig) -> Self {
        Self {
            provider: LlmProvider::new(config),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_enabled()
    }
}

impl ExplanationBackend for Explainer {
    async fn explain(&self, question: &Question) -> Result<GeneratedExplanation, LlmError> {
        let raw = self.provider.generate(&build_prompt(question)).await?;
        parse_response(&raw)
    }
}

pub fn build_prompt(question: &Question) -> String {
    let mut prompt = String::from(
        "你是可持续发展能力认证考试的辅导老师。请为下面的单选题写一段简明的中文解析，\
         说明正确选项为什么正确、其余选项为什么错误。\n\
         只输出 JSON：{\"explanation\": string, \"keyPoints\": string[]}\n\n",
    );
    prompt.push_str(&format!("分类：{}\n题目：{}\n", question.category, question.prompt));
    for (i, option) in question.options.iter().enumerate() {
        if let Some(letter) = OptionLetter::from_index(i) {
            prompt.push_str(&format!("{letter}. {option}\n"));
        }
    }
    prompt.push_str(&format!("正确答案：{}\n", question.correct_answer));
    prompt
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExplanation {
    explanation: String,
    #[serde(default)]
    key_points: Vec<String>,
}

fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or(rest, |(_, body)| body);
    body.strip_suffix("```").unwrap_or(body).trim()
}

fn json_slice(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// 解析模型输出。不符合约定的 JSON 时退回原始文本，只有空输出算失败。
pub fn parse_response(raw: &str) -> Result<GeneratedExplanation, LlmError> {
    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let parsed = json_slice(text)
        .and_then(|slice| serde_json::from_str::<RawExplanation>(slice).ok())
        .filter(|r| !r.explanation.trim().is_empty());

    Ok(match parsed {
        Some(r) => GeneratedExplanation {
            explanation: r.explanation.trim().to_string(),
            key_points: r
                .key_points
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            structured: true,
        },
        None => GeneratedExplanation {
            explanation: text.to_string(),
            key_points: Vec::new(),
            structured: false,
        },
    })
}
