//! LLM Oracle - 业务能力层
//!
//! 只负责"把表单问题交给 LLM 回答"，不关心答案如何使用
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（兼容 OpenAI API 的服务）

use anyhow::Result;
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::services::oracle::{
    clean_answer, with_retries, Oracle, OracleError, OracleRequest, RetryPolicy,
};
use crate::utils::truncate_text;

const SYSTEM_MESSAGE: &str = "You are filling in a job application form on behalf of a candidate. \
Answer with the value to put in the field and nothing else.";

/// 基于 LLM 的 Oracle
///
/// 职责：
/// - 为单个表单问题构建提示词并调用 LLM
/// - 按 `RetryPolicy` 节流与重试
/// - 不读写问答缓存
pub struct LlmOracle {
    client: Client<OpenAIConfig>,
    model_name: String,
    policy: RetryPolicy,
}

impl LlmOracle {
    pub fn new(config: &Config) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
            policy: RetryPolicy::from_config(config),
        }
    }

    /// 单次 LLM 调用
    async fn send_to_llm(&self, user_message: &str) -> Result<String> {
        debug!("调用 LLM API，模型: {}", self.model_name);

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_MESSAGE)
            .build()?;
        let user_msg = ChatCompletionRequestUserMessageArgs::default()
            .content(user_message)
            .build()?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_msg),
                ChatCompletionRequestMessage::User(user_msg),
            ])
            .temperature(0.2)
            .max_tokens(256u32)
            .build()?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            anyhow::anyhow!("LLM API 调用失败: {}", e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow::anyhow!("LLM 返回内容为空"))?;

        Ok(content)
    }

    async fn ask_once(&self, prompt: &str) -> Result<String, OracleError> {
        let raw = self
            .send_to_llm(prompt)
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;

        let answer = clean_answer(&raw);
        if answer.is_empty() {
            return Err(OracleError::Empty);
        }
        Ok(answer)
    }
}

#[async_trait]
impl Oracle for LlmOracle {
    async fn answer(&self, request: &OracleRequest<'_>) -> Result<String, OracleError> {
        let prompt = build_prompt(request);
        debug!("向 LLM 提问: {}", truncate_text(request.question, 80));
        with_retries(&self.policy, || self.ask_once(&prompt)).await
    }
}

/// 构建提示词：个人资料 + 问题 + 可选项
fn build_prompt(request: &OracleRequest<'_>) -> String {
    let profile = request.profile;
    let mut prompt = format!(
        "Candidate profile:\n\
         - Gender: {}\n\
         - Notice period: {}\n\
         - Current CTC: {}\n\
         - Expected CTC: {}\n",
        profile.gender, profile.notice_period, profile.current_ctc, profile.expected_ctc
    );

    if !profile.resume_text.trim().is_empty() {
        prompt.push_str("\nResume:\n");
        prompt.push_str(profile.resume_text.trim());
        prompt.push('\n');
    }

    prompt.push_str(&format!("\nQuestion: {}\n", request.question));

    match request.options {
        Some(options) if !options.is_empty() => {
            prompt.push_str(&format!("Options: {}\n", options.join(" | ")));
            prompt.push_str("Reply with exactly one of the options, copied verbatim.");
        }
        _ => {
            prompt.push_str(
                "Reply with a short answer only. Use a plain number when the question asks for a number.",
            );
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::oracle::ProfileFacts;

    fn profile() -> ProfileFacts {
        ProfileFacts {
            gender: "Female".to_string(),
            notice_period: "30 days".to_string(),
            current_ctc: "10 LPA".to_string(),
            expected_ctc: "14 LPA".to_string(),
            resume_text: String::new(),
        }
    }

    #[test]
    fn test_prompt_lists_options() {
        let profile = profile();
        let options = vec!["Yes".to_string(), "No".to_string()];
        let prompt = build_prompt(&OracleRequest {
            question: "Are you willing to relocate?",
            options: Some(&options),
            profile: &profile,
        });

        assert!(prompt.contains("Question: Are you willing to relocate?"));
        assert!(prompt.contains("Options: Yes | No"));
        assert!(prompt.contains("Notice period: 30 days"));
        assert!(!prompt.contains("Resume:"));
    }

    #[test]
    fn test_prompt_without_options_asks_for_short_answer() {
        let profile = ProfileFacts {
            resume_text: "Rust engineer, 4 years".to_string(),
            ..profile()
        };
        let prompt = build_prompt(&OracleRequest {
            question: "Years of experience with Rust?",
            options: None,
            profile: &profile,
        });

        assert!(prompt.contains("Resume:\nRust engineer, 4 years"));
        assert!(prompt.contains("plain number"));
    }

    #[tokio::test]
    #[ignore] // 需要真实的 LLM_API_KEY
    async fn test_live_answer() {
        let config = Config::from_env();
        let oracle = LlmOracle::new(&config);
        let profile = profile();
        let options = vec!["Yes".to_string(), "No".to_string()];
        let answer = oracle
            .answer(&OracleRequest {
                question: "Are you comfortable working from the office?",
                options: Some(&options),
                profile: &profile,
            })
            .await
            .unwrap();
        println!("LLM 回答: {}", answer);
    }
}
