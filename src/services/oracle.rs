//! 问答 Oracle 接口 - 业务能力层
//!
//! 只定义"给一个问题，返回一个答案"的边界，以及调用方共用的重试策略。
//! 具体实现见 [`crate::services::llm_oracle`]。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::Config;

/// Oracle 错误
#[derive(Debug, Error)]
pub enum OracleError {
    /// 所有重试均失败
    #[error("已重试 {attempts} 次仍失败: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
    /// 返回了空答案
    #[error("返回的答案为空")]
    Empty,
    /// 单次请求失败
    #[error("请求失败: {0}")]
    Request(String),
}

/// 随每次提问附带的个人资料
#[derive(Debug, Clone, Default)]
pub struct ProfileFacts {
    pub gender: String,
    pub notice_period: String,
    pub current_ctc: String,
    pub expected_ctc: String,
    pub resume_text: String,
}

impl ProfileFacts {
    /// 从配置构建；简历文本文件读取失败时留空
    pub fn from_config(config: &Config) -> Self {
        let resume_text = match &config.resume_text_path {
            Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
                warn!("⚠️ 无法读取简历文本 {}: {}", path.display(), e);
                String::new()
            }),
            None => String::new(),
        };

        Self {
            gender: config.gender.clone(),
            notice_period: config.notice_period.clone(),
            current_ctc: config.current_ctc.clone(),
            expected_ctc: config.expected_ctc.clone(),
            resume_text,
        }
    }
}

/// 一次提问
#[derive(Debug, Clone, Copy)]
pub struct OracleRequest<'a> {
    pub question: &'a str,
    pub options: Option<&'a [String]>,
    pub profile: &'a ProfileFacts,
}

/// 问答能力
#[async_trait]
pub trait Oracle: Send + Sync {
    /// 返回一个非空答案，失败时返回错误（实现自行负责重试）
    async fn answer(&self, request: &OracleRequest<'_>) -> Result<String, OracleError>;
}

/// 重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// 两次失败之间的等待
    pub delay: Duration,
    /// 每次调用前的固定节流
    pub throttle: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.oracle_max_attempts,
            delay: Duration::from_secs(config.oracle_retry_delay_secs),
            throttle: Duration::from_secs(config.oracle_throttle_secs),
        }
    }

    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
            throttle: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 按策略重复调用 `call`，直到成功或次数用完
pub async fn with_retries<F, Fut>(policy: &RetryPolicy, mut call: F) -> Result<String, OracleError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<String, OracleError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        if !policy.throttle.is_zero() {
            sleep(policy.throttle).await;
        }

        match call().await {
            Ok(answer) => {
                debug!("Oracle 第 {} 次调用成功", attempt);
                return Ok(answer);
            }
            Err(e) => {
                warn!("Oracle 调用失败 (尝试 {}/{}): {}", attempt, attempts, e);
                last_error = e.to_string();
                if attempt < attempts && !policy.delay.is_zero() {
                    sleep(policy.delay).await;
                }
            }
        }
    }

    Err(OracleError::Exhausted {
        attempts,
        last_error,
    })
}

/// 去掉换行并裁剪首尾空白
pub fn clean_answer(raw: &str) -> String {
    raw.replace(['\r', '\n'], " ").trim().to_string()
}
