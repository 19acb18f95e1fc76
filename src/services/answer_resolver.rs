//! 答案解析服务 - 业务能力层
//!
//! 只负责"一个字段应该填什么"：固定答案 → 问答缓存 → Oracle，
//! 不关心字段如何写回页面。

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{FieldDescriptor, FieldKind};
use crate::services::answer_cache::AnswerCache;
use crate::services::oracle::{Oracle, OracleRequest, ProfileFacts};
use crate::utils::truncate_text;

/// 不经过 Oracle 的固定答案
#[derive(Debug, Clone, Default)]
pub struct StaticAnswers {
    pub email: String,
    pub phone: String,
    pub country_code: String,
}

impl StaticAnswers {
    pub fn from_config(config: &Config) -> Self {
        Self {
            email: config.account_email.clone(),
            phone: config.phone_number.clone(),
            country_code: config.country_code.clone(),
        }
    }

    fn for_kind(&self, kind: FieldKind) -> Option<&str> {
        let value = match kind {
            FieldKind::Email => &self.email,
            FieldKind::Phone => &self.phone,
            FieldKind::CountryCode => &self.country_code,
            _ => return None,
        };
        Some(value.as_str()).filter(|v| !v.trim().is_empty())
    }
}

/// 字段没有被填写的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unanswered {
    /// 无法识别的字段类型
    ClassificationMiss,
    /// Oracle 重试用完
    OracleExhausted,
    /// 答案不在可选项中
    NoMatchingOption { answer: String },
    /// 缺少固定答案的配置
    MissingStaticAnswer,
}

/// 对一个字段要执行的动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldAction {
    /// 在文本框中填入
    Fill(String),
    /// 选中值为该字符串的单选项
    SelectRadio(String),
    /// 选中下拉列表中的第 `index` 个选项
    SelectOption { index: usize, label: String },
    /// 保持不变
    Leave(Unanswered),
}

/// 答案解析服务
///
/// 职责：
/// - 持有问答缓存与 Oracle
/// - 只处理单个字段
/// - 不操作页面
pub struct AnswerResolver {
    cache: AnswerCache,
    oracle: Arc<dyn Oracle>,
    static_answers: StaticAnswers,
    profile: ProfileFacts,
}

impl AnswerResolver {
    pub fn new(
        cache: AnswerCache,
        oracle: Arc<dyn Oracle>,
        static_answers: StaticAnswers,
        profile: ProfileFacts,
    ) -> Self {
        Self {
            cache,
            oracle,
            static_answers,
            profile,
        }
    }

    pub fn cache(&self) -> &AnswerCache {
        &self.cache
    }

    /// 解析一个字段
    pub async fn resolve(&mut self, field: &FieldDescriptor) -> FieldAction {
        match field.kind {
            FieldKind::Email | FieldKind::Phone | FieldKind::CountryCode => self.resolve_static(field),
            FieldKind::Text => match self.lookup(field).await {
                Some(answer) => FieldAction::Fill(answer),
                None => FieldAction::Leave(Unanswered::OracleExhausted),
            },
            FieldKind::Radio => match self.lookup(field).await {
                Some(answer) => match_radio(&field.options, &answer).unwrap_or_else(|| {
                    warn!(
                        "⚠️ 答案 '{}' 不在单选项 {:?} 中，字段保持不变: {}",
                        answer, field.options, field.label
                    );
                    FieldAction::Leave(Unanswered::NoMatchingOption { answer })
                }),
                None => FieldAction::Leave(Unanswered::OracleExhausted),
            },
            FieldKind::MultiSelect => match self.lookup(field).await {
                Some(answer) => match_option(&field.options, &answer).unwrap_or_else(|| {
                    warn!(
                        "⚠️ 答案 '{}' 不匹配任何选项，字段保持不变: {}",
                        answer, field.label
                    );
                    FieldAction::Leave(Unanswered::NoMatchingOption { answer })
                }),
                None => FieldAction::Leave(Unanswered::OracleExhausted),
            },
            FieldKind::FileUpload | FieldKind::Unknown => {
                debug!("字段无需回答或无法识别: {}", field.label);
                FieldAction::Leave(Unanswered::ClassificationMiss)
            }
        }
    }

    fn resolve_static(&self, field: &FieldDescriptor) -> FieldAction {
        let Some(value) = self.static_answers.for_kind(field.kind) else {
            warn!("⚠️ 未配置 {:?} 的固定答案: {}", field.kind, field.label);
            return FieldAction::Leave(Unanswered::MissingStaticAnswer);
        };

        if field.options.is_empty() {
            return FieldAction::Fill(value.to_string());
        }
        // 下拉框形式（如国家代码 "India (+91)"）
        match_option(&field.options, value)
            .unwrap_or_else(|| FieldAction::Leave(Unanswered::NoMatchingOption {
                answer: value.to_string(),
            }))
    }

    /// 直接询问 Oracle，不读写缓存（每次内容都不同的文字，如邀请留言）
    pub async fn compose(&self, prompt: &str) -> Option<String> {
        let request = OracleRequest {
            question: prompt,
            options: None,
            profile: &self.profile,
        };
        match self.oracle.answer(&request).await {
            Ok(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) => {
                warn!("⚠️ Oracle 无法生成文字: {}", e);
                None
            }
        }
    }

    /// 缓存优先，未命中时询问 Oracle 并写入缓存
    async fn lookup(&mut self, field: &FieldDescriptor) -> Option<String> {
        if let Some(answer) = self.cache.get(&field.label) {
            debug!("命中问答缓存: {} → {}", truncate_text(&field.label, 60), answer);
            return Some(answer.to_string());
        }

        let options = (!field.options.is_empty()).then_some(field.options.as_slice());
        let request = OracleRequest {
            question: &field.label,
            options,
            profile: &self.profile,
        };

        let answer = match self.oracle.answer(&request).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!("⚠️ Oracle 无法回答，字段保持不变: {} ({})", field.label, e);
                return None;
            }
        };
        if answer.is_empty() {
            warn!("⚠️ Oracle 返回空答案: {}", field.label);
            return None;
        }

        info!("🤖 Oracle 回答: {} → {}", truncate_text(&field.label, 60), answer);
        if let Err(e) = self.cache.put(&field.label, &answer) {
            warn!("⚠️ 写入问答缓存失败: {}", e);
        }
        Some(answer)
    }
}

/// 单选：先精确匹配，再忽略大小写 / 首尾空白的整值匹配
fn match_radio(options: &[String], answer: &str) -> Option<FieldAction> {
    if let Some(exact) = options.iter().find(|o| o.as_str() == answer) {
        return Some(FieldAction::SelectRadio(exact.clone()));
    }
    let wanted = answer.trim().to_lowercase();
    options
        .iter()
        .find(|o| o.trim().to_lowercase() == wanted)
        .map(|o| FieldAction::SelectRadio(o.clone()))
}

/// 下拉：答案（忽略大小写）是选项文本的子串，取第一个
fn match_option(options: &[String], answer: &str) -> Option<FieldAction> {
    let wanted = answer.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    options
        .iter()
        .enumerate()
        .find(|(_, o)| o.to_lowercase().contains(&wanted))
        .map(|(index, o)| FieldAction::SelectOption {
            index,
            label: o.clone(),
        })
}
