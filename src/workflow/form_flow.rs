//! 表单处理流程 - 流程层
//!
//! 核心职责：把一个目标的表单从入口推进到终止状态
//!
//! 流程顺序：
//! 1. 打开目标落地页，检查"已完成" / "无入口"
//! 2. 点击入口按钮进入表单
//! 3. 循环：观察页面 → `transition` → 执行动作，直到终止状态或轮数用完
//!
//! 驱动层（`FormPage`）的任何错误都只会让本次尝试以 `Abandoned` 结束。

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::models::{
    Control, LandingPage, PageSnapshot, ProfileCard, RawField, Target, UploadSlot,
};
use crate::services::{classify_step, AnswerResolver, FieldAction};
use crate::utils::parse_page_title;
use crate::workflow::attempt_ctx::AttemptCtx;
use crate::workflow::form_state::{
    landing_state, settle_validation, transition, Effect, FormState, PendingUploads,
    ValidationVerdict,
};

/// 表单页面驱动
///
/// 负责定位元素、点击与读写字段；实现见 `ChromiumFormPage`
#[async_trait]
pub trait FormPage: Send {
    /// 打开目标的落地页
    async fn open_target(&mut self, target: &Target) -> Result<LandingPage>;
    /// 观察当前表单
    async fn observe(&mut self) -> Result<PageSnapshot>;
    /// 读取当前步骤的字段
    async fn read_fields(&mut self) -> Result<Vec<RawField>>;
    /// 把动作写回第 `index` 个字段
    async fn apply(&mut self, index: usize, action: &FieldAction) -> Result<()>;
    async fn upload(&mut self, slot: UploadSlot, path: &Path) -> Result<()>;
    async fn click(&mut self, control: Control) -> Result<()>;
    /// 读取个人主页摘要
    async fn read_profile(&mut self) -> Result<ProfileCard>;
    /// 写入邀请留言
    async fn write_note(&mut self, text: &str) -> Result<()>;
}

/// 流程设置
#[derive(Debug, Clone)]
pub struct FlowSettings {
    /// 连续没有进展的轮数上限
    pub max_iterations: u32,
    /// 总轮数上限
    pub max_steps: u32,
    pub validation_polls: u32,
    pub poll_delay: Duration,
    /// 每轮开始前等待页面稳定
    pub settle_delay: Duration,
    pub uploads: HashMap<UploadSlot, PathBuf>,
}

impl FlowSettings {
    pub fn from_config(config: &Config) -> Self {
        let mut uploads = HashMap::new();
        if let Some(path) = &config.resume_path {
            uploads.insert(UploadSlot::Resume, path.clone());
        }
        if let Some(path) = &config.cover_letter_path {
            uploads.insert(UploadSlot::CoverLetter, path.clone());
        }

        Self {
            max_iterations: config.max_form_iterations.max(1),
            max_steps: config.max_form_steps.max(1),
            validation_polls: config.validation_polls,
            poll_delay: Duration::from_secs(config.validation_poll_delay_secs),
            settle_delay: config.settle_delay(),
            uploads,
        }
    }
}

/// 一次尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub state: FormState,
    /// 是否真正进入了表单
    pub attempted: bool,
    pub title: String,
    pub company: String,
}

/// 表单处理流程
///
/// - 决定每一轮做什么（委托给 `transition`）
/// - 不持有页面资源
/// - 只依赖业务能力（services）
pub struct FormFlow {
    settings: FlowSettings,
}

impl FormFlow {
    pub fn new(settings: FlowSettings) -> Self {
        Self { settings }
    }

    pub async fn run(
        &self,
        page: &mut dyn FormPage,
        target: &Target,
        resolver: &mut AnswerResolver,
        ctx: &AttemptCtx,
    ) -> AttemptOutcome {
        let mut outcome = AttemptOutcome {
            state: FormState::Started,
            attempted: false,
            title: target.title.clone(),
            company: target.company.clone(),
        };

        // ========== 落地页检查 ==========
        let landing = match page.open_target(target).await {
            Ok(landing) => landing,
            Err(e) => {
                warn!("{} ⚠️ 无法打开目标页面: {}", ctx, e);
                outcome.state = FormState::Abandoned;
                return outcome;
            }
        };

        if outcome.title.is_empty() || outcome.company.is_empty() {
            let (title, company) = parse_page_title(&landing.page_title);
            if outcome.title.is_empty() {
                outcome.title = title;
            }
            if outcome.company.is_empty() {
                outcome.company = company;
            }
        }

        let state = landing_state(&landing);
        match state {
            FormState::AlreadyDone => {
                info!("{} ⏭️ 之前已经处理过，跳过", ctx);
                outcome.state = state;
                return outcome;
            }
            FormState::Blocked => {
                info!("{} ⏭️ 没有入口按钮，跳过", ctx);
                outcome.state = state;
                return outcome;
            }
            _ => {}
        }

        if let Err(e) = page.click(Control::Entry).await {
            warn!("{} ⚠️ 无法点击入口按钮: {}", ctx, e);
            outcome.state = FormState::Abandoned;
            return outcome;
        }
        outcome.attempted = true;

        // ========== 表单循环 ==========
        outcome.state = self.drive(page, resolver, ctx).await;
        match outcome.state {
            FormState::Submitted => info!("{} ✅ 已提交", ctx),
            other => info!("{} 结束于 {}", ctx, other.label()),
        }
        outcome
    }

    async fn drive(
        &self,
        page: &mut dyn FormPage,
        resolver: &mut AnswerResolver,
        ctx: &AttemptCtx,
    ) -> FormState {
        let mut state = FormState::Started;
        let mut uploaded: HashSet<UploadSlot> = HashSet::new();
        let mut stalls = 0u32;

        for step in 1..=self.settings.max_steps {
            if !self.settings.settle_delay.is_zero() {
                sleep(self.settings.settle_delay).await;
            }

            let snapshot = match page.observe().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("{} ⚠️ 无法读取表单状态: {}", ctx, e);
                    return FormState::Abandoned;
                }
            };

            let pending = self.pending_uploads(&uploaded);
            let t = transition(state, &snapshot, pending);
            debug!("{} 第 {} 轮: {} → {} {:?}", ctx, step, state.label(), t.next.label(), t.effects);

            let mut progressed = t.advances();
            let mut next = t.next;

            for effect in &t.effects {
                match *effect {
                    Effect::Upload(slot) => {
                        // 失败的上传保持待处理，下一轮再试
                        if self.upload(page, slot, ctx).await {
                            uploaded.insert(slot);
                            progressed = true;
                        }
                    }
                    Effect::FollowCompany => {
                        if let Err(e) = page.click(Control::FollowCompany).await {
                            warn!("{} ⚠️ 无法勾选关注公司: {}", ctx, e);
                        }
                    }
                    Effect::ResolveFields => {
                        if let Err(e) = self.resolve_fields(page, resolver, ctx).await {
                            warn!("{} ⚠️ 回答问题失败: {}", ctx, e);
                        }
                    }
                    Effect::Click(control) => {
                        if let Err(e) = page.click(control).await {
                            warn!("{} ⚠️ 无法点击 {:?}: {}", ctx, control, e);
                            return FormState::Abandoned;
                        }
                        if control == Control::Submit {
                            info!("{} 📨 已点击提交", ctx);
                        }
                    }
                    Effect::PollValidation => match self.poll_validation(page, resolver, ctx).await {
                        ValidationVerdict::Sent => next = FormState::Submitted,
                        ValidationVerdict::EntryReappeared => {
                            info!("{} ⏭️ 表单已关闭，放弃本次尝试", ctx);
                            next = FormState::Abandoned;
                        }
                        ValidationVerdict::Cleared => progressed = true,
                        ValidationVerdict::Pending => {}
                    },
                }
            }

            state = next;
            if state.is_terminal() {
                return state;
            }

            stalls = if progressed { 0 } else { stalls + 1 };
            if stalls >= self.settings.max_iterations {
                warn!("{} ⚠️ 连续 {} 轮没有进展，放弃", ctx, stalls);
                return FormState::Abandoned;
            }
        }

        warn!("{} ⚠️ 已达到 {} 轮上限，放弃", ctx, self.settings.max_steps);
        FormState::Abandoned
    }

    fn pending_uploads(&self, uploaded: &HashSet<UploadSlot>) -> PendingUploads {
        let pending = |slot: UploadSlot| self.settings.uploads.contains_key(&slot) && !uploaded.contains(&slot);
        PendingUploads {
            resume: pending(UploadSlot::Resume),
            cover_letter: pending(UploadSlot::CoverLetter),
        }
    }

    /// 返回是否上传成功
    async fn upload(&self, page: &mut dyn FormPage, slot: UploadSlot, ctx: &AttemptCtx) -> bool {
        let Some(path) = self.settings.uploads.get(&slot) else {
            return false;
        };
        match page.upload(slot, path).await {
            Ok(()) => {
                info!("{} 📎 已上传 {:?}: {}", ctx, slot, path.display());
                true
            }
            Err(e) => {
                warn!("{} ⚠️ 上传 {:?} 失败: {}", ctx, slot, e);
                false
            }
        }
    }

    /// 分类并回答当前步骤的全部字段
    async fn resolve_fields(
        &self,
        page: &mut dyn FormPage,
        resolver: &mut AnswerResolver,
        ctx: &AttemptCtx,
    ) -> Result<()> {
        let raw = page.read_fields().await?;
        let step = classify_step(&raw);

        for field in step.fields.iter() {
            let action = resolver.resolve(field).await;
            match &action {
                FieldAction::Leave(reason) => {
                    debug!("{} 字段保持不变: {} ({:?})", ctx, field.label, reason);
                }
                _ => {
                    if let Err(e) = page.apply(field.index, &action).await {
                        warn!("{} ⚠️ 无法填写字段 {}: {}", ctx, field.label, e);
                    }
                }
            }
        }
        Ok(())
    }

    /// 等待校验错误消失，期间重新回答问题
    async fn poll_validation(
        &self,
        page: &mut dyn FormPage,
        resolver: &mut AnswerResolver,
        ctx: &AttemptCtx,
    ) -> ValidationVerdict {
        for poll in 1..=self.settings.validation_polls {
            info!(
                "{} 请回答表单问题，等待 {} 秒... ({}/{})",
                ctx,
                self.settings.poll_delay.as_secs(),
                poll,
                self.settings.validation_polls
            );
            if !self.settings.poll_delay.is_zero() {
                sleep(self.settings.poll_delay).await;
            }

            let snapshot = match page.observe().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("{} ⚠️ 无法读取表单状态: {}", ctx, e);
                    return ValidationVerdict::EntryReappeared;
                }
            };

            match settle_validation(&snapshot) {
                ValidationVerdict::Pending => {
                    if snapshot.has_questions {
                        if let Err(e) = self.resolve_fields(page, resolver, ctx).await {
                            warn!("{} ⚠️ 回答问题失败: {}", ctx, e);
                        }
                    }
                }
                verdict => return verdict,
            }
        }
        ValidationVerdict::Pending
    }
}
