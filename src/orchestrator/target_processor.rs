//! 单次搜索的目标处理器 - 编排层
//!
//! ## 职责
//!
//! 按页消费发现分页器给出的目标，对每个目标依次判断：
//!
//! 1. **去重**：最近处理过（结果日志窗口）或账本中已有 → 跳过
//! 2. **配额**：今日 / 本周配额用完 → 停止整个运行
//! 3. **黑名单**：公司或标题命中，或不在目标公司中 → 记为 `BLOCKED`，不打开页面
//! 4. **表单**：委托 `Outreach`，只有 `SUBMITTED` 才消耗配额
//! 5. **记账**：提交后写入账本；账本写不进去时停止运行
//!
//! 每个真正处理过的目标都会追加一条结果记录。
//! 时间盒只在两页之间检查，不会打断正在进行的尝试。

use std::collections::HashSet;
use std::time::{Duration, Instant};

use chrono::Local;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{AppError, LedgerError};
use crate::models::{ApplicationRecord, Target};
use crate::services::{AnswerResolver, DiscoveryPager, OutcomeLog, QuotaLedger};
use crate::workflow::{AttemptCtx, FormPage, FormState, Outreach};

/// 搜索统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchStats {
    pub submitted: usize,
    pub already_done: usize,
    pub blocked: usize,
    pub abandoned: usize,
    /// 因去重跳过的目标
    pub skipped: usize,
    /// 真正进入表单的次数
    pub attempts: usize,
}

impl SearchStats {
    pub fn absorb(&mut self, other: &SearchStats) {
        self.submitted += other.submitted;
        self.already_done += other.already_done;
        self.blocked += other.blocked;
        self.abandoned += other.abandoned;
        self.skipped += other.skipped;
        self.attempts += other.attempts;
    }

    fn count(&mut self, state: FormState) {
        match state {
            FormState::Submitted => self.submitted += 1,
            FormState::AlreadyDone => self.already_done += 1,
            FormState::Blocked => self.blocked += 1,
            _ => self.abandoned += 1,
        }
    }
}

/// 一次搜索停止的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 没有更多目标
    Exhausted,
    /// 配额用完，整个运行应当停止
    QuotaReached,
    /// 达到单次运行的动作上限
    RunCapReached,
    /// 超过单次搜索的时间
    TimeBoxed,
    /// 账本无法写入，继续执行会绕过配额
    LedgerUnavailable,
}

impl StopReason {
    /// 是否应当停止后续所有搜索
    pub fn halts_run(self) -> bool {
        matches!(
            self,
            StopReason::QuotaReached | StopReason::RunCapReached | StopReason::LedgerUnavailable
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchReport {
    pub stats: SearchStats,
    pub stop: StopReason,
}

/// 目标黑名单
///
/// 设置了目标公司时，公司名不包含其中任何一个的目标也会被拦下
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    companies: Vec<String>,
    title_words: Vec<String>,
    required_companies: Vec<String>,
}

impl Blacklist {
    pub fn new(companies: &[String], title_words: &[String]) -> Self {
        let normalize = |items: &[String]| {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            companies: normalize(companies),
            title_words: normalize(title_words),
            required_companies: Vec::new(),
        }
    }

    /// 只允许这些公司的目标
    pub fn with_required_companies(mut self, companies: &[String]) -> Self {
        self.required_companies = companies
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.blacklist_companies, &config.blacklist_title_words)
            .with_required_companies(&config.target_companies)
    }

    /// 公司名完全匹配，或标题包含任一关键词（均忽略大小写）；
    /// 设置了目标公司时，公司名不包含任一目标公司也算命中
    pub fn matches(&self, target: &Target) -> bool {
        let company = target.company.trim().to_lowercase();
        let title = target.title.to_lowercase();
        let outside_required = !self.required_companies.is_empty()
            && !self
                .required_companies
                .iter()
                .any(|c| company.contains(c.as_str()));
        (!company.is_empty() && self.companies.iter().any(|c| *c == company))
            || self.title_words.iter().any(|w| title.contains(w.as_str()))
            || outside_required
    }
}

enum Step {
    Continue,
    Halt(StopReason),
}

/// 目标处理器
///
/// 持有账本、答案解析、结果日志等所有状态，跨多次搜索复用
pub struct Orchestrator {
    ledger: QuotaLedger,
    resolver: AnswerResolver,
    outcome_log: OutcomeLog,
    recent_ids: HashSet<String>,
    blacklist: Blacklist,
    flow: Outreach,
    max_actions: usize,
    actions_taken: usize,
    seen: usize,
}

impl Orchestrator {
    pub fn new(
        ledger: QuotaLedger,
        resolver: AnswerResolver,
        outcome_log: OutcomeLog,
        recent_ids: HashSet<String>,
        blacklist: Blacklist,
        flow: impl Into<Outreach>,
        max_actions: usize,
    ) -> Self {
        Self {
            ledger,
            resolver,
            outcome_log,
            recent_ids,
            blacklist,
            flow: flow.into(),
            max_actions,
            actions_taken: 0,
            seen: 0,
        }
    }

    pub fn ledger(&self) -> &QuotaLedger {
        &self.ledger
    }

    /// 本次运行中已提交的数量
    pub fn actions_taken(&self) -> usize {
        self.actions_taken
    }

    fn run_cap_reached(&self) -> bool {
        self.max_actions > 0 && self.actions_taken >= self.max_actions
    }

    /// 处理一次搜索的所有目标
    ///
    /// 只有认证失败会作为错误返回，其余情况都体现在 `StopReason` 中
    pub async fn run_search(
        &mut self,
        pager: &DiscoveryPager,
        page: &mut dyn FormPage,
        time_box: Duration,
    ) -> Result<SearchReport, AppError> {
        let started = Instant::now();
        let mut stats = SearchStats::default();
        let mut cursor = 0;

        let stop = loop {
            if self.run_cap_reached() {
                break StopReason::RunCapReached;
            }
            if started.elapsed() >= time_box {
                info!("⏱️ 搜索已超过 {} 秒，结束本次搜索", time_box.as_secs());
                break StopReason::TimeBoxed;
            }

            let discovered = pager.next_page(cursor).await?;

            let mut halted = None;
            for target in &discovered.targets {
                if let Step::Halt(reason) = self.process_target(page, target, &mut stats).await {
                    halted = Some(reason);
                    break;
                }
            }
            if let Some(reason) = halted {
                break reason;
            }

            if discovered.is_last() {
                break StopReason::Exhausted;
            }
            cursor = discovered.next_cursor;
        };

        Ok(SearchReport { stats, stop })
    }

    async fn process_target(
        &mut self,
        page: &mut dyn FormPage,
        target: &Target,
        stats: &mut SearchStats,
    ) -> Step {
        self.seen += 1;
        let ctx = AttemptCtx::new(target.id.clone(), self.seen);

        // ========== 去重 ==========
        if self.recent_ids.contains(&target.id) {
            info!("{} ⏭️ 最近已处理过，跳过", ctx);
            stats.skipped += 1;
            return Step::Continue;
        }
        if self.ledger.contains(&target.id) {
            info!("{} ⏭️ 账本中已有记录，跳过", ctx);
            stats.skipped += 1;
            return Step::Continue;
        }

        // ========== 配额 ==========
        if let Err(e) = self.ledger.check_capacity() {
            info!("{} 🛑 {}，停止运行", ctx, e);
            return Step::Halt(StopReason::QuotaReached);
        }

        info!("{} 🎯 {}", ctx, target.display_name());

        // ========== 黑名单 / 表单 ==========
        let (state, attempted, title, company) = if self.blacklist.matches(target) {
            info!("{} ⛔ 命中黑名单或不在目标公司中，跳过", ctx);
            (
                FormState::Blocked,
                false,
                target.title.clone(),
                target.company.clone(),
            )
        } else {
            let outcome = self.flow.run(page, target, &mut self.resolver, &ctx).await;
            (outcome.state, outcome.attempted, outcome.title, outcome.company)
        };

        stats.count(state);
        if attempted {
            stats.attempts += 1;
        }

        let submitted = state == FormState::Submitted;
        let mut halt = None;
        if submitted {
            // 动作已经在页面上发生，无论账本是否记录成功都计入本次运行
            self.actions_taken += 1;
            halt = self.record_submission(target, &ctx);
        }

        let record = ApplicationRecord {
            timestamp: Local::now().naive_local(),
            target_id: target.id.clone(),
            title,
            company,
            attempted,
            result: submitted,
        };
        if let Err(e) = self.outcome_log.append(&record) {
            error!("{} ❌ 结果日志写入失败: {}", ctx, e);
        }
        self.recent_ids.insert(target.id.clone());

        if let Some(reason) = halt {
            return Step::Halt(reason);
        }
        if self.run_cap_reached() {
            info!("🛑 已达到单次运行上限 ({} 个)", self.max_actions);
            return Step::Halt(StopReason::RunCapReached);
        }
        Step::Continue
    }

    /// 把一次提交写入账本，返回需要停止运行的原因
    fn record_submission(&mut self, target: &Target, ctx: &AttemptCtx) -> Option<StopReason> {
        match self.ledger.record_action(&target.id, 1) {
            Ok(()) => {
                info!(
                    "{} 📊 配额: 今日 {}, 本周 {}",
                    ctx,
                    self.ledger.daily_count(),
                    self.ledger.weekly_count()
                );
                None
            }
            Err(LedgerError::Persistence(e)) => {
                error!("{} ❌ 账本写入失败，停止运行: {}", ctx, e);
                Some(StopReason::LedgerUnavailable)
            }
            Err(e @ LedgerError::QuotaExceeded { .. }) => {
                // 其它进程已经用完了配额
                warn!("{} 🛑 账本未记录: {}，停止运行", ctx, e);
                self.ledger.reload();
                Some(StopReason::QuotaReached)
            }
            Err(e @ LedgerError::DuplicateTarget { .. }) => {
                warn!("{} ⚠️ 账本未记录: {}", ctx, e);
                self.ledger.reload();
                None
            }
        }
    }
}
