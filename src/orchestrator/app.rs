//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：连接浏览器、加载账本 / 缓存 / 结果日志、构建 Oracle 与发现源，
//!    按运行模式选择申请表单或好友邀请流程
//! 2. **搜索组合**：按 关键词 × 地点 依次执行，每次搜索有独立的时间盒
//! 3. **资源管理**：持有 Browser 和表单驱动，确保生命周期正确
//! 4. **全局统计**：汇总所有搜索的处理结果
//!
//! 配额用完、达到单次运行上限或账本无法写入时停止所有剩余搜索；认证失败直接返回错误。

use std::sync::Arc;

use anyhow::Result;
use chromiumoxide::Browser;
use chrono::Local;
use tracing::{error, info};

use crate::browser;
use crate::config::Config;
use crate::error::{AppError, BrowserError};
use crate::infrastructure::{ChromiumFormPage, JsExecutor};
use crate::orchestrator::target_processor::{Blacklist, Orchestrator, SearchStats, StopReason};
use crate::services::{
    AnswerCache, AnswerResolver, DiscoveryPager, DiscoverySource, HttpDiscoverySource,
    LedgerOptions, LlmOracle, Oracle, OutcomeLog, PagerSettings, ProfileFacts, QuotaLedger,
    SearchSpec, StaticAnswers,
};
use crate::utils::logging;
use crate::workflow::Outreach;

/// 应用主结构
pub struct App {
    config: Config,
    _browser: Browser,
    page: ChromiumFormPage,
    source: Arc<dyn DiscoverySource>,
    orchestrator: Orchestrator,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        // 端口为 0 时启动无头浏览器
        let port = config.browser_debug_port;
        let connected = if port == 0 {
            browser::launch_headless_browser(&config.start_url, config.chrome_executable.as_deref())
                .await
        } else {
            browser::connect_to_browser_and_page(port, &config.start_url).await
        };
        let (browser, page) = connected.map_err(|e| {
            AppError::from(BrowserError::ConnectionFailed {
                port,
                message: e.to_string(),
            })
        })?;
        let page = ChromiumFormPage::new(JsExecutor::new(page), &config);

        let ledger = QuotaLedger::load(&config.ledger_path, LedgerOptions::from_config(&config));
        info!(
            "📒 账本: 今日 {}/{}, 本周 {}/{}",
            ledger.daily_count(),
            config.daily_limit,
            ledger.weekly_count(),
            config.weekly_limit
        );

        let cache = AnswerCache::open_or_empty(&config.qa_cache_path);
        info!("💬 问答缓存: {} 条", cache.len());

        let oracle: Arc<dyn Oracle> = Arc::new(LlmOracle::new(&config));
        let resolver = AnswerResolver::new(
            cache,
            oracle,
            StaticAnswers::from_config(&config),
            ProfileFacts::from_config(&config),
        );

        let outcome_log = OutcomeLog::with_path(&config.outcome_log_path);
        let recent_ids =
            outcome_log.load_recent_ids(config.dedup_lookback(), Local::now().naive_local());

        let source: Arc<dyn DiscoverySource> = Arc::new(HttpDiscoverySource::new(&config)?);
        info!("🧭 运行模式: {:?}", config.mode);

        let orchestrator = Orchestrator::new(
            ledger,
            resolver,
            outcome_log,
            recent_ids,
            Blacklist::from_config(&config),
            Outreach::from_config(&config),
            config.max_actions_per_run,
        );

        Ok(Self {
            config,
            _browser: browser,
            page,
            source,
            orchestrator,
        })
    }

    /// 运行应用主逻辑
    pub async fn run(mut self) -> Result<()> {
        let searches = search_specs(&self.config);
        logging::log_startup(searches.len(), self.config.daily_limit, self.config.weekly_limit);

        let total = searches.len();
        let mut totals = SearchStats::default();

        for (index, search) in searches.into_iter().enumerate() {
            logging::log_search_start(index + 1, total, &search.keywords, search.location.as_deref());

            let pager = DiscoveryPager::new(
                self.source.clone(),
                search,
                PagerSettings::from_config(&self.config),
            );

            let report = match self
                .orchestrator
                .run_search(&pager, &mut self.page, self.config.max_search_time())
                .await
            {
                Ok(report) => report,
                Err(e) if e.is_fatal() => {
                    error!("❌ 致命错误，终止运行: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!("❌ 搜索失败: {}", e);
                    continue;
                }
            };

            log_search_complete(index + 1, &report.stats, report.stop);
            totals.absorb(&report.stats);

            if report.stop.halts_run() {
                break;
            }
        }

        print_final_stats(&totals, &self.orchestrator, &self.config);
        Ok(())
    }
}

/// 所有 关键词 × 地点 组合，顺序固定
///
/// 没有配置地点时每个关键词只搜索一次
pub fn search_specs(config: &Config) -> Vec<SearchSpec> {
    let locations: Vec<Option<String>> = if config.locations.is_empty() {
        vec![None]
    } else {
        config.locations.iter().cloned().map(Some).collect()
    };

    config
        .keywords
        .iter()
        .flat_map(|keyword| {
            locations.iter().map(move |location| {
                SearchSpec::new(keyword.clone(), location.clone())
                    .with_experience_levels(&config.experience_levels)
            })
        })
        .collect()
}

// ========== 日志辅助函数 ==========

fn log_search_complete(index: usize, stats: &SearchStats, stop: StopReason) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 第 {} 个搜索结束 ({:?}): 提交 {}, 已完成 {}, 跳过 {}, 黑名单/无入口 {}, 放弃 {}",
        index, stop, stats.submitted, stats.already_done, stats.skipped, stats.blocked, stats.abandoned
    );
    info!("{}", "─".repeat(60));
}

fn print_final_stats(stats: &SearchStats, orchestrator: &Orchestrator, config: &Config) {
    let ledger = orchestrator.ledger();
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!("完成时间: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("{}", "=".repeat(60));
    info!("✅ 提交: {} (进入表单 {} 次)", stats.submitted, stats.attempts);
    info!("⏭️ 已完成: {}, 跳过: {}", stats.already_done, stats.skipped);
    info!("⛔ 黑名单/无入口: {}", stats.blocked);
    info!("❌ 放弃: {}", stats.abandoned);
    info!(
        "📒 配额: 今日 {}/{}, 本周 {}/{}",
        ledger.daily_count(),
        config.daily_limit,
        ledger.weekly_count(),
        config.weekly_limit
    );
    info!("{}", "=".repeat(60));
    info!("\n结果日志已保存至: {}", config.outcome_log_path.display());
}
