//! 日志工具模块
//!
//! 提供日志初始化和横幅输出的辅助函数

use tracing::info;
use tracing_subscriber::EnvFilter;

/// 初始化 tracing 订阅者
///
/// 优先使用 `RUST_LOG`，否则根据 `verbose` 选择 debug / info
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // 测试中可能重复初始化，忽略错误
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `searches`: 搜索组合数量
/// - `daily_limit` / `weekly_limit`: 配额上限
pub fn log_startup(searches: usize, daily_limit: u32, weekly_limit: u32) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 自动投递模式");
    info!("🔎 搜索组合: {} 个", searches);
    info!("📊 配额上限: 每日 {}, 每周 {}", daily_limit, weekly_limit);
    info!("{}", "=".repeat(60));
}

/// 记录单次搜索开始
pub fn log_search_start(index: usize, total: usize, keyword: &str, location: Option<&str>) {
    info!("\n{}", "=".repeat(60));
    info!("📦 开始第 {}/{} 个搜索", index, total);
    match location {
        Some(location) => info!("🔍 关键词: {} | 地点: {}", keyword, location),
        None => info!("🔍 关键词: {}", keyword),
    }
    info!("{}", "=".repeat(60));
}
