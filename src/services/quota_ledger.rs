//! 配额账本服务 - 业务能力层
//!
//! 只负责"能否再执行一次动作"以及"记录一次动作"，不关心流程
//!
//! 每次记录都在排他锁下重新读取文件（读-改-写），再原子替换整个文件，
//! 所以多个进程共用同一个账本时计数不会丢失。

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LedgerError, PersistenceError};
use crate::models::{ActedEntry, QuotaState, SlotKeys};
use crate::utils::{atomic_write, LockFile};

/// 账本选项
#[derive(Debug, Clone)]
pub struct LedgerOptions {
    pub daily_limit: u32,
    pub weekly_limit: u32,
    pub retention_days: Option<u32>,
    pub lock_attempts: u32,
    pub lock_delay: Duration,
}

impl LedgerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            daily_limit: config.daily_limit,
            weekly_limit: config.weekly_limit,
            retention_days: config.acted_retention_days,
            lock_attempts: config.ledger_lock_attempts,
            lock_delay: Duration::from_millis(config.ledger_lock_delay_ms),
        }
    }
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// 配额账本
pub struct QuotaLedger {
    path: PathBuf,
    options: LedgerOptions,
    state: QuotaState,
}

impl QuotaLedger {
    /// 加载账本（失败时降级为空记录，不会中断）
    pub fn load(path: impl Into<PathBuf>, options: LedgerOptions) -> Self {
        Self::load_at(path, options, today())
    }

    pub fn load_at(path: impl Into<PathBuf>, options: LedgerOptions, today: NaiveDate) -> Self {
        let path = path.into();
        let keys = SlotKeys::at(today);

        let state = match read_state(&path) {
            Ok(Some(state)) => state
                .rolled_over(&keys)
                .pruned(options.retention_days, today),
            Ok(None) => match create_missing(&path, &keys, &options) {
                Ok(state) => state.rolled_over(&keys).pruned(options.retention_days, today),
                Err(e) => {
                    warn!("⚠️ 无法创建账本文件 {}: {}", path.display(), e);
                    QuotaState::fresh(&keys)
                }
            },
            Err(e) => {
                warn!("⚠️ 读取账本失败，按空记录处理: {}", e);
                QuotaState::fresh(&keys)
            }
        };

        debug!(
            "账本已加载: 今日 {}, 本周 {}, 已处理 {} 个目标",
            state.daily_count,
            state.weekly_count,
            state.acted.len()
        );

        Self {
            path,
            options,
            state,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 重新读取文件，和其它进程的写入对齐（读取失败时保留内存状态）
    pub fn reload(&mut self) {
        self.reload_at(today())
    }

    pub fn reload_at(&mut self, today: NaiveDate) {
        let keys = SlotKeys::at(today);
        match read_state(&self.path) {
            Ok(Some(state)) => {
                self.state = state
                    .rolled_over(&keys)
                    .pruned(self.options.retention_days, today);
            }
            Ok(None) => debug!("账本文件不存在，保留内存状态"),
            Err(e) => warn!("⚠️ 重新读取账本失败: {}", e),
        }
    }

    pub fn state(&self) -> &QuotaState {
        &self.state
    }

    pub fn daily_count(&self) -> u32 {
        self.state.daily_count
    }

    pub fn weekly_count(&self) -> u32 {
        self.state.weekly_count
    }

    /// 目标是否在永久集合中
    pub fn contains(&self, target_id: &str) -> bool {
        self.state.contains(target_id)
    }

    /// 是否还能执行动作（与目标无关）
    pub fn check_capacity(&self) -> Result<(), LedgerError> {
        self.check_capacity_at(today())
    }

    pub fn check_capacity_at(&self, today: NaiveDate) -> Result<(), LedgerError> {
        let state = self.state.clone().rolled_over(&SlotKeys::at(today));
        self.ensure_capacity(&state, 1)
    }

    /// 检查能否对目标执行动作
    pub fn check(&self, target_id: &str) -> Result<(), LedgerError> {
        self.check_at(target_id, today())
    }

    pub fn check_at(&self, target_id: &str, today: NaiveDate) -> Result<(), LedgerError> {
        let state = self.state.clone().rolled_over(&SlotKeys::at(today));
        self.ensure_allowed(&state, target_id, 1)
    }

    pub fn can_act(&self, target_id: &str) -> bool {
        self.check(target_id).is_ok()
    }

    /// 记录一次动作：两个计数都加 `delta`，并把目标加入集合
    ///
    /// 写文件失败时内存状态保持不变，下一次加载的文件内容为准
    pub fn record_action(&mut self, target_id: &str, delta: u32) -> Result<(), LedgerError> {
        self.record_action_at(target_id, delta, today())
    }

    pub fn record_action_at(
        &mut self,
        target_id: &str,
        delta: u32,
        today: NaiveDate,
    ) -> Result<(), LedgerError> {
        let keys = SlotKeys::at(today);
        let _lock = LockFile::acquire(&self.path, self.options.lock_attempts, self.options.lock_delay)?;

        // 锁内重新读取，其它进程的写入也会被计入
        let mut next = read_state(&self.path)?
            .unwrap_or_else(|| QuotaState::fresh(&keys))
            .rolled_over(&keys)
            .pruned(self.options.retention_days, today);

        self.ensure_allowed(&next, target_id, delta)?;

        next.daily_count += delta;
        next.weekly_count += delta;
        next.last_run_date = Some(today);
        next.acted.push(ActedEntry {
            id: target_id.to_string(),
            acted_on: Some(today),
        });

        atomic_write(&self.path, next.render().as_bytes())
            .map_err(|e| PersistenceError::write(&self.path, e))?;

        info!(
            "📒 已记录目标 {}: 今日 {}/{}, 本周 {}/{}",
            target_id,
            next.daily_count,
            self.options.daily_limit,
            next.weekly_count,
            self.options.weekly_limit
        );
        self.state = next;
        Ok(())
    }

    fn ensure_allowed(&self, state: &QuotaState, target_id: &str, delta: u32) -> Result<(), LedgerError> {
        if state.contains(target_id) {
            return Err(LedgerError::DuplicateTarget {
                target_id: target_id.to_string(),
            });
        }
        self.ensure_capacity(state, delta)
    }

    fn ensure_capacity(&self, state: &QuotaState, delta: u32) -> Result<(), LedgerError> {
        let over_daily = state.daily_count.saturating_add(delta) > self.options.daily_limit;
        let over_weekly = state.weekly_count.saturating_add(delta) > self.options.weekly_limit;
        if over_daily || over_weekly {
            return Err(LedgerError::QuotaExceeded {
                daily: state.daily_count,
                daily_limit: self.options.daily_limit,
                weekly: state.weekly_count,
                weekly_limit: self.options.weekly_limit,
            });
        }
        Ok(())
    }
}

/// 读取账本文件；文件不存在时返回 None
fn read_state(path: &Path) -> Result<Option<QuotaState>, PersistenceError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(QuotaState::parse(&content))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(PersistenceError::read(path, e)),
    }
}

/// 在锁内创建缺失的账本；其它进程抢先创建时直接读取它的内容
fn create_missing(
    path: &Path,
    keys: &SlotKeys,
    options: &LedgerOptions,
) -> Result<QuotaState, PersistenceError> {
    let _lock = LockFile::acquire(path, options.lock_attempts, options.lock_delay)?;
    if let Some(existing) = read_state(path)? {
        debug!("账本已被其它进程创建: {}", path.display());
        return Ok(existing);
    }

    let fresh = QuotaState::fresh(keys);
    info!("📁 账本文件不存在，创建新账本: {}", path.display());
    atomic_write(path, fresh.render().as_bytes()).map_err(|e| PersistenceError::write(path, e))?;
    Ok(fresh)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn options(daily: u32, weekly: u32) -> LedgerOptions {
        LedgerOptions {
            daily_limit: daily,
            weekly_limit: weekly,
            retention_days: None,
            lock_attempts: 3,
            lock_delay: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_missing_file_is_created_with_zero_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");

        let ledger = QuotaLedger::load_at(&path, options(10, 70), day(2026, 10, 16));

        assert_eq!(ledger.daily_count(), 0);
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("last_run_date: 2026-10-16\n"));
        assert_eq!(content.lines().count(), 4);
        assert!(!dir.path().join("ledger.txt.lock").exists());
    }

    #[test]
    fn test_missing_file_is_not_created_while_locked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        let held = LockFile::acquire(&path, 1, Duration::ZERO).unwrap();

        let ledger = QuotaLedger::load_at(&path, options(10, 70), day(2026, 10, 16));
        assert_eq!(ledger.daily_count(), 0);
        assert!(!path.exists());

        drop(held);
        QuotaLedger::load_at(&path, options(10, 70), day(2026, 10, 16));
        assert!(path.exists());
    }

    #[test]
    fn test_reload_picks_up_other_writers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        let today = day(2026, 10, 16);

        let mut first = QuotaLedger::load_at(&path, options(2, 70), today);
        let mut second = QuotaLedger::load_at(&path, options(2, 70), today);
        second.record_action_at("a", 1, today).unwrap();
        second.record_action_at("b", 1, today).unwrap();

        assert!(first.check_capacity_at(today).is_ok());
        first.reload_at(today);
        assert_eq!(first.daily_count(), 2);
        assert!(first.contains("b"));
        assert!(first.check_capacity_at(today).is_err());
    }

    #[test]
    fn test_ids_with_commas_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        let today = day(2026, 10, 16);

        let mut ledger = QuotaLedger::load_at(&path, options(10, 70), today);
        ledger.record_action_at("smith,john", 1, today).unwrap();
        ledger.record_action_at("x@2026-01-01", 1, today).unwrap();

        let reloaded = QuotaLedger::load_at(&path, options(10, 70), today);
        assert!(reloaded.contains("smith,john"));
        assert!(reloaded.contains("x@2026-01-01"));
        assert!(!reloaded.contains("smith"));
        assert_eq!(reloaded.state().acted.len(), 2);
    }

    #[test]
    fn test_second_record_for_same_target_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let today = day(2026, 10, 16);
        let mut ledger = QuotaLedger::load_at(dir.path().join("ledger.txt"), options(10, 70), today);

        assert!(ledger.check_at("job-1", today).is_ok());
        ledger.record_action_at("job-1", 1, today).unwrap();

        let err = ledger.record_action_at("job-1", 1, today).unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateTarget { .. }));
        assert_eq!(ledger.daily_count(), 1);
    }

    #[test]
    fn test_full_daily_quota_blocks_any_target() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        std::fs::write(
            &path,
            "last_run_date: 2026-10-16\nweekly_count 2026-42: 10\nrequested_connections: x\ndaily_count 2026-10-16: 10\n",
        )
        .unwrap();

        let ledger = QuotaLedger::load_at(&path, options(10, 70), day(2026, 10, 16));

        assert!(matches!(
            ledger.check_at("x", day(2026, 10, 16)),
            Err(LedgerError::DuplicateTarget { .. })
        ));
        assert!(matches!(
            ledger.check_at("y", day(2026, 10, 16)),
            Err(LedgerError::QuotaExceeded { .. })
        ));
        assert!(ledger.check_capacity_at(day(2026, 10, 16)).is_err());
    }

    #[test]
    fn test_counts_never_exceed_limits() {
        let dir = tempfile::tempdir().unwrap();
        let today = day(2026, 10, 16);
        let mut ledger = QuotaLedger::load_at(dir.path().join("ledger.txt"), options(3, 70), today);

        for i in 0..10 {
            let id = format!("job-{}", i);
            if ledger.check_at(&id, today).is_ok() {
                ledger.record_action_at(&id, 1, today).unwrap();
            }
        }
        assert_eq!(ledger.daily_count(), 3);

        // 绕过检查直接记录也会被拒绝
        let err = ledger.record_action_at("job-extra", 1, today).unwrap_err();
        assert!(matches!(err, LedgerError::QuotaExceeded { .. }));
        assert_eq!(ledger.daily_count(), 3);
    }

    #[test]
    fn test_delta_larger_than_remaining_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let today = day(2026, 10, 16);
        let mut ledger = QuotaLedger::load_at(dir.path().join("ledger.txt"), options(10, 70), today);

        ledger.record_action_at("batch-1", 8, today).unwrap();
        assert!(ledger.record_action_at("batch-2", 3, today).is_err());
        ledger.record_action_at("batch-3", 2, today).unwrap();
        assert_eq!(ledger.daily_count(), 10);
    }

    #[test]
    fn test_reload_reproduces_counts_and_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        let today = day(2026, 10, 16);

        let mut ledger = QuotaLedger::load_at(&path, options(10, 70), today);
        ledger.record_action_at("a", 1, today).unwrap();
        ledger.record_action_at("b", 1, today).unwrap();

        let reloaded = QuotaLedger::load_at(&path, options(10, 70), today);
        assert_eq!(reloaded.state(), ledger.state());
    }

    #[test]
    fn test_day_rollover_keeps_weekly_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        let thursday = day(2026, 10, 15);
        let friday = day(2026, 10, 16);

        let mut ledger = QuotaLedger::load_at(&path, options(1, 70), thursday);
        ledger.record_action_at("a", 1, thursday).unwrap();
        assert!(ledger.check_at("b", thursday).is_err());

        let mut next_day = QuotaLedger::load_at(&path, options(1, 70), friday);
        assert_eq!(next_day.daily_count(), 0);
        assert_eq!(next_day.weekly_count(), 1);
        next_day.record_action_at("b", 1, friday).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("daily_count 2026-10-16: 1"));
        assert!(content.contains("weekly_count 2026-42: 2"));
    }

    #[test]
    fn test_concurrent_writer_is_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        let today = day(2026, 10, 16);

        let mut first = QuotaLedger::load_at(&path, options(10, 70), today);
        let mut second = QuotaLedger::load_at(&path, options(10, 70), today);

        first.record_action_at("a", 1, today).unwrap();
        second.record_action_at("b", 1, today).unwrap();

        let reloaded = QuotaLedger::load_at(&path, options(10, 70), today);
        assert_eq!(reloaded.daily_count(), 2);
        assert!(reloaded.contains("a") && reloaded.contains("b"));
    }

    #[test]
    fn test_failed_write_does_not_commit() {
        let dir = tempfile::tempdir().unwrap();
        let today = day(2026, 10, 16);
        // 路径指向一个目录，写入必然失败
        let blocked = dir.path().join("as_dir");
        std::fs::create_dir_all(&blocked).unwrap();

        let mut ledger = QuotaLedger::load_at(&blocked, options(10, 70), today);
        assert!(ledger.record_action_at("a", 1, today).is_err());
        assert_eq!(ledger.daily_count(), 0);
        assert!(!ledger.contains("a"));
    }
}
