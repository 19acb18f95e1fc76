//! 结果日志服务 - 业务能力层
//!
//! 只负责"追加一条尝试结果"以及"读取最近处理过的目标"，不关心流程
//!
//! 每行：`timestamp,targetId,title,company,attempted,result`，没有表头，
//! 布尔值写作 `True` / `False`。

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::models::record::TIMESTAMP_FORMAT;
use crate::models::ApplicationRecord;

/// 结果日志
///
/// 职责：
/// - 每次尝试写入一行
/// - 启动时提供去重窗口内的目标 ID
pub struct OutcomeLog {
    path: PathBuf,
}

impl OutcomeLog {
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条记录
    pub fn append(&self, record: &ApplicationRecord) -> Result<(), PersistenceError> {
        debug!(
            "写入结果: {} | {} | attempted={} result={}",
            record.target_id, record.title, record.attempted, record.result
        );

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PersistenceError::write(parent, e))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PersistenceError::write(&self.path, e))?;

        let timestamp = record.timestamp.format(TIMESTAMP_FORMAT).to_string();
        let mut writer = csv::Writer::from_writer(file);
        writer
            .write_record([
                timestamp.as_str(),
                record.target_id.as_str(),
                record.title.as_str(),
                record.company.as_str(),
                bool_text(record.attempted),
                bool_text(record.result),
            ])
            .map_err(|e| PersistenceError::csv(&self.path, e))?;
        writer
            .flush()
            .map_err(|e| PersistenceError::write(&self.path, e))
    }

    /// 读取全部可解析的记录；文件不存在时为空
    pub fn load(&self) -> Vec<ApplicationRecord> {
        if !self.path.exists() {
            return Vec::new();
        }

        let mut reader = match csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)
        {
            Ok(reader) => reader,
            Err(e) => {
                warn!("⚠️ 无法读取结果日志 {}: {}", self.path.display(), e);
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        let mut skipped = 0usize;
        for row in reader.records() {
            match row.ok().and_then(|r| parse_record(&r)) {
                Some(record) => records.push(record),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!("结果日志中有 {} 行无法解析，已跳过", skipped);
        }
        records
    }

    /// 在 `now - lookback` 之后出现过的目标 ID
    pub fn load_recent_ids(&self, lookback: Duration, now: NaiveDateTime) -> HashSet<String> {
        let cutoff = now - lookback;
        let ids: HashSet<String> = self
            .load()
            .into_iter()
            .filter(|record| record.timestamp > cutoff)
            .map(|record| record.target_id)
            .collect();

        info!("🗂️ 最近 {} 天内处理过 {} 个目标", lookback.num_days(), ids.len());
        ids
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "True" | "true" => Some(true),
        "False" | "false" => Some(false),
        _ => None,
    }
}

fn parse_record(row: &csv::StringRecord) -> Option<ApplicationRecord> {
    if row.len() < 6 {
        return None;
    }
    let raw_timestamp = row.get(0)?.trim();
    let timestamp = NaiveDateTime::parse_from_str(raw_timestamp, TIMESTAMP_FORMAT)
        // 旧日志可能带有微秒
        .or_else(|_| NaiveDateTime::parse_from_str(raw_timestamp, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;

    Some(ApplicationRecord {
        timestamp,
        target_id: row.get(1)?.trim().to_string(),
        title: row.get(2)?.to_string(),
        company: row.get(3)?.to_string(),
        attempted: parse_bool(row.get(4)?)?,
        result: parse_bool(row.get(5)?)?,
    })
}
