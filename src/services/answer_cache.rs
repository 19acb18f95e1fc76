//! 问答缓存服务 - 业务能力层
//!
//! 只负责"问题 → 答案"的查找与追加，不关心答案从哪里来
//!
//! 文件是两列 CSV（`Question,Answer`），新问题追加一行。
//! 同一个问题以第一次写入的答案为准，之后不会再覆盖。

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::PersistenceError;

const HEADER: [&str; 2] = ["Question", "Answer"];

/// 问答缓存
pub struct AnswerCache {
    path: PathBuf,
    entries: HashMap<String, String>,
}

impl AnswerCache {
    /// 打开缓存文件；文件不存在时为空缓存
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let entries = if path.exists() {
            load_entries(&path)?
        } else {
            debug!("问答缓存文件不存在，使用空缓存: {}", path.display());
            HashMap::new()
        };

        info!("📚 已加载 {} 条问答缓存", entries.len());
        Ok(Self { path, entries })
    }

    /// 打开失败时降级为空缓存（新答案仍会写入该路径）
    pub fn open_or_empty(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::open(&path) {
            Ok(cache) => cache,
            Err(e) => {
                warn!("⚠️ 读取问答缓存失败，使用空缓存: {}", e);
                Self {
                    path,
                    entries: HashMap::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 精确匹配问题文本
    pub fn get(&self, question: &str) -> Option<&str> {
        self.entries.get(question).map(String::as_str)
    }

    /// 追加一条问答
    ///
    /// 返回 `false` 表示问题已存在（不覆盖）。写文件失败时内存中也不会记录。
    pub fn put(&mut self, question: &str, answer: &str) -> Result<bool, PersistenceError> {
        if self.entries.contains_key(question) {
            debug!("问题已在缓存中，保留原答案: {}", question);
            return Ok(false);
        }

        self.append_row(question, answer)?;
        self.entries.insert(question.to_string(), answer.to_string());
        Ok(true)
    }

    fn append_row(&self, question: &str, answer: &str) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PersistenceError::write(parent, e))?;
            }
        }

        let is_new = !self.path.exists()
            || std::fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| PersistenceError::write(&self.path, e))?;

        let mut writer = csv::Writer::from_writer(file);
        if is_new {
            writer
                .write_record(HEADER)
                .map_err(|e| PersistenceError::csv(&self.path, e))?;
        }
        writer
            .write_record([question, answer])
            .map_err(|e| PersistenceError::csv(&self.path, e))?;
        writer
            .flush()
            .map_err(|e| PersistenceError::write(&self.path, e))
    }
}

/// 读取全部条目；重复的问题保留第一条
fn load_entries(path: &Path) -> Result<HashMap<String, String>, PersistenceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| PersistenceError::csv(path, e))?;

    let mut entries = HashMap::new();
    for (line, record) in reader.records().enumerate() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                warn!("⚠️ 跳过损坏的缓存行 {}: {}", line + 1, e);
                continue;
            }
        };

        let (Some(question), Some(answer)) = (record.get(0), record.get(1)) else {
            continue;
        };
        if line == 0 && question == HEADER[0] && answer == HEADER[1] {
            continue;
        }
        entries
            .entry(question.to_string())
            .or_insert_with(|| answer.to_string());
    }

    Ok(entries)
}
