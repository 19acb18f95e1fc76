//! 配额账本的持久化记录
//!
//! 文件格式（逐行 `key: value`）：
//!
//! ```text
//! last_run_date: 2026-10-16
//! weekly_count 2026-42: 3
//! requested_connections: alice,bob@2026-10-15
//! daily_count 2026-10-16: 1
//! ```
//!
//! 解析是宽松的：缺失或损坏的字段按 0 / 空处理。
//! 目标 id 中的 `%` `,` `@` 和换行以 `%XX` 形式转义，保证逗号分隔和 `@日期` 后缀不会被 id 打乱。

use chrono::{Datelike, NaiveDate};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// 需要转义的字符
const ESCAPED: [(char, &str); 5] = [
    ('%', "%25"),
    (',', "%2C"),
    ('@', "%40"),
    ('\n', "%0A"),
    ('\r', "%0D"),
];

fn encode_id(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for c in id.chars() {
        match ESCAPED.iter().find(|(raw, _)| *raw == c) {
            Some((_, escaped)) => out.push_str(escaped),
            None => out.push(c),
        }
    }
    out
}

/// 无法识别的 `%` 序列原样保留，兼容未转义的旧记录
fn decode_id(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ESCAPED
            .iter()
            .find(|(_, escaped)| tail.get(..3).is_some_and(|head| head.eq_ignore_ascii_case(escaped)))
        {
            Some((c, _)) => {
                out.push(*c);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// 当前日期对应的计数槽位
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotKeys {
    pub today: NaiveDate,
    pub day_key: String,
    pub week_key: String,
}

impl SlotKeys {
    pub fn at(today: NaiveDate) -> Self {
        let iso = today.iso_week();
        Self {
            today,
            day_key: today.format(DATE_FORMAT).to_string(),
            week_key: format!("{}-{:02}", iso.year(), iso.week()),
        }
    }
}

/// 已处理的目标；旧格式的条目没有日期，视为永久
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActedEntry {
    pub id: String,
    pub acted_on: Option<NaiveDate>,
}

impl ActedEntry {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if let Some((id, date)) = raw.rsplit_once('@') {
            if let Ok(date) = NaiveDate::parse_from_str(date, DATE_FORMAT) {
                return Some(Self {
                    id: decode_id(id),
                    acted_on: Some(date),
                });
            }
        }
        Some(Self {
            id: decode_id(raw),
            acted_on: None,
        })
    }

    fn render(&self) -> String {
        match self.acted_on {
            Some(date) => format!("{}@{}", encode_id(&self.id), date.format(DATE_FORMAT)),
            None => encode_id(&self.id),
        }
    }
}

/// 配额账本记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaState {
    pub last_run_date: Option<NaiveDate>,
    pub day_key: String,
    pub daily_count: u32,
    pub week_key: String,
    pub weekly_count: u32,
    pub acted: Vec<ActedEntry>,
}

impl QuotaState {
    /// 今天 / 本周的空记录
    pub fn fresh(keys: &SlotKeys) -> Self {
        Self {
            last_run_date: Some(keys.today),
            day_key: keys.day_key.clone(),
            daily_count: 0,
            week_key: keys.week_key.clone(),
            weekly_count: 0,
            acted: Vec::new(),
        }
    }

    /// 宽松解析
    pub fn parse(content: &str) -> Self {
        let mut state = Self {
            last_run_date: None,
            day_key: String::new(),
            daily_count: 0,
            week_key: String::new(),
            weekly_count: 0,
            acted: Vec::new(),
        };

        for line in content.lines() {
            let line = line.trim();
            if let Some(rest) = line.strip_prefix("last_run_date:") {
                state.last_run_date = NaiveDate::parse_from_str(rest.trim(), DATE_FORMAT).ok();
            } else if let Some(rest) = line.strip_prefix("weekly_count") {
                let (key, count) = parse_keyed_count(rest);
                state.week_key = key;
                state.weekly_count = count;
            } else if let Some(rest) = line.strip_prefix("daily_count") {
                let (key, count) = parse_keyed_count(rest);
                state.day_key = key;
                state.daily_count = count;
            } else if let Some(rest) = line.strip_prefix("requested_connections:") {
                state.acted = rest.split(',').filter_map(ActedEntry::parse).collect();
            }
        }

        state
    }

    /// 完整的四行文本
    pub fn render(&self) -> String {
        let last_run = self
            .last_run_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();
        let acted: Vec<String> = self.acted.iter().map(ActedEntry::render).collect();
        format!(
            "last_run_date: {}\nweekly_count {}: {}\nrequested_connections: {}\ndaily_count {}: {}\n",
            last_run,
            self.week_key,
            self.weekly_count,
            acted.join(","),
            self.day_key,
            self.daily_count
        )
    }

    pub fn contains(&self, target_id: &str) -> bool {
        self.acted.iter().any(|entry| entry.id == target_id)
    }

    /// 槽位切换：日期 / 周不匹配时计数归零，并改写为当前槽位
    pub fn rolled_over(mut self, keys: &SlotKeys) -> Self {
        if self.day_key != keys.day_key {
            self.day_key = keys.day_key.clone();
            self.daily_count = 0;
        }
        if self.week_key != keys.week_key {
            self.week_key = keys.week_key.clone();
            self.weekly_count = 0;
        }
        self
    }

    /// 丢弃超过保留天数的条目（没有日期的条目保留）
    pub fn pruned(mut self, retention_days: Option<u32>, today: NaiveDate) -> Self {
        if let Some(days) = retention_days {
            let cutoff = today - chrono::Duration::days(i64::from(days));
            self.acted
                .retain(|entry| entry.acted_on.map_or(true, |date| date > cutoff));
        }
        self
    }
}

/// 解析 `<key>: <count>`，计数损坏时按 0 处理
fn parse_keyed_count(rest: &str) -> (String, u32) {
    match rest.split_once(':') {
        Some((key, count)) => (
            key.trim().to_string(),
            count.trim().parse().unwrap_or(0),
        ),
        None => (String::new(), 0),
    }
}
