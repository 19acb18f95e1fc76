use chrono::NaiveDateTime;

/// 结果日志中的时间格式
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 一次尝试的结果记录（只追加，不修改）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRecord {
    pub timestamp: NaiveDateTime,
    pub target_id: String,
    pub title: String,
    pub company: String,
    /// 是否真正进入了表单
    pub attempted: bool,
    /// 是否提交成功
    pub result: bool,
}
