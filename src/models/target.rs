use serde::{Deserialize, Serialize};

/// 目标：一个职位或一个人的主页
///
/// 由发现分页器创建，编排层只消费一次，不会被修改
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub title: String,
    pub company: String,
    /// 所在页的游标（偏移量）
    pub cursor: usize,
}

/// 发现源返回的原始条目
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTarget {
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    /// 列表卡片上的原始文本（用于识别 "Applied" 标记）
    #[serde(default)]
    pub listing_text: String,
}

impl Target {
    /// 用于日志的简短描述
    pub fn display_name(&self) -> String {
        match (self.title.is_empty(), self.company.is_empty()) {
            (false, false) => format!("{} @ {}", self.title, self.company),
            (false, true) => self.title.clone(),
            (true, false) => self.company.clone(),
            (true, true) => self.id.clone(),
        }
    }
}
