//! 目标发现服务 - 业务能力层
//!
//! 只负责"按游标取下一页目标"，不关心目标如何处理
//!
//! - 传输错误：固定间隔重试，用完后返回空页（调用方据此结束循环）
//! - 认证错误：立即返回 `AppError::Auth`
//! - 空页：记录警告，不算错误

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, TransportError};
use crate::models::{RawTarget, Target};

/// 列表卡片上表示已经处理过的标记
const LISTING_DONE_MARKER: &str = "Applied";

/// 发现源错误
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{0}")]
    Auth(String),
}

/// 一次分页查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryQuery {
    pub keywords: String,
    pub location: Option<String>,
    pub offset: usize,
    pub page_size: usize,
    /// 额外的查询参数（如经验等级）
    pub filters: Vec<(String, String)>,
}

/// 发现源返回的一页
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPage {
    pub items: Vec<RawTarget>,
    /// 源给出的总数；None 表示未知
    pub total_count: Option<usize>,
}

/// 目标发现源（站点 API / 搜索页）
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn fetch(&self, query: &DiscoveryQuery) -> Result<RawPage, DiscoveryError>;
}

/// 过滤后的一页
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveredPage {
    pub targets: Vec<Target>,
    /// 源返回的条目数（过滤前）
    pub raw_count: usize,
    pub next_cursor: usize,
    pub total_count: usize,
}

impl DiscoveredPage {
    /// 是否已经没有下一页
    pub fn is_last(&self) -> bool {
        self.raw_count == 0 || self.next_cursor >= self.total_count
    }
}

/// 一次搜索的条件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSpec {
    pub keywords: String,
    pub location: Option<String>,
    pub filters: Vec<(String, String)>,
}

impl SearchSpec {
    pub fn new(keywords: impl Into<String>, location: Option<String>) -> Self {
        Self {
            keywords: keywords.into(),
            location,
            filters: Vec::new(),
        }
    }

    /// 经验等级过滤（逗号连接）
    pub fn with_experience_levels(mut self, levels: &[u8]) -> Self {
        if !levels.is_empty() {
            let joined = levels
                .iter()
                .map(|l| l.to_string())
                .collect::<Vec<_>>()
                .join(",");
            self.filters.push(("experience".to_string(), joined));
        }
        self
    }
}

/// 分页器设置
#[derive(Debug, Clone)]
pub struct PagerSettings {
    pub page_size: usize,
    pub fetch_retries: u32,
    pub retry_delay: Duration,
}

impl PagerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_size: config.discovery_page_size.max(1),
            fetch_retries: config.discovery_fetch_retries,
            retry_delay: Duration::from_secs(config.discovery_retry_delay_secs),
        }
    }
}

/// 目标发现分页器
///
/// 职责：
/// - 组装查询并调用发现源
/// - 重试传输错误
/// - 去掉无效 / 已处理标记的条目
pub struct DiscoveryPager {
    source: Arc<dyn DiscoverySource>,
    search: SearchSpec,
    settings: PagerSettings,
}

impl DiscoveryPager {
    pub fn new(source: Arc<dyn DiscoverySource>, search: SearchSpec, settings: PagerSettings) -> Self {
        Self {
            source,
            search,
            settings,
        }
    }

    pub fn search(&self) -> &SearchSpec {
        &self.search
    }

    /// 从 `cursor` 开始取一页
    pub async fn next_page(&self, cursor: usize) -> Result<DiscoveredPage, AppError> {
        let query = DiscoveryQuery {
            keywords: self.search.keywords.clone(),
            location: self.search.location.clone(),
            offset: cursor,
            page_size: self.settings.page_size,
            filters: self.search.filters.clone(),
        };

        let Some(raw) = self.fetch_with_retries(&query).await? else {
            return Ok(DiscoveredPage {
                targets: Vec::new(),
                raw_count: 0,
                next_cursor: cursor,
                total_count: 0,
            });
        };

        if raw.items.is_empty() {
            warn!("⚠️ 第 {} 条开始的页面为空 (总数 {:?})", cursor, raw.total_count);
        }

        let raw_count = raw.items.len();
        let next_cursor = cursor + raw_count;
        // 总数未知时：满页说明可能还有下一页，不满一页即为最后一页
        let total_count = raw.total_count.unwrap_or(if raw_count >= self.settings.page_size {
            next_cursor + 1
        } else {
            next_cursor
        });
        let targets: Vec<Target> = raw
            .items
            .into_iter()
            .filter_map(|item| accept(item, cursor))
            .collect();

        info!(
            "📄 获取到 {} 个目标 (原始 {} 条, 游标 {}, 总数 {})",
            targets.len(),
            raw_count,
            cursor,
            total_count
        );

        Ok(DiscoveredPage {
            targets,
            raw_count,
            next_cursor,
            total_count,
        })
    }

    /// 返回 None 表示重试用完
    async fn fetch_with_retries(&self, query: &DiscoveryQuery) -> Result<Option<RawPage>, AppError> {
        let attempts = self.settings.fetch_retries.max(1);
        for attempt in 1..=attempts {
            match self.source.fetch(query).await {
                Ok(page) => return Ok(Some(page)),
                Err(DiscoveryError::Auth(message)) => {
                    return Err(AppError::Auth(message));
                }
                Err(DiscoveryError::Transport(e)) => {
                    warn!(
                        "获取目标列表失败 (尝试 {}/{}): {}, 等待 {} 秒后重试...",
                        attempt,
                        attempts,
                        e,
                        self.settings.retry_delay.as_secs()
                    );
                    if attempt < attempts {
                        sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }

        warn!("获取目标列表失败，已重试 {} 次，结束本次搜索", attempts);
        Ok(None)
    }
}

/// 过滤单个条目
fn accept(item: RawTarget, cursor: usize) -> Option<Target> {
    let id = match item.id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() && id != "search" => id.to_string(),
        _ => {
            debug!("跳过没有有效 ID 的条目: {:?}", item.title);
            return None;
        }
    };

    if item.listing_text.contains(LISTING_DONE_MARKER) {
        debug!("跳过已标记为处理过的条目: {}", id);
        return None;
    }

    Some(Target {
        id,
        title: item.title.trim().to_string(),
        company: item.company.trim().to_string(),
        cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// 按顺序返回预设结果的发现源
    struct ScriptedSource {
        responses: Mutex<Vec<Result<RawPage, DiscoveryError>>>,
        queries: Mutex<Vec<DiscoveryQuery>>,
    }

    impl ScriptedSource {
        fn new(mut responses: Vec<Result<RawPage, DiscoveryError>>) -> Arc<Self> {
            responses.reverse();
            Arc::new(Self {
                responses: Mutex::new(responses),
                queries: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DiscoverySource for ScriptedSource {
        async fn fetch(&self, query: &DiscoveryQuery) -> Result<RawPage, DiscoveryError> {
            self.queries.lock().unwrap().push(query.clone());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(RawPage::default()))
        }
    }

    fn item(id: Option<&str>, listing: &str) -> RawTarget {
        RawTarget {
            id: id.map(str::to_string),
            title: "Rust Engineer".to_string(),
            company: "Acme".to_string(),
            listing_text: listing.to_string(),
        }
    }

    fn settings() -> PagerSettings {
        PagerSettings {
            page_size: 25,
            fetch_retries: 3,
            retry_delay: Duration::ZERO,
        }
    }

    fn transport_error() -> DiscoveryError {
        DiscoveryError::Transport(TransportError::BadStatus {
            endpoint: "/jobs".to_string(),
            status: 503,
        })
    }

    #[tokio::test]
    async fn test_filters_invalid_and_marked_items() {
        let source = ScriptedSource::new(vec![Ok(RawPage {
            items: vec![
                item(Some("1"), "Promoted"),
                item(None, ""),
                item(Some("search"), ""),
                item(Some("2"), "Applied 3 days ago"),
                item(Some(" 3 "), ""),
            ],
            total_count: Some(30),
        })]);
        let pager = DiscoveryPager::new(source, SearchSpec::new("rust", None), settings());

        let page = pager.next_page(25).await.unwrap();
        let ids: Vec<&str> = page.targets.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(page.next_cursor, 30);
        assert!(page.is_last());
        assert!(page.targets.iter().all(|t| t.cursor == 25));
    }

    #[tokio::test]
    async fn test_transport_errors_retry_then_end_search() {
        let source = ScriptedSource::new(vec![
            Err(transport_error()),
            Err(transport_error()),
            Err(transport_error()),
        ]);
        let pager = DiscoveryPager::new(source.clone(), SearchSpec::new("rust", None), settings());

        let page = pager.next_page(0).await.unwrap();
        assert!(page.targets.is_empty());
        assert!(page.is_last());
        assert_eq!(source.queries.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_then_success() {
        let source = ScriptedSource::new(vec![
            Err(transport_error()),
            Ok(RawPage {
                items: vec![item(Some("9"), "")],
                total_count: Some(1),
            }),
        ]);
        let pager = DiscoveryPager::new(source, SearchSpec::new("rust", None), settings());

        let page = pager.next_page(0).await.unwrap();
        assert_eq!(page.targets.len(), 1);
    }

    #[tokio::test]
    async fn test_auth_error_is_fatal() {
        let source = ScriptedSource::new(vec![Err(DiscoveryError::Auth("HTTP 401".to_string()))]);
        let pager = DiscoveryPager::new(source, SearchSpec::new("rust", None), settings());

        let err = pager.next_page(0).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unknown_total_keeps_paging_while_pages_are_full() {
        let full: Vec<RawTarget> = (0..3).map(|i| item(Some(&format!("f{}", i)), "")).collect();
        let source = ScriptedSource::new(vec![
            Ok(RawPage {
                items: full,
                total_count: None,
            }),
            Ok(RawPage {
                items: vec![item(Some("s0"), "")],
                total_count: None,
            }),
        ]);
        let settings = PagerSettings {
            page_size: 3,
            ..settings()
        };
        let pager = DiscoveryPager::new(source, SearchSpec::new("rust", None), settings);

        let first = pager.next_page(0).await.unwrap();
        assert_eq!(first.next_cursor, 3);
        assert!(!first.is_last());

        let second = pager.next_page(first.next_cursor).await.unwrap();
        assert_eq!(second.next_cursor, 4);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_query_carries_search_and_filters() {
        let source = ScriptedSource::new(vec![]);
        let search = SearchSpec::new("rust", Some("Berlin".to_string())).with_experience_levels(&[2, 3]);
        let pager = DiscoveryPager::new(source.clone(), search, settings());

        let page = pager.next_page(50).await.unwrap();
        assert!(page.is_last());

        let queries = source.queries.lock().unwrap();
        assert_eq!(queries[0].offset, 50);
        assert_eq!(queries[0].location.as_deref(), Some("Berlin"));
        assert_eq!(
            queries[0].filters,
            vec![("experience".to_string(), "2,3".to_string())]
        );
    }
}
