//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责搜索调度和目标循环，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `app` - 应用入口
//! - 管理应用生命周期（初始化、运行、统计）
//! - 生成 关键词 × 地点 搜索组合
//! - 持有浏览器资源（Browser、ChromiumFormPage）
//!
//! ### `target_processor` - 单次搜索的目标处理器
//! - 按页遍历发现的目标（Vec<Target>）
//! - 去重、配额、黑名单 / 目标公司判断
//! - 委托 Outreach（FormFlow 或 ConnectFlow）处理单个目标
//! - 写账本与结果日志
//!
//! ## 层次关系
//!
//! ```text
//! app (处理 Vec<SearchSpec>)
//!     ↓
//! target_processor (处理 Vec<Target>)
//!     ↓
//! workflow::Outreach (处理单个 Target：申请表单或好友邀请)
//!     ↓
//! services (能力层：ledger / cache / resolver / oracle / discovery)
//!     ↓
//! infrastructure (基础设施：JsExecutor / ChromiumFormPage)
//! ```

pub mod app;
pub mod target_processor;

pub use app::{search_specs, App};
pub use target_processor::{Blacklist, Orchestrator, SearchReport, SearchStats, StopReason};
