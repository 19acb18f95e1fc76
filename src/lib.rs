//! # Outreach Bot
//!
//! 一个带配额控制的自动投递 / 联系机器人
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 唯一的 page owner，提供 eval() / goto() 能力
//! - `ChromiumFormPage` - 基于选择器的表单驱动
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个目标 / 字段
//! - `QuotaLedger` - 每日 / 每周配额与已处理集合
//! - `AnswerCache` / `AnswerResolver` / `LlmOracle` - 问题回答能力
//! - `DiscoveryPager` - 分页发现目标
//! - `OutcomeLog` - 写结果日志能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个目标"的完整表单流程
//! - `AttemptCtx` - 上下文封装（序号 + 目标 ID）
//! - `transition` - 纯状态转移函数
//! - `FormFlow` - 执行转移产生的动作
//! - `ConnectFlow` - 个人主页的好友邀请（Connect / More → Connect + 留言）
//! - `Outreach` - 按运行模式选择上面两个流程之一
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 管理资源，遍历搜索组合
//! - `orchestrator/target_processor` - 单次搜索的目标循环
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::connect_to_browser_and_page;
pub use config::{Config, OutreachMode};
pub use error::{AppError, AppResult};
pub use infrastructure::{ChromiumFormPage, JsExecutor};
pub use models::{ApplicationRecord, Target};
pub use orchestrator::{App, Orchestrator, SearchReport, SearchStats, StopReason};
pub use workflow::{AttemptCtx, ConnectFlow, FormFlow, FormPage, FormState, Outreach};
