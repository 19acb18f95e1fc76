//! 错误类型
//!
//! 按照失败的影响范围分层：
//! - `Transport`：网络 / 站点失败，重试后降级为空结果，不影响整体运行
//! - `Auth`：登录失败，立即终止运行
//! - `Ledger`：配额耗尽或重复目标，配额耗尽时干净地停止运行
//! - `Persistence`：账本 / 缓存文件读写失败，只让当前操作失败

use std::path::PathBuf;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 网络或站点错误
    #[error("传输错误: {0}")]
    Transport(#[from] TransportError),
    /// 登录 / 认证失败（致命）
    #[error("认证失败: {0}")]
    Auth(String),
    /// 配额账本错误
    #[error("配额错误: {0}")]
    Ledger(#[from] LedgerError),
    /// 文件持久化错误
    #[error("持久化错误: {0}")]
    Persistence(#[from] PersistenceError),
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 网络 / 站点错误
#[derive(Debug, Error)]
pub enum TransportError {
    /// 请求发送失败
    #[error("请求失败 ({endpoint}): {message}")]
    RequestFailed { endpoint: String, message: String },
    /// 非成功状态码
    #[error("响应状态异常 ({endpoint}): HTTP {status}")]
    BadStatus { endpoint: String, status: u16 },
    /// 响应体无法解析
    #[error("响应解析失败 ({endpoint}): {message}")]
    BadBody { endpoint: String, message: String },
}

/// 配额账本错误
#[derive(Debug, Error)]
pub enum LedgerError {
    /// 今日或本周配额已用完
    #[error("配额已用完: 今日 {daily}/{daily_limit}, 本周 {weekly}/{weekly_limit}")]
    QuotaExceeded {
        daily: u32,
        daily_limit: u32,
        weekly: u32,
        weekly_limit: u32,
    },
    /// 目标已经处理过
    #[error("目标已处理过: {target_id}")]
    DuplicateTarget { target_id: String },
    /// 账本文件读写失败
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// 文件持久化错误
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// 读取文件失败
    #[error("读取文件失败 ({}): {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({}): {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 无法获得文件锁
    #[error("无法获得文件锁 ({}), 已尝试 {attempts} 次", path.display())]
    Lock { path: PathBuf, attempts: u32 },
    /// CSV 读写失败
    #[error("CSV 读写失败 ({}): {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {message}")]
    ConnectionFailed { port: u16, message: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置文件无法读取
    #[error("无法读取配置文件 ({}): {source}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// 配置文件无法解析
    #[error("无法解析配置文件 ({}): {source}", path.display())]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    /// 缺少必需的配置项
    #[error("缺少必需的配置项: {0}")]
    Missing(String),
    /// 配置项取值无效
    #[error("配置项取值无效: {0}")]
    Invalid(String),
}

impl AppError {
    /// 是否应当终止整个运行
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Auth(_) | AppError::Config(_))
    }
}

impl PersistenceError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Write {
            path: path.into(),
            source,
        }
    }

    pub fn csv(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PersistenceError::Csv {
            path: path.into(),
            source,
        }
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
