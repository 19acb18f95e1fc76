use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 对每个目标执行的动作
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutreachMode {
    /// 职位：完成多步申请表单
    #[default]
    Apply,
    /// 个人主页：发送带留言的好友邀请
    Connect,
}

impl std::str::FromStr for OutreachMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "apply" => Ok(Self::Apply),
            "connect" => Ok(Self::Connect),
            other => Err(ConfigError::Invalid(format!("OUTREACH_MODE={}", other))),
        }
    }
}

/// 程序配置
///
/// 加载顺序：默认值 → TOML 配置文件（可选）→ 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 申请职位或发送好友邀请
    pub mode: OutreachMode,

    // --- 浏览器 ---
    /// 浏览器调试端口（0 表示启动无头浏览器）
    pub browser_debug_port: u16,
    /// 无头模式下使用的浏览器可执行文件
    pub chrome_executable: Option<PathBuf>,
    /// 启动时打开的页面（通常是已登录的站点首页）
    pub start_url: String,
    /// 目标详情页 URL 模板，`{id}` 会被替换为目标 ID
    pub target_url_template: String,
    /// 每次点击后等待页面稳定的时间（毫秒）
    pub settle_delay_ms: u64,

    // --- 配额账本 ---
    pub ledger_path: PathBuf,
    pub daily_limit: u32,
    pub weekly_limit: u32,
    /// 已处理目标的保留天数，为空表示永久保留
    pub acted_retention_days: Option<u32>,
    pub ledger_lock_attempts: u32,
    pub ledger_lock_delay_ms: u64,

    // --- 问答缓存 / 结果日志 ---
    pub qa_cache_path: PathBuf,
    pub outcome_log_path: PathBuf,
    /// 结果日志的去重回看窗口（天）
    pub dedup_lookback_days: u32,

    // --- 表单状态机 ---
    /// 连续没有进展的轮数上限
    pub max_form_iterations: u32,
    /// 单次尝试的总轮数上限
    pub max_form_steps: u32,
    pub validation_polls: u32,
    pub validation_poll_delay_secs: u64,
    pub resume_path: Option<PathBuf>,
    pub cover_letter_path: Option<PathBuf>,

    // --- 固定答案 ---
    pub account_email: String,
    pub phone_number: String,
    pub country_code: String,

    // --- 个人资料（随每次 LLM 提问附带） ---
    pub gender: String,
    pub notice_period: String,
    pub current_ctc: String,
    pub expected_ctc: String,
    pub resume_text_path: Option<PathBuf>,

    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    pub oracle_max_attempts: u32,
    pub oracle_retry_delay_secs: u64,
    pub oracle_throttle_secs: u64,

    // --- 目标发现 ---
    pub discovery_url: String,
    pub discovery_auth_header: Option<String>,
    pub discovery_page_size: usize,
    pub discovery_fetch_retries: u32,
    pub discovery_retry_delay_secs: u64,
    pub discovery_items_pointer: String,
    pub discovery_total_pointer: String,
    pub discovery_id_field: String,
    pub discovery_title_field: String,
    pub discovery_company_field: String,
    pub discovery_listing_field: String,
    pub keywords: Vec<String>,
    pub locations: Vec<String>,
    pub experience_levels: Vec<u8>,

    // --- 运行边界 ---
    pub max_search_time_secs: u64,
    pub max_actions_per_run: usize,
    pub blacklist_companies: Vec<String>,
    pub blacklist_title_words: Vec<String>,
    /// 非空时只处理这些公司的目标（公司名包含即可，忽略大小写）
    pub target_companies: Vec<String>,

    // --- 好友邀请 ---
    /// 邀请留言的字符上限
    pub note_max_chars: usize,
    /// 留言中使用的本人名字
    pub sender_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            verbose_logging: false,
            mode: OutreachMode::Apply,
            browser_debug_port: 9222,
            chrome_executable: None,
            start_url: "https://www.linkedin.com/feed/".to_string(),
            target_url_template: "https://www.linkedin.com/jobs/view/{id}".to_string(),
            settle_delay_ms: 1000,
            ledger_path: PathBuf::from("data/quota_ledger.txt"),
            daily_limit: 10,
            weekly_limit: 70,
            acted_retention_days: None,
            ledger_lock_attempts: 20,
            ledger_lock_delay_ms: 250,
            qa_cache_path: PathBuf::from("data/qa.csv"),
            outcome_log_path: PathBuf::from("output.csv"),
            dedup_lookback_days: 2,
            max_form_iterations: 3,
            max_form_steps: 15,
            validation_polls: 5,
            validation_poll_delay_secs: 5,
            resume_path: None,
            cover_letter_path: None,
            account_email: String::new(),
            phone_number: String::new(),
            country_code: String::new(),
            gender: String::new(),
            notice_period: String::new(),
            current_ctc: String::new(),
            expected_ctc: String::new(),
            resume_text_path: None,
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            oracle_max_attempts: 5,
            oracle_retry_delay_secs: 30,
            oracle_throttle_secs: 2,
            discovery_url: String::new(),
            discovery_auth_header: None,
            discovery_page_size: 25,
            discovery_fetch_retries: 3,
            discovery_retry_delay_secs: 5,
            discovery_items_pointer: "/objects".to_string(),
            discovery_total_pointer: "/meta/total_count".to_string(),
            discovery_id_field: "id".to_string(),
            discovery_title_field: "title".to_string(),
            discovery_company_field: "company".to_string(),
            discovery_listing_field: "listing".to_string(),
            keywords: Vec::new(),
            locations: Vec::new(),
            experience_levels: Vec::new(),
            max_search_time_secs: 60 * 60,
            max_actions_per_run: 20,
            blacklist_companies: Vec::new(),
            blacklist_title_words: Vec::new(),
            target_companies: Vec::new(),
            note_max_chars: 300,
            sender_name: String::new(),
        }
    }
}

impl Config {
    /// 加载配置：TOML 文件（如存在）+ 环境变量覆盖
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match path {
            Some(path) if path.exists() => Self::from_toml_file(path)?,
            _ => Self::default(),
        };
        Ok(base.apply_env())
    }

    /// 只从环境变量加载
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    /// 从 TOML 文件解析，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 用环境变量覆盖已有的配置
    pub fn apply_env(self) -> Self {
        let d = self;
        Self {
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(d.verbose_logging),
            mode: env_parse("OUTREACH_MODE").unwrap_or(d.mode),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").unwrap_or(d.browser_debug_port),
            chrome_executable: env_string("CHROME_EXECUTABLE").map(PathBuf::from).or(d.chrome_executable),
            start_url: env_string("START_URL").unwrap_or(d.start_url),
            target_url_template: env_string("TARGET_URL_TEMPLATE").unwrap_or(d.target_url_template),
            settle_delay_ms: env_parse("SETTLE_DELAY_MS").unwrap_or(d.settle_delay_ms),
            ledger_path: env_string("LEDGER_PATH").map(PathBuf::from).unwrap_or(d.ledger_path),
            daily_limit: env_parse("DAILY_LIMIT").unwrap_or(d.daily_limit),
            weekly_limit: env_parse("WEEKLY_LIMIT").unwrap_or(d.weekly_limit),
            acted_retention_days: env_parse("ACTED_RETENTION_DAYS").or(d.acted_retention_days),
            ledger_lock_attempts: env_parse("LEDGER_LOCK_ATTEMPTS").unwrap_or(d.ledger_lock_attempts),
            ledger_lock_delay_ms: env_parse("LEDGER_LOCK_DELAY_MS").unwrap_or(d.ledger_lock_delay_ms),
            qa_cache_path: env_string("QUESTION_ANSWER_PATH").map(PathBuf::from).unwrap_or(d.qa_cache_path),
            outcome_log_path: env_string("OUTCOME_LOG_PATH").map(PathBuf::from).unwrap_or(d.outcome_log_path),
            dedup_lookback_days: env_parse("DEDUP_LOOKBACK_DAYS").unwrap_or(d.dedup_lookback_days),
            max_form_iterations: env_parse("MAX_FORM_ITERATIONS").unwrap_or(d.max_form_iterations),
            max_form_steps: env_parse("MAX_FORM_STEPS").unwrap_or(d.max_form_steps),
            validation_polls: env_parse("VALIDATION_POLLS").unwrap_or(d.validation_polls),
            validation_poll_delay_secs: env_parse("VALIDATION_POLL_DELAY_SECS").unwrap_or(d.validation_poll_delay_secs),
            resume_path: env_string("RESUME_PATH").map(PathBuf::from).or(d.resume_path),
            cover_letter_path: env_string("COVER_LETTER_PATH").map(PathBuf::from).or(d.cover_letter_path),
            account_email: env_string("ACCOUNT_EMAIL").unwrap_or(d.account_email),
            phone_number: env_string("PHONE_NUMBER").unwrap_or(d.phone_number),
            country_code: env_string("REGION_AND_CODE").unwrap_or(d.country_code),
            gender: env_string("GENDER").unwrap_or(d.gender),
            notice_period: env_string("NOTICE_PERIOD").unwrap_or(d.notice_period),
            current_ctc: env_string("CURRENT_CTC").unwrap_or(d.current_ctc),
            expected_ctc: env_string("EXPECTED_CTC").unwrap_or(d.expected_ctc),
            resume_text_path: env_string("RESUME_TEXT_PATH").map(PathBuf::from).or(d.resume_text_path),
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(d.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(d.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(d.llm_model_name),
            oracle_max_attempts: env_parse("ORACLE_MAX_ATTEMPTS").unwrap_or(d.oracle_max_attempts),
            oracle_retry_delay_secs: env_parse("ORACLE_RETRY_DELAY_SECS").unwrap_or(d.oracle_retry_delay_secs),
            oracle_throttle_secs: env_parse("ORACLE_THROTTLE_SECS").unwrap_or(d.oracle_throttle_secs),
            discovery_url: env_string("DISCOVERY_URL").unwrap_or(d.discovery_url),
            discovery_auth_header: env_string("DISCOVERY_AUTH_HEADER").or(d.discovery_auth_header),
            discovery_page_size: env_parse("DISCOVERY_PAGE_SIZE").unwrap_or(d.discovery_page_size),
            discovery_fetch_retries: env_parse("DISCOVERY_FETCH_RETRIES").unwrap_or(d.discovery_fetch_retries),
            discovery_retry_delay_secs: env_parse("DISCOVERY_RETRY_DELAY_SECS").unwrap_or(d.discovery_retry_delay_secs),
            discovery_items_pointer: env_string("DISCOVERY_ITEMS_POINTER").unwrap_or(d.discovery_items_pointer),
            discovery_total_pointer: env_string("DISCOVERY_TOTAL_POINTER").unwrap_or(d.discovery_total_pointer),
            discovery_id_field: env_string("DISCOVERY_ID_FIELD").unwrap_or(d.discovery_id_field),
            discovery_title_field: env_string("DISCOVERY_TITLE_FIELD").unwrap_or(d.discovery_title_field),
            discovery_company_field: env_string("DISCOVERY_COMPANY_FIELD").unwrap_or(d.discovery_company_field),
            discovery_listing_field: env_string("DISCOVERY_LISTING_FIELD").unwrap_or(d.discovery_listing_field),
            keywords: env_list("KEYWORDS").unwrap_or(d.keywords),
            locations: env_list("LOCATIONS").unwrap_or(d.locations),
            experience_levels: env_list("EXPERIENCE_LEVELS")
                .map(|levels| levels.iter().filter_map(|l| l.parse().ok()).collect())
                .unwrap_or(d.experience_levels),
            max_search_time_secs: env_parse("MAX_SEARCH_TIME_SECS").unwrap_or(d.max_search_time_secs),
            max_actions_per_run: env_parse("MAX_ACTIONS_PER_RUN").unwrap_or(d.max_actions_per_run),
            blacklist_companies: env_list("BLACKLIST_COMPANIES").unwrap_or(d.blacklist_companies),
            blacklist_title_words: env_list("BLACKLIST_TITLE_WORDS").unwrap_or(d.blacklist_title_words),
            target_companies: env_list("CONNECTION_COMPANY_NAMES").unwrap_or(d.target_companies),
            note_max_chars: env_parse("NOTE_MAX_CHARS").unwrap_or(d.note_max_chars),
            sender_name: env_string("NAME").unwrap_or(d.sender_name),
        }
    }

    /// 检查运行所必需的配置项
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm_api_key.is_empty() {
            return Err(ConfigError::Missing("LLM_API_KEY".to_string()));
        }
        if self.discovery_url.is_empty() {
            return Err(ConfigError::Missing("DISCOVERY_URL".to_string()));
        }
        if self.keywords.is_empty() {
            return Err(ConfigError::Missing("KEYWORDS".to_string()));
        }
        Ok(())
    }

    pub fn max_search_time(&self) -> Duration {
        Duration::from_secs(self.max_search_time_secs)
    }

    pub fn dedup_lookback(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.dedup_lookback_days))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.trim().parse().ok())
}

/// 逗号分隔的列表
fn env_list(name: &str) -> Option<Vec<String>> {
    env_string(name).map(|v| {
        v.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    })
}
