pub mod answer_cache;
pub mod answer_resolver;
pub mod discovery;
pub mod field_classifier;
pub mod http_source;
pub mod llm_oracle;
pub mod oracle;
pub mod outcome_log;
pub mod quota_ledger;

pub use answer_cache::AnswerCache;
pub use answer_resolver::{AnswerResolver, FieldAction, StaticAnswers, Unanswered};
pub use discovery::{
    DiscoveredPage, DiscoveryError, DiscoveryPager, DiscoveryQuery, DiscoverySource,
    PagerSettings, RawPage, SearchSpec,
};
pub use field_classifier::{classify, classify_step};
pub use http_source::HttpDiscoverySource;
pub use llm_oracle::LlmOracle;
pub use oracle::{Oracle, OracleError, OracleRequest, ProfileFacts, RetryPolicy};
pub use outcome_log::OutcomeLog;
pub use quota_ledger::{LedgerOptions, QuotaLedger};
