//! 基础设施层：持有浏览器页面资源

pub mod chromium_page;
pub mod js_executor;

pub use chromium_page::{ChromiumFormPage, Locators};
pub use js_executor::JsExecutor;
