//! HTTP JSON 发现源
//!
//! 通过 reqwest 请求站点的搜索接口，用 JSON Pointer 取出条目列表与总数，
//! 字段名可配置。401 / 403 视为认证失败。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::TransportError;
use crate::models::RawTarget;
use crate::services::discovery::{DiscoveryError, DiscoveryQuery, DiscoverySource, RawPage};

/// JSON 字段映射
#[derive(Debug, Clone)]
pub struct FieldMapping {
    pub items_pointer: String,
    pub total_pointer: String,
    pub id: String,
    pub title: String,
    pub company: String,
    pub listing: String,
}

impl FieldMapping {
    pub fn from_config(config: &Config) -> Self {
        Self {
            items_pointer: config.discovery_items_pointer.clone(),
            total_pointer: config.discovery_total_pointer.clone(),
            id: config.discovery_id_field.clone(),
            title: config.discovery_title_field.clone(),
            company: config.discovery_company_field.clone(),
            listing: config.discovery_listing_field.clone(),
        }
    }
}

/// 基于 HTTP 的发现源
pub struct HttpDiscoverySource {
    http: reqwest::Client,
    endpoint: String,
    auth_header: Option<(String, String)>,
    mapping: FieldMapping,
}

impl HttpDiscoverySource {
    pub fn new(config: &Config) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TransportError::RequestFailed {
                endpoint: config.discovery_url.clone(),
                message: e.to_string(),
            })?;

        // "Name: value" 形式
        let auth_header = config
            .discovery_auth_header
            .as_deref()
            .and_then(|raw| raw.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()));

        Ok(Self {
            http,
            endpoint: config.discovery_url.clone(),
            auth_header,
            mapping: FieldMapping::from_config(config),
        })
    }

    fn query_params(query: &DiscoveryQuery) -> Vec<(String, String)> {
        let mut params = vec![
            ("keywords".to_string(), query.keywords.clone()),
            ("start".to_string(), query.offset.to_string()),
            ("count".to_string(), query.page_size.to_string()),
        ];
        if let Some(location) = &query.location {
            params.push(("location".to_string(), location.clone()));
        }
        params.extend(query.filters.iter().cloned());
        params
    }
}

#[async_trait]
impl DiscoverySource for HttpDiscoverySource {
    async fn fetch(&self, query: &DiscoveryQuery) -> Result<RawPage, DiscoveryError> {
        debug!("请求目标列表: {} (offset {})", self.endpoint, query.offset);

        let mut request = self
            .http
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&Self::query_params(query));
        if let Some((name, value)) = &self.auth_header {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::RequestFailed {
                endpoint: self.endpoint.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(DiscoveryError::Auth(format!(
                "{} 返回 HTTP {}",
                self.endpoint,
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(TransportError::BadStatus {
                endpoint: self.endpoint.clone(),
                status: status.as_u16(),
            }
            .into());
        }

        let body: Value = response.json().await.map_err(|e| TransportError::BadBody {
            endpoint: self.endpoint.clone(),
            message: e.to_string(),
        })?;

        Ok(parse_page(&body, &self.mapping))
    }
}

/// 从响应 JSON 中取出一页；缺失的字段按空处理
pub fn parse_page(body: &Value, mapping: &FieldMapping) -> RawPage {
    let items: Vec<RawTarget> = body
        .pointer(&mapping.items_pointer)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(|item| parse_item(item, mapping)).collect())
        .unwrap_or_default();

    let total_count = body
        .pointer(&mapping.total_pointer)
        .and_then(Value::as_u64)
        .map(|n| n as usize);

    RawPage { items, total_count }
}

fn parse_item(item: &Value, mapping: &FieldMapping) -> RawTarget {
    RawTarget {
        id: item.get(&mapping.id).and_then(scalar_text),
        title: text_field(item, &mapping.title),
        company: text_field(item, &mapping.company),
        listing_text: text_field(item, &mapping.listing),
    }
}

fn text_field(item: &Value, name: &str) -> String {
    item.get(name).and_then(scalar_text).unwrap_or_default()
}

/// 字符串或数字都当作文本
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_page_with_default_mapping() {
        let mapping = FieldMapping::from_config(&Config::default());
        let body = json!({
            "meta": { "total_count": 57 },
            "objects": [
                { "id": 3901, "title": "Rust Engineer", "company": "Acme", "listing": "Promoted" },
                { "id": "3902", "title": "Backend Dev", "listing": "Applied" },
                { "title": "No id" }
            ]
        });

        let page = parse_page(&body, &mapping);
        assert_eq!(page.total_count, Some(57));
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.items[0].id.as_deref(), Some("3901"));
        assert_eq!(page.items[1].company, "");
        assert_eq!(page.items[1].listing_text, "Applied");
        assert_eq!(page.items[2].id, None);
    }

    #[test]
    fn test_missing_total_is_unknown() {
        let mapping = FieldMapping::from_config(&Config::default());
        let page = parse_page(&json!({ "objects": [{ "id": "1" }] }), &mapping);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.total_count, None);

        let empty = parse_page(&json!({}), &mapping);
        assert_eq!(empty, RawPage::default());
    }

    #[test]
    fn test_query_params_include_filters() {
        let params = HttpDiscoverySource::query_params(&DiscoveryQuery {
            keywords: "rust".to_string(),
            location: Some("Remote".to_string()),
            offset: 25,
            page_size: 25,
            filters: vec![("experience".to_string(), "2,3".to_string())],
        });

        assert!(params.contains(&("start".to_string(), "25".to_string())));
        assert!(params.contains(&("location".to_string(), "Remote".to_string())));
        assert!(params.contains(&("experience".to_string(), "2,3".to_string())));
    }
}
