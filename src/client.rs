//! n8n API client.
//!
//! A thin synchronous gateway over the n8n public REST API: API-key auth,
//! JSON bodies, and a bounded retry loop with exponential backoff for
//! transport failures and 429/5xx responses. Everything else surfaces the
//! server's error payload immediately.

use crate::error::{Error, Result};
use serde_json::{json, Value};
use std::time::Duration;
use ureq::Agent;

const API_KEY_HEADER: &str = "X-N8N-API-KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const TAG_PAGE_LIMIT: &str = "100";
const ERROR_BODY_LIMIT: usize = 200;

/// Operations the deploy pipeline needs from the remote service.
///
/// The trait is the seam the planner, reconciler, and executor are tested
/// through; `N8nClient` is the production implementation.
pub trait N8nApi {
    fn list_workflows(&self) -> Result<Vec<Value>>;
    fn get_workflow(&self, workflow_id: &str) -> Result<Value>;
    fn create_workflow(&self, workflow: &Value) -> Result<Value>;
    fn update_workflow(&self, workflow_id: &str, workflow: &Value) -> Result<Value>;
    fn delete_workflow(&self, workflow_id: &str) -> Result<()>;
    fn activate_workflow(&self, workflow_id: &str) -> Result<()>;
    fn deactivate_workflow(&self, workflow_id: &str) -> Result<()>;
    fn list_tags(&self) -> Result<Vec<Value>>;
    fn create_tag(&self, name: &str) -> Result<Value>;
    fn delete_tag(&self, tag_id: &str) -> Result<()>;
    fn update_workflow_tags(&self, workflow_id: &str, tag_ids: &[String]) -> Result<()>;
}

/// HTTP client for one n8n instance.
pub struct N8nClient {
    agent: Agent,
    api_url: String,
    api_key: String,
    max_retries: u32,
}

impl N8nClient {
    pub fn new(api_url: &str, api_key: &str) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.new_agent(),
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    fn execute(
        &self,
        method: &'static str,
        url: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        match method {
            "GET" | "DELETE" => {
                let mut request = if method == "GET" {
                    self.agent.get(url)
                } else {
                    self.agent.delete(url)
                };
                request = request
                    .header(API_KEY_HEADER, &self.api_key)
                    .header("Accept", "application/json");
                for (key, value) in params {
                    request = request.query(key, value);
                }
                request.call()
            }
            _ => {
                let request = if method == "POST" {
                    self.agent.post(url)
                } else {
                    self.agent.put(url)
                };
                let request = request
                    .header(API_KEY_HEADER, &self.api_key)
                    .header("Accept", "application/json");
                request.send_json(body.unwrap_or(&Value::Null))
            }
        }
    }

    /// Perform one request with the retry loop applied.
    fn request(
        &self,
        method: &'static str,
        endpoint: &str,
        params: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}{endpoint}", self.api_url);
        let mut attempt = 0u32;
        loop {
            match self.execute(method, &url, params, body) {
                Ok(mut response) => {
                    let status = response.status().as_u16();
                    if is_retryable_status(status) && attempt + 1 < self.max_retries {
                        let delay = backoff_delay(attempt);
                        tracing::warn!(method, %url, status, ?delay, "retrying request");
                        std::thread::sleep(delay);
                        attempt += 1;
                        continue;
                    }
                    let text = response.body_mut().read_to_string().map_err(|err| {
                        Error::Api {
                            method,
                            url: url.clone(),
                            status: Some(status),
                            detail: format!("failed to read response body: {err}"),
                        }
                    })?;
                    if status >= 400 {
                        return Err(Error::Api {
                            method,
                            url,
                            status: Some(status),
                            detail: format!("HTTP {status}: {}", truncate(&text)),
                        });
                    }
                    tracing::debug!(method, %url, status, "request complete");
                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    return serde_json::from_str(&text).map_err(|err| Error::Api {
                        method,
                        url: url.clone(),
                        status: Some(status),
                        detail: format!("invalid JSON response: {err}"),
                    });
                }
                Err(err) => {
                    if attempt + 1 < self.max_retries {
                        let delay = backoff_delay(attempt);
                        tracing::warn!(method, %url, error = %err, ?delay, "retrying request");
                        std::thread::sleep(delay);
                        attempt += 1;
                        continue;
                    }
                    return Err(Error::Api {
                        method,
                        url,
                        status: None,
                        detail: err.to_string(),
                    });
                }
            }
        }
    }
}

impl N8nApi for N8nClient {
    fn list_workflows(&self) -> Result<Vec<Value>> {
        let result = self.request("GET", "/api/v1/workflows", &[], None)?;
        Ok(unwrap_collection(result))
    }

    fn get_workflow(&self, workflow_id: &str) -> Result<Value> {
        self.request("GET", &format!("/api/v1/workflows/{workflow_id}"), &[], None)
    }

    fn create_workflow(&self, workflow: &Value) -> Result<Value> {
        self.request("POST", "/api/v1/workflows", &[], Some(workflow))
    }

    fn update_workflow(&self, workflow_id: &str, workflow: &Value) -> Result<Value> {
        self.request(
            "PUT",
            &format!("/api/v1/workflows/{workflow_id}"),
            &[],
            Some(workflow),
        )
    }

    fn delete_workflow(&self, workflow_id: &str) -> Result<()> {
        self.request("DELETE", &format!("/api/v1/workflows/{workflow_id}"), &[], None)?;
        Ok(())
    }

    fn activate_workflow(&self, workflow_id: &str) -> Result<()> {
        self.request(
            "POST",
            &format!("/api/v1/workflows/{workflow_id}/activate"),
            &[],
            Some(&json!({})),
        )?;
        Ok(())
    }

    fn deactivate_workflow(&self, workflow_id: &str) -> Result<()> {
        self.request(
            "POST",
            &format!("/api/v1/workflows/{workflow_id}/deactivate"),
            &[],
            Some(&json!({})),
        )?;
        Ok(())
    }

    fn list_tags(&self) -> Result<Vec<Value>> {
        let mut all_tags = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut params = vec![("limit".to_string(), TAG_PAGE_LIMIT.to_string())];
            if let Some(cursor) = &cursor {
                params.push(("cursor".to_string(), cursor.clone()));
            }
            let page = self.request("GET", "/api/v1/tags", &params, None)?;
            let (tags, next_cursor) = split_tag_page(page);
            all_tags.extend(tags);
            match next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(all_tags)
    }

    fn create_tag(&self, name: &str) -> Result<Value> {
        self.request("POST", "/api/v1/tags", &[], Some(&json!({ "name": name })))
    }

    fn delete_tag(&self, tag_id: &str) -> Result<()> {
        self.request("DELETE", &format!("/api/v1/tags/{tag_id}"), &[], None)?;
        Ok(())
    }

    fn update_workflow_tags(&self, workflow_id: &str, tag_ids: &[String]) -> Result<()> {
        let tags: Vec<Value> = tag_ids.iter().map(|id| json!({ "id": id })).collect();
        self.request(
            "PUT",
            &format!("/api/v1/workflows/{workflow_id}/tags"),
            &[],
            Some(&Value::Array(tags)),
        )?;
        Ok(())
    }
}

/// 429 and transient server errors are worth retrying.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Exponential backoff doubling from one second: 1s, 2s, 4s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.min(16))
}

/// Unwrap either a bare list or a `{"data": [...]}` envelope.
pub fn unwrap_collection(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Split one tag-listing response into its items and the next cursor.
///
/// Newer servers return `{"data": [...], "nextCursor": "..."}`; older ones
/// return a bare list with no pagination.
pub fn split_tag_page(value: Value) -> (Vec<Value>, Option<String>) {
    match value {
        Value::Array(items) => (items, None),
        Value::Object(mut map) => {
            let items = match map.remove("data") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };
            let next_cursor = map
                .remove("nextCursor")
                .and_then(|cursor| cursor.as_str().map(str::to_string));
            (items, next_cursor)
        }
        _ => (Vec::new(), None),
    }
}

/// Service-assigned resource ID as a string, whatever JSON type it uses.
pub fn resource_id(value: &Value) -> Option<String> {
    match value.get("id") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    }
}

fn truncate(text: &str) -> String {
    if text.len() <= ERROR_BODY_LIMIT {
        return text.trim().to_string();
    }
    let mut end = ERROR_BODY_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end].trim())
}
