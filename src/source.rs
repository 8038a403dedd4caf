use std::collections::HashMap;

use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::info;

use crate::config::DesignApiSettings;
use crate::design::node::{Document, Node};
use crate::design::walk::walk;
use crate::error::{Error, Result};
use crate::retry::{or_empty, with_rate_limit_retry, RetryPolicy};

const TOKEN_HEADER: &str = "X-Figma-Token";

/// Thin client for the design tool's REST API.
pub struct DesignApi {
    client: Client,
    base_url: String,
    token: String,
    policy: RetryPolicy,
}

impl DesignApi {
    pub fn new(settings: &DesignApiSettings, policy: RetryPolicy) -> Result<DesignApi> {
        let token = settings
            .token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::validation("design API token is not configured"))?;
        Ok(DesignApi {
            client: Client::new(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token,
            policy,
        })
    }

    /// Fetch a whole design file. Rate limits are retried, then surfaced.
    pub async fn fetch_file(&self, file_key: &str) -> Result<Value> {
        check_key(file_key)?;
        let url = format!("{}/v1/files/{}", self.base_url, file_key);
        info!("Fetching design file {}", file_key);
        with_rate_limit_retry(&self.policy, file_key, || self.get_json(&url)).await
    }

    /// Image fill URLs for `node_ids`. Failures degrade to an empty map.
    pub async fn fetch_image_urls(&self, file_key: &str, node_ids: &[String]) -> HashMap<String, String> {
        if node_ids.is_empty() || check_key(file_key).is_err() {
            return HashMap::new();
        }
        let url = format!(
            "{}/v1/images/{}?ids={}",
            self.base_url,
            file_key,
            node_ids.join(",")
        );
        or_empty("image lookup", async {
            let body = with_rate_limit_retry(&self.policy, "images", || self.get_json(&url)).await?;
            Ok::<_, Error>(image_map(&body))
        })
        .await
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let resp = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.token)
            .send()
            .await?;
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            return Err(rate_limit_from_headers(resp.headers()));
        }
        let resp = resp.error_for_status()?;
        Ok(resp.json::<Value>().await?)
    }
}

fn check_key(file_key: &str) -> Result<()> {
    if !file_key.is_empty() && file_key.chars().all(|c| c.is_ascii_alphanumeric()) {
        Ok(())
    } else {
        Err(Error::validation(format!("invalid file key `{}`", file_key)))
    }
}

pub fn rate_limit_from_headers(headers: &HeaderMap) -> Error {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };
    Error::RateLimit {
        retry_after_secs: header("retry-after")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0),
        plan_tier: header("x-plan-tier"),
        limit_type: header("x-rate-limit-type"),
    }
}

/// Ids of every visible node with an image fill, in document order.
pub fn image_node_ids(doc: &Document) -> Vec<String> {
    let mut ids = Vec::new();
    walk(&doc.root, &mut |node: &Node, _: &[&Node]| {
        if node.has_image_fill() {
            ids.push(node.id.clone());
        }
    });
    ids
}

fn image_map(body: &Value) -> HashMap<String, String> {
    body.get("images")
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(id, url)| Some((id.clone(), url.as_str()?.to_string())))
                .collect()
        })
        .unwrap_or_default()
}
