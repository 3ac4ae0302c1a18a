//! Clients for the upstream sports-data providers and the generative
//! language API.
//!
//! Every client call either yields parsed JSON or `None`. Transport errors,
//! non-2xx responses and malformed bodies are logged here and never
//! escalated; callers treat `None` as "no data for this fetch".

pub mod api_sports;
pub mod football_data;
pub mod gemini;

use std::num::NonZeroU32;
use std::time::Duration;

use anyhow::Context;
use governor::{Quota, RateLimiter};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, error, info};

pub use api_sports::ApiSportsClient;
pub use football_data::FootballDataClient;
pub use gemini::GeminiClient;

pub type Limiter =
    RateLimiter<governor::state::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// The two sports-data providers. Upstream ids from both share one id
/// column per table, so a numeric clash between providers maps to the same
/// stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    FootballData,
    ApiSports,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::FootballData => "football-data.org",
            Provider::ApiSports => "api-sports.io",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared HTTP client with timeouts.
pub fn http_client(timeout: Duration) -> crate::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .pool_max_idle_per_host(5)
        .build()
        .context("Failed to create HTTP client")?;
    Ok(client)
}

pub(crate) fn limiter(requests_per_minute: NonZeroU32) -> Limiter {
    RateLimiter::direct(Quota::per_minute(requests_per_minute))
}

/// Issue an authenticated GET and parse the body as JSON.
pub(crate) async fn get_json(
    http: &reqwest::Client,
    limiter: &Limiter,
    provider: Provider,
    url: &str,
    headers: HeaderMap,
    params: &[(&str, String)],
) -> Option<Value> {
    limiter.until_ready().await;

    info!(provider = %provider, url, params = ?params, "Making upstream request");

    let response = match http.get(url).headers(headers).query(params).send().await {
        Ok(response) => response,
        Err(e) => {
            error!(provider = %provider, url, error = %e, "Upstream request failed");
            return None;
        }
    };

    for quota_header in ["x-requests-available-minute", "x-ratelimit-requests-remaining"] {
        if let Some(remaining) = response.headers().get(quota_header) {
            debug!(
                provider = %provider,
                "API requests remaining: {}",
                remaining.to_str().unwrap_or("?")
            );
        }
    }

    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            error!(provider = %provider, url, status = status.as_u16(), error = %e, "Failed to read upstream response body");
            return None;
        }
    };

    if !status.is_success() {
        error!(
            provider = %provider,
            url,
            status = status.as_u16(),
            body = %truncate(&body, 500),
            "Upstream request returned an error status"
        );
        return None;
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(value) => {
            info!(provider = %provider, url, status = status.as_u16(), "Successful upstream response");
            Some(value)
        }
        Err(e) => {
            error!(provider = %provider, url, error = %e, "Upstream response is not valid JSON");
            None
        }
    }
}

/// Decode a typed view of a JSON value, logging instead of failing.
pub(crate) fn decode<T: serde::de::DeserializeOwned>(
    provider: Provider,
    what: &str,
    value: Value,
) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            error!(provider = %provider, what, error = %e, "Unexpected upstream payload shape");
            None
        }
    }
}

/// Treat an explicit JSON `null` list as empty.
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn truncate(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, Default)]
    #[serde(default)]
    struct Holder {
        #[serde(deserialize_with = "null_as_empty")]
        items: Vec<i32>,
    }

    #[test]
    fn null_lists_decode_as_empty() {
        let holder: Holder = serde_json::from_value(serde_json::json!({ "items": null })).unwrap();
        assert!(holder.items.is_empty());

        let holder: Holder = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(holder.items.is_empty());

        let holder: Holder = serde_json::from_value(serde_json::json!({ "items": [1, 2] })).unwrap();
        assert_eq!(holder.items, vec![1, 2]);
    }

    #[test]
    fn decode_reports_shape_errors_as_none() {
        let decoded: Option<Holder> = decode(
            Provider::FootballData,
            "holder",
            serde_json::json!({ "items": "nope" }),
        );
        assert!(decoded.is_none());
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
