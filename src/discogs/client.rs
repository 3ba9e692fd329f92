//! Discogs API client.
//!
//! Every outbound call passes through the `RequestGate` first and reports
//! the quota header back to it afterwards, so callers never have to think
//! about the rate budget.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::{self, HeaderMap};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::Config;

use super::api_types::{ApiCollectionItems, ApiFoldersResponse, ApiMasterRelease};
use super::gate::RequestGate;
use super::pages::{self, WalkOutcome};
use super::types::{Folder, MasterRelease};

/// Response header carrying the remaining request quota.
const RATELIMIT_REMAINING_HEADER: &str = "x-discogs-ratelimit-remaining";

/// Discogs requires an identifying user agent on every request.
const USER_AGENT: &str = concat!("waxcrate/", env!("CARGO_PKG_VERSION"));

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Discogs API client.
/// Clone is cheap - reqwest::Client uses Arc internally and the gate is
/// shared, so every clone respects the same throttle.
#[derive(Clone)]
pub struct DiscogsClient {
  http: reqwest::Client,
  gate: RequestGate,
  base_url: Url,
  per_page: u64,
  token: Option<String>,
}

impl DiscogsClient {
  pub fn new(config: &Config) -> Result<Self> {
    let http = reqwest::Client::builder()
      .user_agent(USER_AGENT)
      .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    let base_url = Url::parse(&config.discogs.url)
      .map_err(|e| eyre!("Invalid Discogs base URL {}: {}", config.discogs.url, e))?;

    let gate = RequestGate::new(
      config.discogs.rate_limit_threshold,
      std::time::Duration::from_millis(config.discogs.throttle_delay_ms),
    );

    Ok(Self {
      http,
      gate,
      base_url,
      per_page: config.discogs.per_page,
      token: Config::get_api_token().ok(),
    })
  }

  /// List a user's collection folders.
  pub async fn collection_folders(&self, username: &str) -> Result<Vec<Folder>> {
    let url = self
      .base_url
      .join(&format!("users/{}/collection/folders", username))
      .map_err(|e| eyre!("Failed to build folders URL: {}", e))?;

    let response: ApiFoldersResponse = self.get_json(url).await?;
    Ok(response.folders.into_iter().map(Folder::from).collect())
  }

  /// Fetch every page of a collection folder, following next-page cursors
  /// until exhausted. The result is a single materialized response.
  pub async fn collection_items(
    &self,
    username: &str,
    folder_id: u64,
  ) -> Result<WalkOutcome<ApiCollectionItems>> {
    let mut seed = self
      .base_url
      .join(&format!(
        "users/{}/collection/folders/{}/releases",
        username, folder_id
      ))
      .map_err(|e| eyre!("Failed to build collection URL: {}", e))?;
    seed
      .query_pairs_mut()
      .append_pair("per_page", &self.per_page.to_string());

    pages::fetch_all(seed.to_string(), |url| {
      let client = self.clone();
      async move {
        let url = Url::parse(&url).map_err(|e| eyre!("Invalid page URL {}: {}", url, e))?;
        client.get_json(url).await
      }
    })
    .await
  }

  /// Fetch one master release by id.
  pub async fn master_release(&self, master_id: u64) -> Result<MasterRelease> {
    let url = self
      .base_url
      .join(&format!("masters/{}", master_id))
      .map_err(|e| eyre!("Failed to build master URL: {}", e))?;

    let master: ApiMasterRelease = self.get_json(url).await?;
    Ok(MasterRelease::from(master))
  }

  /// Gated GET returning parsed JSON.
  ///
  /// Waits for gate admission, issues the request, then reports the quota
  /// header back to the gate. Transport and HTTP errors surface unchanged;
  /// on an error response the gate only learns about the quota when the
  /// header is actually present.
  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
    self.gate.admit().await?;

    let mut request = self.http.get(url.clone());
    if let Some(token) = &self.token {
      request = request.header(header::AUTHORIZATION, format!("Discogs token={}", token));
    }

    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Failed to send GET request to {}: {}", url, e))?;

    let remaining = quota_remaining(response.headers());
    let status = response.status();
    if status.is_success() || remaining.is_some() {
      self.gate.observe_quota(remaining)?;
    }
    debug!(%url, status = status.as_u16(), remaining, "discogs response");

    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(eyre!("Discogs returned {} for {}: {}", status, url, body));
    }

    response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse JSON response from {}: {}", url, e))
  }
}

/// Parse the remaining-quota header. Absent or malformed means the server
/// reported nothing usable and the quota is treated as unlimited.
fn quota_remaining(headers: &HeaderMap) -> Option<u64> {
  headers
    .get(RATELIMIT_REMAINING_HEADER)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.trim().parse().ok())
}

#[cfg(test)]
mod tests {
  use super::*;
  use reqwest::header::HeaderValue;

  #[test]
  fn test_quota_remaining_parses_header() {
    let mut headers = HeaderMap::new();
    headers.insert(
      RATELIMIT_REMAINING_HEADER,
      HeaderValue::from_static("42"),
    );
    assert_eq!(quota_remaining(&headers), Some(42));
  }

  #[test]
  fn test_quota_remaining_absent_or_malformed_is_none() {
    assert_eq!(quota_remaining(&HeaderMap::new()), None);

    let mut headers = HeaderMap::new();
    headers.insert(
      RATELIMIT_REMAINING_HEADER,
      HeaderValue::from_static("lots"),
    );
    assert_eq!(quota_remaining(&headers), None);
  }
}
