use crate::config::Settings;
use crate::ingest::types::{DailyMetricsResponse, LiveSpendResponse, ReportLevel};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_METRICS_PATH: &str = "/v1/daily_metrics";
const DEFAULT_LIVE_SPEND_PATH: &str = "/v1/live_spend";
const DEFAULT_RETRIES: u32 = 3;

/// Boundary to the ad platforms. Rate limiting, auth and retries live behind
/// this trait; the engine consumes whatever best-effort snapshot comes back.
#[async_trait::async_trait]
pub trait AdDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_daily_metrics(
        &self,
        client_id: &str,
        platform: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
        level: ReportLevel,
    ) -> Result<(DailyMetricsResponse, Value)>;

    async fn fetch_live_spend(
        &self,
        client_id: &str,
        platform: &str,
    ) -> Result<(LiveSpendResponse, Value)>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonAdDataProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    metrics_path: String,
    live_spend_path: String,
    retries: u32,
}

impl HttpJsonAdDataProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_ad_data_base_url()?.to_string();
        let api_key = settings.ad_data_api_key.clone();

        let timeout_secs = std::env::var("AD_DATA_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let retries = std::env::var("AD_DATA_RETRIES")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_RETRIES);

        let metrics_path = std::env::var("AD_DATA_METRICS_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_METRICS_PATH.to_string());

        let live_spend_path = std::env::var("AD_DATA_LIVE_SPEND_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LIVE_SPEND_PATH.to_string());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build ad data http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            metrics_path,
            live_spend_path,
            retries,
        })
    }

    fn url(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn get_json_once(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = self.url(path);
        let headers = self.headers()?;

        let res = self
            .http
            .get(url)
            .headers(headers)
            .query(query)
            .send()
            .await
            .context("ad data request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read ad data response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("ad data response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("ad data HTTP {status}: {raw_json}");
        }

        Ok(raw_json)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_json_once(path, query).await {
                Ok(raw) => return Ok(raw),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(attempt, ?backoff, error = %err, "ad data fetch failed; retrying");
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl AdDataProvider for HttpJsonAdDataProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_daily_metrics(
        &self,
        client_id: &str,
        platform: &str,
        date_from: NaiveDate,
        date_to: NaiveDate,
        level: ReportLevel,
    ) -> Result<(DailyMetricsResponse, Value)> {
        let query = [
            ("client_id", client_id.to_string()),
            ("platform", platform.to_string()),
            ("date_from", date_from.to_string()),
            ("date_to", date_to.to_string()),
            ("level", level.as_str().to_string()),
        ];
        let raw = self.get_json(&self.metrics_path, &query).await?;
        let parsed = serde_json::from_value::<DailyMetricsResponse>(raw.clone())
            .context("failed to parse ad data response into DailyMetricsResponse")?;
        validate_metrics(&parsed, client_id, platform, date_from, date_to)?;
        Ok((parsed, raw))
    }

    async fn fetch_live_spend(
        &self,
        client_id: &str,
        platform: &str,
    ) -> Result<(LiveSpendResponse, Value)> {
        let query = [
            ("client_id", client_id.to_string()),
            ("platform", platform.to_string()),
        ];
        let raw = self.get_json(&self.live_spend_path, &query).await?;
        let parsed = serde_json::from_value::<LiveSpendResponse>(raw.clone())
            .context("failed to parse ad data response into LiveSpendResponse")?;
        validate_live_spend(&parsed, client_id, platform)?;
        Ok((parsed, raw))
    }
}

fn validate_metrics(
    resp: &DailyMetricsResponse,
    client_id: &str,
    platform: &str,
    date_from: NaiveDate,
    date_to: NaiveDate,
) -> Result<()> {
    anyhow::ensure!(
        resp.client_id == client_id,
        "provider client_id mismatch: expected {client_id}, got {}",
        resp.client_id
    );
    anyhow::ensure!(
        resp.platform == platform,
        "provider platform mismatch: expected {platform}, got {}",
        resp.platform
    );
    anyhow::ensure!(
        resp.date_from == date_from && resp.date_to == date_to,
        "provider date range mismatch: expected {date_from}..{date_to}, got {}..{}",
        resp.date_from,
        resp.date_to
    );

    for item in &resp.items {
        anyhow::ensure!(
            !item.campaign_name.trim().is_empty(),
            "campaign_name must be non-empty"
        );
        anyhow::ensure!(
            item.spend >= 0.0 && item.spend.is_finite(),
            "spend must be a finite non-negative number (campaign {})",
            item.campaign_name
        );
        anyhow::ensure!(
            item.impressions >= 0 && item.clicks >= 0,
            "impressions and clicks must be non-negative (campaign {})",
            item.campaign_name
        );
    }

    Ok(())
}

fn validate_live_spend(resp: &LiveSpendResponse, client_id: &str, platform: &str) -> Result<()> {
    anyhow::ensure!(
        resp.client_id == client_id && resp.platform == platform,
        "provider scope mismatch: expected {client_id}/{platform}, got {}/{}",
        resp.client_id,
        resp.platform
    );
    for item in &resp.items {
        anyhow::ensure!(
            !item.campaign_name.trim().is_empty(),
            "campaign_name must be non-empty"
        );
        anyhow::ensure!(
            item.spend_today >= 0.0 && item.budget_remaining >= 0.0,
            "live spend figures must be non-negative (campaign {})",
            item.campaign_name
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(items: Value) -> DailyMetricsResponse {
        let as_of = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        serde_json::from_value(json!({
            "client_id": "acme",
            "platform": "meta",
            "date_from": as_of,
            "date_to": as_of,
            "items": items
        }))
        .unwrap()
    }

    #[test]
    fn validation_accepts_a_clean_response() {
        let as_of = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        let resp = response(json!([
            {"campaign_name": "spring_sale", "spend": 10.0, "impressions": 100, "clicks": 5, "ctr": 5.0, "cpc": 2.0}
        ]));
        assert!(validate_metrics(&resp, "acme", "meta", as_of, as_of).is_ok());
    }

    #[test]
    fn validation_rejects_scope_mismatch_and_bad_rows() {
        let as_of = NaiveDate::from_ymd_opt(2026, 1, 9).unwrap();
        let resp = response(json!([]));
        assert!(validate_metrics(&resp, "other", "meta", as_of, as_of).is_err());

        let bad_name = response(json!([
            {"campaign_name": "  ", "spend": 10.0, "impressions": 100, "clicks": 5, "ctr": 5.0, "cpc": 2.0}
        ]));
        assert!(validate_metrics(&bad_name, "acme", "meta", as_of, as_of).is_err());

        let bad_spend = response(json!([
            {"campaign_name": "spring_sale", "spend": -1.0, "impressions": 100, "clicks": 5, "ctr": 5.0, "cpc": 2.0}
        ]));
        assert!(validate_metrics(&bad_spend, "acme", "meta", as_of, as_of).is_err());
    }
}
