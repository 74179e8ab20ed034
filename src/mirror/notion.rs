use super::MirrorClient;
use crate::data::Observation;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const NOTION_VERSION: &str = "2022-06-28";

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct NotionError {
    code: Option<String>,
    message: Option<String>,
}

/// Mirrors observations into a Notion database, one page per date.
///
/// Page properties: `Date` (date), `WALCL`, `ON RRP`, `TGA` and
/// `Net Liquidity` (numbers).
pub struct NotionClient {
    token: String,
    database_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl NotionClient {
    /// Creates a new `NotionClient` for one database.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed
    pub fn new(
        token: String,
        database_id: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build Notion HTTP client")?;

        Ok(Self {
            token,
            database_id,
            base_url,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<String> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Notion request to {} failed", path))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("failed to read Notion response")?;

        if !status.is_success() {
            return Err(api_error(status, &text));
        }

        Ok(text)
    }
}

#[async_trait]
impl MirrorClient for NotionClient {
    async fn create(&self, observation: &Observation) -> Result<()> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": page_properties(observation),
        });

        self.post("pages", &body).await?;
        debug!(date = %observation.date, "created Notion page");

        Ok(())
    }

    async fn exists(&self, date: NaiveDate) -> Result<bool> {
        let path = format!("databases/{}/query", self.database_id);
        let text = self.post(&path, &date_filter(date)).await?;

        let response: QueryResponse =
            serde_json::from_str(&text).context("invalid Notion query response")?;

        Ok(!response.results.is_empty())
    }
}

fn page_properties(obs: &Observation) -> Value {
    json!({
        "Date":          { "date":   { "start": obs.date.format("%Y-%m-%d").to_string() } },
        "WALCL":         { "number": obs.walcl },
        "ON RRP":        { "number": obs.on_rrp },
        "TGA":           { "number": obs.tga },
        "Net Liquidity": { "number": obs.net_liquidity },
    })
}

fn date_filter(date: NaiveDate) -> Value {
    json!({
        "filter": {
            "property": "Date",
            "date": { "equals": date.format("%Y-%m-%d").to_string() },
        },
        "page_size": 1,
    })
}

fn api_error(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<NotionError>(body) {
        Ok(NotionError {
            code: Some(code),
            message: Some(message),
        }) => anyhow!("Notion API error {} ({}): {}", status, code, message),
        Ok(NotionError {
            message: Some(message),
            ..
        }) => anyhow!("Notion API error {}: {}", status, message),
        _ => anyhow!("Notion returned HTTP {}", status),
    }
}
