//! Google Sheets adapter for the remote sink.
//!
//! Thin client over the Sheets v4 REST API: one spreadsheet, one sheet per
//! logical table. Carries no retry logic of its own; the reconciler owns
//! retries and backoff. Authentication uses a bearer access token resolved
//! by the configuration layer (the credential setup flow is external).

use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};

use super::{Sink, SinkError, Table};

const DEFAULT_ENDPOINT: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Sheets v4 REST sink.
pub struct SheetsSink {
    http: Client,
    endpoint: String,
    spreadsheet_id: String,
    token: String,
}

impl std::fmt::Debug for SheetsSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SheetsSink")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .finish_non_exhaustive()
    }
}

impl SheetsSink {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, SinkError> {
        let http = Client::builder()
            .user_agent(concat!("netpulse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            spreadsheet_id: spreadsheet_id.into(),
            token: token.into(),
        })
    }

    /// Override the API endpoint (tests point this at a local server).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/{}{}", self.endpoint, self.spreadsheet_id, suffix)
    }

    async fn check(&self, response: Response) -> Result<Value, SinkError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await.unwrap_or(Value::Null));
        }
        let message = response.text().await.unwrap_or_default();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SinkError::Auth(message)),
            StatusCode::TOO_MANY_REQUESTS => Err(SinkError::RateLimited),
            _ => Err(SinkError::Remote {
                status: status.as_u16(),
                message,
            }),
        }
    }

    async fn get(&self, suffix: &str) -> Result<Value, SinkError> {
        let response = self
            .http
            .get(self.url(suffix))
            .bearer_auth(&self.token)
            .send()
            .await?;
        self.check(response).await
    }

    async fn post(&self, suffix: &str, body: Value) -> Result<Value, SinkError> {
        let response = self
            .http
            .post(self.url(suffix))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        self.check(response).await
    }

    async fn put(&self, suffix: &str, body: Value) -> Result<Value, SinkError> {
        let response = self
            .http
            .put(self.url(suffix))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await?;
        self.check(response).await
    }

    /// Titles of the sheets currently in the spreadsheet.
    async fn sheet_titles(&self) -> Result<Vec<String>, SinkError> {
        let meta = self.get("?fields=sheets.properties.title").await?;
        let titles = meta["sheets"]
            .as_array()
            .map(|sheets| {
                sheets
                    .iter()
                    .filter_map(|s| s["properties"]["title"].as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(titles)
    }

    async fn write_headers(&self, table: Table) -> Result<(), SinkError> {
        let headers = table.headers();
        let last_col = (b'A' + headers.len() as u8 - 1) as char;
        let range = format!("{}!A1:{}1", table.as_ref(), last_col);
        self.put(
            &format!("/values/{range}?valueInputOption=RAW"),
            json!({ "values": [headers] }),
        )
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Sink for SheetsSink {
    async fn ensure_tables(&self) -> Result<(), SinkError> {
        let existing = self.sheet_titles().await?;
        let missing: Vec<Table> = [Table::ConnectivityChecks, Table::Outages]
            .into_iter()
            .filter(|t| !existing.iter().any(|title| title == t.as_ref()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }

        let requests: Vec<Value> = missing
            .iter()
            .map(|t| json!({ "addSheet": { "properties": { "title": t.as_ref() } } }))
            .collect();
        self.post(":batchUpdate", json!({ "requests": requests }))
            .await?;

        for table in missing {
            self.write_headers(table).await?;
            tracing::info!(table = table.as_ref(), "Created sink table");
        }
        Ok(())
    }

    async fn append_row(&self, table: Table, row: Vec<Value>) -> Result<(), SinkError> {
        let suffix = format!(
            "/values/{}!A:Z:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            table.as_ref()
        );
        self.post(&suffix, json!({ "values": [row] })).await?;
        Ok(())
    }

    async fn upsert_outage_row(
        &self,
        location_id: &str,
        start_time: DateTime<Utc>,
        row: Vec<Value>,
    ) -> Result<(), SinkError> {
        let start = start_time.to_rfc3339();
        let values = self.get("/values/Outages!A:G").await?;
        let rows = values["values"].as_array().cloned().unwrap_or_default();

        // Find the ongoing row for this outage and overwrite its tail.
        for (index, existing) in rows.iter().enumerate() {
            let cell = |i: usize| existing.get(i).and_then(Value::as_str).unwrap_or("");
            if cell(0) == location_id && cell(1) == start && cell(6) == "ONGOING" {
                let range = format!("Outages!C{n}:G{n}", n = index + 1);
                let tail: Vec<Value> = row[2..].to_vec();
                self.put(
                    &format!("/values/{range}?valueInputOption=RAW"),
                    json!({ "values": [tail] }),
                )
                .await?;
                tracing::debug!(location = location_id, start = %start, "Updated outage row");
                return Ok(());
            }
        }

        // No ongoing row (e.g. the open event was never delivered): append
        // the complete record instead.
        self.append_row(Table::Outages, row).await
    }
}
