//! REST transport for the time-series engine
//!
//! Statements are POSTed as plain text to `{url}/rest/sql` with basic auth.
//! The engine answers with a JSON envelope:
//!
//! ```text
//! {"code": 0, "column_meta": [["field","VARCHAR",64], ...], "data": [[...], ...], "rows": 5}
//! {"code": 864, "desc": "STable already exists"}
//! ```

use crate::client::TsdbClient;
use crate::config::TsdbConfig;
use crate::error::{ErrorCode, Result, TsdbError};
use crate::schema::TableSchema;
use async_trait::async_trait;
use serde::Deserialize;
use signalhouse_core::ident::quote_qualified;
use tracing::debug;

/// Response envelope of the REST endpoint
#[derive(Debug, Deserialize)]
struct RestResponse {
    code: i32,

    #[serde(default)]
    desc: Option<String>,

    #[serde(default)]
    data: Vec<Vec<serde_json::Value>>,

    #[serde(default)]
    rows: Option<u64>,
}

/// HTTP client for the engine's SQL endpoint
pub struct RestTsdbClient {
    http_client: reqwest::Client,
    sql_url: String,
    user: String,
    password: String,
}

impl RestTsdbClient {
    pub fn new(config: &TsdbConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| TsdbError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            sql_url: format!("{}/rest/sql", config.url.trim_end_matches('/')),
            user: config.user.clone(),
            password: config.password.clone(),
        })
    }

    async fn post(&self, sql: &str) -> Result<RestResponse> {
        debug!(statement = sql, "Issuing engine statement");

        let response = self
            .http_client
            .post(&self.sql_url)
            .basic_auth(&self.user, Some(&self.password))
            .body(sql.to_string())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        match serde_json::from_str::<RestResponse>(&body) {
            Ok(parsed) if parsed.code == 0 => Ok(parsed),
            Ok(parsed) => Err(TsdbError::rejected(
                ErrorCode(parsed.code),
                parsed.desc.unwrap_or_else(|| "no description".to_string()),
            )),
            // Gateways in front of the engine answer 502/503 with HTML bodies
            Err(_) if status.is_server_error() => Err(TsdbError::Transport(format!(
                "engine endpoint returned {}",
                status
            ))),
            Err(e) => Err(TsdbError::InvalidResponse(format!(
                "status {}: {}",
                status, e
            ))),
        }
    }
}

#[async_trait]
impl TsdbClient for RestTsdbClient {
    async fn execute(&self, sql: &str) -> Result<u64> {
        let response = self.post(sql).await?;
        Ok(response.rows.unwrap_or(0))
    }

    async fn describe(&self, database: &str, table: &str) -> Result<Option<TableSchema>> {
        let sql = format!("DESCRIBE {}", quote_qualified(database, table));
        match self.post(&sql).await {
            Ok(response) => Ok(Some(TableSchema::from_describe_rows(&response.data)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_url_normalization() {
        let client = RestTsdbClient::new(&TsdbConfig {
            url: "http://tsdb:6041/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.sql_url, "http://tsdb:6041/rest/sql");
    }

    #[test]
    fn test_response_envelope() {
        let ok: RestResponse = serde_json::from_str(
            r#"{"code":0,"column_meta":[["affected_rows","INT",4]],"data":[[0]],"rows":1}"#,
        )
        .unwrap();
        assert_eq!(ok.code, 0);
        assert_eq!(ok.rows, Some(1));

        let err: RestResponse =
            serde_json::from_str(r#"{"code":864,"desc":"STable already exists"}"#).unwrap();
        assert_eq!(ErrorCode(err.code), ErrorCode::STABLE_ALREADY_EXISTS);
        assert!(err.data.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_transient() {
        use signalhouse_core::Retryable;

        let client = RestTsdbClient::new(&TsdbConfig {
            url: "http://127.0.0.1:1".to_string(),
            request_timeout_ms: 500,
            ..Default::default()
        })
        .unwrap();
        let err = client.execute("SELECT SERVER_VERSION()").await.unwrap_err();
        assert!(err.is_retryable(), "unexpected error: {}", err);
    }
}
