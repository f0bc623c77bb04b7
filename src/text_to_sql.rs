//! Natural-language to SQL, backed by a Vanna-style JSON-RPC service.
//!
//! The service only writes the SQL; running it happens locally in
//! [`SqliteExecutor`](crate::sql_executor::SqliteExecutor).

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::SqlSettings;
use crate::sql_executor::SqliteExecutor;
use crate::table::QueryOutput;

/// The two calls the data Q&A flow makes. One instance is built at startup and
/// shared by every question.
#[async_trait]
pub trait SqlAssistant: Send + Sync {
    async fn generate_sql(&self, question: &str) -> Result<String>;
    async fn run_sql(&self, sql: &str) -> Result<QueryOutput>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranslatorError {
    #[error("text-to-SQL service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("text-to-SQL service error: {0}")]
    Remote(String),

    #[error("text-to-SQL service returned no SQL")]
    Empty,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    params: Vec<Value>,
}

#[derive(Deserialize, Debug)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<Value>,
}

/// Client for the `generate_sql` RPC method.
pub struct RemoteSqlGenerator {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl RemoteSqlGenerator {
    pub fn new(settings: &SqlSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.vanna_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: settings.vanna_endpoint.clone(),
            api_key: settings.vanna_api_key.clone(),
            model: settings.vanna_model.clone(),
        })
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint, model = %self.model))]
    pub async fn generate_sql(&self, question: &str) -> Result<String> {
        let payload = RpcRequest {
            method: "generate_sql",
            params: vec![serde_json::json!({ "question": question })],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("Vanna-Key", &self.api_key)
            .header("Vanna-Org", &self.model)
            .json(&payload)
            .send()
            .await
            .context(format!("Failed to send request to text-to-SQL service at {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(TranslatorError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .context("Failed to parse JSON response from text-to-SQL service")?;
        debug!(?rpc, "Received text-to-SQL response");

        if let Some(error) = rpc.error.filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(TranslatorError::Remote(message).into());
        }

        let sql = rpc
            .result
            .as_ref()
            .and_then(|r| r.get("sql"))
            .and_then(Value::as_str)
            .map(strip_code_fences)
            .unwrap_or_default();

        if sql.is_empty() {
            return Err(TranslatorError::Empty.into());
        }
        Ok(sql)
    }
}

/// Remove a surrounding ```sql ... ``` fence if the model added one.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    let inner = if let Some(s) = trimmed.strip_prefix("```sql") {
        s
    } else if let Some(s) = trimmed.strip_prefix("```") {
        s
    } else {
        trimmed
    };
    inner.strip_suffix("```").unwrap_or(inner).trim().to_string()
}

/// Remote SQL generation plus local execution.
pub struct VannaAssistant {
    generator: RemoteSqlGenerator,
    executor: SqliteExecutor,
}

impl VannaAssistant {
    pub fn new(generator: RemoteSqlGenerator, executor: SqliteExecutor) -> Self {
        Self {
            generator,
            executor,
        }
    }

    /// Build the generator and open (downloading if needed) the database.
    pub async fn connect(settings: &SqlSettings) -> Result<Self> {
        let generator = RemoteSqlGenerator::new(settings)?;
        let executor = SqliteExecutor::connect(settings)
            .await
            .context("Failed to open the SQL database")?;
        Ok(Self::new(generator, executor))
    }
}

#[async_trait]
impl SqlAssistant for VannaAssistant {
    async fn generate_sql(&self, question: &str) -> Result<String> {
        self.generator.generate_sql(question).await
    }

    async fn run_sql(&self, sql: &str) -> Result<QueryOutput> {
        self.executor.run(sql).await
    }
}
