//! Data Q&A flow: question → SQL → result table → classification and statistics.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, instrument};

use crate::stats::{describe, Description};
use crate::table::{DataTable, QueryOutput};
use crate::text_to_sql::SqlAssistant;
use crate::FailureKind;

/// Which collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    GenerateSql,
    RunSql,
}

/// A collaborator failure. Only the current question is abandoned.
#[derive(Debug, thiserror::Error)]
#[error("Error while processing the question: {message}")]
pub struct AnalysisError {
    pub stage: Stage,
    /// SQL generated before the failure, if any.
    pub sql: Option<String>,
    pub message: String,
    /// Full cause chain.
    pub detail: String,
}

impl AnalysisError {
    fn collaborator(stage: Stage, sql: Option<String>, err: anyhow::Error) -> Self {
        Self {
            stage,
            sql,
            message: err.to_string(),
            detail: format!("{err:?}"),
        }
    }

    pub fn kind(&self) -> FailureKind {
        FailureKind::Collaborator
    }
}

/// Classification of what `run_sql` returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnalysisOutcome {
    Rows(DataTable),
    EmptyTable,
    NonTabular(String),
}

pub fn classify_output(output: QueryOutput) -> AnalysisOutcome {
    match output {
        QueryOutput::Table(table) if !table.is_empty() => AnalysisOutcome::Rows(table),
        QueryOutput::Table(_) => AnalysisOutcome::EmptyTable,
        QueryOutput::Message(message) => AnalysisOutcome::NonTabular(message),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    pub sql: String,
    pub outcome: AnalysisOutcome,
}

pub struct DataAssistant {
    backend: Arc<dyn SqlAssistant>,
}

impl DataAssistant {
    pub fn new(backend: Arc<dyn SqlAssistant>) -> Self {
        Self { backend }
    }

    #[instrument(skip(self))]
    pub async fn analyze(&self, question: &str) -> Result<AnalysisReport, AnalysisError> {
        let sql = self.backend.generate_sql(question).await.map_err(|e| {
            error!(error = ?e, "SQL generation failed");
            AnalysisError::collaborator(Stage::GenerateSql, None, e)
        })?;
        info!(%sql, "Generated SQL");

        let output = match self.backend.run_sql(&sql).await {
            Ok(output) => output,
            Err(e) => {
                error!(error = ?e, %sql, "SQL execution failed");
                return Err(AnalysisError::collaborator(Stage::RunSql, Some(sql), e));
            }
        };

        Ok(AnalysisReport {
            sql,
            outcome: classify_output(output),
        })
    }

    /// Run the flow and shape the result for display.
    pub async fn analyze_view(&self, question: &str) -> AnalysisView {
        AnalysisView::from(self.analyze(question).await)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsView {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl From<&Description> for StatsView {
    fn from(description: &Description) -> Self {
        Self {
            headers: description.headers(),
            rows: description.rows(),
        }
    }
}

/// What the analysis page shows for a finished question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisView {
    Table {
        sql: String,
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
        stats: Option<StatsView>,
        summary: String,
    },
    Empty {
        sql: String,
    },
    NonTabular {
        sql: String,
        value: String,
    },
    Error {
        sql: Option<String>,
        message: String,
        detail: String,
    },
}

impl From<Result<AnalysisReport, AnalysisError>> for AnalysisView {
    fn from(result: Result<AnalysisReport, AnalysisError>) -> Self {
        match result {
            Ok(AnalysisReport {
                sql,
                outcome: AnalysisOutcome::Rows(table),
            }) => AnalysisView::Table {
                stats: describe(&table).as_ref().map(StatsView::from),
                summary: table.summary(),
                rows: table
                    .rows
                    .iter()
                    .map(|row| row.iter().map(ToString::to_string).collect())
                    .collect(),
                columns: table.columns,
                sql,
            },
            Ok(AnalysisReport {
                sql,
                outcome: AnalysisOutcome::EmptyTable,
            }) => AnalysisView::Empty { sql },
            Ok(AnalysisReport {
                sql,
                outcome: AnalysisOutcome::NonTabular(value),
            }) => AnalysisView::NonTabular { sql, value },
            Err(err) => AnalysisView::Error {
                message: err.to_string(),
                sql: err.sql,
                detail: err.detail,
            },
        }
    }
}
