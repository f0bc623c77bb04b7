use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use tracing::{debug, info, instrument};

use crate::config::SqlSettings;
use crate::table::{CellValue, DataTable, QueryOutput};

/// Runs generated SQL against a SQLite database.
#[derive(Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    pub async fn connect(settings: &SqlSettings) -> Result<Self> {
        let path = resolve_database(&settings.database, &settings.cache_dir).await?;
        Self::open(&path, !settings.allow_writes).await
    }

    pub async fn open(path: &Path, read_only: bool) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(read_only);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .context(format!("Failed to open SQLite database {}", path.display()))?;
        info!(path = %path.display(), read_only, "Opened SQLite database");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn run(&self, sql: &str) -> Result<QueryOutput> {
        if !self.returns_rows(sql).await? {
            let result = sqlx::query(sql).execute(&self.pool).await?;
            return Ok(QueryOutput::Message(format!(
                "{} row(s) affected",
                result.rows_affected()
            )));
        }

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        debug!(rows = rows.len(), "Query returned rows");
        Ok(QueryOutput::Table(rows_to_table(&rows)?))
    }

    /// Whether SQLite reports result columns for the statement once prepared.
    /// Leading comments, CTEs and `RETURNING` clauses are all handled by the parser.
    pub async fn returns_rows(&self, sql: &str) -> Result<bool> {
        let statement = (&self.pool).prepare(sql).await?;
        Ok(!statement.columns().is_empty())
    }
}

fn rows_to_table(rows: &[SqliteRow]) -> Result<DataTable> {
    let columns = rows
        .first()
        .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
        .unwrap_or_default();

    let cells = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| cell_at(row, i)).collect::<Result<Vec<_>>>())
        .collect::<Result<Vec<Vec<CellValue>>>>()?;

    Ok(DataTable::new(columns, cells))
}

/// Decode by the value's own storage class; SQLite columns are not uniformly typed.
fn cell_at(row: &SqliteRow, index: usize) -> Result<CellValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(CellValue::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();
    let cell = match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => CellValue::Integer(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" | "NUMERIC" => CellValue::Real(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            CellValue::Text(format!("<{} bytes>", bytes.len()))
        }
        _ => CellValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(cell)
}

/// Local path for the database. URLs are downloaded into `cache_dir` the first
/// time and reused afterwards.
pub async fn resolve_database(source: &str, cache_dir: &Path) -> Result<PathBuf> {
    if !(source.starts_with("http://") || source.starts_with("https://")) {
        return Ok(PathBuf::from(source));
    }

    let file_name = source
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("database.sqlite");
    let target = cache_dir.join(file_name);
    if tokio::fs::try_exists(&target).await.unwrap_or(false) {
        debug!(path = %target.display(), "Using cached database");
        return Ok(target);
    }

    info!(%source, path = %target.display(), "Downloading database");
    tokio::fs::create_dir_all(cache_dir)
        .await
        .context(format!("Failed to create cache directory {}", cache_dir.display()))?;

    let response = reqwest::get(source)
        .await
        .context(format!("Failed to download database from {}", source))?
        .error_for_status()
        .context(format!("Database download from {} was rejected", source))?;
    let bytes = response.bytes().await?;

    // The target path only ever holds a complete download.
    let partial = target.with_extension("partial");
    tokio::fs::write(&partial, &bytes).await?;
    tokio::fs::rename(&partial, &target).await?;
    Ok(target)
}
