use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

use askboard::analysis::{AnalysisView, DataAssistant};
use askboard::app_state::{create_minijinja_env, AppState};
use askboard::config::{ChatSettings, ServerSettings, SqlSettings};
use askboard::report::{ReportLookup, ReportView};
use askboard::retry::LookupSignal;
use askboard::text_to_sql::{SqlAssistant, VannaAssistant};
use askboard::web_server;

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the dashboard web server.
    Start {
        #[command(flatten)]
        server: ServerSettings,
        #[command(flatten)]
        chat: ChatSettings,
        #[command(flatten)]
        sql: SqlSettings,
    },
    /// Ask the chat endpoint for a report URL and print the result.
    Report {
        /// The report question, sent as-is.
        query: String,
        #[command(flatten)]
        chat: ChatSettings,
    },
    /// Turn a question into SQL, run it, and print the result table.
    Analyze {
        /// The data question, sent as-is.
        question: String,
        #[command(flatten)]
        sql: SqlSettings,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for environment variables like API keys)
    dotenvy::dotenv().ok();

    askboard::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { server, chat, sql } => run_server(server, chat, sql).await,
        Commands::Report { query, chat } => run_report(&query, &chat).await,
        Commands::Analyze { question, sql } => run_analyze(&question, &sql).await,
    }
}

async fn run_server(server: ServerSettings, chat: ChatSettings, sql: SqlSettings) -> Result<()> {
    chat.validate()?;
    sql.validate()?;
    info!("Starting askboard on port {}...", server.port);

    let reports = ReportLookup::from_settings(&chat).context("Failed to build the chat client")?;
    let backend: Arc<dyn SqlAssistant> = Arc::new(
        VannaAssistant::connect(&sql)
            .await
            .context("Failed to initialize the text-to-SQL backend")?,
    );
    let state = AppState::new(
        create_minijinja_env(&server.templates_dir),
        reports,
        DataAssistant::new(backend),
    );

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
            std::future::pending::<()>().await;
        }
        info!("Ctrl-C received, initiating shutdown...");
    };

    web_server::start_web_server(&server, state, shutdown).await?;
    info!("Shutdown complete.");
    Ok(())
}

async fn run_report(query: &str, chat: &ChatSettings) -> Result<()> {
    chat.validate()?;
    if query.is_empty() {
        bail!("The report question must not be empty");
    }
    let lookup = ReportLookup::from_settings(chat)?;

    // Print progress as it happens instead of after the last retry.
    let (tx, mut rx) = mpsc::unbounded_channel::<LookupSignal>();
    let printer = tokio::spawn(async move {
        while let Some(signal) = rx.recv().await {
            eprintln!("{}", signal.describe());
        }
    });

    let outcome = lookup.lookup(query, &tx).await;
    drop(tx);
    printer.await.ok();

    match ReportView::from(outcome) {
        ReportView::Frame { url } => {
            println!("Report URL: {url}");
            Ok(())
        }
        ReportView::Text { content } => {
            println!("No report URL was generated. The AI replied:");
            println!("{content}");
            Ok(())
        }
        ReportView::Warning { raw } => {
            eprintln!("The AI response was not in the expected format:");
            println!("{raw}");
            Ok(())
        }
        // Already printed by the signal printer.
        ReportView::Error { .. } => std::process::exit(1),
    }
}

async fn run_analyze(question: &str, sql: &SqlSettings) -> Result<()> {
    sql.validate()?;
    if question.is_empty() {
        bail!("The data question must not be empty");
    }
    let backend = VannaAssistant::connect(sql)
        .await
        .context("Failed to initialize the text-to-SQL backend")?;
    let assistant = DataAssistant::new(Arc::new(backend));

    match assistant.analyze_view(question).await {
        AnalysisView::Table {
            sql,
            columns,
            rows,
            stats,
            summary,
        } => {
            println!("Generated SQL:\n{sql}\n");
            println!("{}", columns.join("\t"));
            for row in rows {
                println!("{}", row.join("\t"));
            }
            if let Some(stats) = stats {
                println!("\nStatistics:");
                println!("{}", stats.headers.join("\t"));
                for row in stats.rows {
                    println!("{}", row.join("\t"));
                }
            }
            println!("\n{summary}");
        }
        AnalysisView::Empty { sql } => {
            println!("Generated SQL:\n{sql}\n");
            println!("The query returned an empty table. Try another question.");
        }
        AnalysisView::NonTabular { sql, value } => {
            println!("Generated SQL:\n{sql}\n");
            println!("{value}");
            println!("The query did not return tabular data.");
        }
        AnalysisView::Error {
            sql,
            message,
            detail,
        } => {
            if let Some(sql) = sql {
                eprintln!("Generated SQL:\n{sql}\n");
            }
            eprintln!("{message}");
            eprintln!("Details:\n{detail}");
            std::process::exit(1);
        }
    }
    Ok(())
}
