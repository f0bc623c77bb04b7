use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    serve, Json, Router,
};
use minijinja::context;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{future::Future, net::SocketAddr, path::Path};
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::app_state::AppState;
use crate::config::ServerSettings;
use crate::constants::REPORT_FRAME_HEIGHT;

#[derive(Debug, Deserialize)]
pub struct QuestionParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, thiserror::Error)]
pub enum WebError {
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        error!("Failed to get or render template: {}", self);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Html(format!("Internal Server Error: {}", self)),
        )
            .into_response()
    }
}

fn render(state: &AppState, name: &str, ctx: minijinja::Value) -> Result<Html<String>, WebError> {
    let env = state.templates.acquire_env()?;
    let template = env.get_template(name)?;
    Ok(Html(template.render(ctx)?))
}

async fn report_handler(
    State(state): State<AppState>,
    Query(params): Query<QuestionParams>,
) -> Result<Html<String>, WebError> {
    // Empty input is never sent; whitespace-only input is.
    let (notices, view) = if params.q.is_empty() {
        (Vec::new(), None)
    } else {
        let (signals, view) = state.reports.lookup_collected(&params.q).await;
        // The terminal signal is shown through the error view itself.
        let notices: Vec<String> = signals
            .iter()
            .filter(|s| !s.is_terminal())
            .map(|s| s.describe())
            .collect();
        (notices, Some(view))
    };

    render(
        &state,
        "report.html",
        context! {
            page => "report",
            query => params.q,
            notices => notices,
            view => view,
            frame_height => REPORT_FRAME_HEIGHT,
        },
    )
}

async fn analysis_handler(
    State(state): State<AppState>,
    Query(params): Query<QuestionParams>,
) -> Result<Html<String>, WebError> {
    let view = if params.q.is_empty() {
        None
    } else {
        Some(state.assistant.analyze_view(&params.q).await)
    };

    render(
        &state,
        "analysis.html",
        context! {
            page => "analysis",
            query => params.q,
            view => view,
        },
    )
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/report") }))
        .route("/report", get(report_handler))
        .route("/analysis", get(analysis_handler))
        .route("/health", get(health_handler))
        // Route for static files must be nested under a path like /static
        // or it will conflict with other routes.
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http())) // Add request logging
}

pub async fn start_web_server(
    settings: &ServerSettings,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let app = build_router(state, &settings.static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .context("Web server failed")?;

    Ok(())
}
