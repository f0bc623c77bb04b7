use std::path::Path;
use std::sync::Arc;

use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;

use crate::analysis::DataAssistant;
use crate::report::ReportLookup;

/// Shared, read-only state handed to every request.
///
/// Both flows are built once at startup; per-query state never lives here.
#[derive(Clone)]
pub struct AppState {
    pub templates: Arc<AutoReloader>,
    pub reports: Arc<ReportLookup>,
    pub assistant: Arc<DataAssistant>,
}

impl AppState {
    pub fn new(templates: AutoReloader, reports: ReportLookup, assistant: DataAssistant) -> Self {
        Self {
            templates: Arc::new(templates),
            reports: Arc::new(reports),
            assistant: Arc::new(assistant),
        }
    }
}

/// Template environment that picks up edits under `dir` without a restart.
pub fn create_minijinja_env(dir: &Path) -> AutoReloader {
    let dir = dir.to_path_buf();
    AutoReloader::new(move |notifier| {
        // Create the loader *inside* the closure
        let mut env = Environment::new();
        env.set_loader(path_loader(&dir));
        notifier.watch_path(&dir, true);
        Ok(env)
    })
}
