use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::config::AppConfig;
use crate::llm::BomTextParser;
use crate::matching::QuoteReconciler;
use crate::quotes::{DocumentFetcher, LineItemExtractor, QuoteCache, TextExtractor};

/// Colaboradores del motor detrás de traits para poder sustituirlos en tests.
#[derive(Clone)]
pub struct Services {
    pub fetcher: Arc<dyn DocumentFetcher>,
    pub text_extractor: Arc<dyn TextExtractor>,
    pub line_items: Arc<dyn LineItemExtractor>,
    pub reconciler: Arc<dyn QuoteReconciler>,
    pub bom_text: Arc<dyn BomTextParser>,
    pub cache: Arc<dyn QuoteCache>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub services: Services,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        services: Services,
        shutdown_tx: Option<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            config,
            services,
            status: Arc::new(Mutex::new(Status {
                message: "Servidor listo.".to_string(),
                ..Default::default()
            })),
            shutdown_sender: Arc::new(Mutex::new(shutdown_tx)),
        }
    }

    pub fn update_status(&self, f: impl FnOnce(&mut Status)) {
        let mut status = self.status.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut status);
    }

    pub fn status_snapshot(&self) -> Status {
        self.status.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub is_busy: bool,
    pub checks_run: u64,
    pub message: String,
}
