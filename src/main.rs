// Módulos de la aplicación
mod api;
mod app_state;
mod compliance;
mod config;
mod error;
mod extract;
mod fetch;
mod llm;
mod matching;
mod models;
mod neo4j_client;
mod quotes;
mod report;
mod validation;

use std::sync::Arc;

use crate::app_state::{AppState, Services};
use crate::config::ReconcilerKind;
use crate::matching::{FuzzyReconciler, QuoteReconciler};
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().expect("Error al cargar la configuración");
    if !cfg.ai_configured() {
        warn!(
            "IA no configurada: /api/compliance-check exigirá OPENAI_API_KEY con RECONCILER=llm."
        );
    }

    // 3. Conectar a Neo4j (caché de cotizaciones) y asegurar esquemas
    let graph = neo4j_client::connect_from_config(&cfg)
        .await
        .expect("Error conectando a Neo4j");
    neo4j_client::ensure_schema(&graph)
        .await
        .expect("Error asegurando el esquema de Neo4j");
    let graph = Arc::new(graph);

    // 4. Inicializar gestor de LLMs y colaboradores del motor
    let llm_manager =
        Arc::new(llm::LlmManager::from_config(&cfg).expect("Error inicializando LLM Manager"));
    let reconciler: Arc<dyn QuoteReconciler> = match cfg.reconciler {
        ReconcilerKind::Llm => llm_manager.clone(),
        ReconcilerKind::Fuzzy => Arc::new(FuzzyReconciler),
    };
    info!("Conciliador de cotizaciones: {:?}", cfg.reconciler);

    let services = Services {
        fetcher: Arc::new(
            fetch::HttpDocumentFetcher::new(cfg.fetch_timeout_secs)
                .expect("Error creando el cliente HTTP"),
        ),
        text_extractor: Arc::new(extract::PdfTextExtractor),
        line_items: llm_manager.clone(),
        reconciler,
        bom_text: llm_manager,
        cache: Arc::new(neo4j_client::Neo4jQuoteCache::new(graph)),
    };

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState::new(cfg.clone(), services, Some(shutdown_tx));

    // 6. Configurar el router de la API
    let app = api::create_router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 7. Iniciar el servidor
    let server_addr = &cfg.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .expect("No se pudo abrir el puerto del servidor");
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await
        .expect("Error en el servidor HTTP");

    info!("✅ Servidor cerrado correctamente.");
}
