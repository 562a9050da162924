use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{
    app_state::{AppState, Status},
    compliance::{apply_cache_writes, load_cache_snapshot, ComplianceEngine, ComplianceOutcome},
    config::ReconcilerKind,
    error::ComplianceError,
    models::{BomItemDraft, ComplianceRequest, ParsedQuoteData, VendorQuote},
    neo4j_client::browser_url,
    quotes::{QuoteParser, QuoteResolution, ResolutionSource},
};

// --- Payloads y Respuestas de la API ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParseQuotePayload {
    document_id: Option<String>,
    document_name: Option<String>,
    file_url: Option<String>,
    /// Ignora la caché y vuelve a extraer.
    force: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ParseBomTextPayload {
    text: String,
}

#[derive(Debug, Serialize)]
pub struct ComplianceResponse {
    success: bool,
    #[serde(flatten)]
    outcome: ComplianceOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseQuoteResponse {
    success: bool,
    document_id: String,
    source: ResolutionSource,
    parsed_quote_data: ParsedQuoteData,
}

#[derive(Debug, Serialize)]
pub struct ParseBomTextResponse {
    success: bool,
    items: Vec<BomItemDraft>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/compliance-check", post(compliance_check_handler))
        .route("/api/parse-quote", post(parse_quote_handler))
        .route("/api/parse-bom-text", post(parse_bom_text_handler))
        .route("/api/status", get(status_handler))
        .route("/api/neo4j-info", get(neo4j_info_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

fn quote_parser(state: &AppState) -> QuoteParser<'_> {
    let services = &state.services;
    QuoteParser::new(
        services.fetcher.as_ref(),
        services.text_extractor.as_ref(),
        services.line_items.as_ref(),
        state.config.policy.scanned_words_per_page,
    )
}

fn rejection_to_input(rejection: JsonRejection) -> ComplianceError {
    ComplianceError::InvalidInput(rejection.body_text())
}

// --- Handlers ---

#[axum::debug_handler]
async fn compliance_check_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<ComplianceResponse>, ComplianceError> {
    let Json(body) = payload.map_err(rejection_to_input)?;
    let request = ComplianceRequest::from_json(body)?;

    if state.config.reconciler == ReconcilerKind::Llm && !state.config.ai_configured() {
        return Err(ComplianceError::Configuration(
            "OPENAI_API_KEY is not set".to_string(),
        ));
    }

    info!(
        "Comprobación de cumplimiento para '{}': {} ítems, {} cotizaciones",
        request.project_id,
        request.bom_items.len(),
        request.vendor_quotes.len()
    );
    state.update_status(|status| {
        status.is_busy = true;
        status.message = format!("Comprobando el proyecto {}...", request.project_id);
    });

    let services = &state.services;
    let engine = ComplianceEngine::new(
        quote_parser(&state),
        services.reconciler.as_ref(),
        state.config.policy.clone(),
    );
    let ceiling = state.config.request_timeout_secs;
    let run = async {
        let snapshot = if request.parse_documents {
            load_cache_snapshot(services.cache.as_ref(), &request.vendor_quotes).await
        } else {
            Default::default()
        };
        engine.run(&request, &snapshot).await
    };

    let outcome = match tokio::time::timeout(Duration::from_secs(ceiling), run).await {
        Ok(outcome) => outcome,
        Err(_) => {
            error!("La comprobación de '{}' superó {ceiling}s", request.project_id);
            state.update_status(|status| {
                status.is_busy = false;
                status.message = format!("Tiempo agotado en el proyecto {}", request.project_id);
            });
            return Err(ComplianceError::Timeout(ceiling));
        }
    };

    let written = apply_cache_writes(services.cache.as_ref(), &outcome.cache_writes).await;
    if written > 0 {
        info!("{written} cotizaciones guardadas en caché");
    }

    let report = &outcome.report;
    state.update_status(|status| {
        status.is_busy = false;
        status.checks_run += 1;
        status.message = format!(
            "Proyecto {}: {} incidencias en {} ítems ({} ms)",
            report.project_id,
            report.total_issues,
            report.total_items_checked,
            report.processing_time_ms
        );
    });

    Ok(Json(ComplianceResponse {
        success: true,
        outcome,
    }))
}

#[axum::debug_handler]
async fn parse_quote_handler(
    State(state): State<AppState>,
    payload: Result<Json<ParseQuotePayload>, JsonRejection>,
) -> Result<Json<ParseQuoteResponse>, ComplianceError> {
    let Json(payload) = payload.map_err(rejection_to_input)?;
    let document_id = payload
        .document_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| ComplianceError::InvalidInput("documentId is required".to_string()))?;
    let file_url = payload
        .file_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ComplianceError::InvalidInput("fileUrl is required".to_string()))?;

    let cache = state.services.cache.as_ref();
    let cached = if payload.force {
        None
    } else {
        cache.get_cached(&document_id).await.unwrap_or_else(|e| {
            warn!("No se pudo leer la caché de '{document_id}': {e:#}");
            None
        })
    };

    let quote = VendorQuote {
        document_id: document_id.clone(),
        document_name: payload.document_name,
        file_url: Some(file_url),
        ..Default::default()
    };

    match quote_parser(&state).resolve(&quote, cached.as_ref()).await {
        QuoteResolution::Parsed { data, source } => {
            if source != ResolutionSource::Cache {
                if let Err(e) = cache.put_cached(&document_id, &data).await {
                    warn!("No se pudo cachear la cotización '{document_id}': {e:#}");
                }
            }
            Ok(Json(ParseQuoteResponse {
                success: true,
                document_id,
                source,
                parsed_quote_data: data,
            }))
        }
        QuoteResolution::RawText(_) => Err(ComplianceError::Extraction(
            "text was extracted but no line items were recognised".to_string(),
        )),
        QuoteResolution::Skipped(reason) => Err(ComplianceError::Extraction(reason)),
    }
}

#[axum::debug_handler]
async fn parse_bom_text_handler(
    State(state): State<AppState>,
    payload: Result<Json<ParseBomTextPayload>, JsonRejection>,
) -> Result<Json<ParseBomTextResponse>, ComplianceError> {
    let Json(payload) = payload.map_err(rejection_to_input)?;
    if payload.text.trim().is_empty() {
        return Err(ComplianceError::InvalidInput("text is required".to_string()));
    }

    let items = state
        .services
        .bom_text
        .parse_bom_text(&payload.text)
        .await
        .map_err(|e| {
            error!("Error al analizar el texto de la BOM: {e:#}");
            ComplianceError::Internal(e)
        })?;
    info!("Texto de BOM convertido en {} ítems", items.len());

    Ok(Json(ParseBomTextResponse {
        success: true,
        items,
    }))
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.status_snapshot())
}

#[axum::debug_handler]
async fn neo4j_info_handler(State(state): State<AppState>) -> Result<Json<Value>, ComplianceError> {
    match state.services.cache.health_check().await {
        Ok(()) => Ok(Json(json!({
            "status": "ok",
            "browser_url": browser_url(&state.config.neo4j_uri),
        }))),
        Err(e) => {
            error!("Error en el health check de Neo4j: {e:#}");
            Err(ComplianceError::Internal(e))
        }
    }
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    let sender = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take();
    if let Some(sender) = sender {
        let _ = sender.send(());
    }
    StatusCode::OK
}
