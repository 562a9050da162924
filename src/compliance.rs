//! Motor de cumplimiento.
//!
//! Flujo:
//!   1. Pasada de validación sobre todos los ítems (siempre).
//!   2. Resolución de las líneas de cada cotización, en orden y de una en una
//!      salvo que `quote_concurrency` diga otra cosa.
//!   3. Una única llamada de conciliación con todas las cotizaciones resueltas.
//!   4. Ensamblado del informe.
//!
//! El motor no toca el almacén: recibe una instantánea de la caché y devuelve
//! las escrituras pendientes en `cache_writes`.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::EnginePolicy;
use crate::matching::{
    translate_reconciliation, BomItemSummary, QuoteAnalysis, QuoteReconciler, QuoteSummary,
};
use crate::models::{ComplianceReport, ComplianceRequest, Issue, ParsedQuoteData, VendorQuote};
use crate::quotes::{QuoteCache, QuoteParser, QuoteResolution, ResolutionSource};
use crate::report::{assemble_report, QuoteCounters};
use crate::validation::validate_items;

/// Escritura de caché pendiente tras extraer una cotización.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheWrite {
    pub document_id: String,
    pub data: ParsedQuoteData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceOutcome {
    pub report: ComplianceReport,
    pub quote_analysis: Vec<QuoteAnalysis>,
    pub parsed_quote_data: BTreeMap<String, ParsedQuoteData>,
    #[serde(skip)]
    pub cache_writes: Vec<CacheWrite>,
}

#[derive(Debug, Default)]
struct MatchingPass {
    issues: Vec<Issue>,
    counters: QuoteCounters,
    quote_analysis: Vec<QuoteAnalysis>,
    parsed_quote_data: BTreeMap<String, ParsedQuoteData>,
    cache_writes: Vec<CacheWrite>,
}

pub struct ComplianceEngine<'a> {
    parser: QuoteParser<'a>,
    reconciler: &'a dyn QuoteReconciler,
    policy: EnginePolicy,
}

impl<'a> ComplianceEngine<'a> {
    pub fn new(
        parser: QuoteParser<'a>,
        reconciler: &'a dyn QuoteReconciler,
        policy: EnginePolicy,
    ) -> Self {
        Self {
            parser,
            reconciler,
            policy,
        }
    }

    pub async fn run(
        &self,
        request: &ComplianceRequest,
        cache_snapshot: &HashMap<String, ParsedQuoteData>,
    ) -> ComplianceOutcome {
        let started = Instant::now();
        let created_at = Utc::now();

        // Sin análisis de documentos las cotizaciones no cuentan como enlace.
        let linked_quotes: &[VendorQuote] = if request.parse_documents {
            &request.vendor_quotes
        } else {
            &[]
        };
        let mut issues = validate_items(&request.bom_items, linked_quotes);
        let validation_count = issues.len();

        let matching = if request.parse_documents && !request.vendor_quotes.is_empty() {
            self.matching_pass(request, cache_snapshot).await
        } else {
            MatchingPass::default()
        };
        issues.extend(matching.issues);

        let report = assemble_report(
            &request.project_id,
            request.bom_items.len(),
            issues,
            matching.counters,
            created_at,
            started.elapsed().as_millis() as u64,
        );

        info!(
            project_id = %report.project_id,
            items = report.total_items_checked,
            validation_issues = validation_count,
            total_issues = report.total_issues,
            quotes_analyzed = report.quotes_analyzed,
            elapsed_ms = report.processing_time_ms,
            "Comprobación de cumplimiento terminada"
        );

        ComplianceOutcome {
            report,
            quote_analysis: matching.quote_analysis,
            parsed_quote_data: matching.parsed_quote_data,
            cache_writes: matching.cache_writes,
        }
    }

    async fn matching_pass(
        &self,
        request: &ComplianceRequest,
        cache_snapshot: &HashMap<String, ParsedQuoteData>,
    ) -> MatchingPass {
        let mut pass = MatchingPass::default();

        // Los futuros se crean antes del stream y son perezosos: `buffered` limita cuántos
        // avanzan a la vez y conserva el orden de entrada.
        let pending: Vec<_> = request
            .vendor_quotes
            .iter()
            .map(|quote| self.resolve_one(quote, cache_snapshot))
            .collect();
        let resolutions: Vec<(&VendorQuote, QuoteResolution)> = stream::iter(pending)
            .buffered(self.policy.quote_concurrency.max(1))
            .collect()
            .await;

        let mut summaries = Vec::new();
        for (quote, resolution) in resolutions {
            if resolution.freshly_parsed() {
                pass.counters.documents_parsed += 1;
            }
            match resolution {
                QuoteResolution::Parsed { data, source } => {
                    if source != ResolutionSource::Cache {
                        pass.cache_writes.push(CacheWrite {
                            document_id: quote.document_id.clone(),
                            data: data.clone(),
                        });
                    }
                    summaries.push(QuoteSummary {
                        document_id: quote.document_id.clone(),
                        document_name: quote.display_name(),
                        vendor_name: data.document_info.vendor_name.clone(),
                        linked_bom_items: quote.linked_bom_items.clone(),
                        line_items: Some(data.line_items.clone()),
                        raw_text: None,
                    });
                    pass.parsed_quote_data.insert(quote.document_id.clone(), data);
                }
                QuoteResolution::RawText(text) => summaries.push(QuoteSummary {
                    document_id: quote.document_id.clone(),
                    document_name: quote.display_name(),
                    vendor_name: None,
                    linked_bom_items: quote.linked_bom_items.clone(),
                    line_items: None,
                    raw_text: Some(text),
                }),
                QuoteResolution::Skipped(reason) => {
                    info!("Cotización '{}' omitida: {reason}", quote.display_name());
                }
            }
        }

        pass.counters.quotes_analyzed = summaries.len();
        if summaries.is_empty() {
            return pass;
        }

        let items: Vec<BomItemSummary> =
            request.bom_items.iter().map(BomItemSummary::from).collect();
        let threshold = request
            .settings
            .match_score_threshold
            .unwrap_or(self.policy.match_score_threshold)
            .min(100);

        match self.reconciler.reconcile(&items, &summaries, threshold).await {
            Ok(result) => {
                let outcome = translate_reconciliation(&result, &request.bom_items, threshold);
                pass.counters.quotes_matched = outcome.quotes_matched;
                pass.issues = outcome.issues;
                pass.quote_analysis = result.quote_analysis;
            }
            Err(e) => {
                // La IA no disponible degrada el informe a sólo validación.
                warn!(
                    "Conciliación de cotizaciones fallida, se devuelve sólo la validación: {e:#}"
                );
            }
        }

        pass
    }

    async fn resolve_one<'q>(
        &'q self,
        quote: &'q VendorQuote,
        cache_snapshot: &'q HashMap<String, ParsedQuoteData>,
    ) -> (&'q VendorQuote, QuoteResolution) {
        let resolution = self
            .parser
            .resolve(quote, cache_snapshot.get(&quote.document_id))
            .await;
        (quote, resolution)
    }
}

/// Lee de la caché las cotizaciones que no traen líneas en la petición.
pub async fn load_cache_snapshot(
    cache: &dyn QuoteCache,
    quotes: &[VendorQuote],
) -> HashMap<String, ParsedQuoteData> {
    let mut snapshot = HashMap::new();
    for quote in quotes.iter().filter(|q| q.cached_line_items().is_none()) {
        match cache.get_cached(&quote.document_id).await {
            Ok(Some(data)) => {
                snapshot.insert(quote.document_id.clone(), data);
            }
            Ok(None) => {}
            Err(e) => warn!("No se pudo leer la caché de '{}': {e:#}", quote.document_id),
        }
    }
    snapshot
}

/// Aplica las escrituras de caché; un fallo nunca invalida la comprobación.
pub async fn apply_cache_writes(cache: &dyn QuoteCache, writes: &[CacheWrite]) -> usize {
    let mut written = 0;
    for write in writes {
        match cache.put_cached(&write.document_id, &write.data).await {
            Ok(()) => written += 1,
            Err(e) => warn!("No se pudo cachear la cotización '{}': {e:#}", write.document_id),
        }
    }
    written
}
