//! Puertos de los colaboradores externos y resolución de las líneas de cada
//! cotización: caché → extracción de texto → LLM (texto o visión).

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::{ParsedQuoteData, VendorQuote};

/// Binario descargado de `fileUrl`.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedText {
    pub text: String,
    pub num_pages: usize,
}

impl ExtractedText {
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Poco texto por página ⇒ PDF escaneado (imagen).
    pub fn looks_scanned(&self, words_per_page: usize) -> bool {
        self.word_count() < words_per_page * self.num_pages.max(1)
    }
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument>;
}

/// Un error significa "usar el modo visión".
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, document: &FetchedDocument) -> Result<ExtractedText>;
}

#[async_trait]
pub trait LineItemExtractor: Send + Sync {
    async fn extract_from_text(&self, text: &str, document_name: &str) -> Result<ParsedQuoteData>;

    async fn extract_from_document(
        &self,
        document: &FetchedDocument,
        document_name: &str,
    ) -> Result<ParsedQuoteData>;
}

/// Caché de cotizaciones ya extraídas, indexada por `documentId`.
#[async_trait]
pub trait QuoteCache: Send + Sync {
    async fn get_cached(&self, document_id: &str) -> Result<Option<ParsedQuoteData>>;
    async fn put_cached(&self, document_id: &str, data: &ParsedQuoteData) -> Result<()>;
    async fn health_check(&self) -> Result<()>;
}

/// Caché en memoria del proceso.
#[derive(Debug, Default)]
pub struct MemoryQuoteCache {
    entries: Mutex<HashMap<String, ParsedQuoteData>>,
}

#[async_trait]
impl QuoteCache for MemoryQuoteCache {
    async fn get_cached(&self, document_id: &str) -> Result<Option<ParsedQuoteData>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(document_id).cloned())
    }

    async fn put_cached(&self, document_id: &str, data: &ParsedQuoteData) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(document_id.to_string(), data.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------
// RESOLUCIÓN POR COTIZACIÓN
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Cache,
    Text,
    Vision,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuoteResolution {
    Parsed {
        data: ParsedQuoteData,
        source: ResolutionSource,
    },
    /// No hubo líneas estructuradas pero sí texto extraído.
    RawText(String),
    Skipped(String),
}

impl QuoteResolution {
    pub fn freshly_parsed(&self) -> bool {
        matches!(
            self,
            QuoteResolution::Parsed {
                source: ResolutionSource::Text | ResolutionSource::Vision,
                ..
            }
        )
    }
}

fn non_empty(data: ParsedQuoteData) -> Option<ParsedQuoteData> {
    (!data.line_items.is_empty()).then_some(data)
}

pub struct QuoteParser<'a> {
    fetcher: &'a dyn DocumentFetcher,
    text_extractor: &'a dyn TextExtractor,
    line_items: &'a dyn LineItemExtractor,
    scanned_words_per_page: usize,
}

impl<'a> QuoteParser<'a> {
    pub fn new(
        fetcher: &'a dyn DocumentFetcher,
        text_extractor: &'a dyn TextExtractor,
        line_items: &'a dyn LineItemExtractor,
        scanned_words_per_page: usize,
    ) -> Self {
        Self {
            fetcher,
            text_extractor,
            line_items,
            scanned_words_per_page,
        }
    }

    /// Obtiene las líneas de una cotización. Nunca falla: cualquier error de
    /// un paso deja la cotización como texto plano o descartada.
    pub async fn resolve(
        &self,
        quote: &VendorQuote,
        cached: Option<&ParsedQuoteData>,
    ) -> QuoteResolution {
        let name = quote.display_name();

        if let Some(data) = quote
            .cached_line_items()
            .or(cached.filter(|d| !d.line_items.is_empty()))
        {
            info!("Cotización '{name}': {} líneas desde caché.", data.line_items.len());
            return QuoteResolution::Parsed {
                data: data.clone(),
                source: ResolutionSource::Cache,
            };
        }

        let Some(url) = quote.file_url.as_deref().filter(|u| !u.trim().is_empty()) else {
            return QuoteResolution::Skipped("sin fileUrl".to_string());
        };

        let document = match self.fetcher.fetch(url).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!("No se pudo descargar la cotización '{name}': {e:#}. Se omite.");
                return QuoteResolution::Skipped(format!("descarga fallida: {e}"));
            }
        };

        let extracted = match self.text_extractor.extract(&document).await {
            Ok(text) => Some(text),
            Err(e) => {
                info!("Sin texto extraíble en '{name}' ({e}); se usa el modo visión.");
                None
            }
        };

        if let Some(text) = extracted
            .as_ref()
            .filter(|t| !t.looks_scanned(self.scanned_words_per_page))
        {
            return match self.line_items.extract_from_text(&text.text, &name).await {
                Ok(data) => match non_empty(data) {
                    Some(data) => {
                        info!(
                            "Cotización '{name}': {} líneas extraídas del texto.",
                            data.line_items.len()
                        );
                        QuoteResolution::Parsed {
                            data,
                            source: ResolutionSource::Text,
                        }
                    }
                    None => {
                        warn!(
                            "El LLM no devolvió líneas para '{name}'; se envía el texto plano."
                        );
                        QuoteResolution::RawText(text.text.clone())
                    }
                },
                Err(e) => {
                    warn!(
                        "Extracción de líneas fallida para '{name}': {e:#}; \
                         se envía el texto plano."
                    );
                    QuoteResolution::RawText(text.text.clone())
                }
            };
        }

        let leftover_text = extracted
            .map(|t| t.text)
            .filter(|t| !t.trim().is_empty());

        match self.line_items.extract_from_document(&document, &name).await {
            Ok(data) => match non_empty(data) {
                Some(data) => {
                    info!(
                        "Cotización '{name}': {} líneas extraídas por visión.",
                        data.line_items.len()
                    );
                    QuoteResolution::Parsed {
                        data,
                        source: ResolutionSource::Vision,
                    }
                }
                None => fallback(&name, leftover_text, "el modo visión no devolvió líneas"),
            },
            Err(e) => {
                warn!("Extracción por visión fallida para '{name}': {e:#}");
                fallback(&name, leftover_text, "extracción por visión fallida")
            }
        }
    }
}

fn fallback(name: &str, text: Option<String>, reason: &str) -> QuoteResolution {
    match text {
        Some(text) => QuoteResolution::RawText(text),
        None => {
            warn!("Cotización '{name}' descartada: {reason}.");
            QuoteResolution::Skipped(reason.to_string())
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! Dobles de prueba compartidos por los tests del motor y de la API.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;

    use super::*;
    use crate::models::{DocumentInfo, QuoteLineItem};

    pub fn sample_data(part: &str) -> ParsedQuoteData {
        ParsedQuoteData {
            document_info: DocumentInfo {
                vendor_name: Some("Acme Traders".into()),
                ..Default::default()
            },
            line_items: vec![QuoteLineItem {
                part_name: part.to_string(),
                quantity: Some(1.0),
                unit_price: Some(10.0),
                ..Default::default()
            }],
        }
    }

    #[derive(Default)]
    pub struct FakeFetcher {
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    #[async_trait]
    impl DocumentFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(anyhow!("network unreachable: {url}"));
            }
            Ok(FetchedDocument {
                bytes: url.as_bytes().to_vec(),
                content_type: "application/pdf".into(),
            })
        }
    }

    /// Devuelve `text` con `pages` páginas, o error si `text` es `None`.
    #[derive(Default)]
    pub struct FakeText {
        pub text: Option<String>,
        pub pages: usize,
    }

    #[async_trait]
    impl TextExtractor for FakeText {
        async fn extract(&self, _document: &FetchedDocument) -> Result<ExtractedText> {
            match &self.text {
                Some(text) => Ok(ExtractedText {
                    text: text.clone(),
                    num_pages: self.pages,
                }),
                None => Err(anyhow!("not a pdf")),
            }
        }
    }

    #[derive(Default)]
    pub struct FakeExtractor {
        pub text_result: Option<ParsedQuoteData>,
        pub vision_result: Option<ParsedQuoteData>,
        pub text_calls: AtomicUsize,
        pub vision_calls: AtomicUsize,
    }

    impl FakeExtractor {
        pub fn total_calls(&self) -> usize {
            self.text_calls.load(Ordering::SeqCst) + self.vision_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LineItemExtractor for FakeExtractor {
        async fn extract_from_text(&self, _text: &str, _name: &str) -> Result<ParsedQuoteData> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            self.text_result.clone().ok_or_else(|| anyhow!("llm unavailable"))
        }

        async fn extract_from_document(
            &self,
            _document: &FetchedDocument,
            _name: &str,
        ) -> Result<ParsedQuoteData> {
            self.vision_calls.fetch_add(1, Ordering::SeqCst);
            self.vision_result.clone().ok_or_else(|| anyhow!("vision unavailable"))
        }
    }

    pub fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }
}
