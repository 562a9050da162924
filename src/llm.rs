//! Abstracción sobre Rig para trabajar con distintos proveedores de LLM.
//! De momento se implementa OpenAI; Gemini/Ollama quedan preparados para el futuro.
//!
//! Tres usos: extraer líneas de cotizaciones (texto o visión), conciliar
//! cotizaciones con la BOM y convertir texto libre en ítems de BOM.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rig::completion::Prompt;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{AppConfig, LlmProvider};
use crate::extract::is_pdf;
use crate::matching::{BomItemSummary, QuoteReconciler, QuoteSummary, ReconciliationResult};
use crate::models::{BomItemDraft, ParsedQuoteData};
use crate::quotes::{FetchedDocument, LineItemExtractor};

/// Límite de texto plano por cotización enviado a la conciliación.
const MAX_RAW_TEXT_CHARS: usize = 12_000;

const QUOTE_EXTRACTION_PROMPT: &str = r#"
You extract structured data from vendor quotations (often Indian suppliers, amounts in INR).
Read the document and return every priced line item.
- partName: the item description as written on the quote.
- partNumber / make: manufacturer part number and brand when present.
- quantity, unitPrice, totalPrice: plain numbers, no currency symbols or thousands separators.
- hsnCode: HSN/SAC code if listed.
- documentInfo: vendor name, quote number, dates, currency and grand total.
Ignore taxes, freight and terms rows unless they are priced line items.
The output MUST be a single valid JSON object matching this JSON Schema.
No explanations, only the JSON.
"#;

const RECONCILIATION_PROMPT: &str = r#"
You reconcile vendor quotations against a bill of materials (BOM).
For every quote, match each quote line to at most one BOM item using part numbers first,
then make and name similarity. Score each match 0-100.
A line whose best score is below "minMatchScore" is unmatched: leave its bomItemId null.
For matched lines list concrete mismatches as short English sentences. A sentence about price
MUST contain the word "price"; a sentence about quantity MUST contain the word "quantity".
List BOM item ids linked to the quote that have no matching line in "unmatchedBOMItems".
Suggest field corrections (name, description, sku, make) only when the quote clearly
shows a better value.

The output MUST be a single valid JSON object with this shape:
{"quoteAnalysis":[{"documentId":"","documentName":"","vendorName":"","lineMatches":[{"quoteLineItem":{},"bomItemId":null,"bomItemName":null,"matchScore":0,"matchReasons":[],"mismatches":[]}],"unmatchedQuoteLines":0,"unmatchedBOMItems":[]}],"suggestedFixes":[{"bomItemId":"","field":"","currentValue":"","suggestedValue":"","reason":""}]}
No explanations, only the JSON.
"#;

const BOM_TEXT_PROMPT: &str = r#"
You convert free-form bill of materials text (pasted tables, emails, spreadsheets) into BOM items.
One object per distinct item. itemType is "service" for labour, installation or other services,
otherwise "component". Numbers are plain numbers.
The output MUST be a single valid JSON object {"items": [...]} where each item matches
this JSON Schema.
No explanations, only the JSON.
"#;

/// Convierte texto libre de una BOM en ítems propuestos.
#[async_trait]
pub trait BomTextParser: Send + Sync {
    async fn parse_bom_text(&self, text: &str) -> Result<Vec<BomItemDraft>>;
}

#[derive(Debug, Deserialize, Default)]
struct BomTextResponse {
    #[serde(default)]
    items: Vec<BomItemDraft>,
}

/// Gestor de LLMs.
#[derive(Debug, Clone)]
pub struct LlmManager {
    pub provider: LlmProvider,
    pub chat_model: String,
    pub vision_model: String,
    api_key: Option<String>,
    base_url: String,
    http: reqwest::Client,
}

impl LlmManager {
    /// Construye el manager a partir de la configuración.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            provider: cfg.llm_provider.clone(),
            chat_model: cfg.llm_chat_model.clone(),
            vision_model: cfg.llm_vision_model.clone(),
            api_key: cfg.openai_api_key.clone(),
            base_url: cfg.openai_base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    fn ensure_openai(&self) -> Result<&str> {
        if self.provider != LlmProvider::OpenAI {
            bail!("Proveedor LLM {:?} aún no implementado", self.provider);
        }
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Falta OPENAI_API_KEY en el entorno"))
    }

    fn chat_model_name(&self) -> &str {
        if self.chat_model.is_empty() {
            "gpt-4o-mini"
        } else {
            self.chat_model.as_str()
        }
    }

    // ---------------------------------------------------------------------
    // CHAT / COMPLETION
    // ---------------------------------------------------------------------

    /// Lanza un prompt con Rig y parsea la respuesta como JSON.
    async fn prompt_json<T: DeserializeOwned>(&self, preamble: &str, prompt: &str) -> Result<T> {
        use rig::providers::openai;
        // Trait para client.agent(...)
        use rig::client::CompletionClient as _;

        self.ensure_openai()?;
        let client = openai::Client::from_env();

        let agent = client
            .agent(self.chat_model_name())
            .preamble(preamble)
            .temperature(0.1)
            .build();

        let response = agent.prompt(prompt).await?;
        parse_llm_json(&response)
    }

    pub async fn extract_line_items_from_text(
        &self,
        text: &str,
        document_name: &str,
    ) -> Result<ParsedQuoteData> {
        let preamble = with_schema(QUOTE_EXTRACTION_PROMPT, &quote_schema()?);
        let prompt = format!("Quotation document '{document_name}':\n\n{text}");
        let data: ParsedQuoteData = self.prompt_json(&preamble, &prompt).await?;
        debug!("'{document_name}': {} líneas en modo texto", data.line_items.len());
        Ok(data)
    }

    /// Modo visión: envía el binario (PDF escaneado o imagen) como data URL
    /// a la API de chat completions.
    pub async fn extract_line_items_from_document(
        &self,
        document: &FetchedDocument,
        document_name: &str,
    ) -> Result<ParsedQuoteData> {
        let api_key = self.ensure_openai()?;
        let preamble = with_schema(QUOTE_EXTRACTION_PROMPT, &quote_schema()?);
        let body = vision_request_body(&self.vision_model, &preamble, document, document_name);

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error {}: {}", status, body_text);
        }

        let json: Value = response.json().await?;
        let content = json
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Respuesta de visión sin contenido"))?;
        parse_llm_json(content)
    }

    pub async fn reconcile_quotes(
        &self,
        items: &[BomItemSummary],
        quotes: &[QuoteSummary],
        min_score: u8,
    ) -> Result<ReconciliationResult> {
        let quotes: Vec<QuoteSummary> = quotes
            .iter()
            .cloned()
            .map(|mut q| {
                q.raw_text = q.raw_text.map(|t| truncate_chars(&t, MAX_RAW_TEXT_CHARS));
                q
            })
            .collect();
        let prompt = reconciliation_prompt(items, &quotes, min_score)?;
        self.prompt_json(RECONCILIATION_PROMPT, &prompt).await
    }

    pub async fn extract_bom_items(&self, text: &str) -> Result<Vec<BomItemDraft>> {
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(BomItemDraft))?;
        let preamble = with_schema(BOM_TEXT_PROMPT, &schema);
        let response: BomTextResponse = self.prompt_json(&preamble, text).await?;
        Ok(response
            .items
            .into_iter()
            .filter(|item| !item.name.trim().is_empty())
            .collect())
    }
}

#[async_trait]
impl LineItemExtractor for LlmManager {
    async fn extract_from_text(&self, text: &str, document_name: &str) -> Result<ParsedQuoteData> {
        self.extract_line_items_from_text(text, document_name).await
    }

    async fn extract_from_document(
        &self,
        document: &FetchedDocument,
        document_name: &str,
    ) -> Result<ParsedQuoteData> {
        self.extract_line_items_from_document(document, document_name).await
    }
}

#[async_trait]
impl QuoteReconciler for LlmManager {
    async fn reconcile(
        &self,
        items: &[BomItemSummary],
        quotes: &[QuoteSummary],
        min_score: u8,
    ) -> Result<ReconciliationResult> {
        self.reconcile_quotes(items, quotes, min_score).await
    }
}

#[async_trait]
impl BomTextParser for LlmManager {
    async fn parse_bom_text(&self, text: &str) -> Result<Vec<BomItemDraft>> {
        self.extract_bom_items(text).await
    }
}

fn reconciliation_prompt(
    items: &[BomItemSummary],
    quotes: &[QuoteSummary],
    min_score: u8,
) -> Result<String> {
    let payload = json!({ "minMatchScore": min_score, "bomItems": items, "quotes": quotes });
    Ok(serde_json::to_string_pretty(&payload)?)
}

fn quote_schema() -> Result<String> {
    Ok(serde_json::to_string_pretty(&schemars::schema_for!(ParsedQuoteData))?)
}

fn with_schema(prompt: &str, schema: &str) -> String {
    format!("{}\nJSON Schema:\n{}\n", prompt.trim(), schema)
}

/// Limpia la respuesta del LLM para asegurar que sólo contenga el JSON.
pub fn clean_json_response(response: &str) -> &str {
    let trimmed = response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn parse_llm_json<T: DeserializeOwned>(response: &str) -> Result<T> {
    serde_json::from_str::<T>(clean_json_response(response)).map_err(|e| {
        warn!("No se pudo parsear el JSON del LLM. Error: {}. Respuesta LLM: '{}'", e, response);
        anyhow!("Respuesta JSON del LLM inválida: {e}")
    })
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Cuerpo de la petición de visión: PDFs como `file`, imágenes como `image_url`.
pub fn vision_request_body(
    model: &str,
    preamble: &str,
    document: &FetchedDocument,
    document_name: &str,
) -> Value {
    let content_type = if is_pdf(document) {
        "application/pdf"
    } else {
        document.content_type.as_str()
    };
    let data_url = format!("data:{};base64,{}", content_type, STANDARD.encode(&document.bytes));

    let attachment = if is_pdf(document) {
        json!({ "type": "file", "file": { "filename": document_name, "file_data": data_url } })
    } else {
        json!({ "type": "image_url", "image_url": { "url": data_url } })
    };

    let instruction = format!("Extract the line items of the quotation '{document_name}'.");
    json!({
        "model": model,
        "temperature": 0.1,
        "response_format": { "type": "json_object" },
        "messages": [
            { "role": "system", "content": preamble },
            {
                "role": "user",
                "content": [
                    { "type": "text", "text": instruction },
                    attachment
                ]
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_fenced_and_chatty_json() {
        assert_eq!(clean_json_response("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(
            clean_json_response("Here you go: {\"lineItems\": []} hope it helps"),
            "{\"lineItems\": []}"
        );
        assert_eq!(clean_json_response("no json"), "no json");
    }

    #[test]
    fn parses_quote_json_with_string_numbers() {
        let data: ParsedQuoteData = parse_llm_json(
            r#"```json
            {"documentInfo": {"vendorName": "Acme"},
             "lineItems": [{"partName": "Contactor", "quantity": "4", "unitPrice": "1,200.00"}]}
            ```"#,
        )
        .unwrap();
        assert_eq!(data.document_info.vendor_name.as_deref(), Some("Acme"));
        assert_eq!(data.line_items[0].unit_price, Some(1200.0));
        assert!(parse_llm_json::<ParsedQuoteData>("not json").is_err());
    }

    #[test]
    fn schema_mentions_line_item_fields() {
        let schema = quote_schema().unwrap();
        assert!(schema.contains("lineItems"));
        assert!(schema.contains("partNumber"));
        assert!(schema.contains("hsnCode"));
    }

    #[test]
    fn reconciliation_prompt_carries_min_score() {
        let prompt = reconciliation_prompt(&[], &[], 35).unwrap();
        let payload: Value = serde_json::from_str(&prompt).unwrap();
        assert_eq!(payload["minMatchScore"], 35);
        assert!(payload["quotes"].as_array().unwrap().is_empty());
    }

    #[test]
    fn truncates_on_char_boundary() {
        assert_eq!(truncate_chars("ñandú", 3), "ñan");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn vision_body_attaches_pdf_as_file() {
        let pdf = FetchedDocument {
            bytes: b"%PDF-1.4".to_vec(),
            content_type: "application/octet-stream".into(),
        };
        let body = vision_request_body("gpt-4o", "sys", &pdf, "scan.pdf");
        let part = &body["messages"][1]["content"][1];
        assert_eq!(part["type"], "file");
        assert_eq!(part["file"]["filename"], "scan.pdf");
        assert!(part["file"]["file_data"]
            .as_str()
            .unwrap()
            .starts_with("data:application/pdf;base64,"));

        let png = FetchedDocument {
            bytes: vec![1, 2, 3],
            content_type: "image/png".into(),
        };
        let body = vision_request_body("gpt-4o", "sys", &png, "photo.png");
        assert_eq!(body["messages"][1]["content"][1]["type"], "image_url");
    }

    #[tokio::test]
    async fn unsupported_provider_is_rejected_before_any_call() {
        let manager = LlmManager {
            provider: LlmProvider::Ollama,
            chat_model: String::new(),
            vision_model: String::new(),
            api_key: Some("k".into()),
            base_url: "http://localhost".into(),
            http: reqwest::Client::new(),
        };
        assert!(manager.extract_bom_items("2x contactor").await.is_err());

        let no_key = LlmManager {
            provider: LlmProvider::OpenAI,
            api_key: None,
            ..manager
        };
        assert!(no_key.reconcile_quotes(&[], &[], 50).await.is_err());
    }
}
