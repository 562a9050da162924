//! Modelos de dominio: ítems de BOM, cotizaciones de proveedores, incidencias
//! de cumplimiento y el informe resultante.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::ComplianceError;

/// Tipo de ítem. Ausente ⇒ componente.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Component,
    Service,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemStatus {
    NotOrdered,
    Ordered,
    Received,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FinalizedVendor {
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub price: Option<f64>,
}

/// Un ítem de la lista de materiales tal y como lo guarda el frontend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BomItem {
    pub id: String,
    pub item_type: Option<ItemType>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub make: Option<String>,
    pub sku: Option<String>,
    pub unit: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    pub quantity: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    pub price: Option<f64>,
    pub status: Option<ItemStatus>,
    pub linked_quote_document_id: Option<String>,
    pub finalized_vendor: Option<FinalizedVendor>,
}

impl BomItem {
    pub fn is_component(&self) -> bool {
        matches!(self.item_type, None | Some(ItemType::Component))
    }

    pub fn name_trimmed(&self) -> &str {
        trimmed(&self.name)
    }

    pub fn sku_trimmed(&self) -> &str {
        trimmed(&self.sku)
    }

    pub fn make_trimmed(&self) -> &str {
        trimmed(&self.make)
    }

    /// Nombre a mostrar en las incidencias.
    pub fn display_name(&self) -> String {
        match self.name_trimmed() {
            "" => "(sin nombre)".to_string(),
            name => name.to_string(),
        }
    }

    pub fn category_or_default(&self) -> String {
        match trimmed(&self.category) {
            "" => "Uncategorized".to_string(),
            category => category.to_string(),
        }
    }

    /// Precio "presente" en el sentido del frontend: definido y distinto de cero.
    pub fn has_price(&self) -> bool {
        self.price.map(|p| p != 0.0).unwrap_or(false)
    }
}

pub(crate) fn trimmed(value: &Option<String>) -> &str {
    value.as_deref().map(str::trim).unwrap_or("")
}

/// Referencia a un documento de cotización.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorQuote {
    pub document_id: String,
    pub document_name: Option<String>,
    pub file_url: Option<String>,
    #[serde(rename = "linkedBOMItems")]
    pub linked_bom_items: Vec<String>,
    pub parsed_quote_data: Option<ParsedQuoteData>,
}

impl VendorQuote {
    pub fn display_name(&self) -> String {
        match trimmed(&self.document_name) {
            "" => self.document_id.clone(),
            name => name.to_string(),
        }
    }

    /// Líneas cacheadas, si existen y no están vacías.
    pub fn cached_line_items(&self) -> Option<&ParsedQuoteData> {
        self.parsed_quote_data
            .as_ref()
            .filter(|data| !data.line_items.is_empty())
    }
}

/// Cabecera de la cotización extraída.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentInfo {
    pub vendor_name: Option<String>,
    pub quote_number: Option<String>,
    pub quote_date: Option<String>,
    pub valid_until: Option<String>,
    pub currency: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    #[schemars(with = "Option<f64>")]
    pub total_amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteLineItem {
    pub part_name: String,
    pub part_number: Option<String>,
    pub make: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    #[schemars(with = "Option<f64>")]
    pub quantity: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    #[schemars(with = "Option<f64>")]
    pub unit_price: Option<f64>,
    #[serde(deserialize_with = "lenient_number")]
    #[schemars(with = "Option<f64>")]
    pub total_price: Option<f64>,
    pub hsn_code: Option<String>,
}

/// Resultado de extraer una cotización (y contenido de la caché).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ParsedQuoteData {
    pub document_info: DocumentInfo,
    pub line_items: Vec<QuoteLineItem>,
}

/// Ítem propuesto al analizar texto libre de una BOM. Aún sin `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct BomItemDraft {
    pub name: String,
    pub description: Option<String>,
    pub make: Option<String>,
    pub sku: Option<String>,
    #[serde(deserialize_with = "lenient_number")]
    #[schemars(with = "Option<f64>")]
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub category: Option<String>,
    /// "component" o "service".
    pub item_type: Option<String>,
}

// ---------------------------------------------------------------------
// INCIDENCIAS E INFORME
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    MissingField,
    InvalidSku,
    DuplicateItem,
    QuantityMismatch,
    PriceMismatch,
    QuoteMismatch,
    MissingQuote,
    NameFormat,
    DescriptionMismatch,
}

impl IssueType {
    /// Tipos que cuentan como discrepancias entre documentos.
    pub fn is_quote_mismatch(self) -> bool {
        matches!(
            self,
            IssueType::QuoteMismatch | IssueType::PriceMismatch | IssueType::QuantityMismatch
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixKind {
    /// Rellenar un campo vacío con un valor por defecto.
    FillMissing,
    /// Normalizar el formato del valor actual.
    Normalize,
    /// Sustituir por el valor que propone la conciliación.
    Replace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedFix {
    #[serde(rename = "type")]
    pub kind: FixKind,
    pub field: String,
    pub suggested_value: Value,
    pub description: String,
}

/// Una incidencia detectada. El `id` lo asigna el ensamblado del informe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: String,
    pub bom_item_id: String,
    pub bom_item_name: String,
    pub category: String,
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    pub details: String,
    pub current_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_fix: Option<SuggestedFix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<u8>,
}

impl Issue {
    pub fn for_item(
        item: &BomItem,
        issue_type: IssueType,
        severity: Severity,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            bom_item_id: item.id.clone(),
            bom_item_name: item.display_name(),
            category: item.category_or_default(),
            issue_type,
            severity,
            message: message.into(),
            details: details.into(),
            current_value: None,
            suggested_fix: None,
            document_id: None,
            document_name: None,
            confidence: None,
        }
    }

    pub fn with_current_value(mut self, value: impl Into<Value>) -> Self {
        self.current_value = Some(value.into());
        self
    }

    pub fn with_fix(
        mut self,
        kind: FixKind,
        field: &str,
        suggested_value: impl Into<Value>,
        description: impl Into<String>,
    ) -> Self {
        self.suggested_fix = Some(SuggestedFix {
            kind,
            field: field.to_string(),
            suggested_value: suggested_value.into(),
            description: description.into(),
        });
        self
    }

    pub fn with_document(mut self, document_id: &str, document_name: &str) -> Self {
        self.document_id = Some(document_id.to_string());
        self.document_name = Some(document_name.to_string());
        self
    }

    pub fn with_confidence(mut self, confidence: u8) -> Self {
        self.confidence = Some(confidence.min(100));
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceReport {
    pub id: String,
    pub project_id: String,
    pub created_at: String,
    pub total_items_checked: usize,
    pub items_with_issues: usize,
    pub total_issues: usize,
    pub issues_by_type: BTreeMap<IssueType, usize>,
    pub issues_by_severity: SeverityCounts,
    pub quotes_analyzed: usize,
    pub documents_parsed: usize,
    pub quotes_matched: usize,
    pub quote_mismatches: usize,
    pub issues: Vec<Issue>,
    pub processing_time_ms: u64,
}

// ---------------------------------------------------------------------
// PETICIÓN
// ---------------------------------------------------------------------

/// Ajustes opcionales por petición.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComplianceSettings {
    pub match_score_threshold: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComplianceRequest {
    pub project_id: String,
    pub bom_items: Vec<BomItem>,
    pub vendor_quotes: Vec<VendorQuote>,
    pub settings: ComplianceSettings,
    pub parse_documents: bool,
}

impl ComplianceRequest {
    /// Valida el cuerpo JSON de la petición. Cualquier fallo es un error de entrada.
    pub fn from_json(body: Value) -> Result<Self, ComplianceError> {
        let project_id = match body.get("projectId") {
            Some(Value::String(id)) if !id.trim().is_empty() => id.trim().to_string(),
            _ => {
                return Err(ComplianceError::InvalidInput(
                    "projectId is required and must be a non-empty string".to_string(),
                ))
            }
        };

        let bom_items = match body.get("bomItems") {
            Some(items @ Value::Array(_)) => Vec::<BomItem>::deserialize(items).map_err(|e| {
                ComplianceError::InvalidInput(format!("bomItems is malformed: {e}"))
            })?,
            _ => {
                return Err(ComplianceError::InvalidInput(
                    "bomItems is required and must be an array".to_string(),
                ))
            }
        };

        let vendor_quotes = match body.get("vendorQuotes") {
            None | Some(Value::Null) => Vec::new(),
            Some(quotes) => Vec::<VendorQuote>::deserialize(quotes).map_err(|e| {
                ComplianceError::InvalidInput(format!("vendorQuotes is malformed: {e}"))
            })?,
        };

        let settings = match body.get("settings") {
            None | Some(Value::Null) => ComplianceSettings::default(),
            Some(settings) => ComplianceSettings::deserialize(settings).unwrap_or_else(|e| {
                warn!("settings inválidos, se usan los valores por defecto: {e}");
                ComplianceSettings::default()
            }),
        };

        let parse_documents = body
            .get("parseDocuments")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        Ok(Self {
            project_id,
            bom_items,
            vendor_quotes,
            settings,
            parse_documents,
        })
    }
}

/// Acepta números, cadenas numéricas ("1,250.50") y null.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    })
}
