//! Conciliación de cotizaciones con la BOM.
//!
//! El emparejamiento en sí lo hace un `QuoteReconciler` (el LLM o el
//! `FuzzyReconciler` determinista); aquí se define el contrato JSON y la
//! traducción de su resultado a incidencias.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{BomItem, FixKind, Issue, IssueType, QuoteLineItem, Severity};

/// Confianza fija de las correcciones de campo sugeridas por la conciliación.
pub const SUGGESTED_FIX_CONFIDENCE: u8 = 75;

// ---------------------------------------------------------------------
// ENTRADA DE LA CONCILIACIÓN
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BomItemSummary {
    pub id: String,
    pub name: String,
    pub make: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub price: Option<f64>,
    pub category: String,
}

impl From<&BomItem> for BomItemSummary {
    fn from(item: &BomItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name_trimmed().to_string(),
            make: item.make.clone(),
            sku: item.sku.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            price: item.price,
            category: item.category_or_default(),
        }
    }
}

/// Cotización tal y como se envía a conciliar: líneas estructuradas o,
/// si no se pudieron obtener, el texto plano extraído.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummary {
    pub document_id: String,
    pub document_name: String,
    pub vendor_name: Option<String>,
    #[serde(rename = "linkedBOMItems")]
    pub linked_bom_items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_items: Option<Vec<QuoteLineItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_text: Option<String>,
}

// ---------------------------------------------------------------------
// RESULTADO DE LA CONCILIACIÓN
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineMatch {
    pub quote_line_item: Value,
    pub bom_item_id: Option<String>,
    pub bom_item_name: Option<String>,
    #[serde(deserialize_with = "lenient_score")]
    pub match_score: f64,
    pub match_reasons: Vec<String>,
    pub mismatches: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QuoteAnalysis {
    pub document_id: String,
    pub document_name: Option<String>,
    pub vendor_name: Option<String>,
    pub line_matches: Vec<LineMatch>,
    #[serde(deserialize_with = "count_or_len")]
    pub unmatched_quote_lines: usize,
    #[serde(rename = "unmatchedBOMItems")]
    pub unmatched_bom_items: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestedFieldFix {
    pub bom_item_id: String,
    pub field: String,
    pub current_value: Option<Value>,
    pub suggested_value: Option<Value>,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconciliationResult {
    pub quote_analysis: Vec<QuoteAnalysis>,
    pub suggested_fixes: Vec<SuggestedFieldFix>,
}

/// `min_score` es el umbral efectivo de la petición: una línea por debajo no
/// empareja y sus ítems enlazados quedan en `unmatched_bom_items`.
#[async_trait]
pub trait QuoteReconciler: Send + Sync {
    async fn reconcile(
        &self,
        items: &[BomItemSummary],
        quotes: &[QuoteSummary],
        min_score: u8,
    ) -> Result<ReconciliationResult>;
}

// ---------------------------------------------------------------------
// TRADUCCIÓN A INCIDENCIAS
// ---------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MatchOutcome {
    pub issues: Vec<Issue>,
    pub quotes_matched: usize,
}

pub fn translate_reconciliation(
    result: &ReconciliationResult,
    items: &[BomItem],
    threshold: u8,
) -> MatchOutcome {
    let by_id: HashMap<&str, &BomItem> = items.iter().map(|i| (i.id.as_str(), i)).collect();
    let mut outcome = MatchOutcome::default();

    for analysis in &result.quote_analysis {
        let document_name = analysis
            .document_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| analysis.document_id.clone());

        for line in &analysis.line_matches {
            let Some(bom_item_id) = line.bom_item_id.as_deref().filter(|id| !id.is_empty()) else {
                continue;
            };
            if line.match_score < f64::from(threshold) {
                continue;
            }
            outcome.quotes_matched += 1;

            let fallback;
            let item = match by_id.get(bom_item_id) {
                Some(item) => *item,
                None => {
                    fallback = BomItem {
                        id: bom_item_id.to_string(),
                        name: line.bom_item_name.clone(),
                        ..Default::default()
                    };
                    &fallback
                }
            };

            for mismatch in &line.mismatches {
                let (issue_type, severity, message) = classify_mismatch(mismatch);
                outcome.issues.push(
                    Issue::for_item(item, issue_type, severity, message, mismatch.clone())
                        .with_current_value(line.quote_line_item.clone())
                        .with_document(&analysis.document_id, &document_name)
                        .with_confidence(line.match_score.round().clamp(0.0, 100.0) as u8),
                );
            }
        }

        for id in &analysis.unmatched_bom_items {
            if let Some(item) = by_id.get(id.as_str()) {
                outcome.issues.push(
                    Issue::for_item(
                        item,
                        IssueType::MissingQuote,
                        Severity::Info,
                        "Item not found in vendor quote",
                        format!(
                            "'{}' is linked to '{}' but no matching quote line was found.",
                            item.display_name(),
                            document_name
                        ),
                    )
                    .with_document(&analysis.document_id, &document_name),
                );
            }
        }
    }

    for fix in &result.suggested_fixes {
        let Some(item) = by_id.get(fix.bom_item_id.as_str()) else {
            continue;
        };
        let suggested = value_text(fix.suggested_value.as_ref());
        let current = value_text(fix.current_value.as_ref());
        if suggested.is_empty() || suggested == current {
            continue;
        }

        let issue_type = match fix.field.as_str() {
            "name" => IssueType::NameFormat,
            "description" => IssueType::DescriptionMismatch,
            _ => IssueType::InvalidSku,
        };
        let mut issue = Issue::for_item(
            item,
            issue_type,
            Severity::Info,
            format!("Suggested {} correction", fix.field),
            fix.reason.clone(),
        )
        .with_fix(FixKind::Replace, &fix.field, suggested, fix.reason.clone())
        .with_confidence(SUGGESTED_FIX_CONFIDENCE);
        issue.current_value = fix.current_value.clone();
        outcome.issues.push(issue);
    }

    outcome
}

fn classify_mismatch(mismatch: &str) -> (IssueType, Severity, &'static str) {
    let lower = mismatch.to_lowercase();
    if lower.contains("price") {
        (
            IssueType::PriceMismatch,
            Severity::Warning,
            "Price differs from vendor quote",
        )
    } else if lower.contains("quantity") {
        (
            IssueType::QuantityMismatch,
            Severity::Info,
            "Quantity differs from vendor quote",
        )
    } else {
        (
            IssueType::QuoteMismatch,
            Severity::Info,
            "Quote line differs from BOM item",
        )
    }
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(other) => other.to_string(),
    }
}

// ---------------------------------------------------------------------
// CONCILIADOR DETERMINISTA
// ---------------------------------------------------------------------

/// Emparejador difuso sin IA: coincidencia exacta de SKU y, si no, similitud
/// de conjuntos de tokens (Jaccard) sobre nombre, fabricante y SKU.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyReconciler;

impl FuzzyReconciler {
    fn analyze(
        &self,
        items: &[BomItemSummary],
        quote: &QuoteSummary,
        min_score: u8,
    ) -> QuoteAnalysis {
        let mut analysis = QuoteAnalysis {
            document_id: quote.document_id.clone(),
            document_name: Some(quote.document_name.clone()),
            vendor_name: quote.vendor_name.clone(),
            ..Default::default()
        };
        let mut matched: HashSet<&str> = HashSet::new();

        match (&quote.line_items, &quote.raw_text) {
            (Some(lines), _) => {
                for line in lines {
                    let best = items
                        .iter()
                        .map(|item| (item, score_line(line, item)))
                        .filter(|(_, score)| *score > 0)
                        .max_by_key(|(_, score)| *score);

                    let quote_line_item = serde_json::to_value(line).unwrap_or(Value::Null);
                    match best {
                        Some((item, score)) if score >= min_score => {
                            matched.insert(item.id.as_str());
                            analysis.line_matches.push(LineMatch {
                                quote_line_item,
                                bom_item_id: Some(item.id.clone()),
                                bom_item_name: Some(item.name.clone()),
                                match_score: f64::from(score),
                                match_reasons: match_reasons(line, item, score),
                                mismatches: line_mismatches(line, item),
                            });
                        }
                        _ => {
                            analysis.unmatched_quote_lines += 1;
                            analysis.line_matches.push(LineMatch {
                                quote_line_item,
                                match_score: best.map(|(_, s)| f64::from(s)).unwrap_or(0.0),
                                ..Default::default()
                            });
                        }
                    }
                }
            }
            (None, Some(text)) => {
                let haystack = compact(text);
                for item in items {
                    let sku = item.sku.as_deref().map(compact).unwrap_or_default();
                    if sku.len() >= 3 && haystack.contains(&sku) {
                        matched.insert(item.id.as_str());
                        analysis.line_matches.push(LineMatch {
                            quote_line_item: Value::String(item.sku.clone().unwrap_or_default()),
                            bom_item_id: Some(item.id.clone()),
                            bom_item_name: Some(item.name.clone()),
                            match_score: 100.0,
                            match_reasons: vec!["SKU found in document text".to_string()],
                            mismatches: Vec::new(),
                        });
                    }
                }
            }
            (None, None) => {}
        }

        analysis.unmatched_bom_items = quote
            .linked_bom_items
            .iter()
            .filter(|id| !matched.contains(id.as_str()))
            .cloned()
            .collect();
        analysis
    }
}

#[async_trait]
impl QuoteReconciler for FuzzyReconciler {
    async fn reconcile(
        &self,
        items: &[BomItemSummary],
        quotes: &[QuoteSummary],
        min_score: u8,
    ) -> Result<ReconciliationResult> {
        Ok(ReconciliationResult {
            quote_analysis: quotes.iter().map(|q| self.analyze(items, q, min_score)).collect(),
            suggested_fixes: Vec::new(),
        })
    }
}

fn tokens(parts: &[Option<&str>]) -> HashSet<String> {
    parts
        .iter()
        .flatten()
        .flat_map(|part| part.split(|c: char| !c.is_alphanumeric()))
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Minúsculas y sólo alfanuméricos, para comparar SKUs.
fn compact(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn score_line(line: &QuoteLineItem, item: &BomItemSummary) -> u8 {
    let part_number = line.part_number.as_deref().map(compact).unwrap_or_default();
    let sku = item.sku.as_deref().map(compact).unwrap_or_default();
    if !sku.is_empty() && part_number == sku {
        return 100;
    }

    let a = tokens(&[
        Some(line.part_name.as_str()),
        line.part_number.as_deref(),
        line.make.as_deref(),
    ]);
    let b = tokens(&[Some(item.name.as_str()), item.make.as_deref(), item.sku.as_deref()]);
    let union = a.union(&b).count();
    if union == 0 {
        return 0;
    }
    let shared = a.intersection(&b).count();
    ((shared as f64 / union as f64) * 100.0).round() as u8
}

fn match_reasons(line: &QuoteLineItem, item: &BomItemSummary, score: u8) -> Vec<String> {
    if score == 100 && line.part_number.is_some() {
        vec!["Part number equals SKU".to_string()]
    } else {
        vec![format!("Name similarity {score}% with '{}'", item.name)]
    }
}

fn line_mismatches(line: &QuoteLineItem, item: &BomItemSummary) -> Vec<String> {
    let mut mismatches = Vec::new();

    if let (Some(q), Some(b)) = (line.quantity, item.quantity) {
        if (q - b).abs() > f64::EPSILON {
            mismatches.push(format!("Quantity mismatch: quote {q} vs BOM {b}"));
        }
    }
    if let (Some(q), Some(b)) = (line.unit_price, item.price) {
        if b > 0.0 && ((q - b).abs() / b) > 0.01 {
            mismatches.push(format!("Price mismatch: quote {q} vs BOM {b}"));
        }
    }
    let quote_make = line.make.as_deref().map(compact).unwrap_or_default();
    let bom_make = item.make.as_deref().map(compact).unwrap_or_default();
    if !quote_make.is_empty() && !bom_make.is_empty() && quote_make != bom_make {
        mismatches.push(format!(
            "Make differs: quote {} vs BOM {}",
            line.make.as_deref().unwrap_or_default(),
            item.make.as_deref().unwrap_or_default()
        ));
    }
    mismatches
}

fn lenient_score<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

/// El LLM a veces devuelve la lista de líneas en lugar del número.
fn count_or_len<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        Some(Value::Array(a)) => a.len(),
        _ => 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str, name: &str, sku: &str) -> BomItem {
        BomItem {
            id: id.to_string(),
            name: Some(name.to_string()),
            make: Some("Siemens".to_string()),
            sku: Some(sku.to_string()),
            quantity: Some(4.0),
            price: Some(100.0),
            category: Some("Electrical".to_string()),
            ..Default::default()
        }
    }

    fn line(name: &str, part: Option<&str>, qty: f64, price: f64) -> QuoteLineItem {
        QuoteLineItem {
            part_name: name.to_string(),
            part_number: part.map(str::to_string),
            make: Some("Siemens".to_string()),
            quantity: Some(qty),
            unit_price: Some(price),
            ..Default::default()
        }
    }

    #[test]
    fn reconciliation_json_contract_parses() {
        let result: ReconciliationResult = serde_json::from_value(json!({
            "quoteAnalysis": [{
                "documentId": "q1",
                "documentName": "Acme quote.pdf",
                "vendorName": "Acme",
                "lineMatches": [{
                    "quoteLineItem": { "partName": "Contactor" },
                    "bomItemId": "a",
                    "bomItemName": "Contactor",
                    "matchScore": "85%",
                    "matchReasons": ["same sku"],
                    "mismatches": ["Unit price 120 vs 100"]
                }],
                "unmatchedQuoteLines": [{ "partName": "Freight" }],
                "unmatchedBOMItems": ["b"]
            }],
            "suggestedFixes": []
        }))
        .unwrap();
        let analysis = &result.quote_analysis[0];
        assert_eq!(analysis.line_matches[0].match_score, 85.0);
        assert_eq!(analysis.unmatched_quote_lines, 1);
        assert_eq!(analysis.unmatched_bom_items, vec!["b"]);
    }

    #[test]
    fn matches_below_threshold_are_ignored() {
        let items = vec![item("a", "Contactor", "3RT2015")];
        let result = ReconciliationResult {
            quote_analysis: vec![QuoteAnalysis {
                document_id: "q1".into(),
                line_matches: vec![
                    LineMatch {
                        bom_item_id: Some("a".into()),
                        match_score: 49.0,
                        mismatches: vec!["price differs".into()],
                        ..Default::default()
                    },
                    LineMatch {
                        bom_item_id: None,
                        match_score: 99.0,
                        mismatches: vec!["price differs".into()],
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        let outcome = translate_reconciliation(&result, &items, 50);
        assert_eq!(outcome.quotes_matched, 0);
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn mismatches_are_classified_by_substring() {
        let items = vec![item("a", "Contactor", "3RT2015")];
        let result = ReconciliationResult {
            quote_analysis: vec![QuoteAnalysis {
                document_id: "q1".into(),
                document_name: Some("Acme.pdf".into()),
                line_matches: vec![LineMatch {
                    bom_item_id: Some("a".into()),
                    match_score: 50.0,
                    mismatches: vec![
                        "Unit Price is 120 in quote".into(),
                        "Quantity 5 vs 4".into(),
                        "Make differs".into(),
                    ],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };
        let outcome = translate_reconciliation(&result, &items, 50);
        assert_eq!(outcome.quotes_matched, 1);
        let kinds: Vec<_> = outcome
            .issues
            .iter()
            .map(|i| (i.issue_type, i.severity))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (IssueType::PriceMismatch, Severity::Warning),
                (IssueType::QuantityMismatch, Severity::Info),
                (IssueType::QuoteMismatch, Severity::Info),
            ]
        );
        assert!(outcome
            .issues
            .iter()
            .all(|i| i.document_name.as_deref() == Some("Acme.pdf") && i.confidence == Some(50)));
    }

    #[test]
    fn unmatched_items_and_fixes_resolve_against_bom() {
        let items = vec![item("a", "Contactor", "3RT2015")];
        let result = ReconciliationResult {
            quote_analysis: vec![QuoteAnalysis {
                document_id: "q1".into(),
                unmatched_bom_items: vec!["a".into(), "ghost".into()],
                ..Default::default()
            }],
            suggested_fixes: vec![
                SuggestedFieldFix {
                    bom_item_id: "a".into(),
                    field: "sku".into(),
                    current_value: Some(json!("3RT2015")),
                    suggested_value: Some(json!("3RT2015-1BB41")),
                    reason: "Full part number on quote".into(),
                },
                SuggestedFieldFix {
                    bom_item_id: "a".into(),
                    field: "name".into(),
                    current_value: Some(json!("Contactor")),
                    suggested_value: Some(json!("Contactor")),
                    reason: "unchanged".into(),
                },
                SuggestedFieldFix {
                    bom_item_id: "a".into(),
                    field: "description".into(),
                    current_value: None,
                    suggested_value: Some(json!("  ")),
                    reason: "blank".into(),
                },
                SuggestedFieldFix {
                    bom_item_id: "a".into(),
                    field: "description".into(),
                    current_value: None,
                    suggested_value: Some(json!("AC-3 contactor, 24V DC coil")),
                    reason: "From quote".into(),
                },
            ],
        };
        let outcome = translate_reconciliation(&result, &items, 50);
        let kinds: Vec<_> = outcome.issues.iter().map(|i| i.issue_type).collect();
        assert_eq!(
            kinds,
            vec![
                IssueType::MissingQuote,
                IssueType::InvalidSku,
                IssueType::DescriptionMismatch
            ]
        );
        assert!(outcome.issues.iter().all(|i| i.severity == Severity::Info));
        assert_eq!(outcome.issues[1].confidence, Some(SUGGESTED_FIX_CONFIDENCE));
        assert_eq!(
            outcome.issues[1].suggested_fix.as_ref().unwrap().suggested_value,
            json!("3RT2015-1BB41")
        );
    }

    #[test]
    fn score_prefers_exact_sku() {
        let summary = BomItemSummary::from(&item("a", "Contactor 3 pole", "3RT-2015"));
        let exact = score_line(&line("Something else", Some("3rt 2015"), 4.0, 100.0), &summary);
        assert_eq!(exact, 100);
        let partial = score_line(&line("Contactor 3 pole", None, 4.0, 100.0), &summary);
        assert!(partial > 50 && partial < 100, "score {partial}");
        assert_eq!(score_line(&line("", None, 1.0, 1.0), &BomItemSummary {
            make: None,
            sku: None,
            name: String::new(),
            ..summary
        }), 0);
    }

    #[tokio::test]
    async fn fuzzy_reconciler_reports_mismatches_and_unmatched() {
        let items: Vec<BomItemSummary> = [
            item("a", "Contactor", "3RT2015"),
            item("b", "Overload relay", "3RU2116"),
        ]
        .iter()
        .map(BomItemSummary::from)
        .collect();
        let quote = QuoteSummary {
            document_id: "q1".into(),
            document_name: "Acme.pdf".into(),
            vendor_name: Some("Acme".into()),
            linked_bom_items: vec!["a".into(), "b".into()],
            line_items: Some(vec![
                line("Contactor", Some("3RT2015"), 5.0, 130.0),
                line("Freight charges", None, 1.0, 500.0),
            ]),
            raw_text: None,
        };

        let result = FuzzyReconciler.reconcile(&items, &[quote], 50).await.unwrap();
        let analysis = &result.quote_analysis[0];
        assert_eq!(analysis.unmatched_quote_lines, 1);
        assert_eq!(analysis.unmatched_bom_items, vec!["b"]);
        assert_eq!(
            analysis.line_matches[0].mismatches,
            vec![
                "Quantity mismatch: quote 5 vs BOM 4".to_string(),
                "Price mismatch: quote 130 vs BOM 100".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn fuzzy_reconciler_honours_the_requested_min_score() {
        let items = vec![BomItemSummary::from(&item("a", "Contactor", "3RT2015"))];
        // {contactor, panel, board, siemens} frente a {contactor, siemens, 3rt2015}: 2/5 = 40.
        let quote = QuoteSummary {
            document_id: "q1".into(),
            document_name: "Acme.pdf".into(),
            vendor_name: None,
            linked_bom_items: vec!["a".into()],
            line_items: Some(vec![line("Contactor panel board", None, 4.0, 100.0)]),
            raw_text: None,
        };

        let loose = FuzzyReconciler.reconcile(&items, &[quote.clone()], 30).await.unwrap();
        let analysis = &loose.quote_analysis[0];
        assert_eq!(analysis.line_matches[0].bom_item_id.as_deref(), Some("a"));
        assert_eq!(analysis.line_matches[0].match_score, 40.0);
        assert!(analysis.unmatched_bom_items.is_empty());
        let src = [item("a", "Contactor", "3RT2015")];
        assert_eq!(translate_reconciliation(&loose, &src, 30).quotes_matched, 1);

        let strict = FuzzyReconciler.reconcile(&items, &[quote], 50).await.unwrap();
        let analysis = &strict.quote_analysis[0];
        assert_eq!(analysis.unmatched_quote_lines, 1);
        assert_eq!(analysis.unmatched_bom_items, vec!["a"]);
        assert_eq!(translate_reconciliation(&strict, &src, 50).quotes_matched, 0);
    }

    #[tokio::test]
    async fn fuzzy_reconciler_scans_raw_text_for_skus() {
        let items = vec![BomItemSummary::from(&item("a", "Contactor", "3RT2015"))];
        let quote = QuoteSummary {
            document_id: "q1".into(),
            document_name: "scan.pdf".into(),
            vendor_name: None,
            linked_bom_items: vec!["a".into()],
            line_items: None,
            raw_text: Some("1. CONTACTOR 3RT 2015 qty 4".into()),
        };
        let result = FuzzyReconciler.reconcile(&items, &[quote], 50).await.unwrap();
        let analysis = &result.quote_analysis[0];
        assert_eq!(analysis.line_matches.len(), 1);
        assert!(analysis.unmatched_bom_items.is_empty());
    }
}
