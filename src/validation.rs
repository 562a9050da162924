//! Pasada de validación: reglas por ítem (independientes de las cotizaciones)
//! y comprobaciones cruzadas de duplicados sobre toda la BOM.
//!
//! Es una función pura de (ítems, cotizaciones): con la misma entrada produce
//! exactamente la misma lista de incidencias.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::models::{BomItem, FixKind, Issue, IssueType, ItemStatus, Severity, VendorQuote};

pub const MIN_SKU_LEN: usize = 3;
pub const MIN_NAME_LEN: usize = 5;
pub const QUANTITY_SOFT_CEILING: f64 = 10_000.0;

const INVALID_SKU_CHARS: &[char] = &['<', '>', '{', '}', '[', ']', '\\', '|'];

/// Ejecuta todas las reglas sobre la BOM completa.
pub fn validate_items(items: &[BomItem], quotes: &[VendorQuote]) -> Vec<Issue> {
    let quote_linked: HashSet<&str> = quotes
        .iter()
        .flat_map(|q| q.linked_bom_items.iter().map(String::as_str))
        .collect();

    let mut issues: Vec<Issue> = items
        .iter()
        .flat_map(|item| check_item(item, &quote_linked))
        .collect();

    issues.extend(duplicate_names(items));
    issues.extend(duplicate_skus(items));
    issues
}

fn check_item(item: &BomItem, quote_linked: &HashSet<&str>) -> Vec<Issue> {
    let mut issues = Vec::new();
    let name = item.name_trimmed();

    if name.is_empty() {
        issues.push(Issue::for_item(
            item,
            IssueType::MissingField,
            Severity::Error,
            "Item name is required",
            "Every BOM item needs a name so it can be identified on quotes and purchase orders.",
        ));
    }

    if item.is_component() {
        if item.make_trimmed().is_empty() {
            issues.push(Issue::for_item(
                item,
                IssueType::MissingField,
                Severity::Error,
                "Make is required for components",
                "Components must specify the manufacturer (make) to be sourced correctly.",
            ));
        }

        if item.sku_trimmed().is_empty() {
            issues.push(Issue::for_item(
                item,
                IssueType::MissingField,
                Severity::Error,
                "SKU is required for components",
                "Components must carry a manufacturer part number (SKU).",
            ));
        }

        if !has_linked_quote(item, quote_linked) {
            issues.push(Issue::for_item(
                item,
                IssueType::MissingQuote,
                Severity::Error,
                "No vendor quote linked",
                "Components must be linked to at least one vendor quote document.",
            ));
        }
    }

    if item.description.as_deref().map(str::trim).unwrap_or("").is_empty() {
        let mut issue = Issue::for_item(
            item,
            IssueType::MissingField,
            Severity::Warning,
            "Description is missing",
            "Add a description so vendors can identify the exact item.",
        );
        if !name.is_empty() {
            issue = issue.with_fix(
                FixKind::FillMissing,
                "description",
                name,
                "Use the item name as description",
            );
        }
        issues.push(issue);
    }

    if item.is_component() {
        if let Some(sku) = item.sku.as_deref().filter(|s| !s.is_empty()) {
            if let Some(issue) = check_sku_format(item, sku) {
                issues.push(issue);
            }
        }
    }

    let ordered = matches!(item.status, Some(ItemStatus::Ordered | ItemStatus::Received));
    if ordered && !item.has_price() {
        issues.push(Issue::for_item(
            item,
            IssueType::MissingField,
            Severity::Warning,
            "Price missing for ordered item",
            "Items that are ordered or received should record the purchase price.",
        ));
    }

    match item.quantity {
        Some(qty) if qty > QUANTITY_SOFT_CEILING => {
            issues.push(
                Issue::for_item(
                    item,
                    IssueType::QuantityMismatch,
                    Severity::Warning,
                    "Quantity is unusually high",
                    format!(
                        "Quantity {qty} exceeds {QUANTITY_SOFT_CEILING}. \
                         Please double-check the value."
                    ),
                )
                .with_current_value(qty),
            );
        }
        Some(qty) if qty > 0.0 => {}
        other => {
            let current = other.map(Value::from).unwrap_or(Value::Null);
            let mut issue = Issue::for_item(
                item,
                IssueType::MissingField,
                Severity::Warning,
                "Quantity must be greater than zero",
                "Quantity is missing, zero or negative.",
            )
            .with_fix(FixKind::FillMissing, "quantity", 1, "Set quantity to 1");
            issue.current_value = Some(current);
            issues.push(issue);
        }
    }

    let category = item.category.as_deref().map(str::trim).unwrap_or("");
    if category.is_empty() || category == "Uncategorized" {
        issues.push(Issue::for_item(
            item,
            IssueType::MissingField,
            Severity::Warning,
            "Category is not set",
            "Assign a category to keep the BOM organised.",
        ));
    }

    if item.is_component() && item.has_price() && !has_finalized_vendor(item) {
        issues.push(Issue::for_item(
            item,
            IssueType::MissingField,
            Severity::Warning,
            "No vendor selected",
            "The item has a price but no finalized vendor.",
        ));
    }

    if !name.is_empty() && name.chars().count() < MIN_NAME_LEN {
        issues.push(
            Issue::for_item(
                item,
                IssueType::NameFormat,
                Severity::Info,
                "Item name is very short",
                format!(
                    "'{name}' is shorter than {MIN_NAME_LEN} characters and may be an abbreviation."
                ),
            )
            .with_current_value(name),
        );
    }

    if !item.is_component() && !item.price.map(|p| p > 0.0).unwrap_or(false) {
        issues.push(Issue::for_item(
            item,
            IssueType::MissingField,
            Severity::Warning,
            "Service rate is missing",
            "Services need a positive rate.",
        ));
    }

    issues
}

fn has_linked_quote(item: &BomItem, quote_linked: &HashSet<&str>) -> bool {
    let direct = item
        .linked_quote_document_id
        .as_deref()
        .map(|id| !id.trim().is_empty())
        .unwrap_or(false);
    direct || quote_linked.contains(item.id.as_str())
}

fn has_finalized_vendor(item: &BomItem) -> bool {
    item.finalized_vendor
        .as_ref()
        .and_then(|v| v.name.as_deref())
        .map(|name| !name.trim().is_empty())
        .unwrap_or(false)
}

fn check_sku_format(item: &BomItem, sku: &str) -> Option<Issue> {
    let mut problems = Vec::new();

    if sku.trim().chars().count() < MIN_SKU_LEN {
        problems.push(format!("SKU is too short (minimum {MIN_SKU_LEN} characters)"));
    }
    if sku.contains("  ") {
        problems.push("SKU contains multiple consecutive spaces".to_string());
    }
    if sku.contains(INVALID_SKU_CHARS) {
        problems.push("SKU contains invalid characters (< > { } [ ] \\ |)".to_string());
    }
    if sku.trim() != sku {
        problems.push("SKU has leading or trailing whitespace".to_string());
    }

    if problems.is_empty() {
        return None;
    }

    Some(
        Issue::for_item(
            item,
            IssueType::InvalidSku,
            Severity::Warning,
            "SKU format looks invalid",
            problems.join(". "),
        )
        .with_current_value(sku)
        .with_fix(
            FixKind::Normalize,
            "sku",
            normalize_sku(sku),
            "Trim the SKU and replace inner whitespace with dashes",
        ),
    )
}

/// Recorta y sustituye cada tramo de espacios internos por `-`.
pub fn normalize_sku(sku: &str) -> String {
    sku.split_whitespace().collect::<Vec<_>>().join("-")
}

fn normalize_key(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Agrupa por clave y devuelve, en orden de entrada, los miembros de grupos con más de uno.
fn duplicate_groups<'a, F>(items: &'a [BomItem], key: F) -> Vec<(&'a BomItem, usize)>
where
    F: Fn(&BomItem) -> Option<String>,
{
    let mut groups: HashMap<String, usize> = HashMap::new();
    for item in items {
        if let Some(k) = key(item) {
            *groups.entry(k).or_default() += 1;
        }
    }

    items
        .iter()
        .filter_map(|item| {
            let size = key(item).and_then(|k| groups.get(&k).copied())?;
            (size > 1).then_some((item, size))
        })
        .collect()
}

fn duplicate_names(items: &[BomItem]) -> Vec<Issue> {
    // Sin filtro por tipo: un servicio y un componente con el mismo nombre también se marcan.
    duplicate_groups(items, |item| {
        let name = item.name_trimmed();
        (!name.is_empty()).then(|| normalize_key(name))
    })
    .into_iter()
    .map(|(item, size)| {
        Issue::for_item(
            item,
            IssueType::DuplicateItem,
            Severity::Warning,
            "Duplicate item name",
            format!("{size} items share the name '{}'.", item.name_trimmed()),
        )
        .with_current_value(item.name_trimmed())
    })
    .collect()
}

fn duplicate_skus(items: &[BomItem]) -> Vec<Issue> {
    duplicate_groups(items, |item| {
        let sku = item.sku_trimmed();
        (item.is_component() && !sku.is_empty()).then(|| normalize_key(sku))
    })
    .into_iter()
    .map(|(item, size)| {
        Issue::for_item(
            item,
            IssueType::DuplicateItem,
            Severity::Error,
            "Duplicate SKU",
            format!("{size} components share the SKU '{}'.", item.sku_trimmed()),
        )
        .with_current_value(item.sku_trimmed())
    })
    .collect()
}
