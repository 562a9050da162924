//! Ensamblado del informe: todos los agregados se derivan de la lista final
//! de incidencias mediante un único fold.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{ComplianceReport, Issue, IssueType, Severity, SeverityCounts};

/// Contadores de la fase de cotizaciones que no se derivan de las incidencias.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuoteCounters {
    pub quotes_analyzed: usize,
    pub documents_parsed: usize,
    pub quotes_matched: usize,
}

#[derive(Debug, Default)]
struct Tally {
    items: HashSet<String>,
    by_type: BTreeMap<IssueType, usize>,
    by_severity: SeverityCounts,
    quote_mismatches: usize,
}

/// Numera las incidencias en orden de emisión (`issue-1`, `issue-2`, ...).
pub fn number_issues(issues: &mut [Issue]) {
    for (idx, issue) in issues.iter_mut().enumerate() {
        issue.id = format!("issue-{}", idx + 1);
    }
}

pub fn assemble_report(
    project_id: &str,
    total_items_checked: usize,
    mut issues: Vec<Issue>,
    counters: QuoteCounters,
    created_at: DateTime<Utc>,
    processing_time_ms: u64,
) -> ComplianceReport {
    number_issues(&mut issues);

    let tally = issues.iter().fold(Tally::default(), |mut tally, issue| {
        tally.items.insert(issue.bom_item_id.clone());
        *tally.by_type.entry(issue.issue_type).or_default() += 1;
        match issue.severity {
            Severity::Error => tally.by_severity.error += 1,
            Severity::Warning => tally.by_severity.warning += 1,
            Severity::Info => tally.by_severity.info += 1,
        }
        if issue.issue_type.is_quote_mismatch() {
            tally.quote_mismatches += 1;
        }
        tally
    });

    ComplianceReport {
        id: Uuid::new_v4().to_string(),
        project_id: project_id.to_string(),
        created_at: created_at.to_rfc3339(),
        total_items_checked,
        items_with_issues: tally.items.len(),
        total_issues: issues.len(),
        issues_by_type: tally.by_type,
        issues_by_severity: tally.by_severity,
        quotes_analyzed: counters.quotes_analyzed,
        documents_parsed: counters.documents_parsed,
        quotes_matched: counters.quotes_matched,
        quote_mismatches: tally.quote_mismatches,
        issues,
        processing_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BomItem;

    fn issue(item_id: &str, issue_type: IssueType, severity: Severity) -> Issue {
        let item = BomItem {
            id: item_id.to_string(),
            name: Some(format!("Item {item_id}")),
            ..Default::default()
        };
        Issue::for_item(&item, issue_type, severity, "m", "d")
    }

    #[test]
    fn aggregates_are_derived_from_issues() {
        let issues = vec![
            issue("a", IssueType::MissingField, Severity::Error),
            issue("a", IssueType::PriceMismatch, Severity::Warning),
            issue("b", IssueType::QuantityMismatch, Severity::Info),
            issue("c", IssueType::QuoteMismatch, Severity::Info),
            issue("c", IssueType::DuplicateItem, Severity::Warning),
        ];
        let report = assemble_report(
            "p1",
            4,
            issues,
            QuoteCounters {
                quotes_analyzed: 2,
                documents_parsed: 1,
                quotes_matched: 3,
            },
            Utc::now(),
            12,
        );

        assert_eq!(report.total_items_checked, 4);
        assert_eq!(report.items_with_issues, 3);
        assert_eq!(report.total_issues, 5);
        assert_eq!(report.quote_mismatches, 3);
        assert_eq!(
            report.issues_by_severity,
            SeverityCounts { error: 1, warning: 2, info: 2 }
        );
        assert_eq!(report.issues_by_type[&IssueType::DuplicateItem], 1);
        assert!(!report.issues_by_type.contains_key(&IssueType::InvalidSku));
        assert_eq!(report.quotes_matched, 3);
        assert_eq!(report.issues[4].id, "issue-5");
    }

    #[test]
    fn empty_report_serializes_zero_severities() {
        let report = assemble_report("p1", 0, Vec::new(), QuoteCounters::default(), Utc::now(), 0);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["issuesBySeverity"]["error"], 0);
        assert_eq!(value["issuesBySeverity"]["info"], 0);
        assert_eq!(value["itemsWithIssues"], 0);
        assert!(value["issuesByType"].as_object().unwrap().is_empty());
    }

    #[test]
    fn issues_by_type_uses_kebab_keys() {
        let report = assemble_report(
            "p1",
            1,
            vec![issue("a", IssueType::DuplicateItem, Severity::Warning)],
            QuoteCounters::default(),
            Utc::now(),
            0,
        );
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["issuesByType"]["duplicate-item"], 1);
    }
}
