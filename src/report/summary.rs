use crate::domain::model::{Portfolio, ReportMeta, ScreeningSummary};
use crate::rules::engine::OVERALL_RISK;
use crate::utils::error::Result;
use std::collections::HashMap;

pub const UNASSIGNED: &str = "Unassigned";

/// Roll up a screened portfolio into the run summary.
pub fn build_summary(
    portfolio: &Portfolio,
    rulepack_name: &str,
    rulepack_version: i64,
) -> ScreeningSummary {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut located = 0usize;

    for record in &portfolio.records {
        if record.location.is_some() {
            located += 1;
        }
        let key = record
            .text(OVERALL_RISK)
            .unwrap_or(UNASSIGNED)
            .to_string();
        *counts.entry(key).or_insert(0) += 1;
    }

    ScreeningSummary {
        generated_at: chrono::Utc::now(),
        rulepack_name: rulepack_name.to_string(),
        rulepack_version,
        total_records: portfolio.len(),
        located_records: located,
        unresolved_geocodes: portfolio.len() - located,
        counts,
    }
}

/// Plain-text report with the same content the original PDF summary carried.
pub fn render_text(summary: &ScreeningSummary, meta: &ReportMeta) -> String {
    let mut out = String::new();
    out.push_str(&format!("{}\n", meta.title));
    out.push_str(&format!("{}\n\n", "=".repeat(meta.title.chars().count())));
    out.push_str(&format!("Author: {}\n", meta.author));
    out.push_str(&format!(
        "Generated (UTC): {}\n\n",
        summary.generated_at.format("%Y-%m-%dT%H:%M:%S")
    ));

    out.push_str("Overall risk counts\n");
    for label in ["High", "Medium", "Low", UNASSIGNED] {
        let count = summary.counts.get(label).copied().unwrap_or(0);
        out.push_str(&format!("  {}: {}\n", label, count));
    }
    out.push_str(&format!(
        "  Total: {} ({} located, {} unresolved)\n\n",
        summary.total_records, summary.located_records, summary.unresolved_geocodes
    ));

    out.push_str("Notes\n");
    if meta.notes.is_empty() {
        out.push_str("  (none)\n");
    } else {
        for line in meta.notes.lines() {
            out.push_str(&format!("  {}\n", line));
        }
    }

    out.push_str(&format!(
        "\nRulepack: {} (version {})\n",
        summary.rulepack_name, summary.rulepack_version
    ));
    out
}

pub fn to_json(summary: &ScreeningSummary) -> Result<String> {
    Ok(serde_json::to_string_pretty(summary)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Coord, SiteRecord};
    use serde_json::json;

    fn screened_portfolio() -> Portfolio {
        let mut p = Portfolio::new(vec![]);
        for (risk, located) in [(Some("High"), true), (Some("Low"), true), (None, false)] {
            let mut r = SiteRecord::new();
            match risk {
                Some(c) => r.set(OVERALL_RISK, json!(c)),
                None => r.set_null(OVERALL_RISK),
            }
            if located {
                r.location = Some(Coord::new(9.0, 48.5));
            }
            p.records.push(r);
        }
        p
    }

    #[test]
    fn test_build_summary_counts() {
        let summary = build_summary(&screened_portfolio(), "test_pack", 1);
        assert_eq!(summary.total_records, 3);
        assert_eq!(summary.located_records, 2);
        assert_eq!(summary.unresolved_geocodes, 1);
        assert_eq!(summary.counts.get("High"), Some(&1));
        assert_eq!(summary.counts.get("Low"), Some(&1));
        assert_eq!(summary.counts.get(UNASSIGNED), Some(&1));
    }

    #[test]
    fn test_render_text_contains_sections() {
        let summary = build_summary(&screened_portfolio(), "test_pack", 1);
        let text = render_text(&summary, &ReportMeta::default());
        assert!(text.contains("Overall risk counts"));
        assert!(text.contains("High: 1"));
        assert!(text.contains("Unassigned: 1"));
        assert!(text.contains("Rulepack: test_pack (version 1)"));
        assert!(text.contains("not for external distribution"));
    }

    #[test]
    fn test_render_text_disclaimer_appears_once() {
        // The disclaimer comes from the default meta notes only.
        let summary = build_summary(&screened_portfolio(), "test_pack", 1);
        let text = render_text(&summary, &ReportMeta::default());
        assert_eq!(text.matches("not for external distribution").count(), 1);
    }

    #[test]
    fn test_summary_json_round_trips() {
        let summary = build_summary(&screened_portfolio(), "test_pack", 1);
        let json_text = to_json(&summary).unwrap();
        let parsed: crate::domain::model::ScreeningSummary =
            serde_json::from_str(&json_text).unwrap();
        assert_eq!(parsed.total_records, 3);
        assert_eq!(parsed.rulepack_name, "test_pack");
    }
}
