//! Result interpreter
//!
//! Best-effort pattern extraction over the pipeline's free-text report.
//! The agents are instructed to emit labeled sections ("Product
//! Recommendation:", "Confidence Level:", ...) but nothing guarantees they
//! will, so every extraction degrades to an empty value on a miss and
//! `interpret` never fails. Pure functions with no hidden state, so the
//! extraction rules can be tested and swapped without touching the
//! orchestrator.

use lazy_static::lazy_static;
use regex::Regex;

use crate::pipeline::run::TaskResult;

const MAX_RISK_CHARS: usize = 300;
const NO_DATA: &str = "No data";

lazy_static! {
    static ref RECOMMENDATION_RE: Regex =
        Regex::new(r"(?s)Product Recommendation:\s*(.*?)(?:\n\n|\n[A-Z]|$)").unwrap();
    static ref CONFIDENCE_RE: Regex =
        Regex::new(r"Confidence Level:\s*(.*?)(?:\n|$)").unwrap();
    static ref SOM_RE: Regex =
        Regex::new(r"SOM.*?(\$[\d\.,MK\s]+-?\$?[\d\.,MK\s]+)").unwrap();
    static ref RISK_RE: Regex =
        Regex::new(r"(?s)(?:CRITICAL RISK|KEY RISKS):\s*(.*?)(?:\n\n|\n[A-Z]|$)").unwrap();
}

/// Structured extraction of the final report; empty fields mean the
/// pattern was not found
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructuredSummary {
    pub recommendation: String,
    pub confidence: String,
    pub market_size_estimate: String,
    pub top_risk: String,
    pub full_report: String,
}

/// Per-section task outputs surfaced by fixed pipeline position
#[derive(Debug, Clone, PartialEq)]
pub struct SectionReports {
    pub competitive_analysis: String,
    pub customer_pain: String,
    pub opportunity_sizing: String,
    pub risk_assessment: String,
}

fn extract(re: &Regex, text: &str) -> String {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Extract the structured summary from the terminal narrative.
/// Best-effort: a missing label yields an empty field, never an error.
pub fn interpret(final_narrative: &str) -> StructuredSummary {
    let top_risk = {
        let risk = extract(&RISK_RE, final_narrative);
        if risk.chars().count() > MAX_RISK_CHARS {
            let cut: String = risk.chars().take(MAX_RISK_CHARS).collect();
            format!("{}...", cut)
        } else {
            risk
        }
    };

    StructuredSummary {
        recommendation: extract(&RECOMMENDATION_RE, final_narrative),
        confidence: extract(&CONFIDENCE_RE, final_narrative),
        market_size_estimate: extract(&SOM_RE, final_narrative),
        top_risk,
        full_report: final_narrative.to_string(),
    }
}

/// Surface individual task outputs by their fixed pipeline position.
/// Positions: 0 competitive analysis, 2 customer pain, 3 opportunity
/// sizing, 4 risk assessment (1 and 5 are intermediate/terminal). An
/// out-of-range index yields "No data" rather than an error.
pub fn section_reports(task_results: &[TaskResult]) -> SectionReports {
    let at = |index: usize| {
        task_results
            .get(index)
            .map(|r| r.raw_text.clone())
            .unwrap_or_else(|| NO_DATA.to_string())
    };
    SectionReports {
        competitive_analysis: at(0),
        customer_pain: at(2),
        opportunity_sizing: at(3),
        risk_assessment: at(4),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_REPORT: &str = "EXECUTIVE SUMMARY\n\n\
        Product Recommendation: Build a freemium tier\n\n\
        Confidence Level: High\n\
        The market analysis shows a SOM estimate $2M-$5M over three years.\n\n\
        CRITICAL RISK: Regulatory approval could take longer than the runway allows\n\n\
        Next steps follow.";

    #[test]
    fn test_extracts_labeled_sections() {
        let summary = interpret(SAMPLE_REPORT);
        assert_eq!(summary.recommendation, "Build a freemium tier");
        assert_eq!(summary.confidence, "High");
        assert!(summary.market_size_estimate.contains("$2M-$5M"));
        assert!(summary
            .top_risk
            .starts_with("Regulatory approval could take longer"));
        assert_eq!(summary.full_report, SAMPLE_REPORT);
    }

    #[test]
    fn test_missing_labels_degrade_to_empty() {
        let text = "A report with none of the recognized labels.\nJust prose.";
        let summary = interpret(text);
        assert_eq!(summary.recommendation, "");
        assert_eq!(summary.confidence, "");
        assert_eq!(summary.market_size_estimate, "");
        assert_eq!(summary.top_risk, "");
        assert_eq!(summary.full_report, text);
    }

    #[test]
    fn test_interpret_is_pure() {
        let first = interpret(SAMPLE_REPORT);
        let second = interpret(SAMPLE_REPORT);
        assert_eq!(first, second);
    }

    #[test]
    fn test_key_risks_label_also_matches() {
        let text = "KEY RISKS: Churn among free users\n\nMore detail.";
        let summary = interpret(text);
        assert_eq!(summary.top_risk, "Churn among free users");
    }

    #[test]
    fn test_long_risk_truncated_to_300_chars() {
        let long_risk = "x".repeat(450);
        let text = format!("CRITICAL RISK: {}\n\nEnd.", long_risk);
        let summary = interpret(&text);
        assert_eq!(summary.top_risk.chars().count(), MAX_RISK_CHARS + 3);
        assert!(summary.top_risk.ends_with("..."));
    }

    #[test]
    fn test_recommendation_stops_at_blank_line() {
        let text = "Product Recommendation: Ship the MVP\nwith a narrow scope\n\n\
                    Confidence Level: Medium\n";
        let summary = interpret(text);
        assert_eq!(summary.recommendation, "Ship the MVP\nwith a narrow scope");
        assert_eq!(summary.confidence, "Medium");
    }

    #[test]
    fn test_som_requires_dollar_figure() {
        let summary = interpret("The SOM is large but unquantified.");
        assert_eq!(summary.market_size_estimate, "");

        let summary = interpret("SOM: $750K in year one.");
        assert!(summary.market_size_estimate.starts_with("$750K"));
    }

    #[test]
    fn test_section_reports_by_position() {
        let results: Vec<TaskResult> = [
            "competitive", "subreddits", "pains", "sizing", "risks", "strategy",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| TaskResult::new(format!("task_{}", i), *text))
        .collect();

        let sections = section_reports(&results);
        assert_eq!(sections.competitive_analysis, "competitive");
        assert_eq!(sections.customer_pain, "pains");
        assert_eq!(sections.opportunity_sizing, "sizing");
        assert_eq!(sections.risk_assessment, "risks");
    }

    #[test]
    fn test_section_reports_out_of_range_yield_no_data() {
        let results = vec![TaskResult::new("only", "competitive")];
        let sections = section_reports(&results);
        assert_eq!(sections.competitive_analysis, "competitive");
        assert_eq!(sections.customer_pain, NO_DATA);
        assert_eq!(sections.opportunity_sizing, NO_DATA);
        assert_eq!(sections.risk_assessment, NO_DATA);

        let sections = section_reports(&[]);
        assert_eq!(sections.competitive_analysis, NO_DATA);
    }
}
