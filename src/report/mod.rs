//! Fixed-shape analysis reports.
//!
//! Every successful query returns the same four sections in the same order,
//! whichever agent produced it.

mod formatter;

pub use formatter::format;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Text substituted for a section the agent output did not provide.
pub const PLACEHOLDER: &str = "Not available";

/// The canonical report sections, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    ExecutiveSummary,
    PerformanceMetrics,
    OptimizationOpportunities,
    ActionPlan,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [
        SectionKind::ExecutiveSummary,
        SectionKind::PerformanceMetrics,
        SectionKind::OptimizationOpportunities,
        SectionKind::ActionPlan,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SectionKind::ExecutiveSummary => "Executive Summary",
            SectionKind::PerformanceMetrics => "Performance Metrics",
            SectionKind::OptimizationOpportunities => "Optimization Opportunities",
            SectionKind::ActionPlan => "Action Plan",
        }
    }

    /// JSON key for this section.
    pub fn key(self) -> &'static str {
        match self {
            SectionKind::ExecutiveSummary => "executive_summary",
            SectionKind::PerformanceMetrics => "performance_metrics",
            SectionKind::OptimizationOpportunities => "optimization_opportunities",
            SectionKind::ActionPlan => "action_plan",
        }
    }

    /// Lower-cased headings accepted for this section.
    pub(crate) fn aliases(self) -> &'static [&'static str] {
        match self {
            SectionKind::ExecutiveSummary => {
                &["executive summary", "summary", "overview", "key findings"]
            }
            SectionKind::PerformanceMetrics => &[
                "performance metrics",
                "metrics",
                "key metrics",
                "performance",
                "performance analysis",
                "kpis",
            ],
            SectionKind::OptimizationOpportunities => &[
                "optimization opportunities",
                "optimisation opportunities",
                "opportunities",
                "recommendations",
                "optimization recommendations",
            ],
            SectionKind::ActionPlan => &[
                "action plan",
                "next steps",
                "action items",
                "implementation plan",
            ],
        }
    }

    pub(crate) fn from_heading(title: &str) -> Option<Self> {
        let title = title.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.aliases().contains(&title.as_str()))
    }
}

/// One section of a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub kind: SectionKind,
    pub title: &'static str,
    pub content: String,
    /// False when `content` is the placeholder.
    pub available: bool,
}

impl ReportSection {
    fn new(kind: SectionKind, content: Option<String>) -> Self {
        match content {
            Some(content) => Self {
                kind,
                title: kind.title(),
                content,
                available: true,
            },
            None => Self {
                kind,
                title: kind.title(),
                content: PLACEHOLDER.to_string(),
                available: false,
            },
        }
    }
}

/// A normalized four-section report.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    sections: [ReportSection; 4],
}

impl Report {
    /// Build a report from per-section content in canonical order.
    /// `None` or blank content becomes the placeholder.
    pub fn from_parts(parts: [Option<String>; 4]) -> Self {
        let [summary, metrics, opportunities, plan] = parts.map(|p| {
            p.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())
        });
        Self {
            sections: [
                ReportSection::new(SectionKind::ExecutiveSummary, summary),
                ReportSection::new(SectionKind::PerformanceMetrics, metrics),
                ReportSection::new(SectionKind::OptimizationOpportunities, opportunities),
                ReportSection::new(SectionKind::ActionPlan, plan),
            ],
        }
    }

    /// Sections in canonical order.
    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn section(&self, kind: SectionKind) -> &ReportSection {
        match kind {
            SectionKind::ExecutiveSummary => &self.sections[0],
            SectionKind::PerformanceMetrics => &self.sections[1],
            SectionKind::OptimizationOpportunities => &self.sections[2],
            SectionKind::ActionPlan => &self.sections[3],
        }
    }

    /// Sections that fell back to the placeholder.
    pub fn degraded_sections(&self) -> Vec<SectionKind> {
        self.sections
            .iter()
            .filter(|s| !s.available)
            .map(|s| s.kind)
            .collect()
    }

    pub fn is_degraded(&self) -> bool {
        self.sections.iter().any(|s| !s.available)
    }

    /// Render as Markdown with one `##` heading per section.
    pub fn to_markdown(&self) -> String {
        self.sections
            .iter()
            .map(|s| format!("## {}\n\n{}", s.title, s.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Serializes as `{"executive_summary": "...", ...}` in canonical order.
impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for section in &self.sections {
            map.serialize_entry(section.kind.key(), &section.content)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_substitutes_placeholders() {
        let report = Report::from_parts([
            Some("Spend is up 12%".to_string()),
            None,
            Some("   ".to_string()),
            Some("Pause ad group B".to_string()),
        ]);

        let titles: Vec<_> = report.sections().iter().map(|s| s.title).collect();
        assert_eq!(
            titles,
            vec![
                "Executive Summary",
                "Performance Metrics",
                "Optimization Opportunities",
                "Action Plan"
            ]
        );
        assert_eq!(report.section(SectionKind::PerformanceMetrics).content, PLACEHOLDER);
        assert_eq!(
            report.degraded_sections(),
            vec![SectionKind::PerformanceMetrics, SectionKind::OptimizationOpportunities]
        );
    }

    #[test]
    fn test_serializes_in_canonical_order() {
        let report = Report::from_parts([None, None, None, Some("Call back leads".to_string())]);
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(
            json,
            r#"{"executive_summary":"Not available","performance_metrics":"Not available","optimization_opportunities":"Not available","action_plan":"Call back leads"}"#
        );
    }

    #[test]
    fn test_from_heading_aliases() {
        assert_eq!(SectionKind::from_heading("Next Steps"), Some(SectionKind::ActionPlan));
        assert_eq!(SectionKind::from_heading(" KPIs "), Some(SectionKind::PerformanceMetrics));
        assert_eq!(SectionKind::from_heading("Appendix"), None);
    }
}
