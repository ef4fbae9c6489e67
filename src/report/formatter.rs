//! Turns free-form agent output into a [`Report`].
//!
//! Headings may be written as Markdown (`## Action Plan`), bold
//! (`**Action Plan**`), or a title line (`Action Plan:`), optionally numbered.
//! Text on the same line after a colon starts the section body.

use super::{Report, SectionKind};
use crate::agent::ExecutionResult;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

fn heading_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"^\s*(?:#{1,6}\s*)?(?:\*\*|__)?\s*(?:\d+[.)]\s*)?(?P<title>[A-Za-z][A-Za-z &/-]*?)\s*(?:\*\*|__)?\s*(?::\s*(?:\*\*|__)?\s*(?P<rest>.*))?$",
            )
            .ok()
        })
        .as_ref()
}

/// Match a line against the known section headings.
fn parse_heading(line: &str) -> Option<(SectionKind, &str)> {
    let caps = heading_pattern()?.captures(line)?;
    let kind = SectionKind::from_heading(caps.name("title")?.as_str())?;
    let rest = caps.name("rest").map(|m| m.as_str().trim()).unwrap_or("");
    Some((kind, rest))
}

fn slot(kind: SectionKind) -> usize {
    match kind {
        SectionKind::ExecutiveSummary => 0,
        SectionKind::PerformanceMetrics => 1,
        SectionKind::OptimizationOpportunities => 2,
        SectionKind::ActionPlan => 3,
    }
}

fn push_line(buf: &mut String, line: &str) {
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(line);
}

/// Normalize an execution result into the four-section report.
///
/// Never fails. Sections that cannot be found are filled with the
/// placeholder and logged. A repeated heading appends to the earlier
/// section. Text before the first heading becomes the executive summary
/// when the output has no summary of its own.
pub fn format(result: &ExecutionResult) -> Report {
    let mut parts: [Option<String>; 4] = Default::default();
    let mut preamble = String::new();
    let mut current: Option<usize> = None;

    for line in result.output.lines() {
        if let Some((kind, rest)) = parse_heading(line) {
            let idx = slot(kind);
            let buf = parts[idx].get_or_insert_with(String::new);
            if !rest.is_empty() {
                push_line(buf, rest);
            }
            current = Some(idx);
            continue;
        }

        match current {
            Some(idx) => {
                if let Some(buf) = parts[idx].as_mut() {
                    push_line(buf, line);
                }
            }
            None => push_line(&mut preamble, line),
        }
    }

    let summary_missing = parts[0]
        .as_deref()
        .map_or(true, |s| s.trim().is_empty());
    if summary_missing && !preamble.trim().is_empty() {
        debug!("Using leading text as the executive summary");
        parts[0] = Some(preamble);
    }

    let report = Report::from_parts(parts);
    let missing = report.degraded_sections();
    if !missing.is_empty() {
        let titles: Vec<_> = missing.iter().map(|k| k.title()).collect();
        warn!(
            "Formatting degraded: {} section(s) not available: {}",
            missing.len(),
            titles.join(", ")
        );
    }
    report
}
