// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Plain-text report summary

use minijinja::{context, Environment};
use serde::Serialize;

use super::{Report, Rulebook, Severity};
use crate::Result;

const SUMMARY_TEMPLATE: &str = r#"Inclusivity report {{ id }}
Generated {{ created_at }}
Download: {{ url }}

Screenshots: {{ screenshots }}  Violations: {{ violations }}  Issues: {{ issues }}
Severity: {{ severity.high }} high, {{ severity.medium }} medium, {{ severity.low }} low
{%- if severity.unrated %}, {{ severity.unrated }} unrated{% endif %}
{% for shot in shots %}
== {{ shot.title }} ==
{%- if not shot.groups %}
  No issues found.
{%- endif %}
{%- for group in shot.groups %}
  {{ group.name }}{% if group.facet %} [{{ group.facet }}]{% endif %}
  {%- for bug in group.bugs %}
    - ({{ bug.severity }}) {{ bug.description }}{% if bug.location %} @ {{ bug.location }}{% endif %}
      {%- if bug.recommendation %}
      fix: {{ bug.recommendation }}
      {%- endif %}
  {%- endfor %}
{%- endfor %}
{% endfor %}"#;

#[derive(Serialize)]
struct BugView<'a> {
    severity: &'static str,
    description: &'a str,
    location: &'a str,
    recommendation: &'a str,
}

#[derive(Serialize)]
struct GroupView<'a> {
    name: String,
    facet: Option<String>,
    bugs: Vec<BugView<'a>>,
}

#[derive(Serialize)]
struct ShotView<'a> {
    title: String,
    groups: Vec<GroupView<'a>>,
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "High",
        Severity::Medium => "Medium",
        Severity::Low => "Low",
        Severity::Unrated => "Unrated",
    }
}

/// Render a report for terminal output. Rule names come from the rulebook
/// when available, otherwise rule ids are shown.
pub fn render_summary(report: &Report, rules: &Rulebook) -> Result<String> {
    let groups: Vec<_> = report.results.iter().map(|r| r.grouped_violations()).collect();

    let shots: Vec<ShotView> = report
        .results
        .iter()
        .zip(&groups)
        .map(|(result, groups)| ShotView {
            title: result.display_name(),
            groups: groups
                .iter()
                .map(|group| GroupView {
                    name: rules.display_name(&group.rule_id),
                    facet: rules.facet_for(group),
                    bugs: group
                        .bugs
                        .iter()
                        .map(|bug| BugView {
                            severity: severity_label(bug.severity),
                            description: &bug.description,
                            location: &bug.location,
                            recommendation: &bug.recommendation,
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    let mut env = Environment::new();
    env.add_template("summary", SUMMARY_TEMPLATE)?;
    let rendered = env.get_template("summary")?.render(context! {
        id => &report.id,
        created_at => report.created_at.format("%Y-%m-%d %H:%M").to_string(),
        url => &report.url,
        screenshots => report.screenshot_count(),
        violations => report.violation_count(),
        issues => report.issue_count(),
        severity => report.severity_counts(),
        shots => shots,
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_report;
    use crate::report::Rule;

    #[test]
    fn test_summary_without_rules_shows_ids() {
        let text = render_summary(&sample_report(), &Rulebook::default()).unwrap();
        assert!(text.contains("Inclusivity report r-1"));
        assert!(text.contains("Screenshots: 2  Violations: 3  Issues: 3"));
        assert!(text.contains("== Login Screen =="));
        assert!(text.contains("Rule R1 [Motivations]"));
        assert!(text.contains("(High) Unlabelled icon button @ top right"));
        assert!(text.contains("No issues found."));
        assert!(!text.contains("unrated"));
    }

    #[test]
    fn test_summary_reports_unrated_bugs() {
        let mut report = sample_report();
        report.results[0].violations[1].bugs[0].severity = Severity::Unrated;
        let text = render_summary(&report, &Rulebook::default()).unwrap();
        assert!(text.contains("1 high, 1 medium, 0 low, 1 unrated"));
        assert!(text.contains("(Unrated) Unlabelled icon button"));
    }

    #[test]
    fn test_summary_uses_rule_names() {
        let rules = Rulebook::new(vec![Rule {
            rule_id: "R2".into(),
            rule_name: "Support tinkering".into(),
            facet: "Learning".into(),
            description: None,
        }]);
        let text = render_summary(&sample_report(), &rules).unwrap();
        assert!(text.contains("Support tinkering [Learning]"));
        assert!(!text.contains("Rule R2"));
    }
}
